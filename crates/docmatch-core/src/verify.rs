//! Entry points: face listing, two-image verification and single-image
//! (selfie holding an ID) verification.

use crate::analyzer::FaceAnalyzer;
use crate::document::search_document_face;
use crate::error::{Role, VerifyError};
use crate::geometry::iou;
use crate::image_space::ImageVersion;
use crate::liveness::check_liveness;
use crate::pairing::{largest_face_index, pair_faces, Hints, Pairing, PairingOptions};
use crate::pick::{FacePick, Provenance, Strategy};
use crate::report::{Mode, VerificationOutcome, DEFAULT_THRESHOLD};
use crate::types::FaceBox;
use image::RgbImage;
use serde::Serialize;

/// Detection threshold for "obvious" faces before any sweep kicks in.
pub const PRIMARY_THRESHOLD: f32 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairOptions {
    pub threshold: f32,
    pub run_liveness: bool,
}

impl Default for PairOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            run_liveness: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SingleOptions {
    pub threshold: f32,
    pub pairing: PairingOptions,
    pub hints: Hints,
}

impl Default for SingleOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            pairing: PairingOptions::default(),
            hints: Hints::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListedFace {
    #[serde(flatten)]
    pub face: FaceBox,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceListing {
    pub ok: bool,
    pub face_count: usize,
    pub boxes: Vec<ListedFace>,
}

/// Detected faces, for UI feedback.
pub fn detect_faces(
    analyzer: &mut dyn FaceAnalyzer,
    image: &RgbImage,
    score_threshold: f32,
) -> Result<FaceListing, VerifyError> {
    check_image(image, Role::Candidate)?;
    check_unit("score threshold", score_threshold)?;

    let boxes: Vec<ListedFace> = analyzer
        .detect(image, score_threshold)?
        .iter()
        .map(|d| ListedFace {
            face: d.face_box(),
            score: d.confidence,
        })
        .collect();

    Ok(FaceListing {
        ok: true,
        face_count: boxes.len(),
        boxes,
    })
}

/// Compare the portrait on a document image with the face in a selfie.
///
/// The document face is the largest obvious face, falling back to the
/// multi-scale portrait search; the selfie face is the largest obvious face.
pub fn verify_pair(
    analyzer: &mut dyn FaceAnalyzer,
    document: RgbImage,
    selfie: RgbImage,
    options: &PairOptions,
) -> Result<VerificationOutcome, VerifyError> {
    check_image(&document, Role::Document)?;
    check_image(&selfie, Role::Selfie)?;
    check_similarity_threshold(options.threshold)?;

    let document = ImageVersion::original(document);
    let doc_faces = analyzer.detect(&document.image, PRIMARY_THRESHOLD)?;
    let (doc_pick, doc_face_count) = match largest_face_index(&doc_faces) {
        Some(i) => {
            let provenance = Provenance::new(Strategy::Largest, 1.0, PRIMARY_THRESHOLD);
            (FacePick::new(document.clone(), doc_faces[i].clone(), provenance), doc_faces.len())
        }
        None => {
            tracing::debug!("no obvious document face, searching for a small portrait");
            let found = search_document_face(analyzer, &document, Strategy::DocumentSearch)?
                .ok_or(VerifyError::NoFaceDetected(Role::Document))?;
            (found.pick, found.face_count)
        }
    };

    let selfie = ImageVersion::original(selfie);
    let selfie_faces = analyzer.detect(&selfie.image, PRIMARY_THRESHOLD)?;
    let i = largest_face_index(&selfie_faces)
        .ok_or(VerifyError::NoFaceDetected(Role::Selfie))?;
    let selfie_pick = FacePick::new(
        selfie.clone(),
        selfie_faces[i].clone(),
        Provenance::new(Strategy::Largest, 1.0, PRIMARY_THRESHOLD),
    );

    let doc_embedding = doc_pick.embed(analyzer)?;
    let selfie_embedding = selfie_pick.embed(analyzer)?;
    let similarity = analyzer.similarity(&doc_embedding, &selfie_embedding);

    let pairing = Pairing {
        strategy: doc_pick.provenance.strategy,
        candidate: selfie_pick,
        document: doc_pick,
        similarity,
        face_count: selfie_faces.len(),
        document_candidates: Some(doc_face_count),
        card_region: None,
    };
    let mut outcome =
        VerificationOutcome::from_pairing(analyzer.name(), Mode::Pair, options.threshold, &pairing);

    if options.run_liveness {
        outcome = outcome.with_liveness(check_liveness(analyzer, &selfie.image)?);
    }

    tracing::info!(
        similarity = outcome.similarity,
        is_match = outcome.is_match,
        document = ?pairing.strategy,
        "pair verified"
    );
    Ok(outcome)
}

/// Verify a single photo of a person holding their ID.
pub fn verify_single(
    analyzer: &mut dyn FaceAnalyzer,
    image: RgbImage,
    options: &SingleOptions,
) -> Result<VerificationOutcome, VerifyError> {
    check_image(&image, Role::Candidate)?;
    check_similarity_threshold(options.threshold)?;
    check_hint(options.hints.candidate, Role::Candidate, &image)?;
    check_hint(options.hints.document, Role::Document, &image)?;

    let original = ImageVersion::original(image);
    let pairing = pair_faces(analyzer, &original, &options.hints, &options.pairing)?;
    let outcome = VerificationOutcome::from_pairing(
        analyzer.name(),
        Mode::SingleImage,
        options.threshold,
        &pairing,
    );

    tracing::info!(
        similarity = outcome.similarity,
        is_match = outcome.is_match,
        strategy = ?pairing.strategy,
        "single image verified"
    );
    Ok(outcome)
}

fn check_image(image: &RgbImage, role: Role) -> Result<(), VerifyError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(VerifyError::Input(format!("{role} image is empty")));
    }
    Ok(())
}

/// A hint box must overlap the image it points into.
fn check_hint(hint: Option<FaceBox>, role: Role, image: &RgbImage) -> Result<(), VerifyError> {
    let Some(hint) = hint else { return Ok(()) };
    let (w, h) = (image.width(), image.height());
    let frame = FaceBox::new(0, 0, w as i32, h as i32);
    if iou(&hint, &frame) <= 0.0 {
        return Err(VerifyError::Input(format!("{role} box {hint} lies outside the {w}x{h} image")));
    }
    Ok(())
}

fn check_unit(name: &str, value: f32) -> Result<(), VerifyError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(VerifyError::Input(format!("{name} must be within [0, 1], got {value}")));
    }
    Ok(())
}

fn check_similarity_threshold(value: f32) -> Result<(), VerifyError> {
    if !(-1.0..=1.0).contains(&value) {
        return Err(VerifyError::Input(format!(
            "similarity threshold must be within [-1, 1], got {value}"
        )));
    }
    Ok(())
}
