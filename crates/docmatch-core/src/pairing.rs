//! Candidate/document pairing for a single photo of a person holding an ID.
//!
//! The candidate is the live face; the document face is the card portrait.
//! Strategies, in priority order:
//!
//! * **user hints**: caller-supplied boxes; failures here are final.
//! * **same frame**: another, smaller face in the candidate's own frame.
//! * **card ROI**: portrait search restricted to the located card.
//!
//! When both automatic strategies produce a pair, the higher similarity
//! wins, and a tie goes to the card ROI. A document face is never searched
//! for in the full frame, since that can rediscover the candidate and report
//! a face matching itself.

use crate::analyzer::FaceAnalyzer;
use crate::card::locate_card;
use crate::document::search_document_face;
use crate::error::{Role, VerifyError};
use crate::geometry::{center_in_region, iou, scale_box};
use crate::hint::resolve_hint;
use crate::image_space::ImageVersion;
use crate::pick::{FacePick, Provenance, Strategy};
use crate::types::{BoundingBox, Embedding, FaceBox};

pub const DEFAULT_MAX_DOC_AREA_RATIO: f32 = 0.35;
pub const DEFAULT_MIN_DOC_FACE_SIZE: i32 = 20;

/// Document faces smaller than this are almost always false positives, and
/// comparing against them inflates match rates.
const MIN_DOC_FACE_SIDE: i32 = 60;
const DOC_AREA_RATIO_FLOOR: f32 = 0.60;
/// Overlap at or above this means "the same physical face".
const SAME_FACE_IOU: f32 = 0.20;

const CANDIDATE_SCALES: [f32; 3] = [1.0, 1.5, 2.0];
const CANDIDATE_THRESHOLDS: [f32; 3] = [0.6, 0.5, 0.4];
const SAME_FRAME_THRESHOLDS: [f32; 4] = [0.6, 0.5, 0.4, 0.3];
const DEFAULT_CANDIDATE_THRESHOLD: f32 = 0.5;

const NO_CARD_MESSAGE: &str = "could not auto-detect the ID card region; \
     select the document portrait face manually or move the card closer";
const NO_PAIR_MESSAGE: &str = "could not locate the ID card or a reliable portrait face; \
     move the card closer or select the portrait face manually";

/// Optional caller-selected boxes, in original-image pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Hints {
    pub candidate: Option<FaceBox>,
    pub document: Option<FaceBox>,
}

impl Hints {
    pub fn is_empty(&self) -> bool {
        self.candidate.is_none() && self.document.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairingOptions {
    /// Largest document/candidate area ratio; never stricter than 0.60.
    pub max_doc_to_selfie_area_ratio: f32,
    /// Smallest document face side; never below 60.
    pub min_doc_face_size: i32,
}

impl Default for PairingOptions {
    fn default() -> Self {
        Self {
            max_doc_to_selfie_area_ratio: DEFAULT_MAX_DOC_AREA_RATIO,
            min_doc_face_size: DEFAULT_MIN_DOC_FACE_SIZE,
        }
    }
}

impl PairingOptions {
    fn area_ratio_limit(&self) -> f32 {
        self.max_doc_to_selfie_area_ratio.max(DOC_AREA_RATIO_FLOOR)
    }

    fn min_side(&self) -> i32 {
        self.min_doc_face_size.max(MIN_DOC_FACE_SIDE)
    }
}

/// A resolved candidate/document pair.
#[derive(Debug, Clone)]
pub struct Pairing {
    pub strategy: Strategy,
    pub candidate: FacePick,
    pub document: FacePick,
    pub similarity: f32,
    /// Faces detected in the frame the pair was chosen from.
    pub face_count: usize,
    /// Document faces that passed the filters (same-frame) or faces in the
    /// winning search attempt (card ROI).
    pub document_candidates: Option<usize>,
    pub card_region: Option<FaceBox>,
}

/// Why a proposed pair was discarded.
#[derive(Debug, Clone, Copy, PartialEq)]
enum GuardRejection {
    TooSmall { side: i32 },
    SameFace { iou: f32 },
}

impl std::fmt::Display for GuardRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GuardRejection::TooSmall { side } => {
                write!(f, "document face side {side}px below {MIN_DOC_FACE_SIDE}px")
            }
            GuardRejection::SameFace { iou } => {
                write!(f, "document overlaps candidate (IoU {iou:.2})")
            }
        }
    }
}

/// Reject pairs that would compare a face to itself or to a speck.
///
/// Both boxes must be in the same coordinate space.
fn guard(candidate: &FaceBox, document: &FaceBox, check_size: bool) -> Result<(), GuardRejection> {
    if check_size && document.min_side() < MIN_DOC_FACE_SIDE {
        return Err(GuardRejection::TooSmall { side: document.min_side() });
    }
    let overlap = iou(candidate, document);
    if overlap >= SAME_FACE_IOU {
        return Err(GuardRejection::SameFace { iou: overlap });
    }
    Ok(())
}

/// Index of the largest detection by area. Ties keep the earliest.
pub fn largest_face_index(detections: &[BoundingBox]) -> Option<usize> {
    detections
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, i64)>, (i, d)| {
            let area = d.face_box().area();
            match best {
                Some((_, a)) if a >= area => best,
                _ => Some((i, area)),
            }
        })
        .map(|(i, _)| i)
}

/// The live face, its embedding, and how many faces its attempt saw.
struct Candidate {
    pick: FacePick,
    embedding: Embedding,
    face_count: usize,
}

struct PairingContext<'a> {
    analyzer: &'a mut dyn FaceAnalyzer,
    original: &'a ImageVersion,
    options: PairingOptions,
    candidate: Candidate,
    card: Option<FaceBox>,
    guard_tripped: bool,
}

type StrategyFn = fn(&mut PairingContext<'_>) -> Result<Option<Pairing>, VerifyError>;

/// Automatic strategies in priority order.
const AUTOMATIC_CHAIN: [(Strategy, StrategyFn); 2] = [
    (Strategy::SameFrame, same_frame),
    (Strategy::CardRoi, card_roi),
];

/// Resolve the candidate and document faces in one photo.
pub fn pair_faces(
    analyzer: &mut dyn FaceAnalyzer,
    original: &ImageVersion,
    hints: &Hints,
    options: &PairingOptions,
) -> Result<Pairing, VerifyError> {
    if !hints.is_empty() {
        return pair_with_hints(analyzer, original, hints);
    }

    let (pick, face_count) = find_candidate(analyzer, original)?
        .ok_or(VerifyError::NoFaceDetected(Role::Candidate))?;
    let embedding = pick.embed(analyzer)?;
    let card = locate_card(&original.image);

    let mut ctx = PairingContext {
        analyzer,
        original,
        options: *options,
        candidate: Candidate { pick, embedding, face_count },
        card,
        guard_tripped: false,
    };

    let mut best: Option<Pairing> = None;
    for (strategy, run) in AUTOMATIC_CHAIN {
        let Some(pairing) = run(&mut ctx)? else {
            tracing::debug!(?strategy, "pairing: strategy produced no pair");
            continue;
        };
        tracing::debug!(
            ?strategy,
            similarity = pairing.similarity,
            "pairing: strategy produced a pair"
        );
        // Later strategies win ties.
        if best.as_ref().map_or(true, |b| pairing.similarity >= b.similarity) {
            best = Some(pairing);
        }
    }

    match best {
        Some(pairing) => {
            tracing::info!(
                strategy = ?pairing.strategy,
                similarity = pairing.similarity,
                card = ctx.card.is_some(),
                "pairing: selected"
            );
            Ok(pairing)
        }
        None if ctx.card.is_none() => Err(VerifyError::RegionUnresolved(NO_PAIR_MESSAGE.into())),
        None if ctx.guard_tripped => Err(VerifyError::DegenerateMatch),
        None => Err(VerifyError::NoFaceDetected(Role::Document)),
    }
}

/// Largest face over a small scale × threshold sweep, ranked by `area × score`.
fn find_candidate(
    analyzer: &mut dyn FaceAnalyzer,
    original: &ImageVersion,
) -> Result<Option<(FacePick, usize)>, VerifyError> {
    let mut best: Option<(f32, FacePick, usize)> = None;

    for scale in CANDIDATE_SCALES {
        let scaled = original.resized(scale);
        for threshold in CANDIDATE_THRESHOLDS {
            let detections = analyzer.detect(&scaled.image, threshold)?;
            let Some(idx) = largest_face_index(&detections) else {
                continue;
            };
            let metric = detections[idx].area_score();
            if best.as_ref().map_or(true, |(m, _, _)| metric > *m) {
                let provenance = Provenance::new(Strategy::Largest, scale, threshold);
                let pick = FacePick::new(scaled.clone(), detections[idx].clone(), provenance);
                best = Some((metric, pick, detections.len()));
            }
        }
    }

    if let Some((metric, pick, _)) = &best {
        tracing::debug!(
            scale = pick.provenance.scale,
            threshold = pick.provenance.score_threshold,
            metric,
            face = %pick.original_box(),
            "pairing: candidate found"
        );
    }
    Ok(best.map(|(_, pick, count)| (pick, count)))
}

/// Strategy B: another face in the candidate's own frame.
///
/// Thresholds loosen until one yields an acceptable document face.
fn same_frame(ctx: &mut PairingContext<'_>) -> Result<Option<Pairing>, VerifyError> {
    let version = ctx.candidate.pick.version.clone();
    let scale = version.space.scale;
    let cand_box = ctx.candidate.pick.face();
    let card_scaled = ctx.card.map(|c| scale_box(&c, scale));
    let area_limit = ctx.options.area_ratio_limit();
    let min_side = ctx.options.min_side();

    for threshold in SAME_FRAME_THRESHOLDS {
        let detections = ctx.analyzer.detect(&version.image, threshold)?;
        if detections.len() < 2 {
            continue;
        }

        let boxes: Vec<FaceBox> = detections.iter().map(BoundingBox::face_box).collect();
        let cand_idx = (0..boxes.len())
            .max_by(|&a, &b| iou(&boxes[a], &cand_box).total_cmp(&iou(&boxes[b], &cand_box)))
            .unwrap_or(0);
        let cand_ref = boxes[cand_idx];
        if iou(&cand_ref, &cand_box) <= 0.0 {
            tracing::debug!(threshold, "same-frame: candidate not re-detected");
            continue;
        }
        let cand_area = cand_ref.area().max(1) as f32;

        // Size floors are in original pixels; upscaling must not lift a speck over them.
        let doc_indices: Vec<usize> = (0..boxes.len())
            .filter(|&i| i != cand_idx)
            .filter(|&i| iou(&boxes[i], &cand_ref) < SAME_FACE_IOU)
            .filter(|&i| boxes[i].area() as f32 <= cand_area * area_limit)
            .filter(|&i| version.space.to_original(&boxes[i]).min_side() >= min_side)
            .filter(|&i| card_scaled.map_or(true, |card| center_in_region(&boxes[i], &card)))
            .collect();

        if doc_indices.is_empty() {
            tracing::debug!(threshold, faces = boxes.len(), "same-frame: no document candidates");
            continue;
        }

        let mut best: Option<(f32, usize)> = None;
        for &i in &doc_indices {
            let embedding = ctx.analyzer.embed(&version.image, &detections[i])?;
            let sim = ctx.analyzer.similarity(&ctx.candidate.embedding, &embedding);
            if best.map_or(true, |(s, _)| sim > s) {
                best = Some((sim, i));
            }
        }
        let Some((similarity, doc_idx)) = best else {
            continue;
        };

        let cand_orig = version.space.to_original(&cand_ref);
        let doc_orig = version.space.to_original(&boxes[doc_idx]);
        if let Err(rejection) = guard(&cand_orig, &doc_orig, true) {
            tracing::debug!(threshold, %rejection, "same-frame: pair discarded");
            ctx.guard_tripped = true;
            continue;
        }

        let mut provenance = Provenance::new(Strategy::SameFrame, scale, threshold)
            .with_iou(iou(&boxes[doc_idx], &cand_ref));
        if let Some(card) = ctx.card {
            provenance = provenance.with_card_region(card);
        }

        return Ok(Some(Pairing {
            strategy: Strategy::SameFrame,
            candidate: ctx.candidate.pick.clone(),
            document: FacePick::new(version.clone(), detections[doc_idx].clone(), provenance),
            similarity,
            face_count: detections.len(),
            document_candidates: Some(doc_indices.len()),
            card_region: ctx.card,
        }));
    }

    Ok(None)
}

/// Strategy C: portrait search inside the located card only.
fn card_roi(ctx: &mut PairingContext<'_>) -> Result<Option<Pairing>, VerifyError> {
    let Some(card) = ctx.card else {
        return Ok(None);
    };

    let crop = ctx.original.cropped(&card);
    let Some(found) = search_document_face(&mut *ctx.analyzer, &crop, Strategy::CardRoi)? else {
        return Ok(None);
    };

    let cand_orig = ctx.candidate.pick.original_box();
    if let Err(rejection) = guard(&cand_orig, &found.pick.original_box(), false) {
        tracing::debug!(%rejection, "card-roi: pair discarded");
        ctx.guard_tripped = true;
        return Ok(None);
    }

    let embedding = found.pick.embed(&mut *ctx.analyzer)?;
    let similarity = ctx.analyzer.similarity(&ctx.candidate.embedding, &embedding);

    let mut document = found.pick;
    document.provenance = document.provenance.with_card_region(card);

    Ok(Some(Pairing {
        strategy: Strategy::CardRoi,
        candidate: ctx.candidate.pick.clone(),
        document,
        similarity,
        face_count: ctx.candidate.face_count,
        document_candidates: Some(found.face_count),
        card_region: Some(card),
    }))
}

/// Strategy A: honor caller-selected boxes, defaulting whichever is missing.
fn pair_with_hints(
    analyzer: &mut dyn FaceAnalyzer,
    original: &ImageVersion,
    hints: &Hints,
) -> Result<Pairing, VerifyError> {
    // Resolve every supplied hint before guessing anything.
    let candidate = match &hints.candidate {
        Some(hint) => Some(
            resolve_hint(analyzer, original, hint)?
                .ok_or(VerifyError::AmbiguousHint(Role::Candidate))?,
        ),
        None => None,
    };
    let document = match &hints.document {
        Some(hint) => Some(
            resolve_hint(analyzer, original, hint)?
                .ok_or(VerifyError::AmbiguousHint(Role::Document))?,
        ),
        None => None,
    };

    let frame_faces = analyzer.detect(&original.image, DEFAULT_CANDIDATE_THRESHOLD)?;

    let candidate = match candidate {
        Some(pick) => pick,
        None => {
            let idx = largest_face_index(&frame_faces)
                .ok_or(VerifyError::NoFaceDetected(Role::Candidate))?;
            let provenance = Provenance::new(Strategy::Largest, 1.0, DEFAULT_CANDIDATE_THRESHOLD);
            FacePick::new(original.clone(), frame_faces[idx].clone(), provenance)
        }
    };

    let mut card_region = None;
    let document = match document {
        Some(pick) => pick,
        None => {
            let card = locate_card(&original.image)
                .ok_or_else(|| VerifyError::RegionUnresolved(NO_CARD_MESSAGE.into()))?;
            card_region = Some(card);
            let found = search_document_face(analyzer, &original.cropped(&card), Strategy::CardRoi)?
                .ok_or(VerifyError::NoFaceDetected(Role::Document))?;
            let mut pick = found.pick;
            pick.provenance = pick.provenance.with_card_region(card);
            pick
        }
    };

    if let Err(rejection) = guard(&candidate.original_box(), &document.original_box(), false) {
        tracing::warn!(%rejection, "hinted pair resolves to a single face");
        return Err(VerifyError::DegenerateMatch);
    }

    let cand_embedding = candidate.embed(analyzer)?;
    let doc_embedding = document.embed(analyzer)?;
    let similarity = analyzer.similarity(&cand_embedding, &doc_embedding);

    tracing::info!(
        similarity,
        candidate = %candidate.original_box(),
        document = %document.original_box(),
        "pairing: user hints resolved"
    );

    Ok(Pairing {
        strategy: Strategy::UserHint,
        candidate,
        document,
        similarity,
        face_count: frame_faces.len(),
        document_candidates: None,
        card_region,
    })
}
