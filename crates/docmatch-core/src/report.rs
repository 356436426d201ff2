//! Serializable verification results.

use crate::error::VerifyError;
use crate::liveness::LivenessReport;
use crate::pairing::Pairing;
use crate::pick::{Provenance, Strategy};
use crate::types::FaceBox;
use serde::Serialize;

/// Similarity at or above which a pair is reported as a match.
pub const DEFAULT_THRESHOLD: f32 = 0.363;

/// Map similarity in [-1, 1] to a 0..=100 display percentage.
pub fn match_percent(similarity: f32) -> u8 {
    (((similarity + 1.0) / 2.0).clamp(0.0, 1.0) * 100.0).round() as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Mode {
    /// Separate document and selfie images.
    #[serde(rename = "document_and_selfie")]
    Pair,
    /// One photo of the person holding their ID.
    #[serde(rename = "single_image_selfie_with_card")]
    SingleImage,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceSummary {
    pub candidate_box: FaceBox,
    pub document_box: FaceBox,
    pub face_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_face_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_region: Option<FaceBox>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub strategy: Strategy,
    pub candidate: Provenance,
    pub document: Provenance,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationOutcome {
    pub ok: bool,
    pub engine: String,
    pub mode: Mode,
    pub similarity: f32,
    pub threshold: f32,
    pub is_match: bool,
    pub match_percent: u8,
    pub faces: FaceSummary,
    pub selection: Selection,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liveness: Option<LivenessReport>,
    pub note: &'static str,
}

impl VerificationOutcome {
    /// Build the report for a resolved pair. Boxes are reported in
    /// original-image pixels.
    pub fn from_pairing(engine: &str, mode: Mode, threshold: f32, pairing: &Pairing) -> Self {
        let similarity = pairing.similarity.clamp(-1.0, 1.0);
        Self {
            ok: true,
            engine: engine.to_string(),
            mode,
            similarity,
            threshold,
            is_match: similarity >= threshold,
            match_percent: match_percent(similarity),
            faces: FaceSummary {
                candidate_box: pairing.candidate.original_box(),
                document_box: pairing.document.original_box(),
                face_count: pairing.face_count,
                document_face_count: pairing.document_candidates,
                card_region: pairing.card_region,
            },
            selection: Selection {
                strategy: pairing.strategy,
                candidate: pairing.candidate.provenance.clone(),
                document: pairing.document.provenance.clone(),
            },
            liveness: None,
            note: note_for(mode, pairing.strategy),
        }
    }

    pub fn with_liveness(mut self, liveness: LivenessReport) -> Self {
        self.liveness = Some(liveness);
        self
    }
}

fn note_for(mode: Mode, strategy: Strategy) -> &'static str {
    match (mode, strategy) {
        (Mode::Pair, _) => {
            "Passive checks only; production use needs a real anti-spoof model \
             and audited thresholds."
        }
        (_, Strategy::UserHint) => "User-selected face(s) were used for matching.",
        (_, Strategy::SameFrame) => {
            "Matched the candidate (largest) face against another face in the same frame \
             (likely the ID portrait)."
        }
        (_, Strategy::CardRoi) => {
            "Matched the candidate face against the portrait found inside the ID-card region."
        }
        (_, Strategy::Largest | Strategy::DocumentSearch) => {
            "Matched the candidate face against the document portrait."
        }
    }
}

/// Structured failure, serialized as `{"ok": false, "error": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Failure {
    pub ok: bool,
    pub error: String,
}

/// Either a verification result or a displayable failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Outcome<T> {
    Success(T),
    Failure(Failure),
}

impl<T> Outcome<T> {
    pub fn from_result(result: Result<T, VerifyError>) -> Self {
        match result {
            Ok(value) => Outcome::Success(value),
            Err(err) => Outcome::Failure(Failure {
                ok: false,
                error: err.to_string(),
            }),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }
}
