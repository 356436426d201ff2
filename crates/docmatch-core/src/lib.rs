//! docmatch-core: document-vs-selfie face verification engine.
//!
//! Finds the ID portrait and the live face (in two images, or both in one
//! photo of a person holding their card), embeds both and reports how well
//! they match. Detection uses SCRFD and recognition ArcFace, both running
//! via ONNX Runtime behind the [`FaceAnalyzer`] trait.

use std::path::PathBuf;

pub mod alignment;
pub mod analyzer;
pub mod card;
pub mod detector;
pub mod document;
pub mod error;
pub mod geometry;
pub mod hint;
pub mod image_space;
pub mod liveness;
pub mod pairing;
pub mod pick;
pub mod recognizer;
pub mod report;
pub mod types;
pub mod verify;

#[cfg(test)]
pub(crate) mod testing;

pub use analyzer::{AnalyzerError, FaceAnalyzer, OnnxAnalyzer};
pub use error::{Role, VerifyError};
pub use liveness::{check_liveness, LivenessReport};
pub use pairing::{Hints, PairingOptions};
pub use report::{Outcome, VerificationOutcome, DEFAULT_THRESHOLD};
pub use types::{BoundingBox, Embedding, FaceBox};
pub use verify::{detect_faces, verify_pair, verify_single, FaceListing, PairOptions, SingleOptions};

/// File name of the SCRFD detection model inside the model directory.
pub const SCRFD_MODEL_FILE: &str = "det_10g.onnx";
/// File name of the ArcFace recognition model inside the model directory.
pub const ARCFACE_MODEL_FILE: &str = "w600k_r50.onnx";

/// `$XDG_DATA_HOME/docmatch/models`, else `~/.local/share/docmatch/models`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("docmatch")
        .join("models")
}
