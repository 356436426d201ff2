use crate::analyzer::AnalyzerError;
use serde::Serialize;
use thiserror::Error;

/// Which face of the pair an error or pick refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Candidate,
    Document,
    Selfie,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Role::Candidate => "candidate",
            Role::Document => "document",
            Role::Selfie => "selfie",
        })
    }
}

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("invalid input: {0}")]
    Input(String),
    #[error("no {0} face detected")]
    NoFaceDetected(Role),
    #[error(
        "could not match your selected {0} face box to a detected face; \
         please re-select the face"
    )]
    AmbiguousHint(Role),
    #[error("{0}")]
    RegionUnresolved(String),
    #[error("candidate and document resolve to the same face; please select two different faces")]
    DegenerateMatch,
    #[error("analyzer: {0}")]
    Analyzer(#[from] AnalyzerError),
}
