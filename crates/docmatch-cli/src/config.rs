use anyhow::{Context, Result};
use docmatch_core::detector::{DetectorConfig, DEFAULT_NMS_THRESHOLD, DEFAULT_TOP_K};
use docmatch_core::pairing::{PairingOptions, DEFAULT_MAX_DOC_AREA_RATIO, DEFAULT_MIN_DOC_FACE_SIZE};
use docmatch_core::{ARCFACE_MODEL_FILE, DEFAULT_THRESHOLD, SCRFD_MODEL_FILE};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// CLI configuration: defaults, then an optional TOML file, then
/// `DOCMATCH_*` environment variables.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Cosine similarity threshold for a positive match.
    pub threshold: f32,
    /// Largest document/candidate face area ratio in single-image mode.
    pub max_doc_area_ratio: f32,
    /// Smallest document face side in single-image mode.
    pub min_doc_face_size: i32,
    pub nms_threshold: f32,
    pub top_k: usize,
    /// Run the passive liveness checks on the selfie in two-image mode.
    pub run_liveness: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_dir: docmatch_core::default_model_dir(),
            threshold: DEFAULT_THRESHOLD,
            max_doc_area_ratio: DEFAULT_MAX_DOC_AREA_RATIO,
            min_doc_face_size: DEFAULT_MIN_DOC_FACE_SIZE,
            nms_threshold: DEFAULT_NMS_THRESHOLD,
            top_k: DEFAULT_TOP_K,
            run_liveness: true,
        }
    }
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                Self::from_toml(&text)
                    .with_context(|| format!("parsing config {}", path.display()))?
            }
            None => Self::default(),
        };
        Ok(config.overlay_env(|key| std::env::var(key).ok()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Apply `DOCMATCH_*` overrides; unparsable values are ignored.
    pub fn overlay_env(self, var: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            model_dir: var("DOCMATCH_MODEL_DIR").map(PathBuf::from).unwrap_or(self.model_dir),
            threshold: parsed(&var, "DOCMATCH_THRESHOLD").unwrap_or(self.threshold),
            max_doc_area_ratio: parsed(&var, "DOCMATCH_MAX_DOC_AREA_RATIO")
                .unwrap_or(self.max_doc_area_ratio),
            min_doc_face_size: parsed(&var, "DOCMATCH_MIN_DOC_FACE_SIZE")
                .unwrap_or(self.min_doc_face_size),
            nms_threshold: parsed(&var, "DOCMATCH_NMS_THRESHOLD").unwrap_or(self.nms_threshold),
            top_k: parsed(&var, "DOCMATCH_TOP_K").unwrap_or(self.top_k),
            run_liveness: var("DOCMATCH_RUN_LIVENESS")
                .map(|v| v != "0")
                .unwrap_or(self.run_liveness),
        }
    }

    /// Path to the SCRFD detection model.
    pub fn scrfd_model_path(&self) -> String {
        self.model_dir.join(SCRFD_MODEL_FILE).to_string_lossy().into_owned()
    }

    /// Path to the ArcFace recognition model.
    pub fn arcface_model_path(&self) -> String {
        self.model_dir.join(ARCFACE_MODEL_FILE).to_string_lossy().into_owned()
    }

    pub fn detector(&self) -> DetectorConfig {
        DetectorConfig {
            nms_threshold: self.nms_threshold,
            top_k: self.top_k,
        }
    }

    pub fn pairing(&self) -> PairingOptions {
        PairingOptions {
            max_doc_to_selfie_area_ratio: self.max_doc_area_ratio,
            min_doc_face_size: self.min_doc_face_size,
        }
    }
}

fn parsed<T: std::str::FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    var(key).and_then(|v| v.trim().parse().ok())
}
