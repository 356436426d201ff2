//! The detector/recognizer capability the pairing engine is built on.

use crate::detector::{DetectorConfig, DetectorError, FaceDetector};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::{BoundingBox, Embedding};
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("detector: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// Face detection, embedding and comparison.
///
/// Implementations must be deterministic for identical inputs. `embed`
/// requires the same image that produced `face`.
pub trait FaceAnalyzer {
    /// Detect faces with confidence ≥ `score_threshold`. No faces is `Ok(vec![])`.
    fn detect(
        &mut self,
        image: &RgbImage,
        score_threshold: f32,
    ) -> Result<Vec<BoundingBox>, AnalyzerError>;

    fn embed(&mut self, image: &RgbImage, face: &BoundingBox) -> Result<Embedding, AnalyzerError>;

    /// Symmetric similarity in [-1, 1].
    fn similarity(&self, a: &Embedding, b: &Embedding) -> f32 {
        a.similarity(b)
    }

    /// Engine label reported in outcomes.
    fn name(&self) -> &str;
}

/// SCRFD detection + ArcFace recognition, both via ONNX Runtime.
pub struct OnnxAnalyzer {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl OnnxAnalyzer {
    pub fn load(
        scrfd_path: &str,
        arcface_path: &str,
        config: DetectorConfig,
    ) -> Result<Self, AnalyzerError> {
        let detector = FaceDetector::load(scrfd_path, config)?;
        let recognizer = FaceRecognizer::load(arcface_path)?;
        Ok(Self { detector, recognizer })
    }
}

impl FaceAnalyzer for OnnxAnalyzer {
    fn detect(
        &mut self,
        image: &RgbImage,
        score_threshold: f32,
    ) -> Result<Vec<BoundingBox>, AnalyzerError> {
        Ok(self.detector.detect(image, score_threshold)?)
    }

    fn embed(&mut self, image: &RgbImage, face: &BoundingBox) -> Result<Embedding, AnalyzerError> {
        Ok(self.recognizer.extract(image, face)?)
    }

    fn name(&self) -> &str {
        "SCRFD + ArcFace (ONNX Runtime)"
    }
}
