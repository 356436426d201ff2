//! A chosen face, the image version it lives in, and how it was chosen.

use crate::analyzer::{AnalyzerError, FaceAnalyzer};
use crate::image_space::ImageVersion;
use crate::types::{BoundingBox, Embedding, FaceBox};
use serde::Serialize;

/// How a face was selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Largest face on the full image.
    Largest,
    /// Resolved from a user-supplied hint box.
    UserHint,
    /// Multi-scale document portrait search.
    DocumentSearch,
    /// Another face in the candidate's own frame.
    SameFrame,
    /// Portrait search inside the located ID-card region.
    CardRoi,
}

/// Trace of one pick, reported for debugging.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
    pub strategy: Strategy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roi: Option<&'static str>,
    pub scale: f32,
    pub score_threshold: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iou: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_region: Option<FaceBox>,
}

impl Provenance {
    pub fn new(strategy: Strategy, scale: f32, score_threshold: f32) -> Self {
        Self {
            strategy,
            roi: None,
            scale,
            score_threshold,
            iou: None,
            card_region: None,
        }
    }

    pub fn with_roi(mut self, roi: &'static str) -> Self {
        self.roi = Some(roi);
        self
    }

    pub fn with_iou(mut self, iou: f32) -> Self {
        self.iou = Some(iou);
        self
    }

    pub fn with_card_region(mut self, region: FaceBox) -> Self {
        self.card_region = Some(region);
        self
    }
}

#[derive(Debug, Clone)]
pub struct FacePick {
    pub version: ImageVersion,
    pub detection: BoundingBox,
    pub provenance: Provenance,
}

impl FacePick {
    pub fn new(version: ImageVersion, detection: BoundingBox, provenance: Provenance) -> Self {
        Self {
            version,
            detection,
            provenance,
        }
    }

    /// Box in the pick's own image version.
    pub fn face(&self) -> FaceBox {
        self.detection.face_box()
    }

    /// Box mapped back to original-image pixels.
    pub fn original_box(&self) -> FaceBox {
        self.version.space.to_original(&self.face())
    }

    /// Embed in the pick's own coordinate space.
    pub fn embed<A: FaceAnalyzer + ?Sized>(
        &self,
        analyzer: &mut A,
    ) -> Result<Embedding, AnalyzerError> {
        analyzer.embed(&self.version.image, &self.detection)
    }
}
