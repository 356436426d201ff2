//! Deterministic stand-in for the ONNX analyzer.
//!
//! Faces are painted as solid color patches. Detection finds each patch by
//! color in whatever crop/resize it is handed, so the engine's coordinate
//! bookkeeping is exercised for real; embeddings are looked up by the color
//! under the box center.

use crate::analyzer::{AnalyzerError, FaceAnalyzer};
use crate::recognizer::RecognizerError;
use crate::types::{BoundingBox, Embedding, FaceBox};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;

pub(crate) const BACKGROUND: Rgb<u8> = Rgb([128, 128, 128]);
pub(crate) const CARD_INK: Rgb<u8> = Rgb([20, 30, 45]);
const COLOR_TOLERANCE: i32 = 8;
const MIN_PATCH_PIXELS: usize = 16;

#[derive(Debug, Clone)]
struct Patch {
    color: Rgb<u8>,
    score: f32,
    embedding: Vec<f32>,
}

/// Builder for a synthetic photo plus the analyzer that understands it.
pub(crate) struct Scene {
    image: RgbImage,
    patches: Vec<Patch>,
}

impl Scene {
    pub(crate) fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbImage::from_pixel(width, height, BACKGROUND),
            patches: Vec::new(),
        }
    }

    /// Paint a face patch. `color` must be unique within the scene.
    pub(crate) fn face(
        mut self,
        region: FaceBox,
        color: [u8; 3],
        score: f32,
        embedding: &[f32],
    ) -> Self {
        fill(&mut self.image, &region, Rgb(color));
        self.patches.push(Patch {
            color: Rgb(color),
            score,
            embedding: embedding.to_vec(),
        });
        self
    }

    /// Paint a dark card-shaped rectangle. Paint it before the faces it holds.
    pub(crate) fn card(mut self, region: FaceBox) -> Self {
        fill(&mut self.image, &region, CARD_INK);
        self
    }

    pub(crate) fn build(self) -> (RgbImage, PatchAnalyzer) {
        (
            self.image,
            PatchAnalyzer {
                patches: self.patches,
                detect_calls: 0,
            },
        )
    }
}

fn fill(image: &mut RgbImage, region: &FaceBox, color: Rgb<u8>) {
    let rect = Rect::at(region.x, region.y).of_size(region.w as u32, region.h as u32);
    draw_filled_rect_mut(image, rect, color);
}

pub(crate) struct PatchAnalyzer {
    patches: Vec<Patch>,
    pub(crate) detect_calls: usize,
}

impl PatchAnalyzer {
    /// One analyzer that understands the patches of both scenes.
    pub(crate) fn merged(mut self, other: PatchAnalyzer) -> Self {
        self.patches.extend(other.patches);
        self
    }

    fn matches(color: &Rgb<u8>, pixel: &Rgb<u8>) -> bool {
        color
            .0
            .iter()
            .zip(pixel.0.iter())
            .all(|(&a, &b)| (i32::from(a) - i32::from(b)).abs() <= COLOR_TOLERANCE)
    }
}

impl FaceAnalyzer for PatchAnalyzer {
    fn detect(
        &mut self,
        image: &RgbImage,
        score_threshold: f32,
    ) -> Result<Vec<BoundingBox>, AnalyzerError> {
        self.detect_calls += 1;
        let mut found = Vec::new();

        for patch in self.patches.iter().filter(|p| p.score >= score_threshold) {
            let (mut min_x, mut min_y, mut max_x, mut max_y) = (u32::MAX, u32::MAX, 0u32, 0u32);
            let mut count = 0usize;
            for (x, y, pixel) in image.enumerate_pixels() {
                if Self::matches(&patch.color, pixel) {
                    min_x = min_x.min(x);
                    min_y = min_y.min(y);
                    max_x = max_x.max(x);
                    max_y = max_y.max(y);
                    count += 1;
                }
            }
            if count >= MIN_PATCH_PIXELS {
                found.push(BoundingBox {
                    x: min_x as f32,
                    y: min_y as f32,
                    width: (max_x - min_x + 1) as f32,
                    height: (max_y - min_y + 1) as f32,
                    confidence: patch.score,
                    landmarks: None,
                });
            }
        }

        found.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        Ok(found)
    }

    fn embed(&mut self, image: &RgbImage, face: &BoundingBox) -> Result<Embedding, AnalyzerError> {
        let (cx, cy) = face.face_box().center();
        let (cx, cy) = (cx as u32, cy as u32);
        if cx >= image.width() || cy >= image.height() {
            return Err(RecognizerError::InferenceFailed("face center outside image".into()).into());
        }
        let pixel = image.get_pixel(cx, cy);
        let patch = self
            .patches
            .iter()
            .find(|p| Self::matches(&p.color, pixel))
            .ok_or_else(|| RecognizerError::InferenceFailed(format!("no patch under {pixel:?}")))?;

        Ok(Embedding {
            values: patch.embedding.clone(),
            model_version: Some("patch".into()),
        })
    }

    fn name(&self) -> &str {
        "patch stub"
    }
}

/// Unit vector at `similarity` cosine to `[1, 0]`.
pub(crate) fn at_similarity(similarity: f32) -> [f32; 2] {
    [similarity, (1.0 - similarity * similarity).max(0.0).sqrt()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_space::ImageVersion;

    #[test]
    fn test_patch_detection_survives_crop_and_resize() {
        let (img, mut stub) = Scene::new(200, 150)
            .face(FaceBox::new(20, 30, 40, 50), [200, 60, 60], 0.9, &[1.0, 0.0])
            .build();

        let v = ImageVersion::original(img)
            .cropped(&FaceBox::new(10, 10, 100, 100))
            .resized(2.0);
        let dets = stub.detect(&v.image, 0.5).unwrap();
        assert_eq!(dets.len(), 1);

        let back = v.space.to_original(&dets[0].face_box());
        assert!((back.x - 20).abs() <= 2 && (back.y - 30).abs() <= 2, "{back}");
        assert!((back.w - 40).abs() <= 2 && (back.h - 50).abs() <= 2, "{back}");

        let emb = stub.embed(&v.image, &dets[0]).unwrap();
        assert_eq!(emb.values, vec![1.0, 0.0]);
    }

    #[test]
    fn test_patch_threshold() {
        let (img, mut stub) = Scene::new(100, 100)
            .face(FaceBox::new(10, 10, 30, 30), [60, 170, 60], 0.45, &[1.0, 0.0])
            .build();
        assert!(stub.detect(&img, 0.5).unwrap().is_empty());
        assert_eq!(stub.detect(&img, 0.4).unwrap().len(), 1);
        assert_eq!(stub.detect_calls, 2);
    }
}
