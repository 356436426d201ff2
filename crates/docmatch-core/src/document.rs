//! Multi-scale search for the portrait on an ID document.
//!
//! Card portraits are often far below the detector's comfortable size and
//! confidence, and where they sit is not predictable. The search sweeps
//! every (ROI, scale, threshold) combination and keeps the detection with
//! the highest `area × score`, which favours confident, reasonably sized
//! faces over tiny false positives.

use crate::analyzer::{AnalyzerError, FaceAnalyzer};
use crate::image_space::ImageVersion;
use crate::pick::{FacePick, Provenance, Strategy};
use crate::types::{BoundingBox, FaceBox};

/// Region of interest as fractions of the searched image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Roi {
    pub name: &'static str,
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Roi {
    const fn new(name: &'static str, x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { name, x, y, w, h }
    }

    pub fn is_full(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.w == 1.0 && self.h == 1.0
    }

    /// Pixel region inside a `width × height` image.
    pub fn region(&self, width: u32, height: u32) -> FaceBox {
        let (w, h) = (width as f32, height as f32);
        FaceBox::new(
            (w * self.x) as i32,
            (h * self.y) as i32,
            (w * self.w) as i32,
            (h * self.h) as i32,
        )
    }
}

/// Portrait locations seen on common ID layouts: the whole image, then
/// left/top biased crops.
pub const DOCUMENT_ROIS: [Roi; 5] = [
    Roi::new("full", 0.0, 0.0, 1.0, 1.0),
    Roi::new("top_left", 0.0, 0.0, 0.6, 0.75),
    Roi::new("left", 0.0, 0.0, 0.65, 1.0),
    Roi::new("top", 0.0, 0.0, 1.0, 0.7),
    Roi::new("left_middle", 0.0, 0.12, 0.7, 0.8),
];
pub const DOCUMENT_SCALES: [f32; 3] = [1.0, 2.0, 3.0];
pub const DOCUMENT_THRESHOLDS: [f32; 3] = [0.6, 0.5, 0.4];

/// One point of the sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchAttempt {
    pub roi: Roi,
    pub scale: f32,
    pub score_threshold: f32,
}

/// The full sweep, ROI-major then scale then threshold.
pub fn search_space() -> impl Iterator<Item = SearchAttempt> {
    DOCUMENT_ROIS.into_iter().flat_map(|roi| {
        DOCUMENT_SCALES.into_iter().flat_map(move |scale| {
            DOCUMENT_THRESHOLDS
                .into_iter()
                .map(move |score_threshold| SearchAttempt { roi, scale, score_threshold })
        })
    })
}

/// Index and metric of the best detection in one attempt, by `area × score`.
///
/// Ties keep the earliest detection.
pub fn best_by_area_score(detections: &[BoundingBox]) -> Option<(usize, f32)> {
    detections
        .iter()
        .enumerate()
        .map(|(i, d)| (i, d.area_score()))
        .fold(None, |best, (i, metric)| match best {
            Some((_, m)) if m >= metric => best,
            _ => Some((i, metric)),
        })
}

/// Result of a document search.
#[derive(Debug, Clone)]
pub struct DocumentMatch {
    pub pick: FacePick,
    /// Faces found by the winning attempt.
    pub face_count: usize,
    pub metric: f32,
}

/// Sweep [`search_space`] over `version` and return the globally best face.
///
/// ROIs are relative to `version`, so a caller that must not rediscover a
/// face outside some region passes a crop of that region. `Ok(None)` means
/// no attempt detected anything.
pub fn search_document_face<A: FaceAnalyzer + ?Sized>(
    analyzer: &mut A,
    version: &ImageVersion,
    strategy: Strategy,
) -> Result<Option<DocumentMatch>, AnalyzerError> {
    let mut best: Option<DocumentMatch> = None;
    let mut current: Option<(&'static str, f32, ImageVersion)> = None;
    let mut attempts = 0usize;

    for attempt in search_space() {
        attempts += 1;
        let reuse = matches!(
            &current,
            Some((name, scale, _)) if *name == attempt.roi.name && *scale == attempt.scale
        );
        if !reuse {
            let roi_version = if attempt.roi.is_full() {
                version.clone()
            } else {
                version.cropped(&attempt.roi.region(version.width(), version.height()))
            };
            current = Some((attempt.roi.name, attempt.scale, roi_version.resized(attempt.scale)));
        }
        let Some((_, _, scaled)) = current.as_ref() else {
            continue;
        };

        let detections = analyzer.detect(&scaled.image, attempt.score_threshold)?;
        let Some((idx, metric)) = best_by_area_score(&detections) else {
            continue;
        };

        if best.as_ref().map_or(true, |b| metric > b.metric) {
            let provenance = Provenance::new(strategy, attempt.scale, attempt.score_threshold)
                .with_roi(attempt.roi.name);
            best = Some(DocumentMatch {
                pick: FacePick::new(scaled.clone(), detections[idx].clone(), provenance),
                face_count: detections.len(),
                metric,
            });
        }
    }

    match &best {
        Some(m) => tracing::debug!(
            attempts,
            roi = m.pick.provenance.roi,
            scale = m.pick.provenance.scale,
            threshold = m.pick.provenance.score_threshold,
            metric = m.metric,
            "document search: portrait found"
        ),
        None => tracing::debug!(attempts, "document search: no face in any attempt"),
    }

    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Scene;

    fn det(w: f32, h: f32, conf: f32) -> BoundingBox {
        BoundingBox {
            x: 0.0, y: 0.0, width: w, height: h, confidence: conf, landmarks: None,
        }
    }

    #[test]
    fn test_search_space_is_exhaustive() {
        let attempts: Vec<_> = search_space().collect();
        assert_eq!(attempts.len(), 45);
        assert_eq!(attempts[0].roi.name, "full");
        assert_eq!(attempts[0].scale, 1.0);
        assert_eq!(attempts[0].score_threshold, 0.6);
        assert_eq!(attempts[44].roi.name, "left_middle");
        assert_eq!(attempts[44].scale, 3.0);
        assert_eq!(attempts[44].score_threshold, 0.4);
    }

    #[test]
    fn test_roi_regions() {
        assert!(DOCUMENT_ROIS[0].is_full());
        assert_eq!(DOCUMENT_ROIS[1].region(200, 100), FaceBox::new(0, 0, 120, 75));
        assert_eq!(DOCUMENT_ROIS[4].region(200, 100), FaceBox::new(0, 12, 140, 80));
    }

    #[test]
    fn test_best_by_area_score_prefers_confident_and_large() {
        // 10x10 @ 0.99 = 99, 20x20 @ 0.4 = 160, 15x15 @ 0.9 = 202.5
        let dets = vec![det(10.0, 10.0, 0.99), det(20.0, 20.0, 0.4), det(15.0, 15.0, 0.9)];
        let (idx, metric) = best_by_area_score(&dets).unwrap();
        assert_eq!(idx, 2);
        assert!((metric - 202.5).abs() < 1e-3);
    }

    #[test]
    fn test_best_by_area_score_tie_keeps_first() {
        let dets = vec![det(10.0, 10.0, 0.5), det(10.0, 10.0, 0.5)];
        assert_eq!(best_by_area_score(&dets).map(|(i, _)| i), Some(0));
        assert!(best_by_area_score(&[]).is_none());
    }

    #[test]
    fn test_finds_small_low_confidence_portrait() {
        let (img, mut stub) = Scene::new(240, 150)
            .face(FaceBox::new(20, 30, 36, 44), [60, 170, 60], 0.45, &[1.0, 0.0])
            .build();

        let original = ImageVersion::original(img);
        let found = search_document_face(&mut stub, &original, Strategy::DocumentSearch)
            .unwrap()
            .expect("portrait found");

        // Only the 0.4 threshold sees it; the largest scale wins on area.
        assert_eq!(found.pick.provenance.score_threshold, 0.4);
        assert_eq!(found.pick.provenance.scale, 3.0);
        assert_eq!(found.face_count, 1);
        let back = found.pick.original_box();
        assert!((back.x - 20).abs() <= 2 && (back.y - 30).abs() <= 2, "{back}");
        assert!((back.w - 36).abs() <= 2 && (back.h - 44).abs() <= 2, "{back}");
        assert_eq!(stub.detect_calls, 45);
    }

    #[test]
    fn test_no_face_anywhere() {
        let (img, mut stub) = Scene::new(120, 80).build();
        let original = ImageVersion::original(img);
        let found = search_document_face(&mut stub, &original, Strategy::DocumentSearch).unwrap();
        assert!(found.is_none());
        assert_eq!(stub.detect_calls, 45);
    }
}
