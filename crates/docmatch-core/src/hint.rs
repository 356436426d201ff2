//! Map an approximate, user-drawn box to the detection it most likely means.

use crate::analyzer::{AnalyzerError, FaceAnalyzer};
use crate::geometry::{iou, scale_box};
use crate::image_space::ImageVersion;
use crate::pick::{FacePick, Provenance, Strategy};
use crate::types::FaceBox;

pub const HINT_SCALES: [f32; 4] = [1.0, 1.5, 2.0, 3.0];
pub const HINT_THRESHOLDS: [f32; 3] = [0.6, 0.5, 0.4];
/// Clicks are imprecise; any plausible overlap is accepted.
pub const MIN_HINT_IOU: f32 = 0.10;

/// Find the detection overlapping `hint` (original-image pixels) best across
/// all scales and thresholds.
///
/// Returns `Ok(None)` when the best overlap is below [`MIN_HINT_IOU`],
/// including when nothing is detected at all.
pub fn resolve_hint<A: FaceAnalyzer + ?Sized>(
    analyzer: &mut A,
    original: &ImageVersion,
    hint: &FaceBox,
) -> Result<Option<FacePick>, AnalyzerError> {
    let mut best: Option<(f32, FacePick)> = None;

    for scale in HINT_SCALES {
        let scaled = original.resized(scale);
        let target = scale_box(hint, scale);

        for threshold in HINT_THRESHOLDS {
            for det in analyzer.detect(&scaled.image, threshold)? {
                let overlap = iou(&target, &det.face_box());
                if best.as_ref().map_or(true, |(b, _)| overlap > *b) {
                    let provenance =
                        Provenance::new(Strategy::UserHint, scale, threshold).with_iou(overlap);
                    best = Some((overlap, FacePick::new(scaled.clone(), det, provenance)));
                }
            }
        }
    }

    match best {
        Some((overlap, pick)) if overlap >= MIN_HINT_IOU => {
            tracing::debug!(
                %hint,
                iou = overlap,
                scale = pick.provenance.scale,
                threshold = pick.provenance.score_threshold,
                "hint resolved"
            );
            Ok(Some(pick))
        }
        other => {
            tracing::debug!(%hint, best_iou = other.map(|(o, _)| o), "hint unresolved");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Scene;

    fn scene() -> (ImageVersion, crate::testing::PatchAnalyzer) {
        let (img, stub) = Scene::new(300, 200)
            .face(FaceBox::new(20, 20, 100, 110), [200, 60, 60], 0.9, &[1.0, 0.0])
            .face(FaceBox::new(200, 40, 60, 70), [60, 170, 60], 0.7, &[0.0, 1.0])
            .build();
        (ImageVersion::original(img), stub)
    }

    #[test]
    fn test_resolves_imprecise_click() {
        let (original, mut stub) = scene();
        // Off by ~15 px and the wrong size, but clearly the right-hand face.
        let pick = resolve_hint(&mut stub, &original, &FaceBox::new(210, 30, 70, 60))
            .unwrap()
            .expect("resolved");
        let back = pick.original_box();
        assert!((back.x - 200).abs() <= 2 && (back.y - 40).abs() <= 2, "{back}");
        assert_eq!(pick.provenance.strategy, Strategy::UserHint);
        assert!(pick.provenance.iou.unwrap() >= MIN_HINT_IOU);
    }

    #[test]
    fn test_zero_overlap_is_unresolved() {
        let (original, mut stub) = scene();
        let pick = resolve_hint(&mut stub, &original, &FaceBox::new(140, 150, 30, 30)).unwrap();
        assert!(pick.is_none());
    }

    #[test]
    fn test_sliver_overlap_below_floor() {
        let (original, mut stub) = scene();
        // Overlaps the left face by a 5 px strip only.
        let pick = resolve_hint(&mut stub, &original, &FaceBox::new(115, 20, 80, 110)).unwrap();
        assert!(pick.is_none());
    }

    #[test]
    fn test_no_detections_is_unresolved() {
        let (img, mut stub) = Scene::new(100, 100).build();
        let original = ImageVersion::original(img);
        let pick = resolve_hint(&mut stub, &original, &FaceBox::new(0, 0, 50, 50)).unwrap();
        assert!(pick.is_none());
        assert_eq!(stub.detect_calls, 12);
    }
}
