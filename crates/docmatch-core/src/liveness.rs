//! Passive image sanity checks on a selfie.
//!
//! This is a UX gate for obviously unusable captures (no face, several
//! faces, a distant face, motion blur, bad exposure). It does nothing
//! against printed photos, screens or masks and must not be treated as
//! anti-spoofing.

use crate::analyzer::{AnalyzerError, FaceAnalyzer};
use crate::pairing::largest_face_index;
use image::imageops::grayscale;
use image::{GrayImage, RgbImage};
use imageproc::filter::laplacian_filter;
use serde::Serialize;

pub const LIVENESS_SCORE_THRESHOLD: f32 = 0.6;
pub const MIN_FACE_AREA_RATIO: f32 = 0.03;
pub const MIN_BLUR_SCORE: f64 = 60.0;
pub const MIN_BRIGHTNESS: f64 = 40.0;
pub const MAX_BRIGHTNESS: f64 = 220.0;

const NOTE: &str = "Basic passive checks only (not full anti-spoof/liveness).";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LivenessReport {
    pub passed: bool,
    pub face_count: usize,
    /// Largest face area over image area.
    pub face_area_ratio: f32,
    /// Variance of the Laplacian; low means blurry.
    pub blur_score: f64,
    /// Mean gray level, 0..=255.
    pub brightness: f64,
    pub note: &'static str,
}

/// Run all checks; `passed` only if every one holds.
pub fn check_liveness(
    analyzer: &mut dyn FaceAnalyzer,
    image: &RgbImage,
) -> Result<LivenessReport, AnalyzerError> {
    let faces = analyzer.detect(image, LIVENESS_SCORE_THRESHOLD)?;
    let image_area = (u64::from(image.width()) * u64::from(image.height())).max(1) as f32;
    let face_area_ratio = largest_face_index(&faces)
        .map(|i| faces[i].face_box().area() as f32 / image_area)
        .unwrap_or(0.0);

    let gray = grayscale(image);
    let blur_score = laplacian_variance(&gray);
    let brightness = mean_brightness(&gray);

    let passed = faces.len() == 1
        && face_area_ratio >= MIN_FACE_AREA_RATIO
        && blur_score >= MIN_BLUR_SCORE
        && (MIN_BRIGHTNESS..=MAX_BRIGHTNESS).contains(&brightness);

    tracing::debug!(
        passed,
        faces = faces.len(),
        face_area_ratio,
        blur_score,
        brightness,
        "liveness checks"
    );

    Ok(LivenessReport {
        passed,
        face_count: faces.len(),
        face_area_ratio,
        blur_score,
        brightness,
        note: NOTE,
    })
}

fn laplacian_variance(gray: &GrayImage) -> f64 {
    let lap = laplacian_filter(gray);
    let n = (u64::from(lap.width()) * u64::from(lap.height())).max(1) as f64;
    let mean = lap.pixels().map(|p| f64::from(p.0[0])).sum::<f64>() / n;
    lap.pixels()
        .map(|p| {
            let d = f64::from(p.0[0]) - mean;
            d * d
        })
        .sum::<f64>()
        / n
}

fn mean_brightness(gray: &GrayImage) -> f64 {
    let n = (u64::from(gray.width()) * u64::from(gray.height())).max(1) as f64;
    gray.pixels().map(|p| f64::from(p.0[0])).sum::<f64>() / n
}
