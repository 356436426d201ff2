//! ID-card region locator.
//!
//! Finds the bounding rectangle of a physical card using classical contour
//! geometry: blur, Canny edges, dilation, outer contours, then a
//! quadrilateral/aspect-ratio filter. No model is involved.

use crate::types::FaceBox;
use image::imageops::grayscale;
use image::RgbImage;
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::morphology::dilate;
use imageproc::point::Point;

const MIN_IMAGE_SIDE: u32 = 60;
/// Sigma matching a 5×5 Gaussian kernel.
const BLUR_SIGMA: f32 = 1.1;
const CANNY_LOW: f32 = 60.0;
const CANNY_HIGH: f32 = 160.0;
/// Two passes of a 3×3 square dilation.
const DILATE_RADIUS: u8 = 2;
const MIN_AREA_FRACTION: f64 = 0.04;
const APPROX_EPSILON_FRACTION: f64 = 0.02;
/// ID-1 cards are ~1.58; the range tolerates perspective skew.
const MIN_ASPECT: f64 = 1.2;
const MAX_ASPECT: f64 = 2.6;
const MARGIN_X: f64 = 0.05;
const MARGIN_Y: f64 = 0.07;

/// Locate the most card-like quadrilateral in `image`.
///
/// Returns `None` when nothing qualifies; callers treat that as "card region
/// unknown".
pub fn locate_card(image: &RgbImage) -> Option<FaceBox> {
    let (w, h) = image.dimensions();
    if w < MIN_IMAGE_SIDE || h < MIN_IMAGE_SIDE {
        return None;
    }

    let gray = grayscale(image);
    let blurred = gaussian_blur_f32(&gray, BLUR_SIGMA);
    let edges = canny(&blurred, CANNY_LOW, CANNY_HIGH);
    let closed = dilate(&edges, Norm::LInf, DILATE_RADIUS);

    let contours: Vec<Contour<i32>> = find_contours(&closed);
    let image_area = f64::from(w) * f64::from(h);

    let best = contours
        .iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .filter_map(|c| score_contour(&c.points, image_area))
        .max_by(|a, b| a.0.total_cmp(&b.0));

    let Some((score, rect)) = best else {
        tracing::debug!(contours = contours.len(), "card locator: no quadrilateral survived");
        return None;
    };

    let region = expand_margin(&rect, w, h);
    tracing::debug!(score, %rect, %region, "card locator: card region found");
    Some(region)
}

/// Score one outer contour; `None` if it cannot be a card.
///
/// Score is `bbox_area × fill`, where fill is how much of its bounding box
/// the contour covers.
fn score_contour(points: &[Point<i32>], image_area: f64) -> Option<(f64, FaceBox)> {
    if points.len() < 4 {
        return None;
    }
    let area = polygon_area(points);
    if area < image_area * MIN_AREA_FRACTION {
        return None;
    }

    let epsilon = APPROX_EPSILON_FRACTION * arc_length(points, true);
    let approx = approximate_closed(points, epsilon);
    if approx.len() != 4 {
        return None;
    }

    let rect = bounding_rect(&approx);
    let aspect = f64::from(rect.w.max(rect.h)) / f64::from(rect.w.min(rect.h).max(1));
    if !(MIN_ASPECT..=MAX_ASPECT).contains(&aspect) {
        return None;
    }

    let rect_area = rect.area() as f64;
    let fill = area / rect_area.max(1.0);
    Some((rect_area * fill, rect))
}

/// Douglas-Peucker on a closed contour: split at the point farthest from the
/// start and simplify both halves as open chains.
fn approximate_closed(points: &[Point<i32>], epsilon: f64) -> Vec<Point<i32>> {
    let start = points[0];
    let dist2 = |p: &Point<i32>| {
        let (dx, dy) = (i64::from(p.x - start.x), i64::from(p.y - start.y));
        dx * dx + dy * dy
    };
    let split = points
        .iter()
        .enumerate()
        .max_by_key(|(_, p)| dist2(p))
        .map(|(i, _)| i)
        .unwrap_or(0);
    if split == 0 {
        return vec![start];
    }

    let mut back: Vec<Point<i32>> = points[split..].to_vec();
    back.push(start);

    let mut out = approximate_polygon_dp(&points[..=split], epsilon, false);
    let tail = approximate_polygon_dp(&back, epsilon, false);
    // Drop the shared split point and the repeated start.
    out.extend_from_slice(&tail[1..tail.len() - 1]);
    out
}

/// Shoelace area of a closed polygon.
fn polygon_area(points: &[Point<i32>]) -> f64 {
    let twice: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| i64::from(a.x) * i64::from(b.y) - i64::from(b.x) * i64::from(a.y))
        .sum();
    twice.abs() as f64 / 2.0
}

/// Inclusive pixel bounding box of a point set.
fn bounding_rect(points: &[Point<i32>]) -> FaceBox {
    let min_x = points.iter().map(|p| p.x).min().unwrap_or(0);
    let max_x = points.iter().map(|p| p.x).max().unwrap_or(0);
    let min_y = points.iter().map(|p| p.y).min().unwrap_or(0);
    let max_y = points.iter().map(|p| p.y).max().unwrap_or(0);
    FaceBox::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1)
}

/// Grow by 5% horizontally and 7% vertically; contours tend to hug inside the card edge.
fn expand_margin(rect: &FaceBox, width: u32, height: u32) -> FaceBox {
    let mx = (f64::from(rect.w) * MARGIN_X).round() as i32;
    let my = (f64::from(rect.h) * MARGIN_Y).round() as i32;
    let x0 = (rect.x - mx).max(0);
    let y0 = (rect.y - my).max(0);
    let x1 = (rect.right() + mx).min(width as i32);
    let y1 = (rect.bottom() + my).min(height as i32);
    FaceBox::new(x0, y0, (x1 - x0).max(1), (y1 - y0).max(1))
}
