//! Box geometry: overlap, containment and rescaling between image versions.

use crate::types::FaceBox;

/// Intersection-over-Union of two integer boxes.
///
/// Returns 0 when the boxes do not overlap. The denominator is floored at 1
/// so degenerate boxes never divide by zero.
pub fn iou(a: &FaceBox, b: &FaceBox) -> f32 {
    let ix1 = a.x.max(b.x);
    let iy1 = a.y.max(b.y);
    let ix2 = a.right().min(b.right());
    let iy2 = a.bottom().min(b.bottom());

    let inter = (i64::from(ix2) - i64::from(ix1)).max(0) * (i64::from(iy2) - i64::from(iy1)).max(0);
    if inter <= 0 {
        return 0.0;
    }
    let union = a.area() + b.area() - inter;
    inter as f32 / union.max(1) as f32
}

/// True if the center of `face` lies within `region` (edges inclusive).
pub fn center_in_region(face: &FaceBox, region: &FaceBox) -> bool {
    let (cx, cy) = face.center();
    cx >= region.x as f32
        && cx <= region.right() as f32
        && cy >= region.y as f32
        && cy <= region.bottom() as f32
}

/// Map a box into an image resized by `scale`.
pub fn scale_box(face: &FaceBox, scale: f32) -> FaceBox {
    let s = |v: i32| (v as f32 * scale).round() as i32;
    FaceBox::new(s(face.x), s(face.y), s(face.w), s(face.h))
}

/// Inverse of [`scale_box`]: map a box from a resized image back by `1/scale`.
pub fn unscale_box(face: &FaceBox, scale: f32) -> FaceBox {
    let inv = 1.0 / scale;
    let s = |v: i32| (v as f32 * inv).round() as i32;
    FaceBox::new(s(face.x), s(face.y), s(face.w), s(face.h))
}

/// Clamp a box to `width × height`, keeping at least one pixel on each side.
pub fn clamp_to(face: &FaceBox, width: u32, height: u32) -> FaceBox {
    let (iw, ih) = (width as i32, height as i32);
    let x0 = face.x.clamp(0, (iw - 1).max(0));
    let y0 = face.y.clamp(0, (ih - 1).max(0));
    let x1 = face.right().min(iw).max(x0 + 1);
    let y1 = face.bottom().min(ih).max(y0 + 1);
    FaceBox::new(x0, y0, x1 - x0, y1 - y0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iou_identical() {
        let a = FaceBox::new(10, 10, 100, 80);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_symmetric() {
        let pairs = [
            (FaceBox::new(0, 0, 10, 10), FaceBox::new(5, 0, 10, 10)),
            (FaceBox::new(3, 7, 40, 21), FaceBox::new(20, 1, 13, 50)),
            (FaceBox::new(0, 0, 100, 100), FaceBox::new(25, 25, 10, 10)),
        ];
        for (a, b) in pairs {
            assert_eq!(iou(&a, &b), iou(&b, &a));
        }
    }

    #[test]
    fn test_iou_partial() {
        let a = FaceBox::new(0, 0, 10, 10);
        let b = FaceBox::new(5, 0, 10, 10);
        // Overlap: 5x10 = 50, union: 100+100-50 = 150
        assert!((iou(&a, &b) - 50.0 / 150.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_disjoint_and_touching() {
        let a = FaceBox::new(0, 0, 10, 10);
        assert_eq!(iou(&a, &FaceBox::new(20, 20, 10, 10)), 0.0);
        assert_eq!(iou(&a, &FaceBox::new(10, 0, 10, 10)), 0.0);
    }

    #[test]
    fn test_iou_degenerate_box() {
        let a = FaceBox::new(0, 0, 10, 10);
        assert_eq!(iou(&a, &FaceBox::new(2, 2, 0, 5)), 0.0);
        assert_eq!(iou(&a, &FaceBox::new(2, 2, -4, 5)), 0.0);
    }

    #[test]
    fn test_center_in_region() {
        let region = FaceBox::new(100, 100, 200, 100);
        // Center (150, 150) inside even though the box sticks out.
        assert!(center_in_region(&FaceBox::new(50, 100, 200, 100), &region));
        // Center on the edge counts.
        assert!(center_in_region(&FaceBox::new(90, 90, 20, 20), &region));
        assert!(!center_in_region(&FaceBox::new(0, 0, 50, 50), &region));
    }

    #[test]
    fn test_rescale_roundtrip() {
        let boxes = [
            FaceBox::new(0, 0, 1, 1),
            FaceBox::new(13, 27, 61, 77),
            FaceBox::new(301, 5, 149, 202),
            FaceBox::new(999, 733, 3, 1001),
        ];
        for scale in [1.0f32, 1.5, 2.0, 3.0] {
            for b in &boxes {
                let back = unscale_box(&scale_box(b, scale), scale);
                assert!((back.x - b.x).abs() <= 1, "{b} @ {scale} -> {back}");
                assert!((back.y - b.y).abs() <= 1, "{b} @ {scale} -> {back}");
                assert!((back.w - b.w).abs() <= 1, "{b} @ {scale} -> {back}");
                assert!((back.h - b.h).abs() <= 1, "{b} @ {scale} -> {back}");
            }
        }
    }

    #[test]
    fn test_clamp_to_bounds() {
        assert_eq!(
            clamp_to(&FaceBox::new(-10, -5, 50, 50), 30, 30),
            FaceBox::new(0, 0, 30, 30)
        );
        assert_eq!(
            clamp_to(&FaceBox::new(25, 25, 50, 50), 30, 30),
            FaceBox::new(25, 25, 5, 5)
        );
        // Entirely outside still yields a 1px box inside the image.
        assert_eq!(
            clamp_to(&FaceBox::new(100, 100, 10, 10), 30, 30),
            FaceBox::new(29, 29, 1, 1)
        );
    }
}
