//! Image versions and the coordinate spaces they live in.
//!
//! Every sweep works on crops and resizes of the original image. A detection
//! is only meaningful together with the version it came from, so versions
//! carry an [`ImageSpace`] describing how to get back to original pixels.

use crate::geometry::{clamp_to, unscale_box};
use crate::types::FaceBox;
use image::imageops::{self, FilterType};
use image::RgbImage;
use serde::Serialize;
use std::sync::Arc;

/// How an image version was derived from the original: optional crop (in
/// original pixels) followed by a uniform resize.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ImageSpace {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crop: Option<FaceBox>,
    pub scale: f32,
}

impl ImageSpace {
    pub const ORIGINAL: ImageSpace = ImageSpace { crop: None, scale: 1.0 };

    /// Map a box from this space back into original-image pixels.
    pub fn to_original(&self, face: &FaceBox) -> FaceBox {
        let mut out = unscale_box(face, self.scale);
        if let Some(crop) = self.crop {
            out.x += crop.x;
            out.y += crop.y;
        }
        out
    }
}

/// A decoded image together with its coordinate space.
#[derive(Debug, Clone)]
pub struct ImageVersion {
    pub image: Arc<RgbImage>,
    pub space: ImageSpace,
}

impl ImageVersion {
    pub fn original(image: RgbImage) -> Self {
        Self {
            image: Arc::new(image),
            space: ImageSpace::ORIGINAL,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Resize by `scale`. Scale 1 shares the pixel buffer.
    ///
    /// Upscaling uses Catmull-Rom for detail on tiny portraits; downscaling
    /// uses a triangle filter to avoid aliasing.
    pub fn resized(&self, scale: f32) -> Self {
        let space = ImageSpace {
            crop: self.space.crop,
            scale: self.space.scale * scale,
        };
        if scale == 1.0 {
            return Self {
                image: Arc::clone(&self.image),
                space,
            };
        }

        let nw = ((self.width() as f32 * scale).round() as u32).max(1);
        let nh = ((self.height() as f32 * scale).round() as u32).max(1);
        let filter = if scale > 1.0 {
            FilterType::CatmullRom
        } else {
            FilterType::Triangle
        };

        Self {
            image: Arc::new(imageops::resize(self.image.as_ref(), nw, nh, filter)),
            space,
        }
    }

    /// Crop to `region` (in this version's pixels), clamped to the image.
    ///
    /// Only unscaled versions can be cropped; the crop offset is recorded in
    /// original pixels.
    pub fn cropped(&self, region: &FaceBox) -> Self {
        debug_assert!(self.space.scale == 1.0, "crop before resizing");
        let r = clamp_to(region, self.width(), self.height());
        let sub = imageops::crop_imm(
            self.image.as_ref(),
            r.x as u32,
            r.y as u32,
            r.w as u32,
            r.h as u32,
        )
        .to_image();

        let crop = match self.space.crop {
            Some(parent) => FaceBox::new(parent.x + r.x, parent.y + r.y, r.w, r.h),
            None => r,
        };

        Self {
            image: Arc::new(sub),
            space: ImageSpace {
                crop: Some(crop),
                scale: self.space.scale,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank(w: u32, h: u32) -> ImageVersion {
        ImageVersion::original(RgbImage::new(w, h))
    }

    #[test]
    fn test_resize_dimensions_and_space() {
        let v = blank(101, 50).resized(1.5);
        assert_eq!((v.width(), v.height()), (152, 75));
        assert_eq!(v.space.scale, 1.5);
        assert!(v.space.crop.is_none());
    }

    #[test]
    fn test_resize_identity_shares_buffer() {
        let v = blank(10, 10);
        let same = v.resized(1.0);
        assert!(Arc::ptr_eq(&v.image, &same.image));
    }

    #[test]
    fn test_crop_clamps_to_image() {
        let v = blank(100, 80).cropped(&FaceBox::new(60, 50, 100, 100));
        assert_eq!((v.width(), v.height()), (40, 30));
        assert_eq!(v.space.crop, Some(FaceBox::new(60, 50, 40, 30)));
    }

    #[test]
    fn test_to_original_through_crop_and_scale() {
        let v = blank(200, 200)
            .cropped(&FaceBox::new(40, 30, 100, 100))
            .resized(2.0);
        // A box at (20,10,30,40) in the 2x crop is (10,5,15,20) in the crop,
        // i.e. (50,35,15,20) in the original.
        let back = v.space.to_original(&FaceBox::new(20, 10, 30, 40));
        assert_eq!(back, FaceBox::new(50, 35, 15, 20));
    }

    #[test]
    fn test_to_original_identity() {
        let b = FaceBox::new(3, 4, 5, 6);
        assert_eq!(ImageSpace::ORIGINAL.to_original(&b), b);
    }
}
