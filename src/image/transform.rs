//! The raster transform pipeline.
//!
//! Pure function of the decoded raster. Step order is fixed: resize first
//! (aspect handling is already encoded in the resolved target, so the resize
//! must hit the exact target), then rotate, then mirror, with the quality
//! conversion last so color space is converted exactly once.

use image::{imageops::FilterType, DynamicImage};

use crate::selector::Quality;

/// Luma threshold separating black from white in bitonal output.
const BITONAL_THRESHOLD: u8 = 128;

/// Apply the resolved transforms to a decoded raster.
///
/// `rotation` must be one of {0, 90, 180, 270}; the planner enforces this
/// before a raster ever reaches the pipeline.
pub fn transform(
    raster: DynamicImage,
    target: (u32, u32),
    rotation: u16,
    mirror: bool,
    quality: Quality,
) -> DynamicImage {
    let mut img = raster;

    if (img.width(), img.height()) != target {
        img = img.resize_exact(target.0, target.1, FilterType::Triangle);
    }

    img = match rotation {
        90 => img.rotate90(),
        180 => img.rotate180(),
        270 => img.rotate270(),
        _ => img,
    };

    if mirror {
        img = img.fliph();
    }

    match quality {
        Quality::Default | Quality::Color => DynamicImage::ImageRgb8(img.to_rgb8()),
        Quality::Gray => DynamicImage::ImageLuma8(img.to_luma8()),
        Quality::Bitonal => {
            let mut luma = img.to_luma8();
            for pixel in luma.pixels_mut() {
                pixel.0[0] = if pixel.0[0] >= BITONAL_THRESHOLD { 255 } else { 0 };
            }
            DynamicImage::ImageLuma8(luma)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    /// 4x2 raster with a distinct corner pixel for orientation checks.
    fn marked_raster() -> DynamicImage {
        let mut img = RgbImage::from_pixel(4, 2, Rgb([0, 0, 0]));
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        DynamicImage::ImageRgb8(img)
    }

    fn red_at(img: &DynamicImage, x: u32, y: u32) -> bool {
        img.to_rgb8().get_pixel(x, y).0[0] > 200
    }

    #[test]
    fn test_resize_hits_exact_target() {
        // Distorted targets must be honored exactly, not aspect-fitted.
        let img = transform(marked_raster(), (8, 8), 0, false, Quality::Color);
        assert_eq!((img.width(), img.height()), (8, 8));
    }

    #[test]
    fn test_no_resize_when_already_at_target() {
        let img = transform(marked_raster(), (4, 2), 0, false, Quality::Color);
        assert_eq!((img.width(), img.height()), (4, 2));
        assert!(red_at(&img, 0, 0));
    }

    #[test]
    fn test_rotate_90_swaps_dimensions() {
        let img = transform(marked_raster(), (4, 2), 90, false, Quality::Color);
        assert_eq!((img.width(), img.height()), (2, 4));
        // Top-left marker moves to the top-right corner under clockwise 90.
        assert!(red_at(&img, 1, 0));
    }

    #[test]
    fn test_rotate_180_preserves_dimensions() {
        let img = transform(marked_raster(), (4, 2), 180, false, Quality::Color);
        assert_eq!((img.width(), img.height()), (4, 2));
        assert!(red_at(&img, 3, 1));
    }

    #[test]
    fn test_rotate_270() {
        let img = transform(marked_raster(), (4, 2), 270, false, Quality::Color);
        assert_eq!((img.width(), img.height()), (2, 4));
        assert!(red_at(&img, 0, 3));
    }

    #[test]
    fn test_mirror_flips_horizontally() {
        let img = transform(marked_raster(), (4, 2), 0, true, Quality::Color);
        assert!(red_at(&img, 3, 0));
    }

    #[test]
    fn test_rotation_applies_before_mirror() {
        // 90 then mirror: marker lands top-left again (rotate puts it
        // top-right, the flip brings it back).
        let img = transform(marked_raster(), (4, 2), 90, true, Quality::Color);
        assert_eq!((img.width(), img.height()), (2, 4));
        assert!(red_at(&img, 0, 0));
    }

    #[test]
    fn test_gray_conversion() {
        let img = transform(marked_raster(), (4, 2), 0, false, Quality::Gray);
        assert!(matches!(img, DynamicImage::ImageLuma8(_)));
    }

    #[test]
    fn test_bitonal_is_bilevel() {
        let img = transform(marked_raster(), (4, 2), 0, false, Quality::Bitonal);
        let luma = img.to_luma8();
        assert!(luma.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }

    #[test]
    fn test_default_and_color_are_rgb() {
        for quality in [Quality::Default, Quality::Color] {
            let img = transform(marked_raster(), (4, 2), 0, false, quality);
            assert!(matches!(img, DynamicImage::ImageRgb8(_)));
        }
    }
}
