//! Source decoding: bytes to raster plus descriptor.
//!
//! Decoding sniffs the container format from the bytes, captures the ICC
//! color profile when the source carries one (so the output can be re-tagged
//! with it at encode time), and derives the image descriptor used by the
//! selector resolver and decode planner.

use std::io::Cursor;

use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader};

use crate::error::ImageError;
use crate::selector::Rect;

use super::descriptor::ImageDescriptor;

/// A decoded source: raster plus the descriptor computed from it.
pub struct SourceImage {
    pub raster: DynamicImage,
    pub descriptor: ImageDescriptor,
}

/// Decode source bytes.
pub fn decode_source(bytes: &[u8]) -> Result<SourceImage, ImageError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ImageError::Decode {
            message: e.to_string(),
        })?;
    let format = reader.format().ok_or_else(|| ImageError::Decode {
        message: "unrecognized image format".to_string(),
    })?;

    let (raster, icc) = decode_with_profile(bytes, format)?;

    let descriptor =
        ImageDescriptor::single_level(raster.width(), raster.height()).with_icc_profile(icc);

    Ok(SourceImage { raster, descriptor })
}

/// Extract the planned decode region from a decoded raster.
///
/// The region is expressed in the decoded level's coordinate space and has
/// already been clipped by selector resolution.
pub fn extract_region(raster: &DynamicImage, region: Rect) -> DynamicImage {
    if region.x == 0
        && region.y == 0
        && region.width == raster.width()
        && region.height == raster.height()
    {
        return raster.clone();
    }
    raster.crop_imm(
        region.x,
        region.y,
        region.width.min(raster.width().saturating_sub(region.x)),
        region.height.min(raster.height().saturating_sub(region.y)),
    )
}

/// Decode via the format's codec so the ICC profile can be captured.
fn decode_with_profile(
    bytes: &[u8],
    format: ImageFormat,
) -> Result<(DynamicImage, Option<Vec<u8>>), ImageError> {
    let decode_err = |e: image::ImageError| ImageError::Decode {
        message: e.to_string(),
    };
    let cursor = Cursor::new(bytes);
    match format {
        ImageFormat::Jpeg => {
            let mut decoder =
                image::codecs::jpeg::JpegDecoder::new(cursor).map_err(decode_err)?;
            let icc = decoder.icc_profile().ok().flatten();
            Ok((DynamicImage::from_decoder(decoder).map_err(decode_err)?, icc))
        }
        ImageFormat::Png => {
            let mut decoder = image::codecs::png::PngDecoder::new(cursor).map_err(decode_err)?;
            let icc = decoder.icc_profile().ok().flatten();
            Ok((DynamicImage::from_decoder(decoder).map_err(decode_err)?, icc))
        }
        ImageFormat::WebP => {
            let mut decoder =
                image::codecs::webp::WebPDecoder::new(cursor).map_err(decode_err)?;
            let icc = decoder.icc_profile().ok().flatten();
            Ok((DynamicImage::from_decoder(decoder).map_err(decode_err)?, icc))
        }
        ImageFormat::Tiff => {
            let mut decoder =
                image::codecs::tiff::TiffDecoder::new(cursor).map_err(decode_err)?;
            let icc = decoder.icc_profile().ok().flatten();
            Ok((DynamicImage::from_decoder(decoder).map_err(decode_err)?, icc))
        }
        // Remaining registered formats carry no profile worth keeping.
        other => {
            let raster = image::load_from_memory_with_format(bytes, other).map_err(decode_err)?;
            Ok((raster, None))
        }
    }
}
