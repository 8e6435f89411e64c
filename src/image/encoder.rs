//! Output encoding: raster to bytes per target format.
//!
//! Encoders are registered once at startup in an [`EncoderRegistry`] keyed
//! by output format: JPEG with an explicit quality factor, PNG, WEBP, and a
//! generic fallback through the image crate for the remaining raster
//! formats. Requesting a format with no registered encoder fails with
//! UnsupportedFormat. Encoders write into an owned buffer and return it only
//! on success, so partial output is never emitted.

use std::collections::HashMap;
use std::io::Cursor;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageFormat};

use crate::error::{ImageError, SelectorError};
use crate::selector::OutputFormat;

/// Default JPEG quality factor, matching the fixed 0.75 compression quality
/// of the serving pipeline this replaces.
pub const DEFAULT_JPEG_QUALITY: u8 = 75;

type EncodeFn = fn(&DynamicImage, &EncodeContext) -> Result<Vec<u8>, ImageError>;

struct EncodeContext<'a> {
    jpeg_quality: u8,
    icc_profile: Option<&'a [u8]>,
}

/// Format-keyed encoder table, built once at startup.
pub struct EncoderRegistry {
    encoders: HashMap<OutputFormat, EncodeFn>,
    jpeg_quality: u8,
}

impl EncoderRegistry {
    /// Build the registry with every supported output format registered.
    pub fn new(jpeg_quality: u8) -> Self {
        let mut encoders: HashMap<OutputFormat, EncodeFn> = HashMap::new();
        encoders.insert(OutputFormat::Jpg, encode_jpeg);
        encoders.insert(OutputFormat::Png, encode_png);
        encoders.insert(OutputFormat::Webp, encode_webp);
        encoders.insert(OutputFormat::Tif, encode_generic_tiff);
        encoders.insert(OutputFormat::Gif, encode_generic_gif);
        Self {
            encoders,
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    /// Encode a raster to the target format.
    ///
    /// When `icc_profile` is present the output is re-tagged with it on
    /// encoders that accept a profile; the pixels themselves are not
    /// resampled.
    pub fn encode(
        &self,
        raster: &DynamicImage,
        format: OutputFormat,
        icc_profile: Option<&[u8]>,
    ) -> Result<Bytes, ImageError> {
        let encode = self.encoders.get(&format).ok_or_else(|| {
            ImageError::Selector(SelectorError::UnsupportedFormat(format.as_str().to_string()))
        })?;
        let ctx = EncodeContext {
            jpeg_quality: self.jpeg_quality,
            icc_profile,
        };
        encode(raster, &ctx).map(Bytes::from)
    }

    /// Whether an encoder is registered for the format.
    pub fn supports(&self, format: OutputFormat) -> bool {
        self.encoders.contains_key(&format)
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality
    }
}

impl Default for EncoderRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

fn encode_jpeg(raster: &DynamicImage, ctx: &EncodeContext) -> Result<Vec<u8>, ImageError> {
    let mut out = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut out, ctx.jpeg_quality);
    if let Some(icc) = ctx.icc_profile {
        // Not every color layout accepts a profile; serving untagged pixels
        // beats failing the request.
        let _ = encoder.set_icc_profile(icc.to_vec());
    }
    encoder
        .encode_image(raster)
        .map_err(|e| ImageError::Encode {
            message: e.to_string(),
        })?;
    Ok(out)
}

fn encode_png(raster: &DynamicImage, ctx: &EncodeContext) -> Result<Vec<u8>, ImageError> {
    let mut out = Vec::new();
    let mut encoder = PngEncoder::new(&mut out);
    if let Some(icc) = ctx.icc_profile {
        let _ = encoder.set_icc_profile(icc.to_vec());
    }
    encoder
        .write_image(
            raster.as_bytes(),
            raster.width(),
            raster.height(),
            raster.color().into(),
        )
        .map_err(|e| ImageError::Encode {
            message: e.to_string(),
        })?;
    Ok(out)
}

fn encode_webp(raster: &DynamicImage, _ctx: &EncodeContext) -> Result<Vec<u8>, ImageError> {
    // The native WEBP encoder is lossless and only takes RGB8/RGBA8 input.
    let rgb;
    let (buf, color): (&[u8], ExtendedColorType) = match raster {
        DynamicImage::ImageRgb8(img) => (img.as_raw(), ExtendedColorType::Rgb8),
        DynamicImage::ImageRgba8(img) => (img.as_raw(), ExtendedColorType::Rgba8),
        other => {
            rgb = other.to_rgb8();
            (rgb.as_raw(), ExtendedColorType::Rgb8)
        }
    };
    let mut out = Vec::new();
    WebPEncoder::new_lossless(&mut out)
        .encode(buf, raster.width(), raster.height(), color)
        .map_err(|e| ImageError::Encode {
            message: e.to_string(),
        })?;
    Ok(out)
}

fn encode_generic_tiff(raster: &DynamicImage, _ctx: &EncodeContext) -> Result<Vec<u8>, ImageError> {
    encode_generic(raster, ImageFormat::Tiff)
}

fn encode_generic_gif(raster: &DynamicImage, _ctx: &EncodeContext) -> Result<Vec<u8>, ImageError> {
    // The GIF encoder wants RGBA input.
    let rgba = DynamicImage::ImageRgba8(raster.to_rgba8());
    encode_generic(&rgba, ImageFormat::Gif)
}

fn encode_generic(raster: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, ImageError> {
    let mut out = Vec::new();
    raster
        .write_to(&mut Cursor::new(&mut out), format)
        .map_err(|e| ImageError::Encode {
            message: e.to_string(),
        })?;
    Ok(out)
}
