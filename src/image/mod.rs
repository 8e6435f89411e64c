//! Decode planning, raster transforms and output encoding.
//!
//! The stages mirror the data flow of a derived-image request:
//!
//! ```text
//! source bytes ──▶ decode ──▶ plan ──▶ extract region ──▶ transform ──▶ encode
//!                  (+descriptor)        (level coords)     (pure)        (registry)
//! ```

mod decode;
mod descriptor;
mod encoder;
mod planner;
mod transform;

pub use decode::{decode_source, extract_region, SourceImage};
pub use descriptor::{DecodeLevel, ImageDescriptor};
pub use encoder::{EncoderRegistry, DEFAULT_JPEG_QUALITY};
pub use planner::{plan_decode, DecodePlan};
pub use transform::transform;

use bytes::Bytes;
use image::DynamicImage;

use crate::error::ImageError;
use crate::selector::ResolvedSelector;

/// A decoded raster awaiting its final transforms.
///
/// Owned exclusively by the request that produced it and discarded after
/// encoding.
pub struct DecodedImage {
    pub raster: DynamicImage,
    pub target: (u32, u32),
    pub residual_rotation: u16,
    pub mirror: bool,
}

/// Run the full decode/transform/encode pipeline for one resolved request.
///
/// The raster decoders used here cannot rotate during decode, so the plan is
/// made with folding disabled and the rotation applied in the transform.
pub fn render(
    source: &SourceImage,
    resolved: &ResolvedSelector,
    registry: &EncoderRegistry,
) -> Result<Bytes, ImageError> {
    let plan = plan_decode(&source.descriptor, resolved, false)?;

    let cropped = extract_region(&source.raster, plan.decode_region);
    let decoded = DecodedImage {
        raster: cropped,
        target: plan.target,
        residual_rotation: plan.residual_rotation,
        mirror: plan.mirror,
    };

    let out = transform(
        decoded.raster,
        decoded.target,
        decoded.residual_rotation,
        decoded.mirror,
        resolved.quality,
    );

    registry.encode(&out, resolved.format, source.descriptor.icc_profile.as_deref())
}
