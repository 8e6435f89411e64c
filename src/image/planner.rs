//! Decode planning: choosing the cheapest decode for a resolved request.
//!
//! Given the target scale implied by a resolved selector and the decode
//! levels a source offers, the planner picks the smallest level that still
//! covers the target (never one that would require upscaling) and translates
//! the region from native coordinates into that level's coordinate space.
//! When the decoder can rotate while decoding, quarter-turn rotations are
//! folded into the decode step and zeroed out of the residual.

use crate::error::SelectorError;
use crate::selector::{Rect, ResolvedSelector};

use super::descriptor::ImageDescriptor;

/// A fully planned decode: which level to decode, which region of it, and
/// what remains for the transform pipeline afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodePlan {
    /// Index into the descriptor's level list
    pub level: usize,
    /// Scale factor of the chosen level relative to native resolution
    pub scale: f64,
    /// Region to decode, in the chosen level's coordinate space
    pub decode_region: Rect,
    /// Output dimensions after any folded rotation
    pub target: (u32, u32),
    /// Rotation still to apply after decoding, in {0, 90, 180, 270}
    pub residual_rotation: u16,
    /// Horizontal mirror still to apply after decoding
    pub mirror: bool,
}

/// Plan the decode for a resolved selector.
///
/// `decoder_rotates` advertises whether the decode step can rotate by
/// quarter turns itself; the raster decoders used here cannot, so production
/// callers pass `false`.
pub fn plan_decode(
    descriptor: &ImageDescriptor,
    resolved: &ResolvedSelector,
    decoder_rotates: bool,
) -> Result<DecodePlan, SelectorError> {
    let rotation = resolved.rotation.quarter_degrees()?;

    let target_scale = resolved.target.0 as f64 / resolved.region.width as f64;

    // Smallest level whose scale still covers the target; full resolution
    // when none qualifies.
    let mut level = 0;
    let mut scale = 1.0;
    for (idx, candidate) in descriptor.levels.iter().enumerate() {
        let factor = candidate.scale(descriptor.width);
        if factor < target_scale {
            continue;
        }
        if (target_scale - factor).abs() < (target_scale - scale).abs() {
            scale = factor;
            level = idx;
        }
    }

    // Selector regions are relative to native resolution; decode regions are
    // relative to the decoded level, hence the conversion.
    let decode_region = Rect::new(
        scale_up(resolved.region.x, scale),
        scale_up(resolved.region.y, scale),
        scale_up(resolved.region.width, scale),
        scale_up(resolved.region.height, scale),
    );

    let mut target = resolved.target;
    let mut residual_rotation = rotation;
    if decoder_rotates && rotation != 0 {
        if rotation == 90 || rotation == 270 {
            target = (target.1, target.0);
        }
        residual_rotation = 0;
    }

    Ok(DecodePlan {
        level,
        scale,
        decode_region,
        target,
        residual_rotation,
        mirror: resolved.rotation.mirror(),
    })
}

fn scale_up(value: u32, scale: f64) -> u32 {
    (value as f64 * scale).ceil() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::descriptor::DecodeLevel;
    use crate::selector::{ImageSelector, Rotation};

    fn pyramid(native: (u32, u32), factors: &[u32]) -> ImageDescriptor {
        ImageDescriptor {
            width: native.0,
            height: native.1,
            levels: factors
                .iter()
                .map(|f| DecodeLevel {
                    width: native.0 / f,
                    height: native.1 / f,
                })
                .collect(),
            tiled: false,
            icc_profile: None,
        }
    }

    fn resolved(region: &str, size: &str, rotation: &str, native: (u32, u32)) -> ResolvedSelector {
        ImageSelector::parse(region, size, rotation, "default.jpg")
            .unwrap()
            .resolve(native)
            .unwrap()
    }

    #[test]
    fn test_picks_closest_covering_level() {
        let desc = pyramid((4000, 4000), &[1, 2, 4, 8]);
        // Target scale 0.25: the 1/4 level matches exactly.
        let sel = resolved("full", "1000,", "0", (4000, 4000));
        let plan = plan_decode(&desc, &sel, false).unwrap();
        assert_eq!(plan.level, 2);
        assert_eq!(plan.scale, 0.25);
    }

    #[test]
    fn test_never_picks_level_requiring_upscale() {
        let desc = pyramid((4000, 4000), &[1, 2, 4, 8]);
        // Target scale 0.3: the 1/4 level (0.25) would need upscaling, so the
        // 1/2 level is the closest qualifying one.
        let sel = resolved("full", "1200,", "0", (4000, 4000));
        let plan = plan_decode(&desc, &sel, false).unwrap();
        assert_eq!(plan.level, 1);
        assert_eq!(plan.scale, 0.5);
    }

    #[test]
    fn test_falls_back_to_full_resolution() {
        // Only reduced levels below the target scale: full resolution wins.
        let desc = ImageDescriptor {
            width: 4000,
            height: 4000,
            levels: vec![
                DecodeLevel { width: 4000, height: 4000 },
                DecodeLevel { width: 500, height: 500 },
            ],
            tiled: false,
            icc_profile: None,
        };
        let sel = resolved("full", "3000,", "0", (4000, 4000));
        let plan = plan_decode(&desc, &sel, false).unwrap();
        assert_eq!(plan.level, 0);
        assert_eq!(plan.scale, 1.0);
    }

    #[test]
    fn test_region_translated_into_level_space() {
        let desc = pyramid((4000, 4000), &[1, 2, 4, 8]);
        let sel = resolved("1000,1000,2000,2000", "500,", "0", (4000, 4000));
        let plan = plan_decode(&desc, &sel, false).unwrap();
        // Target scale 0.25, so the 1/4 level; edges scaled by 0.25, ceil.
        assert_eq!(plan.scale, 0.25);
        assert_eq!(plan.decode_region, Rect::new(250, 250, 500, 500));
    }

    #[test]
    fn test_region_edges_round_up() {
        let desc = pyramid((4000, 4000), &[1, 2]);
        let sel = resolved("1,1,1999,1999", "999,", "0", (4000, 4000));
        let plan = plan_decode(&desc, &sel, false).unwrap();
        assert_eq!(plan.scale, 0.5);
        // 0.5, 999.5 ceil to 1 and 1000.
        assert_eq!(plan.decode_region, Rect::new(1, 1, 1000, 1000));
    }

    #[test]
    fn test_rotation_folded_when_decoder_rotates() {
        let desc = pyramid((1000, 2000), &[1]);
        let sel = resolved("full", "full", "90", (1000, 2000));
        let plan = plan_decode(&desc, &sel, true).unwrap();
        assert_eq!(plan.residual_rotation, 0);
        // 90-degree fold swaps the target edges.
        assert_eq!(plan.target, (2000, 1000));
        let plan_180 = plan_decode(&desc, &resolved("full", "full", "180", (1000, 2000)), true).unwrap();
        assert_eq!(plan_180.residual_rotation, 0);
        assert_eq!(plan_180.target, (1000, 2000));
    }

    #[test]
    fn test_rotation_residual_without_decoder_support() {
        let desc = pyramid((1000, 2000), &[1]);
        let sel = resolved("full", "full", "270", (1000, 2000));
        let plan = plan_decode(&desc, &sel, false).unwrap();
        assert_eq!(plan.residual_rotation, 270);
        assert_eq!(plan.target, (1000, 2000));
    }

    #[test]
    fn test_rejects_non_quarter_rotation() {
        let desc = pyramid((1000, 2000), &[1]);
        let mut sel = resolved("full", "full", "0", (1000, 2000));
        sel.rotation = Rotation::parse("45").unwrap();
        assert!(matches!(
            plan_decode(&desc, &sel, false),
            Err(SelectorError::InvalidParameters { segment: "rotation", .. })
        ));
    }

    #[test]
    fn test_mirror_carried_through() {
        let desc = pyramid((1000, 2000), &[1]);
        let mut sel = resolved("full", "full", "0", (1000, 2000));
        sel.rotation = Rotation::parse("!0").unwrap();
        let plan = plan_decode(&desc, &sel, false).unwrap();
        assert!(plan.mirror);
    }
}
