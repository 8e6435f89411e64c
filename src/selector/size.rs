//! Size segment of the request grammar.
//!
//! Grammar: `full` | `max` | `w,` | `,h` | `w,h` | `pct:n` | `!w,h`
//!
//! Sizes resolve against the dimensions of the cropped region. Resolution
//! never produces a target larger than the region at 100% scale: requests
//! that would upscale are clamped to the region's own dimensions.

use crate::error::SelectorError;

/// Parsed size segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SizeSpec {
    /// The region at full scale
    Full,
    /// Alias of `full` under the no-upscaling policy
    Max,
    /// Scale to exact width, height follows the aspect ratio
    Width(u32),
    /// Scale to exact height, width follows the aspect ratio
    Height(u32),
    /// Scale both edges by a percentage
    Pct(f64),
    /// Exact (possibly distorted) width and height
    Exact { w: u32, h: u32 },
    /// Best fit inside `w`x`h`, preserving the aspect ratio
    BestFit { w: u32, h: u32 },
}

impl SizeSpec {
    /// Parse the size segment.
    pub fn parse(segment: &str) -> Result<Self, SelectorError> {
        match segment {
            "full" => return Ok(Self::Full),
            "max" => return Ok(Self::Max),
            _ => {}
        }

        if let Some(rest) = segment.strip_prefix("pct:") {
            let pct: f64 = rest
                .parse()
                .map_err(|_| SelectorError::invalid("size", format!("not a number: {rest}")))?;
            if !pct.is_finite() || pct <= 0.0 {
                return Err(SelectorError::invalid(
                    "size",
                    format!("percentage must be positive: {rest}"),
                ));
            }
            return Ok(Self::Pct(pct));
        }

        let (best_fit, body) = match segment.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, segment),
        };

        let (w_str, h_str) = body
            .split_once(',')
            .ok_or_else(|| SelectorError::invalid("size", format!("malformed size: {segment}")))?;

        let w = parse_dim(w_str)?;
        let h = parse_dim(h_str)?;

        match (best_fit, w, h) {
            (true, Some(w), Some(h)) => Ok(Self::BestFit { w, h }),
            (true, _, _) => Err(SelectorError::invalid(
                "size",
                format!("best-fit size needs both edges: {segment}"),
            )),
            (false, Some(w), Some(h)) => Ok(Self::Exact { w, h }),
            (false, Some(w), None) => Ok(Self::Width(w)),
            (false, None, Some(h)) => Ok(Self::Height(h)),
            (false, None, None) => {
                Err(SelectorError::invalid("size", format!("malformed size: {segment}")))
            }
        }
    }

    /// Resolve to absolute target dimensions against the cropped region.
    ///
    /// Aspect-preserving modes derive the dependent edge from the region's
    /// aspect ratio; every mode clamps so the target never exceeds the region
    /// at 100% scale.
    pub fn resolve(&self, region: (u32, u32)) -> Result<(u32, u32), SelectorError> {
        let (rw, rh) = region;
        let (tw, th) = match *self {
            Self::Full | Self::Max => (rw, rh),
            Self::Width(w) => {
                let w = w.min(rw);
                (w, scale_edge(rh, w, rw))
            }
            Self::Height(h) => {
                let h = h.min(rh);
                (scale_edge(rw, h, rh), h)
            }
            Self::Pct(pct) => {
                let pct = pct.min(100.0);
                (
                    (rw as f64 * pct / 100.0).round() as u32,
                    (rh as f64 * pct / 100.0).round() as u32,
                )
            }
            Self::Exact { w, h } => (w.min(rw), h.min(rh)),
            Self::BestFit { w, h } => {
                let scale = (w as f64 / rw as f64).min(h as f64 / rh as f64).min(1.0);
                (
                    (rw as f64 * scale).round() as u32,
                    (rh as f64 * scale).round() as u32,
                )
            }
        };

        if tw == 0 || th == 0 {
            return Err(SelectorError::invalid("size", "target size is empty"));
        }
        Ok((tw, th))
    }

    /// Canonical serialization of the resolved size: `full` at 100% scale,
    /// `w,` when the height follows the aspect ratio, `w,h` otherwise.
    pub fn canonical(&self, region: (u32, u32)) -> Result<String, SelectorError> {
        let (tw, th) = self.resolve(region)?;
        if (tw, th) == region {
            return Ok("full".to_string());
        }
        if th == scale_edge(region.1, tw, region.0) {
            Ok(format!("{tw},"))
        } else {
            Ok(format!("{tw},{th}"))
        }
    }
}

impl std::fmt::Display for SizeSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full => f.write_str("full"),
            Self::Max => f.write_str("max"),
            Self::Width(w) => write!(f, "{w},"),
            Self::Height(h) => write!(f, ",{h}"),
            Self::Pct(pct) => write!(f, "pct:{pct}"),
            Self::Exact { w, h } => write!(f, "{w},{h}"),
            Self::BestFit { w, h } => write!(f, "!{w},{h}"),
        }
    }
}

/// Derive the dependent edge: `other * edge / base`, rounded, at least 1px.
fn scale_edge(other: u32, edge: u32, base: u32) -> u32 {
    ((other as f64 * edge as f64 / base as f64).round() as u32).max(1)
}

fn parse_dim(s: &str) -> Result<Option<u32>, SelectorError> {
    if s.is_empty() {
        return Ok(None);
    }
    let value: u32 = s
        .parse()
        .map_err(|_| SelectorError::invalid("size", format!("not a pixel count: {s}")))?;
    if value == 0 {
        return Err(SelectorError::invalid("size", "size edge must be positive"));
    }
    Ok(Some(value))
}
