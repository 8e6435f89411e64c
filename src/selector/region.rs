//! Region segment of the request grammar.
//!
//! Grammar: `full` | `square` | `x,y,w,h` | `pct:x,y,w,h`
//!
//! Regions are expressed relative to the native (full-resolution) image and
//! resolve to an absolute pixel rectangle clipped to the image bounds.

use crate::error::SelectorError;

/// An absolute pixel rectangle in native-image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether this rectangle covers the whole image of the given size.
    pub fn is_full(&self, native: (u32, u32)) -> bool {
        self.x == 0 && self.y == 0 && self.width == native.0 && self.height == native.1
    }
}

/// Parsed region segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RegionSpec {
    /// The complete image
    Full,
    /// Centered square with side `min(width, height)`
    Square,
    /// Absolute pixel rectangle
    Abs { x: u32, y: u32, w: u32, h: u32 },
    /// Rectangle in percent of the native dimensions
    Pct { x: f64, y: f64, w: f64, h: f64 },
}

impl RegionSpec {
    /// Parse the region segment.
    pub fn parse(segment: &str) -> Result<Self, SelectorError> {
        match segment {
            "full" => Ok(Self::Full),
            "square" => Ok(Self::Square),
            _ => {
                if let Some(rest) = segment.strip_prefix("pct:") {
                    let [x, y, w, h] = parse_four(rest, "region")?;
                    if w <= 0.0 || h <= 0.0 {
                        return Err(SelectorError::invalid(
                            "region",
                            format!("empty percent region in {segment}"),
                        ));
                    }
                    Ok(Self::Pct { x, y, w, h })
                } else {
                    let [x, y, w, h] = parse_four(segment, "region")?;
                    if x.fract() != 0.0 || y.fract() != 0.0 || w.fract() != 0.0 || h.fract() != 0.0
                    {
                        return Err(SelectorError::invalid(
                            "region",
                            format!("pixel region must be integral: {segment}"),
                        ));
                    }
                    if w < 1.0 || h < 1.0 {
                        return Err(SelectorError::invalid(
                            "region",
                            format!("empty pixel region in {segment}"),
                        ));
                    }
                    Ok(Self::Abs {
                        x: x as u32,
                        y: y as u32,
                        w: w as u32,
                        h: h as u32,
                    })
                }
            }
        }
    }

    /// Resolve against the native image dimensions to an absolute pixel
    /// rectangle, clipped to the image bounds.
    pub fn resolve(&self, native: (u32, u32)) -> Result<Rect, SelectorError> {
        let (nw, nh) = native;
        let rect = match *self {
            Self::Full => Rect::new(0, 0, nw, nh),
            Self::Square => {
                let side = nw.min(nh);
                Rect::new((nw - side) / 2, (nh - side) / 2, side, side)
            }
            Self::Abs { x, y, w, h } => Rect::new(x, y, w, h),
            Self::Pct { x, y, w, h } => Rect::new(
                (nw as f64 * x / 100.0).floor() as u32,
                (nh as f64 * y / 100.0).floor() as u32,
                (nw as f64 * w / 100.0).round() as u32,
                (nh as f64 * h / 100.0).round() as u32,
            ),
        };

        // Clip to the image bounds.
        if rect.x >= nw || rect.y >= nh {
            return Err(SelectorError::invalid(
                "region",
                format!("region origin ({},{}) outside {}x{} image", rect.x, rect.y, nw, nh),
            ));
        }
        let width = rect.width.min(nw - rect.x);
        let height = rect.height.min(nh - rect.y);
        if width == 0 || height == 0 {
            return Err(SelectorError::invalid("region", "region is empty after clipping"));
        }

        Ok(Rect::new(rect.x, rect.y, width, height))
    }

    /// Canonical serialization of the resolved region: `full` when it covers
    /// the whole image, absolute pixels otherwise.
    pub fn canonical(&self, native: (u32, u32)) -> Result<String, SelectorError> {
        let rect = self.resolve(native)?;
        if rect.is_full(native) {
            Ok("full".to_string())
        } else {
            Ok(format!("{},{},{},{}", rect.x, rect.y, rect.width, rect.height))
        }
    }
}

impl std::fmt::Display for RegionSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full => f.write_str("full"),
            Self::Square => f.write_str("square"),
            Self::Abs { x, y, w, h } => write!(f, "{x},{y},{w},{h}"),
            Self::Pct { x, y, w, h } => write!(f, "pct:{x},{y},{w},{h}"),
        }
    }
}

fn parse_four(s: &str, segment: &'static str) -> Result<[f64; 4], SelectorError> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 4 {
        return Err(SelectorError::invalid(
            segment,
            format!("expected 4 comma-separated values, got {}", parts.len()),
        ));
    }
    let mut out = [0.0; 4];
    for (i, part) in parts.iter().enumerate() {
        out[i] = part.parse::<f64>().map_err(|_| {
            SelectorError::invalid(segment, format!("not a number: {part}"))
        })?;
        if out[i] < 0.0 || !out[i].is_finite() {
            return Err(SelectorError::invalid(segment, format!("negative value: {part}")));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_and_square() {
        assert_eq!(RegionSpec::parse("full").unwrap(), RegionSpec::Full);
        assert_eq!(RegionSpec::parse("square").unwrap(), RegionSpec::Square);
    }

    #[test]
    fn test_parse_abs() {
        assert_eq!(
            RegionSpec::parse("10,20,300,400").unwrap(),
            RegionSpec::Abs {
                x: 10,
                y: 20,
                w: 300,
                h: 400
            }
        );
    }

    #[test]
    fn test_parse_pct() {
        assert_eq!(
            RegionSpec::parse("pct:10,10,50,50").unwrap(),
            RegionSpec::Pct {
                x: 10.0,
                y: 10.0,
                w: 50.0,
                h: 50.0
            }
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(RegionSpec::parse("10,20,300").is_err());
        assert!(RegionSpec::parse("a,b,c,d").is_err());
        assert!(RegionSpec::parse("10,20,0,400").is_err());
        assert!(RegionSpec::parse("pct:10,10,0,50").is_err());
        assert!(RegionSpec::parse("-1,0,10,10").is_err());
        assert!(RegionSpec::parse("1.5,0,10,10").is_err());
    }

    #[test]
    fn test_resolve_pct_spec_example() {
        // pct:10,10,50,50 against 1000x2000 resolves to (100,200,500,1000).
        let region = RegionSpec::parse("pct:10,10,50,50").unwrap();
        let rect = region.resolve((1000, 2000)).unwrap();
        assert_eq!(rect, Rect::new(100, 200, 500, 1000));
    }

    #[test]
    fn test_resolve_square_centered() {
        let rect = RegionSpec::Square.resolve((1000, 2000)).unwrap();
        assert_eq!(rect, Rect::new(0, 500, 1000, 1000));

        let rect = RegionSpec::Square.resolve((2000, 1000)).unwrap();
        assert_eq!(rect, Rect::new(500, 0, 1000, 1000));
    }

    #[test]
    fn test_resolve_clips_to_bounds() {
        let region = RegionSpec::parse("800,900,500,500").unwrap();
        let rect = region.resolve((1000, 1000)).unwrap();
        assert_eq!(rect, Rect::new(800, 900, 200, 100));
    }

    #[test]
    fn test_resolve_origin_outside_bounds() {
        let region = RegionSpec::parse("1000,0,10,10").unwrap();
        assert!(region.resolve((1000, 1000)).is_err());
    }

    #[test]
    fn test_full_equals_explicit_full_rect() {
        // resolve("full") == resolve("0,0,w,h") for all (w,h).
        for native in [(640, 480), (1000, 2000), (1, 1)] {
            let explicit = RegionSpec::Abs {
                x: 0,
                y: 0,
                w: native.0,
                h: native.1,
            };
            assert_eq!(
                RegionSpec::Full.resolve(native).unwrap(),
                explicit.resolve(native).unwrap()
            );
            assert_eq!(
                RegionSpec::Full.canonical(native).unwrap(),
                explicit.canonical(native).unwrap()
            );
        }
    }

    #[test]
    fn test_canonical_forms() {
        assert_eq!(RegionSpec::Full.canonical((100, 100)).unwrap(), "full");
        assert_eq!(
            RegionSpec::parse("pct:0,0,100,100").unwrap().canonical((100, 100)).unwrap(),
            "full"
        );
        assert_eq!(
            RegionSpec::parse("pct:10,10,50,50").unwrap().canonical((1000, 2000)).unwrap(),
            "100,200,500,1000"
        );
        assert_eq!(RegionSpec::Square.canonical((100, 100)).unwrap(), "full");
    }
}
