//! Rotation segment of the request grammar.
//!
//! Grammar: `[!]degrees` where degrees is a decimal in [0,360] and the `!`
//! prefix requests a horizontal mirror before rotation. 360 normalizes to 0
//! so stored rotations always fall in [0,360).

use crate::error::SelectorError;

/// Parsed rotation segment: degrees plus mirror flag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rotation {
    degrees: f64,
    mirror: bool,
}

impl Rotation {
    /// The identity rotation.
    pub const NONE: Rotation = Rotation {
        degrees: 0.0,
        mirror: false,
    };

    pub fn new(degrees: f64, mirror: bool) -> Result<Self, SelectorError> {
        if !degrees.is_finite() || !(0.0..=360.0).contains(&degrees) {
            return Err(SelectorError::invalid(
                "rotation",
                format!("rotation must be between 0 and 360, got {degrees}"),
            ));
        }
        Ok(Self {
            degrees: degrees % 360.0,
            mirror,
        })
    }

    /// Parse the rotation segment.
    pub fn parse(segment: &str) -> Result<Self, SelectorError> {
        let (mirror, body) = match segment.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, segment),
        };
        if body.is_empty() {
            return Err(SelectorError::invalid("rotation", "missing rotation degrees"));
        }
        let degrees: f64 = body
            .parse()
            .map_err(|_| SelectorError::invalid("rotation", format!("not a number: {body}")))?;
        Self::new(degrees, mirror)
    }

    pub fn degrees(&self) -> f64 {
        self.degrees
    }

    pub fn mirror(&self) -> bool {
        self.mirror
    }

    /// Whether this is the identity (no rotation, no mirror).
    pub fn is_identity(&self) -> bool {
        self.degrees == 0.0 && !self.mirror
    }

    /// Whether the rotation is a multiple of 90 degrees. The transform
    /// pipeline only supports quarter turns.
    pub fn is_quarter_turn(&self) -> bool {
        self.degrees % 90.0 == 0.0
    }

    /// The rotation as whole degrees in {0, 90, 180, 270}.
    ///
    /// Fails with InvalidParameters for in-range rotations the fixed
    /// transform set cannot produce.
    pub fn quarter_degrees(&self) -> Result<u16, SelectorError> {
        if !self.is_quarter_turn() {
            return Err(SelectorError::invalid(
                "rotation",
                format!("rotation must be a multiple of 90 degrees, got {}", self.degrees),
            ));
        }
        Ok(self.degrees as u16)
    }

    /// Canonical serialization: degrees with no trailing zeros, `!` prefix
    /// when mirrored.
    pub fn canonical(&self) -> String {
        self.to_string()
    }
}

impl std::fmt::Display for Rotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.mirror {
            write!(f, "!{}", self.degrees)
        } else {
            write!(f, "{}", self.degrees)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain() {
        let rot = Rotation::parse("90").unwrap();
        assert_eq!(rot.degrees(), 90.0);
        assert!(!rot.mirror());
    }

    #[test]
    fn test_parse_mirrored() {
        let rot = Rotation::parse("!180").unwrap();
        assert_eq!(rot.degrees(), 180.0);
        assert!(rot.mirror());
    }

    #[test]
    fn test_parse_decimal() {
        let rot = Rotation::parse("22.5").unwrap();
        assert_eq!(rot.degrees(), 22.5);
        assert!(!rot.is_quarter_turn());
        assert!(rot.quarter_degrees().is_err());
    }

    #[test]
    fn test_360_normalizes_to_zero() {
        let rot = Rotation::parse("360").unwrap();
        assert_eq!(rot.degrees(), 0.0);
        assert!(rot.is_identity());
    }

    #[test]
    fn test_parse_rejects_out_of_range() {
        assert!(Rotation::parse("-10").is_err());
        assert!(Rotation::parse("360.5").is_err());
        assert!(Rotation::parse("720").is_err());
        assert!(Rotation::parse("").is_err());
        assert!(Rotation::parse("!").is_err());
        assert!(Rotation::parse("ninety").is_err());
    }

    #[test]
    fn test_quarter_degrees() {
        assert_eq!(Rotation::parse("0").unwrap().quarter_degrees().unwrap(), 0);
        assert_eq!(Rotation::parse("90").unwrap().quarter_degrees().unwrap(), 90);
        assert_eq!(Rotation::parse("180").unwrap().quarter_degrees().unwrap(), 180);
        assert_eq!(Rotation::parse("270").unwrap().quarter_degrees().unwrap(), 270);
    }

    #[test]
    fn test_canonical_trims_trailing_zeros() {
        assert_eq!(Rotation::parse("90").unwrap().canonical(), "90");
        assert_eq!(Rotation::parse("90.0").unwrap().canonical(), "90");
        assert_eq!(Rotation::parse("!90").unwrap().canonical(), "!90");
        assert_eq!(Rotation::parse("22.5").unwrap().canonical(), "22.5");
        assert_eq!(Rotation::parse("0").unwrap().canonical(), "0");
    }

    #[test]
    fn test_mirror_alone_is_not_identity() {
        assert!(!Rotation::parse("!0").unwrap().is_identity());
        assert!(Rotation::parse("0").unwrap().is_identity());
    }
}
