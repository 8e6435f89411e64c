//! Request selector: the region/size/rotation/quality.format tuple.
//!
//! The five path segments after the identifier form a bit-exact external
//! contract:
//!
//! ```text
//! {identifier}/{region}/{size}/{rotation}/{quality}.{format}
//! ```
//!
//! This module parses the grammar, resolves relative specs against the
//! native image dimensions, and re-serializes the resolved selector in its
//! canonical (most specific, redundancy-free) form. Equivalent requests
//! share one canonical form, which is used both for cache-key normalization
//! and for the canonical `Link` header sent to clients.

mod region;
mod rotation;
mod size;

pub use region::{Rect, RegionSpec};
pub use rotation::Rotation;
pub use size::SizeSpec;

use crate::error::SelectorError;

// =============================================================================
// Quality
// =============================================================================

/// Requested output quality (color treatment).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    /// Source color treatment (served as full color)
    Default,
    /// Full color
    Color,
    /// 8-bit grayscale
    Gray,
    /// Bilevel black and white
    Bitonal,
}

impl Quality {
    /// Parse the quality token. `native` is a legacy alias of `default`.
    pub fn parse(token: &str) -> Result<Self, SelectorError> {
        match token {
            "default" | "native" => Ok(Self::Default),
            "color" => Ok(Self::Color),
            "gray" => Ok(Self::Gray),
            "bitonal" => Ok(Self::Bitonal),
            other => Err(SelectorError::UnsupportedFormat(format!(
                "unknown quality: {other}"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Color => "color",
            Self::Gray => "gray",
            Self::Bitonal => "bitonal",
        }
    }
}

// =============================================================================
// Output format
// =============================================================================

/// Requested output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Jpg,
    Png,
    Webp,
    Tif,
    Gif,
}

impl OutputFormat {
    /// Parse the format token.
    pub fn parse(token: &str) -> Result<Self, SelectorError> {
        match token {
            "jpg" => Ok(Self::Jpg),
            "png" => Ok(Self::Png),
            "webp" => Ok(Self::Webp),
            "tif" => Ok(Self::Tif),
            "gif" => Ok(Self::Gif),
            other => Err(SelectorError::UnsupportedFormat(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Tif => "tif",
            Self::Gif => "gif",
        }
    }

    /// MIME type for HTTP responses.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Tif => "image/tiff",
            Self::Gif => "image/gif",
        }
    }

    /// Whether a source file extension belongs to this format family.
    ///
    /// Used by the fast path to decide if the cached source bytes can be
    /// served without transcoding (`.jpg`/`.jpeg` are the same family, as
    /// are `.tif`/`.tiff`).
    pub fn matches_extension(&self, extension: &str) -> bool {
        let ext = extension.trim_start_matches('.').to_ascii_lowercase();
        match self {
            Self::Jpg => ext == "jpg" || ext == "jpeg",
            Self::Png => ext == "png",
            Self::Webp => ext == "webp",
            Self::Tif => ext == "tif" || ext == "tiff",
            Self::Gif => ext == "gif",
        }
    }
}

// =============================================================================
// ImageSelector
// =============================================================================

/// A parsed image request selector.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageSelector {
    pub region: RegionSpec,
    pub size: SizeSpec,
    pub rotation: Rotation,
    pub quality: Quality,
    pub format: OutputFormat,
}

/// A selector resolved against concrete native dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSelector {
    /// Absolute source rectangle in native coordinates
    pub region: Rect,
    /// Absolute output dimensions
    pub target: (u32, u32),
    pub rotation: Rotation,
    pub quality: Quality,
    pub format: OutputFormat,
}

impl ImageSelector {
    /// Parse the four path segments following the identifier. The last
    /// segment carries both quality and format as `{quality}.{format}`.
    pub fn parse(
        region: &str,
        size: &str,
        rotation: &str,
        quality_format: &str,
    ) -> Result<Self, SelectorError> {
        let (quality, format) = quality_format.split_once('.').ok_or_else(|| {
            SelectorError::invalid(
                "quality",
                format!("expected quality.format, got {quality_format}"),
            )
        })?;

        Ok(Self {
            region: RegionSpec::parse(region)?,
            size: SizeSpec::parse(size)?,
            rotation: Rotation::parse(rotation)?,
            quality: Quality::parse(quality)?,
            format: OutputFormat::parse(format)?,
        })
    }

    /// Resolve against native image dimensions.
    pub fn resolve(&self, native: (u32, u32)) -> Result<ResolvedSelector, SelectorError> {
        let region = self.region.resolve(native)?;
        let target = self.size.resolve((region.width, region.height))?;
        Ok(ResolvedSelector {
            region,
            target,
            rotation: self.rotation,
            quality: self.quality,
            format: self.format,
        })
    }

    /// Canonical serialization of the resolved selector:
    /// `{region}/{size}/{rotation}/{quality}.{format}` with percentages
    /// collapsed to absolute pixels and redundancy removed.
    pub fn canonical_form(&self, native: (u32, u32)) -> Result<String, SelectorError> {
        let region = self.region.canonical(native)?;
        let rect = self.region.resolve(native)?;
        let size = self.size.canonical((rect.width, rect.height))?;
        Ok(format!(
            "{}/{}/{}/{}.{}",
            region,
            size,
            self.rotation.canonical(),
            self.quality.as_str(),
            self.format.as_str()
        ))
    }

    /// The mandatory fast-path rule: whether this request is equivalent to
    /// the original image, so cached source bytes can be served verbatim
    /// without decode or transform.
    pub fn matches_original(&self, source_extension: &str) -> bool {
        self.format.matches_extension(source_extension)
            && self.quality == Quality::Default
            && self.rotation.is_identity()
            && self.region == RegionSpec::Full
            && matches!(self.size, SizeSpec::Full | SizeSpec::Max)
    }
}

impl std::fmt::Display for ImageSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}.{}",
            self.region,
            self.size,
            self.rotation,
            self.quality.as_str(),
            self.format.as_str()
        )
    }
}
