//! Image descriptors: per-source decode metadata.
//!
//! A descriptor is computed once when a source is first decoded and cached
//! alongside its bytes, so selector resolution and decode planning never
//! re-parse the source.

/// One available decode resolution of a source image.
///
/// Level 0 is the native resolution; deeper levels, when a source provides
/// them, are pre-encoded reductions the planner can decode instead of the
/// full image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLevel {
    pub width: u32,
    pub height: u32,
}

impl DecodeLevel {
    /// Scale factor of this level relative to the given native width.
    pub fn scale(&self, native_width: u32) -> f64 {
        self.width as f64 / native_width as f64
    }
}

/// Native dimensions and decode capabilities of a source image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageDescriptor {
    /// Native width in pixels
    pub width: u32,
    /// Native height in pixels
    pub height: u32,
    /// Available decode resolutions, level 0 first (= native)
    pub levels: Vec<DecodeLevel>,
    /// Whether the source supports tiled decoding
    pub tiled: bool,
    /// Source ICC color profile captured at decode, re-tagged onto output
    pub icc_profile: Option<Vec<u8>>,
}

impl ImageDescriptor {
    /// Descriptor for a single-resolution source (the common case for the
    /// plain JPEG/PNG page images this server stores).
    pub fn single_level(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            levels: vec![DecodeLevel { width, height }],
            tiled: false,
            icc_profile: None,
        }
    }

    pub fn with_icc_profile(mut self, icc: Option<Vec<u8>>) -> Self {
        self.icc_profile = icc;
        self
    }

    /// Native dimensions as a pair.
    pub fn native(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
