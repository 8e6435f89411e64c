//! Identifier resolution: mapping opaque image identifiers to backing-store keys.
//!
//! An identifier names one image instance inside an archival work, e.g.
//! `work123_I1KG01::I1KG010001.jpg` (volume + page filename), or a static
//! resource such as `static::error.png`. Resolution derives the
//! content-addressed object key deterministically from the identifier alone,
//! so results are safe to cache and the function performs no I/O.
//!
//! Key layout for open-access content:
//!
//! ```text
//! Works/{shard}/{work}/images/{work}-{imageGroup}/{filename}
//! ```
//!
//! where `shard` is the first two hex characters of the SHA-256 digest of the
//! work id, distributing objects across backing-store prefixes.

use sha2::{Digest, Sha256};

use crate::error::SelectorError;

/// Prefix marking identifiers that name static resources rather than
/// archival pages. Static resources bypass resolution and access checks.
pub const STATIC_PREFIX: &str = "static::";

/// Key served in place of restricted content, so non-open backing paths are
/// never exposed to clients.
pub const RESTRICTED_KEY_STEM: &str = "static/error";

/// Number of hex characters used for the path shard.
const SHARD_LEN: usize = 2;

// =============================================================================
// Access tier
// =============================================================================

/// Access tier of the work an identifier belongs to.
///
/// The tier is determined by the access-decision collaborator from work
/// metadata; the resolver only consumes it so that key derivation stays pure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessTier {
    /// Openly accessible: resolve to the real backing-store key.
    Open,
    /// Anything else: resolve to the restricted placeholder key.
    Restricted,
}

// =============================================================================
// ImageIdentifier
// =============================================================================

/// A parsed image identifier.
///
/// Identifiers are opaque strings of the form `{logical_id}::{filename}`.
/// The logical id carries the work id and image group
/// (`{work}_{imageGroup}`); the filename names the page image inside that
/// group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageIdentifier {
    raw: String,
    logical_id: String,
    filename: String,
    is_static: bool,
}

impl ImageIdentifier {
    /// Parse an identifier string.
    ///
    /// Returns an error when the identifier has no `::` separator or either
    /// side is empty.
    pub fn parse(raw: &str) -> Result<Self, SelectorError> {
        if let Some(rest) = raw.strip_prefix(STATIC_PREFIX) {
            if rest.is_empty() {
                return Err(SelectorError::invalid("identifier", "empty static resource"));
            }
            return Ok(Self {
                raw: raw.to_string(),
                logical_id: "static".to_string(),
                filename: rest.to_string(),
                is_static: true,
            });
        }

        let (logical_id, filename) = raw
            .split_once("::")
            .ok_or_else(|| SelectorError::invalid("identifier", format!("missing '::' in {raw}")))?;

        if logical_id.is_empty() || filename.is_empty() {
            return Err(SelectorError::invalid(
                "identifier",
                format!("empty component in {raw}"),
            ));
        }

        Ok(Self {
            raw: raw.to_string(),
            logical_id: logical_id.to_string(),
            filename: filename.to_string(),
            is_static: false,
        })
    }

    /// The identifier exactly as received.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The logical id (volume) part, `{work}_{imageGroup}`.
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    /// The page filename part.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// The filename extension including the dot, e.g. `.jpg`.
    pub fn extension(&self) -> &str {
        match self.filename.rfind('.') {
            Some(idx) => &self.filename[idx..],
            None => "",
        }
    }

    /// Whether this identifier names a static resource.
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// The work id: the logical id up to the last `_`.
    pub fn work_id(&self) -> &str {
        match self.logical_id.rfind('_') {
            Some(idx) => &self.logical_id[..idx],
            None => &self.logical_id,
        }
    }

    /// The image-group suffix: the logical id after the last `_`.
    pub fn image_group(&self) -> &str {
        match self.logical_id.rfind('_') {
            Some(idx) => &self.logical_id[idx + 1..],
            None => &self.logical_id,
        }
    }
}

// =============================================================================
// ObjectKey
// =============================================================================

/// A backing-store object key, derived deterministically from an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey(String);

impl ObjectKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Resolution
// =============================================================================

/// Resolve an identifier to its backing-store key.
///
/// Pure function of the identifier and access tier: no I/O, no clock, so
/// callers may cache results indefinitely.
///
/// Static identifiers resolve to their resource path directly. Open-tier
/// identifiers resolve into the sharded `Works/` layout. Any other tier
/// resolves to the fixed restricted placeholder so the real key is never
/// exposed.
pub fn resolve(identifier: &ImageIdentifier, tier: AccessTier) -> ObjectKey {
    if identifier.is_static() {
        return ObjectKey::new(format!("static/{}", identifier.filename()));
    }

    if tier != AccessTier::Open {
        return ObjectKey::new(format!("{}{}", RESTRICTED_KEY_STEM, identifier.extension()));
    }

    let work = identifier.work_id();
    let group = normalize_image_group(identifier.image_group());

    ObjectKey::new(format!(
        "Works/{}/{}/images/{}-{}/{}",
        shard_for(work),
        work,
        work,
        group,
        identifier.filename()
    ))
}

/// Derive the shard prefix for a work id: the first two hex characters of
/// its SHA-256 digest.
pub fn shard_for(work_id: &str) -> String {
    let digest = Sha256::digest(work_id.as_bytes());
    hex::encode(digest)[..SHARD_LEN].to_string()
}

/// Strip the legacy image-group prefix when present.
///
/// Legacy group ids prefix the 4-character group code with `I` and a run of
/// digits (`I1234` -> `1234`, `I1KG01` -> `KG01`). Long-form ids such as
/// `I1KG15042` are already canonical and pass through unchanged.
fn normalize_image_group(group: &str) -> &str {
    const CODE_LEN: usize = 4;
    if group.len() <= CODE_LEN {
        return group;
    }
    let (prefix, code) = group.split_at(group.len() - CODE_LEN);
    let mut chars = prefix.chars();
    if chars.next() == Some('I') && chars.all(|c| c.is_ascii_digit()) {
        code
    } else {
        group
    }
}
