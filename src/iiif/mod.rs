//! Derived-image request orchestration.
//!
//! The service wires the full request path together:
//!
//! ```text
//! identifier ──▶ access tier ──▶ object key ──▶ source cache ──▶ fast path?
//!                                                    │               │ yes: source bytes verbatim
//!                                                    ▼ no
//!                          descriptor ──▶ resolve selector ──▶ canonical form
//!                                                    │
//!                             derived cache hit? ────┴──▶ plan/decode/transform/encode
//! ```
//!
//! All caches are owned by the service instance and injected at construction;
//! there is no ambient static state.

use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::ImageError;
use crate::image::{decode_source, render, EncoderRegistry, ImageDescriptor};
use crate::resolver::{resolve, AccessTier, ImageIdentifier};
use crate::selector::ImageSelector;
use crate::store::{ByteCache, ObjectStore};

/// Descriptor cache entries kept per service (descriptors are tiny; this
/// mainly avoids re-decoding dimensions for hot identifiers).
const DESCRIPTOR_CACHE_ENTRIES: usize = 4096;

/// Fixed modification instant exposed for conditional-GET plumbing; the
/// real per-identifier lookup belongs to the metadata collaborator.
pub const MODIFICATION_EPOCH_MILLIS: i64 = -1;

// =============================================================================
// Access policy boundary
// =============================================================================

/// Access-decision collaborator boundary.
///
/// The production implementation (token validation, geo policy) lives
/// outside this crate; resolution only needs the resulting tier.
#[async_trait]
pub trait AccessPolicy: Send + Sync {
    async fn decide(&self, identifier: &ImageIdentifier) -> AccessTier;
}

/// Permissive default policy: everything is open.
#[derive(Debug, Clone, Default)]
pub struct OpenAccessPolicy;

#[async_trait]
impl AccessPolicy for OpenAccessPolicy {
    async fn decide(&self, _identifier: &ImageIdentifier) -> AccessTier {
        AccessTier::Open
    }
}

// =============================================================================
// Image response
// =============================================================================

/// Response from the image service.
#[derive(Debug, Clone)]
pub struct ImageResponse {
    /// Encoded output bytes
    pub data: Bytes,
    /// MIME type of the output
    pub mime: &'static str,
    /// Whether the bytes came from a cache (source or derived)
    pub cache_hit: bool,
    /// Canonical selector path, present when the request went through
    /// resolution (the fast path serves source bytes and skips it)
    pub canonical: Option<String>,
}

// =============================================================================
// Image service
// =============================================================================

/// Orchestrates single-image requests over the shared store and caches.
pub struct ImageService<S: ObjectStore> {
    store: Arc<S>,
    policy: Arc<dyn AccessPolicy>,
    /// Source object bytes, keyed by object key
    source_cache: ByteCache,
    /// Encoded derived images, keyed by identifier + canonical form
    derived_cache: ByteCache,
    /// Descriptors keyed by object key
    descriptors: Mutex<LruCache<String, ImageDescriptor>>,
    encoders: EncoderRegistry,
}

impl<S: ObjectStore> ImageService<S> {
    pub fn new(store: Arc<S>, policy: Arc<dyn AccessPolicy>, encoders: EncoderRegistry) -> Self {
        Self::with_cache_capacities(
            store,
            policy,
            encoders,
            crate::store::DEFAULT_BYTE_CACHE_CAPACITY,
            crate::store::DEFAULT_BYTE_CACHE_CAPACITY,
        )
    }

    pub fn with_cache_capacities(
        store: Arc<S>,
        policy: Arc<dyn AccessPolicy>,
        encoders: EncoderRegistry,
        source_capacity: usize,
        derived_capacity: usize,
    ) -> Self {
        Self {
            store,
            policy,
            source_cache: ByteCache::with_capacity(source_capacity),
            derived_cache: ByteCache::with_capacity(derived_capacity),
            descriptors: Mutex::new(LruCache::new(
                NonZeroUsize::new(DESCRIPTOR_CACHE_ENTRIES).unwrap(),
            )),
            encoders,
        }
    }

    /// Serve one derived-image request.
    pub async fn get_image(
        &self,
        identifier: &str,
        selector: &ImageSelector,
    ) -> Result<ImageResponse, ImageError> {
        let identifier = ImageIdentifier::parse(identifier)?;
        let tier = self.policy.decide(&identifier).await;
        let key = resolve(&identifier, tier);

        // Fast path: the request is equivalent to the original, so the
        // cached source bytes are served verbatim with no decode.
        if selector.matches_original(identifier.extension()) {
            let cached = self.source_cache.get_cached(key.as_str()).await;
            let cache_hit = cached.is_some();
            let data = match cached {
                Some(data) => data,
                None => self.source_cache.get(key.as_str(), self.store.as_ref()).await?,
            };
            debug!(identifier = %identifier.raw(), cache_hit, "fast path served source bytes");
            return Ok(ImageResponse {
                data,
                mime: selector.format.mime_type(),
                cache_hit,
                canonical: None,
            });
        }

        let source_bytes = self.source_cache.get(key.as_str(), self.store.as_ref()).await?;

        // Selector resolution needs native dimensions. The descriptor cache
        // keeps them per object key; the raster is still decoded per request
        // when a transform is required.
        let descriptor = self.descriptor_for_bytes(key.as_str(), &source_bytes).await?;
        let canonical = selector.canonical_form(descriptor.native())?;

        let derived_key = format!("{}/{}", identifier.raw(), canonical);
        if let Some(data) = self.derived_cache.get_cached(&derived_key).await {
            debug!(identifier = %identifier.raw(), canonical = %canonical, "derived cache hit");
            return Ok(ImageResponse {
                data,
                mime: selector.format.mime_type(),
                cache_hit: true,
                canonical: Some(canonical),
            });
        }

        let resolved = selector.resolve(descriptor.native())?;
        let source = decode_source(&source_bytes)?;
        let data = render(&source, &resolved, &self.encoders)?;

        self.derived_cache.insert(derived_key, data.clone()).await;

        Ok(ImageResponse {
            data,
            mime: selector.format.mime_type(),
            cache_hit: false,
            canonical: Some(canonical),
        })
    }

    /// Descriptor for an identifier, fetching and decoding as needed.
    pub async fn describe(&self, identifier: &str) -> Result<ImageDescriptor, ImageError> {
        let identifier = ImageIdentifier::parse(identifier)?;
        let tier = self.policy.decide(&identifier).await;
        let key = resolve(&identifier, tier);
        let bytes = self.source_cache.get(key.as_str(), self.store.as_ref()).await?;
        self.descriptor_for_bytes(key.as_str(), &bytes).await
    }

    /// Canonical form of a selector for an identifier, for the Link header.
    pub async fn canonical_form(
        &self,
        identifier: &str,
        selector: &ImageSelector,
    ) -> Result<String, ImageError> {
        let descriptor = self.describe(identifier).await?;
        Ok(selector.canonical_form(descriptor.native())?)
    }

    /// Modification instant for conditional GET.
    pub fn modification_millis(&self, _identifier: &str) -> i64 {
        MODIFICATION_EPOCH_MILLIS
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn policy(&self) -> &Arc<dyn AccessPolicy> {
        &self.policy
    }

    async fn descriptor_for_bytes(
        &self,
        key: &str,
        bytes: &Bytes,
    ) -> Result<ImageDescriptor, ImageError> {
        {
            let mut descriptors = self.descriptors.lock().await;
            if let Some(descriptor) = descriptors.get(key) {
                return Ok(descriptor.clone());
            }
        }
        let descriptor = decode_source(bytes)?.descriptor;
        let mut descriptors = self.descriptors.lock().await;
        descriptors.put(key.to_string(), descriptor.clone());
        Ok(descriptor)
    }
}

/// Map a pipeline error to the NotFound-for-response rule: transient store
/// failures that exhausted their retries are reported as missing resources.
pub fn reports_as_not_found(err: &ImageError) -> bool {
    matches!(
        err,
        ImageError::Io(crate::error::IoError::NotFound(_))
            | ImageError::Io(crate::error::IoError::S3(_))
            | ImageError::Io(crate::error::IoError::Connection(_))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SelectorError;
    use crate::store::test_support::MemoryStore;
    use image::codecs::jpeg::JpegEncoder;
    use image::{Rgb, RgbImage};

    const PAGE_ID: &str = "work123_I1KG01::I1KG010001.jpg";
    const PAGE_KEY: &str = "Works/d0/work123/images/work123-KG01/I1KG010001.jpg";

    fn test_jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 30])
        });
        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, 90)
            .encode_image(&img)
            .unwrap();
        buf
    }

    fn service_with_page(width: u32, height: u32) -> (ImageService<MemoryStore>, Vec<u8>) {
        let store = MemoryStore::new();
        let jpeg = test_jpeg(width, height);
        store.insert(PAGE_KEY, jpeg.clone());
        let service = ImageService::new(
            Arc::new(store),
            Arc::new(OpenAccessPolicy),
            EncoderRegistry::default(),
        );
        (service, jpeg)
    }

    fn selector(region: &str, size: &str, rotation: &str, qf: &str) -> ImageSelector {
        ImageSelector::parse(region, size, rotation, qf).unwrap()
    }

    #[tokio::test]
    async fn test_fast_path_serves_source_bytes_verbatim() {
        let (service, jpeg) = service_with_page(100, 80);
        let sel = selector("full", "full", "0", "default.jpg");

        let response = service.get_image(PAGE_ID, &sel).await.unwrap();
        assert_eq!(&response.data[..], &jpeg[..]);
        assert!(response.canonical.is_none());
        assert_eq!(response.mime, "image/jpeg");

        // Second request hits the source cache.
        let response = service.get_image(PAGE_ID, &sel).await.unwrap();
        assert!(response.cache_hit);
        assert_eq!(&response.data[..], &jpeg[..]);
    }

    #[tokio::test]
    async fn test_transform_path_produces_derived_bytes() {
        let (service, jpeg) = service_with_page(100, 80);
        let sel = selector("full", "50,", "0", "default.jpg");

        let response = service.get_image(PAGE_ID, &sel).await.unwrap();
        assert!(!response.cache_hit);
        assert_ne!(&response.data[..], &jpeg[..]);
        assert_eq!(response.canonical.as_deref(), Some("full/50,/0/default.jpg"));

        let decoded = image::load_from_memory(&response.data).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (50, 40));
    }

    #[tokio::test]
    async fn test_equivalent_requests_share_derived_cache_entry() {
        let (service, _) = service_with_page(100, 80);

        // Different surface syntax, same canonical form.
        let a = selector("full", "pct:50", "0", "default.jpg");
        let b = selector("0,0,100,80", "50,", "0.0", "native.jpg");

        let first = service.get_image(PAGE_ID, &a).await.unwrap();
        assert!(!first.cache_hit);
        let second = service.get_image(PAGE_ID, &b).await.unwrap();
        assert!(second.cache_hit);
        assert_eq!(first.data, second.data);
        assert_eq!(first.canonical, second.canonical);
    }

    #[tokio::test]
    async fn test_not_found_surfaces_and_is_not_poisoned() {
        let store = Arc::new(MemoryStore::new());
        let service = ImageService::new(
            store.clone(),
            Arc::new(OpenAccessPolicy),
            EncoderRegistry::default(),
        );
        let sel = selector("full", "full", "0", "default.jpg");

        let err = service.get_image(PAGE_ID, &sel).await.unwrap_err();
        assert!(reports_as_not_found(&err));

        // Upload arrives later; the retry succeeds with no invalidation.
        store.insert(PAGE_KEY, test_jpeg(10, 10));
        assert!(service.get_image(PAGE_ID, &sel).await.is_ok());
    }

    #[tokio::test]
    async fn test_restricted_tier_resolves_to_placeholder_key() {
        struct DenyAll;
        #[async_trait]
        impl AccessPolicy for DenyAll {
            async fn decide(&self, _identifier: &ImageIdentifier) -> AccessTier {
                AccessTier::Restricted
            }
        }

        let store = MemoryStore::new();
        store.insert("static/error.jpg", test_jpeg(8, 8));
        let service = ImageService::new(
            Arc::new(store),
            Arc::new(DenyAll),
            EncoderRegistry::default(),
        );

        let sel = selector("full", "full", "0", "default.jpg");
        let response = service.get_image(PAGE_ID, &sel).await.unwrap();
        // The restricted placeholder was served, not the real object.
        assert_eq!(
            image::load_from_memory(&response.data).unwrap().width(),
            8
        );
    }

    #[tokio::test]
    async fn test_describe_returns_native_dimensions() {
        let (service, _) = service_with_page(123, 77);
        let descriptor = service.describe(PAGE_ID).await.unwrap();
        assert_eq!(descriptor.native(), (123, 77));
    }

    #[tokio::test]
    async fn test_invalid_selector_is_surfaced() {
        let (service, _) = service_with_page(10, 10);
        // Region origin outside the image.
        let sel = selector("100,100,5,5", "full", "0", "default.jpg");
        let err = service.get_image(PAGE_ID, &sel).await.unwrap_err();
        assert!(matches!(
            err,
            ImageError::Selector(SelectorError::InvalidParameters { segment: "region", .. })
        ));
    }
}
