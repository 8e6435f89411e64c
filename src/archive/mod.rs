//! Archive building: multi-page PDF and ZIP downloads.
//!
//! A build fans one task per page out to a bounded worker pool, then joins
//! the results strictly in input order into a pre-sized slot list, so the
//! container's page order always equals the requested page order no matter
//! which task finishes first. A failed page never aborts the build; its slot
//! is filled with a generated placeholder. Builds are an inherently blocking
//! batch operation: callers trigger them off the request path and poll
//! [`ArchiveBuilder::status`] until the output is retrievable.

mod pdf;
mod placeholder;
mod zip_container;

pub use pdf::{assemble_pdf, PdfPage};
pub use placeholder::{missing_page_message, placeholder_image};
pub use zip_container::{assemble_zip, ZipEntry};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::error::{ArchiveError, ImageError, SelectorError};
use crate::iiif::AccessPolicy;
use crate::image::decode_source;
use crate::resolver::{resolve, ImageIdentifier};
use crate::store::{ByteCache, ObjectStore};

/// Default worker pool size for page fetches.
pub const DEFAULT_ARCHIVE_WORKERS: usize = 50;

/// JPEG quality for rasters transcoded during PDF embedding.
const EMBED_JPEG_QUALITY: u8 = 85;

// =============================================================================
// Archive kinds and job state
// =============================================================================

/// The two archive container kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// Paginated document: one PDF page per image
    Pdf,
    /// Page collection: one ZIP entry per image
    Zip,
}

impl ArchiveKind {
    pub fn parse(token: &str) -> Result<Self, SelectorError> {
        match token {
            "pdf" => Ok(Self::Pdf),
            "zip" => Ok(Self::Zip),
            other => Err(SelectorError::UnsupportedFormat(format!(
                "unknown archive kind: {other}"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Zip => "zip",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Zip => "application/zip",
        }
    }
}

/// Lifecycle state of one archive job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    NotStarted,
    Running,
    Done,
}

/// Per-page payload produced by a worker task.
enum FetchedPage {
    Document { jpeg: Vec<u8>, width: u32, height: u32 },
    Collection(Bytes),
}

// =============================================================================
// ArchiveBuilder
// =============================================================================

/// Builds page archives over the shared object store.
pub struct ArchiveBuilder<S: ObjectStore> {
    store: Arc<S>,
    policy: Arc<dyn AccessPolicy>,
    jobs: Mutex<HashMap<String, JobStatus>>,
    outputs: ByteCache,
    workers: usize,
}

impl<S: ObjectStore + 'static> ArchiveBuilder<S> {
    pub fn new(store: Arc<S>, policy: Arc<dyn AccessPolicy>) -> Self {
        Self::with_workers(store, policy, DEFAULT_ARCHIVE_WORKERS)
    }

    /// Create a builder with a custom worker pool size.
    pub fn with_workers(store: Arc<S>, policy: Arc<dyn AccessPolicy>, workers: usize) -> Self {
        Self {
            store,
            policy,
            jobs: Mutex::new(HashMap::new()),
            outputs: ByteCache::new(),
            workers,
        }
    }

    /// Current status of the job for `output_key`.
    pub fn status(&self, output_key: &str) -> JobStatus {
        self.jobs
            .lock()
            .unwrap()
            .get(output_key)
            .copied()
            .unwrap_or(JobStatus::NotStarted)
    }

    /// Retrieve a finished archive.
    ///
    /// Archives are typically downloaded exactly once, so the output is
    /// removed on first retrieval to bound memory and the job resets to
    /// NotStarted; a re-trigger rebuilds it.
    pub async fn fetch(&self, output_key: &str) -> Option<Bytes> {
        let data = self.outputs.remove(output_key).await?;
        self.jobs.lock().unwrap().remove(output_key);
        Some(data)
    }

    /// Build an archive from an ordered page-identifier list.
    ///
    /// Marks the job Running before any work is dispatched so concurrent
    /// triggers for the same output key are rejected. Completes with the
    /// output persisted under `output_key` and the job Done; on a fatal
    /// worker-pool or assembly failure the job resets to NotStarted so a
    /// retry is possible.
    pub async fn build(
        &self,
        kind: ArchiveKind,
        pages: Vec<String>,
        output_key: &str,
    ) -> Result<(), ArchiveError> {
        if self.status(output_key) == JobStatus::Done
            && self.outputs.get_cached(output_key).await.is_some()
        {
            return Ok(());
        }
        {
            let mut jobs = self.jobs.lock().unwrap();
            if jobs.get(output_key) == Some(&JobStatus::Running) {
                return Err(ArchiveError::AlreadyRunning(output_key.to_string()));
            }
            jobs.insert(output_key.to_string(), JobStatus::Running);
        }

        match self.run_build(kind, &pages, output_key).await {
            Ok(()) => {
                self.jobs
                    .lock()
                    .unwrap()
                    .insert(output_key.to_string(), JobStatus::Done);
                info!(output_key, pages = pages.len(), kind = kind.as_str(), "archive built");
                Ok(())
            }
            Err(err) => {
                // Never leave a job stuck at Running.
                self.jobs.lock().unwrap().remove(output_key);
                Err(err)
            }
        }
    }

    async fn run_build(
        &self,
        kind: ArchiveKind,
        pages: &[String],
        output_key: &str,
    ) -> Result<(), ArchiveError> {
        if self.workers == 0 {
            return Err(ArchiveError::FatalBuild {
                message: "worker pool cannot be provisioned with zero workers".to_string(),
            });
        }
        let semaphore = Arc::new(Semaphore::new(self.workers));

        // Fan out: one task per page, results joined by input index below.
        let mut handles = Vec::with_capacity(pages.len());
        for identifier in pages {
            let semaphore = semaphore.clone();
            let store = self.store.clone();
            let policy = self.policy.clone();
            let identifier = identifier.clone();
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                fetch_page(store.as_ref(), policy.as_ref(), &identifier, kind).await
            }));
        }

        // Fan in, strictly in index order.
        let mut slots: Vec<Option<FetchedPage>> = Vec::with_capacity(pages.len());
        for handle in handles {
            slots.push(handle.await.unwrap_or(None));
        }

        let data = match kind {
            ArchiveKind::Pdf => {
                let mut doc_pages = Vec::with_capacity(slots.len());
                for (idx, slot) in slots.into_iter().enumerate() {
                    doc_pages.push(match slot {
                        Some(FetchedPage::Document { jpeg, width, height }) => PdfPage {
                            jpeg,
                            width,
                            height,
                            message: None,
                        },
                        _ => placeholder_pdf_page(idx + 1),
                    });
                }
                assemble_pdf(&doc_pages)?
            }
            ArchiveKind::Zip => {
                let mut entries = Vec::with_capacity(slots.len());
                for (idx, (slot, identifier)) in slots.into_iter().zip(pages).enumerate() {
                    let name = entry_name(identifier, idx + 1);
                    entries.push(match slot {
                        Some(FetchedPage::Collection(data)) => ZipEntry {
                            name,
                            data: data.to_vec(),
                        },
                        _ => placeholder_zip_entry(name, idx + 1),
                    });
                }
                assemble_zip(&entries)?
            }
        };

        self.outputs.insert(output_key.to_string(), Bytes::from(data)).await;
        Ok(())
    }
}

/// Fetch and prepare one page. Any failure yields `None` and the page's slot
/// becomes a placeholder; one bad page never aborts the build.
async fn fetch_page<S: ObjectStore>(
    store: &S,
    policy: &dyn AccessPolicy,
    identifier: &str,
    kind: ArchiveKind,
) -> Option<FetchedPage> {
    let parsed = match ImageIdentifier::parse(identifier) {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!(identifier, error = %err, "skipping malformed page identifier");
            return None;
        }
    };
    let tier = policy.decide(&parsed).await;
    let key = resolve(&parsed, tier);

    let bytes = match store.get(key.as_str()).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(identifier, key = %key, error = %err, "page fetch failed");
            return None;
        }
    };

    match kind {
        // Page collections embed the source bytes untouched.
        ArchiveKind::Zip => Some(FetchedPage::Collection(bytes)),
        // Paginated documents need the pixel dimensions and a JPEG raster.
        ArchiveKind::Pdf => match prepare_document_page(&bytes) {
            Ok((jpeg, width, height)) => Some(FetchedPage::Document { jpeg, width, height }),
            Err(err) => {
                warn!(identifier, error = %err, "page decode failed");
                None
            }
        },
    }
}

/// Decode a page for embedding: dimensions always, transcode to JPEG only
/// when the source is not already one.
fn prepare_document_page(bytes: &Bytes) -> Result<(Vec<u8>, u32, u32), ImageError> {
    let source = decode_source(bytes)?;
    let (width, height) = source.descriptor.native();

    if bytes.starts_with(&[0xFF, 0xD8]) {
        return Ok((bytes.to_vec(), width, height));
    }

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, EMBED_JPEG_QUALITY)
        .encode_image(&source.raster)
        .map_err(|e| ImageError::Encode {
            message: e.to_string(),
        })?;
    Ok((jpeg, width, height))
}

fn placeholder_pdf_page(page_number: usize) -> PdfPage {
    let message = missing_page_message(page_number);
    let raster = placeholder_image(&message);
    let mut jpeg = Vec::new();
    // Encoding a freshly generated RGB raster cannot fail for lack of space
    // or color support; an empty page body would still assemble.
    if let Err(err) = JpegEncoder::new_with_quality(&mut jpeg, EMBED_JPEG_QUALITY).encode_image(&raster) {
        warn!(error = %err, "placeholder encode failed");
    }
    PdfPage {
        jpeg,
        width: raster.width(),
        height: raster.height(),
        message: Some(message),
    }
}

fn placeholder_zip_entry(name: String, page_number: usize) -> ZipEntry {
    let raster = placeholder_image(&missing_page_message(page_number));
    let mut data = Vec::new();
    if let Err(err) = raster.write_to(
        &mut std::io::Cursor::new(&mut data),
        image::ImageFormat::Png,
    ) {
        warn!(error = %err, "placeholder encode failed");
    }
    ZipEntry { name, data }
}

/// Entry name for a page: its original filename, with a positional fallback
/// for identifiers that do not parse.
fn entry_name(identifier: &str, page_number: usize) -> String {
    ImageIdentifier::parse(identifier)
        .map(|parsed| parsed.filename().to_string())
        .unwrap_or_else(|_| format!("page-{page_number:04}"))
}

// =============================================================================
// Page-range expansion
// =============================================================================

/// Expand a volume plus first-page filename into an ordered identifier list
/// for an inclusive page range.
///
/// Page filenames carry a zero-padded 4-digit sequence number before the
/// extension: `I1KG010001.jpg`, `I1KG010002.jpg`, ... The range `3..=5` over
/// that stem yields identifiers for pages 3, 4 and 5.
pub fn page_identifiers(
    volume: &str,
    first_filename: &str,
    start: u32,
    end: u32,
) -> Result<Vec<String>, SelectorError> {
    if start == 0 || end < start {
        return Err(SelectorError::invalid(
            "pages",
            format!("invalid page range {start}-{end}"),
        ));
    }
    let (stem, extension) = first_filename
        .rsplit_once('.')
        .ok_or_else(|| SelectorError::invalid("pages", "filename has no extension"))?;
    if stem.len() < 4 || !stem[stem.len() - 4..].chars().all(|c| c.is_ascii_digit()) {
        return Err(SelectorError::invalid(
            "pages",
            format!("filename {first_filename} has no 4-digit page number"),
        ));
    }
    let root = &stem[..stem.len() - 4];

    Ok((start..=end)
        .map(|page| format!("{volume}::{root}{page:04}.{extension}"))
        .collect())
}
