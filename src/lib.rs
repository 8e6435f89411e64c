//! # folio-streamer
//!
//! A derived-image server for scanned archival works stored in S3-compatible
//! object storage.
//!
//! Images are requested through a standardized 5-segment selector grammar
//! (`{identifier}/{region}/{size}/{rotation}/{quality}.{format}`); the server
//! resolves the selector against the source image, decodes the cheapest
//! sufficient resolution, applies the fixed transform set (crop, resize,
//! quarter-turn rotation, mirror, quality conversion) and encodes to the
//! requested format. Multi-page PDF and ZIP archives are assembled from page
//! ranges over a bounded worker pool.
//!
//! ## Architecture
//!
//! - [`resolver`] - Pure identifier-to-object-key derivation (sharded layout)
//! - [`selector`] - Request grammar parsing, resolution, canonical form
//! - [`image`] - Decode planning, transform pipeline, encoder registry
//! - [`store`] - S3 object store and the single-flight byte cache
//! - [`iiif`] - Request orchestration and the derived-image cache
//! - [`archive`] - PDF/ZIP builds: bounded fan-out, index-ordered fan-in
//! - [`server`] - Axum routes and handlers
//! - [`config`] - CLI and environment configuration

pub mod archive;
pub mod config;
pub mod error;
pub mod iiif;
pub mod image;
pub mod resolver;
pub mod selector;
pub mod server;
pub mod store;

// Re-export commonly used types
pub use archive::{ArchiveBuilder, ArchiveKind, JobStatus, DEFAULT_ARCHIVE_WORKERS};
pub use config::Config;
pub use error::{ArchiveError, ImageError, IoError, SelectorError};
pub use iiif::{AccessPolicy, ImageResponse, ImageService, OpenAccessPolicy};
pub use self::image::{
    plan_decode, transform, DecodePlan, EncoderRegistry, ImageDescriptor, DEFAULT_JPEG_QUALITY,
};
pub use resolver::{resolve, AccessTier, ImageIdentifier, ObjectKey};
pub use selector::{ImageSelector, OutputFormat, Quality, Rect, RegionSpec, Rotation, SizeSpec};
pub use server::{create_router, AppState, RouterConfig};
pub use store::{create_s3_client, ByteCache, ObjectStore, S3ObjectStore};
