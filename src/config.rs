//! Configuration management.
//!
//! All options can be set via command-line arguments or environment
//! variables with the `FOLIO_` prefix:
//!
//! - `FOLIO_HOST` - Server bind address (default: 0.0.0.0)
//! - `FOLIO_PORT` - Server port (default: 3000)
//! - `FOLIO_S3_BUCKET` - S3 bucket with the image archive (required)
//! - `FOLIO_S3_ENDPOINT` - Custom S3 endpoint for S3-compatible services
//! - `FOLIO_S3_REGION` - AWS region (default: us-east-1)
//! - `FOLIO_CACHE_SOURCE_MB` - Source byte cache size in MB (default: 500)
//! - `FOLIO_CACHE_DERIVED_MB` - Derived image cache size in MB (default: 500)
//! - `FOLIO_ARCHIVE_WORKERS` - Archive worker pool size (default: 50)
//! - `FOLIO_JPEG_QUALITY` - JPEG encoder quality (default: 75)
//! - `FOLIO_CACHE_MAX_AGE` - HTTP cache max-age seconds (default: 3600)

use clap::Parser;

use crate::archive::DEFAULT_ARCHIVE_WORKERS;
use crate::image::DEFAULT_JPEG_QUALITY;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default AWS region.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default byte-cache sizes in megabytes.
pub const DEFAULT_CACHE_MB: usize = 500;

/// Default HTTP cache max-age in seconds (1 hour).
pub const DEFAULT_CACHE_MAX_AGE: u32 = 3600;

// =============================================================================
// CLI Arguments
// =============================================================================

/// folio-streamer - A derived-image server for scanned archival works.
///
/// Serves region/size/rotation/quality image requests over works stored in
/// S3 or S3-compatible storage, and builds PDF/ZIP page archives.
#[derive(Parser, Debug, Clone)]
#[command(name = "folio-streamer")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "FOLIO_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "FOLIO_PORT")]
    pub port: u16,

    // =========================================================================
    // S3 Configuration
    // =========================================================================
    /// S3 bucket containing the image archive.
    #[arg(long, env = "FOLIO_S3_BUCKET")]
    pub s3_bucket: String,

    /// Custom S3 endpoint URL for S3-compatible services (MinIO, etc.).
    #[arg(long, env = "FOLIO_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// AWS region for S3.
    #[arg(long, default_value = DEFAULT_REGION, env = "FOLIO_S3_REGION")]
    pub s3_region: String,

    // =========================================================================
    // Cache Configuration
    // =========================================================================
    /// Source byte cache capacity in megabytes.
    #[arg(long, default_value_t = DEFAULT_CACHE_MB, env = "FOLIO_CACHE_SOURCE_MB")]
    pub cache_source_mb: usize,

    /// Derived image cache capacity in megabytes.
    #[arg(long, default_value_t = DEFAULT_CACHE_MB, env = "FOLIO_CACHE_DERIVED_MB")]
    pub cache_derived_mb: usize,

    /// HTTP Cache-Control max-age in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "FOLIO_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    // =========================================================================
    // Pipeline Configuration
    // =========================================================================
    /// JPEG encoder quality (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, env = "FOLIO_JPEG_QUALITY")]
    pub jpeg_quality: u8,

    /// Worker pool size for archive page fetches.
    #[arg(long, default_value_t = DEFAULT_ARCHIVE_WORKERS, env = "FOLIO_ARCHIVE_WORKERS")]
    pub archive_workers: usize,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated). Unset allows any origin.
    #[arg(long, env = "FOLIO_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.s3_bucket.is_empty() {
            return Err("S3 bucket is required. Set --s3-bucket or FOLIO_S3_BUCKET".to_string());
        }
        if self.cache_source_mb == 0 || self.cache_derived_mb == 0 {
            return Err("cache sizes must be greater than 0".to_string());
        }
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err("jpeg_quality must be between 1 and 100".to_string());
        }
        if self.archive_workers == 0 {
            return Err("archive_workers must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Source cache capacity in bytes.
    pub fn source_cache_bytes(&self) -> usize {
        self.cache_source_mb * 1024 * 1024
    }

    /// Derived cache capacity in bytes.
    pub fn derived_cache_bytes(&self) -> usize {
        self.cache_derived_mb * 1024 * 1024
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            s3_bucket: "archive-bucket".to_string(),
            s3_endpoint: None,
            s3_region: "us-west-2".to_string(),
            cache_source_mb: 100,
            cache_derived_mb: 100,
            cache_max_age: 7200,
            jpeg_quality: 75,
            archive_workers: 50,
            cors_origins: None,
            verbose: false,
            no_tracing: false,
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn test_empty_bucket() {
        let mut config = test_config();
        config.s3_bucket = String::new();
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("bucket"));
    }

    #[test]
    fn test_invalid_cache_sizes() {
        let mut config = test_config();
        config.cache_source_mb = 0;
        assert!(config.validate().is_err());

        let mut config = test_config();
        config.cache_derived_mb = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_jpeg_quality() {
        let mut config = test_config();
        config.jpeg_quality = 0;
        assert!(config.validate().is_err());

        let mut config = test_config();
        config.jpeg_quality = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = test_config();
        config.archive_workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bind_address() {
        assert_eq!(test_config().bind_address(), "127.0.0.1:8080");
    }

    #[test]
    fn test_cache_byte_conversion() {
        let config = test_config();
        assert_eq!(config.source_cache_bytes(), 100 * 1024 * 1024);
    }
}
