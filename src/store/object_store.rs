//! Backing object store abstraction and its S3 implementation.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use bytes::Bytes;
use tokio::time::{sleep, Duration};
use tracing::warn;

use crate::error::IoError;

/// Retries for transient store failures. NotFound is never retried.
const TRANSIENT_RETRIES: u32 = 2;

/// Delay before the first retry; doubles per attempt.
const RETRY_BASE_DELAY_MS: u64 = 100;

/// Trait for fetching whole objects from the backing store.
///
/// This abstraction keeps the cache, image service and archive builder
/// independent of the concrete storage backend and lets tests substitute
/// counting stubs.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch the complete object stored under `key`.
    async fn get(&self, key: &str) -> Result<Bytes, IoError>;
}

/// S3-backed implementation of [`ObjectStore`].
///
/// Fetches objects with GetObject and maps missing keys to
/// [`IoError::NotFound`]. Transient failures are retried a bounded number of
/// times with doubling backoff; once retries exhaust the error surfaces and
/// the caller treats it as NotFound for response purposes.
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn get_once(&self, key: &str) -> Result<Bytes, IoError> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let is_not_found = e
                    .as_service_error()
                    .map(|se| se.is_no_such_key())
                    .unwrap_or(false)
                    || e.raw_response()
                        .map(|r| r.status().as_u16() == 404)
                        .unwrap_or(false);

                if is_not_found {
                    IoError::NotFound(format!("s3://{}/{}", self.bucket, key))
                } else {
                    IoError::S3(e.to_string())
                }
            })?;

        resp.body
            .collect()
            .await
            .map(|data| data.into_bytes())
            .map_err(|e| IoError::Connection(e.to_string()))
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get(&self, key: &str) -> Result<Bytes, IoError> {
        let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);
        let mut attempt = 0;
        loop {
            match self.get_once(key).await {
                Ok(bytes) => return Ok(bytes),
                Err(IoError::NotFound(key)) => return Err(IoError::NotFound(key)),
                Err(err) if attempt < TRANSIENT_RETRIES => {
                    attempt += 1;
                    warn!(key, attempt, error = %err, "transient store failure, retrying");
                    sleep(delay).await;
                    delay *= 2;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Create an S3 client with optional custom endpoint and region.
///
/// Use a custom endpoint for S3-compatible services like MinIO; path-style
/// addressing is forced in that case.
pub async fn create_s3_client(endpoint_url: Option<&str>, region: &str) -> Client {
    let region = aws_config::Region::new(region.to_string());
    let mut config_loader =
        aws_config::defaults(aws_config::BehaviorVersion::latest()).region(region);

    if let Some(endpoint) = endpoint_url {
        config_loader = config_loader.endpoint_url(endpoint);
    }

    let sdk_config = config_loader.load().await;

    let s3_config = if endpoint_url.is_some() {
        aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build()
    } else {
        aws_sdk_s3::config::Builder::from(&sdk_config).build()
    };

    Client::from_conf(s3_config)
}
