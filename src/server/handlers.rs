//! HTTP request handlers for the image and archive APIs.
//!
//! # Endpoints
//!
//! - `GET /{identifier}/{region}/{size}/{rotation}/{quality}.{format}` - Derived image
//! - `GET /{identifier}/info.json` - Image descriptor
//! - `POST /archives/{kind}/{output}` - Trigger an archive build
//! - `GET /archives/{kind}/{output}/status` - Poll a build
//! - `GET /archives/{kind}/{output}/file` - Download a finished archive
//! - `GET /health` - Health check

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::archive::{page_identifiers, ArchiveBuilder, ArchiveKind, JobStatus};
use crate::error::{ArchiveError, ImageError, IoError, SelectorError};
use crate::iiif::ImageService;
use crate::selector::ImageSelector;
use crate::store::ObjectStore;

// =============================================================================
// Application State
// =============================================================================

/// Shared application state passed to all handlers.
pub struct AppState<S: ObjectStore> {
    pub image_service: Arc<ImageService<S>>,
    pub archives: Arc<ArchiveBuilder<S>>,
    /// Cache-Control max-age for image responses, in seconds
    pub cache_max_age: u32,
}

impl<S: ObjectStore> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            image_service: Arc::clone(&self.image_service),
            archives: Arc::clone(&self.archives),
            cache_max_age: self.cache_max_age,
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g. "not_found", "invalid_parameters")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Image descriptor response for `info.json`.
#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub identifier: String,
    pub width: u32,
    pub height: u32,
    pub sizes: Vec<SizeEntry>,
    pub tiled: bool,
}

#[derive(Debug, Serialize)]
pub struct SizeEntry {
    pub width: u32,
    pub height: u32,
}

/// Body of an archive trigger request: either an explicit ordered page list
/// or a volume page range to expand.
#[derive(Debug, Deserialize)]
pub struct ArchiveRequest {
    #[serde(default)]
    pub pages: Option<Vec<String>>,
    #[serde(default)]
    pub volume: Option<String>,
    #[serde(default)]
    pub first_filename: Option<String>,
    #[serde(default)]
    pub start: Option<u32>,
    #[serde(default)]
    pub end: Option<u32>,
}

/// Archive trigger/status response.
#[derive(Debug, Serialize)]
pub struct ArchiveStatusResponse {
    pub output: String,
    /// "not-started", "running" or "done"
    pub status: String,
}

fn status_token(status: JobStatus) -> &'static str {
    match status {
        JobStatus::NotStarted => "not-started",
        JobStatus::Running => "running",
        JobStatus::Done => "done",
    }
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Convert ImageError to an HTTP response.
///
/// Transient store failures have already exhausted their retries by the time
/// they reach a handler, and are reported as NotFound.
impl IntoResponse for ImageError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            ImageError::Selector(SelectorError::InvalidParameters { .. }) => {
                (StatusCode::BAD_REQUEST, "invalid_parameters", self.to_string())
            }
            ImageError::Selector(SelectorError::UnsupportedFormat(_)) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, "unsupported_format", self.to_string())
            }
            ImageError::Io(IoError::NotFound(key)) => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("Resource not found: {key}"),
            ),
            ImageError::Io(err) => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("Resource unavailable: {err}"),
            ),
            ImageError::Decode { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "decode_error", self.to_string())
            }
            ImageError::Encode { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "encode_error", self.to_string())
            }
        };

        if status.is_server_error() {
            error!(error_type, status = status.as_u16(), "server error: {message}");
        } else if status == StatusCode::NOT_FOUND {
            debug!(error_type, status = status.as_u16(), "not found: {message}");
        } else {
            warn!(error_type, status = status.as_u16(), "client error: {message}");
        }

        let body = ErrorResponse::with_status(error_type, message, status);
        (status, Json(body)).into_response()
    }
}

/// Convert ArchiveError to an HTTP response.
impl IntoResponse for ArchiveError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            ArchiveError::FatalBuild { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "build_failed"),
            ArchiveError::AlreadyRunning(_) => (StatusCode::CONFLICT, "already_running"),
        };
        let message = self.to_string();
        if status.is_server_error() {
            error!(error_type, status = status.as_u16(), "server error: {message}");
        }
        let body = ErrorResponse::with_status(error_type, message, status);
        (status, Json(body)).into_response()
    }
}

/// Wrapper so handlers can use `?` on pipeline errors.
pub struct HandlerError(pub ImageError);

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        self.0.into_response()
    }
}

impl From<ImageError> for HandlerError {
    fn from(err: ImageError) -> Self {
        HandlerError(err)
    }
}

impl From<SelectorError> for HandlerError {
    fn from(err: SelectorError) -> Self {
        HandlerError(ImageError::Selector(err))
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Serve one derived image.
///
/// # Response headers
///
/// - `Content-Type` - output MIME type
/// - `Cache-Control: public, max-age={cache_max_age}`
/// - `Content-Disposition: inline` with a flattened filename
/// - `Link: <...>;rel="canonical"` when the request went through resolution
pub async fn image_handler<S: ObjectStore>(
    State(state): State<AppState<S>>,
    Path((identifier, region, size, rotation, quality_format)): Path<(
        String,
        String,
        String,
        String,
        String,
    )>,
    headers: HeaderMap,
) -> Result<Response, HandlerError> {
    let selector = ImageSelector::parse(&region, &size, &rotation, &quality_format)?;
    let response = state.image_service.get_image(&identifier, &selector).await?;

    let disposition = format!(
        "inline; filename={}",
        format!("{identifier}_{region}_{size}_{rotation}_{quality_format}").replace(',', "_")
    );

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, response.mime)
        .header(
            header::CACHE_CONTROL,
            format!("public, max-age={}", state.cache_max_age),
        )
        .header(header::CONTENT_DISPOSITION, disposition)
        .header("X-Image-Cache-Hit", response.cache_hit.to_string());

    // Canonical link lets clients and caches collapse equivalent requests.
    if let Some(ref canonical) = response.canonical {
        let base = request_base(&headers);
        builder = builder.header(
            header::LINK,
            format!("<{base}/{identifier}/{canonical}>;rel=\"canonical\""),
        );
    }

    Ok(builder.body(axum::body::Body::from(response.data)).unwrap())
}

/// Serve the image descriptor as JSON.
pub async fn info_handler<S: ObjectStore>(
    State(state): State<AppState<S>>,
    Path(identifier): Path<String>,
) -> Result<Json<InfoResponse>, HandlerError> {
    let descriptor = state.image_service.describe(&identifier).await?;
    Ok(Json(InfoResponse {
        identifier,
        width: descriptor.width,
        height: descriptor.height,
        sizes: descriptor
            .levels
            .iter()
            .map(|level| SizeEntry {
                width: level.width,
                height: level.height,
            })
            .collect(),
        tiled: descriptor.tiled,
    }))
}

/// Trigger an archive build.
///
/// The build runs as a background job; the response reports the job status
/// for polling. Re-triggering a running job answers 202 without dispatching
/// duplicate work.
pub async fn archive_trigger_handler<S: ObjectStore + 'static>(
    State(state): State<AppState<S>>,
    Path((kind, output)): Path<(String, String)>,
    Json(request): Json<ArchiveRequest>,
) -> Result<Response, HandlerError> {
    let kind = ArchiveKind::parse(&kind)?;
    let pages = expand_pages(request)?;

    let archives = state.archives.clone();
    let output_key = output.clone();
    tokio::spawn(async move {
        if let Err(err) = archives.build(kind, pages, &output_key).await {
            match err {
                ArchiveError::AlreadyRunning(_) => {}
                err => error!(output_key = %output_key, error = %err, "archive build failed"),
            }
        }
    });

    let body = ArchiveStatusResponse {
        status: status_token(JobStatus::Running).to_string(),
        output,
    };
    Ok((StatusCode::ACCEPTED, Json(body)).into_response())
}

/// Poll an archive build.
pub async fn archive_status_handler<S: ObjectStore + 'static>(
    State(state): State<AppState<S>>,
    Path((kind, output)): Path<(String, String)>,
) -> Result<Json<ArchiveStatusResponse>, HandlerError> {
    ArchiveKind::parse(&kind)?;
    let status = state.archives.status(&output);
    Ok(Json(ArchiveStatusResponse {
        status: status_token(status).to_string(),
        output,
    }))
}

/// Download a finished archive.
pub async fn archive_file_handler<S: ObjectStore + 'static>(
    State(state): State<AppState<S>>,
    Path((kind, output)): Path<(String, String)>,
) -> Result<Response, HandlerError> {
    let kind = ArchiveKind::parse(&kind)?;
    match state.archives.fetch(&output).await {
        Some(data) => Ok(Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, kind.mime_type())
            .header(
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={output}"),
            )
            .body(axum::body::Body::from(data))
            .unwrap()),
        None => {
            let status = state.archives.status(&output);
            let body = ErrorResponse::with_status(
                "not_ready",
                format!("archive {output} is {}", status_token(status)),
                StatusCode::NOT_FOUND,
            );
            Ok((StatusCode::NOT_FOUND, Json(body)).into_response())
        }
    }
}

/// Health check.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Resolve an archive request body to the ordered page-identifier list.
fn expand_pages(request: ArchiveRequest) -> Result<Vec<String>, SelectorError> {
    if let Some(pages) = request.pages {
        if pages.is_empty() {
            return Err(SelectorError::invalid("pages", "empty page list"));
        }
        return Ok(pages);
    }
    match (request.volume, request.first_filename, request.start, request.end) {
        (Some(volume), Some(first), Some(start), Some(end)) => {
            page_identifiers(&volume, &first, start, end)
        }
        _ => Err(SelectorError::invalid(
            "pages",
            "provide either pages[] or volume/first_filename/start/end",
        )),
    }
}

/// Base URL for link headers, honoring reverse-proxy forwarding headers.
fn request_base(headers: &HeaderMap) -> String {
    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("http");
    let host = headers
        .get("x-forwarded-host")
        .or_else(|| headers.get(header::HOST))
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");
    format!("{proto}://{host}")
}
