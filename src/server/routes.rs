//! Router configuration.
//!
//! # Route Structure
//!
//! ```text
//! /health                                                    - Health check
//! /archives/{kind}/{output}                                  - Trigger build (POST)
//! /archives/{kind}/{output}/status                           - Poll build
//! /archives/{kind}/{output}/file                             - Download archive
//! /{identifier}/info.json                                    - Image descriptor
//! /{identifier}/{region}/{size}/{rotation}/{quality}.{format} - Derived image
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use http::header::CONTENT_TYPE;
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    archive_file_handler, archive_status_handler, archive_trigger_handler, health_handler,
    image_handler, info_handler, AppState,
};
use crate::archive::ArchiveBuilder;
use crate::iiif::ImageService;
use crate::store::ObjectStore;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Clone)]
pub struct RouterConfig {
    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Cache-Control max-age in seconds for image responses
    pub cache_max_age: u32,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl RouterConfig {
    pub fn new() -> Self {
        Self {
            cors_origins: None,
            cache_max_age: 3600,
            enable_tracing: true,
        }
    }

    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    pub fn with_cache_max_age(mut self, seconds: u32) -> Self {
        self.cache_max_age = seconds;
        self
    }

    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the application router.
pub fn create_router<S>(
    image_service: Arc<ImageService<S>>,
    archives: Arc<ArchiveBuilder<S>>,
    config: RouterConfig,
) -> Router
where
    S: ObjectStore + 'static,
{
    let state = AppState {
        image_service,
        archives,
        cache_max_age: config.cache_max_age,
    };

    let cors = build_cors_layer(&config);

    // The bare-identifier image routes go last so the static prefixes win.
    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/archives/{kind}/{output}", post(archive_trigger_handler::<S>))
        .route(
            "/archives/{kind}/{output}/status",
            get(archive_status_handler::<S>),
        )
        .route("/archives/{kind}/{output}/file", get(archive_file_handler::<S>))
        .route("/{identifier}/info.json", get(info_handler::<S>))
        .route(
            "/{identifier}/{region}/{size}/{rotation}/{quality_format}",
            get(image_handler::<S>),
        )
        .with_state(state)
        .layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::HEAD, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(86400));

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_router_config_defaults() {
        let config = RouterConfig::new();
        assert!(config.cors_origins.is_none());
        assert_eq!(config.cache_max_age, 3600);
        assert!(config.enable_tracing);
    }

    #[test]
    fn test_router_config_builder() {
        let config = RouterConfig::new()
            .with_cors_origins(vec!["https://viewer.example.org".to_string()])
            .with_cache_max_age(7200)
            .with_tracing(false);
        assert_eq!(
            config.cors_origins,
            Some(vec!["https://viewer.example.org".to_string()])
        );
        assert_eq!(config.cache_max_age, 7200);
        assert!(!config.enable_tracing);
    }

    #[test]
    fn test_build_cors_layer_variants() {
        let _any = build_cors_layer(&RouterConfig::new());
        let _specific = build_cors_layer(
            &RouterConfig::new().with_cors_origins(vec!["https://a.example".to_string()]),
        );
        let _none = build_cors_layer(&RouterConfig::new().with_cors_origins(vec![]));
    }
}
