//! folio-streamer - A derived-image server for scanned archival works.
//!
//! This binary wires the storage, service and archive components together
//! and starts the HTTP server.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use folio_streamer::{
    config::Config,
    iiif::{ImageService, OpenAccessPolicy},
    server::{create_router, RouterConfig},
    store::{create_s3_client, S3ObjectStore},
    ArchiveBuilder, EncoderRegistry,
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Configuration:");
    info!("  S3 bucket: {}", config.s3_bucket);
    if let Some(ref endpoint) = config.s3_endpoint {
        info!("  S3 endpoint: {}", endpoint);
    }
    info!("  S3 region: {}", config.s3_region);
    info!(
        "  Cache: {}MB source, {}MB derived",
        config.cache_source_mb, config.cache_derived_mb
    );
    info!("  Archive workers: {}", config.archive_workers);

    let s3_client = create_s3_client(config.s3_endpoint.as_deref(), &config.s3_region).await;
    let store = Arc::new(S3ObjectStore::new(s3_client, config.s3_bucket.clone()));

    // The access-decision collaborator is pluggable; the built-in default
    // treats every work as open.
    let policy = Arc::new(OpenAccessPolicy);

    let image_service = Arc::new(ImageService::with_cache_capacities(
        store.clone(),
        policy.clone(),
        EncoderRegistry::new(config.jpeg_quality),
        config.source_cache_bytes(),
        config.derived_cache_bytes(),
    ));
    let archives = Arc::new(ArchiveBuilder::with_workers(
        store,
        policy,
        config.archive_workers,
    ));

    let router_config = build_router_config(&config);
    let router = create_router(image_service, archives, router_config);

    let addr = config.bind_address();
    info!("Server listening on http://{}", addr);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "folio_streamer=debug,tower_http=debug"
    } else {
        "folio_streamer=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application Config.
fn build_router_config(config: &Config) -> RouterConfig {
    let mut router_config = RouterConfig::new()
        .with_cache_max_age(config.cache_max_age)
        .with_tracing(!config.no_tracing);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
}
