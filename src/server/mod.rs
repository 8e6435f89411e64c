//! Axum-based HTTP server: routes and request handlers.
//!
//! This layer is a thin boundary over the image service and archive builder;
//! the selector grammar it exposes is a bit-exact external contract.

mod handlers;
mod routes;

pub use handlers::{
    archive_file_handler, archive_status_handler, archive_trigger_handler, health_handler,
    image_handler, info_handler, AppState, ArchiveRequest, ArchiveStatusResponse, ErrorResponse,
    HealthResponse, InfoResponse,
};
pub use routes::{create_router, RouterConfig};
