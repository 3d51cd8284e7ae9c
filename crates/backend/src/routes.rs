use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::api::handlers;

/// Uploads can be whole cartography extracts, so the body limit is generous.
const MAX_BODY_BYTES: usize = 200 * 1024 * 1024;

/// All routes of the worker.
pub fn configure_routes() -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/routes", get(handlers::system::routes))
        .route(
            "/import",
            post(handlers::u101_import_spatial::import)
                .fallback(handlers::u101_import_spatial::method_not_allowed),
        )
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}
