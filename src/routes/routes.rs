//! Defines routes for the simulated S3 API.
//!
//! ## Structure
//! - `POST   /s3/upload`              — upload a base64 payload (JSON body)
//! - `GET    /s3/file/{bucket}/{*key}`— fetch an object as a base64 envelope
//! - `DELETE /s3/file/{bucket}/{*key}`— delete an object
//! - `GET    /s3/list/{bucket}`       — flat listing of a bucket
//! - `GET    /s3/{bucket}/{*key}`     — direct access: raw bytes + MIME header
//! - `GET    /healthz`, `GET /readyz` — liveness and readiness probes
//!
//! The wildcard `*key` allows nested keys like `photos/2025/img.jpg`. The
//! static `file` and `list` segments take precedence over the `{bucket}`
//! capture, so those prefixes cannot be addressed as buckets via the direct
//! access route.

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        object_handlers::{
            delete_object, get_object, list_objects, serve_object, unknown_route, upload_object,
        },
    },
    services::storage_service::StorageService,
};
use axum::{
    Router,
    routing::{get, post},
};

/// Build and return the router for all simulator routes.
///
/// The router carries shared state (`StorageService`) to all handlers.
pub fn routes() -> Router<StorageService> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // object operations
        .route("/s3/upload", post(upload_object))
        .route("/s3/file/{bucket}/{*key}", get(get_object).delete(delete_object))
        .route("/s3/list/{bucket}", get(list_objects))
        // direct file access (simulated S3 URL)
        .route("/s3/{bucket}/{*key}", get(serve_object))
        .fallback(unknown_route)
}
