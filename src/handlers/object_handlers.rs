//! HTTP handlers for object operations.
//!
//! Thin adapters over `StorageService`: each handler extracts the request,
//! calls one storage operation, and wraps the result in the JSON envelope
//! `{success, message?, data}`. Error mapping lives in `AppError`.

use crate::{
    errors::AppError,
    models::object::ObjectSummary,
    services::storage_service::StorageService,
};
use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;

/// Request body for `POST /s3/upload`.
#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    pub bucket: String,
    pub key: String,
    /// Object payload, base64-encoded.
    pub content: String,
}

/// Standard success envelope for JSON responses.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub data: T,
}

impl<T> Envelope<T> {
    fn new(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data,
        }
    }

    fn with_message(data: T, message: &'static str) -> Self {
        Self {
            success: true,
            message: Some(message),
            data,
        }
    }
}

/// Listing payload for `GET /s3/list/{bucket}`.
#[derive(Debug, Serialize)]
pub struct BucketListing {
    pub bucket: String,
    pub files_count: usize,
    pub files: Vec<ObjectSummary>,
}

/// POST `/s3/upload` — store a base64 payload under (bucket, key).
pub async fn upload_object(
    State(service): State<StorageService>,
    Json(req): Json<UploadRequest>,
) -> Result<impl IntoResponse, AppError> {
    let uploaded = service
        .put_object(&req.bucket, &req.key, &req.content)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(Envelope::with_message(uploaded, "File uploaded successfully")),
    ))
}

/// GET `/s3/file/{bucket}/{*key}` — fetch an object as a base64 envelope.
pub async fn get_object(
    State(service): State<StorageService>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let stored = service.get_object(&bucket, &key).await?;
    Ok(Json(Envelope::new(stored)))
}

/// DELETE `/s3/file/{bucket}/{*key}` — delete an object.
pub async fn delete_object(
    State(service): State<StorageService>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let confirmation = service.delete_object(&bucket, &key).await?;
    Ok(Json(Envelope::with_message(
        confirmation,
        "File deleted successfully",
    )))
}

/// GET `/s3/list/{bucket}` — flat listing of a bucket's direct-child files.
pub async fn list_objects(
    State(service): State<StorageService>,
    Path(bucket): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let files = service.list_objects(&bucket).await?;
    Ok(Json(Envelope::new(BucketListing {
        files_count: files.len(),
        files,
        bucket,
    })))
}

/// GET `/s3/{bucket}/{*key}` — serve raw object bytes with an inferred
/// Content-Type header, streamed without a base64 round-trip.
pub async fn serve_object(
    State(service): State<StorageService>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let (summary, file) = service.get_object_reader(&bucket, &key).await?;
    let stream = ReaderStream::new(file);

    let mut response = Response::new(Body::from_stream(stream));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&summary.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from_str(&summary.size_bytes.to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("0")),
    );
    *response.status_mut() = StatusCode::OK;
    Ok(response)
}

/// Fallback for unknown routes — JSON 404 instead of an empty body.
pub async fn unknown_route() -> AppError {
    AppError::not_found("endpoint not found")
}
