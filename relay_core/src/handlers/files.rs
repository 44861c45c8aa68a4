use axum::{
    body::Body,
    extract::{multipart::MultipartRejection, Multipart, Path, State},
    http::{header, HeaderValue, StatusCode},
    response::Response,
    Json,
};
use tracing::{error, info};

use crate::{
    error::{AppError, Result},
    models::{CheckResponse, UploadResponse},
    storage::content_disposition,
    AppState,
};

pub async fn upload_file(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>> {
    let mut multipart = multipart?;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| AppError::BadRequest("Missing filename".to_string()))?;
        let content_type = field.content_type().map(str::to_string);

        let entry = state
            .transfers
            .upload(&filename, content_type.as_deref(), field)
            .await?;

        return Ok(Json(entry.into()));
    }

    Err(AppError::BadRequest("No file found in request".to_string()))
}

pub async fn check_file(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<CheckResponse>> {
    let entry = state.transfers.check(&code)?;
    Ok(Json(CheckResponse::new(entry, state.transfers.retention())))
}

pub async fn download_file(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Response> {
    let download = state.transfers.download(&code).await?;
    let entry = &download.entry;

    let content_type = HeaderValue::from_str(&entry.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let disposition = HeaderValue::from_str(&content_disposition(&entry.original_name))
        .map_err(|e| {
            error!(code = %entry.code, filename = %entry.original_name, "Invalid Content-Disposition: {}", e);
            AppError::InternalServerError
        })?;

    info!(code = %entry.code, size = entry.size, "Starting download");

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, entry.size.to_string())
        .header(header::CONTENT_DISPOSITION, disposition)
        .header(header::CACHE_CONTROL, "no-store")
        .body(Body::from_stream(download.body))
        .map_err(|e| {
            error!(code = %code, "Failed to build download response: {}", e);
            AppError::InternalServerError
        })
}
