use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, State, multipart::MultipartError},
    http::{HeaderMap, StatusCode, header},
    response::{Html, Response},
};
use bytes::Bytes;
use tracing::{error, warn};

use crate::{
    error::AppError,
    models::*,
    state::AppState,
    utils::{inline_disposition, request_base_url, resolve_mime_type},
};

/// Name used when the multipart part carries no filename.
const DEFAULT_FILE_NAME: &str = "upload";

/// Upload an image using multipart/form-data (field `file`).
pub async fn upload_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut file_data: Option<Bytes> = None;
    let mut original_filename: Option<String> = None;
    let mut declared_type: Option<String> = None;

    let limit = state.config.max_file_size;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        if field.name() != Some("file") {
            continue;
        }

        original_filename = field.file_name().map(|s| s.to_string());
        declared_type = field.content_type().map(|s| s.to_string());
        let data = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
        file_data = Some(data);
    }

    let file_data = file_data.filter(|d| !d.is_empty()).ok_or(AppError::NoFile)?;

    // Enforce maximum file size
    let file_size = file_data.len() as u64;
    if file_size > limit {
        warn!("Rejected upload of {} bytes (limit {})", file_size, limit);
        return Err(AppError::PayloadTooLarge { limit });
    }

    let mime_type = resolve_mime_type(declared_type.as_deref(), &file_data)
        .ok_or_else(|| AppError::InvalidFile("Unsupported file type. Use an image.".into()))?;

    let file_name = original_filename
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string());

    let base_url = format!(
        "{}/api/files",
        request_base_url(&headers, state.config.public_base_url.as_deref())
    );

    let record = state
        .files
        .upload(file_data, &mime_type, &file_name, &base_url)
        .await?;

    Ok(Json(UploadResponse {
        success: true,
        message: "Upload successful".to_string(),
        data: record.into(),
    }))
}

/// Maps a multipart failure, keeping axum's 413 for bodies over the request limit.
fn multipart_error(e: MultipartError, limit: u64) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        warn!("Multipart body exceeded the request limit");
        return AppError::PayloadTooLarge { limit };
    }
    error!("Error parsing multipart: {}", e.body_text());
    AppError::Multipart(e.body_text())
}

/// Stream an image by its file id, rendered inline by browsers.
pub async fn get_file(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> Result<Response, AppError> {
    let fetched = state.files.fetch(&file_id).await?;

    let mut response = Response::new(Body::from_stream(fetched.stream));

    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_str(&fetched.content_type)
            .unwrap_or_else(|_| header::HeaderValue::from_static("application/octet-stream")),
    );

    response.headers_mut().insert(
        header::CONTENT_DISPOSITION,
        header::HeaderValue::from_str(&inline_disposition(&fetched.file_name))
            .unwrap_or_else(|_| header::HeaderValue::from_static("inline")),
    );

    Ok(response)
}

/// Delete one file from the media host and the record store.
pub async fn delete_file(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    state.files.remove(&file_id).await?;
    Ok(Json(MessageResponse::ok("File deleted successfully")))
}

/// List every file record, newest first.
pub async fn list_files(
    State(state): State<AppState>,
) -> Result<Json<FileListResponse>, AppError> {
    let files = state.files.list().await?;

    Ok(Json(FileListResponse {
        success: true,
        count: files.len(),
        data: files,
    }))
}

/// Delete every hosted file and every record.
pub async fn clear_files(
    State(state): State<AppState>,
) -> Result<Json<MessageResponse>, AppError> {
    state.files.clear_all().await?;
    Ok(Json(MessageResponse::ok("All files cleared successfully")))
}

/// Bundled single-page uploader.
pub async fn index() -> Html<&'static str> {
    Html(include_str!("../static/index.html"))
}

pub async fn health_check() -> &'static str {
    "OK"
}
