use std::path::Path;

use axum::http::{HeaderMap, header};

/// Extracts the file extension from a filename and converts it to lowercase.
pub fn get_file_extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// Checks if a MIME type represents an image.
pub fn is_image_mime_type(mime_type: &str) -> bool {
    mime_type.starts_with("image/")
}

/// Picks the MIME type of an upload.
///
/// A declared type other than `application/octet-stream` is trusted as long as
/// it is an image type. Otherwise the magic bytes decide. `None` means the
/// upload is not an image.
pub fn resolve_mime_type(declared: Option<&str>, data: &[u8]) -> Option<String> {
    match declared.map(str::trim) {
        Some(mime) if !mime.is_empty() && mime != "application/octet-stream" => {
            is_image_mime_type(mime).then(|| mime.to_string())
        }
        _ => image::guess_format(data)
            .ok()
            .map(|format| format.to_mime_type().to_string())
            .filter(|mime| is_image_mime_type(mime)),
    }
}

/// Scheme and authority clients should use to reach this service.
///
/// A configured public URL wins; otherwise the `Host` header is combined with
/// `X-Forwarded-Proto` (default `http`).
pub fn request_base_url(headers: &HeaderMap, configured: Option<&str>) -> String {
    if let Some(url) = configured {
        return url.trim_end_matches('/').to_string();
    }

    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("http");

    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");

    format!("{}://{}", proto, host)
}

/// `Content-Disposition` value that lets browsers render the image in place.
pub fn inline_disposition(file_name: &str) -> String {
    let safe: String = file_name
        .chars()
        .filter(|c| *c != '"' && *c != '\\' && !c.is_control())
        .collect();
    format!("inline; filename=\"{}\"", safe)
}
