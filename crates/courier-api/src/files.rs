use axum::{
    Extension,
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

use courier_core::{Caller, ServedFile};

use crate::auth::AppState;
use crate::error::{AppError, blocking};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Attachment,
    Inline,
}

/// GET /messages/{message_id}/attachments/{attachment_id}
pub async fn download_attachment(
    State(state): State<AppState>,
    Path((message_id, attachment_id)): Path<(i64, i64)>,
    Extension(caller): Extension<Caller>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let store = state.core.attachments.clone();
    let file = blocking(move || store.fetch(&caller, message_id, attachment_id)).await?;
    Ok(serve(file, Disposition::Attachment, &headers))
}

/// GET /messages/{message_id}/attachments/{attachment_id}/view
pub async fn view_attachment(
    State(state): State<AppState>,
    Path((message_id, attachment_id)): Path<(i64, i64)>,
    Extension(caller): Extension<Caller>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let store = state.core.attachments.clone();
    let file = blocking(move || store.fetch(&caller, message_id, attachment_id)).await?;
    Ok(serve(file, Disposition::Inline, &headers))
}

/// Build the byte response for a stored file. When the file has a checksum
/// it doubles as a strong ETag and a matching `If-None-Match` gets a 304.
pub fn serve(file: ServedFile, disposition: Disposition, request_headers: &HeaderMap) -> Response {
    let etag = file.sha256.as_ref().map(|sum| format!("\"{}\"", sum));

    if let Some(etag) = &etag {
        let matches = request_headers
            .get(header::IF_NONE_MATCH)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.split(',').any(|candidate| candidate.trim() == etag));
        if matches {
            return (StatusCode::NOT_MODIFIED, [(header::ETAG, etag.clone())]).into_response();
        }
    }

    let kind = match disposition {
        Disposition::Attachment => "attachment",
        Disposition::Inline => "inline",
    };
    let content_disposition = format!("{}; filename=\"{}\"", kind, header_safe(&file.filename));

    let mut response = Response::new(Body::from(file.bytes));
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&file.content_type) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    if let Ok(value) = HeaderValue::from_str(&content_disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    if let Some(value) = etag.and_then(|e| HeaderValue::from_str(&e).ok()) {
        headers.insert(header::ETAG, value);
    }
    response
}

/// Printable ASCII only, without quotes or backslashes.
fn header_safe(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_graphic() && c != '"' && c != '\\' || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim().is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}
