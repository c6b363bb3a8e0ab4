//! Multipart plumbing shared by message and picture uploads.

use axum::extract::multipart::{Field, MultipartError};
use axum::http::StatusCode;

use courier_core::{CoreError, IncomingFile};

use crate::error::AppError;

pub fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::Core(CoreError::too_large("Request body is too large"))
    } else {
        AppError::bad_request(err.body_text())
    }
}

/// Buffer one file part. A part without a file name keeps an empty one.
pub async fn read_file(field: Field<'_>) -> Result<IncomingFile, AppError> {
    let filename = field.file_name().unwrap_or_default().to_string();
    let content_type = field.content_type().unwrap_or_default().to_string();
    let data = field.bytes().await.map_err(multipart_error)?;

    Ok(IncomingFile {
        filename,
        content_type,
        data: data.to_vec(),
    })
}

/// Read a text part as UTF-8.
pub async fn read_text(field: Field<'_>) -> Result<String, AppError> {
    let name = field.name().unwrap_or_default().to_string();
    field
        .text()
        .await
        .map_err(|_| AppError::bad_request(format!("Field '{}' is not valid text", name)))
}
