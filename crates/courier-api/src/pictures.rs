use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};

use courier_core::{Caller, IncomingFile, PictureRow};
use courier_types::api::{PictureEntry, PictureUploadResponse, WallResponse};

use crate::auth::AppState;
use crate::error::{AppError, blocking};
use crate::files::{Disposition, serve};
use crate::upload::{multipart_error, read_file};

/// GET /pictures/{picture_id}
pub async fn fetch_picture(
    State(state): State<AppState>,
    Path(picture_id): Path<i64>,
    Extension(_caller): Extension<Caller>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let slots = state.core.pictures.clone();
    let file = blocking(move || slots.fetch_picture(picture_id)).await?;
    Ok(serve(file, Disposition::Inline, &headers))
}

/// The `file` part of a picture upload. Other parts are ignored.
pub async fn single_file(mut multipart: Multipart) -> Result<IncomingFile, AppError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() == Some("file") {
            return read_file(field).await;
        }
    }
    Err(AppError::bad_request("Missing 'file' part"))
}

pub fn entry(row: PictureRow) -> PictureEntry {
    PictureEntry {
        picture_id: row.id,
        filename: row.filename,
        content_type: row.content_type,
        size: row.size,
        placement: row.placement,
        created_at: row.created_at,
    }
}

pub fn created(row: PictureRow) -> Response {
    (
        StatusCode::CREATED,
        Json(PictureUploadResponse {
            ok: true,
            picture: entry(row),
        }),
    )
        .into_response()
}

pub fn wall(rows: Vec<PictureRow>) -> Response {
    Json(WallResponse {
        ok: true,
        pictures: rows.into_iter().map(entry).collect(),
    })
    .into_response()
}
