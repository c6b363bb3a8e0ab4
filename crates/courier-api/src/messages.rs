use axum::{
    Extension, Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};

use courier_core::Caller;
use courier_core::ledger::{PageRequest, SendTarget};
use courier_types::api::{
    EditMessageRequest, MessageEntry, MessageQuery, MessagesResponse, OkResponse,
    SendMessageResponse,
};

use crate::auth::AppState;
use crate::error::{AppError, blocking};
use crate::extract::AppJson;
use crate::upload::{multipart_error, read_file, read_text};

/// GET /chats/{chat_id}/messages?limit&before
pub async fn list_messages(
    State(state): State<AppState>,
    Path(chat_id): Path<i64>,
    Query(query): Query<MessageQuery>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<MessagesResponse>, AppError> {
    let ledger = state.core.ledger.clone();
    let page = blocking(move || {
        ledger.list(
            &caller,
            chat_id,
            PageRequest {
                limit: query.limit,
                before: query.before,
            },
        )
    })
    .await?;

    let messages = page
        .entries
        .into_iter()
        .map(|entry| MessageEntry {
            message_id: entry.message.id,
            user_id: entry.message.user_id,
            chat_id: entry.message.chat_id,
            text: entry.message.text,
            sent_at: DateTime::<Utc>::from_timestamp_micros(entry.message.sent_at)
                .unwrap_or_default(),
            cursor: entry.message.sent_at,
            attachment_ids: entry.attachment_ids,
        })
        .collect();

    Ok(Json(MessagesResponse {
        ok: true,
        messages,
        next_cursor: page.next_cursor,
    }))
}

/// POST /messages
///
/// Multipart form: `text`, exactly one of `chat_id` / `user_id`, and any
/// number of `files` parts.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut text = None;
    let mut chat_id = None;
    let mut user_id = None;
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "text" => text = Some(read_text(field).await?),
            "chat_id" => chat_id = Some(parse_id("chat_id", &read_text(field).await?)?),
            "user_id" => user_id = Some(parse_id("user_id", &read_text(field).await?)?),
            "files" => files.push(read_file(field).await?),
            other => {
                return Err(AppError::bad_request(format!("Unexpected field '{}'", other)));
            }
        }
    }

    let text = text.ok_or_else(|| AppError::bad_request("Missing 'text' field"))?;
    let target = match (chat_id, user_id) {
        (Some(chat_id), None) => SendTarget::Chat(chat_id),
        (None, Some(user_id)) => SendTarget::User(user_id),
        _ => {
            return Err(AppError::bad_request(
                "Provide exactly one of 'chat_id' or 'user_id'",
            ));
        }
    };

    let ledger = state.core.ledger.clone();
    let posted = blocking(move || ledger.append(&caller, target, &text, files)).await?;

    Ok((
        StatusCode::CREATED,
        Json(SendMessageResponse {
            ok: true,
            message_id: posted.message_id,
            chat_id: posted.chat_id,
            attachment_ids: posted.attachment_ids,
        }),
    ))
}

/// PATCH /chats/{chat_id}/messages/{message_id}
pub async fn edit_message(
    State(state): State<AppState>,
    Path((chat_id, message_id)): Path<(i64, i64)>,
    Extension(caller): Extension<Caller>,
    AppJson(req): AppJson<EditMessageRequest>,
) -> Result<Json<OkResponse>, AppError> {
    let ledger = state.core.ledger.clone();
    blocking(move || ledger.edit(&caller, chat_id, message_id, &req.text)).await?;
    Ok(Json(OkResponse::ok()))
}

/// DELETE /chats/{chat_id}/messages/{message_id}
pub async fn delete_message(
    State(state): State<AppState>,
    Path((chat_id, message_id)): Path<(i64, i64)>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<OkResponse>, AppError> {
    let ledger = state.core.ledger.clone();
    blocking(move || ledger.delete(&caller, chat_id, message_id)).await?;
    Ok(Json(OkResponse::ok()))
}

fn parse_id(field: &str, value: &str) -> Result<i64, AppError> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::bad_request(format!("Field '{}' must be an integer", field)))
}
