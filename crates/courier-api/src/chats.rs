use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use courier_core::Caller;
use courier_core::membership::ChatSettings;
use courier_types::api::{
    AddMemberRequest, ChangeRoleRequest, ChatListResponse, ChatSettingsRequest, ChatSummary,
    CreateChatRequest, CreateChatResponse, DirectChatRequest, DirectChatResponse, MemberEntry,
    MembersResponse, OkResponse,
};

use crate::auth::AppState;
use crate::error::{AppError, blocking};
use crate::extract::AppJson;

/// GET /chats
pub async fn list_chats(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<ChatListResponse>, AppError> {
    let membership = state.core.membership.clone();
    let chats = blocking(move || membership.list_chats(&caller)).await?;

    Ok(Json(ChatListResponse {
        ok: true,
        chat_list: chats
            .into_iter()
            .map(|c| ChatSummary {
                chat_id: c.id,
                chat_name: c.name,
                is_private: c.is_private,
            })
            .collect(),
    }))
}

/// POST /chats
pub async fn create_chat(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    AppJson(req): AppJson<CreateChatRequest>,
) -> Result<impl IntoResponse, AppError> {
    let membership = state.core.membership.clone();
    let chat_id = blocking(move || {
        membership.create_group_chat(&caller, &req.member_ids, req.name.as_deref())
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateChatResponse { ok: true, chat_id }),
    ))
}

/// POST /chats/direct
pub async fn direct_chat(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    AppJson(req): AppJson<DirectChatRequest>,
) -> Result<impl IntoResponse, AppError> {
    let membership = state.core.membership.clone();
    let direct =
        blocking(move || membership.create_or_reuse_direct_chat(&caller, req.user_id)).await?;

    let status = if direct.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(DirectChatResponse {
            ok: true,
            chat_id: direct.chat_id,
            created: direct.created,
        }),
    ))
}

/// PATCH /chats/{chat_id}/settings
pub async fn update_settings(
    State(state): State<AppState>,
    Path(chat_id): Path<i64>,
    Extension(caller): Extension<Caller>,
    AppJson(req): AppJson<ChatSettingsRequest>,
) -> Result<Json<OkResponse>, AppError> {
    let membership = state.core.membership.clone();
    let settings = ChatSettings {
        name: req.name,
        status: req.status,
    };
    blocking(move || membership.update_settings(&caller, chat_id, &settings)).await?;
    Ok(Json(OkResponse::ok()))
}

/// PATCH /chats/{chat_id}/settings/roles/{user_id}
pub async fn set_role(
    State(state): State<AppState>,
    Path((chat_id, user_id)): Path<(i64, i64)>,
    Extension(caller): Extension<Caller>,
    AppJson(req): AppJson<ChangeRoleRequest>,
) -> Result<Json<OkResponse>, AppError> {
    let membership = state.core.membership.clone();
    blocking(move || membership.set_role(&caller, chat_id, user_id, req.is_admin)).await?;
    Ok(Json(OkResponse::ok()))
}

/// DELETE /chats/{chat_id}
pub async fn delete_chat(
    State(state): State<AppState>,
    Path(chat_id): Path<i64>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<OkResponse>, AppError> {
    let membership = state.core.membership.clone();
    blocking(move || membership.delete_chat(&caller, chat_id)).await?;
    Ok(Json(OkResponse::ok()))
}

/// GET /chats/{chat_id}/members
pub async fn roster(
    State(state): State<AppState>,
    Path(chat_id): Path<i64>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<MembersResponse>, AppError> {
    let membership = state.core.membership.clone();
    let members = blocking(move || membership.roster(&caller, chat_id)).await?;

    Ok(Json(MembersResponse {
        ok: true,
        members: members
            .into_iter()
            .map(|m| MemberEntry {
                user_id: m.user_id,
                role: m.role,
                joined_at: m.joined_at,
            })
            .collect(),
    }))
}

/// POST /chats/{chat_id}/members
pub async fn add_member(
    State(state): State<AppState>,
    Path(chat_id): Path<i64>,
    Extension(caller): Extension<Caller>,
    AppJson(req): AppJson<AddMemberRequest>,
) -> Result<Json<OkResponse>, AppError> {
    let membership = state.core.membership.clone();
    blocking(move || membership.add_member(&caller, chat_id, req.user_id)).await?;
    Ok(Json(OkResponse::ok()))
}

/// DELETE /chats/{chat_id}/members/{user_id}
pub async fn remove_member(
    State(state): State<AppState>,
    Path((chat_id, user_id)): Path<(i64, i64)>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<OkResponse>, AppError> {
    let membership = state.core.membership.clone();
    blocking(move || membership.remove_member(&caller, chat_id, user_id)).await?;
    Ok(Json(OkResponse::ok()))
}
