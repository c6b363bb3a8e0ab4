use axum::{
    Extension, Json,
    extract::{Path, State},
};

use courier_core::Caller;
use courier_types::api::{FriendEntry, FriendsResponse, OkResponse};

use crate::auth::AppState;
use crate::error::{AppError, blocking};

/// GET /friends
pub async fn list_friends(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<FriendsResponse>, AppError> {
    let friendships = state.core.friendships.clone();
    let friends = blocking(move || friendships.list(&caller)).await?;

    Ok(Json(FriendsResponse {
        ok: true,
        friends: friends
            .into_iter()
            .map(|f| FriendEntry {
                user_id: f.user_id,
                status: f.status,
                direction: f.direction,
                since: f.since,
            })
            .collect(),
    }))
}

/// POST /friends/{user_id}/init
pub async fn initiate(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<OkResponse>, AppError> {
    let friendships = state.core.friendships.clone();
    blocking(move || friendships.initiate(&caller, user_id)).await?;
    Ok(Json(OkResponse::ok()))
}

/// POST /friends/{user_id}/accept
pub async fn accept(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<OkResponse>, AppError> {
    let friendships = state.core.friendships.clone();
    blocking(move || friendships.accept(&caller, user_id)).await?;
    Ok(Json(OkResponse::ok()))
}

/// DELETE /friends/{user_id}
pub async fn remove(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<OkResponse>, AppError> {
    let friendships = state.core.friendships.clone();
    blocking(move || friendships.remove(&caller, user_id)).await?;
    Ok(Json(OkResponse::ok()))
}
