use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, patch, post, put},
};

use courier_types::api::OkResponse;

use crate::auth::{self, AppState};
use crate::middleware::require_auth;
use crate::{chats, files, friends, messages, pictures, users};

/// Every route of the service. Cross-cutting layers (CORS, tracing) are
/// added by the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login));

    let protected_routes = Router::new()
        // Users
        .route(
            "/users/profile",
            get(users::get_profile)
                .patch(users::update_profile)
                .delete(users::delete_profile),
        )
        .route(
            "/users/profile/avatar",
            put(users::upload_avatar).delete(users::delete_avatar),
        )
        .route("/users/profile/wall", post(users::upload_wall_photo))
        .route("/users/{user_id}", get(users::public_profile))
        .route("/users/{user_id}/avatar", get(users::get_avatar))
        .route("/users/{user_id}/wall", get(users::list_wall))
        .route("/pictures/{picture_id}", get(pictures::fetch_picture))
        // Friends
        .route("/friends", get(friends::list_friends))
        .route("/friends/{user_id}/init", post(friends::initiate))
        .route("/friends/{user_id}/accept", post(friends::accept))
        .route("/friends/{user_id}", delete(friends::remove))
        // Chats
        .route("/chats", get(chats::list_chats).post(chats::create_chat))
        .route("/chats/direct", post(chats::direct_chat))
        .route("/chats/{chat_id}", delete(chats::delete_chat))
        .route("/chats/{chat_id}/settings", patch(chats::update_settings))
        .route(
            "/chats/{chat_id}/settings/roles/{user_id}",
            patch(chats::set_role),
        )
        .route(
            "/chats/{chat_id}/members",
            get(chats::roster).post(chats::add_member),
        )
        .route(
            "/chats/{chat_id}/members/{user_id}",
            delete(chats::remove_member),
        )
        // Messages
        .route("/chats/{chat_id}/messages", get(messages::list_messages))
        .route(
            "/chats/{chat_id}/messages/{message_id}",
            patch(messages::edit_message).delete(messages::delete_message),
        )
        .route("/messages", post(messages::send_message))
        .route(
            "/messages/{message_id}/attachments/{attachment_id}",
            get(files::download_attachment),
        )
        .route(
            "/messages/{message_id}/attachments/{attachment_id}/view",
            get(files::view_attachment),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let max_body_bytes = state.max_body_bytes;
    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

async fn health() -> Json<OkResponse> {
    Json(OkResponse::ok())
}
