use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ChatStatus, FriendshipDirection, FriendshipStatus, Placement, Role};

// -- JWT Claims --

/// Bearer token claims. `sub` is the numeric user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub exp: usize,
}

/// Body returned by endpoints that only report success.
#[derive(Debug, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    pub fn ok() -> Self {
        Self { ok: true }
    }
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub lastname: String,
    pub password: String,
    #[serde(default)]
    pub bio: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub ok: bool,
    pub user_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub ok: bool,
    pub user_id: i64,
    pub access_token: String,
    pub token_type: String,
}

// -- Users --

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub ok: bool,
    pub id: i64,
    pub name: String,
    pub lastname: String,
    pub bio: Option<String>,
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PublicProfileResponse {
    pub ok: bool,
    pub id: i64,
    pub name: String,
    pub lastname: String,
    pub bio: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub name: String,
    pub lastname: String,
    #[serde(default)]
    pub bio: Option<String>,
}

// -- Friends --

#[derive(Debug, Serialize, Deserialize)]
pub struct FriendEntry {
    pub user_id: i64,
    pub status: FriendshipStatus,
    pub direction: FriendshipDirection,
    pub since: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FriendsResponse {
    pub ok: bool,
    pub friends: Vec<FriendEntry>,
}

// -- Chats --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateChatRequest {
    pub member_ids: Vec<i64>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateChatResponse {
    pub ok: bool,
    pub chat_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirectChatRequest {
    pub user_id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DirectChatResponse {
    pub ok: bool,
    pub chat_id: i64,
    /// False when an existing private chat was reused.
    pub created: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatSummary {
    pub chat_id: i64,
    pub chat_name: Option<String>,
    pub is_private: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatListResponse {
    pub ok: bool,
    pub chat_list: Vec<ChatSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChatSettingsRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<ChatStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChangeRoleRequest {
    pub is_admin: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddMemberRequest {
    pub user_id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MemberEntry {
    pub user_id: i64,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MembersResponse {
    pub ok: bool,
    pub members: Vec<MemberEntry>,
}

// -- Messages --

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(default)]
    pub limit: Option<u32>,
    /// Cursor of the oldest message from the previous page. Only strictly
    /// older messages are returned.
    #[serde(default)]
    pub before: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageEntry {
    pub message_id: i64,
    pub user_id: i64,
    pub chat_id: i64,
    pub text: String,
    pub sent_at: DateTime<Utc>,
    pub cursor: i64,
    pub attachment_ids: Vec<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessagesResponse {
    pub ok: bool,
    pub messages: Vec<MessageEntry>,
    /// Present when the page was full; pass as `before` to continue.
    pub next_cursor: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendMessageResponse {
    pub ok: bool,
    pub message_id: i64,
    pub chat_id: i64,
    pub attachment_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EditMessageRequest {
    pub text: String,
}

// -- Pictures --

#[derive(Debug, Serialize, Deserialize)]
pub struct PictureEntry {
    pub picture_id: i64,
    pub filename: String,
    pub content_type: String,
    pub size: i64,
    pub placement: Placement,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PictureUploadResponse {
    pub ok: bool,
    pub picture: PictureEntry,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WallResponse {
    pub ok: bool,
    pub pictures: Vec<PictureEntry>,
}
