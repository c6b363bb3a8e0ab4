//! Database row types. These map directly to SQLite rows and stay distinct
//! from the courier-types API models to keep the DB layer independent.

use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Type;

use courier_types::models::{ChatStatus, FriendshipStatus, Placement, Role};

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub name: String,
    pub lastname: String,
    pub bio: Option<String>,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct FriendshipRow {
    pub requester_id: i64,
    pub target_id: i64,
    pub status: FriendshipStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ChatRow {
    pub id: i64,
    pub is_private: bool,
    pub name: Option<String>,
    pub status: ChatStatus,
}

#[derive(Debug, Clone)]
pub struct MemberRow {
    pub chat_id: i64,
    pub user_id: i64,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: i64,
    pub chat_id: i64,
    pub user_id: i64,
    pub text: String,
    /// Microseconds since the Unix epoch, strictly increasing per chat.
    pub sent_at: i64,
}

#[derive(Debug, Clone)]
pub struct AttachmentRow {
    pub id: i64,
    pub message_id: i64,
    pub filename: String,
    pub stored_path: String,
    pub content_type: String,
    pub size: i64,
    pub sha256: String,
}

#[derive(Debug, Clone)]
pub struct PictureRow {
    pub id: i64,
    pub owner_id: i64,
    pub filename: String,
    pub stored_path: String,
    pub content_type: String,
    pub size: i64,
    pub placement: Placement,
    pub created_at: DateTime<Utc>,
}

/// Read a TEXT column holding one of the lowercase enum spellings.
pub(crate) fn text_enum<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: String = row.get(idx)?;
    text.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Read a `datetime('now')` column. SQLite stores these as
/// "YYYY-MM-DD HH:MM:SS" without a timezone, always UTC.
pub(crate) fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&text, "%Y-%m-%d %H:%M:%S")
        .map(|ndt| ndt.and_utc())
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
