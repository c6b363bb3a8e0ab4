use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};

use crate::models::AttachmentRow;

pub struct NewAttachment<'a> {
    pub message_id: i64,
    pub filename: &'a str,
    pub stored_path: &'a str,
    pub content_type: &'a str,
    pub size: i64,
    pub sha256: &'a str,
}

pub fn insert(conn: &Connection, attachment: &NewAttachment<'_>) -> Result<i64> {
    conn.execute(
        "INSERT INTO attachments (message_id, filename, stored_path, content_type, size, sha256)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            attachment.message_id,
            attachment.filename,
            attachment.stored_path,
            attachment.content_type,
            attachment.size,
            attachment.sha256,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Batch-fetch `(message_id, attachment_id)` pairs for a set of messages.
pub fn ids_for_messages(conn: &Connection, message_ids: &[i64]) -> Result<Vec<(i64, i64)>> {
    if message_ids.is_empty() {
        return Ok(vec![]);
    }

    let placeholders: Vec<String> = (1..=message_ids.len()).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "SELECT message_id, id FROM attachments WHERE message_id IN ({}) ORDER BY id",
        placeholders.join(", ")
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(message_ids), |row| {
            Ok((row.get(0)?, row.get(1)?))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

/// The attachment, if `user_id` is a member of the chat that owns its
/// message. One join across attachment, message and membership.
pub fn visible_to(
    conn: &Connection,
    user_id: i64,
    message_id: i64,
    attachment_id: i64,
) -> Result<Option<AttachmentRow>> {
    let row = conn
        .query_row(
            "SELECT a.id, a.message_id, a.filename, a.stored_path, a.content_type, a.size, a.sha256
             FROM attachments a
             JOIN messages m ON m.id = a.message_id
             JOIN chat_members cm ON cm.chat_id = m.chat_id AND cm.user_id = ?1
             WHERE a.id = ?3 AND m.id = ?2",
            [user_id, message_id, attachment_id],
            |row| {
                Ok(AttachmentRow {
                    id: row.get(0)?,
                    message_id: row.get(1)?,
                    filename: row.get(2)?,
                    stored_path: row.get(3)?,
                    content_type: row.get(4)?,
                    size: row.get(5)?,
                    sha256: row.get(6)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

fn stored_paths(conn: &Connection, sql: &str, id: i64) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let paths = stmt
        .query_map([id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(paths)
}

pub fn paths_for_message(conn: &Connection, message_id: i64) -> Result<Vec<String>> {
    stored_paths(
        conn,
        "SELECT stored_path FROM attachments WHERE message_id = ?1",
        message_id,
    )
}

pub fn paths_for_chat(conn: &Connection, chat_id: i64) -> Result<Vec<String>> {
    stored_paths(
        conn,
        "SELECT a.stored_path FROM attachments a
         JOIN messages m ON m.id = a.message_id
         WHERE m.chat_id = ?1",
        chat_id,
    )
}

pub fn paths_for_author(conn: &Connection, user_id: i64) -> Result<Vec<String>> {
    stored_paths(
        conn,
        "SELECT a.stored_path FROM attachments a
         JOIN messages m ON m.id = a.message_id
         WHERE m.user_id = ?1",
        user_id,
    )
}

pub fn count_for_message(conn: &Connection, message_id: i64) -> Result<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM attachments WHERE message_id = ?1",
        [message_id],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}
