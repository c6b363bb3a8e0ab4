use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row};

use crate::models::MessageRow;

fn map_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        user_id: row.get(2)?,
        text: row.get(3)?,
        sent_at: row.get(4)?,
    })
}

/// Timestamp for the next message in `chat_id`: the current time, bumped past
/// the newest existing message so `sent_at` never repeats within a chat.
pub fn next_sent_at(conn: &Connection, chat_id: i64, now_micros: i64) -> Result<i64> {
    let newest: Option<i64> = conn.query_row(
        "SELECT MAX(sent_at) FROM messages WHERE chat_id = ?1",
        [chat_id],
        |row| row.get(0),
    )?;
    Ok(match newest {
        Some(last) if last >= now_micros => last + 1,
        _ => now_micros,
    })
}

pub fn insert(
    conn: &Connection,
    chat_id: i64,
    user_id: i64,
    text: &str,
    sent_at: i64,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO messages (chat_id, user_id, text, sent_at) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![chat_id, user_id, text, sent_at],
    )?;
    Ok(conn.last_insert_rowid())
}

/// A message matched jointly on chat, author and id.
pub fn authored(
    conn: &Connection,
    chat_id: i64,
    user_id: i64,
    message_id: i64,
) -> Result<Option<MessageRow>> {
    let row = conn
        .query_row(
            "SELECT id, chat_id, user_id, text, sent_at FROM messages
             WHERE id = ?1 AND chat_id = ?2 AND user_id = ?3",
            [message_id, chat_id, user_id],
            map_row,
        )
        .optional()?;
    Ok(row)
}

pub fn set_text(conn: &Connection, message_id: i64, text: &str) -> Result<()> {
    conn.execute(
        "UPDATE messages SET text = ?2 WHERE id = ?1",
        rusqlite::params![message_id, text],
    )?;
    Ok(())
}

pub fn delete(conn: &Connection, message_id: i64) -> Result<bool> {
    let changed = conn.execute("DELETE FROM messages WHERE id = ?1", [message_id])?;
    Ok(changed > 0)
}

/// Newest-first page of a chat's messages, optionally only those strictly
/// older than `before`.
pub fn page(
    conn: &Connection,
    chat_id: i64,
    limit: u32,
    before: Option<i64>,
) -> Result<Vec<MessageRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, chat_id, user_id, text, sent_at FROM messages
         WHERE chat_id = ?1 AND (?2 IS NULL OR sent_at < ?2)
         ORDER BY sent_at DESC
         LIMIT ?3",
    )?;
    let rows = stmt
        .query_map(rusqlite::params![chat_id, before, limit], map_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}
