use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row};

use courier_types::models::FriendshipStatus;

use crate::models::{FriendshipRow, text_enum, timestamp};

fn map_row(row: &Row<'_>) -> rusqlite::Result<FriendshipRow> {
    Ok(FriendshipRow {
        requester_id: row.get(0)?,
        target_id: row.get(1)?,
        status: text_enum(row, 2)?,
        created_at: timestamp(row, 3)?,
    })
}

/// The row linking `a` and `b`, whichever of them sent the request.
pub fn between(conn: &Connection, a: i64, b: i64) -> Result<Option<FriendshipRow>> {
    let row = conn
        .query_row(
            "SELECT requester_id, target_id, status, created_at FROM friendships
             WHERE (requester_id = ?1 AND target_id = ?2)
                OR (requester_id = ?2 AND target_id = ?1)",
            [a, b],
            map_row,
        )
        .optional()?;
    Ok(row)
}

pub fn insert_pending(conn: &Connection, requester_id: i64, target_id: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO friendships (requester_id, target_id, status) VALUES (?1, ?2, ?3)",
        rusqlite::params![requester_id, target_id, FriendshipStatus::Pending.as_str()],
    )?;
    Ok(())
}

/// Flip a pending request sent by `requester_id` to `target_id` into accepted.
/// Returns false when no such pending request exists.
pub fn accept(conn: &Connection, requester_id: i64, target_id: i64) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE friendships SET status = ?3
         WHERE requester_id = ?1 AND target_id = ?2 AND status = ?4",
        rusqlite::params![
            requester_id,
            target_id,
            FriendshipStatus::Accepted.as_str(),
            FriendshipStatus::Pending.as_str(),
        ],
    )?;
    Ok(changed > 0)
}

/// Delete an accepted friendship in either direction.
pub fn delete_accepted(conn: &Connection, a: i64, b: i64) -> Result<bool> {
    let changed = conn.execute(
        "DELETE FROM friendships
         WHERE ((requester_id = ?1 AND target_id = ?2) OR (requester_id = ?2 AND target_id = ?1))
           AND status = ?3",
        rusqlite::params![a, b, FriendshipStatus::Accepted.as_str()],
    )?;
    Ok(changed > 0)
}

pub fn for_user(conn: &Connection, user_id: i64) -> Result<Vec<FriendshipRow>> {
    let mut stmt = conn.prepare(
        "SELECT requester_id, target_id, status, created_at FROM friendships
         WHERE requester_id = ?1 OR target_id = ?1
         ORDER BY created_at DESC",
    )?;
    let rows = stmt
        .query_map([user_id], map_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}
