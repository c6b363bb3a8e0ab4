use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row};

use courier_types::models::{ChatStatus, Role};

use crate::models::{ChatRow, MemberRow, text_enum, timestamp};

fn map_chat(row: &Row<'_>) -> rusqlite::Result<ChatRow> {
    Ok(ChatRow {
        id: row.get(0)?,
        is_private: row.get(1)?,
        name: row.get(2)?,
        status: text_enum(row, 3)?,
    })
}

// -- Chats --

pub fn insert(conn: &Connection, is_private: bool, name: Option<&str>) -> Result<i64> {
    conn.execute(
        "INSERT INTO chats (is_private, name, status) VALUES (?1, ?2, ?3)",
        rusqlite::params![is_private, name, ChatStatus::Opened.as_str()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn by_id(conn: &Connection, id: i64) -> Result<Option<ChatRow>> {
    let row = conn
        .query_row(
            "SELECT id, is_private, name, status FROM chats WHERE id = ?1",
            [id],
            map_chat,
        )
        .optional()?;
    Ok(row)
}

pub fn set_name(conn: &Connection, id: i64, name: &str) -> Result<()> {
    conn.execute("UPDATE chats SET name = ?2 WHERE id = ?1", rusqlite::params![id, name])?;
    Ok(())
}

pub fn set_status(conn: &Connection, id: i64, status: ChatStatus) -> Result<()> {
    conn.execute(
        "UPDATE chats SET status = ?2 WHERE id = ?1",
        rusqlite::params![id, status.as_str()],
    )?;
    Ok(())
}

pub fn delete(conn: &Connection, id: i64) -> Result<bool> {
    let changed = conn.execute("DELETE FROM chats WHERE id = ?1", [id])?;
    Ok(changed > 0)
}

/// Every chat `user_id` belongs to, oldest first.
pub fn for_user(conn: &Connection, user_id: i64) -> Result<Vec<ChatRow>> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.is_private, c.name, c.status
         FROM chat_members cm
         JOIN chats c ON c.id = cm.chat_id
         WHERE cm.user_id = ?1
         ORDER BY c.id",
    )?;
    let rows = stmt
        .query_map([user_id], map_chat)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// The private chat shared by `a` and `b`, if one exists.
pub fn private_between(conn: &Connection, a: i64, b: i64) -> Result<Option<i64>> {
    let id = conn
        .query_row(
            "SELECT c.id
             FROM chats c
             JOIN chat_members m1 ON m1.chat_id = c.id AND m1.user_id = ?1
             JOIN chat_members m2 ON m2.chat_id = c.id AND m2.user_id = ?2
             WHERE c.is_private = 1
             ORDER BY c.id
             LIMIT 1",
            [a, b],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

// -- Members --

pub fn insert_member(conn: &Connection, chat_id: i64, user_id: i64, role: Role) -> Result<()> {
    conn.execute(
        "INSERT INTO chat_members (chat_id, user_id, role) VALUES (?1, ?2, ?3)",
        rusqlite::params![chat_id, user_id, role.as_str()],
    )?;
    Ok(())
}

pub fn member_role(conn: &Connection, chat_id: i64, user_id: i64) -> Result<Option<Role>> {
    let role = conn
        .query_row(
            "SELECT role FROM chat_members WHERE chat_id = ?1 AND user_id = ?2",
            [chat_id, user_id],
            |row| text_enum(row, 0),
        )
        .optional()?;
    Ok(role)
}

pub fn set_member_role(conn: &Connection, chat_id: i64, user_id: i64, role: Role) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE chat_members SET role = ?3 WHERE chat_id = ?1 AND user_id = ?2",
        rusqlite::params![chat_id, user_id, role.as_str()],
    )?;
    Ok(changed > 0)
}

pub fn delete_member(conn: &Connection, chat_id: i64, user_id: i64) -> Result<bool> {
    let changed = conn.execute(
        "DELETE FROM chat_members WHERE chat_id = ?1 AND user_id = ?2",
        [chat_id, user_id],
    )?;
    Ok(changed > 0)
}

pub fn members(conn: &Connection, chat_id: i64) -> Result<Vec<MemberRow>> {
    let mut stmt = conn.prepare(
        "SELECT chat_id, user_id, role, joined_at FROM chat_members
         WHERE chat_id = ?1
         ORDER BY joined_at, user_id",
    )?;
    let rows = stmt
        .query_map([chat_id], |row| {
            Ok(MemberRow {
                chat_id: row.get(0)?,
                user_id: row.get(1)?,
                role: text_enum(row, 2)?,
                joined_at: timestamp(row, 3)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn member_count(conn: &Connection, chat_id: i64) -> Result<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM chat_members WHERE chat_id = ?1",
        [chat_id],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}
