use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row};

use crate::models::UserRow;

pub struct NewUser<'a> {
    pub email: &'a str,
    pub name: &'a str,
    pub lastname: &'a str,
    pub bio: Option<&'a str>,
    pub password_hash: &'a str,
}

const COLUMNS: &str = "id, name, lastname, bio, email, password";

fn map_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        name: row.get(1)?,
        lastname: row.get(2)?,
        bio: row.get(3)?,
        email: row.get(4)?,
        password: row.get(5)?,
    })
}

pub fn insert(conn: &Connection, user: &NewUser<'_>) -> Result<i64> {
    conn.execute(
        "INSERT INTO users (email, name, lastname, bio, password) VALUES (?1, ?2, ?3, ?4, ?5)",
        (user.email, user.name, user.lastname, user.bio, user.password_hash),
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn by_id(conn: &Connection, id: i64) -> Result<Option<UserRow>> {
    let row = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM users WHERE id = ?1"),
            [id],
            map_row,
        )
        .optional()?;
    Ok(row)
}

pub fn by_email(conn: &Connection, email: &str) -> Result<Option<UserRow>> {
    let row = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM users WHERE email = ?1"),
            [email],
            map_row,
        )
        .optional()?;
    Ok(row)
}

pub fn exists(conn: &Connection, id: i64) -> Result<bool> {
    let found = conn
        .query_row("SELECT 1 FROM users WHERE id = ?1", [id], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

pub fn update_profile(
    conn: &Connection,
    id: i64,
    name: &str,
    lastname: &str,
    bio: Option<&str>,
) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE users SET name = ?2, lastname = ?3, bio = ?4 WHERE id = ?1",
        rusqlite::params![id, name, lastname, bio],
    )?;
    Ok(changed > 0)
}

pub fn delete(conn: &Connection, id: i64) -> Result<bool> {
    let changed = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
    Ok(changed > 0)
}
