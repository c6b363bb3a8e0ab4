use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row};

use courier_types::models::Placement;

use crate::models::{PictureRow, text_enum, timestamp};

pub struct NewPicture<'a> {
    pub owner_id: i64,
    pub filename: &'a str,
    pub stored_path: &'a str,
    pub content_type: &'a str,
    pub size: i64,
    pub placement: Placement,
}

const COLUMNS: &str =
    "id, owner_id, filename, stored_path, content_type, size, placement, created_at";

fn map_row(row: &Row<'_>) -> rusqlite::Result<PictureRow> {
    Ok(PictureRow {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        filename: row.get(2)?,
        stored_path: row.get(3)?,
        content_type: row.get(4)?,
        size: row.get(5)?,
        placement: text_enum(row, 6)?,
        created_at: timestamp(row, 7)?,
    })
}

pub fn insert(conn: &Connection, picture: &NewPicture<'_>) -> Result<i64> {
    conn.execute(
        "INSERT INTO pictures (owner_id, filename, stored_path, content_type, size, placement)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            picture.owner_id,
            picture.filename,
            picture.stored_path,
            picture.content_type,
            picture.size,
            picture.placement.as_str(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn by_id(conn: &Connection, id: i64) -> Result<Option<PictureRow>> {
    let row = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM pictures WHERE id = ?1"),
            [id],
            map_row,
        )
        .optional()?;
    Ok(row)
}

pub fn avatar(conn: &Connection, owner_id: i64) -> Result<Option<PictureRow>> {
    let row = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM pictures WHERE owner_id = ?1 AND placement = ?2"),
            rusqlite::params![owner_id, Placement::Avatar.as_str()],
            map_row,
        )
        .optional()?;
    Ok(row)
}

/// Move the owner's current avatar (if any) onto the wall.
pub fn demote_avatar(conn: &Connection, owner_id: i64) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE pictures SET placement = ?2 WHERE owner_id = ?1 AND placement = ?3",
        rusqlite::params![
            owner_id,
            Placement::Wall.as_str(),
            Placement::Avatar.as_str(),
        ],
    )?;
    Ok(changed)
}

pub fn wall(conn: &Connection, owner_id: i64) -> Result<Vec<PictureRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM pictures WHERE owner_id = ?1 AND placement = ?2 ORDER BY id DESC"
    ))?;
    let rows = stmt
        .query_map(
            rusqlite::params![owner_id, Placement::Wall.as_str()],
            map_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn delete(conn: &Connection, id: i64) -> Result<bool> {
    let changed = conn.execute("DELETE FROM pictures WHERE id = ?1", [id])?;
    Ok(changed > 0)
}

pub fn paths_for_owner(conn: &Connection, owner_id: i64) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT stored_path FROM pictures WHERE owner_id = ?1")?;
    let paths = stmt
        .query_map([owner_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(paths)
}
