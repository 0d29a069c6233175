//! Application queries.

use lfg_types::Application;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::Result;

const COLUMNS: &str = "id, group_id, applicant, created_at_sec, updated_at_sec";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Application> {
    Ok(Application {
        id: row.get(0)?,
        group_id: row.get(1)?,
        applicant: row.get(2)?,
        created_at_sec: row.get(3)?,
        updated_at_sec: row.get(4)?,
        kill_proof: None,
    })
}

/// Upsert an application by id and return the stored row.
///
/// The referenced group must exist; the foreign key rejects orphans.
pub fn save(conn: &Connection, app: &Application, group_id: &str) -> Result<Application> {
    let saved = conn.query_row(
        &format!(
            "INSERT INTO applications ({COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                 applicant = excluded.applicant,
                 updated_at_sec = excluded.updated_at_sec
             RETURNING {COLUMNS}"
        ),
        params![
            app.id,
            group_id,
            app.applicant,
            app.created_at_sec,
            app.updated_at_sec,
        ],
        from_row,
    )?;
    Ok(saved)
}

/// Fetch an application by id.
pub fn get(conn: &Connection, id: &str) -> Result<Option<Application>> {
    let app = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM applications WHERE id = ?1"),
            [id],
            from_row,
        )
        .optional()?;
    Ok(app)
}

/// Delete an application by id.
pub fn delete(conn: &Connection, id: &str) -> Result<()> {
    conn.execute("DELETE FROM applications WHERE id = ?1", [id])?;
    Ok(())
}

/// All applications submitted to one group.
pub fn list_for_group(conn: &Connection, group_id: &str) -> Result<Vec<Application>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM applications WHERE group_id = ?1"
    ))?;
    let apps = stmt
        .query_map([group_id], from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(apps)
}

/// All applications submitted by one account, across groups.
pub fn list_for_account(conn: &Connection, applicant: &str) -> Result<Vec<Application>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM applications WHERE applicant = ?1"
    ))?;
    let apps = stmt
        .query_map([applicant], from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(apps)
}

/// Delete every application last updated strictly before `cutoff_sec`,
/// returning the removed rows.
pub fn delete_updated_before(conn: &Connection, cutoff_sec: i64) -> Result<Vec<Application>> {
    let mut stmt = conn.prepare(&format!(
        "DELETE FROM applications WHERE updated_at_sec < ?1 RETURNING {COLUMNS}"
    ))?;
    let removed = stmt
        .query_map([cutoff_sec], from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(removed)
}
