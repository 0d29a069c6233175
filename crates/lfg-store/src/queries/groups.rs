//! Group queries.

use lfg_types::Group;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::Result;

const COLUMNS: &str =
    "id, creator, title, kill_proof_id, kill_proof_minimum, created_at_sec, updated_at_sec";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: row.get(0)?,
        creator: row.get(1)?,
        title: row.get(2)?,
        kill_proof_id: row.get(3)?,
        kill_proof_minimum: row.get::<_, i64>(4)? as u32,
        created_at_sec: row.get(5)?,
        updated_at_sec: row.get(6)?,
    })
}

/// Upsert a group by id and return the stored row.
///
/// On conflict the mutable fields and `updated_at_sec` are refreshed while
/// `created_at_sec` keeps its original value.
pub fn save(conn: &Connection, group: &Group) -> Result<Group> {
    let saved = conn.query_row(
        &format!(
            "INSERT INTO groups ({COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                 title = excluded.title,
                 kill_proof_id = excluded.kill_proof_id,
                 kill_proof_minimum = excluded.kill_proof_minimum,
                 updated_at_sec = excluded.updated_at_sec
             RETURNING {COLUMNS}"
        ),
        params![
            group.id,
            group.creator,
            group.title,
            group.kill_proof_id,
            group.kill_proof_minimum as i64,
            group.created_at_sec,
            group.updated_at_sec,
        ],
        from_row,
    )?;
    Ok(saved)
}

/// Fetch a group by id.
pub fn get(conn: &Connection, id: &str) -> Result<Option<Group>> {
    let group = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM groups WHERE id = ?1"),
            [id],
            from_row,
        )
        .optional()?;
    Ok(group)
}

/// List every group, most recently updated first.
pub fn list(conn: &Connection) -> Result<Vec<Group>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM groups ORDER BY updated_at_sec DESC"
    ))?;
    let groups = stmt
        .query_map([], from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(groups)
}

/// Delete a group by id. Applications referencing it are removed by the
/// foreign-key cascade.
pub fn delete(conn: &Connection, id: &str) -> Result<()> {
    conn.execute("DELETE FROM groups WHERE id = ?1", [id])?;
    Ok(())
}

/// Delete every group last updated strictly before `cutoff_sec`, returning
/// the removed rows.
pub fn delete_updated_before(conn: &Connection, cutoff_sec: i64) -> Result<Vec<Group>> {
    let mut stmt = conn.prepare(&format!(
        "DELETE FROM groups WHERE updated_at_sec < ?1 RETURNING {COLUMNS}"
    ))?;
    let removed = stmt
        .query_map([cutoff_sec], from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_conn() -> Connection {
        crate::open_memory_conn().expect("open test db")
    }

    fn group(id: &str, creator: &str, updated_at: i64) -> Group {
        Group {
            id: id.into(),
            creator: creator.into(),
            title: "fresh clears".into(),
            kill_proof_id: None,
            kill_proof_minimum: 0,
            created_at_sec: updated_at,
            updated_at_sec: updated_at,
        }
    }

    #[test]
    fn save_and_get() {
        let conn = test_conn();
        let saved = save(&conn, &group("g1", "A", 100)).unwrap();
        assert_eq!(saved.creator, "A");
        assert_eq!(get(&conn, "g1").unwrap(), Some(saved));
        assert_eq!(get(&conn, "missing").unwrap(), None);
    }

    #[test]
    fn upsert_preserves_created_at() {
        let conn = test_conn();
        save(&conn, &group("g1", "A", 100)).unwrap();

        let mut updated = group("g1", "A", 100);
        updated.title = "new title".into();
        updated.kill_proof_id = Some("li".into());
        updated.kill_proof_minimum = 250;
        updated.created_at_sec = 999; // must be ignored on update
        updated.updated_at_sec = 200;

        let saved = save(&conn, &updated).unwrap();
        assert_eq!(saved.created_at_sec, 100);
        assert_eq!(saved.updated_at_sec, 200);
        assert_eq!(saved.title, "new title");
        assert_eq!(saved.kill_proof_minimum, 250);
    }

    #[test]
    fn list_orders_by_updated_at_desc() {
        let conn = test_conn();
        save(&conn, &group("g1", "A", 100)).unwrap();
        save(&conn, &group("g2", "B", 300)).unwrap();
        save(&conn, &group("g3", "C", 200)).unwrap();

        let ids: Vec<_> = list(&conn).unwrap().into_iter().map(|g| g.id).collect();
        assert_eq!(ids, vec!["g2", "g3", "g1"]);
    }

    #[test]
    fn delete_updated_before_returns_removed_rows() {
        let conn = test_conn();
        save(&conn, &group("g1", "A", 100)).unwrap();
        save(&conn, &group("g2", "B", 300)).unwrap();

        let removed = delete_updated_before(&conn, 200).unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].id, "g1");
        assert_eq!(list(&conn).unwrap().len(), 1);
    }
}
