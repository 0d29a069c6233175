//! The heartbeat touch: one transaction refreshing every row the account
//! owns.

use lfg_types::{Application, Group};
use rusqlite::Connection;

use crate::Result;

/// Rows refreshed by a touch.
#[derive(Debug, Default)]
pub struct TouchResult {
    pub groups: Vec<Group>,
    pub applications: Vec<Application>,
}

/// Set `updated_at_sec = now_sec` on every group created by `account` and
/// every application submitted by `account`, returning both sets of updated
/// rows. Runs in a single transaction: either both tables are refreshed or
/// neither is.
pub fn touch_account(conn: &mut Connection, account: &str, now_sec: i64) -> Result<TouchResult> {
    let tx = conn.transaction()?;
    let mut result = TouchResult::default();

    {
        let mut stmt = tx.prepare(
            "UPDATE groups SET updated_at_sec = ?1 WHERE creator = ?2
             RETURNING id, creator, title, kill_proof_id, kill_proof_minimum,
                       created_at_sec, updated_at_sec",
        )?;
        result.groups = stmt
            .query_map((now_sec, account), |row| {
                Ok(Group {
                    id: row.get(0)?,
                    creator: row.get(1)?,
                    title: row.get(2)?,
                    kill_proof_id: row.get(3)?,
                    kill_proof_minimum: row.get::<_, i64>(4)? as u32,
                    created_at_sec: row.get(5)?,
                    updated_at_sec: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
    }

    {
        let mut stmt = tx.prepare(
            "UPDATE applications SET updated_at_sec = ?1 WHERE applicant = ?2
             RETURNING id, group_id, applicant, created_at_sec, updated_at_sec",
        )?;
        result.applications = stmt
            .query_map((now_sec, account), |row| {
                Ok(Application {
                    id: row.get(0)?,
                    group_id: row.get(1)?,
                    applicant: row.get(2)?,
                    created_at_sec: row.get(3)?,
                    updated_at_sec: row.get(4)?,
                    kill_proof: None,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
    }

    tx.commit()?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::{applications, groups};

    fn seed(conn: &Connection) {
        groups::save(
            conn,
            &Group {
                id: "g1".into(),
                creator: "A".into(),
                title: "t".into(),
                kill_proof_id: None,
                kill_proof_minimum: 0,
                created_at_sec: 100,
                updated_at_sec: 100,
            },
        )
        .unwrap();
        groups::save(
            conn,
            &Group {
                id: "g2".into(),
                creator: "B".into(),
                title: "t".into(),
                kill_proof_id: None,
                kill_proof_minimum: 0,
                created_at_sec: 100,
                updated_at_sec: 100,
            },
        )
        .unwrap();
        applications::save(
            conn,
            &Application {
                id: "a1".into(),
                group_id: "g2".into(),
                applicant: "A".into(),
                created_at_sec: 100,
                updated_at_sec: 100,
                kill_proof: None,
            },
            "g2",
        )
        .unwrap();
    }

    #[test]
    fn touch_refreshes_owned_rows_only() {
        let mut conn = crate::open_memory_conn().unwrap();
        seed(&conn);

        let result = touch_account(&mut conn, "A", 500).unwrap();
        assert_eq!(result.groups.len(), 1);
        assert_eq!(result.applications.len(), 1);
        assert_eq!(result.groups[0].updated_at_sec, 500);
        assert_eq!(result.applications[0].updated_at_sec, 500);

        // B's group was left alone.
        let untouched = groups::get(&conn, "g2").unwrap().unwrap();
        assert_eq!(untouched.updated_at_sec, 100);
    }

    #[test]
    fn touch_with_no_rows_is_empty() {
        let mut conn = crate::open_memory_conn().unwrap();
        seed(&conn);

        let result = touch_account(&mut conn, "nobody", 500).unwrap();
        assert!(result.groups.is_empty());
        assert!(result.applications.is_empty());
    }
}
