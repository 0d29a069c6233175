//! SQLite persistence for groups and applications.
//!
//! The schema lives in [`schema`], the typed query layer in [`queries`], and
//! [`Store`] wraps a single connection behind an async mutex for use from
//! request handlers. WAL mode and foreign keys are switched on at open; the
//! in-memory constructor backs the test suites.

pub mod queries;
pub mod schema;

use std::path::Path;
use std::time::Instant;

use rusqlite::Connection;
use tokio::sync::Mutex;
use tracing::debug;

use lfg_types::{Application, Group};

pub use queries::touch::TouchResult;

/// Store error types.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Open a raw connection at `path` with pragmas and schema applied.
pub fn open_conn(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    configure(&conn)?;
    Ok(conn)
}

/// Open a raw in-memory connection (for testing).
pub fn open_memory_conn() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    Ok(conn)
}

fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;",
    )?;
    conn.execute_batch(schema::SCHEMA_V1)?;
    Ok(())
}

/// Handle to the board database.
///
/// The connection sits behind a `tokio::sync::Mutex`; each operation holds
/// the lock only for its own statement (the heartbeat touch holds it for its
/// one transaction).
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open or create the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            conn: Mutex::new(open_conn(path.as_ref())?),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn open_memory() -> Result<Self> {
        Ok(Self {
            conn: Mutex::new(open_memory_conn()?),
        })
    }

    pub async fn save_group(&self, group: &Group) -> Result<Group> {
        let start = Instant::now();
        let conn = self.conn.lock().await;
        let saved = queries::groups::save(&conn, group);
        debug!(elapsed_ms = start.elapsed().as_millis() as u64, "store.save_group");
        saved
    }

    pub async fn get_group(&self, id: &str) -> Result<Option<Group>> {
        let start = Instant::now();
        let conn = self.conn.lock().await;
        let group = queries::groups::get(&conn, id);
        debug!(elapsed_ms = start.elapsed().as_millis() as u64, "store.get_group");
        group
    }

    pub async fn list_groups(&self) -> Result<Vec<Group>> {
        let start = Instant::now();
        let conn = self.conn.lock().await;
        let groups = queries::groups::list(&conn);
        debug!(elapsed_ms = start.elapsed().as_millis() as u64, "store.list_groups");
        groups
    }

    pub async fn delete_group(&self, id: &str) -> Result<()> {
        let start = Instant::now();
        let conn = self.conn.lock().await;
        let result = queries::groups::delete(&conn, id);
        debug!(elapsed_ms = start.elapsed().as_millis() as u64, "store.delete_group");
        result
    }

    pub async fn delete_groups_updated_before(&self, cutoff_sec: i64) -> Result<Vec<Group>> {
        let start = Instant::now();
        let conn = self.conn.lock().await;
        let removed = queries::groups::delete_updated_before(&conn, cutoff_sec);
        debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            "store.delete_groups_updated_before"
        );
        removed
    }

    pub async fn save_application(
        &self,
        app: &Application,
        group_id: &str,
    ) -> Result<Application> {
        let start = Instant::now();
        let conn = self.conn.lock().await;
        let saved = queries::applications::save(&conn, app, group_id);
        debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            "store.save_application"
        );
        saved
    }

    pub async fn get_application(&self, id: &str) -> Result<Option<Application>> {
        let start = Instant::now();
        let conn = self.conn.lock().await;
        let app = queries::applications::get(&conn, id);
        debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            "store.get_application"
        );
        app
    }

    pub async fn delete_application(&self, id: &str) -> Result<()> {
        let start = Instant::now();
        let conn = self.conn.lock().await;
        let result = queries::applications::delete(&conn, id);
        debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            "store.delete_application"
        );
        result
    }

    pub async fn list_applications_for_group(&self, group_id: &str) -> Result<Vec<Application>> {
        let start = Instant::now();
        let conn = self.conn.lock().await;
        let apps = queries::applications::list_for_group(&conn, group_id);
        debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            "store.list_applications_for_group"
        );
        apps
    }

    pub async fn list_applications_for_account(
        &self,
        applicant: &str,
    ) -> Result<Vec<Application>> {
        let start = Instant::now();
        let conn = self.conn.lock().await;
        let apps = queries::applications::list_for_account(&conn, applicant);
        debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            "store.list_applications_for_account"
        );
        apps
    }

    pub async fn delete_applications_updated_before(
        &self,
        cutoff_sec: i64,
    ) -> Result<Vec<Application>> {
        let start = Instant::now();
        let conn = self.conn.lock().await;
        let removed = queries::applications::delete_updated_before(&conn, cutoff_sec);
        debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            "store.delete_applications_updated_before"
        );
        removed
    }

    /// Refresh `updated_at_sec` on every row owned by `account`, in one
    /// transaction.
    pub async fn touch_account(&self, account: &str, now_sec: i64) -> Result<TouchResult> {
        let start = Instant::now();
        let mut conn = self.conn.lock().await;
        let result = queries::touch::touch_account(&mut conn, account, now_sec);
        debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            "store.touch_account"
        );
        result
    }
}
