//! Shared domain entities for the LFG backend.
//!
//! Every other crate in the workspace consumes these types: the store
//! persists [`Group`] and [`Application`], the gateway broadcasts
//! [`GroupsUpdate`] and [`ApplicationUpdate`] to subscribers, and the
//! upstream clients produce [`KillProof`] aggregates.
//!
//! Timestamps are Unix epoch seconds throughout; they are assigned by the
//! server, never by clients.

pub mod entities;
pub mod sync;

pub use entities::{
    Application, ApplicationUpdate, ClientInfo, Group, GroupsUpdate, KillProof,
};
pub use sync::SyncMap;

use std::time::{SystemTime, UNIX_EPOCH};

/// Current time as Unix epoch seconds.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Generate a fresh opaque id for a group or application.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
