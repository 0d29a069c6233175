//! SQL schema for the board.
//!
//! Two tables with referential integrity: deleting a group cascades to its
//! applications. Timestamps are epoch seconds.

/// Complete v1 schema.
pub const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS groups (
    id TEXT PRIMARY KEY,
    creator TEXT NOT NULL,
    title TEXT NOT NULL,
    kill_proof_id TEXT,
    kill_proof_minimum INTEGER NOT NULL DEFAULT 0,
    created_at_sec INTEGER NOT NULL,
    updated_at_sec INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS applications (
    id TEXT PRIMARY KEY,
    group_id TEXT NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
    applicant TEXT NOT NULL,
    created_at_sec INTEGER NOT NULL,
    updated_at_sec INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_groups_creator ON groups(creator);
CREATE INDEX IF NOT EXISTS idx_applications_group ON applications(group_id);
"#;
