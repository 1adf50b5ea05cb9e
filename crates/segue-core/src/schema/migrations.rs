/// A schema migration.
#[derive(Debug)]
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    pub sql: &'static str,
}

const MIGRATION_001: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Attribute bundles keyed by catalog track id
CREATE TABLE IF NOT EXISTS track_attributes (
    track_id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    artist TEXT NOT NULL,
    bundle TEXT NOT NULL,
    cached_at TEXT NOT NULL
);
"#;

const MIGRATION_002: &str = r#"
-- One row per pipeline run
CREATE TABLE IF NOT EXISTS recommendation_runs (
    run_id TEXT PRIMARY KEY,
    origin_track_id TEXT NOT NULL,
    origin_title TEXT NOT NULL,
    origin_artist TEXT NOT NULL,
    discovery_type TEXT NOT NULL,
    requested INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_runs_created_at ON recommendation_runs(created_at);

-- Resolved tracks in output order
CREATE TABLE IF NOT EXISTS recommended_tracks (
    run_id TEXT NOT NULL REFERENCES recommendation_runs(run_id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    track_id TEXT NOT NULL,
    title TEXT NOT NULL,
    artist TEXT NOT NULL,
    candidate_title TEXT NOT NULL,
    candidate_artist TEXT NOT NULL,
    PRIMARY KEY (run_id, position)
);
"#;

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "track_attributes",
        sql: MIGRATION_001,
    },
    Migration {
        version: 2,
        name: "recommendation_history",
        sql: MIGRATION_002,
    },
];
