use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

use crate::error::{Error, Result};
use crate::model::{
    AttributeBundle, DiscoveryType, RecommendationCandidate, ResolvedTrack, RunId, TrackReference,
};

use super::migrations::MIGRATIONS;

/// An attribute bundle read back from the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedAttributes {
    pub track_id: String,
    pub title: String,
    pub artist: String,
    pub bundle: AttributeBundle,
    pub cached_at: DateTime<Utc>,
}

/// One stored pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub run_id: RunId,
    pub origin: TrackReference,
    pub discovery_type: DiscoveryType,
    pub requested: usize,
    pub resolved: usize,
    pub created_at: DateTime<Utc>,
}

/// A database connection holding the attribute cache and run history.
#[derive(Debug)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) a database at the given path and apply migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.apply_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.apply_migrations()?;
        Ok(db)
    }

    /// Get a reference to the underlying connection (for advanced queries).
    #[must_use]
    pub const fn conn(&self) -> &Connection {
        &self.conn
    }

    fn apply_migrations(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
            [],
        )?;

        let mut stmt = self
            .conn
            .prepare("SELECT version FROM schema_migrations ORDER BY version")?;
        let applied: Vec<u32> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for migration in MIGRATIONS {
            if !applied.contains(&migration.version) {
                log::info!(
                    "Applying migration {} ({})",
                    migration.version,
                    migration.name
                );
                self.conn.execute_batch(migration.sql)?;
                self.conn.execute(
                    "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
                    rusqlite::params![migration.version, migration.name],
                )?;
            }
        }

        Ok(())
    }
}

// Attribute cache
impl Database {
    /// Store (or replace) the bundle for a track.
    pub fn put_attributes(&self, track: &TrackReference, bundle: &AttributeBundle) -> Result<()> {
        self.conn.execute(
            "INSERT INTO track_attributes (track_id, title, artist, bundle, cached_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(track_id) DO UPDATE SET
                title = excluded.title,
                artist = excluded.artist,
                bundle = excluded.bundle,
                cached_at = excluded.cached_at",
            rusqlite::params![
                track.id(),
                track.title(),
                track.artist(),
                serde_json::to_string(bundle)?,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Look up the cached bundle for a track id.
    pub fn get_attributes(&self, track_id: &str) -> Result<Option<CachedAttributes>> {
        let row = self
            .conn
            .query_row(
                "SELECT track_id, title, artist, bundle, cached_at
                 FROM track_attributes WHERE track_id = ?1",
                [track_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((track_id, title, artist, bundle, cached_at)) = row else {
            return Ok(None);
        };

        Ok(Some(CachedAttributes {
            track_id,
            title,
            artist,
            bundle: serde_json::from_str(&bundle)?,
            cached_at: parse_timestamp(&cached_at)?,
        }))
    }

    /// Number of cached bundles.
    pub fn count_attributes(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM track_attributes", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Remove every cached bundle, returning how many were removed.
    pub fn clear_attributes(&self) -> Result<usize> {
        Ok(self.conn.execute("DELETE FROM track_attributes", [])?)
    }
}

// Run history
impl Database {
    /// Record a finished run and its resolved tracks in one transaction.
    pub fn record_run(
        &self,
        run_id: RunId,
        origin: &TrackReference,
        discovery_type: DiscoveryType,
        requested: usize,
        tracks: &[ResolvedTrack],
    ) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO recommendation_runs (
                run_id, origin_track_id, origin_title, origin_artist,
                discovery_type, requested, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                run_id.to_string(),
                origin.id(),
                origin.title(),
                origin.artist(),
                discovery_type.slug(),
                i64::try_from(requested).unwrap_or(i64::MAX),
                Utc::now().to_rfc3339(),
            ],
        )?;
        for resolved in tracks {
            tx.execute(
                "INSERT INTO recommended_tracks (
                    run_id, position, track_id, title, artist,
                    candidate_title, candidate_artist
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    run_id.to_string(),
                    i64::try_from(resolved.position).unwrap_or(i64::MAX),
                    resolved.track.id(),
                    resolved.track.title(),
                    resolved.track.artist(),
                    resolved.candidate.title,
                    resolved.candidate.artist,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Number of recorded runs.
    pub fn count_runs(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM recommendation_runs", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Most recent runs first.
    pub fn list_runs(&self, limit: usize) -> Result<Vec<RunSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT r.run_id, r.origin_track_id, r.origin_title, r.origin_artist,
                    r.discovery_type, r.requested, r.created_at,
                    (SELECT COUNT(*) FROM recommended_tracks t WHERE t.run_id = r.run_id)
             FROM recommendation_runs r
             ORDER BY r.created_at DESC
             LIMIT ?1",
        )?;

        let rows = stmt
            .query_map([i64::try_from(limit).unwrap_or(i64::MAX)], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    TrackReference::new(
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ),
                    row.get::<_, String>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, i64>(7)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(
                |(run_id, origin, discovery_type, requested, created_at, resolved)| {
                    Ok(RunSummary {
                        run_id: run_id.parse()?,
                        origin,
                        discovery_type: discovery_type.parse()?,
                        requested: usize::try_from(requested).unwrap_or(0),
                        resolved: usize::try_from(resolved).unwrap_or(0),
                        created_at: parse_timestamp(&created_at)?,
                    })
                },
            )
            .collect()
    }

    /// Resolved tracks of a run, in output order.
    pub fn tracks_for_run(&self, run_id: RunId) -> Result<Vec<ResolvedTrack>> {
        let mut stmt = self.conn.prepare(
            "SELECT position, track_id, title, artist, candidate_title, candidate_artist
             FROM recommended_tracks
             WHERE run_id = ?1
             ORDER BY position",
        )?;

        let tracks = stmt
            .query_map([run_id.to_string()], |row| {
                let position: i64 = row.get(0)?;
                Ok(ResolvedTrack::new(
                    usize::try_from(position).unwrap_or(0),
                    RecommendationCandidate::new(row.get::<_, String>(4)?, row.get::<_, String>(5)?),
                    TrackReference::new(
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ),
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(tracks)
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::InvalidData(format!("bad timestamp {value}: {e}")))
}
