//! Integration tests for the on-disk attribute cache and run history.

use segue_core::schema::Database;
use segue_core::{
    AttributeBundle, CatalogAttributes, DiscoveryType, RecommendationCandidate, ResolvedTrack,
    RunId, TrackReference,
};
use tempfile::TempDir;

/// Data written by one connection is visible after reopening the file
#[test]
fn test_attributes_survive_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("segue.db");
    let track = TrackReference::new("3BQHpFgAp4l80e1XslIjNI", "Yesterday", "The Beatles");
    let bundle = AttributeBundle {
        catalog_attributes: Some(CatalogAttributes {
            duration_secs: Some(125),
            genre: Some("Pop".to_string()),
            ..CatalogAttributes::default()
        }),
        lyrics: Some(vec!["Verse 1]\nYesterday, all my troubles seemed so far away".to_string()]),
        lyric_attributes: None,
    };

    {
        let db = Database::open(&db_path).expect("Failed to open database");
        db.put_attributes(&track, &bundle).unwrap();
    }

    let db = Database::open(&db_path).expect("Failed to reopen database");
    let cached = db.get_attributes(track.id()).unwrap().unwrap();
    assert_eq!(cached.bundle, bundle);
    assert_eq!(cached.artist, "The Beatles");
}

/// Reopening an existing database does not reapply migrations
#[test]
fn test_migrations_are_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("segue.db");

    drop(Database::open(&db_path).unwrap());
    let db = Database::open(&db_path).unwrap();

    let count: i64 = db
        .conn()
        .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(count, 2);
}

/// History on an empty database is empty, and runs list newest first
#[test]
fn test_history_ordering() {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::open(temp_dir.path().join("segue.db")).unwrap();
    assert!(db.list_runs(10).unwrap().is_empty());

    let origin = TrackReference::new("o1", "Yesterday", "The Beatles");
    let first = RunId::new();
    let second = RunId::new();
    let track = ResolvedTrack::new(
        0,
        RecommendationCandidate::new("Let It Be", "The Beatles"),
        TrackReference::new("t1", "Let It Be", "The Beatles"),
    );

    db.record_run(first, &origin, DiscoveryType::SameMusic, 1, &[track.clone()])
        .unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    db.record_run(second, &origin, DiscoveryType::SameMood, 1, &[])
        .unwrap();

    let runs = db.list_runs(10).unwrap();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].run_id, second);
    assert_eq!(runs[0].resolved, 0);
    assert_eq!(runs[1].run_id, first);
    assert_eq!(runs[1].resolved, 1);

    assert_eq!(db.list_runs(1).unwrap().len(), 1);
}
