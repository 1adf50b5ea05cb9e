use anyhow::Result;
use std::path::Path;

use segue_core::schema::Database;
use segue_core::RunId;

/// List recent runs, or the tracks of one run.
pub fn show_history(db_path: &Path, limit: usize, run: Option<&str>) -> Result<()> {
    let db = Database::open(db_path)?;

    if let Some(run) = run {
        let run_id: RunId = run.parse()?;
        let tracks = db.tracks_for_run(run_id)?;
        if tracks.is_empty() {
            println!("No tracks recorded for run {run_id}");
        }
        for resolved in tracks {
            println!(
                "{:>3}. {}  [{}]",
                resolved.position + 1,
                resolved.track,
                resolved.track.id()
            );
        }
        return Ok(());
    }

    let runs = db.list_runs(limit)?;
    if runs.is_empty() {
        println!("No runs yet. Try `segue recommend --title ... --artist ...`");
        return Ok(());
    }

    println!("\n📜 Recent runs\n");
    for summary in runs {
        println!(
            "  {}  {}  {} {}  {}/{} tracks  ({})",
            summary.created_at.format("%Y-%m-%d %H:%M"),
            summary.run_id,
            summary.discovery_type.phrase(),
            summary.origin,
            summary.resolved,
            summary.requested,
            summary.origin.id(),
        );
    }

    Ok(())
}
