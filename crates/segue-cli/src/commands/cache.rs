use anyhow::Result;
use std::path::Path;

use segue_core::schema::Database;

pub fn show_status(db_path: &Path) -> Result<()> {
    let db = Database::open(db_path)?;

    println!("\n📊 Segue Cache\n");
    println!("  Database: {}", db_path.display());
    println!("  Cached attribute bundles: {}", db.count_attributes()?);
    println!("  Recorded runs: {}", db.count_runs()?);

    Ok(())
}

pub fn clear(db_path: &Path) -> Result<()> {
    let db = Database::open(db_path)?;
    let removed = db.clear_attributes()?;
    println!("✓ Removed {removed} cached attribute bundles");
    Ok(())
}
