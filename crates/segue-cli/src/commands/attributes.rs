use anyhow::Result;
use segue_core::schema::Database;
use segue_discover::{Clients, Config};

use super::origin::{load_attributes, resolve_origin, OriginArgs};

/// Print the attribute bundle for a track.
pub async fn show_attributes(config: &Config, origin: OriginArgs, refresh: bool) -> Result<()> {
    let clients = Clients::from_config(config)?;
    let db = Database::open(&config.database_path)?;

    let origin = resolve_origin(&clients, &origin).await?;
    eprintln!("Origin: {origin} ({})", origin.id());

    let bundle = load_attributes(&db, &clients.gateway()?, &origin, refresh).await?;
    println!("{}", serde_json::to_string_pretty(&bundle)?);

    Ok(())
}
