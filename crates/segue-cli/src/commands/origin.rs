use anyhow::{Context, Result};
use segue_core::schema::Database;
use segue_core::{AttributeBundle, TrackReference};
use segue_discover::sources::{CatalogSearch, ElementKind};
use segue_discover::{AttributeGateway, Clients};

/// How the user names the origin track.
#[derive(Debug, Clone, clap::Args)]
#[group(required = true, multiple = true)]
pub struct OriginArgs {
    /// Origin track title
    #[arg(long, requires = "artist", conflicts_with = "track_id")]
    pub title: Option<String>,

    /// Origin track artist
    #[arg(long, requires = "title", conflicts_with = "track_id")]
    pub artist: Option<String>,

    /// Origin track as a Spotify id, URI or link
    #[arg(long)]
    pub track_id: Option<String>,
}

/// Find the origin in the catalog.
pub async fn resolve_origin(clients: &Clients, args: &OriginArgs) -> Result<TrackReference> {
    if let Some(input) = &args.track_id {
        let (kind, id) = ElementKind::parse_link(input);
        if kind.is_some_and(|k| k != ElementKind::Track) {
            anyhow::bail!("{input} is not a track");
        }
        return clients
            .spotify
            .get_track(&id)
            .await
            .context("Failed to look up origin track")?
            .ok_or_else(|| anyhow::anyhow!("No track with id {id}"));
    }

    let (Some(title), Some(artist)) = (&args.title, &args.artist) else {
        anyhow::bail!("Give either --track-id or both --title and --artist");
    };
    clients
        .spotify
        .search_track(title, artist)
        .await
        .context("Failed to search for origin track")?
        .ok_or_else(|| anyhow::anyhow!("No catalog match for {title} - {artist}"))
}

/// Cached attributes for `origin`, or freshly fetched ones (then cached).
pub async fn load_attributes(
    db: &Database,
    gateway: &AttributeGateway,
    origin: &TrackReference,
    refresh: bool,
) -> Result<AttributeBundle> {
    if !refresh {
        if let Some(cached) = db.get_attributes(origin.id())? {
            log::info!(
                "Using attributes for {origin} cached at {}",
                cached.cached_at.format("%Y-%m-%d %H:%M")
            );
            return Ok(cached.bundle);
        }
    }

    let fetched = gateway.fetch(origin).await;
    if fetched.worth_caching() {
        db.put_attributes(origin, &fetched.bundle)?;
    } else if fetched.bundle.is_empty() {
        log::warn!("No attributes found for {origin}");
    } else {
        log::warn!(
            "Not caching attributes for {origin}; failed sources: {}",
            fetched.failed.join(", ")
        );
    }
    let bundle = fetched.bundle;
    Ok(bundle)
}
