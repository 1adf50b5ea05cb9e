use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use segue_core::schema::Database;
use segue_core::{DiscoveryRequest, DiscoveryType};
use segue_discover::sources::{ElementKind, PlaylistEditor};
use segue_discover::{
    Clients, Config, PipelineError, PlaylistSink, QueueSink, RunReport, SourceError, TrackSink,
};

use super::origin::{load_attributes, resolve_origin, OriginArgs};

#[derive(Debug, clap::Args)]
pub struct RecommendArgs {
    #[command(flatten)]
    pub origin: OriginArgs,

    /// Relation between the origin and the recommendations
    #[arg(long, short, default_value = "same-music")]
    pub discovery: DiscoveryType,

    /// Number of recommendations (default: default_limit from config)
    #[arg(long, short)]
    pub limit: Option<usize>,

    /// Add the results to this playlist (id, URI or link)
    #[arg(long, group = "target")]
    pub playlist: Option<String>,

    /// Replace the playlist contents instead of appending
    #[arg(long, requires = "playlist")]
    pub replace: bool,

    /// Put the results in a new private playlist with this name
    #[arg(long, value_name = "NAME", group = "target")]
    pub new_playlist: Option<String>,

    /// Replace the contents of the playlist named by default_playlist
    #[arg(long, group = "target")]
    pub default_playlist: bool,

    /// Add the results to the play queue
    #[arg(long, group = "target")]
    pub queue: bool,

    /// Fetch origin attributes again even if cached
    #[arg(long)]
    pub refresh: bool,
}

pub async fn run_recommend(
    config: &Config,
    args: RecommendArgs,
    cancel: CancellationToken,
) -> Result<()> {
    let clients = Clients::from_config(config)?;
    let pipeline = clients.pipeline(cancel)?;
    let db = Database::open(&config.database_path)?;
    let limit = args.limit.unwrap_or(config.default_limit);

    let origin = resolve_origin(&clients, &args.origin).await?;
    println!(
        "Finding {limit} tracks with {} {origin}\n",
        args.discovery.phrase()
    );

    let attributes = load_attributes(&db, pipeline.gateway(), &origin, args.refresh).await?;
    let request = DiscoveryRequest::new(args.discovery, origin, limit, attributes)?;

    let report = match pipeline.run_request(request).await {
        Ok(report) => report,
        Err(PipelineError::RecommendationRejected(rejection)) => {
            anyhow::bail!("The model declined: {}", rejection.message)
        }
        Err(PipelineError::BackendUnavailable(source)) => {
            let hint = backend_hint(&source);
            return Err(anyhow::Error::new(source)
                .context(format!("Generative backend unavailable. {hint}")));
        }
        Err(e) => return Err(e.into()),
    };

    print_report(&report);

    db.record_run(
        report.run_id,
        report.request.origin(),
        report.request.discovery_type(),
        report.request.limit(),
        &report.tracks,
    )?;

    if report.tracks.is_empty() {
        return Ok(());
    }

    let editor: Arc<dyn PlaylistEditor> = clients.spotify.clone();
    if args.queue {
        let queued = QueueSink::new(editor)
            .deliver(&report.tracks)
            .await
            .context("Failed to queue tracks")?;
        println!("\n✓ Queued {queued} of {} tracks", report.tracks.len());
    } else if let Some(sink) = playlist_sink(editor, &args, config).await? {
        let added = sink
            .deliver(&report.tracks)
            .await
            .context("Failed to update playlist")?;
        println!("\n✓ Added {added} tracks to playlist {}", sink.playlist_id());
    }

    Ok(())
}

/// What to tell the user when the generative backend fails.
fn backend_hint(err: &SourceError) -> &'static str {
    match err {
        SourceError::MissingCredential { .. }
        | SourceError::Http {
            status: Some(401 | 403),
            ..
        } => "Check gemini_api_key.",
        SourceError::Http {
            status: Some(400 | 404),
            ..
        } => "Check gemini_model.",
        e if e.is_transient() => "The backend is busy or unreachable; try again later.",
        _ => "Check your network connection.",
    }
}

/// The playlist the flags point at, if any.
async fn playlist_sink(
    editor: Arc<dyn PlaylistEditor>,
    args: &RecommendArgs,
    config: &Config,
) -> Result<Option<PlaylistSink>> {
    if let Some(playlist) = &args.playlist {
        let (_, playlist_id) = ElementKind::parse_link(playlist);
        let sink = PlaylistSink::new(editor, playlist_id);
        return Ok(Some(if args.replace { sink.replacing() } else { sink }));
    }

    if let Some(name) = &args.new_playlist {
        let sink = PlaylistSink::create(editor, name)
            .await
            .with_context(|| format!("Failed to create playlist {name}"))?;
        return Ok(Some(sink));
    }

    if args.default_playlist {
        let Some(name) = &config.default_playlist else {
            anyhow::bail!(
                "default_playlist is not set (use `segue config set default_playlist <name>`)"
            );
        };
        let sink = PlaylistSink::named(editor, name)
            .await
            .with_context(|| format!("Failed to find default playlist {name}"))?;
        return Ok(Some(sink));
    }

    Ok(None)
}

fn print_report(report: &RunReport) {
    if report.tracks.is_empty() {
        println!("No recommendations could be resolved.");
    }
    for (n, resolved) in report.tracks.iter().enumerate() {
        println!("{:>3}. {}", n + 1, resolved.track);
    }

    if !report.misses.is_empty() {
        println!("\nNot found in the catalog:");
        for miss in &report.misses {
            println!("     {} ({})", miss.candidate, miss.reason);
        }
    }

    if report.is_short() {
        println!(
            "\n{} of {} requested tracks (model suggested {})",
            report.tracks.len(),
            report.request.limit(),
            report.candidates
        );
    }
    println!("\nRun id: {}", report.run_id);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16) -> SourceError {
        SourceError::Http {
            source_name: "Gemini".to_string(),
            status: Some(status),
            message: String::new(),
        }
    }

    #[test]
    fn test_backend_hint() {
        assert_eq!(backend_hint(&http(403)), "Check gemini_api_key.");
        assert_eq!(backend_hint(&http(404)), "Check gemini_model.");
        assert!(backend_hint(&http(503)).contains("try again later"));
        assert!(backend_hint(&SourceError::RateLimited {
            source_name: "Gemini".to_string()
        })
        .contains("try again later"));
        assert!(backend_hint(&SourceError::Timeout {
            source_name: "Gemini".to_string()
        })
        .contains("try again later"));
    }
}
