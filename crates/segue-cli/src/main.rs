use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use segue_core::DiscoveryType;
use segue_discover::sources::ElementKind;
use segue_discover::Config;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "segue", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the database (default: ~/.local/share/segue/segue.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Recommend tracks related to an origin track
    ///
    /// Gathers attributes for the origin (audio characteristics from
    /// TheAudioDB, lyrics from Genius and a lyric analysis from Gemini),
    /// asks Gemini for similar tracks and resolves each suggestion against
    /// the Spotify catalog.
    ///
    /// Attributes are cached by track id; --refresh fetches them again.
    /// Every run is recorded and can be listed with 'segue history'.
    ///
    /// Output: the resolved tracks in the model's order, followed by any
    /// suggestions that could not be found in the catalog.
    ///
    /// Press Ctrl-C to stop at the next stage.
    Recommend(commands::recommend::RecommendArgs),

    /// Show the attribute bundle for a track as JSON
    Attributes {
        #[command(flatten)]
        origin: commands::origin::OriginArgs,

        /// Fetch again even if cached
        #[arg(long)]
        refresh: bool,
    },

    /// Look up a Spotify id, URI or link
    Describe {
        /// Id, `spotify:` URI or open.spotify.com link
        id: String,

        /// Element kind; each kind is tried in turn when omitted
        #[arg(long)]
        kind: Option<ElementKind>,
    },

    /// Check that the generative backend answers
    Health,

    /// List past recommendation runs
    History {
        /// Number of runs to show
        #[arg(long, short, default_value_t = 10)]
        limit: usize,

        /// Show the tracks of one run
        #[arg(long)]
        run: Option<String>,
    },

    /// Manage the attribute cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// List the discovery types
    Discovery,
}

#[derive(Debug, clap::Subcommand)]
enum CacheAction {
    /// Show cache statistics
    Status,
    /// Remove every cached attribute bundle
    Clear,
}

#[derive(Debug, clap::Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Print an example config file
    Example,
    /// Create the config file if it does not exist
    Init,
    /// Print one value, or the whole file
    Get { key: Option<String> },
    /// Set a value in the config file
    Set { key: String, value: String },
}

fn init_logging(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .init();
}

/// Cancel `token` on Ctrl-C.
fn cancel_on_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted; stopping at the next stage");
            token.cancel();
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match cli.db {
        Some(db) => Config::load_with_db_path(db)?,
        None => Config::load()?,
    };
    init_logging(&config.log_level);

    // Ensure database directory exists
    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    match cli.command {
        Commands::Recommend(args) => {
            let cancel = CancellationToken::new();
            cancel_on_interrupt(cancel.clone());
            commands::recommend::run_recommend(&config, args, cancel).await?;
        }
        Commands::Attributes { origin, refresh } => {
            commands::attributes::show_attributes(&config, origin, refresh).await?;
        }
        Commands::Describe { id, kind } => {
            commands::describe::run_describe(&config, &id, kind).await?;
        }
        Commands::Health => {
            commands::health::run_health(&config).await?;
        }
        Commands::History { limit, run } => {
            commands::history::show_history(&config.database_path, limit, run.as_deref())?;
        }
        Commands::Cache { action } => match action {
            CacheAction::Status => commands::cache::show_status(&config.database_path)?,
            CacheAction::Clear => commands::cache::clear(&config.database_path)?,
        },
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show_config(&config)?,
            ConfigAction::Path => commands::config::show_path()?,
            ConfigAction::Example => commands::config::show_example()?,
            ConfigAction::Init => commands::config::init_config()?,
            ConfigAction::Get { key } => commands::config::get_config(&config, key.as_deref())?,
            ConfigAction::Set { key, value } => commands::config::set_config(&key, &value)?,
        },
        Commands::Discovery => {
            for discovery_type in DiscoveryType::ALL {
                println!("{:<12} {}", discovery_type.slug(), discovery_type.phrase());
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn recommend(args: &[&str]) -> clap::error::Result<commands::recommend::RecommendArgs> {
        let argv = ["segue", "recommend"].iter().chain(args);
        match Cli::try_parse_from(argv)?.command {
            Commands::Recommend(args) => Ok(args),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_track_id_flag() {
        let args = recommend(&["--track-id", "spotify:track:3BQHpFgAp4l80e1XslIjNI"]).unwrap();
        assert_eq!(
            args.origin.track_id.as_deref(),
            Some("spotify:track:3BQHpFgAp4l80e1XslIjNI")
        );
        assert!(recommend(&["--track", "3BQHpFgAp4l80e1XslIjNI"]).is_err());
    }

    #[test]
    fn test_track_id_conflicts_with_title() {
        let result = recommend(&[
            "--track-id",
            "3BQHpFgAp4l80e1XslIjNI",
            "--title",
            "Yesterday",
            "--artist",
            "The Beatles",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_new_playlist_flag() {
        let args = recommend(&["--track-id", "x", "--new-playlist", "Like Yesterday"]).unwrap();
        assert_eq!(args.new_playlist.as_deref(), Some("Like Yesterday"));
        assert!(!args.default_playlist);
    }

    #[test]
    fn test_delivery_targets_are_exclusive() {
        assert!(recommend(&["--track-id", "x", "--default-playlist"]).is_ok());
        assert!(recommend(&["--track-id", "x", "--default-playlist", "--queue"]).is_err());
        assert!(recommend(&["--track-id", "x", "--new-playlist", "A", "--playlist", "p1"]).is_err());
        assert!(recommend(&["--track-id", "x", "--replace"]).is_err());
    }
}
