use anyhow::{Context, Result};
use confyg::{env, Confygery};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Configuration for segue.
///
/// Configuration is loaded from multiple sources with the following priority:
/// 1. CLI arguments (highest priority)
/// 2. Environment variables (SEGUE_* prefix)
/// 3. Config file (~/.config/segue/config.toml)
/// 4. Built-in defaults (lowest priority)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Spotify client id for catalog search.
    ///
    /// Can be set via:
    /// - ENV: SEGUE_SPOTIFY_CLIENT_ID
    /// - Config: spotify_client_id = "..."
    pub spotify_client_id: Option<String>,

    /// Spotify client secret for catalog search.
    pub spotify_client_secret: Option<String>,

    /// Spotify user token, needed to edit playlists and the play queue.
    pub spotify_user_token: Option<String>,

    /// Gemini API key for the generative backend.
    pub gemini_api_key: Option<String>,

    /// Gemini model name.
    pub gemini_model: String,

    /// Genius access token. Without it lyrics are unavailable.
    pub genius_access_token: Option<String>,

    /// TheAudioDB API key.
    pub audiodb_api_key: String,

    /// JSON schema for lyric analysis. The built-in schema is used when unset.
    pub lyric_schema_path: Option<PathBuf>,

    /// Name of the playlist `recommend --default-playlist` empties and
    /// refills.
    pub default_playlist: Option<String>,

    /// Recommendations per run.
    #[serde(deserialize_with = "number_or_string")]
    pub default_limit: usize,

    /// Number of candidates resolved at once.
    #[serde(deserialize_with = "number_or_string")]
    pub resolve_concurrency: usize,

    /// Per-request HTTP timeout in seconds.
    #[serde(deserialize_with = "number_or_string")]
    pub request_timeout_secs: u64,

    /// Path to the SQLite database.
    ///
    /// Can be set via:
    /// - CLI: --db /path/to/db
    /// - ENV: SEGUE_DATABASE_PATH
    /// - Config: database_path = "/path/to/db"
    /// - Default: ~/.local/share/segue/segue.db
    pub database_path: PathBuf,

    /// Default log filter when RUST_LOG is unset.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            spotify_client_id: None,
            spotify_client_secret: None,
            spotify_user_token: None,
            gemini_api_key: None,
            gemini_model: crate::sources::gemini::DEFAULT_MODEL.to_string(),
            genius_access_token: None,
            audiodb_api_key: "2".to_string(),
            lyric_schema_path: None,
            default_playlist: None,
            default_limit: 10,
            resolve_concurrency: 4,
            request_timeout_secs: 30,
            database_path: default_db_path(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Searches for config file at: ~/.config/segue/config.toml
    /// Reads environment variables with SEGUE_ prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let config_path = config_file_path();

        let mut builder = Confygery::new().context("Failed to create config builder")?;

        if config_path.exists() {
            let path_str = config_path
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("Config path contains invalid UTF-8"))?;
            builder
                .add_file(path_str)
                .context("Failed to load config file")?;
        }

        let env_opts = env::Options::with_top_level("segue");
        builder
            .add_env(env_opts)
            .context("Failed to load environment variables")?;

        let config: Self = builder.build().context("Failed to build configuration")?;

        Ok(config)
    }

    /// Load configuration with custom database path.
    ///
    /// This is used when the --db CLI flag is provided.
    pub fn load_with_db_path(db_path: PathBuf) -> Result<Self> {
        let mut config = Self::load()?;
        config.database_path = db_path;
        Ok(config)
    }

    /// The HTTP timeout as a duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Read the lyric-analysis schema, falling back to the built-in one.
    pub fn lyric_schema(&self) -> Result<serde_json::Value> {
        match &self.lyric_schema_path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("Invalid JSON schema in {}", path.display()))
            }
            None => Ok(segue_core::recommend::lyrics::default_schema()),
        }
    }
}

// Environment overrides arrive as strings.
fn number_or_string<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Deserialize<'de>,
    T::Err: std::fmt::Display,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw<T> {
        Number(T),
        Text(String),
    }

    match Raw::<T>::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Get the default database path.
///
/// Returns: ~/.local/share/segue/segue.db (or platform equivalent)
fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("segue")
        .join("segue.db")
}

/// Get the config file path.
///
/// Returns:
/// - Linux: ~/.config/segue/config.toml
/// - macOS: ~/Library/Application Support/segue/config.toml
/// - Windows: %APPDATA%\segue\config.toml
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("segue")
        .join("config.toml")
}

/// Get the example config file content.
pub fn example_config() -> &'static str {
    r#"# Segue Configuration File
#
# Configuration is loaded from multiple sources with the following priority:
# 1. CLI arguments (highest priority)
# 2. Environment variables (SEGUE_* prefix)
# 3. This config file
# 4. Built-in defaults (lowest priority)

# Spotify app credentials, used for catalog search
# Create an app at: https://developer.spotify.com/dashboard
#spotify_client_id = "your-client-id"
#spotify_client_secret = "your-client-secret"

# Spotify user token with playlist-modify and user-modify-playback-state
# scopes. Only needed for --playlist and --queue.
#spotify_user_token = "..."

# Gemini API key for recommendations and lyric analysis
#gemini_api_key = "..."
#gemini_model = "gemini-2.0-flash-lite"

# Genius access token. Without it lyrics are skipped.
#genius_access_token = "..."

# TheAudioDB key ("2" is the public test key)
#audiodb_api_key = "2"

# JSON schema describing the lyric attributes to extract
#lyric_schema_path = "/path/to/schema.json"

# Playlist replaced by `segue recommend --default-playlist`
#default_playlist = "Segue"

#default_limit = 10
#resolve_concurrency = 4
#request_timeout_secs = 30

# Path to the SQLite database (attribute cache and run history)
#
# Can also be set via:
# - CLI: segue --db /custom/path.db recommend ...
# - Environment: SEGUE_DATABASE_PATH=/custom/path.db
#database_path = "/path/to/custom/segue.db"

# Default log filter; RUST_LOG takes precedence
#log_level = "info"
"#
}

/// Create default config file if it doesn't exist.
///
/// Returns true if a new file was created, false if it already existed.
pub fn ensure_config_file() -> Result<bool> {
    let config_path = config_file_path();

    if config_path.exists() {
        return Ok(false);
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    std::fs::write(&config_path, example_config()).context("Failed to write config file")?;

    Ok(true)
}
