//! Collaborator contracts and their HTTP implementations.
//!
//! Every component takes its sources as trait objects, so tests swap in
//! fakes and the binary wires up the real clients.

pub mod analysis;
pub mod audiodb;
pub mod gemini;
pub mod genius;
pub mod spotify;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;

use segue_core::{CatalogAttributes, TrackReference};

use crate::error::{SourceError, SourceResult};

pub use analysis::{GenerativeLyricAnalyzer, SkipAnalysis};
pub use audiodb::AudioDbClient;
pub use gemini::GeminiClient;
pub use genius::GeniusClient;
pub use spotify::{CatalogElement, ElementKind, KindLookup, SpotifyClient};

const USER_AGENT: &str = concat!("segue/", env!("CARGO_PKG_VERSION"));

/// Catalog search on the streaming service.
#[async_trait]
pub trait CatalogSearch: Send + Sync {
    /// Best match for a title and artist, if any.
    async fn search_track(&self, title: &str, artist: &str)
        -> SourceResult<Option<TrackReference>>;
}

/// Lyrics provider.
#[async_trait]
pub trait LyricsSource: Send + Sync {
    /// Provider-specific song id of the top search hit.
    async fn find_song_id(&self, artist: &str, title: &str) -> SourceResult<Option<u64>>;

    /// Lyric sections (verses, choruses) in order.
    async fn fetch_lyrics(&self, song_id: u64) -> SourceResult<Option<Vec<String>>>;
}

/// Duration, genre, mood and friends for a track.
#[async_trait]
pub trait AudioCharacteristics: Send + Sync {
    async fn lookup(&self, artist: &str, title: &str) -> SourceResult<Option<CatalogAttributes>>;
}

/// Structured attributes derived from lyrics.
#[async_trait]
pub trait LyricAnalysis: Send + Sync {
    /// `Ok(None)` when the backend declined or replied with something
    /// other than a JSON object.
    async fn analyze(&self, sections: &[String]) -> SourceResult<Option<Value>>;
}

/// A generative text backend.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> SourceResult<String>;
}

/// Playlist and queue edits on behalf of a user.
#[async_trait]
pub trait PlaylistEditor: Send + Sync {
    /// Replace the playlist contents with `uris` (at most 100).
    async fn replace_playlist(&self, playlist_id: &str, uris: &[String]) -> SourceResult<()>;

    /// Append `uris` (at most 100) to the playlist.
    async fn append_to_playlist(&self, playlist_id: &str, uris: &[String]) -> SourceResult<()>;

    /// Add one track to the user's play queue.
    async fn queue(&self, uri: &str) -> SourceResult<()>;

    /// Create a private playlist and return its id.
    async fn create_playlist(&self, name: &str) -> SourceResult<String>;

    /// Id of the playlist called `name` that the user owns, if any.
    async fn find_user_playlist(&self, name: &str) -> SourceResult<Option<String>>;
}

/// Build the HTTP client shared by every source.
pub(crate) fn http_client(timeout: Duration) -> SourceResult<Client> {
    Ok(Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()?)
}

/// Map non-success statuses onto [`SourceError`].
pub(crate) async fn check_status(
    source_name: &str,
    entity: &str,
    response: Response,
) -> SourceResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::NOT_FOUND => Err(SourceError::NotFound {
            entity: entity.to_string(),
            source_name: source_name.to_string(),
        }),
        StatusCode::TOO_MANY_REQUESTS => Err(SourceError::RateLimited {
            source_name: source_name.to_string(),
        }),
        _ => {
            let body = response.text().await.unwrap_or_default();
            Err(SourceError::Http {
                source_name: source_name.to_string(),
                status: Some(status.as_u16()),
                message: format!("{status}: {}", body.trim()),
            })
        }
    }
}
