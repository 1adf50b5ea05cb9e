//! Delivering resolved tracks to a playlist or the play queue.

use std::sync::Arc;

use async_trait::async_trait;

use segue_core::ResolvedTrack;

use crate::error::{SourceError, SourceResult};
use crate::sources::PlaylistEditor;

/// Tracks per playlist request; the Web API rejects larger batches.
pub const PLAYLIST_CHUNK: usize = 100;

/// Somewhere resolved tracks can be sent.
#[async_trait]
pub trait TrackSink: Send + Sync {
    /// Deliver `tracks` in order, returning how many were accepted.
    async fn deliver(&self, tracks: &[ResolvedTrack]) -> SourceResult<usize>;
}

/// Adds tracks to a playlist, optionally replacing its contents.
#[derive(Clone)]
pub struct PlaylistSink {
    editor: Arc<dyn PlaylistEditor>,
    playlist_id: String,
    replace: bool,
}

impl std::fmt::Debug for PlaylistSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaylistSink")
            .field("playlist_id", &self.playlist_id)
            .field("replace", &self.replace)
            .finish_non_exhaustive()
    }
}

impl PlaylistSink {
    pub fn new(editor: Arc<dyn PlaylistEditor>, playlist_id: impl Into<String>) -> Self {
        Self {
            editor,
            playlist_id: playlist_id.into(),
            replace: false,
        }
    }

    /// Create a new playlist called `name` and target it.
    pub async fn create(editor: Arc<dyn PlaylistEditor>, name: &str) -> SourceResult<Self> {
        let playlist_id = editor.create_playlist(name).await?;
        Ok(Self::new(editor, playlist_id))
    }

    /// Target the user's playlist called `name`, replacing its contents.
    pub async fn named(editor: Arc<dyn PlaylistEditor>, name: &str) -> SourceResult<Self> {
        let Some(playlist_id) = editor.find_user_playlist(name).await? else {
            return Err(SourceError::NotFound {
                entity: format!("playlist '{name}'"),
                source_name: "your library".to_string(),
            });
        };
        Ok(Self::new(editor, playlist_id).replacing())
    }

    /// Empty the playlist before adding.
    #[must_use]
    pub fn replacing(mut self) -> Self {
        self.replace = true;
        self
    }

    pub fn playlist_id(&self) -> &str {
        &self.playlist_id
    }
}

#[async_trait]
impl TrackSink for PlaylistSink {
    async fn deliver(&self, tracks: &[ResolvedTrack]) -> SourceResult<usize> {
        let uris: Vec<String> = tracks.iter().map(|t| t.track.uri()).collect();

        if uris.is_empty() {
            if self.replace {
                self.editor.replace_playlist(&self.playlist_id, &[]).await?;
            }
            return Ok(0);
        }

        for (i, chunk) in uris.chunks(PLAYLIST_CHUNK).enumerate() {
            if self.replace && i == 0 {
                self.editor.replace_playlist(&self.playlist_id, chunk).await?;
            } else {
                self.editor
                    .append_to_playlist(&self.playlist_id, chunk)
                    .await?;
            }
        }

        log::info!("Added {} tracks to playlist {}", uris.len(), self.playlist_id);
        Ok(uris.len())
    }
}

/// Appends tracks to the user's play queue one at a time.
#[derive(Clone)]
pub struct QueueSink {
    editor: Arc<dyn PlaylistEditor>,
}

impl std::fmt::Debug for QueueSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueSink").finish_non_exhaustive()
    }
}

impl QueueSink {
    pub fn new(editor: Arc<dyn PlaylistEditor>) -> Self {
        Self { editor }
    }
}

#[async_trait]
impl TrackSink for QueueSink {
    /// Tracks that fail to queue are skipped, except for a missing
    /// credential, which would fail every track.
    async fn deliver(&self, tracks: &[ResolvedTrack]) -> SourceResult<usize> {
        let mut queued = 0;
        for resolved in tracks {
            match self.editor.queue(&resolved.track.uri()).await {
                Ok(()) => queued += 1,
                Err(e @ SourceError::MissingCredential { .. }) => return Err(e),
                Err(e) => log::warn!("Failed to queue {}: {e}", resolved.track),
            }
        }
        log::info!("Queued {queued} of {} tracks", tracks.len());
        Ok(queued)
    }
}
