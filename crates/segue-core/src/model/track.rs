use serde::{Deserialize, Serialize};
use std::fmt;

/// A song in the streaming catalog.
///
/// Created when the user selects an origin or when a candidate is
/// resolved. Fields are private so a reference cannot change after
/// construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackReference {
    id: String,
    title: String,
    artist: String,
    #[serde(default)]
    featured_artists: Vec<String>,
}

impl TrackReference {
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: artist.into(),
            featured_artists: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_featured_artists(mut self, featured: Vec<String>) -> Self {
        self.featured_artists = featured;
        self
    }

    /// Opaque catalog track identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Primary artist name.
    pub fn artist(&self) -> &str {
        &self.artist
    }

    pub fn featured_artists(&self) -> &[String] {
        &self.featured_artists
    }

    /// The `spotify:track:` URI used by playlist and queue endpoints.
    pub fn uri(&self) -> String {
        format!("spotify:track:{}", self.id)
    }
}

impl fmt::Display for TrackReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.title, self.artist)?;
        if !self.featured_artists.is_empty() {
            write!(f, " (feat. {})", self.featured_artists.join(", "))?;
        }
        Ok(())
    }
}

/// An unvalidated (title, artist) pair extracted from model output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecommendationCandidate {
    pub title: String,
    pub artist: String,
}

impl RecommendationCandidate {
    #[must_use]
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
        }
    }
}

impl fmt::Display for RecommendationCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.title, self.artist)
    }
}

/// A candidate that was found in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedTrack {
    /// Position of the candidate in the model's ranking.
    pub position: usize,
    pub candidate: RecommendationCandidate,
    pub track: TrackReference,
}

impl ResolvedTrack {
    #[must_use]
    pub fn new(position: usize, candidate: RecommendationCandidate, track: TrackReference) -> Self {
        Self {
            position,
            candidate,
            track,
        }
    }
}
