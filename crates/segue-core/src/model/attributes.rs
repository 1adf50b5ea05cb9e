use serde::{Deserialize, Serialize};

/// Descriptive fields from the audio-characteristics service.
///
/// Every field is optional; a field the service does not know stays
/// `None` and serializes as `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogAttributes {
    pub duration_secs: Option<u32>,
    pub genre: Option<String>,
    pub mood: Option<String>,
    pub style: Option<String>,
    pub theme: Option<String>,
    pub play_count: Option<u64>,
}

impl CatalogAttributes {
    /// Returns `true` when the service knew nothing about the track.
    pub fn is_empty(&self) -> bool {
        self.duration_secs.is_none()
            && self.genre.is_none()
            && self.mood.is_none()
            && self.style.is_none()
            && self.theme.is_none()
            && self.play_count.is_none()
    }
}

/// Everything known about a reference track for prompting.
///
/// Each part is fetched independently; a part whose source failed is
/// `None` without affecting the others.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeBundle {
    pub catalog_attributes: Option<CatalogAttributes>,
    /// Lyric sections (verses, choruses) in song order.
    pub lyrics: Option<Vec<String>>,
    /// Structured lyric analysis shaped by the configured schema.
    pub lyric_attributes: Option<serde_json::Value>,
}

impl AttributeBundle {
    pub fn is_empty(&self) -> bool {
        self.catalog_attributes.is_none() && self.lyrics.is_none() && self.lyric_attributes.is_none()
    }
}
