//! TheAudioDB client for duration, genre, mood, style, theme and plays.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use segue_core::CatalogAttributes;

use super::{check_status, http_client, AudioCharacteristics};
use crate::error::{SourceError, SourceResult};
use crate::resilience::RateLimiter;

const SOURCE: &str = "TheAudioDB";
const API_BASE: &str = "https://www.theaudiodb.com/api/v1/json";

#[derive(Debug, Deserialize)]
struct SearchTrackResponse {
    // `null` when nothing matched
    track: Option<Vec<AudioDbTrack>>,
}

/// Every field arrives as an optional string, numbers included.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AudioDbTrack {
    int_duration: Option<String>,
    str_genre: Option<String>,
    str_mood: Option<String>,
    str_style: Option<String>,
    str_theme: Option<String>,
    int_total_plays: Option<String>,
}

impl AudioDbTrack {
    fn into_attributes(self) -> CatalogAttributes {
        CatalogAttributes {
            // milliseconds
            duration_secs: number(self.int_duration.as_deref()).map(|ms: u64| (ms / 1000) as u32),
            genre: text(self.str_genre),
            mood: text(self.str_mood),
            style: text(self.str_style),
            theme: text(self.str_theme),
            play_count: number(self.int_total_plays.as_deref()),
        }
    }
}

fn text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn number<T: std::str::FromStr>(value: Option<&str>) -> Option<T> {
    value.and_then(|v| v.trim().parse().ok())
}

/// TheAudioDB client.
#[derive(Debug, Clone)]
pub struct AudioDbClient {
    http: Client,
    api_key: String,
    rate_limiter: RateLimiter,
}

impl AudioDbClient {
    /// Create a client. The free key `"2"` works for track search.
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> SourceResult<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            api_key: api_key.into(),
            rate_limiter: RateLimiter::new(2),
        })
    }
}

#[async_trait]
impl AudioCharacteristics for AudioDbClient {
    async fn lookup(&self, artist: &str, title: &str) -> SourceResult<Option<CatalogAttributes>> {
        self.rate_limiter.acquire().await;

        let response = self
            .http
            .get(format!("{API_BASE}/{}/searchtrack.php", self.api_key))
            .query(&[("s", artist.trim()), ("t", title.trim())])
            .send()
            .await
            .map_err(|e| SourceError::transport(SOURCE, e))?;
        let response = check_status(SOURCE, "track", response).await?;
        let body: SearchTrackResponse = response
            .json()
            .await
            .map_err(|e| SourceError::parse(SOURCE, e))?;

        Ok(body
            .track
            .and_then(|tracks| tracks.into_iter().next())
            .map(AudioDbTrack::into_attributes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_to_attributes() {
        let body: SearchTrackResponse = serde_json::from_str(
            r#"{"track": [{
                "intDuration": "125000",
                "strGenre": "Pop",
                "strMood": "Sad",
                "strStyle": "Rock/Pop",
                "strTheme": null,
                "intTotalPlays": "1934",
                "strTrack": "Yesterday"
            }]}"#,
        )
        .unwrap();

        let attributes = body.track.unwrap().remove(0).into_attributes();
        assert_eq!(attributes.duration_secs, Some(125));
        assert_eq!(attributes.genre.as_deref(), Some("Pop"));
        assert_eq!(attributes.mood.as_deref(), Some("Sad"));
        assert_eq!(attributes.theme, None);
        assert_eq!(attributes.play_count, Some(1934));
    }

    #[test]
    fn test_blank_fields_are_absent() {
        let track = AudioDbTrack {
            int_duration: Some("not a number".to_string()),
            str_genre: Some("  ".to_string()),
            ..AudioDbTrack::default()
        };
        let attributes = track.into_attributes();
        assert!(attributes.duration_secs.is_none());
        assert!(attributes.genre.is_none());
        assert!(attributes.is_empty());
    }

    #[test]
    fn test_no_match_is_null() {
        let body: SearchTrackResponse = serde_json::from_str(r#"{"track": null}"#).unwrap();
        assert!(body.track.is_none());
    }
}
