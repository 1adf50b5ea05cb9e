//! Genius lyrics client.
//!
//! The API only hands out the song page URL; the lyrics themselves are
//! scraped from the page's `data-lyrics-container` blocks.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Node, Selector};
use serde::Deserialize;

use super::{check_status, http_client, LyricsSource};
use crate::error::{SourceError, SourceResult};
use crate::resilience::RateLimiter;

const SOURCE: &str = "Genius";
const API_BASE: &str = "https://api.genius.com";

static CONTAINER: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"div[data-lyrics-container="true"]"#).expect("valid container selector")
});

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    response: T,
}

#[derive(Debug, Deserialize)]
struct SearchBody {
    #[serde(default = "Vec::new")]
    hits: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    result: HitResult,
}

#[derive(Debug, Deserialize)]
struct HitResult {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct SongBody {
    song: Song,
}

#[derive(Debug, Deserialize)]
struct Song {
    url: String,
}

/// Genius API client.
#[derive(Debug, Clone)]
pub struct GeniusClient {
    http: Client,
    access_token: Option<String>,
    rate_limiter: RateLimiter,
}

impl GeniusClient {
    /// Create a client. Without a token every lookup fails with
    /// [`SourceError::MissingCredential`].
    pub fn new(access_token: Option<String>, timeout: Duration) -> SourceResult<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            access_token,
            rate_limiter: RateLimiter::new(5),
        })
    }

    /// Whether the client has no access token.
    pub fn is_anonymous(&self) -> bool {
        self.access_token.is_none()
    }

    fn token(&self) -> SourceResult<&str> {
        self.access_token
            .as_deref()
            .ok_or_else(|| SourceError::MissingCredential {
                source_name: SOURCE.to_string(),
                key: "genius_access_token",
            })
    }

    async fn song_url(&self, song_id: u64) -> SourceResult<String> {
        let token = self.token()?;
        self.rate_limiter.acquire().await;

        let response = self
            .http
            .get(format!("{API_BASE}/songs/{song_id}"))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| SourceError::transport(SOURCE, e))?;
        let response = check_status(SOURCE, "song", response).await?;
        let body: Envelope<SongBody> = response
            .json()
            .await
            .map_err(|e| SourceError::parse(SOURCE, e))?;
        Ok(body.response.song.url)
    }
}

#[async_trait]
impl LyricsSource for GeniusClient {
    async fn find_song_id(&self, artist: &str, title: &str) -> SourceResult<Option<u64>> {
        let token = self.token()?;
        self.rate_limiter.acquire().await;

        let query = format!("{artist} {title}");
        let response = self
            .http
            .get(format!("{API_BASE}/search"))
            .bearer_auth(token)
            .query(&[("q", query.as_str())])
            .send()
            .await
            .map_err(|e| SourceError::transport(SOURCE, e))?;
        let response = check_status(SOURCE, "search", response).await?;
        let body: Envelope<SearchBody> = response
            .json()
            .await
            .map_err(|e| SourceError::parse(SOURCE, e))?;

        Ok(body.response.hits.first().map(|hit| hit.result.id))
    }

    async fn fetch_lyrics(&self, song_id: u64) -> SourceResult<Option<Vec<String>>> {
        let url = self.song_url(song_id).await?;
        self.rate_limiter.acquire().await;

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::transport(SOURCE, e))?;
        let page = check_status(SOURCE, "lyrics page", response)
            .await?
            .text()
            .await
            .map_err(|e| SourceError::parse(SOURCE, e))?;

        let sections = extract_lyrics(&page);
        if sections.is_empty() {
            log::warn!("No lyrics containers found on {url}");
            return Ok(None);
        }
        Ok(Some(sections))
    }
}

/// Pull lyric sections out of a Genius song page.
///
/// Sections start at their `[Header]`; anything before the first header
/// (contributor counts, page furniture) is dropped. Pages without headers
/// yield their whole text as one section.
pub fn extract_lyrics(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let text = document
        .select(&CONTAINER)
        .map(|container| {
            let mut text = String::new();
            push_text(container, &mut text);
            text
        })
        .collect::<Vec<_>>()
        .join("\n");

    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    if !text.contains('[') {
        return vec![text.to_string()];
    }

    text.split('[')
        .skip(1)
        .map(|section| format!("[{}", section.trim_end()))
        .filter(|section| section.len() > 1)
        .collect()
}

/// Append the text under `element`, with `<br>` as a newline. Subtrees
/// marked `data-exclude-from-selection` (headers, annotations) are skipped.
fn push_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) if el.name() == "br" => out.push('\n'),
            Node::Element(el) if el.attr("data-exclude-from-selection").is_some() => {}
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    push_text(child, out);
                }
            }
            _ => {}
        }
    }
}
