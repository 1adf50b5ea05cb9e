//! Attribute gathering for an origin track.

use std::sync::Arc;

use serde_json::Value;

use segue_core::{AttributeBundle, CatalogAttributes, TrackReference};

use crate::error::SourceError;
use crate::resilience::RetryPolicy;
use crate::sources::{AudioCharacteristics, LyricAnalysis, LyricsSource};

/// An attribute bundle and the sources that errored while building it.
///
/// A source with nothing to say is not a failure; only errors count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeFetch {
    pub bundle: AttributeBundle,
    pub failed: Vec<&'static str>,
}

impl AttributeFetch {
    /// Whether every source answered, so the bundle is worth keeping.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// A complete, non-empty bundle. Anything less is refetched next time.
    pub fn worth_caching(&self) -> bool {
        self.is_complete() && !self.bundle.is_empty()
    }
}

/// Collects everything the prompt needs to know about an origin.
///
/// Each source is queried on its own; a failing source leaves its field
/// empty and never fails the bundle.
#[derive(Clone)]
pub struct AttributeGateway {
    characteristics: Arc<dyn AudioCharacteristics>,
    lyrics: Arc<dyn LyricsSource>,
    analysis: Arc<dyn LyricAnalysis>,
    catalog_retry: RetryPolicy,
}

impl std::fmt::Debug for AttributeGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttributeGateway")
            .field("catalog_retry", &self.catalog_retry)
            .finish_non_exhaustive()
    }
}

impl AttributeGateway {
    pub fn new(
        characteristics: Arc<dyn AudioCharacteristics>,
        lyrics: Arc<dyn LyricsSource>,
        analysis: Arc<dyn LyricAnalysis>,
    ) -> Self {
        Self {
            characteristics,
            lyrics,
            analysis,
            catalog_retry: RetryPolicy::once(),
        }
    }

    /// Poll the characteristics source with `policy` while a matched
    /// track still has no genre.
    #[must_use]
    pub fn with_catalog_retry(mut self, policy: RetryPolicy) -> Self {
        self.catalog_retry = policy;
        self
    }

    /// Fetch the attribute bundle for `origin`. Never fails.
    pub async fn fetch_attributes(&self, origin: &TrackReference) -> AttributeBundle {
        self.fetch(origin).await.bundle
    }

    /// Fetch the attribute bundle for `origin`, noting which sources
    /// errored along the way.
    pub async fn fetch(&self, origin: &TrackReference) -> AttributeFetch {
        let ((catalog_attributes, catalog_failed), (lyrics, lyric_attributes, lyrics_failed)) =
            tokio::join!(self.fetch_catalog(origin), self.fetch_lyrics(origin));

        let bundle = AttributeBundle {
            catalog_attributes,
            lyrics,
            lyric_attributes,
        };
        log::info!(
            "Attributes for {origin}: catalog={} lyrics={} lyric_attributes={}",
            bundle.catalog_attributes.is_some(),
            bundle.lyrics.is_some(),
            bundle.lyric_attributes.is_some()
        );

        let failed = catalog_failed.into_iter().chain(lyrics_failed).collect();
        AttributeFetch { bundle, failed }
    }

    async fn fetch_catalog(
        &self,
        origin: &TrackReference,
    ) -> (Option<CatalogAttributes>, Option<&'static str>) {
        let result = self
            .catalog_retry
            .retry_until(
                || self.characteristics.lookup(origin.artist(), origin.title()),
                |found: &Option<CatalogAttributes>| {
                    found.as_ref().map_or(true, |attrs| attrs.genre.is_some())
                },
            )
            .await;

        match result {
            Ok(Some(attributes)) => (Some(attributes), None),
            Ok(None) => {
                log::debug!("No audio characteristics for {origin}");
                (None, None)
            }
            Err(e) => {
                log::warn!("Failed to get audio characteristics for {origin}: {e}");
                (None, failure(SOURCE_CHARACTERISTICS, &e))
            }
        }
    }

    /// Lyrics and their analysis. Analysis only runs when lyrics exist.
    async fn fetch_lyrics(
        &self,
        origin: &TrackReference,
    ) -> (Option<Vec<String>>, Option<Value>, Option<&'static str>) {
        let song_id = match self
            .lyrics
            .find_song_id(origin.artist(), origin.title())
            .await
        {
            Ok(Some(id)) => id,
            Ok(None) => {
                log::debug!("No lyrics search hit for {origin}");
                return (None, None, None);
            }
            Err(e) => {
                log::warn!("Failed to search lyrics for {origin}: {e}");
                return (None, None, failure(SOURCE_LYRICS, &e));
            }
        };

        let sections = match self.lyrics.fetch_lyrics(song_id).await {
            Ok(Some(sections)) if !sections.is_empty() => sections,
            Ok(_) => {
                log::debug!("No lyrics for {origin} (song {song_id})");
                return (None, None, None);
            }
            Err(e) => {
                log::warn!("Failed to fetch lyrics for {origin} (song {song_id}): {e}");
                return (None, None, failure(SOURCE_LYRICS, &e));
            }
        };

        match self.analysis.analyze(&sections).await {
            Ok(analysis) => (Some(sections), analysis, None),
            Err(e) => {
                log::warn!("Failed to analyze lyrics for {origin}: {e}");
                (Some(sections), None, failure(SOURCE_ANALYSIS, &e))
            }
        }
    }
}

const SOURCE_CHARACTERISTICS: &str = "audio characteristics";
const SOURCE_LYRICS: &str = "lyrics";
const SOURCE_ANALYSIS: &str = "lyric analysis";

/// A missing credential is a standing absence rather than a failure.
fn failure(source: &'static str, err: &SourceError) -> Option<&'static str> {
    match err {
        SourceError::MissingCredential { .. } => None,
        _ => Some(source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceResult;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FakeCharacteristics {
        result: fn() -> SourceResult<Option<CatalogAttributes>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AudioCharacteristics for FakeCharacteristics {
        async fn lookup(&self, _: &str, _: &str) -> SourceResult<Option<CatalogAttributes>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.result)()
        }
    }

    struct FakeLyrics {
        song_id: Option<u64>,
        sections: Option<Vec<String>>,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl LyricsSource for FakeLyrics {
        async fn find_song_id(&self, _: &str, _: &str) -> SourceResult<Option<u64>> {
            Ok(self.song_id)
        }

        async fn fetch_lyrics(&self, _: u64) -> SourceResult<Option<Vec<String>>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.sections.clone())
        }
    }

    struct FakeAnalysis {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl LyricAnalysis for FakeAnalysis {
        async fn analyze(&self, _: &[String]) -> SourceResult<Option<Value>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(SourceError::Timeout {
                    source_name: "Gemini".to_string(),
                });
            }
            Ok(Some(serde_json::json!({"mood": "wistful"})))
        }
    }

    fn pop() -> SourceResult<Option<CatalogAttributes>> {
        Ok(Some(CatalogAttributes {
            genre: Some("Pop".to_string()),
            duration_secs: Some(125),
            ..CatalogAttributes::default()
        }))
    }

    fn characteristics(
        result: fn() -> SourceResult<Option<CatalogAttributes>>,
    ) -> Arc<FakeCharacteristics> {
        Arc::new(FakeCharacteristics {
            result,
            calls: AtomicUsize::new(0),
        })
    }

    fn lyrics(song_id: Option<u64>) -> Arc<FakeLyrics> {
        Arc::new(FakeLyrics {
            song_id,
            sections: Some(vec!["[Verse 1]\nYesterday".to_string()]),
            fetches: AtomicUsize::new(0),
        })
    }

    fn analysis(fail: bool) -> Arc<FakeAnalysis> {
        Arc::new(FakeAnalysis {
            calls: AtomicUsize::new(0),
            fail,
        })
    }

    fn yesterday() -> TrackReference {
        TrackReference::new("3BQHpFgAp4l80e1XslIjNI", "Yesterday", "The Beatles")
    }

    #[tokio::test]
    async fn test_full_bundle() {
        let gateway = AttributeGateway::new(characteristics(pop), lyrics(Some(90475)), analysis(false));

        let bundle = gateway.fetch_attributes(&yesterday()).await;

        assert_eq!(
            bundle.catalog_attributes.unwrap().genre.as_deref(),
            Some("Pop")
        );
        assert_eq!(bundle.lyrics.unwrap().len(), 1);
        assert_eq!(bundle.lyric_attributes.unwrap()["mood"], "wistful");
    }

    #[tokio::test]
    async fn test_no_song_id_skips_lyrics_and_analysis() {
        let lyrics = lyrics(None);
        let analysis = analysis(false);
        let gateway = AttributeGateway::new(characteristics(pop), lyrics.clone(), analysis.clone());

        let bundle = gateway.fetch_attributes(&yesterday()).await;

        assert!(bundle.lyrics.is_none());
        assert!(bundle.lyric_attributes.is_none());
        assert!(bundle.catalog_attributes.is_some());
        assert_eq!(lyrics.fetches.load(Ordering::SeqCst), 0);
        assert_eq!(analysis.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failing_catalog_keeps_lyrics() {
        let gateway = AttributeGateway::new(
            characteristics(|| {
                Err(SourceError::RateLimited {
                    source_name: "TheAudioDB".to_string(),
                })
            }),
            lyrics(Some(1)),
            analysis(false),
        );

        let bundle = gateway.fetch_attributes(&yesterday()).await;

        assert!(bundle.catalog_attributes.is_none());
        assert!(bundle.lyrics.is_some());
        assert!(bundle.lyric_attributes.is_some());
    }

    #[tokio::test]
    async fn test_failing_analysis_keeps_lyrics() {
        let gateway = AttributeGateway::new(characteristics(pop), lyrics(Some(1)), analysis(true));

        let bundle = gateway.fetch_attributes(&yesterday()).await;

        assert!(bundle.lyrics.is_some());
        assert!(bundle.lyric_attributes.is_none());
    }

    #[tokio::test]
    async fn test_catalog_polls_for_genre() {
        let source = characteristics(|| Ok(Some(CatalogAttributes::default())));
        let gateway = AttributeGateway::new(source.clone(), lyrics(None), analysis(false))
            .with_catalog_retry(RetryPolicy::fixed(3, Duration::from_millis(1)));

        let bundle = gateway.fetch_attributes(&yesterday()).await;

        // The last value is kept even without a genre.
        assert!(bundle.catalog_attributes.is_some());
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_catalog_no_match_is_not_polled() {
        let source = characteristics(|| Ok(None));
        let gateway = AttributeGateway::new(source.clone(), lyrics(None), analysis(false))
            .with_catalog_retry(RetryPolicy::fixed(3, Duration::from_millis(1)));

        let bundle = gateway.fetch_attributes(&yesterday()).await;

        assert!(bundle.is_empty());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetch_reports_failed_sources() {
        let gateway = AttributeGateway::new(
            characteristics(|| {
                Err(SourceError::Timeout {
                    source_name: "TheAudioDB".to_string(),
                })
            }),
            lyrics(Some(1)),
            analysis(true),
        );

        let fetched = gateway.fetch(&yesterday()).await;

        assert!(!fetched.is_complete());
        assert!(!fetched.worth_caching());
        assert_eq!(fetched.failed, ["audio characteristics", "lyric analysis"]);
        assert!(fetched.bundle.lyrics.is_some());
    }

    #[tokio::test]
    async fn test_absence_is_not_failure() {
        let gateway =
            AttributeGateway::new(characteristics(|| Ok(None)), lyrics(None), analysis(false));

        let fetched = gateway.fetch(&yesterday()).await;

        assert!(fetched.is_complete());
        assert!(fetched.bundle.is_empty());
        assert!(!fetched.worth_caching());
    }

    #[tokio::test]
    async fn test_missing_credential_is_not_failure() {
        struct Anonymous;

        #[async_trait]
        impl LyricsSource for Anonymous {
            async fn find_song_id(&self, _: &str, _: &str) -> SourceResult<Option<u64>> {
                Err(SourceError::MissingCredential {
                    source_name: "Genius".to_string(),
                    key: "genius_access_token",
                })
            }

            async fn fetch_lyrics(&self, _: u64) -> SourceResult<Option<Vec<String>>> {
                Ok(None)
            }
        }

        let gateway =
            AttributeGateway::new(characteristics(pop), Arc::new(Anonymous), analysis(false));

        let fetched = gateway.fetch(&yesterday()).await;

        assert!(fetched.is_complete());
        assert!(fetched.bundle.lyrics.is_none());
        assert!(fetched.worth_caching());
    }
}
