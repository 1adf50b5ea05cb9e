//! Integration tests for the full recommendation pipeline.
//!
//! Every source is a hand-written fake, so these run without network
//! access or credentials.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use segue_core::{
    AttributeBundle, CatalogAttributes, DiscoveryRequest, DiscoveryType, TrackReference,
};
use segue_discover::sources::{
    AudioCharacteristics, CatalogSearch, LyricAnalysis, LyricsSource, TextGenerator,
};
use segue_discover::{
    AttributeGateway, PipelineError, RecommendationEngine, RecommendationPipeline, RetryPolicy,
    RunState, SourceError, SourceResult, TrackResolver,
};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

struct Catalog {
    known: HashMap<String, TrackReference>,
    searches: AtomicUsize,
}

impl Catalog {
    fn with(tracks: &[(&str, &str, &str)]) -> Arc<Self> {
        let known = tracks
            .iter()
            .map(|(id, title, artist)| {
                (
                    format!("{title}|{artist}"),
                    TrackReference::new(*id, *title, *artist),
                )
            })
            .collect();
        Arc::new(Self {
            known,
            searches: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl CatalogSearch for Catalog {
    async fn search_track(
        &self,
        title: &str,
        artist: &str,
    ) -> SourceResult<Option<TrackReference>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        Ok(self.known.get(&format!("{title}|{artist}")).cloned())
    }
}

struct Characteristics;

#[async_trait]
impl AudioCharacteristics for Characteristics {
    async fn lookup(&self, _: &str, _: &str) -> SourceResult<Option<CatalogAttributes>> {
        Ok(Some(CatalogAttributes {
            duration_secs: Some(125),
            genre: Some("Pop".to_string()),
            mood: Some("Sad".to_string()),
            ..CatalogAttributes::default()
        }))
    }
}

struct NoLyrics;

#[async_trait]
impl LyricsSource for NoLyrics {
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

struct NoAnalysis;

#[async_trait]
impl LyricAnalysis for NoAnalysis {
    async fn analyze(&self, _: &[String]) -> SourceResult<Option<Value>> {
        Ok(None)
    }
}

/// Replies with a fixed text (or fails when there is none) and records
/// every prompt.
struct Model {
    reply: Option<String>,
    prompts: Mutex<Vec<String>>,
    cancel_on_call: Option<CancellationToken>,
}

impl Model {
    fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
            cancel_on_call: None,
        })
    }

    fn down() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            prompts: Mutex::new(Vec::new()),
            cancel_on_call: None,
        })
    }
}

#[async_trait]
impl TextGenerator for Model {
    async fn generate(&self, prompt: &str) -> SourceResult<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(cancel) = &self.cancel_on_call {
            cancel.cancel();
        }
        self.reply.clone().ok_or_else(|| SourceError::Http {
            source_name: "Gemini".to_string(),
            status: Some(503),
            message: "overloaded".to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn yesterday() -> TrackReference {
    TrackReference::new("3BQHpFgAp4l80e1XslIjNI", "Yesterday", "The Beatles")
}

fn beatles_catalog() -> Arc<Catalog> {
    Catalog::with(&[
        ("7iN1s7xHE4ifF5povM6A48", "Let It Be", "The Beatles"),
        ("0aym2LBJBk9DAYuHHutrIl", "Hey Jude", "The Beatles"),
        ("6dGnYIeXmHdcikdzNNDMm2", "Here Comes The Sun", "The Beatles"),
    ])
}

fn pipeline(model: Arc<Model>, catalog: Arc<Catalog>) -> RecommendationPipeline {
    let gateway = AttributeGateway::new(
        Arc::new(Characteristics),
        Arc::new(NoLyrics),
        Arc::new(NoAnalysis),
    );
    let resolver = TrackResolver::new(catalog)
        .with_retry(RetryPolicy::fixed(3, Duration::from_millis(1)))
        .with_concurrency(4);
    RecommendationPipeline::new(gateway, RecommendationEngine::new(model), resolver)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

/// Same genre as Yesterday, two recommendations, both resolve
#[tokio::test]
async fn test_same_genre_end_to_end() {
    let model = Model::replying("Let It Be-The Beatles, Hey Jude-The Beatles");
    let report = pipeline(model.clone(), beatles_catalog())
        .run(DiscoveryType::SameGenre, yesterday(), 2)
        .await
        .unwrap();

    let titles: Vec<_> = report.tracks.iter().map(|t| t.track.title()).collect();
    assert_eq!(titles, ["Let It Be", "Hey Jude"]);
    assert_eq!(report.tracks[0].track.id(), "7iN1s7xHE4ifF5povM6A48");
    assert_eq!(report.tracks[1].candidate.artist, "The Beatles");
    assert!(report.misses.is_empty());
    assert!(!report.is_short());

    // The prompt carried the discovery phrase and the fetched attributes.
    let prompts = model.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("the same genre as"));
    assert!(prompts[0].contains("Yesterday"));
    assert!(prompts[0].contains("Pop"));
    assert_eq!(report.request.attributes().lyrics, None);
}

/// Unknown tracks and malformed pieces shorten the result without failing
#[tokio::test]
async fn test_partial_results() {
    let catalog = beatles_catalog();
    let model = Model::replying(
        "Let It Be-The Beatles, Not A Real Song-Nobody,\n garbage , Here Comes The Sun-The Beatles",
    );
    let report = pipeline(model, catalog.clone())
        .run(DiscoveryType::SameMood, yesterday(), 4)
        .await
        .unwrap();

    assert_eq!(report.candidates, 3);
    assert_eq!(report.tracks.len(), 2);
    assert_eq!(report.tracks[1].track.title(), "Here Comes The Sun");
    assert_eq!(report.misses.len(), 1);
    assert_eq!(report.misses[0].candidate.title, "Not A Real Song");
    assert!(report.is_short());
    assert_eq!(catalog.searches.load(Ordering::SeqCst), 3);
}

/// An unreachable backend fails the run before anything is resolved
#[tokio::test]
async fn test_backend_unavailable() {
    let catalog = beatles_catalog();
    let err = pipeline(Model::down(), catalog.clone())
        .run(DiscoveryType::SameMusic, yesterday(), 5)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::BackendUnavailable(_)));
    assert_eq!(catalog.searches.load(Ordering::SeqCst), 0);
}

/// A sentinel reply is a rejection carrying the model's message
#[tokio::test]
async fn test_rejection() {
    let catalog = beatles_catalog();
    let err = pipeline(
        Model::replying("ERROR: Cannot access required data"),
        catalog.clone(),
    )
    .run(DiscoveryType::SameDecade, yesterday(), 5)
    .await
    .unwrap_err();

    match err {
        PipelineError::RecommendationRejected(rejection) => {
            assert_eq!(rejection.message, "ERROR: Cannot access required data");
        }
        other => panic!("expected rejection, got {other}"),
    }
    assert_eq!(catalog.searches.load(Ordering::SeqCst), 0);
}

/// Zero recommendations is not a valid request
#[tokio::test]
async fn test_zero_limit() {
    let model = Model::replying("Let It Be-The Beatles");
    let err = pipeline(model.clone(), beatles_catalog())
        .run(DiscoveryType::SameGenre, yesterday(), 0)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::InvalidRequest(_)));
    assert!(model.prompts.lock().unwrap().is_empty());
}

/// A token cancelled up front stops the run before any stage
#[tokio::test]
async fn test_cancelled_before_start() {
    let model = Model::replying("Let It Be-The Beatles");
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = pipeline(model.clone(), beatles_catalog())
        .with_cancellation(cancel)
        .run(DiscoveryType::SameGenre, yesterday(), 1)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Cancelled {
            stage: RunState::Idle
        }
    ));
    assert!(model.prompts.lock().unwrap().is_empty());
}

/// Cancelling while the model is answering stops before resolution
#[tokio::test]
async fn test_cancelled_mid_run() {
    let cancel = CancellationToken::new();
    let model = Arc::new(Model {
        reply: Some("Let It Be-The Beatles".to_string()),
        prompts: Mutex::new(Vec::new()),
        cancel_on_call: Some(cancel.clone()),
    });
    let catalog = beatles_catalog();

    let err = pipeline(model, catalog.clone())
        .with_cancellation(cancel)
        .run(DiscoveryType::SameGenre, yesterday(), 1)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Cancelled {
            stage: RunState::ModelResponded
        }
    ));
    assert_eq!(catalog.searches.load(Ordering::SeqCst), 0);
}

/// Cached attributes skip the gateway and reach the prompt unchanged
#[tokio::test]
async fn test_run_request_with_cached_attributes() {
    let model = Model::replying("Hey Jude-The Beatles");
    let attributes = AttributeBundle {
        catalog_attributes: Some(CatalogAttributes {
            genre: Some("Baroque Pop".to_string()),
            ..CatalogAttributes::default()
        }),
        lyrics: None,
        lyric_attributes: None,
    };
    let request =
        DiscoveryRequest::new(DiscoveryType::SameMood, yesterday(), 1, attributes).unwrap();

    let report = pipeline(model.clone(), beatles_catalog())
        .run_request(request)
        .await
        .unwrap();

    assert_eq!(report.tracks.len(), 1);
    assert!(model.prompts.lock().unwrap()[0].contains("Baroque Pop"));
}

/// Runs are independent: each gets its own id
#[tokio::test]
async fn test_runs_have_distinct_ids() {
    let pipeline = pipeline(
        Model::replying("Let It Be-The Beatles"),
        beatles_catalog(),
    );
    let first = pipeline
        .run(DiscoveryType::SameGenre, yesterday(), 1)
        .await
        .unwrap();
    let second = pipeline
        .run(DiscoveryType::SameGenre, yesterday(), 1)
        .await
        .unwrap();

    assert_ne!(first.run_id, second.run_id);
    assert_eq!(first.tracks, second.tracks);
}
