//! Mapping candidates onto catalog tracks.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};

use segue_core::{RecommendationCandidate, ResolvedTrack, TrackReference};

use crate::error::{SourceError, SourceResult};
use crate::resilience::RetryPolicy;
use crate::sources::CatalogSearch;

/// Attempts per candidate when the search times out.
pub const RESOLVE_ATTEMPTS: usize = 3;

/// Why a candidate did not resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissReason {
    /// The search returned no track.
    NoMatch,
    /// Every attempt timed out.
    TimedOut { attempts: usize },
    /// The search failed with a non-retryable error.
    Failed(String),
}

impl fmt::Display for MissReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMatch => f.write_str("no catalog match"),
            Self::TimedOut { attempts } => write!(f, "timed out after {attempts} attempts"),
            Self::Failed(message) => write!(f, "search failed: {message}"),
        }
    }
}

/// A candidate that was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionMiss {
    pub position: usize,
    pub candidate: RecommendationCandidate,
    pub reason: MissReason,
}

/// Result of resolving a batch: hits in candidate order plus the misses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub resolved: Vec<ResolvedTrack>,
    pub misses: Vec<ResolutionMiss>,
}

/// Resolves candidates through catalog search.
///
/// Timeouts are retried; any other error or an empty result drops the
/// candidate. The batch itself never fails.
#[derive(Clone)]
pub struct TrackResolver {
    search: Arc<dyn CatalogSearch>,
    retry: RetryPolicy,
    concurrency: usize,
}

impl fmt::Debug for TrackResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackResolver")
            .field("retry", &self.retry)
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

impl TrackResolver {
    /// Sequential resolver with the default retry policy.
    pub fn new(search: Arc<dyn CatalogSearch>) -> Self {
        Self {
            search,
            retry: RetryPolicy::exponential(RESOLVE_ATTEMPTS, Duration::from_millis(500)),
            concurrency: 1,
        }
    }

    /// Resolve up to `concurrency` candidates at once. Output order does
    /// not depend on this.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn search_once(
        &self,
        candidate: &RecommendationCandidate,
    ) -> SourceResult<Option<TrackReference>> {
        self.retry
            .retry(
                || self.search.search_track(&candidate.title, &candidate.artist),
                SourceError::is_timeout,
            )
            .await
    }

    async fn resolve_one(
        &self,
        position: usize,
        candidate: RecommendationCandidate,
    ) -> Result<ResolvedTrack, ResolutionMiss> {
        let reason = match self.search_once(&candidate).await {
            Ok(Some(track)) => {
                log::debug!("Resolved {candidate} to {}", track.id());
                return Ok(ResolvedTrack::new(position, candidate, track));
            }
            Ok(None) => MissReason::NoMatch,
            Err(e) if e.is_timeout() => MissReason::TimedOut {
                attempts: self.retry.max_attempts,
            },
            Err(e) => MissReason::Failed(e.to_string()),
        };

        log::warn!("Dropping candidate #{} {candidate}: {reason}", position + 1);
        Err(ResolutionMiss {
            position,
            candidate,
            reason,
        })
    }

    /// Resolve every candidate, keeping candidate order.
    pub async fn resolve(&self, candidates: &[RecommendationCandidate]) -> Resolution {
        let mut outcomes: Vec<Result<ResolvedTrack, ResolutionMiss>> =
            stream::iter(candidates.iter().cloned().enumerate())
                .map(|(position, candidate)| self.resolve_one(position, candidate))
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

        // Completion order is arbitrary with concurrency > 1.
        outcomes.sort_by_key(|outcome| match outcome {
            Ok(track) => track.position,
            Err(miss) => miss.position,
        });

        let mut resolution = Resolution::default();
        for outcome in outcomes {
            match outcome {
                Ok(track) => resolution.resolved.push(track),
                Err(miss) => resolution.misses.push(miss),
            }
        }

        log::info!(
            "Resolved {} of {} candidates",
            resolution.resolved.len(),
            candidates.len()
        );
        resolution
    }
}
