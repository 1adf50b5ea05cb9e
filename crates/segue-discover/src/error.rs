//! Error types for the source clients and the recommendation pipeline.

use segue_core::Rejection;
use thiserror::Error;

use crate::pipeline::RunState;

/// Errors that can occur when talking to an external source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// An HTTP request to an external source failed.
    #[error("HTTP error from {source_name}: {message}")]
    Http {
        source_name: String,
        status: Option<u16>,
        message: String,
    },

    /// The request did not complete within its timeout.
    #[error("request to {source_name} timed out")]
    Timeout { source_name: String },

    /// The external source returned a rate-limit response.
    #[error("rate limited by {source_name}")]
    RateLimited { source_name: String },

    /// The requested entity was not found at the external source.
    #[error("not found: {entity} at {source_name}")]
    NotFound { entity: String, source_name: String },

    /// A response from an external source could not be parsed.
    #[error("parse error from {source_name}: {message}")]
    Parse {
        source_name: String,
        message: String,
    },

    /// No credential is configured for the source.
    #[error("missing credential for {source_name}: set {key}")]
    MissingCredential {
        source_name: String,
        key: &'static str,
    },

    /// An error propagated from `reqwest`.
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),
}

impl SourceError {
    /// Classify a transport error, keeping timeouts distinguishable from
    /// other failures.
    pub fn transport(source_name: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                source_name: source_name.to_string(),
            }
        } else {
            Self::Request(err)
        }
    }

    pub(crate) fn parse(source_name: &str, message: impl ToString) -> Self {
        Self::Parse {
            source_name: source_name.to_string(),
            message: message.to_string(),
        }
    }

    /// Returns `true` when the request timed out.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Request(e) => e.is_timeout(),
            _ => false,
        }
    }

    /// Returns `true` when the error is transient and the operation may
    /// succeed if retried.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            Self::Http { status, .. } => !matches!(status, Some(code) if *code < 500),
            other => other.is_timeout(),
        }
    }

    /// Returns `true` when the error indicates the entity was not found.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Convenience alias for source results.
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Errors that end a pipeline run early.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The generative backend could not be reached or authenticated.
    #[error("generative backend unavailable: {0}")]
    BackendUnavailable(#[source] SourceError),

    /// The backend answered with one of its `ERROR:` sentinels.
    #[error(transparent)]
    RecommendationRejected(#[from] Rejection),

    /// The caller cancelled the run.
    #[error("run cancelled at stage {stage}")]
    Cancelled { stage: RunState },

    /// The request itself was invalid (zero limit and the like).
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] segue_core::Error),
}

impl PipelineError {
    /// Returns `true` when the backend declined rather than failed.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::RecommendationRejected(_))
    }
}

/// Convenience alias for pipeline results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
