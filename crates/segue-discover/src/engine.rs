//! The generative backend as seen by the pipeline.

use std::sync::Arc;

use crate::error::{PipelineError, PipelineResult, SourceError};
use crate::sources::TextGenerator;

/// Prompt sent by [`RecommendationEngine::health_check`].
pub const HEALTH_PROMPT: &str = "Reply with 'OK' if you can read this.";

/// Reply expected to [`HEALTH_PROMPT`].
pub const HEALTH_REPLY: &str = "OK";

/// Sends prompts to the backend and hands back its raw text.
///
/// Failures are not retried here; whether to try again is the caller's
/// decision.
#[derive(Clone)]
pub struct RecommendationEngine {
    backend: Arc<dyn TextGenerator>,
}

impl std::fmt::Debug for RecommendationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecommendationEngine").finish_non_exhaustive()
    }
}

impl RecommendationEngine {
    pub fn new(backend: Arc<dyn TextGenerator>) -> Self {
        Self { backend }
    }

    /// Forward `prompt` and return the reply verbatim.
    ///
    /// A reply that carries no text (a safety block, for one) comes back
    /// empty, which the parser turns into zero candidates. Every other
    /// failure means the backend is unavailable.
    pub async fn generate(&self, prompt: &str) -> PipelineResult<String> {
        match self.backend.generate(prompt).await {
            Ok(reply) => Ok(reply),
            Err(SourceError::Parse { message, .. }) => {
                log::warn!("Generative backend returned no usable text: {message}");
                Ok(String::new())
            }
            Err(e) => {
                log::error!("Generative backend failed: {e}");
                Err(PipelineError::BackendUnavailable(e))
            }
        }
    }

    /// Whether the backend answers a trivial prompt with exactly `OK`.
    pub async fn health_check(&self) -> bool {
        match self.backend.generate(HEALTH_PROMPT).await {
            Ok(reply) if reply.trim() == HEALTH_REPLY => true,
            Ok(reply) => {
                log::warn!("Unexpected health check reply: {:?}", reply.trim());
                false
            }
            Err(e) => {
                log::warn!("Health check failed: {e}");
                false
            }
        }
    }
}
