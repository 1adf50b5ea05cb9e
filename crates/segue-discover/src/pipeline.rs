//! The recommendation pipeline: attributes, prompt, model, parse, resolve.
//!
//! Stages run strictly in order since each needs the previous stage's
//! full output. Only an unreachable backend or an explicit refusal end a
//! run early; everything else shortens the result.

use std::fmt;

use tokio_util::sync::CancellationToken;

use segue_core::{
    AttributeBundle, DiscoveryRequest, DiscoveryType, RecommendationPromptBuilder,
    ResolvedTrack, ResponseParser, RunId, TrackReference,
};

use crate::engine::RecommendationEngine;
use crate::error::{PipelineError, PipelineResult};
use crate::gateway::AttributeGateway;
use crate::resolver::{ResolutionMiss, TrackResolver};

/// Where a run is. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RunState {
    Idle,
    AttributesFetched,
    Prompted,
    ModelResponded,
    Parsed,
    Resolved,
    Done,
    Failed,
}

impl RunState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AttributesFetched => "attributes-fetched",
            Self::Prompted => "prompted",
            Self::ModelResponded => "model-responded",
            Self::Parsed => "parsed",
            Self::Resolved => "resolved",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a finished run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub run_id: RunId,
    pub request: DiscoveryRequest,
    /// Candidates the model proposed, after parsing.
    pub candidates: usize,
    pub tracks: Vec<ResolvedTrack>,
    pub misses: Vec<ResolutionMiss>,
}

impl RunReport {
    /// Whether fewer tracks came back than were asked for.
    pub fn is_short(&self) -> bool {
        self.tracks.len() < self.request.limit()
    }
}

/// Per-run state tracking.
#[derive(Debug)]
struct Run {
    id: RunId,
    state: RunState,
}

impl Run {
    fn start(id: RunId, state: RunState) -> Self {
        log::debug!("[run {id}] {state}");
        Self { id, state }
    }

    fn advance(&mut self, next: RunState) {
        debug_assert!(next > self.state, "{} -> {}", self.state, next);
        log::debug!("[run {}] {} -> {}", self.id, self.state, next);
        self.state = next;
    }

    fn fail(&mut self, err: PipelineError) -> PipelineError {
        log::warn!("[run {}] failed at {}: {err}", self.id, self.state);
        self.state = RunState::Failed;
        err
    }

    fn checkpoint(&mut self, cancel: &CancellationToken) -> PipelineResult<()> {
        if cancel.is_cancelled() {
            let stage = self.state;
            return Err(self.fail(PipelineError::Cancelled { stage }));
        }
        Ok(())
    }
}

/// Runs one recommendation request end to end.
#[derive(Debug, Clone)]
pub struct RecommendationPipeline {
    gateway: AttributeGateway,
    prompts: RecommendationPromptBuilder,
    engine: RecommendationEngine,
    parser: ResponseParser,
    resolver: TrackResolver,
    cancel: CancellationToken,
}

impl RecommendationPipeline {
    pub fn new(
        gateway: AttributeGateway,
        engine: RecommendationEngine,
        resolver: TrackResolver,
    ) -> Self {
        Self {
            gateway,
            prompts: RecommendationPromptBuilder::new(),
            engine,
            parser: ResponseParser::new(),
            resolver,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort runs at the next stage boundary once `cancel` fires.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn gateway(&self) -> &AttributeGateway {
        &self.gateway
    }

    pub fn engine(&self) -> &RecommendationEngine {
        &self.engine
    }

    /// Fetch attributes for `origin`, then run the request.
    pub async fn run(
        &self,
        discovery_type: DiscoveryType,
        origin: TrackReference,
        limit: usize,
    ) -> PipelineResult<RunReport> {
        let request =
            DiscoveryRequest::new(discovery_type, origin, limit, AttributeBundle::default())?;
        let mut run = Run::start(RunId::new(), RunState::Idle);
        log::info!(
            "[run {}] {} {} (limit {limit})",
            run.id,
            discovery_type.phrase(),
            request.origin()
        );

        run.checkpoint(&self.cancel)?;
        let attributes = self.gateway.fetch_attributes(request.origin()).await;
        run.advance(RunState::AttributesFetched);

        self.execute(run, request.with_attributes(attributes)).await
    }

    /// Run a request whose attributes are already known (from the cache,
    /// for instance).
    pub async fn run_request(&self, request: DiscoveryRequest) -> PipelineResult<RunReport> {
        let run = Run::start(RunId::new(), RunState::AttributesFetched);
        log::info!(
            "[run {}] {} {} (limit {}, cached attributes)",
            run.id,
            request.discovery_type().phrase(),
            request.origin(),
            request.limit()
        );
        self.execute(run, request).await
    }

    async fn execute(&self, mut run: Run, request: DiscoveryRequest) -> PipelineResult<RunReport> {
        run.checkpoint(&self.cancel)?;
        let prompt = self.prompts.build_for(&request);
        run.advance(RunState::Prompted);

        run.checkpoint(&self.cancel)?;
        let raw = match self.engine.generate(&prompt).await {
            Ok(raw) => raw,
            Err(e) => return Err(run.fail(e)),
        };
        run.advance(RunState::ModelResponded);

        run.checkpoint(&self.cancel)?;
        let candidates = match self.parser.parse(&raw) {
            Ok(candidates) => candidates,
            Err(rejection) => return Err(run.fail(rejection.into())),
        };
        self.parser.check_count(&candidates, request.limit());
        run.advance(RunState::Parsed);

        run.checkpoint(&self.cancel)?;
        let resolution = self.resolver.resolve(&candidates).await;
        run.advance(RunState::Resolved);

        run.advance(RunState::Done);
        log::info!(
            "[run {}] {} tracks, {} dropped",
            run.id,
            resolution.resolved.len(),
            resolution.misses.len()
        );

        Ok(RunReport {
            run_id: run.id,
            request,
            candidates: candidates.len(),
            tracks: resolution.resolved,
            misses: resolution.misses,
        })
    }
}
