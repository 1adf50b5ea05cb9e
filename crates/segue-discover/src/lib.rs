//! Recommendation pipeline and external source clients for segue.
//!
//! Gathers attributes for an origin track, asks a generative backend for
//! similar tracks, and resolves its answer against the streaming catalog.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod clients;
pub mod config;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod pipeline;
pub mod resilience;
pub mod resolver;
pub mod sink;
pub mod sources;

pub use clients::Clients;
pub use config::Config;
pub use engine::RecommendationEngine;
pub use error::{PipelineError, PipelineResult, SourceError, SourceResult};
pub use gateway::{AttributeFetch, AttributeGateway};
pub use pipeline::{RecommendationPipeline, RunReport, RunState};
pub use resilience::RetryPolicy;
pub use resolver::{MissReason, Resolution, ResolutionMiss, TrackResolver};
pub use sink::{PlaylistSink, QueueSink, TrackSink};
