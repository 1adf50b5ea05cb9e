//! Core domain model for segue.
//!
//! This crate defines the recommendation data model (tracks, attribute
//! bundles, discovery requests, candidates), the pure prompt builder and
//! response parser, and the SQLite attribute cache and run history.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod error;
pub mod model;
pub mod recommend;
pub mod schema;

pub use error::{Error, Result};
pub use model::{
    AttributeBundle, CatalogAttributes, DiscoveryRequest, DiscoveryType, RecommendationCandidate,
    ResolvedTrack, RunId, TrackReference,
};
pub use recommend::{RecommendationPromptBuilder, Rejection, ResponseParser};
pub use schema::{CachedAttributes, Database, RunSummary};
