//! Prompt construction and model-reply parsing.
//!
//! Everything here is pure: no I/O and no hidden state, so the same
//! inputs always produce the same prompt or the same candidates.

pub mod lyrics;
pub mod parse;
pub mod prompt;

pub use parse::{Rejection, ResponseParser};
pub use prompt::RecommendationPromptBuilder;

/// Marker the backend prefixes to every refusal.
pub const ERROR_MARKER: &str = "ERROR:";

/// Sentinel for contradictory inputs.
pub const ERROR_INVALID_INPUT: &str = "ERROR: Invalid input combination";

/// Sentinel for inputs the backend could not use.
pub const ERROR_MISSING_DATA: &str = "ERROR: Cannot access required data";
