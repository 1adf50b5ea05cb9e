//! SQLite attribute cache and recommendation history.

pub mod db;
pub mod migrations;

pub use db::{CachedAttributes, Database, RunSummary};
