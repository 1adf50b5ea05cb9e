use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::model::attributes::AttributeBundle;
use crate::model::track::TrackReference;

/// The relation the recommendations should have to the origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiscoveryType {
    SameMusic,
    SameMood,
    SameGenre,
    SameDecade,
}

impl DiscoveryType {
    pub const ALL: [Self; 4] = [
        Self::SameMusic,
        Self::SameMood,
        Self::SameGenre,
        Self::SameDecade,
    ];

    /// The phrase embedded in the recommendation prompt.
    pub const fn phrase(self) -> &'static str {
        match self {
            Self::SameMusic => "the same music as",
            Self::SameMood => "the same mood as",
            Self::SameGenre => "the same genre as",
            Self::SameDecade => "music in the same decade as",
        }
    }

    /// Kebab-case name used on the command line and in storage.
    pub const fn slug(self) -> &'static str {
        match self {
            Self::SameMusic => "same-music",
            Self::SameMood => "same-mood",
            Self::SameGenre => "same-genre",
            Self::SameDecade => "same-decade",
        }
    }
}

impl fmt::Display for DiscoveryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for DiscoveryType {
    type Err = Error;

    /// Accepts either the slug (`same-genre`) or the phrase
    /// (`the same genre as`, quotes allowed).
    fn from_str(s: &str) -> Result<Self> {
        let needle = s.trim().trim_matches('"').to_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.slug() == needle || t.phrase() == needle)
            .ok_or_else(|| Error::InvalidData(format!("unknown discovery type: {s}")))
    }
}

/// The immutable input to one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryRequest {
    discovery_type: DiscoveryType,
    origin: TrackReference,
    limit: NonZeroUsize,
    attributes: AttributeBundle,
}

impl DiscoveryRequest {
    /// Build a request. `limit` must be positive.
    pub fn new(
        discovery_type: DiscoveryType,
        origin: TrackReference,
        limit: usize,
        attributes: AttributeBundle,
    ) -> Result<Self> {
        let limit = NonZeroUsize::new(limit)
            .ok_or_else(|| Error::InvalidData("limit must be positive".to_string()))?;
        Ok(Self {
            discovery_type,
            origin,
            limit,
            attributes,
        })
    }

    /// The same request carrying a different attribute bundle.
    #[must_use]
    pub fn with_attributes(self, attributes: AttributeBundle) -> Self {
        Self { attributes, ..self }
    }

    pub fn discovery_type(&self) -> DiscoveryType {
        self.discovery_type
    }

    pub fn origin(&self) -> &TrackReference {
        &self.origin
    }

    pub fn limit(&self) -> usize {
        self.limit.get()
    }

    pub fn attributes(&self) -> &AttributeBundle {
        &self.attributes
    }
}
