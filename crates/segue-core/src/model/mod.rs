pub mod attributes;
pub mod discovery;
pub mod ids;
pub mod track;

pub use attributes::{AttributeBundle, CatalogAttributes};
pub use discovery::{DiscoveryRequest, DiscoveryType};
pub use ids::RunId;
pub use track::{RecommendationCandidate, ResolvedTrack, TrackReference};
