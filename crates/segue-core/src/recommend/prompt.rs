use serde_json::{json, Value};

use crate::model::{AttributeBundle, CatalogAttributes, DiscoveryRequest, DiscoveryType, TrackReference};
use crate::recommend::{ERROR_INVALID_INPUT, ERROR_MARKER, ERROR_MISSING_DATA};

/// Builds the natural-language request sent to the generative backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecommendationPromptBuilder;

impl RecommendationPromptBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Build the prompt for a full request.
    pub fn build_for(&self, request: &DiscoveryRequest) -> String {
        self.build(
            request.discovery_type(),
            request.origin(),
            request.limit(),
            request.attributes(),
        )
    }

    /// Build the prompt text.
    ///
    /// The text instructs the backend to answer with a flat
    /// comma-separated list of `Title-Artist` pairs, at most `limit` of
    /// them, or one of the `ERROR:` sentinels. Attributes that are unknown
    /// appear as JSON `null` so the backend can tell them apart from empty
    /// values.
    pub fn build(
        &self,
        discovery_type: DiscoveryType,
        origin: &TrackReference,
        limit: usize,
        attributes: &AttributeBundle,
    ) -> String {
        let origin_json = origin_descriptor(origin);
        let track_json = attributes
            .catalog_attributes
            .as_ref()
            .map_or(Value::Null, catalog_descriptor);
        let lyric_json = attributes.lyric_attributes.clone().unwrap_or(Value::Null);

        format!(
            r#"You are a music recommendation engine. Your task is to recommend music based on the following criteria:

Input Parameters:
- Discovery Type: "{phrase}" (defines what kind of music to recommend) => FOLLOW THIS INSTRUCTION EXACTLY
- Origin: {origin_json} (the reference point for recommendations)
- Track Attributes: {track_json} (musical characteristics to consider)
- Lyric Attributes: {lyric_json} (focus mainly on this)

A value of null means the attribute is unknown. Do not guess unknown attributes.

Response Rules:
1. Output Format: ONLY return a comma-separated list of 'Title-Artist' pairs
2. Maximum Recommendations: {limit}
3. Format Example: "Bohemian Rhapsody-Queen, Yesterday-The Beatles"

Error Handling:
- If logical error: return "{invalid}"
- If missing data: return "{missing}"
- For any other error: return "{marker} <specific error message>"

DO NOT include any additional text, explanations, or formatting."#,
            phrase = discovery_type.phrase(),
            invalid = ERROR_INVALID_INPUT,
            missing = ERROR_MISSING_DATA,
            marker = ERROR_MARKER,
        )
    }
}

fn origin_descriptor(origin: &TrackReference) -> Value {
    json!({
        "track_name": origin.title(),
        "artist": origin.artist(),
        "featured_artists": origin.featured_artists(),
    })
}

fn catalog_descriptor(attrs: &CatalogAttributes) -> Value {
    json!({
        "duration_secs": attrs.duration_secs,
        "genre": attrs.genre,
        "mood": attrs.mood,
        "style": attrs.style,
        "theme": attrs.theme,
        "play_count": attrs.play_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yesterday() -> TrackReference {
        TrackReference::new("3BQHpFgAp4l80e1XslIjNI", "Yesterday", "The Beatles")
    }

    #[test]
    fn test_build_is_deterministic() {
        let builder = RecommendationPromptBuilder::new();
        let attrs = AttributeBundle {
            catalog_attributes: Some(CatalogAttributes {
                genre: Some("Pop".to_string()),
                ..CatalogAttributes::default()
            }),
            lyrics: None,
            lyric_attributes: Some(json!({"topic": ["love", "loss"], "language_level": "poetic"})),
        };
        let first = builder.build(DiscoveryType::SameMood, &yesterday(), 5, &attrs);
        let second = builder.build(DiscoveryType::SameMood, &yesterday(), 5, &attrs);
        assert_eq!(first, second);
    }

    #[test]
    fn test_build_contains_format_contract() {
        let prompt = RecommendationPromptBuilder::new().build(
            DiscoveryType::SameGenre,
            &yesterday(),
            7,
            &AttributeBundle::default(),
        );
        assert!(prompt.contains("\"the same genre as\""));
        assert!(prompt.contains("comma-separated list of 'Title-Artist' pairs"));
        assert!(prompt.contains("Maximum Recommendations: 7"));
        assert!(prompt.contains(ERROR_INVALID_INPUT));
        assert!(prompt.contains(ERROR_MISSING_DATA));
        assert!(prompt.contains("\"track_name\":\"Yesterday\""));
    }

    #[test]
    fn test_absent_attributes_are_null_not_empty() {
        let prompt = RecommendationPromptBuilder::new().build(
            DiscoveryType::SameGenre,
            &yesterday(),
            3,
            &AttributeBundle::default(),
        );
        assert!(prompt.contains("Track Attributes: null"));
        assert!(prompt.contains("Lyric Attributes: null"));
    }

    #[test]
    fn test_absent_catalog_fields_are_null() {
        let attrs = AttributeBundle {
            catalog_attributes: Some(CatalogAttributes {
                genre: Some("Rock".to_string()),
                ..CatalogAttributes::default()
            }),
            ..AttributeBundle::default()
        };
        let prompt =
            RecommendationPromptBuilder::new().build(DiscoveryType::SameMusic, &yesterday(), 3, &attrs);
        assert!(prompt.contains("\"genre\":\"Rock\""));
        assert!(prompt.contains("\"mood\":null"));
        assert!(!prompt.contains("\"mood\":\"\""));
    }

    #[test]
    fn test_build_for_request_matches_build() {
        let request = DiscoveryRequest::new(
            DiscoveryType::SameDecade,
            yesterday(),
            4,
            AttributeBundle::default(),
        )
        .unwrap();
        let builder = RecommendationPromptBuilder::new();
        assert_eq!(
            builder.build_for(&request),
            builder.build(DiscoveryType::SameDecade, &yesterday(), 4, &AttributeBundle::default())
        );
    }
}
