//! Lyric-analysis prompt and reply handling.

use serde_json::Value;

use crate::recommend::{ERROR_INVALID_INPUT, ERROR_MARKER, ERROR_MISSING_DATA};

/// Schema used when no schema file is configured.
pub const DEFAULT_LYRIC_SCHEMA: &str = r#"{
  "language": "ISO 639-1 code of the main language",
  "language_level": "exactly one of: vulgar, youth slang, colloquial, standard, sophisticated, technical, poetic",
  "topics": ["main topics, e.g. love, politics, society, nature"],
  "mood": "overall emotional tone",
  "perspective": "first person, second person, third person or mixed",
  "explicit": "true if the lyrics contain explicit content"
}"#;

/// Parse the built-in schema.
pub fn default_schema() -> Value {
    serde_json::from_str(DEFAULT_LYRIC_SCHEMA).unwrap_or(Value::Null)
}

/// Build the analysis prompt for a set of lyric sections.
pub fn analysis_prompt(sections: &[String], schema: &Value) -> String {
    let lyrics = sections.join("\n");
    format!(
        r#"You are a music analysis engine. Your task is to analyze the following lyrics and extract their attributes:

Input Parameters:
- Lyrics: {lyrics} (the text of the song's lyrics)

Response Format:
- Return a JSON object with attributes from this schema: {schema}
- Ensure the response is valid JSON format, use " instead of '
- DO NOT include markdown code block markers

Error Handling:
- If logical error: return "{invalid}"
- If missing data: return "{missing}"
- For any other error: return "{marker} <specific error message>"

DO NOT include any additional text, explanations, or formatting."#,
        invalid = ERROR_INVALID_INPUT,
        missing = ERROR_MISSING_DATA,
        marker = ERROR_MARKER,
    )
}

/// Remove markdown code-fence markers around a reply.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        // Drop the language tag on the opening fence, if any. It need not
        // be followed by a newline.
        text = rest.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    }
    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Decode an analysis reply.
///
/// Returns `None` for sentinel errors and for anything that is not a JSON
/// object after fences are removed.
pub fn parse_analysis(raw: &str) -> Option<Value> {
    let cleaned = strip_code_fences(raw);
    if cleaned.contains(ERROR_MARKER) {
        log::warn!("Lyric analysis declined: {}", cleaned);
        return None;
    }
    match serde_json::from_str::<Value>(cleaned) {
        Ok(value @ Value::Object(_)) => Some(value),
        Ok(other) => {
            log::warn!("Lyric analysis is not a JSON object: {}", other);
            None
        }
        Err(e) => {
            log::warn!("Lyric analysis is not valid JSON: {}", e);
            None
        }
    }
}
