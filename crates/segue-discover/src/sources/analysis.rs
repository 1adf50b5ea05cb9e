//! Lyric analysis on top of a generative backend.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use segue_core::recommend::lyrics;

use super::{LyricAnalysis, TextGenerator};
use crate::error::SourceResult;

/// Asks a [`TextGenerator`] to describe lyrics according to a JSON schema.
#[derive(Clone)]
pub struct GenerativeLyricAnalyzer {
    generator: Arc<dyn TextGenerator>,
    schema: Value,
}

impl std::fmt::Debug for GenerativeLyricAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerativeLyricAnalyzer")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl GenerativeLyricAnalyzer {
    pub fn new(generator: Arc<dyn TextGenerator>, schema: Value) -> Self {
        Self { generator, schema }
    }

    /// Analyzer using the built-in schema.
    pub fn with_default_schema(generator: Arc<dyn TextGenerator>) -> Self {
        Self::new(generator, lyrics::default_schema())
    }
}

#[async_trait]
impl LyricAnalysis for GenerativeLyricAnalyzer {
    async fn analyze(&self, sections: &[String]) -> SourceResult<Option<Value>> {
        let prompt = lyrics::analysis_prompt(sections, &self.schema);
        let reply = self.generator.generate(&prompt).await?;
        Ok(lyrics::parse_analysis(&reply))
    }
}

/// Stand-in used when no generative backend is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipAnalysis;

#[async_trait]
impl LyricAnalysis for SkipAnalysis {
    async fn analyze(&self, _sections: &[String]) -> SourceResult<Option<Value>> {
        log::debug!("Lyric analysis skipped: no generative backend configured");
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Canned {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TextGenerator for Canned {
        async fn generate(&self, prompt: &str) -> SourceResult<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        }
    }

    fn canned(reply: &str) -> Arc<Canned> {
        Arc::new(Canned {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        })
    }

    #[tokio::test]
    async fn test_fenced_json_reply() {
        let generator = canned("```json\n{\"mood\": \"melancholic\", \"language\": \"en\"}\n```");
        let analyzer = GenerativeLyricAnalyzer::with_default_schema(generator.clone());

        let result = analyzer
            .analyze(&["[Verse 1]\nYesterday".to_string()])
            .await
            .unwrap()
            .unwrap();

        assert_eq!(result["mood"], "melancholic");
        let prompts = generator.prompts.lock().unwrap();
        assert!(prompts[0].contains("Yesterday"));
    }

    #[tokio::test]
    async fn test_error_reply_is_unavailable() {
        let analyzer =
            GenerativeLyricAnalyzer::with_default_schema(canned("ERROR: Cannot access required data"));
        assert!(analyzer.analyze(&[]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_skip_analysis() {
        assert!(SkipAnalysis.analyze(&["la".to_string()]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_garbage_reply_is_unavailable() {
        let analyzer = GenerativeLyricAnalyzer::with_default_schema(canned("these lyrics are sad"));
        assert!(analyzer.analyze(&["la".to_string()]).await.unwrap().is_none());
    }
}
