//! Wiring the HTTP clients from configuration.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::engine::RecommendationEngine;
use crate::gateway::AttributeGateway;
use crate::pipeline::RecommendationPipeline;
use crate::resilience::RetryPolicy;
use crate::resolver::TrackResolver;
use crate::sources::{
    AudioCharacteristics, AudioDbClient, CatalogSearch, GeminiClient, GenerativeLyricAnalyzer,
    GeniusClient, LyricAnalysis, LyricsSource, SkipAnalysis, SpotifyClient, TextGenerator,
};

/// The configured source clients.
#[derive(Debug, Clone)]
pub struct Clients {
    pub spotify: Arc<SpotifyClient>,
    pub genius: Arc<GeniusClient>,
    pub audiodb: Arc<AudioDbClient>,
    pub gemini: Option<Arc<GeminiClient>>,
    config: Config,
}

impl Clients {
    pub fn from_config(config: &Config) -> Result<Self> {
        let timeout = config.request_timeout();

        let spotify = SpotifyClient::new(
            config.spotify_client_id.clone(),
            config.spotify_client_secret.clone(),
            config.spotify_user_token.clone(),
            timeout,
        )
        .context("Failed to create Spotify client")?;
        let genius = GeniusClient::new(config.genius_access_token.clone(), timeout)
            .context("Failed to create Genius client")?;
        let audiodb = AudioDbClient::new(config.audiodb_api_key.clone(), timeout)
            .context("Failed to create TheAudioDB client")?;
        let gemini = config
            .gemini_api_key
            .clone()
            .map(|key| GeminiClient::new(key, config.gemini_model.clone(), timeout))
            .transpose()
            .context("Failed to create Gemini client")?;

        if genius.is_anonymous() {
            log::info!("genius_access_token is not set; lyrics will be skipped");
        }

        Ok(Self {
            spotify: Arc::new(spotify),
            genius: Arc::new(genius),
            audiodb: Arc::new(audiodb),
            gemini: gemini.map(Arc::new),
            config: config.clone(),
        })
    }

    /// The generative backend, which recommendation needs.
    pub fn generator(&self) -> Result<Arc<dyn TextGenerator>> {
        self.gemini
            .clone()
            .map(|g| g as Arc<dyn TextGenerator>)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "gemini_api_key is not set (use `segue config set gemini_api_key <key>` or SEGUE_GEMINI_API_KEY)"
                )
            })
    }

    pub fn engine(&self) -> Result<RecommendationEngine> {
        Ok(RecommendationEngine::new(self.generator()?))
    }

    /// Attribute gateway. Lyric analysis is skipped without a Gemini key.
    pub fn gateway(&self) -> Result<AttributeGateway> {
        let analyzer: Arc<dyn LyricAnalysis> = match &self.gemini {
            Some(gemini) => {
                let generator: Arc<dyn TextGenerator> = gemini.clone();
                Arc::new(GenerativeLyricAnalyzer::new(
                    generator,
                    self.config.lyric_schema()?,
                ))
            }
            None => Arc::new(SkipAnalysis),
        };
        let characteristics: Arc<dyn AudioCharacteristics> = self.audiodb.clone();
        let lyrics: Arc<dyn LyricsSource> = self.genius.clone();
        Ok(
            AttributeGateway::new(characteristics, lyrics, analyzer)
                .with_catalog_retry(RetryPolicy::fixed(2, Duration::from_secs(2))),
        )
    }

    pub fn resolver(&self) -> TrackResolver {
        let search: Arc<dyn CatalogSearch> = self.spotify.clone();
        TrackResolver::new(search).with_concurrency(self.config.resolve_concurrency)
    }

    /// Assemble the full pipeline.
    pub fn pipeline(&self, cancel: CancellationToken) -> Result<RecommendationPipeline> {
        Ok(
            RecommendationPipeline::new(self.gateway()?, self.engine()?, self.resolver())
                .with_cancellation(cancel),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recommendation_needs_gemini_key() {
        let clients = Clients::from_config(&Config::default()).unwrap();
        assert!(clients.gemini.is_none());
        let err = clients.pipeline(CancellationToken::new()).unwrap_err();
        assert!(err.to_string().contains("gemini_api_key"));
        // Attributes still work without it.
        assert!(clients.gateway().is_ok());
    }

    #[test]
    fn test_pipeline_with_gemini_key() {
        let config = Config {
            gemini_api_key: Some("test-key".to_string()),
            ..Config::default()
        };
        let clients = Clients::from_config(&config).unwrap();
        assert_eq!(
            clients.gemini.as_ref().map(|g| g.model()),
            Some("gemini-2.0-flash-lite")
        );
        assert!(clients.pipeline(CancellationToken::new()).is_ok());
    }
}
