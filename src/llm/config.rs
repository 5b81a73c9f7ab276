//! Generation service configuration

use crate::{ChatterError, Result};
use serde::{Deserialize, Serialize};

/// Default REST endpoint of the generation service
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Sample rate of synthesized speech (16-bit mono PCM)
pub const SPEECH_SAMPLE_RATE: u32 = 24_000;

/// Model tier selected in the widget settings
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    /// Balanced default model
    #[default]
    Flash,
    /// Cheaper, faster model
    Lite,
}

impl ModelTier {
    pub fn model_name(&self) -> &'static str {
        match self {
            ModelTier::Flash => "gemini-2.5-flash",
            ModelTier::Lite => "gemini-flash-lite-latest",
        }
    }
}

/// Connection and model settings for the generation service
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    /// API key sent with every request
    pub api_key: String,

    /// Base URL without trailing path
    pub base_url: String,

    /// Model used for one-shot image generation
    pub image_model: String,

    /// Model used for text-to-speech
    pub tts_model: String,

    /// Prebuilt voice for text-to-speech
    pub voice_name: String,

    /// Sample rate of the speech payload
    pub speech_sample_rate: u32,

    /// Block threshold applied to every safety category
    pub safety_threshold: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            image_model: "gemini-2.5-flash-image".to_string(),
            tts_model: "gemini-2.5-flash-preview-tts".to_string(),
            voice_name: "Kore".to_string(),
            speech_sample_rate: SPEECH_SAMPLE_RATE,
            safety_threshold: "BLOCK_MEDIUM_AND_ABOVE".to_string(),
        }
    }
}

impl ServiceConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    /// Read the API key from `API_KEY`, falling back to `GEMINI_API_KEY`
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("API_KEY")
            .or_else(|_| std::env::var("GEMINI_API_KEY"))
            .map_err(|_| {
                ChatterError::ConfigError("API_KEY environment variable not set".into())
            })?;

        let config = Self::new(api_key);
        config.validate()?;
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_voice(mut self, voice_name: impl Into<String>) -> Self {
        self.voice_name = voice_name.into();
        self
    }

    pub fn with_image_model(mut self, model: impl Into<String>) -> Self {
        self.image_model = model.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(ChatterError::ConfigError("API key is empty".into()));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ChatterError::ConfigError(format!(
                "base URL must be http(s): {}",
                self.base_url
            )));
        }
        if self.speech_sample_rate == 0 {
            return Err(ChatterError::ConfigError(
                "speech sample rate must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Base URL with any trailing slash removed
    pub fn endpoint(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}
