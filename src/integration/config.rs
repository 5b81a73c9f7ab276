//! Per-session settings supplied by the host
//!
//! The controller reads a clone of these once per turn and never
//! mutates them.

use crate::llm::config::ModelTier;
use crate::llm::prompts::{DEFAULT_PERSONA, DEFAULT_WELCOME_MESSAGE};
use crate::{ChatterError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Persona instruction text
    pub persona: String,

    /// Text of the active grounded document
    pub document: Option<String>,

    pub model_tier: ModelTier,

    /// Enable the web search tool
    pub search_enabled: bool,

    /// Route trigger phrases to direct image generation
    pub image_generation_enabled: bool,

    /// Speak finished replies
    pub voice_output_enabled: bool,

    /// First model turn of an empty conversation
    pub welcome_message: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            persona: DEFAULT_PERSONA.to_string(),
            document: None,
            model_tier: ModelTier::default(),
            search_enabled: false,
            image_generation_enabled: true,
            voice_output_enabled: true,
            welcome_message: DEFAULT_WELCOME_MESSAGE.to_string(),
        }
    }
}

impl SessionConfig {
    /// Parse settings from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| ChatterError::ConfigError(format!("Invalid session config: {}", e)))
    }

    /// Load settings from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            ChatterError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_json(&json)?;
        info!("Loaded session config from {}", path.display());
        Ok(config)
    }

    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = persona.into();
        self
    }

    pub fn with_document(mut self, document: Option<String>) -> Self {
        self.document = document;
        self
    }

    pub fn with_model_tier(mut self, tier: ModelTier) -> Self {
        self.model_tier = tier;
        self
    }

    pub fn with_search(mut self, enabled: bool) -> Self {
        self.search_enabled = enabled;
        self
    }

    pub fn with_image_generation(mut self, enabled: bool) -> Self {
        self.image_generation_enabled = enabled;
        self
    }

    pub fn with_voice_output(mut self, enabled: bool) -> Self {
        self.voice_output_enabled = enabled;
        self
    }

    pub fn with_welcome_message(mut self, message: impl Into<String>) -> Self {
        self.welcome_message = message.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.persona, DEFAULT_PERSONA);
        assert!(config.document.is_none());
        assert!(config.image_generation_enabled);
        assert!(config.voice_output_enabled);
        assert!(!config.search_enabled);
    }

    #[test]
    fn test_partial_json() {
        let config =
            SessionConfig::from_json(r#"{"persona": "You are terse.", "model_tier": "lite"}"#)
                .unwrap();
        assert_eq!(config.persona, "You are terse.");
        assert_eq!(config.model_tier, ModelTier::Lite);
        assert!(config.image_generation_enabled);
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            SessionConfig::from_json("{persona"),
            Err(ChatterError::ConfigError(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, r#"{"search_enabled": true}"#).unwrap();

        let config = SessionConfig::load(&path).unwrap();
        assert!(config.search_enabled);
        assert!(SessionConfig::load(dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_builder() {
        let config = SessionConfig::default()
            .with_document(Some("Doc".into()))
            .with_voice_output(false)
            .with_image_generation(false);
        assert_eq!(config.document.as_deref(), Some("Doc"));
        assert!(!config.voice_output_enabled);
        assert!(!config.image_generation_enabled);
    }
}
