//! Generation service seam
//!
//! The turn controller only talks to the remote model through
//! [`GenerationService`]. [`crate::llm::gemini::GeminiClient`] is the HTTP
//! implementation; tests use scripted fakes.

use crate::llm::config::ModelTier;
use crate::messages::{DataUri, InlineData, Source};
use crate::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Deserialize;

/// One streamed chat request
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// The user's message text
    pub text: String,

    /// Optional image, already stripped of its transport prefix
    pub image: Option<InlineData>,

    /// Effective system instruction (persona plus grounding)
    pub system_instruction: String,

    /// Model tier to route the request to
    pub model_tier: ModelTier,

    /// Whether the web search tool is enabled
    pub search_enabled: bool,
}

/// A part of a multimodal request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestPart {
    InlineData(InlineData),
    Text(String),
}

impl ChatRequest {
    /// Request parts in transport order: the inline image, when present,
    /// always precedes the text. Empty text is left out.
    pub fn parts(&self) -> Vec<RequestPart> {
        let mut parts = Vec::with_capacity(2);
        if let Some(image) = &self.image {
            parts.push(RequestPart::InlineData(image.clone()));
        }
        if !self.text.is_empty() {
            parts.push(RequestPart::Text(self.text.clone()));
        }
        parts
    }
}

/// Web citation attached to a grounding chunk
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WebReference {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// One grounding entry as reported by the service
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GroundingChunk {
    #[serde(default)]
    pub web: Option<WebReference>,
}

impl GroundingChunk {
    /// Citation for this entry, if it points at the web.
    ///
    /// Entries without a uri are skipped; a missing title falls back to
    /// the uri.
    pub fn to_source(&self) -> Option<Source> {
        let web = self.web.as_ref()?;
        let uri = web.uri.as_deref().filter(|u| !u.is_empty())?;
        let title = web
            .title
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(uri);
        Some(Source::new(title, uri))
    }
}

/// One increment of a streamed reply
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamChunk {
    pub text: Option<String>,
    pub grounding: Vec<GroundingChunk>,
}

/// Result of a one-shot image request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageReply {
    /// Any text the model returned alongside the image
    pub text: Option<String>,

    /// The generated image, if the service produced one
    pub image: Option<DataUri>,
}

pub type ChunkStream = BoxStream<'static, Result<StreamChunk>>;

#[async_trait]
pub trait GenerationService: Send + Sync {
    /// One-shot image generation for a text prompt
    async fn generate_image(&self, prompt: &str) -> Result<ImageReply>;

    /// Open a streamed chat reply
    async fn stream_chat(&self, request: &ChatRequest) -> Result<ChunkStream>;

    /// Synthesize speech; returns the base64 audio payload, if any
    async fn synthesize_speech(&self, text: &str) -> Result<Option<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(image: Option<InlineData>) -> ChatRequest {
        ChatRequest {
            text: "What is in this picture?".to_string(),
            image,
            system_instruction: "You are helpful.".to_string(),
            model_tier: ModelTier::Flash,
            search_enabled: false,
        }
    }

    #[test]
    fn test_image_part_precedes_text() {
        let inline = InlineData {
            mime_type: "image/png".to_string(),
            data: "AAAA".to_string(),
        };
        let parts = request(Some(inline.clone())).parts();

        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], RequestPart::InlineData(inline));
        assert!(matches!(parts[1], RequestPart::Text(_)));
    }

    #[test]
    fn test_text_only_parts() {
        let parts = request(None).parts();
        assert_eq!(parts, vec![RequestPart::Text("What is in this picture?".into())]);
    }

    #[test]
    fn test_image_only_request_has_no_text_part() {
        let inline = InlineData {
            mime_type: "image/jpeg".into(),
            data: "/9j/4AAQ".into(),
        };
        let mut image_only = request(Some(inline.clone()));
        image_only.text.clear();

        assert_eq!(image_only.parts(), vec![RequestPart::InlineData(inline)]);
    }

    #[test]
    fn test_grounding_to_source() {
        let chunk = GroundingChunk {
            web: Some(WebReference {
                uri: Some("https://example.com".into()),
                title: Some("Example".into()),
            }),
        };
        assert_eq!(
            chunk.to_source(),
            Some(Source::new("Example", "https://example.com"))
        );
    }

    #[test]
    fn test_grounding_without_title_or_uri() {
        let untitled = GroundingChunk {
            web: Some(WebReference {
                uri: Some("https://example.com".into()),
                title: None,
            }),
        };
        assert_eq!(untitled.to_source().unwrap().title, "https://example.com");

        let no_uri = GroundingChunk {
            web: Some(WebReference {
                uri: None,
                title: Some("Orphan".into()),
            }),
        };
        assert!(no_uri.to_source().is_none());
        assert!(GroundingChunk::default().to_source().is_none());
    }
}
