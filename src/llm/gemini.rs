//! Gemini REST backend for the generation service
//!
//! Chat replies stream over Server-Sent Events
//! (`:streamGenerateContent?alt=sse`); image generation and speech
//! synthesis are one-shot `:generateContent` calls.

use crate::llm::client::{
    ChatRequest, ChunkStream, GenerationService, GroundingChunk, ImageReply, RequestPart,
    StreamChunk,
};
use crate::llm::config::ServiceConfig;
use crate::messages::DataUri;
use crate::{ChatterError, Result};
use async_stream::stream;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

/// HTTP client for the Gemini API
pub struct GeminiClient {
    config: ServiceConfig,
    http: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: ServiceConfig) -> Result<Self> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ChatterError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        info!("Gemini client configured: {}", config.endpoint());

        Ok(Self { config, http })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    fn url(&self, model: &str, method: &str) -> String {
        format!("{}/v1beta/models/{}:{}", self.config.endpoint(), model, method)
    }

    async fn post(&self, url: &str, body: &Value) -> Result<reqwest::Response> {
        let response = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ChatterError::UpstreamError(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ChatterError::UpstreamError(format!(
                "service returned {}: {}",
                status,
                detail.trim()
            )));
        }

        Ok(response)
    }

    async fn generate_content(&self, model: &str, body: &Value) -> Result<GenerateContentResponse> {
        let response = self.post(&self.url(model, "generateContent"), body).await?;
        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ChatterError::UpstreamError(format!("malformed response: {}", e)))?;
        parsed.check()
    }

    /// Request body for a streamed chat turn
    pub fn chat_body(&self, request: &ChatRequest) -> Value {
        let parts: Vec<Value> = request.parts().iter().map(part_json).collect();

        let safety: Vec<Value> = SAFETY_CATEGORIES
            .iter()
            .map(|category| {
                json!({
                    "category": category,
                    "threshold": self.config.safety_threshold,
                })
            })
            .collect();

        let mut body = json!({
            "contents": [{ "role": "user", "parts": parts }],
            "safetySettings": safety,
        });

        if !request.system_instruction.is_empty() {
            body["systemInstruction"] = json!({ "parts": [{ "text": request.system_instruction }] });
        }

        if request.search_enabled {
            body["tools"] = json!([{ "googleSearch": {} }]);
        }

        body
    }

    /// Request body for speech synthesis
    pub fn speech_body(&self, text: &str) -> Value {
        json!({
            "contents": [{ "parts": [{ "text": text }] }],
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": {
                        "prebuiltVoiceConfig": { "voiceName": self.config.voice_name }
                    }
                }
            }
        })
    }
}

#[async_trait]
impl GenerationService for GeminiClient {
    async fn generate_image(&self, prompt: &str) -> Result<ImageReply> {
        debug!("Requesting image for prompt of {} chars", prompt.len());
        let body = json!({ "contents": [{ "parts": [{ "text": prompt }] }] });
        let response = self.generate_content(&self.config.image_model, &body).await?;
        Ok(response.into_image_reply())
    }

    async fn stream_chat(&self, request: &ChatRequest) -> Result<ChunkStream> {
        let model = request.model_tier.model_name();
        debug!(
            "Opening chat stream: model={} search={} image={}",
            model,
            request.search_enabled,
            request.image.is_some()
        );

        let url = format!("{}?alt=sse", self.url(model, "streamGenerateContent"));
        let response = self.post(&url, &self.chat_body(request)).await?;
        Ok(sse_chunks(response.bytes_stream()))
    }

    async fn synthesize_speech(&self, text: &str) -> Result<Option<String>> {
        let response = self
            .generate_content(&self.config.tts_model, &self.speech_body(text))
            .await?;

        let payload = response.first_inline_data().map(|blob| blob.data);
        if payload.is_none() {
            warn!("Speech response carried no audio payload");
        }
        Ok(payload)
    }
}

fn part_json(part: &RequestPart) -> Value {
    match part {
        RequestPart::InlineData(inline) => json!({
            "inlineData": { "mimeType": inline.mime_type, "data": inline.data }
        }),
        RequestPart::Text(text) => json!({ "text": text }),
    }
}

/// Turn an SSE response body into a stream of chunks.
///
/// The body is split on newlines; only `data:` lines carry payloads. A line
/// may arrive across several reads.
fn sse_chunks<S, B, E>(body: S) -> ChunkStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: std::fmt::Display + Send,
{
    let chunks = stream! {
        futures::pin_mut!(body);
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(bytes) = body.next().await {
            let bytes = match bytes {
                Ok(bytes) => bytes,
                Err(e) => {
                    yield Err(ChatterError::UpstreamError(format!("stream read failed: {}", e)));
                    return;
                }
            };
            buffer.extend_from_slice(bytes.as_ref());

            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                match parse_sse_line(&line) {
                    Ok(Some(chunk)) => {
                        yield Ok(chunk);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        }

        if !buffer.is_empty() {
            match parse_sse_line(&buffer) {
                Ok(Some(chunk)) => {
                    yield Ok(chunk);
                }
                Ok(None) => {}
                Err(e) => {
                    yield Err(e);
                }
            }
        }
    };

    Box::pin(chunks)
}

/// Parse one SSE line. Non-data lines and keep-alives yield `None`.
pub(crate) fn parse_sse_line(line: &[u8]) -> Result<Option<StreamChunk>> {
    let line = std::str::from_utf8(line)
        .map_err(|e| ChatterError::UpstreamError(format!("invalid UTF-8 in stream: {}", e)))?;
    let line = line.trim_end_matches(['\r', '\n']);

    let Some(data) = line.strip_prefix("data:") else {
        return Ok(None);
    };
    let data = data.trim_start();
    if data.is_empty() || data == "[DONE]" {
        return Ok(None);
    }

    let response: GenerateContentResponse = serde_json::from_str(data)
        .map_err(|e| ChatterError::UpstreamError(format!("malformed response chunk: {}", e)))?;
    Ok(Some(response.check()?.into_chunk()))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<InlineBlob>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineBlob {
    #[serde(default)]
    mime_type: Option<String>,
    data: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

impl GenerateContentResponse {
    fn check(mut self) -> Result<Self> {
        if let Some(error) = self.error.take() {
            return Err(ChatterError::UpstreamError(error.message));
        }
        Ok(self)
    }

    fn parts(&self) -> impl Iterator<Item = &ResponsePart> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.iter())
            .into_iter()
            .flatten()
    }

    fn text(&self) -> Option<String> {
        let text: String = self.parts().filter_map(|p| p.text.as_deref()).collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    fn first_inline_data(self) -> Option<InlineBlob> {
        let candidate = self.candidates.into_iter().next()?;
        candidate
            .content?
            .parts
            .into_iter()
            .find_map(|p| p.inline_data)
    }

    fn into_chunk(self) -> StreamChunk {
        let text = self.text();
        let grounding = self
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.grounding_metadata)
            .map(|m| m.grounding_chunks)
            .unwrap_or_default();
        StreamChunk { text, grounding }
    }

    fn into_image_reply(self) -> ImageReply {
        let text = self.text();
        let image = self.first_inline_data().map(|blob| {
            let mime = blob.mime_type.as_deref().unwrap_or("image/png");
            DataUri::from_base64(mime, &blob.data)
        });
        ImageReply { text, image }
    }
}
