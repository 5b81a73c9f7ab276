//! Generation-side logic for a chat turn
//!
//! - **intent**: picks direct image generation or streamed chat
//! - **grounding**: merges persona and active document into a system instruction
//! - **client**: the [`GenerationService`] seam and its request/response types
//! - **gemini**: HTTP implementation of the service
//! - **stream**: consumes a streamed reply as ordered partial updates
//! - **prompts**: fixed prompt and reply texts
//! - **config**: model tiers and service connection settings

pub mod client;
pub mod config;
pub mod gemini;
pub mod grounding;
pub mod intent;
pub mod prompts;
pub mod stream;

pub use client::{ChatRequest, ChunkStream, GenerationService, ImageReply, StreamChunk};
pub use config::{ModelTier, ServiceConfig};
pub use gemini::GeminiClient;
pub use grounding::build_system_instruction;
pub use intent::{classify, RequestMode};
pub use stream::{ImageOutcome, PartialUpdate, StreamConsumer};
