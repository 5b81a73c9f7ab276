//! Incremental consumption of generation replies
//!
//! [`StreamConsumer::run`] turns a streamed chat reply into an ordered
//! sequence of [`PartialUpdate`]s. The caller builds the visible reply by
//! appending each update in arrival order, so no update is dropped,
//! merged or reordered here.

use crate::llm::client::{ChatRequest, GenerationService, StreamChunk};
use crate::llm::prompts::image_reply;
use crate::messages::{DataUri, Source};
use crate::Result;
use async_stream::stream;
use futures::{Stream, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// One increment of a streamed reply
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialUpdate {
    /// Text to append to the reply
    pub delta_text: String,

    /// Citations reported with this increment
    pub new_sources: Vec<Source>,
}

impl PartialUpdate {
    pub fn from_chunk(chunk: StreamChunk) -> Self {
        Self {
            delta_text: chunk.text.unwrap_or_default(),
            new_sources: chunk
                .grounding
                .iter()
                .filter_map(|g| g.to_source())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.delta_text.is_empty() && self.new_sources.is_empty()
    }
}

/// Final state of a one-shot image request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageOutcome {
    /// Reply text shown in place of the pending turn
    pub text: String,

    /// Generated image; `None` when the service returned no image
    pub image: Option<DataUri>,
}

/// Issues generation requests and yields their increments
#[derive(Clone)]
pub struct StreamConsumer {
    service: Arc<dyn GenerationService>,
}

impl StreamConsumer {
    pub fn new(service: Arc<dyn GenerationService>) -> Self {
        Self { service }
    }

    /// Stream a chat reply.
    ///
    /// Yields one `Ok` per non-empty increment, in upstream order. Any
    /// failure, whether opening the stream or mid-stream, is yielded once
    /// as `Err` and ends the sequence.
    pub fn run(&self, request: ChatRequest) -> impl Stream<Item = Result<PartialUpdate>> + Send + 'static {
        let service = Arc::clone(&self.service);

        stream! {
            let started = Instant::now();
            let mut chunks = match service.stream_chat(&request).await {
                Ok(chunks) => chunks,
                Err(e) => {
                    error!("Failed to open chat stream: {}", e);
                    yield Err(e);
                    return;
                }
            };

            let mut increments = 0usize;
            let mut first_increment_ms = None;

            while let Some(chunk) = chunks.next().await {
                match chunk {
                    Ok(chunk) => {
                        let update = PartialUpdate::from_chunk(chunk);
                        if update.is_empty() {
                            continue;
                        }

                        if first_increment_ms.is_none() {
                            first_increment_ms = Some(started.elapsed().as_millis() as u64);
                        }
                        increments += 1;
                        debug!(
                            "Increment {}: {} chars, {} sources",
                            increments,
                            update.delta_text.len(),
                            update.new_sources.len()
                        );
                        yield Ok(update);
                    }
                    Err(e) => {
                        error!("Chat stream failed after {} increments: {}", increments, e);
                        yield Err(e);
                        return;
                    }
                }
            }

            info!(
                "Chat stream complete: {} increments, first after {}ms, total {}ms",
                increments,
                first_increment_ms.unwrap_or_default(),
                started.elapsed().as_millis()
            );
        }
    }

    /// Issue a single non-streamed image request for `prompt`.
    pub async fn request_image(&self, prompt: &str) -> Result<ImageOutcome> {
        let started = Instant::now();
        let reply = self.service.generate_image(prompt).await?;

        info!(
            "Image request finished in {}ms (image returned: {})",
            started.elapsed().as_millis(),
            reply.image.is_some()
        );

        Ok(ImageOutcome {
            text: image_reply(prompt),
            image: reply.image,
        })
    }
}
