//! Request mode selection for a new user turn
//!
//! A plain prefix heuristic: when image generation is enabled, a message
//! starting with one of [`IMAGE_TRIGGERS`] goes to the one-shot image
//! model. There is no way to opt out, so a chat message that happens to
//! start with "draw" is routed to image generation too.

/// Lower-case prefixes that route a turn to image generation
pub const IMAGE_TRIGGERS: [&str; 3] = ["generate image", "draw", "create an image"];

/// How a turn is sent to the generation service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    /// One-shot, non-streamed image generation
    DirectImageRequest,
    /// Streamed multimodal chat
    StreamedChatRequest,
}

pub fn classify(text: &str, image_generation_enabled: bool) -> RequestMode {
    if !image_generation_enabled {
        return RequestMode::StreamedChatRequest;
    }

    let normalized = text.trim().to_lowercase();
    if IMAGE_TRIGGERS
        .iter()
        .any(|trigger| normalized.starts_with(trigger))
    {
        RequestMode::DirectImageRequest
    } else {
        RequestMode::StreamedChatRequest
    }
}
