//! Fixed prompt and reply texts

/// Persona used until the host supplies one
pub const DEFAULT_PERSONA: &str =
    "You are a helpful and friendly AI assistant. Be concise and clear in your responses.";

/// First model turn shown in an empty conversation
pub const DEFAULT_WELCOME_MESSAGE: &str = "Hello! I'm Chat Bot. How can I help you today?";

/// Appended to the persona when a document is active
pub const GROUNDING_INSTRUCTION: &str = "Use the following context to answer the user's question. If the context doesn't contain the answer, say you don't know, but still try to be helpful based on your general knowledge if permitted by your persona.";

/// Reply text substituted into a failed turn
pub const APOLOGY_MESSAGE: &str = "Sorry, I encountered an error processing your request.";

/// Shown in the pending turn while a one-shot image request runs
pub const GENERATING_IMAGE_MESSAGE: &str = "Generating image...";

/// System notice posted when an attachment cannot be read
pub const ATTACHMENT_FAILED_MESSAGE: &str =
    "Could not read the attached file. Please select it again.";

/// Reply text for a completed image request
pub fn image_reply(prompt: &str) -> String {
    format!("Here is the image you requested: \"{}\"", prompt)
}
