pub mod audio;
pub mod integration;
pub mod llm;
pub mod messages;
pub mod speech;

use crate::llm::prompts::{APOLOGY_MESSAGE, ATTACHMENT_FAILED_MESSAGE};
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ChatterError {
    #[error("Attachment read error: {0}")]
    AttachmentReadError(String),

    #[error("Upstream error: {0}")]
    UpstreamError(String),

    #[error("Playback error: {0}")]
    PlaybackError(String),

    #[error("Recognition error: {0}")]
    RecognitionError(String),

    #[error("Audio device error: {0}")]
    AudioDeviceError(String),

    #[error("Audio processing error: {0}")]
    AudioProcessingError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Channel error: {0}")]
    ChannelError(String),

    #[error("IO error: {0}")]
    IOError(String),
}

impl From<std::io::Error> for ChatterError {
    fn from(e: std::io::Error) -> Self {
        ChatterError::IOError(e.to_string())
    }
}

impl ChatterError {
    /// Get a user-friendly description
    pub fn user_message(&self) -> String {
        match self {
            ChatterError::AttachmentReadError(_) => ATTACHMENT_FAILED_MESSAGE.to_string(),
            ChatterError::UpstreamError(_) => APOLOGY_MESSAGE.to_string(),
            ChatterError::PlaybackError(_) => {
                "Audio playback failed. The reply is still shown as text.".to_string()
            }
            ChatterError::RecognitionError(_) => {
                "Speech recognition stopped. Please try again.".to_string()
            }
            ChatterError::AudioDeviceError(_) => {
                "Audio device error. Please check your speakers.".to_string()
            }
            ChatterError::AudioProcessingError(_) => {
                "Audio processing failed.".to_string()
            }
            ChatterError::ConfigError(_) => {
                "Configuration error. Please check settings.".to_string()
            }
            ChatterError::ChannelError(_) => {
                "Internal communication error. Please reload the widget.".to_string()
            }
            ChatterError::IOError(_) => "File system error occurred.".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ChatterError>;
