//! Voice input and output adapters
//!
//! This module provides:
//! - Dictation into the compose box through a host speech recognizer
//! - Spoken playback of finished replies through a host audio sink

pub mod capture;
pub mod playback;

pub use capture::{
    CaptureState, RecognitionEvent, RecognitionSegment, SpeechRecognizer, VoiceCapture,
};
pub use playback::{AudioSink, PlaybackContext, PlaybackOutcome, VoicePlayback};
