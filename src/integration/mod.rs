//! Turn orchestration for the chat widget
//!
//! Connects the pieces per turn: Submission -> Intent -> Grounding ->
//! Stream/Image request -> Transcript -> Playback

pub mod config;
pub mod controller;
pub mod documents;
pub mod worker;

pub use config::SessionConfig;
pub use controller::{
    ControllerEvent, RejectReason, SubmitOutcome, Submission, TurnController, TurnOutcome,
};
pub use documents::{Document, DocumentLibrary};
pub use worker::{spawn, ControllerCommand, ControllerHandle};
