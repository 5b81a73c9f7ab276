//! Voice capture adapter
//!
//! Wraps a host speech recognizer as a start/stop-able producer of a live
//! transcript string. Only finalized segments reach the published value;
//! interim segments are dropped. The adapter feeds the compose box and
//! never touches the chat transcript.

use crate::{ChatterError, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// One recognized segment as reported by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionSegment {
    pub transcript: String,
    pub is_final: bool,
}

impl RecognitionSegment {
    pub fn interim(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            is_final: false,
        }
    }

    pub fn final_(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            is_final: true,
        }
    }
}

/// Events emitted by a running recognizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// The full result list for the current session, interim and final
    Results(Vec<RecognitionSegment>),

    /// The recognizer failed; no further results follow
    Error(String),

    /// The recognizer finished on its own
    End,
}

/// Host continuous speech recognition facility
pub trait SpeechRecognizer: Send + Sync {
    /// Begin continuous recognition, reporting through `events`
    fn start(&self, events: mpsc::UnboundedSender<RecognitionEvent>) -> Result<()>;

    /// Stop recognition; later events are ignored by the adapter
    fn stop(&self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Listening,
}

/// Concatenate final segments in order, skipping interim ones
pub fn finalized_text(segments: &[RecognitionSegment]) -> String {
    segments
        .iter()
        .filter(|s| s.is_final)
        .map(|s| s.transcript.as_str())
        .collect()
}

pub struct VoiceCapture {
    recognizer: Arc<dyn SpeechRecognizer>,
    state: Arc<Mutex<CaptureState>>,
    latest_final: Arc<Mutex<String>>,
    transcript_tx: watch::Sender<String>,
    task: Option<JoinHandle<()>>,
}

impl VoiceCapture {
    pub fn new(recognizer: Arc<dyn SpeechRecognizer>) -> Self {
        let (transcript_tx, _) = watch::channel(String::new());
        Self {
            recognizer,
            state: Arc::new(Mutex::new(CaptureState::Idle)),
            latest_final: Arc::new(Mutex::new(String::new())),
            transcript_tx,
            task: None,
        }
    }

    /// Watch the published transcript
    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.transcript_tx.subscribe()
    }

    /// Current published transcript
    pub fn transcript(&self) -> String {
        self.transcript_tx.borrow().clone()
    }

    pub fn state(&self) -> CaptureState {
        *self.state.lock()
    }

    pub fn is_listening(&self) -> bool {
        self.state() == CaptureState::Listening
    }

    /// Start continuous recognition.
    ///
    /// No-op while already listening. Clears the previous transcript.
    /// Must be called from within a tokio runtime.
    pub fn start_listening(&mut self) -> Result<()> {
        if self.is_listening() {
            debug!("Already listening");
            return Ok(());
        }

        if let Some(task) = self.task.take() {
            task.abort();
        }

        self.latest_final.lock().clear();
        self.transcript_tx.send_replace(String::new());

        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        *self.state.lock() = CaptureState::Listening;

        if let Err(e) = self.recognizer.start(events_tx) {
            *self.state.lock() = CaptureState::Idle;
            warn!("Speech recognizer failed to start: {}", e);
            return Err(ChatterError::RecognitionError(e.to_string()));
        }

        let state = Arc::clone(&self.state);
        let latest_final = Arc::clone(&self.latest_final);
        let transcript_tx = self.transcript_tx.clone();
        let recognizer = Arc::clone(&self.recognizer);

        self.task = Some(tokio::spawn(async move {
            while let Some(event) = events_rx.recv().await {
                if *state.lock() != CaptureState::Listening {
                    break;
                }

                match event {
                    RecognitionEvent::Results(segments) => {
                        let text = finalized_text(&segments);
                        let mut latest = latest_final.lock();
                        if *latest != text {
                            debug!("Final transcript now {} chars", text.len());
                            *latest = text.clone();
                            transcript_tx.send_replace(text);
                        }
                    }
                    RecognitionEvent::Error(reason) => {
                        warn!("Speech recognition error: {}", reason);
                        *state.lock() = CaptureState::Idle;
                        if let Err(e) = recognizer.stop() {
                            debug!("Recognizer stop after error failed: {}", e);
                        }
                        break;
                    }
                    RecognitionEvent::End => {
                        debug!("Speech recognition ended");
                        *state.lock() = CaptureState::Idle;
                        break;
                    }
                }
            }
        }));

        info!("Voice capture started");
        Ok(())
    }

    /// Stop recognition and flush the final transcript.
    ///
    /// Events arriving after this call are discarded.
    pub fn stop_listening(&mut self) -> Result<String> {
        let was_listening = {
            let mut state = self.state.lock();
            let was = *state == CaptureState::Listening;
            *state = CaptureState::Idle;
            was
        };

        if let Some(task) = self.task.take() {
            task.abort();
        }

        let stopped = if was_listening {
            self.recognizer
                .stop()
                .map_err(|e| ChatterError::RecognitionError(e.to_string()))
        } else {
            Ok(())
        };

        let final_text = self.latest_final.lock().clone();
        self.transcript_tx.send_replace(final_text.clone());
        info!("Voice capture stopped ({} chars)", final_text.len());

        stopped.map(|_| final_text)
    }
}

impl Drop for VoiceCapture {
    fn drop(&mut self) {
        if self.is_listening() {
            let _ = self.recognizer.stop();
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
