//! Turn controller
//!
//! Sequences one user turn at a time over an owned [`Transcript`]:
//!
//! ```text
//! Idle --submit--> Submitting --success--> Idle (+ playback, detached)
//!                       \------error-----> Idle (apology in the reply slot)
//! ```
//!
//! The `busy` flag is set from submission until the turn resolves and is
//! the only gate on new submissions. The pending model turn is the single
//! place the transcript is mutated in place.

use crate::integration::config::SessionConfig;
use crate::llm::client::{ChatRequest, GenerationService};
use crate::llm::grounding::build_system_instruction;
use crate::llm::intent::{classify, RequestMode};
use crate::llm::prompts::{APOLOGY_MESSAGE, GENERATING_IMAGE_MESSAGE};
use crate::llm::stream::{PartialUpdate, StreamConsumer};
use crate::messages::attachment::{encode_file, strip_transport_prefix};
use crate::messages::{DataUri, Transcript, Turn};
use crate::speech::playback::{PlaybackOutcome, VoicePlayback};
use crate::{ChatterError, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use futures::StreamExt;
use parking_lot::RwLock;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// A user turn as entered in the compose box
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Submission {
    pub text: String,
    pub image: Option<DataUri>,
}

impl Submission {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image: None,
        }
    }

    pub fn with_image(mut self, image: DataUri) -> Self {
        self.image = Some(image);
        self
    }

    /// Blank text and no image
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.image.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// A turn is already in flight
    Busy,
    /// Nothing to send
    Empty,
}

/// How a started turn resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The reply was delivered
    Completed { mode: RequestMode, text: String },
    /// The reply slot holds the apology; carries the cause
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Rejected(RejectReason),
    Resolved(TurnOutcome),
}

/// Events published to the host
#[derive(Debug, Clone)]
pub enum ControllerEvent {
    /// A user turn and its pending reply were appended
    TurnStarted { turn_id: Uuid },

    /// Full transcript snapshot, pending turn last
    TranscriptUpdated(Vec<Turn>),

    /// The in-flight turn resolved and busy is clear
    TurnResolved(TurnOutcome),

    /// A submission or clear was refused
    SubmissionRejected(RejectReason),

    /// Detached playback of a reply ended
    PlaybackFinished(PlaybackOutcome),

    HistoryCleared,

    /// User-facing notice
    Notice(String),
}

pub struct TurnController {
    transcript: Transcript,
    consumer: StreamConsumer,
    playback: Option<VoicePlayback>,
    playback_task: Option<JoinHandle<()>>,
    busy: Arc<AtomicBool>,
    latest: Arc<RwLock<Vec<Turn>>>,
    event_tx: Sender<ControllerEvent>,
    event_rx: Receiver<ControllerEvent>,
}

impl TurnController {
    pub fn new(service: Arc<dyn GenerationService>) -> Self {
        let (event_tx, event_rx) = unbounded();
        Self {
            transcript: Transcript::new(),
            consumer: StreamConsumer::new(service),
            playback: None,
            playback_task: None,
            busy: Arc::new(AtomicBool::new(false)),
            latest: Arc::new(RwLock::new(Vec::new())),
            event_tx,
            event_rx,
        }
    }

    /// Enable spoken replies through `playback`
    pub fn with_playback(mut self, playback: VoicePlayback) -> Self {
        self.playback = Some(playback);
        self
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Shared read-only view of the busy flag
    pub fn busy_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.busy)
    }

    pub fn event_receiver(&self) -> Receiver<ControllerEvent> {
        self.event_rx.clone()
    }

    pub(crate) fn event_sender(&self) -> Sender<ControllerEvent> {
        self.event_tx.clone()
    }

    /// Last published snapshot, readable while a turn is in flight
    pub fn shared_snapshot(&self) -> Arc<RwLock<Vec<Turn>>> {
        Arc::clone(&self.latest)
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Current transcript, pending turn last
    pub fn snapshot(&self) -> Vec<Turn> {
        self.transcript.get_all()
    }

    fn emit(&self, event: ControllerEvent) {
        if self.event_tx.send(event).is_err() {
            debug!("Event channel closed");
        }
    }

    fn publish(&self) {
        let snapshot = self.transcript.get_all();
        *self.latest.write() = snapshot.clone();
        self.emit(ControllerEvent::TranscriptUpdated(snapshot));
    }

    fn reject(&self, reason: RejectReason) -> RejectReason {
        debug!("Submission rejected: {:?}", reason);
        self.emit(ControllerEvent::SubmissionRejected(reason));
        reason
    }

    /// Start a turn: append the user turn and an empty pending reply.
    ///
    /// Leaves the transcript untouched when rejected.
    pub fn begin_turn(&mut self, submission: &Submission) -> std::result::Result<Uuid, RejectReason> {
        if self.is_busy() || self.transcript.has_pending() {
            return Err(self.reject(RejectReason::Busy));
        }
        if submission.is_empty() {
            return Err(self.reject(RejectReason::Empty));
        }
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(self.reject(RejectReason::Busy));
        }

        if let Some(task) = self.playback_task.take() {
            if !task.is_finished() {
                debug!("Stopping playback from the previous turn");
            }
            task.abort();
        }

        self.transcript.add(Turn::user(
            submission.text.trim(),
            submission.image.clone(),
        ));
        let turn_id = match self.transcript.begin_pending() {
            Some(pending) => pending.id(),
            None => {
                self.busy.store(false, Ordering::SeqCst);
                return Err(self.reject(RejectReason::Busy));
            }
        };

        info!("Turn {} started", turn_id);
        self.emit(ControllerEvent::TurnStarted { turn_id });
        self.publish();
        Ok(turn_id)
    }

    /// Append one increment to the pending turn and republish
    pub fn apply_update(&mut self, update: &PartialUpdate) {
        match self.transcript.pending_mut() {
            Some(pending) => pending.append(&update.delta_text, &update.new_sources),
            None => {
                warn!("Update arrived with no pending turn");
                return;
            }
        }
        self.publish();
    }

    fn set_pending(&mut self, text: &str, image: Option<DataUri>) {
        if let Some(pending) = self.transcript.pending_mut() {
            pending.replace_text(text);
            pending.set_image(image);
        }
        self.publish();
    }

    /// Finalize a successful turn and, if enabled, speak it
    pub fn complete(&mut self, mode: RequestMode, config: &SessionConfig) -> TurnOutcome {
        let text = self
            .transcript
            .finish_pending()
            .map(|turn| turn.text().to_string())
            .unwrap_or_default();
        self.busy.store(false, Ordering::SeqCst);

        info!("Turn resolved ({:?}, {} chars)", mode, text.len());
        self.publish();

        if config.voice_output_enabled && !text.trim().is_empty() {
            self.start_playback(text.clone());
        }

        let outcome = TurnOutcome::Completed { mode, text };
        self.emit(ControllerEvent::TurnResolved(outcome.clone()));
        outcome
    }

    /// Put the apology in the reply slot and finalize
    pub fn fail(&mut self, cause: &ChatterError) -> TurnOutcome {
        error!("Turn failed: {}", cause);
        match self.transcript.pending_mut() {
            Some(pending) => pending.replace_text(APOLOGY_MESSAGE),
            None => self.transcript.add(Turn::model(APOLOGY_MESSAGE)),
        }
        self.transcript.finish_pending();
        self.busy.store(false, Ordering::SeqCst);
        self.publish();

        let outcome = TurnOutcome::Failed(cause.to_string());
        self.emit(ControllerEvent::TurnResolved(outcome.clone()));
        outcome
    }

    fn start_playback(&mut self, text: String) {
        let Some(playback) = self.playback.clone() else {
            return;
        };
        let event_tx = self.event_tx.clone();

        self.playback_task = Some(tokio::spawn(async move {
            let outcome = playback.play(&text).await;
            let _ = event_tx.send(ControllerEvent::PlaybackFinished(outcome));
        }));
    }

    /// Run one full turn. Rejected submissions leave no trace.
    pub async fn submit(&mut self, submission: Submission, config: &SessionConfig) -> SubmitOutcome {
        if let Err(reason) = self.begin_turn(&submission) {
            return SubmitOutcome::Rejected(reason);
        }

        let text = submission.text.trim();
        let mode = classify(text, config.image_generation_enabled);
        debug!("Request mode: {:?}", mode);

        let result = match mode {
            RequestMode::DirectImageRequest => self.run_image(text).await,
            RequestMode::StreamedChatRequest => {
                self.run_chat(text, submission.image.as_ref(), config).await
            }
        };

        let outcome = match result {
            Ok(()) => self.complete(mode, config),
            Err(e) => self.fail(&e),
        };
        SubmitOutcome::Resolved(outcome)
    }

    async fn run_image(&mut self, prompt: &str) -> Result<()> {
        self.set_pending(GENERATING_IMAGE_MESSAGE, None);
        let outcome = self.consumer.request_image(prompt).await?;
        self.set_pending(&outcome.text, outcome.image);
        Ok(())
    }

    async fn run_chat(
        &mut self,
        text: &str,
        image: Option<&DataUri>,
        config: &SessionConfig,
    ) -> Result<()> {
        let request = ChatRequest {
            text: text.to_string(),
            image: image.map(|uri| strip_transport_prefix(uri.as_str())),
            system_instruction: build_system_instruction(
                &config.persona,
                config.document.as_deref(),
            ),
            model_tier: config.model_tier,
            search_enabled: config.search_enabled,
        };

        let updates = self.consumer.run(request);
        futures::pin_mut!(updates);

        while let Some(update) = updates.next().await {
            self.apply_update(&update?);
        }
        Ok(())
    }

    /// Empty the transcript. Refused while a turn is in flight.
    pub fn clear_history(&mut self) -> bool {
        if self.is_busy() || self.transcript.has_pending() {
            debug!("Clear refused while busy");
            return false;
        }
        self.transcript.clear();
        info!("History cleared");
        self.emit(ControllerEvent::HistoryCleared);
        self.publish();
        true
    }

    /// Seed an empty, idle conversation with the welcome turn
    pub fn greet(&mut self, welcome: &str) -> bool {
        if self.is_busy() || !self.transcript.is_empty() || welcome.trim().is_empty() {
            return false;
        }
        self.transcript.add(Turn::model(welcome));
        self.publish();
        true
    }

    /// Post a notice. It becomes a system turn unless a turn is in flight.
    pub fn notify(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.emit(ControllerEvent::Notice(text.clone()));
        if !self.is_busy() && !self.transcript.has_pending() {
            self.transcript.add(Turn::system(text));
            self.publish();
        }
    }

    /// Read and encode an image attachment.
    ///
    /// A read failure is reported to the user as a notice.
    pub async fn attach_file(&mut self, path: impl AsRef<Path>) -> Option<DataUri> {
        match encode_file(path.as_ref()).await {
            Ok(uri) => Some(uri),
            Err(e) => {
                warn!("Attachment {} failed: {}", path.as_ref().display(), e);
                self.notify(e.user_message());
                None
            }
        }
    }
}

impl Drop for TurnController {
    fn drop(&mut self) {
        if let Some(task) = self.playback_task.take() {
            task.abort();
        }
    }
}
