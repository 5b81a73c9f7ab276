//! Controller worker and host handle
//!
//! One tokio task owns the [`TurnController`]. The host talks to it through
//! a [`ControllerHandle`]: commands go in over an mpsc channel, events come
//! back on the controller's crossbeam channel.

use crate::integration::config::SessionConfig;
use crate::integration::controller::{ControllerEvent, RejectReason, Submission, TurnController};
use crate::messages::Turn;
use crate::{ChatterError, Result};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Commands accepted by the worker
#[derive(Debug, Clone)]
pub enum ControllerCommand {
    /// Run a turn
    Submit(Submission),

    /// Attach an image file, then run a turn with it
    SubmitWithFile { text: String, path: PathBuf },

    /// Empty the transcript
    ClearHistory,

    /// Seed an empty transcript with the welcome message
    Greet,

    /// Post a user-facing notice
    Notify(String),

    /// Stop the worker once the current turn resolves
    Shutdown,
}

/// Host-side handle to a running controller
#[derive(Clone)]
pub struct ControllerHandle {
    command_tx: mpsc::UnboundedSender<ControllerCommand>,
    event_rx: Receiver<ControllerEvent>,
    busy: Arc<AtomicBool>,
    snapshot: Arc<RwLock<Vec<Turn>>>,
}

impl ControllerHandle {
    fn send(&self, command: ControllerCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .map_err(|e| ChatterError::ChannelError(format!("Failed to send command: {}", e)))
    }

    /// Queue a turn. Returns `false` without sending while busy.
    pub fn submit(&self, submission: Submission) -> Result<bool> {
        if self.is_busy() {
            return Ok(false);
        }
        self.send(ControllerCommand::Submit(submission))?;
        Ok(true)
    }

    /// Queue a turn with an image read from `path`
    pub fn submit_with_file(&self, text: impl Into<String>, path: impl Into<PathBuf>) -> Result<bool> {
        if self.is_busy() {
            return Ok(false);
        }
        self.send(ControllerCommand::SubmitWithFile {
            text: text.into(),
            path: path.into(),
        })?;
        Ok(true)
    }

    /// Queue a clear. Returns `false` without sending while busy.
    pub fn clear_history(&self) -> Result<bool> {
        if self.is_busy() {
            return Ok(false);
        }
        self.send(ControllerCommand::ClearHistory)?;
        Ok(true)
    }

    pub fn greet(&self) -> Result<()> {
        self.send(ControllerCommand::Greet)
    }

    pub fn notify(&self, text: impl Into<String>) -> Result<()> {
        self.send(ControllerCommand::Notify(text.into()))
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(ControllerCommand::Shutdown)
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Last published transcript snapshot
    pub fn snapshot(&self) -> Vec<Turn> {
        self.snapshot.read().clone()
    }

    /// Try to receive an event from the controller
    pub fn try_recv_event(&self) -> Option<ControllerEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn event_receiver(&self) -> Receiver<ControllerEvent> {
        self.event_rx.clone()
    }
}

/// Run `controller` on a new tokio task.
///
/// `settings` is cloned once at the start of every turn.
pub fn spawn(
    controller: TurnController,
    settings: Arc<RwLock<SessionConfig>>,
) -> (ControllerHandle, JoinHandle<()>) {
    let (command_tx, command_rx) = mpsc::unbounded_channel();

    let handle = ControllerHandle {
        command_tx,
        event_rx: controller.event_receiver(),
        busy: controller.busy_flag(),
        snapshot: controller.shared_snapshot(),
    };

    let task = tokio::spawn(run(controller, settings, command_rx));
    (handle, task)
}

async fn run(
    mut controller: TurnController,
    settings: Arc<RwLock<SessionConfig>>,
    mut commands: mpsc::UnboundedReceiver<ControllerCommand>,
) {
    info!("Controller worker started");
    let events = controller.event_sender();

    while let Some(command) = commands.recv().await {
        debug!("Command: {:?}", command);

        let shutdown = match command {
            ControllerCommand::Submit(submission) => {
                let config = settings.read().clone();
                let turn = controller.submit(submission, &config);
                drain_while_busy(turn, &mut commands, &events).await
            }
            ControllerCommand::SubmitWithFile { text, path } => {
                if controller.is_busy() {
                    reject(&events, RejectReason::Busy);
                    false
                } else {
                    match controller.attach_file(&path).await {
                        Some(image) => {
                            let config = settings.read().clone();
                            let submission = Submission::text(text).with_image(image);
                            let turn = controller.submit(submission, &config);
                            drain_while_busy(turn, &mut commands, &events).await
                        }
                        None => false,
                    }
                }
            }
            ControllerCommand::ClearHistory => {
                if !controller.clear_history() {
                    reject(&events, RejectReason::Busy);
                }
                false
            }
            ControllerCommand::Greet => {
                let welcome = settings.read().welcome_message.clone();
                controller.greet(&welcome);
                false
            }
            ControllerCommand::Notify(text) => {
                controller.notify(text);
                false
            }
            ControllerCommand::Shutdown => true,
        };

        if shutdown {
            break;
        }
    }

    info!("Controller worker stopped");
}

fn reject(events: &Sender<ControllerEvent>, reason: RejectReason) {
    let _ = events.send(ControllerEvent::SubmissionRejected(reason));
}

/// Drive `turn` to completion while refusing commands that would touch the
/// transcript. Returns whether a shutdown arrived meanwhile.
async fn drain_while_busy<F>(
    turn: F,
    commands: &mut mpsc::UnboundedReceiver<ControllerCommand>,
    events: &Sender<ControllerEvent>,
) -> bool
where
    F: std::future::Future,
{
    tokio::pin!(turn);
    let mut shutdown = false;

    loop {
        tokio::select! {
            _ = &mut turn => break,
            Some(command) = commands.recv() => match command {
                ControllerCommand::Submit(_)
                | ControllerCommand::SubmitWithFile { .. }
                | ControllerCommand::ClearHistory => {
                    debug!("Rejecting command while busy");
                    reject(events, RejectReason::Busy);
                }
                ControllerCommand::Notify(text) => {
                    let _ = events.send(ControllerEvent::Notice(text));
                }
                ControllerCommand::Greet => {}
                ControllerCommand::Shutdown => {
                    warn!("Shutdown requested mid-turn; finishing the turn first");
                    shutdown = true;
                }
            },
        }
    }

    shutdown
}
