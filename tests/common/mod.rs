//! Scripted fakes shared by the integration tests

#![allow(dead_code)]

use async_stream::stream;
use async_trait::async_trait;
use chatter::integration::{ControllerEvent, ControllerHandle};
use chatter::llm::client::{ChatRequest, ChunkStream, GroundingChunk, ImageReply, StreamChunk, WebReference};
use chatter::llm::GenerationService;
use chatter::messages::{AudioData, DataUri};
use chatter::speech::{AudioSink, PlaybackContext, RecognitionEvent, SpeechRecognizer};
use chatter::{ChatterError, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

pub fn text(t: &str) -> Result<StreamChunk> {
    Ok(StreamChunk {
        text: Some(t.to_string()),
        grounding: vec![],
    })
}

pub fn cited(t: &str, sources: &[(&str, &str)]) -> Result<StreamChunk> {
    Ok(StreamChunk {
        text: Some(t.to_string()),
        grounding: sources
            .iter()
            .map(|(title, uri)| GroundingChunk {
                web: Some(WebReference {
                    uri: Some(uri.to_string()),
                    title: Some(title.to_string()),
                }),
            })
            .collect(),
    })
}

pub fn upstream_error() -> Result<StreamChunk> {
    Err(ChatterError::UpstreamError("connection reset".into()))
}

/// Generation service that replays a fixed script and records requests
#[derive(Default)]
pub struct ScriptedService {
    pub chunks: Vec<Result<StreamChunk>>,
    pub image: Option<DataUri>,
    pub image_error: bool,
    pub speech: Option<String>,
    /// When set, streams wait for a notification before the first chunk
    pub gate: Option<Arc<Notify>>,
    pub chat_requests: Mutex<Vec<ChatRequest>>,
    pub image_prompts: Mutex<Vec<String>>,
    pub speech_requests: Mutex<Vec<String>>,
}

impl ScriptedService {
    pub fn streaming(chunks: Vec<Result<StreamChunk>>) -> Self {
        Self {
            chunks,
            ..Default::default()
        }
    }

    pub fn with_speech(mut self, payload: impl Into<String>) -> Self {
        self.speech = Some(payload.into());
        self
    }

    pub fn with_image(mut self, image: DataUri) -> Self {
        self.image = Some(image);
        self
    }

    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn last_request(&self) -> Option<ChatRequest> {
        self.chat_requests.lock().last().cloned()
    }
}

#[async_trait]
impl GenerationService for ScriptedService {
    async fn generate_image(&self, prompt: &str) -> Result<ImageReply> {
        self.image_prompts.lock().push(prompt.to_string());
        if self.image_error {
            return Err(ChatterError::UpstreamError("quota exceeded".into()));
        }
        Ok(ImageReply {
            text: None,
            image: self.image.clone(),
        })
    }

    async fn stream_chat(&self, request: &ChatRequest) -> Result<ChunkStream> {
        self.chat_requests.lock().push(request.clone());
        let chunks = self.chunks.clone();
        let gate = self.gate.clone();

        Ok(Box::pin(stream! {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            for chunk in chunks {
                yield chunk;
            }
        }))
    }

    async fn synthesize_speech(&self, text: &str) -> Result<Option<String>> {
        self.speech_requests.lock().push(text.to_string());
        Ok(self.speech.clone())
    }
}

/// Audio sink that records what it was asked to play
pub struct RecordingSink {
    pub sample_rate: u32,
    pub opened: AtomicUsize,
    pub closed: Arc<AtomicUsize>,
    pub played: Arc<Mutex<Vec<AudioData>>>,
    pub fail_play: bool,
    /// When set, `play` never returns
    pub stall: bool,
}

impl RecordingSink {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            opened: AtomicUsize::new(0),
            closed: Arc::new(AtomicUsize::new(0)),
            played: Arc::new(Mutex::new(Vec::new())),
            fail_play: false,
            stall: false,
        }
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

struct RecordingContext {
    sample_rate: u32,
    closed: Arc<AtomicUsize>,
    played: Arc<Mutex<Vec<AudioData>>>,
    fail_play: bool,
    stall: bool,
    is_closed: bool,
}

impl AudioSink for RecordingSink {
    fn open(&self) -> Result<Box<dyn PlaybackContext>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RecordingContext {
            sample_rate: self.sample_rate,
            closed: Arc::clone(&self.closed),
            played: Arc::clone(&self.played),
            fail_play: self.fail_play,
            stall: self.stall,
            is_closed: false,
        }))
    }
}

#[async_trait]
impl PlaybackContext for RecordingContext {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    async fn play(&mut self, audio: &AudioData) -> Result<()> {
        if self.fail_play {
            return Err(ChatterError::AudioDeviceError("device unplugged".into()));
        }
        self.played.lock().push(audio.clone());
        if self.stall {
            futures::future::pending::<()>().await;
        }
        Ok(())
    }

    fn close(&mut self) {
        if !self.is_closed {
            self.is_closed = true;
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Recognizer driven by the test through [`FakeRecognizer::emit`]
#[derive(Default)]
pub struct FakeRecognizer {
    events: Mutex<Option<mpsc::UnboundedSender<RecognitionEvent>>>,
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
}

impl FakeRecognizer {
    pub fn emit(&self, event: RecognitionEvent) {
        if let Some(tx) = self.events.lock().as_ref() {
            let _ = tx.send(event);
        }
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl SpeechRecognizer for FakeRecognizer {
    fn start(&self, events: mpsc::UnboundedSender<RecognitionEvent>) -> Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        *self.events.lock() = Some(events);
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Poll `condition` until it holds or two seconds pass
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..400 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// Wait for the first event matching `predicate`, skipping others
pub async fn wait_for_event(
    handle: &ControllerHandle,
    predicate: impl Fn(&ControllerEvent) -> bool,
) -> Option<ControllerEvent> {
    for _ in 0..400 {
        while let Some(event) = handle.try_recv_event() {
            if predicate(&event) {
                return Some(event);
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    None
}
