//! Voice playback adapter
//!
//! Synthesizes speech for a finished reply and plays it through a host
//! audio sink. Playback is best effort: every failure is logged and
//! reported as an outcome, never returned as an error.

use crate::audio::decode::{decode_speech_payload, downmix_to_mono};
use crate::audio::resampler::resample_speech;
use crate::llm::client::GenerationService;
use crate::llm::config::{ServiceConfig, SPEECH_SAMPLE_RATE};
use crate::messages::AudioData;
use crate::{ChatterError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Host audio output facility
pub trait AudioSink: Send + Sync {
    /// Acquire a rendering context; it is closed when playback ends
    fn open(&self) -> Result<Box<dyn PlaybackContext>>;
}

/// A live rendering context
#[async_trait]
pub trait PlaybackContext: Send {
    /// Native sample rate of the context
    fn sample_rate(&self) -> u32;

    /// Play mono samples at [`PlaybackContext::sample_rate`] until done
    async fn play(&mut self, audio: &AudioData) -> Result<()>;

    /// Release the context. Must be safe to call more than once.
    fn close(&mut self);
}

/// Closes the wrapped context on drop, including when the playing task is
/// aborted mid-play.
struct ContextGuard(Box<dyn PlaybackContext>);

impl Drop for ContextGuard {
    fn drop(&mut self) {
        self.0.close();
        debug!("Playback context closed");
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackOutcome {
    /// Audio played to the end
    Completed { duration_secs: f32 },

    /// The service returned no audio
    NoAudio,

    /// Synthesis, decode or output failed
    Failed(String),
}

impl PlaybackOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, PlaybackOutcome::Completed { .. })
    }
}

#[derive(Clone)]
pub struct VoicePlayback {
    service: Arc<dyn GenerationService>,
    sink: Arc<dyn AudioSink>,
    speech_sample_rate: u32,
}

impl VoicePlayback {
    pub fn new(service: Arc<dyn GenerationService>, sink: Arc<dyn AudioSink>) -> Self {
        Self {
            service,
            sink,
            speech_sample_rate: SPEECH_SAMPLE_RATE,
        }
    }

    /// Playback for a service built from `config`, using its speech rate
    pub fn from_config(
        service: Arc<dyn GenerationService>,
        sink: Arc<dyn AudioSink>,
        config: &ServiceConfig,
    ) -> Self {
        Self::new(service, sink).with_speech_sample_rate(config.speech_sample_rate)
    }

    /// Rate assumed for headerless PCM payloads
    pub fn with_speech_sample_rate(mut self, sample_rate: u32) -> Self {
        self.speech_sample_rate = sample_rate;
        self
    }

    /// Speak `text`. Resolves when playback completes or fails.
    pub async fn play(&self, text: &str) -> PlaybackOutcome {
        let started = Instant::now();

        let payload = match self.service.synthesize_speech(text).await {
            Ok(Some(payload)) if !payload.is_empty() => payload,
            Ok(_) => {
                warn!("Speech synthesis returned no audio");
                return PlaybackOutcome::NoAudio;
            }
            Err(e) => {
                warn!("Speech synthesis failed: {}", e);
                return PlaybackOutcome::Failed(e.to_string());
            }
        };

        let mut context = match self.sink.open() {
            Ok(context) => ContextGuard(context),
            Err(e) => {
                warn!("Could not open playback context: {}", e);
                return PlaybackOutcome::Failed(e.to_string());
            }
        };

        match self.render(&mut context, payload).await {
            Ok(duration_secs) => {
                info!(
                    "Played {:.2}s of speech ({}ms end to end)",
                    duration_secs,
                    started.elapsed().as_millis()
                );
                PlaybackOutcome::Completed { duration_secs }
            }
            Err(e) => {
                warn!("Playback failed: {}", e);
                PlaybackOutcome::Failed(e.to_string())
            }
        }
    }

    async fn render(&self, context: &mut ContextGuard, payload: String) -> Result<f32> {
        let pcm_rate = self.speech_sample_rate;
        let target_rate = context.0.sample_rate();

        // decode and sinc filtering are CPU bound; keep them off the runtime
        let (audio, source_rate) = tokio::task::spawn_blocking(move || {
            let decoded = decode_speech_payload(&payload, pcm_rate)?;
            let mono = downmix_to_mono(&decoded);
            let samples = resample_speech(&mono, decoded.sample_rate, target_rate)?;
            Ok::<_, ChatterError>((AudioData::new(samples, target_rate, 1), decoded.sample_rate))
        })
        .await
        .map_err(|e| {
            ChatterError::PlaybackError(format!("Speech decoding task failed: {}", e))
        })??;

        debug!(
            "Rendering {} samples at {} Hz (source {} Hz)",
            audio.samples.len(),
            target_rate,
            source_rate
        );

        context.0.play(&audio).await?;
        Ok(audio.duration_seconds())
    }
}
