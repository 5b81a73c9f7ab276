use crate::messages::AudioData;
use crate::speech::playback::{AudioSink, PlaybackContext};
use crate::{ChatterError, Result};
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, Sender};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

const DRAIN_POLL: Duration = Duration::from_millis(20);

/// Speaker output on the default cpal device.
///
/// Each [`AudioSink::open`] builds a fresh output stream. The stream is
/// owned by a dedicated thread since `cpal::Stream` cannot cross threads;
/// the context feeds it through a shared sample queue.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalSink;

impl CpalSink {
    pub fn new() -> Self {
        Self
    }
}

impl AudioSink for CpalSink {
    fn open(&self) -> Result<Box<dyn PlaybackContext>> {
        let queue: Arc<Mutex<VecDeque<f32>>> = Arc::new(Mutex::new(VecDeque::new()));
        let (close_tx, close_rx) = bounded::<()>(1);
        let (ready_tx, ready_rx) = bounded::<Result<u32>>(1);

        let stream_queue = Arc::clone(&queue);
        std::thread::spawn(move || {
            let stream = match build_stream(stream_queue) {
                Ok((stream, rate)) => {
                    let _ = ready_tx.send(Ok(rate));
                    stream
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };

            // blocks until the context closes or is dropped
            let _ = close_rx.recv();
            drop(stream);
            debug!("Output stream released");
        });

        let sample_rate = ready_rx
            .recv()
            .map_err(|e| ChatterError::AudioDeviceError(format!("Output thread exited: {}", e)))??;

        info!("Opened playback context at {} Hz", sample_rate);
        Ok(Box::new(CpalContext {
            queue,
            sample_rate,
            close_tx: Some(close_tx),
        }))
    }
}

fn build_stream(queue: Arc<Mutex<VecDeque<f32>>>) -> Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| ChatterError::AudioDeviceError("No output device available".into()))?;

    info!(
        "Using output device: {}",
        device.name().unwrap_or_else(|_| "Unknown".to_string())
    );

    let config: cpal::StreamConfig = device
        .default_output_config()
        .map_err(|e| {
            ChatterError::AudioDeviceError(format!("Failed to get output config: {}", e))
        })?
        .into();
    let channels = config.channels as usize;
    let sample_rate = config.sample_rate.0;

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let mut queue = queue.lock();
                for frame in data.chunks_mut(channels) {
                    let sample = queue.pop_front().unwrap_or(0.0);
                    frame.fill(sample);
                }
            },
            |err| error!("Audio output stream error: {}", err),
            None,
        )
        .map_err(|e| {
            ChatterError::AudioDeviceError(format!("Failed to build output stream: {}", e))
        })?;

    stream.play().map_err(|e| {
        ChatterError::AudioDeviceError(format!("Failed to start output stream: {}", e))
    })?;

    Ok((stream, sample_rate))
}

struct CpalContext {
    queue: Arc<Mutex<VecDeque<f32>>>,
    sample_rate: u32,
    close_tx: Option<Sender<()>>,
}

#[async_trait]
impl PlaybackContext for CpalContext {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    async fn play(&mut self, audio: &AudioData) -> Result<()> {
        if self.close_tx.is_none() {
            return Err(ChatterError::PlaybackError("Context already closed".into()));
        }

        self.queue.lock().extend(audio.samples.iter().copied());

        while !self.queue.lock().is_empty() {
            tokio::time::sleep(DRAIN_POLL).await;
        }
        Ok(())
    }

    fn close(&mut self) {
        if let Some(tx) = self.close_tx.take() {
            self.queue.lock().clear();
            let _ = tx.send(());
        }
    }
}

impl Drop for CpalContext {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_and_close() {
        // No output device in most CI environments
        if let Ok(mut context) = CpalSink::new().open() {
            assert!(context.sample_rate() > 0);
            context.close();
            context.close();
        }
    }
}
