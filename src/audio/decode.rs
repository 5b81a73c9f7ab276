//! Decoding of synthesized speech payloads
//!
//! The speech service returns base64 audio. It is usually headerless
//! 16-bit little-endian mono PCM at the service rate; a payload that
//! starts with a RIFF header is read as WAV instead.

use crate::messages::AudioData;
use crate::{ChatterError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hound::{SampleFormat, WavReader};
use std::io::Cursor;
use tracing::debug;

const RIFF_MAGIC: &[u8] = b"RIFF";

/// Decode a base64 speech payload into playable samples.
///
/// `pcm_sample_rate` applies to headerless PCM only; WAV payloads carry
/// their own rate.
pub fn decode_speech_payload(payload: &str, pcm_sample_rate: u32) -> Result<AudioData> {
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| ChatterError::PlaybackError(format!("Invalid base64 audio: {}", e)))?;

    if bytes.starts_with(RIFF_MAGIC) {
        decode_wav(&bytes)
    } else {
        decode_pcm16(&bytes, pcm_sample_rate)
    }
}

/// Interpret raw bytes as 16-bit little-endian mono PCM
pub fn decode_pcm16(bytes: &[u8], sample_rate: u32) -> Result<AudioData> {
    if bytes.is_empty() {
        return Err(ChatterError::PlaybackError("Empty audio payload".into()));
    }
    if bytes.len() % 2 != 0 {
        return Err(ChatterError::PlaybackError(format!(
            "PCM payload has odd length {}",
            bytes.len()
        )));
    }

    let samples: Vec<f32> = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / i16::MAX as f32)
        .collect();

    debug!("Decoded {} PCM samples at {} Hz", samples.len(), sample_rate);
    Ok(AudioData::new(samples, sample_rate, 1))
}

fn decode_wav(bytes: &[u8]) -> Result<AudioData> {
    let mut reader = WavReader::new(Cursor::new(bytes))
        .map_err(|e| ChatterError::PlaybackError(format!("Invalid WAV payload: {}", e)))?;

    let spec = reader.spec();
    let read_err =
        |e: hound::Error| ChatterError::PlaybackError(format!("Failed to read sample: {}", e));

    let samples: Result<Vec<f32>> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, _) => reader
            .samples::<f32>()
            .map(|s| s.map_err(read_err))
            .collect(),
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / i16::MAX as f32).map_err(read_err))
            .collect(),
        (SampleFormat::Int, 24) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 8_388_607.0).map_err(read_err))
            .collect(),
        (SampleFormat::Int, 32) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / i32::MAX as f32).map_err(read_err))
            .collect(),
        (_, bits) => {
            return Err(ChatterError::PlaybackError(format!(
                "Unsupported WAV bit depth: {}",
                bits
            )))
        }
    };

    let samples = samples?;
    if samples.is_empty() {
        return Err(ChatterError::PlaybackError("WAV payload has no samples".into()));
    }

    debug!(
        "Decoded WAV payload: {} samples, {} Hz, {} channels",
        samples.len(),
        spec.sample_rate,
        spec.channels
    );
    Ok(AudioData::new(samples, spec.sample_rate, spec.channels))
}

/// Fold interleaved channels down to mono by averaging
pub fn downmix_to_mono(audio: &AudioData) -> Vec<f32> {
    if audio.channels <= 1 {
        return audio.samples.clone();
    }
    let channels = audio.channels as usize;
    audio
        .samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}
