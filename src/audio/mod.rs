pub mod decode;
#[cfg(feature = "audio-io")]
pub mod output;
pub mod resampler;

pub use decode::{decode_pcm16, decode_speech_payload, downmix_to_mono};
#[cfg(feature = "audio-io")]
pub use output::CpalSink;
pub use resampler::{resample_speech, SpeechResampler};
