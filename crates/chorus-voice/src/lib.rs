#![doc = include_str!("../README.md")]
#![deny(unused_crate_dependencies)]

// Dev-dependencies used only by integration tests
#[cfg(test)]
use tokio_test as _;
#[cfg(test)]
use wiremock as _;

pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod mixer;
pub mod pipeline;
pub mod playback;
pub mod reaper;
pub mod segment;
pub mod sequencer;
pub mod synth;
pub mod utterance;

// Re-export key types for convenience
pub use backend::{HttpBackend, SynthesisBackend, VoiceReference};
pub use config::{BackendConfig, DeviceConfig, EngineConfig, PlaybackConfig};
pub use engine::{SpeakReceipt, SpeechEngine};
pub use error::{SynthesisError, VoiceError};
pub use events::SpeechEvent;
pub use mixer::{AudioOutput, Mixer, PlaybackChannel};
pub use playback::RodioOutput;
pub use segment::{SegmenterConfig, segment};
pub use utterance::{AudioBuffer, UtteranceId, UtteranceState, UtteranceSummary};
