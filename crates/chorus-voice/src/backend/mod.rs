//! Synthesis backend trait - engine-agnostic interface to the speech service.
//!
//! The engine only ever holds an `Arc<dyn SynthesisBackend>`, so the HTTP
//! service can be swapped for an in-process double in tests.
//!
//! ## Backend implementations
//!
//! | Module     | Transport                                   |
//! |------------|---------------------------------------------|
//! | [`http`]   | `POST {text, audio_paths}` → raw audio body |

pub mod http;

use std::fmt;
use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::error::SynthesisError;

pub use http::HttpBackend;

/// The reference sample identifying which voice a chunk is spoken in.
///
/// Holds an already-resolved path; mapping character names to files is the
/// caller's job.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VoiceReference {
    name: String,
    path: PathBuf,
}

impl VoiceReference {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Character name, used for logging and utterance ids.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path to the reference sample.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for VoiceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.path.display())
    }
}

/// Backend-agnostic text-to-speech service.
///
/// Implementations must be `Send + Sync`: one instance is shared by every
/// worker of every utterance, concurrently.
#[async_trait::async_trait]
pub trait SynthesisBackend: Send + Sync {
    /// Synthesize `text` in `voice`, returning encoded audio (WAV).
    ///
    /// Exactly one backend request per call; no batching or retries.
    async fn synthesize(&self, text: &str, voice: &VoiceReference) -> Result<Bytes, SynthesisError>;
}
