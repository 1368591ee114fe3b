//! Speech engine error types.

use std::time::Duration;

/// Failure of a single backend synthesis call.
///
/// Every way a chunk can fail to turn into audio is folded into one of these
/// variants so that nothing escapes a worker as an untyped fault.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SynthesisError {
    /// Backend answered with a non-success HTTP status.
    #[error("backend returned HTTP {status}")]
    Status { status: u16 },

    /// Connection, protocol or body-read failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// No answer within the request timeout.
    #[error("backend did not answer within {0:?}")]
    Timeout(Duration),

    /// Synthesized bytes could not be persisted to the temporary store.
    #[error("failed to store synthesized audio: {0}")]
    Store(String),
}

impl From<reqwest::Error> for SynthesisError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            Self::Status {
                status: status.as_u16(),
            }
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Errors that can occur in the speech engine.
#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    /// Input contained nothing speakable.
    #[error("empty text")]
    EmptyText,

    /// A chunk could not be synthesized.
    #[error("speech synthesis failed: {0}")]
    Synthesis(#[from] SynthesisError),

    /// The first chunk failed, so the whole utterance was abandoned.
    #[error("utterance {utterance} aborted: {cause}")]
    UtteranceAborted {
        utterance: String,
        cause: SynthesisError,
    },

    /// Every device channel is busy; the chunk was dropped.
    #[error("no free playback channel")]
    ChannelUnavailable,

    /// Local device or file error while playing one chunk.
    #[error("playback of chunk {chunk_index} failed: {cause}")]
    Playback { chunk_index: usize, cause: String },

    /// Failed to open the audio output stream.
    #[error("failed to open audio output stream: {0}")]
    OutputStreamError(String),

    /// Audio file could not be decoded for playback.
    #[error("failed to decode audio: {0}")]
    Decode(String),

    /// Invalid engine configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// IO error (temporary store, voice files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
