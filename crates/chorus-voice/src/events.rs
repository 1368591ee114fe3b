//! Events emitted by the engine to the application layer.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::utterance::{UtteranceId, UtteranceState, UtteranceSummary};

/// Progress of an utterance, in the order it happens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SpeechEvent {
    /// Text was accepted and segmented.
    Started {
        utterance: UtteranceId,
        voice: String,
        chunks: usize,
    },

    /// A chunk's audio is ready.
    ChunkSynthesized {
        utterance: UtteranceId,
        index: usize,
        elapsed: Duration,
    },

    /// A chunk could not be synthesized and will be skipped.
    ChunkFailed {
        utterance: UtteranceId,
        index: usize,
        error: String,
    },

    /// A chunk started playing on a channel.
    ChunkPlaying { utterance: UtteranceId, index: usize },

    /// Every channel was busy; the chunk was dropped.
    ChunkDropped { utterance: UtteranceId, index: usize },

    /// The output device refused a chunk.
    PlaybackFailed {
        utterance: UtteranceId,
        index: usize,
        error: String,
    },

    /// The first chunk failed, so nothing will play.
    Aborted { utterance: UtteranceId, error: String },

    /// The utterance reached a terminal state and its files are gone.
    Finished {
        utterance: UtteranceId,
        state: UtteranceState,
        summary: UtteranceSummary,
    },
}

impl SpeechEvent {
    /// The utterance this event belongs to.
    #[must_use]
    pub const fn utterance(&self) -> &UtteranceId {
        match self {
            Self::Started { utterance, .. }
            | Self::ChunkSynthesized { utterance, .. }
            | Self::ChunkFailed { utterance, .. }
            | Self::ChunkPlaying { utterance, .. }
            | Self::ChunkDropped { utterance, .. }
            | Self::PlaybackFailed { utterance, .. }
            | Self::Aborted { utterance, .. }
            | Self::Finished { utterance, .. } => utterance,
        }
    }
}

/// Best-effort sender for [`SpeechEvent`]s.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<SpeechEvent>>,
}

impl EventSink {
    pub const fn new(tx: mpsc::UnboundedSender<SpeechEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// A sink that discards everything.
    #[must_use]
    pub const fn disabled() -> Self {
        Self { tx: None }
    }

    /// Send an event. A dropped receiver is logged and otherwise ignored.
    pub fn emit(&self, event: SpeechEvent) {
        if let Some(tx) = &self.tx
            && tx.send(event).is_err()
        {
            tracing::debug!("Speech event receiver dropped");
        }
    }
}
