//! Per-utterance state shared by the coordinator, sequencer and reaper.
//!
//! An [`Utterance`] is one "speak this text as this voice" request. It is
//! created by the engine, wrapped in an `Arc`, and handed by reference to
//! the three tasks that serve it. Nothing here is shared between
//! utterances.

use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::backend::VoiceReference;
use crate::error::SynthesisError;

// ── Identity ───────────────────────────────────────────────────────

/// Unique utterance id, formatted `<voice>_<8 hex chars>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UtteranceId(String);

impl UtteranceId {
    /// Mint a fresh id for `voice`.
    #[must_use]
    pub fn generate(voice: &str) -> Self {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let prefix: String = voice
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '_' })
            .collect();
        Self(format!("{prefix}_{}", &suffix[..8]))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UtteranceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UtteranceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

// ── Lifecycle ──────────────────────────────────────────────────────

/// Lifecycle of an utterance.
///
/// ```text
///   Created → Synthesizing → Playing → Completed
///                  │            │
///                  ├→ Failed    └→ Cancelled
///                  └→ Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UtteranceState {
    Created,
    Synthesizing,
    Playing,
    Completed,
    Cancelled,
    Failed,
}

impl UtteranceState {
    /// No further transitions happen from a terminal state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

// ── Chunks ─────────────────────────────────────────────────────────

/// Synthesized audio for one chunk, persisted to a temporary file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioBuffer {
    /// Backing file in the temporary store.
    pub path: PathBuf,

    /// Encoded size in bytes.
    pub len: usize,

    /// Wall-clock time the backend took.
    pub elapsed: Duration,
}

/// Synthesis outcome of one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkStatus {
    Pending,
    /// Audio is in the temporary store at `path`.
    Synthesized { path: PathBuf, elapsed: Duration },
    Failed(String),
}

/// One ordered text segment of an utterance.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Playback position (0-based, contiguous).
    pub index: usize,
    pub text: String,
    pub status: ChunkStatus,
}

/// A completion pushed from the coordinator to the sequencer.
///
/// Chunk completions arrive in whatever order workers finish.
#[derive(Debug)]
pub enum Completion {
    Chunk {
        index: usize,
        outcome: Result<AudioBuffer, SynthesisError>,
    },

    /// Every submitted chunk has reported (or the utterance was cancelled).
    Finished,
}

/// Final tally reported when an utterance ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UtteranceSummary {
    pub played: usize,
    pub failed: usize,
    pub dropped: usize,
}

// ── Shared record ──────────────────────────────────────────────────

/// State record for one utterance.
pub struct Utterance {
    id: UtteranceId,
    text: String,
    voice: VoiceReference,
    chunks: Mutex<Vec<Chunk>>,
    cancel: CancellationToken,
    state: watch::Sender<UtteranceState>,
    /// Backing files written so far; drained by the reaper.
    files: Mutex<Vec<PathBuf>>,
}

impl Utterance {
    pub fn new(id: UtteranceId, text: String, voice: VoiceReference, segments: Vec<String>) -> Self {
        let chunks = segments
            .into_iter()
            .enumerate()
            .map(|(index, text)| Chunk {
                index,
                text,
                status: ChunkStatus::Pending,
            })
            .collect();
        let (state, _) = watch::channel(UtteranceState::Created);

        Self {
            id,
            text,
            voice,
            chunks: Mutex::new(chunks),
            cancel: CancellationToken::new(),
            state,
            files: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub const fn id(&self) -> &UtteranceId {
        &self.id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub const fn voice(&self) -> &VoiceReference {
        &self.voice
    }

    #[must_use]
    pub fn chunk_count(&self) -> usize {
        lock(&self.chunks).len()
    }

    /// Text of chunk `index`, if it exists.
    #[must_use]
    pub fn chunk_text(&self, index: usize) -> Option<String> {
        lock(&self.chunks).get(index).map(|c| c.text.clone())
    }

    /// Snapshot of every chunk and its outcome.
    #[must_use]
    pub fn chunks(&self) -> Vec<Chunk> {
        lock(&self.chunks).clone()
    }

    pub fn set_chunk_status(&self, index: usize, status: ChunkStatus) {
        if let Some(chunk) = lock(&self.chunks).get_mut(index) {
            chunk.status = status;
        }
    }

    // ── Cancellation ───────────────────────────────────────────────

    #[must_use]
    pub const fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    // ── Lifecycle ──────────────────────────────────────────────────

    #[must_use]
    pub fn state(&self) -> UtteranceState {
        *self.state.borrow()
    }

    /// Subscribe to lifecycle changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<UtteranceState> {
        self.state.subscribe()
    }

    /// Move to `next` unless already terminal. Returns whether it changed.
    pub fn transition(&self, next: UtteranceState) -> bool {
        let changed = self.state.send_if_modified(|current| {
            if current.is_terminal() || *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        if changed {
            tracing::debug!(utterance = %self.id, state = ?next, "Utterance state transition");
        }
        changed
    }

    // ── Backing store ──────────────────────────────────────────────

    /// Remember a file the reaper must delete.
    pub fn record_file(&self, path: PathBuf) {
        lock(&self.files).push(path);
    }

    /// Take every recorded path, leaving the list empty.
    #[must_use]
    pub fn take_files(&self) -> Vec<PathBuf> {
        std::mem::take(&mut *lock(&self.files))
    }
}

impl fmt::Debug for Utterance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Utterance")
            .field("id", &self.id)
            .field("voice", &self.voice.name())
            .field("chunks", &self.chunk_count())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Lock a std mutex, recovering the data if a holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
