//! Pipeline coordinator - drives synthesis for one utterance.
//!
//! ```text
//!   chunk 0 ──(alone)──▶ ok? ──▶ chunks 1..n ──(≤ max_workers)──▶ completions ──▶ Finished
//!                          │
//!                          └── err ──▶ utterance aborted
//! ```
//!
//! Chunk 0 gates time-to-first-audio, so it is synthesized before anything
//! else and outside the worker limit. The remaining chunks fan out to a
//! semaphore-bounded set of tasks and report back in completion order; the
//! sequencer restores index order.

use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;

use crate::error::{SynthesisError, VoiceError};
use crate::events::{EventSink, SpeechEvent};
use crate::synth::SynthesisClient;
use crate::utterance::{ChunkStatus, Completion, Utterance, UtteranceState};

/// How the synthesis stage ended.
#[derive(Debug)]
pub enum SynthesisOutcome {
    /// Chunk 0 succeeded; later chunks were attempted (some may have failed).
    Completed,

    /// Chunk 0 failed; nothing else was attempted.
    Aborted(VoiceError),

    /// Cancelled before chunk 0 finished.
    Cancelled,
}

/// What happened to one chunk.
#[derive(Debug)]
enum ChunkOutcome {
    /// Audio written and recorded for the reaper.
    Stored,

    /// Backend or store failure; already reported.
    Failed(SynthesisError),

    /// Cancelled before the backend answered; nothing was written.
    Cancelled,
}

/// Coordinator for a single utterance.
pub struct Coordinator {
    utterance: Arc<Utterance>,
    client: SynthesisClient,
    max_workers: usize,
    completions: mpsc::UnboundedSender<Completion>,
    events: EventSink,
}

impl Coordinator {
    pub fn new(
        utterance: Arc<Utterance>,
        client: SynthesisClient,
        max_workers: usize,
        completions: mpsc::UnboundedSender<Completion>,
        events: EventSink,
    ) -> Self {
        Self {
            utterance,
            client,
            max_workers: max_workers.max(1),
            completions,
            events,
        }
    }

    /// Run synthesis to completion.
    ///
    /// Returns only after every worker task has been joined, so no task can
    /// still be writing a chunk file once this future resolves. The
    /// `Finished` sentinel is sent on every path except abort.
    pub async fn run(self) -> SynthesisOutcome {
        let utterance = Arc::clone(&self.utterance);
        let id = utterance.id().clone();
        let total = utterance.chunk_count();

        utterance.transition(UtteranceState::Synthesizing);
        tracing::info!(utterance = %id, chunks = total, voice = utterance.voice().name(), "Synthesizing utterance");

        // ── Chunk 0: alone, outside the limiter ─────────────────────
        match self.synthesize_chunk(0).await {
            ChunkOutcome::Cancelled => {
                self.finish();
                return SynthesisOutcome::Cancelled;
            }
            ChunkOutcome::Failed(cause) => {
                tracing::error!(utterance = %id, error = %cause, "First chunk failed, aborting utterance");
                utterance.transition(UtteranceState::Failed);
                self.events.emit(SpeechEvent::Aborted {
                    utterance: id.clone(),
                    error: cause.to_string(),
                });
                return SynthesisOutcome::Aborted(VoiceError::UtteranceAborted {
                    utterance: id.to_string(),
                    cause,
                });
            }
            ChunkOutcome::Stored if utterance.is_cancelled() => {
                self.finish();
                return SynthesisOutcome::Cancelled;
            }
            ChunkOutcome::Stored => {}
        }

        // ── Chunks 1..n: bounded fan-out ────────────────────────────
        if total > 1 {
            tracing::debug!(utterance = %id, remaining = total - 1, workers = self.max_workers, "Fanning out remaining chunks");
            self.fan_out(total).await;
        }

        self.finish();
        SynthesisOutcome::Completed
    }

    async fn fan_out(&self, total: usize) {
        let limiter = Arc::new(Semaphore::new(self.max_workers));
        let mut workers = JoinSet::new();

        for index in 1..total {
            let limiter = Arc::clone(&limiter);
            let worker = self.worker();
            workers.spawn(async move {
                let Ok(_permit) = limiter.acquire_owned().await else {
                    return;
                };
                if worker.utterance.is_cancelled() {
                    return;
                }
                // Outcome already recorded and sent to the sequencer.
                worker.synthesize_chunk(index).await;
            });
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::warn!(utterance = %self.utterance.id(), error = %e, "Synthesis worker panicked");
            }
        }
    }

    /// Synthesize one chunk, record its outcome and push the completion.
    ///
    /// A cancelled chunk reports nothing.
    async fn synthesize_chunk(&self, index: usize) -> ChunkOutcome {
        let utterance = &self.utterance;
        let Some(text) = utterance.chunk_text(index) else {
            return ChunkOutcome::Stored;
        };

        let result = match self
            .client
            .synthesize(utterance.id(), index, &text, utterance.voice(), utterance.cancel_token())
            .await
        {
            Ok(Some(buffer)) => Ok(buffer),
            Ok(None) => {
                tracing::debug!(utterance = %utterance.id(), index, "Chunk cancelled before synthesis finished");
                return ChunkOutcome::Cancelled;
            }
            Err(e) => Err(e),
        };

        match &result {
            Ok(buffer) => {
                utterance.record_file(buffer.path.clone());
                utterance.set_chunk_status(
                    index,
                    ChunkStatus::Synthesized {
                        path: buffer.path.clone(),
                        elapsed: buffer.elapsed,
                    },
                );
                self.events.emit(SpeechEvent::ChunkSynthesized {
                    utterance: utterance.id().clone(),
                    index,
                    elapsed: buffer.elapsed,
                });
            }
            Err(e) => {
                tracing::warn!(
                    utterance = %utterance.id(),
                    index,
                    chunk_text = %preview(&text),
                    error = %e,
                    "Failed to synthesize chunk"
                );
                utterance.set_chunk_status(index, ChunkStatus::Failed(e.to_string()));
                self.events.emit(SpeechEvent::ChunkFailed {
                    utterance: utterance.id().clone(),
                    index,
                    error: e.to_string(),
                });
            }
        }

        let error = result.as_ref().err().cloned();
        // Chunk 0's failure aborts instead of reaching the sequencer.
        if index > 0 || error.is_none() {
            self.send(Completion::Chunk {
                index,
                outcome: result,
            });
        }

        error.map_or(ChunkOutcome::Stored, ChunkOutcome::Failed)
    }

    /// A cheap copy of the coordinator for a worker task.
    fn worker(&self) -> Self {
        Self {
            utterance: Arc::clone(&self.utterance),
            client: self.client.clone(),
            max_workers: self.max_workers,
            completions: self.completions.clone(),
            events: self.events.clone(),
        }
    }

    fn finish(&self) {
        self.send(Completion::Finished);
    }

    fn send(&self, completion: Completion) {
        if self.completions.send(completion).is_err() {
            tracing::debug!(utterance = %self.utterance.id(), "Sequencer gone, dropping completion");
        }
    }
}

/// First few characters of a chunk, for log lines.
fn preview(text: &str) -> String {
    const PREVIEW_CHARS: usize = 20;
    if text.chars().count() > PREVIEW_CHARS {
        let head: String = text.chars().take(PREVIEW_CHARS).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use bytes::Bytes;

    use super::*;
    use crate::backend::{SynthesisBackend, VoiceReference};
    use crate::utterance::UtteranceId;

    /// Backend with a per-text delay; texts starting with `!` fail.
    struct ScriptedBackend {
        delays: HashMap<String, u64>,
    }

    #[async_trait::async_trait]
    impl SynthesisBackend for ScriptedBackend {
        async fn synthesize(&self, text: &str, _voice: &VoiceReference) -> Result<Bytes, SynthesisError> {
            let delay = self.delays.get(text).copied().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            if text.starts_with('!') {
                Err(SynthesisError::Status { status: 500 })
            } else {
                Ok(Bytes::from_static(b"RIFF"))
            }
        }
    }

    fn setup(
        segments: &[(&str, u64)],
        dir: &std::path::Path,
    ) -> (Coordinator, mpsc::UnboundedReceiver<Completion>, Arc<Utterance>) {
        let backend = ScriptedBackend {
            delays: segments.iter().map(|(t, d)| ((*t).to_string(), *d)).collect(),
        };
        let utterance = Arc::new(Utterance::new(
            UtteranceId::generate("test"),
            String::new(),
            VoiceReference::new("test", "/voices/test.wav"),
            segments.iter().map(|(t, _)| (*t).to_string()).collect(),
        ));
        let client = SynthesisClient::new(Arc::new(backend), dir);
        let (tx, rx) = mpsc::unbounded_channel();
        let coordinator = Coordinator::new(Arc::clone(&utterance), client, 3, tx, EventSink::disabled());
        (coordinator, rx, utterance)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Completion>) -> Vec<Completion> {
        let mut out = Vec::new();
        while let Ok(c) = rx.try_recv() {
            out.push(c);
        }
        out
    }

    #[tokio::test]
    async fn first_chunk_completes_before_others_start() {
        let dir = tempfile::tempdir().unwrap();
        let (coordinator, mut rx, _u) = setup(&[("a", 50), ("b", 200), ("c", 10)], dir.path());

        let outcome = coordinator.run().await;
        assert!(matches!(outcome, SynthesisOutcome::Completed));

        let order: Vec<Option<usize>> = drain(&mut rx)
            .into_iter()
            .map(|c| match c {
                Completion::Chunk { index, .. } => Some(index),
                Completion::Finished => None,
            })
            .collect();
        assert_eq!(order, vec![Some(0), Some(2), Some(1), None]);
    }

    #[tokio::test]
    async fn first_chunk_failure_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let (coordinator, mut rx, utterance) = setup(&[("!a", 0), ("b", 0)], dir.path());

        let outcome = coordinator.run().await;

        assert!(matches!(
            outcome,
            SynthesisOutcome::Aborted(VoiceError::UtteranceAborted { .. })
        ));
        assert!(drain(&mut rx).is_empty());
        assert_eq!(utterance.state(), UtteranceState::Failed);
        assert_eq!(utterance.chunks()[1].status, ChunkStatus::Pending);
    }

    #[tokio::test]
    async fn later_failure_is_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let (coordinator, mut rx, utterance) = setup(&[("a", 0), ("!b", 0), ("c", 0)], dir.path());

        assert!(matches!(coordinator.run().await, SynthesisOutcome::Completed));

        let completions = drain(&mut rx);
        assert_eq!(completions.len(), 4);
        assert!(completions.iter().any(|c| matches!(
            c,
            Completion::Chunk { index: 1, outcome: Err(_) }
        )));
        assert!(matches!(utterance.chunks()[1].status, ChunkStatus::Failed(_)));
        assert_eq!(utterance.take_files().len(), 2);
    }

    #[tokio::test]
    async fn cancel_before_first_chunk_reports_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (coordinator, mut rx, utterance) = setup(&[("a", 1_000), ("b", 0), ("c", 0)], dir.path());
        utterance.cancel();

        assert!(matches!(coordinator.run().await, SynthesisOutcome::Cancelled));
        let completions = drain(&mut rx);
        assert!(matches!(completions.as_slice(), [Completion::Finished]));
        assert!(utterance.take_files().is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    /// Backend that cancels the utterance while handing back its audio.
    struct CancelOnReply {
        cancel: tokio_util::sync::CancellationToken,
        calls: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl SynthesisBackend for CancelOnReply {
        async fn synthesize(&self, text: &str, _voice: &VoiceReference) -> Result<Bytes, SynthesisError> {
            self.calls.lock().unwrap().push(text.to_string());
            self.cancel.cancel();
            Ok(Bytes::from_static(b"RIFF"))
        }
    }

    #[tokio::test]
    async fn first_chunk_written_during_cancel_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let utterance = Arc::new(Utterance::new(
            UtteranceId::generate("test"),
            String::new(),
            VoiceReference::new("test", "/voices/test.wav"),
            vec!["a".into(), "b".into()],
        ));
        let backend = Arc::new(CancelOnReply {
            cancel: utterance.cancel_token().clone(),
            calls: std::sync::Mutex::new(Vec::new()),
        });
        let client = SynthesisClient::new(backend.clone(), dir.path());
        let (tx, _rx) = mpsc::unbounded_channel();
        let coordinator = Coordinator::new(Arc::clone(&utterance), client, 3, tx, EventSink::disabled());

        assert!(matches!(coordinator.run().await, SynthesisOutcome::Cancelled));

        // The file exists and the reaper knows about it; chunk 1 never ran.
        let files = utterance.take_files();
        assert_eq!(files, vec![dir.path().join(format!("{}_seg_0.wav", utterance.id().as_str()))]);
        assert!(files[0].exists());
        assert_eq!(*backend.calls.lock().unwrap(), ["a"]);
    }

    #[test]
    fn preview_truncates_long_text() {
        assert_eq!(preview("short"), "short");
        assert_eq!(preview(&"字".repeat(30)), format!("{}...", "字".repeat(20)));
    }
}
