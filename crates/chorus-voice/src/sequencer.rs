//! Playback sequencer - turns out-of-order completions into in-order audio.
//!
//! One sequencer runs per utterance. It holds a cursor on the next index to
//! play and a map of chunks that arrived early. A chunk plays only once
//! every lower index has either played, failed or been dropped, and the
//! next chunk starts only after the previous one's channel goes idle.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::PlaybackConfig;
use crate::error::VoiceError;
use crate::events::{EventSink, SpeechEvent};
use crate::mixer::{Mixer, PlaybackChannel};
use crate::utterance::{AudioBuffer, Completion, Utterance, UtteranceState, UtteranceSummary};

pub struct Sequencer {
    utterance: Arc<Utterance>,
    mixer: Arc<Mixer>,
    config: PlaybackConfig,
    events: EventSink,

    next: usize,
    held: BTreeMap<usize, AudioBuffer>,
    failed: BTreeSet<usize>,
    summary: UtteranceSummary,
}

impl Sequencer {
    pub fn new(
        utterance: Arc<Utterance>,
        mixer: Arc<Mixer>,
        config: PlaybackConfig,
        events: EventSink,
    ) -> Self {
        Self {
            utterance,
            mixer,
            config,
            events,
            next: 0,
            held: BTreeMap::new(),
            failed: BTreeSet::new(),
            summary: UtteranceSummary::default(),
        }
    }

    /// Consume completions until the utterance is fully played, cancelled,
    /// or goes quiet for longer than the idle timeout.
    pub async fn run(mut self, mut completions: mpsc::UnboundedReceiver<Completion>) -> UtteranceSummary {
        let total = self.utterance.chunk_count();
        let idle = self.config.idle_timeout();

        loop {
            if self.utterance.is_cancelled() {
                break;
            }

            let received = tokio::select! {
                () = self.utterance.cancel_token().cancelled() => break,
                received = tokio::time::timeout(idle, completions.recv()) => received,
            };

            match received {
                Ok(Some(Completion::Chunk { index, outcome })) => {
                    match outcome {
                        Ok(buffer) => {
                            self.held.insert(index, buffer);
                        }
                        Err(e) => {
                            tracing::debug!(utterance = %self.utterance.id(), index, error = %e, "Skipping failed chunk");
                            self.failed.insert(index);
                            self.summary.failed += 1;
                        }
                    }
                    self.play_ready().await;
                }
                Ok(Some(Completion::Finished) | None) => {
                    self.drain_held().await;
                    break;
                }
                Err(_elapsed) => {
                    if self.held.is_empty() && self.next >= total {
                        break;
                    }
                    tracing::trace!(
                        utterance = %self.utterance.id(),
                        next = self.next,
                        held = self.held.len(),
                        "Still waiting on synthesis"
                    );
                }
            }
        }

        if self.utterance.is_cancelled() {
            self.utterance.transition(UtteranceState::Cancelled);
        } else {
            self.utterance.transition(UtteranceState::Completed);
        }

        tracing::info!(
            utterance = %self.utterance.id(),
            played = self.summary.played,
            failed = self.summary.failed,
            dropped = self.summary.dropped,
            "Playback finished"
        );
        self.summary
    }

    /// Play every chunk that is next in line.
    async fn play_ready(&mut self) {
        loop {
            if self.utterance.is_cancelled() {
                return;
            }
            if self.failed.remove(&self.next) {
                self.next += 1;
                continue;
            }
            let Some(buffer) = self.held.remove(&self.next) else {
                return;
            };
            let index = self.next;
            self.next += 1;
            self.play_chunk(index, &buffer).await;
        }
    }

    /// Synthesis is over: play whatever is held, skipping any gaps.
    async fn drain_held(&mut self) {
        self.play_ready().await;
        while let Some((index, buffer)) = self.held.pop_first() {
            if self.utterance.is_cancelled() {
                return;
            }
            tracing::debug!(utterance = %self.utterance.id(), expected = self.next, index, "Gap in chunk sequence, skipping ahead");
            self.next = index + 1;
            self.play_chunk(index, &buffer).await;
        }
    }

    async fn play_chunk(&mut self, index: usize, buffer: &AudioBuffer) {
        let id = self.utterance.id().clone();

        match self.mixer.play_one_shot(buffer) {
            Ok(Some(channel)) => {
                self.utterance.transition(UtteranceState::Playing);
                self.summary.played += 1;
                tracing::debug!(utterance = %id, index, "Playing chunk");
                self.events.emit(SpeechEvent::ChunkPlaying {
                    utterance: id,
                    index,
                });
                self.wait_until_idle(channel.as_ref()).await;
            }
            Ok(None) => {
                tracing::warn!(utterance = %id, index, error = %VoiceError::ChannelUnavailable, "Dropping chunk");
                self.summary.dropped += 1;
                self.events.emit(SpeechEvent::ChunkDropped {
                    utterance: id,
                    index,
                });
            }
            Err(e) => {
                let err = VoiceError::Playback {
                    chunk_index: index,
                    cause: e.to_string(),
                };
                tracing::warn!(utterance = %id, error = %err, "Chunk playback failed");
                self.summary.failed += 1;
                self.events.emit(SpeechEvent::PlaybackFailed {
                    utterance: id,
                    index,
                    error: e.to_string(),
                });
            }
        }
    }

    /// Poll the channel until it goes idle. Cancellation stops this
    /// utterance's channel only.
    async fn wait_until_idle(&self, channel: &dyn PlaybackChannel) {
        let poll = self.config.poll_interval();
        while channel.is_busy() {
            tokio::select! {
                () = self.utterance.cancel_token().cancelled() => {
                    channel.stop();
                    return;
                }
                () = tokio::time::sleep(poll) => {}
            }
        }
    }
}
