//! Channel-capped mixer over an [`AudioOutput`].
//!
//! These traits decouple the engine from any specific audio library:
//!
//! | Implementor | Where used |
//! |---|---|
//! | [`RodioOutput`](crate::playback::RodioOutput) | Desktop / CLI - rodio on the default output device |
//! | test doubles | Integration tests - timed fake channels |
//!
//! The [`Mixer`] owns the device-wide channel pool. It is the only state
//! shared between utterances: each utterance asks it for a channel per
//! chunk, and a request that finds the pool full is refused immediately
//! rather than queued.

use std::sync::{Arc, Mutex, PoisonError};

use crate::error::VoiceError;
use crate::utterance::AudioBuffer;

// ── PlaybackChannel ────────────────────────────────────────────────

/// One concurrently-playable output stream.
///
/// All methods take `&self`; implementations use interior mutability.
pub trait PlaybackChannel: Send + Sync {
    /// Whether audio is still playing on this channel.
    fn is_busy(&self) -> bool;

    /// Stop playback immediately. Afterwards `is_busy` returns `false`.
    fn stop(&self);
}

// ── AudioOutput ────────────────────────────────────────────────────

/// Abstraction over an audio output device.
///
/// `play` starts a one-shot playback and returns its channel. Capacity is
/// not the output's concern; the [`Mixer`] enforces it.
pub trait AudioOutput: Send + Sync {
    fn play(&self, buffer: &AudioBuffer) -> Result<Arc<dyn PlaybackChannel>, VoiceError>;
}

// ── Mixer ──────────────────────────────────────────────────────────

struct Pool {
    max_channels: usize,
    live: Vec<Arc<dyn PlaybackChannel>>,
    /// Slots claimed by callers that are still starting playback.
    reserved: usize,
}

impl Pool {
    fn prune(&mut self) {
        self.live.retain(|channel| channel.is_busy());
    }

    fn is_full(&self) -> bool {
        self.live.len() + self.reserved >= self.max_channels
    }
}

/// Device-wide channel pool.
pub struct Mixer {
    output: Arc<dyn AudioOutput>,
    pool: Mutex<Pool>,
}

impl Mixer {
    pub fn new(output: Arc<dyn AudioOutput>, max_channels: usize) -> Self {
        Self {
            output,
            pool: Mutex::new(Pool {
                max_channels: max_channels.max(1),
                live: Vec::new(),
                reserved: 0,
            }),
        }
    }

    /// Change the channel cap. Channels already playing are not affected.
    pub fn set_max_channels(&self, n: usize) {
        self.lock().max_channels = n.max(1);
    }

    #[must_use]
    pub fn max_channels(&self) -> usize {
        self.lock().max_channels
    }

    /// Number of channels currently playing.
    #[must_use]
    pub fn busy_channels(&self) -> usize {
        let mut pool = self.lock();
        pool.prune();
        pool.live.len()
    }

    /// Start `buffer` on a free channel.
    ///
    /// Returns `Ok(None)` when every channel is busy. Never blocks waiting
    /// for one to free up.
    ///
    /// The slot is reserved under the pool lock; opening and decoding the
    /// file happen outside it.
    pub fn play_one_shot(
        &self,
        buffer: &AudioBuffer,
    ) -> Result<Option<Arc<dyn PlaybackChannel>>, VoiceError> {
        {
            let mut pool = self.lock();
            pool.prune();
            if pool.is_full() {
                tracing::debug!(
                    busy = pool.live.len(),
                    starting = pool.reserved,
                    max = pool.max_channels,
                    "Channel pool exhausted"
                );
                return Ok(None);
            }
            pool.reserved += 1;
        }

        let started = self.output.play(buffer);

        let mut pool = self.lock();
        pool.reserved -= 1;
        let channel = started?;
        pool.live.push(Arc::clone(&channel));
        Ok(Some(channel))
    }

    /// Silence every playing channel, whoever started it.
    pub fn stop_all(&self) {
        let mut pool = self.lock();
        let count = pool.live.len();
        for channel in pool.live.drain(..) {
            channel.stop();
        }
        tracing::info!(channels = count, "Stopped all playback");
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Pool> {
        self.pool.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
