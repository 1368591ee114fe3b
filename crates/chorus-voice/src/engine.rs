//! `SpeechEngine` - the public surface tying the pipeline stages together.
//!
//! Each accepted utterance gets one supervising task that owns it from
//! segmentation to file cleanup:
//!
//! ```text
//!   speak() ──▶ supervisor ─┬─▶ coordinator ──completions──▶ sequencer ──▶ mixer
//!                           └─▶ reaper (after terminal state)
//! ```
//!
//! The engine itself only keeps a registry of live utterances so that
//! `stop(id)` can reach them. Utterances never share anything but the
//! [`Mixer`]'s channel pool.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Notify, mpsc};

use crate::backend::{SynthesisBackend, VoiceReference};
use crate::config::EngineConfig;
use crate::error::VoiceError;
use crate::events::{EventSink, SpeechEvent};
use crate::mixer::{AudioOutput, Mixer};
use crate::pipeline::Coordinator;
use crate::reaper;
use crate::segment::segment;
use crate::sequencer::Sequencer;
use crate::synth::SynthesisClient;
use crate::utterance::{Utterance, UtteranceId, UtteranceState};

/// What `speak` hands back: enough to track or stop the utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeakReceipt {
    pub utterance_id: UtteranceId,
    pub scheduled_chunks: usize,
}

struct Shared {
    config: EngineConfig,
    client: SynthesisClient,
    mixer: Arc<Mixer>,
    events: EventSink,
    /// Live utterances. Std mutex; never held across an `.await`.
    registry: Mutex<HashMap<UtteranceId, Arc<Utterance>>>,
    /// Signalled whenever an utterance leaves the registry.
    removed: Notify,
}

impl Shared {
    fn registry(&self) -> std::sync::MutexGuard<'_, HashMap<UtteranceId, Arc<Utterance>>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Pipelined multi-voice speech engine.
///
/// Cheap to clone; clones share the same registry and mixer.
#[derive(Clone)]
pub struct SpeechEngine {
    shared: Arc<Shared>,
}

impl SpeechEngine {
    /// Create an engine over `backend` and `output`.
    ///
    /// Returns the engine and a receiver for [`SpeechEvent`]s. Dropping the
    /// receiver is fine; events are then discarded.
    pub fn new(
        config: EngineConfig,
        backend: Arc<dyn SynthesisBackend>,
        output: Arc<dyn AudioOutput>,
    ) -> (Self, mpsc::UnboundedReceiver<SpeechEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let mixer = Arc::new(Mixer::new(output, config.device.max_channels));
        let client = SynthesisClient::new(backend, config.temp_dir.clone());

        tracing::info!(
            max_workers = config.backend.max_workers,
            max_channels = config.device.max_channels,
            temp_dir = %config.temp_dir.display(),
            "Speech engine ready"
        );

        let shared = Arc::new(Shared {
            config,
            client,
            mixer,
            events: EventSink::new(event_tx),
            registry: Mutex::new(HashMap::new()),
            removed: Notify::new(),
        });
        (Self { shared }, event_rx)
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    #[must_use]
    pub fn mixer(&self) -> &Mixer {
        &self.shared.mixer
    }

    /// Start speaking `text` as `voice`. Returns as soon as the utterance is
    /// scheduled; audio follows asynchronously.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn speak(&self, text: &str, voice: VoiceReference) -> Result<SpeakReceipt, VoiceError> {
        let segments = segment(text, &self.shared.config.segmenter);
        if segments.is_empty() {
            return Err(VoiceError::EmptyText);
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| VoiceError::Config(format!("speak needs a tokio runtime: {e}")))?;

        let id = UtteranceId::generate(voice.name());
        let scheduled_chunks = segments.len();
        let utterance = Arc::new(Utterance::new(id.clone(), text.to_string(), voice, segments));

        self.shared
            .registry()
            .insert(id.clone(), Arc::clone(&utterance));

        tracing::info!(utterance = %id, voice = utterance.voice().name(), chunks = scheduled_chunks, "Utterance scheduled");
        self.shared.events.emit(SpeechEvent::Started {
            utterance: id.clone(),
            voice: utterance.voice().name().to_string(),
            chunks: scheduled_chunks,
        });

        runtime.spawn(supervise(Arc::clone(&self.shared), utterance));

        Ok(SpeakReceipt {
            utterance_id: id,
            scheduled_chunks,
        })
    }

    /// Cancel one utterance. Returns `false` if it is unknown or already
    /// finished. Other utterances keep playing.
    pub fn stop(&self, id: &UtteranceId) -> bool {
        let Some(utterance) = self.shared.registry().get(id).cloned() else {
            return false;
        };
        if utterance.state().is_terminal() {
            return false;
        }
        tracing::info!(utterance = %id, "Stopping utterance");
        utterance.cancel();
        true
    }

    /// Silence every playing channel. Synthesis carries on and later chunks
    /// still play when they arrive.
    pub fn stop_all(&self) {
        self.shared.mixer.stop_all();
    }

    /// Current state of a live utterance.
    #[must_use]
    pub fn state(&self, id: &UtteranceId) -> Option<UtteranceState> {
        self.shared.registry().get(id).map(|u| u.state())
    }

    /// Ids and states of every live utterance.
    #[must_use]
    pub fn active(&self) -> Vec<(UtteranceId, UtteranceState)> {
        let mut active: Vec<_> = self
            .shared
            .registry()
            .values()
            .map(|u| (u.id().clone(), u.state()))
            .collect();
        active.sort_by(|a, b| a.0.cmp(&b.0));
        active
    }

    /// Wait until `id` has finished and its files are gone. Returns its
    /// final state, or `None` if it was not live.
    pub async fn wait(&self, id: &UtteranceId) -> Option<UtteranceState> {
        let utterance = self.shared.registry().get(id).cloned()?;
        self.wait_until(|registry| !registry.contains_key(id)).await;
        Some(utterance.state())
    }

    /// Wait until no utterance is live.
    pub async fn wait_idle(&self) {
        self.wait_until(HashMap::is_empty).await;
    }

    async fn wait_until(&self, done: impl Fn(&HashMap<UtteranceId, Arc<Utterance>>) -> bool) {
        loop {
            let notified = self.shared.removed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if done(&self.shared.registry()) {
                return;
            }
            notified.await;
        }
    }
}

impl std::fmt::Debug for SpeechEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechEngine")
            .field("active", &self.shared.registry().len())
            .field("client", &self.shared.client)
            .finish_non_exhaustive()
    }
}

/// Drive one utterance through synthesis, playback and cleanup.
async fn supervise(shared: Arc<Shared>, utterance: Arc<Utterance>) {
    let (completion_tx, completion_rx) = mpsc::unbounded_channel();

    let coordinator = Coordinator::new(
        Arc::clone(&utterance),
        shared.client.clone(),
        shared.config.backend.max_workers,
        completion_tx,
        shared.events.clone(),
    );
    let coordinator = tokio::spawn(coordinator.run());

    let reaper = tokio::spawn(reaper::reap(
        Arc::clone(&utterance),
        coordinator,
        shared.config.playback.reap_grace(),
    ));

    let sequencer = Sequencer::new(
        Arc::clone(&utterance),
        Arc::clone(&shared.mixer),
        shared.config.playback,
        shared.events.clone(),
    );
    let summary = sequencer.run(completion_rx).await;

    if let Err(e) = reaper.await {
        tracing::warn!(utterance = %utterance.id(), error = %e, "Reaper task did not finish cleanly");
    }

    let state = utterance.state();
    shared.registry().remove(utterance.id());
    shared.events.emit(SpeechEvent::Finished {
        utterance: utterance.id().clone(),
        state,
        summary,
    });
    shared.removed.notify_waiters();
}
