//! Synthesis client - one chunk in, one persisted audio buffer out.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::backend::{SynthesisBackend, VoiceReference};
use crate::error::SynthesisError;
use crate::utterance::{AudioBuffer, UtteranceId};

/// Wraps a [`SynthesisBackend`] and a temporary directory.
///
/// Stateless apart from its configuration, so it is shared by every worker
/// of every utterance.
#[derive(Clone)]
pub struct SynthesisClient {
    backend: Arc<dyn SynthesisBackend>,
    store_dir: PathBuf,
}

impl SynthesisClient {
    pub fn new(backend: Arc<dyn SynthesisBackend>, store_dir: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            store_dir: store_dir.into(),
        }
    }

    /// Directory synthesized chunks are written to.
    #[must_use]
    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    /// Backing file for chunk `index` of `utterance`.
    ///
    /// Namespaced by utterance id and index so concurrent utterances never
    /// collide.
    #[must_use]
    pub fn chunk_path(&self, utterance: &UtteranceId, index: usize) -> PathBuf {
        self.store_dir
            .join(format!("{}_seg_{index}.wav", utterance.as_str()))
    }

    /// Synthesize one chunk and persist the result.
    ///
    /// `cancel` only races the backend call; once audio has arrived the file
    /// is always written in full. Returns `Ok(None)` when cancelled first.
    ///
    /// Every failure, including a failed write, comes back as a
    /// [`SynthesisError`].
    pub async fn synthesize(
        &self,
        utterance: &UtteranceId,
        index: usize,
        text: &str,
        voice: &VoiceReference,
        cancel: &CancellationToken,
    ) -> Result<Option<AudioBuffer>, SynthesisError> {
        let started = Instant::now();
        let audio = tokio::select! {
            biased;
            result = self.backend.synthesize(text, voice) => result?,
            () = cancel.cancelled() => return Ok(None),
        };
        let elapsed = started.elapsed();

        let path = self.chunk_path(utterance, index);
        if let Err(e) = tokio::fs::write(&path, &audio).await {
            // A short write may have left a partial file behind.
            let _ = tokio::fs::remove_file(&path).await;
            return Err(SynthesisError::Store(format!("{}: {e}", path.display())));
        }

        tracing::debug!(
            utterance = %utterance,
            index,
            bytes = audio.len(),
            elapsed_ms = elapsed.as_millis(),
            "Chunk synthesized"
        );

        Ok(Some(AudioBuffer {
            path,
            len: audio.len(),
            elapsed,
        }))
    }
}

impl std::fmt::Debug for SynthesisClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesisClient")
            .field("store_dir", &self.store_dir)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    struct EchoBackend;

    #[async_trait::async_trait]
    impl SynthesisBackend for EchoBackend {
        async fn synthesize(&self, text: &str, _voice: &VoiceReference) -> Result<Bytes, SynthesisError> {
            Ok(Bytes::copy_from_slice(text.as_bytes()))
        }
    }

    struct DownBackend;

    #[async_trait::async_trait]
    impl SynthesisBackend for DownBackend {
        async fn synthesize(&self, _text: &str, _voice: &VoiceReference) -> Result<Bytes, SynthesisError> {
            Err(SynthesisError::Status { status: 500 })
        }
    }

    fn voice() -> VoiceReference {
        VoiceReference::new("test", "/voices/test.wav")
    }

    #[tokio::test]
    async fn writes_bytes_to_namespaced_file() {
        let dir = tempfile::tempdir().unwrap();
        let client = SynthesisClient::new(Arc::new(EchoBackend), dir.path());
        let id = UtteranceId::from("test_12345678");

        let buffer = client
            .synthesize(&id, 3, "hello", &voice(), &CancellationToken::new())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(buffer.path, dir.path().join("test_12345678_seg_3.wav"));
        assert_eq!(buffer.len, 5);
        assert_eq!(std::fs::read(&buffer.path).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn backend_failure_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let client = SynthesisClient::new(Arc::new(DownBackend), dir.path());
        let id = UtteranceId::from("test_12345678");

        let err = client
            .synthesize(&id, 0, "hello", &voice(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, SynthesisError::Status { status: 500 }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn unwritable_store_is_a_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let client = SynthesisClient::new(Arc::new(EchoBackend), &missing);
        let id = UtteranceId::from("test_12345678");

        let err = client
            .synthesize(&id, 0, "hello", &voice(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SynthesisError::Store(_)));
    }

    /// Backend that never answers.
    struct StalledBackend;

    #[async_trait::async_trait]
    impl SynthesisBackend for StalledBackend {
        async fn synthesize(&self, _text: &str, _voice: &VoiceReference) -> Result<Bytes, SynthesisError> {
            std::future::pending().await
        }
    }

    /// Backend that fires `cancel` just as its audio is ready.
    struct CancellingBackend {
        cancel: CancellationToken,
    }

    #[async_trait::async_trait]
    impl SynthesisBackend for CancellingBackend {
        async fn synthesize(&self, text: &str, _voice: &VoiceReference) -> Result<Bytes, SynthesisError> {
            self.cancel.cancel();
            Ok(Bytes::copy_from_slice(text.as_bytes()))
        }
    }

    #[tokio::test]
    async fn cancel_abandons_pending_backend_call() {
        let dir = tempfile::tempdir().unwrap();
        let client = SynthesisClient::new(Arc::new(StalledBackend), dir.path());
        let id = UtteranceId::from("test_12345678");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let buffer = client.synthesize(&id, 0, "hello", &voice(), &cancel).await.unwrap();

        assert!(buffer.is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn audio_that_arrived_is_written_despite_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        let backend = CancellingBackend { cancel: cancel.clone() };
        let client = SynthesisClient::new(Arc::new(backend), dir.path());
        let id = UtteranceId::from("test_12345678");

        let buffer = client
            .synthesize(&id, 0, "hello", &voice(), &cancel)
            .await
            .unwrap()
            .expect("audio arrived before the cancel was observed");

        assert!(cancel.is_cancelled());
        assert_eq!(std::fs::read(&buffer.path).unwrap(), b"hello");
    }
}
