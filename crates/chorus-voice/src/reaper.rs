//! Resource reaper - deletes an utterance's chunk files once it is over.

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::utterance::{Utterance, UtteranceState};

/// Wait for `utterance` to reach a terminal state, join its coordinator,
/// then delete every file it wrote.
///
/// `grace` is slept before deleting unless the utterance failed, since a
/// failed utterance never handed anything to the output device. Delete
/// errors are logged and swallowed.
pub async fn reap<T>(utterance: Arc<Utterance>, coordinator: JoinHandle<T>, grace: Duration) -> usize {
    let mut state = utterance.subscribe();
    let terminal = match state.wait_for(|s| s.is_terminal()).await {
        Ok(s) => *s,
        // Sender lives in the utterance we hold, so this cannot close.
        Err(_) => utterance.state(),
    };

    if let Err(e) = coordinator.await {
        tracing::warn!(utterance = %utterance.id(), error = %e, "Coordinator task did not finish cleanly");
    }

    if terminal != UtteranceState::Failed && !grace.is_zero() {
        tokio::time::sleep(grace).await;
    }

    let files = utterance.take_files();
    let mut removed = 0;
    for path in &files {
        if remove(path).await {
            removed += 1;
        }
    }

    tracing::debug!(utterance = %utterance.id(), removed, total = files.len(), "Reaped chunk files");
    removed
}

async fn remove(path: &Path) -> bool {
    match tokio::fs::remove_file(path).await {
        Ok(()) => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Failed to delete chunk file");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::VoiceReference;
    use crate::utterance::UtteranceId;

    fn utterance() -> Arc<Utterance> {
        Arc::new(Utterance::new(
            UtteranceId::from("test_00000000"),
            String::new(),
            VoiceReference::new("test", "/voices/test.wav"),
            vec!["only.".into()],
        ))
    }

    #[tokio::test]
    async fn deletes_files_after_terminal_state() {
        let dir = tempfile::tempdir().unwrap();
        let u = utterance();
        for name in ["a.wav", "b.wav"] {
            let path = dir.path().join(name);
            std::fs::write(&path, b"RIFF").unwrap();
            u.record_file(path);
        }
        // Already gone; must not count or fail.
        u.record_file(dir.path().join("missing.wav"));

        let coordinator = tokio::spawn(async {});
        let reaper = tokio::spawn(reap(Arc::clone(&u), coordinator, Duration::from_millis(5)));

        tokio::task::yield_now().await;
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);

        u.transition(UtteranceState::Completed);
        let removed = reaper.await.unwrap();

        assert_eq!(removed, 2);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn waits_for_coordinator_before_deleting() {
        let dir = tempfile::tempdir().unwrap();
        let u = utterance();
        u.transition(UtteranceState::Failed);

        let late = dir.path().join("late.wav");
        let writer = {
            let u = Arc::clone(&u);
            let late = late.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                std::fs::write(&late, b"RIFF").unwrap();
                u.record_file(late);
            })
        };

        let removed = reap(Arc::clone(&u), writer, Duration::from_secs(60)).await;

        assert_eq!(removed, 1);
        assert!(!late.exists());
    }
}
