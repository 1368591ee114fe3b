//! Terminal rendering of engine events.

use chorus_voice::{SpeechEvent, UtteranceState};

/// One human-readable line for `event`, or `None` for events that are only
/// interesting in verbose logs.
#[must_use]
pub fn event_line(event: &SpeechEvent) -> Option<String> {
    match event {
        SpeechEvent::Started {
            utterance,
            voice,
            chunks,
        } => Some(format!("[{utterance}] {voice}: {chunks} chunk(s) scheduled")),
        SpeechEvent::ChunkFailed {
            utterance,
            index,
            error,
        } => Some(format!("[{utterance}] chunk {index} skipped: {error}")),
        SpeechEvent::ChunkDropped { utterance, index } => Some(format!(
            "[{utterance}] chunk {index} dropped: no free playback channel"
        )),
        SpeechEvent::PlaybackFailed {
            utterance,
            index,
            error,
        } => Some(format!("[{utterance}] chunk {index} could not be played: {error}")),
        SpeechEvent::Aborted { utterance, error } => {
            Some(format!("[{utterance}] aborted: {error}"))
        }
        SpeechEvent::Finished {
            utterance,
            state,
            summary,
        } => Some(format!(
            "[{utterance}] {}: {} played, {} failed, {} dropped",
            state_label(*state),
            summary.played,
            summary.failed,
            summary.dropped
        )),
        SpeechEvent::ChunkSynthesized { .. } | SpeechEvent::ChunkPlaying { .. } => None,
    }
}

#[must_use]
pub const fn state_label(state: UtteranceState) -> &'static str {
    match state {
        UtteranceState::Created => "created",
        UtteranceState::Synthesizing => "synthesizing",
        UtteranceState::Playing => "playing",
        UtteranceState::Completed => "completed",
        UtteranceState::Cancelled => "cancelled",
        UtteranceState::Failed => "failed",
    }
}
