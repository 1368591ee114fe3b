//! `chorus speak` - speak one utterance and wait for it.

use anyhow::Result;
use chorus_voice::{SpeechEvent, UtteranceState};
use tokio::sync::mpsc;

use super::pick_voice;
use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::presentation::event_line;

/// Speak `text` and print progress until the utterance has finished.
///
/// Follows the event stream rather than polling the engine, so an
/// utterance that ends before we start waiting is still reported.
pub async fn execute(
    ctx: &CliContext,
    events: &mut mpsc::UnboundedReceiver<SpeechEvent>,
    voice: Option<&str>,
    text: &[String],
) -> Result<()> {
    let voice = pick_voice(&ctx.voices_dir, voice)?;
    let text = text.join(" ");

    let receipt = ctx.engine.speak(&text, voice).map_err(CliError::from)?;
    tracing::debug!(utterance = %receipt.utterance_id, chunks = receipt.scheduled_chunks, "Waiting for utterance");

    while let Some(event) = events.recv().await {
        if let Some(line) = event_line(&event) {
            println!("{line}");
        }
        if let SpeechEvent::Finished { utterance, state, .. } = event
            && utterance == receipt.utterance_id
        {
            if state == UtteranceState::Failed {
                return Err(CliError::Engine(format!(
                    "utterance {utterance} failed: first chunk could not be synthesized"
                ))
                .into());
            }
            return Ok(());
        }
    }
    Ok(())
}
