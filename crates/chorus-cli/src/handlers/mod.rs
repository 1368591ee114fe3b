//! Command handlers.
//!
//! Handlers follow the canonical pattern:
//! - Signature: `pub async fn execute(ctx: &CliContext, ...) -> Result<()>`
//! - Thin wrappers that resolve CLI input, call the engine and format
//!   output for the terminal.

pub mod repl;
pub mod speak;
pub mod voices;

use std::path::Path;

use chorus_voice::{SpeechEvent, VoiceReference};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::CliError;
use crate::presentation::event_line;
use crate::voices::{list_voices, resolve_voice_reference};

/// Print engine events to stdout until the engine is dropped.
pub fn spawn_event_printer(mut events: mpsc::UnboundedReceiver<SpeechEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if let Some(line) = event_line(&event) {
                println!("{line}");
            }
        }
    })
}

/// Resolve `requested`, or the first available voice when none is given.
pub fn pick_voice(voices_dir: &Path, requested: Option<&str>) -> Result<VoiceReference, CliError> {
    if let Some(name) = requested {
        return resolve_voice_reference(voices_dir, name);
    }

    let first = list_voices(voices_dir)?.into_iter().next().ok_or_else(|| {
        CliError::VoiceNotFound(format!("no voices in {}", voices_dir.display()))
    })?;
    resolve_voice_reference(voices_dir, &first)
}
