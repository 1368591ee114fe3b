//! `chorus voices` - list the characters that can be spoken as.

use anyhow::Result;

use crate::bootstrap::CliConfig;
use crate::voices::{list_voices, resolve_voice_reference};

/// Does not need the audio device, so it takes the config rather than a
/// full context.
pub fn execute(config: &CliConfig) -> Result<()> {
    let names = list_voices(&config.voices_dir)?;

    if names.is_empty() {
        println!("No voices found in {}", config.voices_dir.display());
        return Ok(());
    }

    println!("{} voice(s) in {}:", names.len(), config.voices_dir.display());
    for name in names {
        let voice = resolve_voice_reference(&config.voices_dir, &name)?;
        println!("  {:<20} {}", name, voice.path().display());
    }
    Ok(())
}
