//! CLI bootstrap - the composition root.
//!
//! This module is the ONLY place where infrastructure is wired together
//! for the CLI adapter. All concrete implementations are instantiated here:
//! - HTTP synthesis backend (via chorus-voice)
//! - Audio output on the default device (via rodio)
//! - The speech engine itself
//!
//! Command handlers receive the composed [`CliContext`].

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chorus_voice::{EngineConfig, HttpBackend, RodioOutput, SpeechEngine, SpeechEvent, VoiceError};
use tokio::sync::mpsc;

use crate::error::CliError;
use crate::parser::Cli;

/// Bootstrap configuration for the CLI.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Engine settings after environment and flag overrides.
    pub engine: EngineConfig,
    /// Directory holding the character reference samples.
    pub voices_dir: PathBuf,
}

impl CliConfig {
    /// Environment defaults with command-line flags layered on top.
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let mut engine = EngineConfig::from_env();

        if let Some(url) = &cli.backend_url {
            engine.backend.url.clone_from(url);
        }
        if let Some(workers) = cli.max_workers {
            engine.backend.max_workers = workers;
        }
        if let Some(channels) = cli.max_channels {
            engine.device.max_channels = channels;
        }

        engine.validate()?;

        Ok(Self {
            engine,
            voices_dir: cli.voices_dir.clone(),
        })
    }
}

/// Fully composed application context for CLI commands.
pub struct CliContext {
    /// The speech engine.
    pub engine: SpeechEngine,
    /// Directory holding the character reference samples.
    pub voices_dir: PathBuf,
}

/// Bootstrap the CLI: open the audio device, build the backend and engine.
///
/// Returns the context and the engine's event stream.
pub fn bootstrap(config: CliConfig) -> Result<(CliContext, mpsc::UnboundedReceiver<SpeechEvent>)> {
    let backend = HttpBackend::new(&config.engine.backend).map_err(VoiceError::from).map_err(CliError::from)?;
    let output = RodioOutput::open(&config.engine.device).map_err(CliError::from)?;

    tracing::debug!(
        backend = backend.url(),
        voices_dir = %config.voices_dir.display(),
        "CLI bootstrap complete"
    );

    let (engine, events) = SpeechEngine::new(config.engine, Arc::new(backend), Arc::new(output));

    Ok((
        CliContext {
            engine,
            voices_dir: config.voices_dir,
        },
        events,
    ))
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn flags_override_engine_defaults() {
        let cli = Cli::parse_from([
            "chorus",
            "--backend-url",
            "http://tts.local:9000/tts_url",
            "--max-workers",
            "5",
            "--max-channels",
            "8",
            "voices",
        ]);

        let config = tokio_test::assert_ok!(CliConfig::from_cli(&cli));

        assert_eq!(config.engine.backend.url, "http://tts.local:9000/tts_url");
        assert_eq!(config.engine.backend.max_workers, 5);
        assert_eq!(config.engine.device.max_channels, 8);
    }

    #[test]
    fn invalid_flags_are_config_errors() {
        let cli = Cli::parse_from(["chorus", "--max-workers", "0", "voices"]);
        let err = CliConfig::from_cli(&cli).unwrap_err();
        assert_eq!(err.exit_code(), 78);

        let cli = Cli::parse_from(["chorus", "--backend-url", "ftp://nope", "voices"]);
        assert!(matches!(CliConfig::from_cli(&cli), Err(CliError::Config(_))));
    }
}
