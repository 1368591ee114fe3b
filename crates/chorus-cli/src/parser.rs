//! Main CLI parser and top-level argument handling.
//!
//! This module defines the root CLI structure with global options.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Commands;

/// Command-line interface for the chorus speech engine.
///
/// Global options override the `CHORUS_*` environment; subcommands pick
/// what to do.
#[derive(Parser)]
#[command(name = "chorus")]
#[command(about = "Speak text in several character voices at once")]
#[command(version)]
pub struct Cli {
    /// Synthesis endpoint (overrides CHORUS_BACKEND_URL)
    #[arg(long = "backend-url", global = true)]
    pub backend_url: Option<String>,

    /// Directory holding the character reference samples
    #[arg(long = "voices-dir", env = "CHORUS_VOICES_DIR", default_value = "./wavs", global = true)]
    pub voices_dir: PathBuf,

    /// Concurrent synthesis requests per utterance (overrides CHORUS_MAX_WORKERS)
    #[arg(long = "max-workers", global = true)]
    pub max_workers: Option<usize>,

    /// Simultaneously playing chunks across all voices (overrides CHORUS_MAX_CHANNELS)
    #[arg(long = "max-channels", global = true)]
    pub max_channels: Option<usize>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}
