//! Subcommands of the `chorus` binary.

use clap::Subcommand;

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Speak text in one voice and wait until it has been played
    Speak {
        /// Character to speak as (defaults to the first voice found)
        #[arg(long, env = "CHORUS_VOICE")]
        voice: Option<String>,

        /// Text to speak
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// List the character voices found in the voices directory
    Voices,

    /// Interactive session: several voices, speaking over each other
    Repl {
        /// Voice for lines without a `NAME:` prefix
        #[arg(long, env = "CHORUS_VOICE")]
        voice: Option<String>,
    },
}
