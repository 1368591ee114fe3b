//! CLI-specific error types and mappings.
//!
//! Maps engine errors to exit codes and user-facing messages.

use chorus_voice::VoiceError;
use thiserror::Error;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Engine error.
    #[error("{0}")]
    Engine(String),

    /// Argument error.
    #[error("Invalid arguments: {0}")]
    Arguments(String),

    /// No reference sample for the requested character.
    #[error("Voice not present: {0}")]
    VoiceNotFound(String),

    /// IO error (voices directory missing, permission denied, etc.).
    #[error("IO error: {0}")]
    Io(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Audio device error.
    #[error("Audio device error: {0}")]
    Device(String),
}

impl CliError {
    /// Map error to appropriate exit code.
    ///
    /// Exit codes follow Unix conventions:
    /// - 1: General error
    /// - 2: Misuse of shell command (invalid arguments)
    /// - 64-78: Specific error categories (see sysexits.h)
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Engine(_) => 1,
            CliError::Arguments(_) => 2,     // EX_USAGE
            CliError::VoiceNotFound(_) => 66, // EX_NOINPUT
            CliError::Io(_) => 74,            // EX_IOERR
            CliError::Device(_) => 69,        // EX_UNAVAILABLE
            CliError::Config(_) => 78,        // EX_CONFIG
        }
    }
}

impl From<VoiceError> for CliError {
    fn from(err: VoiceError) -> Self {
        match err {
            VoiceError::EmptyText => CliError::Arguments(err.to_string()),
            VoiceError::Config(msg) => CliError::Config(msg),
            VoiceError::OutputStreamError(msg) => CliError::Device(msg),
            VoiceError::Io(e) => CliError::Io(e.to_string()),
            other => CliError::Engine(other.to_string()),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_map_to_exit_codes() {
        assert_eq!(CliError::from(VoiceError::EmptyText).exit_code(), 2);
        assert_eq!(CliError::from(VoiceError::Config("x".into())).exit_code(), 78);
        assert_eq!(
            CliError::from(VoiceError::OutputStreamError("no device".into())).exit_code(),
            69
        );
        assert_eq!(CliError::from(VoiceError::ChannelUnavailable).exit_code(), 1);
    }

    #[test]
    fn missing_voice_names_the_character() {
        let err = CliError::VoiceNotFound("nahida".into());
        assert_eq!(err.to_string(), "Voice not present: nahida");
        assert_eq!(err.exit_code(), 66);
    }
}
