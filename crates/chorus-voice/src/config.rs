//! Engine configuration.
//!
//! Every tuning constant of the pipeline lives here. Defaults match the
//! multi-character deployment: 80/25 segmentation, three synthesis workers,
//! sixteen device channels.
//!
//! Values can be overridden from `CHORUS_*` environment variables via
//! [`EngineConfig::from_env`]; front-ends layer their own flags on top.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::VoiceError;
use crate::segment::SegmenterConfig;

/// Default synthesis endpoint.
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:11996/tts_url";

/// Backend connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Full URL that accepts `POST {text, audio_paths}`.
    pub url: String,

    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,

    /// Upper bound on concurrent synthesis calls per utterance (chunk 0 is
    /// always synthesized alone, outside this limit).
    pub max_workers: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_BACKEND_URL.to_string(),
            timeout_ms: 25_000,
            max_workers: 3,
        }
    }
}

impl BackendConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Output device parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub buffer_size: u32,

    /// Device-wide cap on simultaneously playing chunks.
    pub max_channels: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            sample_rate: 22_050,
            channels: 2,
            buffer_size: 512,
            max_channels: 16,
        }
    }
}

/// Sequencer and reaper timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// How long the sequencer waits for a completion before re-checking
    /// whether it is done.
    pub idle_timeout_ms: u64,

    /// Busy-state poll interval while a chunk is playing.
    pub poll_interval_ms: u64,

    /// Extra wait after playback ends before temporary files are deleted.
    pub reap_grace_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            idle_timeout_ms: 2_000,
            poll_interval_ms: 80,
            reap_grace_ms: 1_000,
        }
    }
}

impl PlaybackConfig {
    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub const fn reap_grace(&self) -> Duration {
        Duration::from_millis(self.reap_grace_ms)
    }
}

/// Full engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub segmenter: SegmenterConfig,
    pub backend: BackendConfig,
    pub device: DeviceConfig,
    pub playback: PlaybackConfig,

    /// Directory for synthesized chunk files. Defaults to the OS temp dir.
    pub temp_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            segmenter: SegmenterConfig::default(),
            backend: BackendConfig::default(),
            device: DeviceConfig::default(),
            playback: PlaybackConfig::default(),
            temp_dir: std::env::temp_dir(),
        }
    }
}

impl EngineConfig {
    /// Defaults with `CHORUS_*` environment overrides applied.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Apply overrides from a key lookup. Unparseable values are ignored
    /// with a warning.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("CHORUS_BACKEND_URL").filter(|u| !u.trim().is_empty()) {
            self.backend.url = url.trim().to_string();
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "CHORUS_TIMEOUT_SECS") {
            self.backend.timeout_ms = secs.saturating_mul(1_000);
        }
        if let Some(workers) = parse_var(&lookup, "CHORUS_MAX_WORKERS") {
            self.backend.max_workers = workers;
        }
        if let Some(channels) = parse_var(&lookup, "CHORUS_MAX_CHANNELS") {
            self.device.max_channels = channels;
        }
        if let Some(dir) = lookup("CHORUS_TEMP_DIR").filter(|d| !d.trim().is_empty()) {
            self.temp_dir = PathBuf::from(dir);
        }
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), VoiceError> {
        if self.backend.max_workers == 0 {
            return Err(VoiceError::Config("max_workers must be at least 1".into()));
        }
        if self.device.max_channels == 0 {
            return Err(VoiceError::Config("max_channels must be at least 1".into()));
        }
        if self.segmenter.max_chars == 0 {
            return Err(VoiceError::Config("max_chars must be at least 1".into()));
        }
        if self.segmenter.min_chars > self.segmenter.max_chars {
            return Err(VoiceError::Config(format!(
                "min_chars ({}) exceeds max_chars ({})",
                self.segmenter.min_chars, self.segmenter.max_chars
            )));
        }
        if !(self.backend.url.starts_with("http://") || self.backend.url.starts_with("https://")) {
            return Err(VoiceError::Config(format!(
                "backend url must be http(s): {}",
                self.backend.url
            )));
        }
        if self.backend.timeout_ms == 0 {
            return Err(VoiceError::Config("timeout must be non-zero".into()));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparseable environment override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.backend.max_workers, 3);
        assert_eq!(config.device.max_channels, 16);
        assert_eq!(config.backend.timeout(), Duration::from_secs(25));
    }

    #[test]
    fn overrides_replace_defaults() {
        let mut config = EngineConfig::default();
        config.apply_overrides(lookup_from(&[
            ("CHORUS_BACKEND_URL", "http://tts.local:9000/tts_url"),
            ("CHORUS_TIMEOUT_SECS", "5"),
            ("CHORUS_MAX_WORKERS", "6"),
            ("CHORUS_MAX_CHANNELS", "4"),
            ("CHORUS_TEMP_DIR", "/var/tmp/chorus"),
        ]));

        assert_eq!(config.backend.url, "http://tts.local:9000/tts_url");
        assert_eq!(config.backend.timeout_ms, 5_000);
        assert_eq!(config.backend.max_workers, 6);
        assert_eq!(config.device.max_channels, 4);
        assert_eq!(config.temp_dir, PathBuf::from("/var/tmp/chorus"));
    }

    #[test]
    fn unparseable_override_is_ignored() {
        let mut config = EngineConfig::default();
        config.apply_overrides(lookup_from(&[("CHORUS_MAX_WORKERS", "lots")]));
        assert_eq!(config.backend.max_workers, 3);
    }

    #[test]
    fn validate_rejects_zero_workers() {
        let mut config = EngineConfig::default();
        config.backend.max_workers = 0;
        assert!(matches!(config.validate(), Err(VoiceError::Config(_))));
    }

    #[test]
    fn validate_rejects_inverted_segment_bounds() {
        let mut config = EngineConfig::default();
        config.segmenter.min_chars = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_non_http_url() {
        let mut config = EngineConfig::default();
        config.backend.url = "ftp://example.com".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"backend": {"max_workers": 5}}"#).unwrap();
        assert_eq!(config.backend.max_workers, 5);
        assert_eq!(config.backend.url, DEFAULT_BACKEND_URL);
        assert_eq!(config.segmenter, SegmenterConfig::default());
    }
}
