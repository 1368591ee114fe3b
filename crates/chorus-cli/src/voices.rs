//! Character voice lookup.
//!
//! A character's reference sample lives in the voices directory under one
//! of three names, tried in order:
//!
//! | Pattern | Example |
//! |---|---|
//! | `<name>.wav` | `nahida.wav` |
//! | `[<name>].wav` | `[nahida].wav` |
//! | `<name>音色.wav` | `nahida音色.wav` |

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chorus_voice::VoiceReference;

use crate::error::CliError;

const SUFFIX: &str = "音色";

fn candidates(dir: &Path, name: &str) -> [PathBuf; 3] {
    [
        dir.join(format!("{name}.wav")),
        dir.join(format!("[{name}].wav")),
        dir.join(format!("{name}{SUFFIX}.wav")),
    ]
}

/// Resolve `name` to its reference sample in `dir`.
pub fn resolve_voice_reference(dir: &Path, name: &str) -> Result<VoiceReference, CliError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CliError::Arguments("voice name is empty".into()));
    }

    candidates(dir, name)
        .into_iter()
        .find(|path| path.is_file())
        .map(|path| {
            tracing::debug!(voice = name, path = %path.display(), "Resolved voice reference");
            VoiceReference::new(name, path)
        })
        .ok_or_else(|| CliError::VoiceNotFound(format!("{name} (looked in {})", dir.display())))
}

/// Character names with a reference sample in `dir`, sorted.
pub fn list_voices(dir: &Path) -> Result<Vec<String>, CliError> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| CliError::Io(format!("cannot read voices directory {}: {e}", dir.display())))?;

    let mut names = BTreeSet::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_wav = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("wav"));
        if !is_wav {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            let name = character_name(stem);
            if !name.is_empty() {
                names.insert(name.to_string());
            }
        }
    }

    Ok(names.into_iter().collect())
}

/// Strip the bracket or suffix naming variants from a file stem.
fn character_name(stem: &str) -> &str {
    if let Some(inner) = stem.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        return inner;
    }
    stem.strip_suffix(SUFFIX).unwrap_or(stem)
}
