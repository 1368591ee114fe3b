//! `chorus repl` - interactive multi-voice session.
//!
//! Each line is spoken immediately, so several characters can talk over
//! each other:
//!
//! ```text
//! nahida: 你好，旅行者。
//! paimon: 前面好像有宝箱！
//! /list
//! /stop nahida_0badcafe
//! /stopall
//! /quit
//! ```

use anyhow::Result;
use chorus_voice::{SpeechEvent, UtteranceId, VoiceReference};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;

use super::{pick_voice, spawn_event_printer};
use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::presentation::state_label;
use crate::voices::resolve_voice_reference;

/// Longest prefix accepted as a character name in `NAME: text`.
const MAX_NAME_CHARS: usize = 32;

/// One parsed input line.
#[derive(Debug, PartialEq, Eq)]
pub enum ReplCommand<'a> {
    Speak { voice: Option<&'a str>, text: &'a str },
    Stop(&'a str),
    StopAll,
    List,
    Help,
    Quit,
    Empty,
    Unknown(&'a str),
}

/// Parse one line of REPL input.
#[must_use]
pub fn parse_line(line: &str) -> ReplCommand<'_> {
    let line = line.trim();
    if line.is_empty() {
        return ReplCommand::Empty;
    }

    if let Some(command) = line.strip_prefix('/') {
        let (name, arg) = command
            .split_once(char::is_whitespace)
            .map_or((command, ""), |(n, a)| (n, a.trim()));
        return match (name, arg) {
            ("stop", id) if !id.is_empty() => ReplCommand::Stop(id),
            ("stopall", "") => ReplCommand::StopAll,
            ("list", "") => ReplCommand::List,
            ("help", "") => ReplCommand::Help,
            ("quit" | "exit", "") => ReplCommand::Quit,
            _ => ReplCommand::Unknown(line),
        };
    }

    if let Some((name, text)) = line.split_once([':', '：']) {
        let name = name.trim();
        let is_name = !name.is_empty()
            && name.chars().count() <= MAX_NAME_CHARS
            && !name.chars().any(char::is_whitespace);
        if is_name && !text.trim().is_empty() {
            return ReplCommand::Speak {
                voice: Some(name),
                text: text.trim(),
            };
        }
    }

    ReplCommand::Speak {
        voice: None,
        text: line,
    }
}

const HELP: &str = "\
  NAME: text      speak text as NAME
  text            speak text in the default voice
  /list           show live utterances
  /stop ID        stop one utterance
  /stopall        silence every channel
  /quit           stop everything and exit";

pub async fn execute(
    ctx: &CliContext,
    events: mpsc::UnboundedReceiver<SpeechEvent>,
    default_voice: Option<&str>,
) -> Result<()> {
    let default_voice = match pick_voice(&ctx.voices_dir, default_voice) {
        Ok(voice) => Some(voice),
        Err(e) => {
            println!("No default voice ({e}); prefix lines with NAME:");
            None
        }
    };

    let printer = spawn_event_printer(events);
    let mut lines = spawn_line_reader()?;
    println!("chorus repl - /help for commands");

    while let Some(line) = lines.recv().await {
        match parse_line(&line) {
            ReplCommand::Empty => {}
            ReplCommand::Quit => break,
            ReplCommand::Help => println!("{HELP}"),
            ReplCommand::Unknown(input) => println!("Unknown command: {input} (try /help)"),
            ReplCommand::List => list(ctx),
            ReplCommand::StopAll => ctx.engine.stop_all(),
            ReplCommand::Stop(id) => {
                if !ctx.engine.stop(&UtteranceId::from(id)) {
                    println!("No live utterance {id}");
                }
            }
            ReplCommand::Speak { voice, text } => {
                if let Err(e) = speak(ctx, default_voice.as_ref(), voice, text) {
                    println!("{e}");
                }
            }
        }
    }

    for (id, _) in ctx.engine.active() {
        ctx.engine.stop(&id);
    }
    ctx.engine.wait_idle().await;
    printer.abort();
    Ok(())
}

/// Read lines on a dedicated thread; the editor never leaves it.
///
/// The channel closes on Ctrl-C, Ctrl-D or a terminal error.
fn spawn_line_reader() -> Result<mpsc::UnboundedReceiver<String>> {
    let (tx, rx) = mpsc::unbounded_channel();

    std::thread::Builder::new()
        .name("chorus-repl".into())
        .spawn(move || {
            let mut editor = match DefaultEditor::new() {
                Ok(editor) => editor,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to open line editor");
                    return;
                }
            };
            loop {
                match editor.readline("chorus> ") {
                    Ok(line) => {
                        if !line.trim().is_empty() {
                            let _ = editor.add_history_entry(line.as_str());
                        }
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to read input");
                        break;
                    }
                }
            }
        })?;

    Ok(rx)
}

fn speak(
    ctx: &CliContext,
    default_voice: Option<&VoiceReference>,
    name: Option<&str>,
    text: &str,
) -> Result<(), CliError> {
    let voice = match name {
        Some(name) => resolve_voice_reference(&ctx.voices_dir, name)?,
        None => default_voice
            .cloned()
            .ok_or_else(|| CliError::Arguments("no default voice; use NAME: text".into()))?,
    };
    let receipt = ctx.engine.speak(text, voice)?;
    println!("{}", receipt.utterance_id);
    Ok(())
}

fn list(ctx: &CliContext) {
    let active = ctx.engine.active();
    if active.is_empty() {
        println!("Nothing is speaking");
        return;
    }
    for (id, state) in active {
        println!("  {id:<32} {}", state_label(state));
    }
}
