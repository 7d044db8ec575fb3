//! Console driver - turns input lines into map events
//!
//! Line grammar:
//! - `2020-3-15` - any line that is not a command is a date input
//! - `hover <kind> <name>`, `leave <kind> <name>`, `select <kind> <name>`
//! - `legend`
//! - `quit` / `exit`
//!
//! Names may contain spaces. Blank lines and `#` comments are ignored.
//!
//! Stdin is read on its own OS thread. A blocking read cannot be cancelled,
//! so it must not sit on the runtime's blocking pool, which is joined when
//! the runtime shuts down.

use crate::domain::types::{EntityKind, UnknownKind};
use crate::services::sync::MapEvent;
use std::io::BufRead;
use std::thread;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Event(MapEvent),
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsoleError {
    #[error("usage: {0} <region|facility> <name>")]
    MissingArgument(&'static str),
    #[error(transparent)]
    UnknownKind(#[from] UnknownKind),
}

/// Parse one input line; `Ok(None)` for lines with nothing to do
pub fn parse_line(line: &str) -> Result<Option<ConsoleCommand>, ConsoleError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "quit" | "exit" => ConsoleCommand::Quit,
        "legend" => ConsoleCommand::Event(MapEvent::Legend),
        "hover" => {
            let (kind, name) = target("hover", rest)?;
            ConsoleCommand::Event(MapEvent::Hover(kind, name))
        }
        "leave" => {
            let (kind, name) = target("leave", rest)?;
            ConsoleCommand::Event(MapEvent::Leave(kind, name))
        }
        "select" => {
            let (kind, name) = target("select", rest)?;
            ConsoleCommand::Event(MapEvent::Select(kind, name))
        }
        _ => ConsoleCommand::Event(MapEvent::DateInput(line.to_string())),
    };
    Ok(Some(command))
}

fn target(command: &'static str, rest: &str) -> Result<(EntityKind, String), ConsoleError> {
    let (kind, name) = rest.split_once(char::is_whitespace).ok_or(ConsoleError::MissingArgument(command))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(ConsoleError::MissingArgument(command));
    }
    Ok((kind.parse()?, name.to_string()))
}

/// Forward parsed lines to `tx` until end of input, `quit`, or the receiver closes
///
/// Blocks the calling thread. Returning drops `tx`, which tells the
/// controller no more input is coming.
pub fn forward_lines<R: BufRead>(reader: R, tx: mpsc::Sender<MapEvent>) {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "console_read_error");
                return;
            }
        };

        match parse_line(&line) {
            Ok(Some(ConsoleCommand::Event(event))) => {
                if tx.blocking_send(event).is_err() {
                    return;
                }
            }
            Ok(Some(ConsoleCommand::Quit)) => {
                info!("console_quit");
                return;
            }
            Ok(None) => {}
            Err(e) => warn!(line = %line, error = %e, "console_input_rejected"),
        }
    }
    debug!("console_eof");
}

/// Read stdin on a detached thread; it never holds up process exit
pub fn spawn_stdin_reader(tx: mpsc::Sender<MapEvent>) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("console-stdin".to_string())
        .spawn(move || forward_lines(std::io::stdin().lock(), tx))
}
