//! Line commands read from the operator console.

use std::io::BufRead;
use std::sync::Arc;
use std::thread::JoinHandle;

use thiserror::Error;

use crate::coord::node::ShutdownHandle;
use crate::core::RecordStore;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Overwrite the counter.
    Set(i64),
    Exit,
    Empty,
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Usage: set <number>")]
    SetUsage,
}

pub fn parse_command(line: &str) -> std::result::Result<Command, CommandError> {
    let mut words = line.split_whitespace();
    let Some(cmd) = words.next() else {
        return Ok(Command::Empty);
    };
    match cmd {
        "set" => words
            .next()
            .and_then(|value| value.parse::<i64>().ok())
            .map(Command::Set)
            .ok_or(CommandError::SetUsage),
        "exit" | "quit" => Ok(Command::Exit),
        other => Ok(Command::Unknown(other.to_string())),
    }
}

/// Applies commands from `input` until `exit`, end of input, or shutdown.
/// Either way of leaving the loop requests shutdown.
pub fn run_console<R: BufRead>(
    input: R,
    store: &RecordStore,
    shutdown: &ShutdownHandle,
    self_pid: i64,
) {
    for line in input.lines() {
        if shutdown.is_requested() {
            break;
        }
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                log::warn!("console read failed: {err}");
                break;
            }
        };
        match parse_command(&line) {
            Ok(Command::Set(value)) => {
                match store.with_record(|record| record.counter = value) {
                    Ok(()) => log::info!("pid={self_pid} set counter={value}"),
                    Err(err) => log::warn!("set skipped: {err}"),
                }
            }
            Ok(Command::Exit) => break,
            Ok(Command::Empty) => {}
            Ok(Command::Unknown(cmd)) => log::debug!("ignoring console command `{cmd}`"),
            Err(err) => println!("{err}"),
        }
    }
    shutdown.request();
}

pub fn spawn_console<R: BufRead + Send + 'static>(
    input: R,
    store: Arc<RecordStore>,
    shutdown: ShutdownHandle,
    self_pid: i64,
) -> Result<JoinHandle<()>> {
    let handle = std::thread::Builder::new()
        .name("cohort-console".to_string())
        .spawn(move || run_console(input, &store, &shutdown, self_pid))?;
    Ok(handle)
}
