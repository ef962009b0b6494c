//! Lifecycle commands delivered to the driver from other threads.

use crossbeam_channel::Sender;
use log::{debug, warn};
use std::io::{self, BufRead};
use std::str::FromStr;
use std::thread::{self, JoinHandle};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Start,
    Stop,
    Restart,
    Quit,
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Unknown control command '{0}' (expected start, stop, restart or quit)")]
pub struct UnknownCommand(String);

impl FromStr for ControlCommand {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(ControlCommand::Start),
            "stop" => Ok(ControlCommand::Stop),
            "restart" => Ok(ControlCommand::Restart),
            "quit" | "exit" => Ok(ControlCommand::Quit),
            other => Err(UnknownCommand(other.to_string())),
        }
    }
}

/// Forwards one command per input line until the input ends or the driver
/// hangs up. Blank lines are ignored, unknown ones logged.
pub fn read_commands<R: BufRead>(input: R, commands: &Sender<ControlCommand>) {
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to read control input: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<ControlCommand>() {
            Ok(command) => {
                if commands.send(command).is_err() {
                    break;
                }
            }
            Err(e) => warn!("{}", e),
        }
    }
    debug!("Control input closed");
}

pub fn spawn_stdin_reader(commands: Sender<ControlCommand>) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("stdin-control".to_string())
        .spawn(move || read_commands(io::stdin().lock(), &commands))
}
