use std::str::FromStr;

use thiserror::Error;

/// One console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Scan,
    Devices,
    /// Index into the discovered list, or a peer id.
    Connect(String),
    Classify,
    Disconnect,
    Cancel,
    Status,
    LoadModel,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0} (try 'help')")]
pub struct ParseCommandError(pub String);

impl FromStr for Command {
    type Err = ParseCommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let verb = words
            .next()
            .ok_or_else(|| ParseCommandError("empty command".to_string()))?;
        let arg = words.next();

        let command = match (verb.to_ascii_lowercase().as_str(), arg) {
            ("scan", None) => Command::Scan,
            ("devices" | "ls", None) => Command::Devices,
            ("connect", Some(target)) => Command::Connect(target.to_string()),
            ("connect", None) => return Err(ParseCommandError("connect needs an index or id".to_string())),
            ("classify" | "stop", None) => Command::Classify,
            ("disconnect", None) => Command::Disconnect,
            ("cancel", None) => Command::Cancel,
            ("status", None) => Command::Status,
            ("load", None) => Command::LoadModel,
            ("help" | "?", None) => Command::Help,
            ("quit" | "exit", None) => Command::Quit,
            (other, _) => return Err(ParseCommandError(format!("unknown command '{}'", other))),
        };

        if words.next().is_some() {
            return Err(ParseCommandError(format!("too many arguments for '{}'", verb)));
        }
        Ok(command)
    }
}

pub const HELP: &str = "\
commands:
  scan               look for sensors
  devices            list discovered sensors
  connect <n|id>     connect to a discovered sensor and start a session
  classify           classify the current (or last finished) session
  disconnect         drop the link and keep the session for classify
  cancel             cancel a running scan, connect or model load
  load               (re)load the model
  status             show connection and model state
  quit";
