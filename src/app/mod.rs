//! Console front end: commands in, status messages out.

pub mod app_core;
pub mod commands;
pub mod handlers;
pub mod state;

pub use app_core::GestureApp;
pub use commands::{Command, ParseCommandError, HELP};
pub use state::{AppState, ModelStatus};
