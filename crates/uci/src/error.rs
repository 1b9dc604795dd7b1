//! Error type for engine sessions.

use crate::SessionState;
use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while driving a UCI engine process.
///
/// Every variant is fatal to the session that raised it except
/// [`UciError::InvalidState`], which rejects a call without touching the
/// engine.
#[derive(Error, Debug)]
pub enum UciError {
    /// The engine executable could not be launched.
    #[error("Failed to spawn engine {path}: {source}")]
    Spawn {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// Reading from or writing to the engine failed.
    #[error("Engine I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The handshake did not reach `readyok` in time.
    #[error("Engine did not finish the handshake within {0:?}")]
    StartupTimeout(Duration),
    /// The engine closed its output, usually because the process exited.
    #[error("Engine process exited unexpectedly{}", describe_exit(.status))]
    Crashed { status: Option<ExitStatus> },
    /// No best move arrived within the move budget plus overhead.
    #[error("Engine produced no best move within {0:?}")]
    Timeout(Duration),
    /// The wait was cancelled through an [`Interrupter`](crate::Interrupter).
    #[error("Engine wait was interrupted")]
    Interrupted,
    /// The call is not valid in the session's current state.
    #[error("Cannot {action} while session is {state:?}")]
    InvalidState {
        action: &'static str,
        state: SessionState,
    },
}

fn describe_exit(status: &Option<ExitStatus>) -> String {
    match status {
        Some(status) => format!(" ({status})"),
        None => String::new(),
    }
}
