//! UCI (Universal Chess Interface) client.
//!
//! This crate drives a UCI chess engine as a subprocess: it formats the
//! commands the client sends, parses the lines the engine writes back, and
//! manages the engine process from spawn to teardown.
//!
//! # Client commands
//!
//! - `uci` / `uciok` - Enter UCI mode, collect id and options
//! - `isready` / `readyok` - Synchronization
//! - `setoption name <name> value <value>` - Configure the engine
//! - `position [startpos | fen <fen>] [moves <move>...]` - Set position
//! - `go [movetime <ms>] [depth <d>] ...` - Start search
//! - `stop` - Stop search
//! - `quit` - Exit engine
//!
//! Lines the engine writes that are not recognised are parsed as
//! [`EngineMessage::Unknown`] and ignored by the session.
//!
//! The crate knows nothing about chess rules; moves are plain coordinate
//! text and must be validated by the caller.

mod command;
mod error;
mod info;
mod message;
mod session;

pub use command::{GoOptions, GuiCommand};
pub use error::UciError;
pub use info::{EngineInfo, Score, ScoreBound};
pub use message::{EngineMessage, EngineOption};
pub use session::{
    EngineIdentity, EngineSession, Interrupter, SearchOutcome, SessionConfig, SessionState,
    POLL_TICK,
};
