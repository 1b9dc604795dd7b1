//! Chess Arena - plays humans and UCI engines against each other.
//!
//! This crate drives one game at a time between two seats, each either a
//! person or a UCI engine process, enforcing legal play and producing a
//! replayable game record. Tournaments chain such games between engines.
//!
//! # Modules
//!
//! - [`config`] - Game settings loaded from `arena.toml`
//! - [`player`] - The [`Mover`] seat abstraction with engine and human seats
//! - [`orchestrator`] - The game loop, its control handle and event stream
//! - [`record`] - The game record handed to storage and export
//! - [`tournament`] - Round robin, Swiss and knockout events over many games

pub mod config;
pub mod orchestrator;
pub mod player;
pub mod record;
pub mod tournament;

pub use config::{ConfigError, GameConfig, PlayerConfig};
pub use orchestrator::{Arena, ArenaController, ArenaError, ArenaEvent, ArenaHandle, ArenaState};
pub use player::{EngineMover, HumanMover, Mover, MoverError, Proposal, Turn};
pub use record::{GameRecord, PlayerInfo, PlayerKind, PlyRecord, ReplayError};
pub use tournament::{TournamentConfig, TournamentError, TournamentEvent, TournamentRunner};
