//! Multi-game events between engines.
//!
//! A [`TournamentRunner`] pairs the entered engines round by round and
//! plays every game on its own [`Arena`], one game at a time, so each game
//! starts from fresh engine processes.

mod pairing;

pub use pairing::{
    knockout_bracket, round_robin, swiss_round, Pairing, Round, Standing, Tournament,
    TournamentFormat,
};

use crate::config::{ConfigError, GameConfig, PlayerConfig};
use crate::orchestrator::{Arena, ArenaController, ArenaError, ArenaEvent};
use crate::record::GameRecord;
use chess_rules::GameResult;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::{info, warn};

/// Errors from setting up or running a tournament.
#[derive(Error, Debug)]
pub enum TournamentError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("A tournament needs at least two players, got {0}")]
    TooFewPlayers(usize),
    #[error("Player {0:?} has no engine; tournaments are engine-only")]
    HumanEntrant(String),
    #[error("Player name {0:?} is used twice")]
    DuplicateName(String),
    #[error("Swiss tournaments need at least one round")]
    NoRounds,
    #[error(transparent)]
    Arena(#[from] ArenaError),
}

/// Settings for a tournament, usually loaded from TOML.
///
/// ```toml
/// [format]
/// kind = "swiss"
/// rounds = 5
///
/// [game]
/// movetime_ms = 200
///
/// [[players]]
/// name = "Alpha"
/// engine = "/usr/local/bin/alpha"
/// ```
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
pub struct TournamentConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub format: TournamentFormat,
    /// Settings shared by every game. Its `white` and `black` are ignored.
    #[serde(default)]
    pub game: GameConfig,
    #[serde(default)]
    pub players: Vec<PlayerConfig>,
}

impl TournamentConfig {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Display name of each entrant, in entry order.
    ///
    /// Falls back to the engine's file stem, then to the entry number.
    pub fn entrant_names(&self) -> Vec<String> {
        self.players
            .iter()
            .enumerate()
            .map(|(i, player)| {
                player
                    .name
                    .clone()
                    .or_else(|| {
                        player
                            .engine
                            .as_deref()
                            .and_then(Path::file_stem)
                            .map(|stem| stem.to_string_lossy().into_owned())
                    })
                    .unwrap_or_else(|| format!("Player {}", i + 1))
            })
            .collect()
    }

    /// # Errors
    ///
    /// Rejects fewer than two players, players without an engine, repeated
    /// names, a Swiss event without rounds, and any invalid game setting.
    pub fn validate(&self) -> Result<(), TournamentError> {
        self.game.validate()?;
        if self.players.len() < 2 {
            return Err(TournamentError::TooFewPlayers(self.players.len()));
        }
        if self.format == (TournamentFormat::Swiss { rounds: 0 }) {
            return Err(TournamentError::NoRounds);
        }
        let names = self.entrant_names();
        let mut seen = HashSet::new();
        for (player, name) in self.players.iter().zip(&names) {
            if !player.is_engine() {
                return Err(TournamentError::HumanEntrant(name.clone()));
            }
            if !seen.insert(name) {
                return Err(TournamentError::DuplicateName(name.clone()));
            }
        }
        Ok(())
    }
}

/// Progress reported while a tournament runs.
#[derive(Debug, Clone)]
pub enum TournamentEvent {
    RoundStarted {
        round: u32,
        /// `(white, black)` names for each game.
        pairings: Vec<(String, String)>,
        byes: Vec<String>,
    },
    /// An event from the game currently being played.
    Game { round: u32, event: ArenaEvent },
    GameFinished {
        round: u32,
        white: String,
        black: String,
        result: GameResult,
    },
    Finished { standings: Vec<Standing> },
}

/// Outcome of a tournament run.
#[derive(Debug, Clone)]
pub struct TournamentReport {
    /// Score table, best first.
    pub standings: Vec<Standing>,
    /// Every game played, in order.
    pub games: Vec<GameRecord>,
    /// False if the run was stopped before the last round.
    pub completed: bool,
}

impl TournamentReport {
    pub fn winner(&self) -> Option<&Standing> {
        self.completed.then(|| self.standings.first()).flatten()
    }
}

/// Cloneable handle that stops a running tournament.
///
/// Stopping aborts the game in progress and plays no further games.
#[derive(Clone, Default)]
pub struct Stopper {
    stopped: Arc<AtomicBool>,
    current: Arc<Mutex<Option<ArenaController>>>,
}

impl Stopper {
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        if let Some(game) = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            game.abort();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn set_current(&self, game: Option<ArenaController>) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = game;
    }
}

/// Plays a tournament game by game.
pub struct TournamentRunner {
    config: TournamentConfig,
    names: Vec<String>,
    stopper: Stopper,
}

impl TournamentRunner {
    /// # Errors
    ///
    /// See [`TournamentConfig::validate`].
    pub fn new(config: TournamentConfig) -> Result<Self, TournamentError> {
        config.validate()?;
        let names = config.entrant_names();
        Ok(Self {
            config,
            names,
            stopper: Stopper::default(),
        })
    }

    pub fn stopper(&self) -> Stopper {
        self.stopper.clone()
    }

    /// Game settings for one pairing.
    fn game_config(&self, pairing: &Pairing) -> GameConfig {
        let seat = |index: usize| PlayerConfig {
            name: Some(self.names[index].clone()),
            ..self.config.players[index].clone()
        };
        GameConfig {
            white: seat(pairing.white),
            black: seat(pairing.black),
            ..self.config.game.clone()
        }
    }

    /// Runs every round, reporting progress to `on_event`.
    ///
    /// Games that end `Aborted` score nothing. A stopped run returns the
    /// table as it stood with `completed` false.
    ///
    /// # Errors
    ///
    /// Returns [`TournamentError::Arena`] if a game cannot be started.
    pub fn run(
        &self,
        mut on_event: impl FnMut(TournamentEvent),
    ) -> Result<TournamentReport, TournamentError> {
        let mut tournament = Tournament::new(self.config.format, self.names.clone());
        let mut games = Vec::new();
        info!(
            name = self.config.name.as_deref().unwrap_or("tournament"),
            format = ?self.config.format,
            players = self.names.len(),
            "tournament started"
        );

        'rounds: while !self.stopper.is_stopped() {
            let Some(round) = tournament.next_round() else {
                break;
            };
            info!(round = round.number, games = round.pairings.len(), "round started");
            on_event(TournamentEvent::RoundStarted {
                round: round.number,
                pairings: round
                    .pairings
                    .iter()
                    .map(|p| (self.names[p.white].clone(), self.names[p.black].clone()))
                    .collect(),
                byes: round.byes.iter().map(|&p| self.names[p].clone()).collect(),
            });

            for pairing in &round.pairings {
                if self.stopper.is_stopped() {
                    break 'rounds;
                }
                let record = self.play(pairing, &mut on_event)?;
                tournament.record(pairing, record.result);
                on_event(TournamentEvent::GameFinished {
                    round: pairing.round,
                    white: self.names[pairing.white].clone(),
                    black: self.names[pairing.black].clone(),
                    result: record.result,
                });
                games.push(record);
            }
        }

        let standings = tournament.standings();
        let completed = tournament.is_finished();
        if completed {
            info!(winner = ?standings.first().map(|s| &s.name), "tournament finished");
            on_event(TournamentEvent::Finished {
                standings: standings.clone(),
            });
        } else {
            warn!(round = tournament.round(), "tournament stopped");
        }
        Ok(TournamentReport {
            standings,
            games,
            completed,
        })
    }

    fn play(
        &self,
        pairing: &Pairing,
        on_event: &mut impl FnMut(TournamentEvent),
    ) -> Result<GameRecord, TournamentError> {
        let handle = Arena::new(self.game_config(pairing))?.start()?;
        self.stopper.set_current(Some(handle.controller()));
        if self.stopper.is_stopped() {
            handle.abort();
        }
        for event in handle.events().iter() {
            on_event(TournamentEvent::Game {
                round: pairing.round,
                event,
            });
        }
        let record = handle.join();
        self.stopper.set_current(None);
        Ok(record?)
    }
}
