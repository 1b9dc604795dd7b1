//! The game record handed to storage and export collaborators.
//!
//! A [`GameRecord`] is owned by the orchestrator while a game runs and is
//! returned as a finished snapshot once the game reaches a terminal state.
//! Every ply keeps the board it produced, so a record can be checked by
//! replaying its moves from the start position.

use chess_core::{Color, FenError, Move};
use chess_rules::{Board, GameResult, IllegalMoveError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use uci::EngineInfo;
use uuid::Uuid;

/// Whether a seat is played by a person or a UCI engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerKind {
    Human,
    Engine,
}

/// Identity of one player as recorded in the game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub name: String,
    pub kind: PlayerKind,
    /// Engine executable, for engine players.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<PathBuf>,
    /// Author reported by the engine during the handshake.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

impl PlayerInfo {
    pub fn human(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: PlayerKind::Human,
            engine: None,
            author: None,
        }
    }

    pub fn engine(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            kind: PlayerKind::Engine,
            engine: Some(path.into()),
            author: None,
        }
    }
}

/// One applied half-move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlyRecord {
    /// Ply number, starting at 1 for the first move of the game.
    pub ply: usize,
    pub color: Color,
    pub mv: Move,
    /// Position after the move, serialized as FEN.
    pub board: Board,
    /// Last search info the engine reported for this move.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<EngineInfo>,
    /// Engine score in centipawns from White's side, mates as +/-30000.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval_cp: Option<i32>,
    /// Time the mover spent producing the move.
    pub think_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl PlyRecord {
    /// Records a move played by `color` that produced `board`.
    pub fn new(
        ply: usize,
        color: Color,
        mv: Move,
        board: Board,
        info: Option<EngineInfo>,
        think: Duration,
    ) -> Self {
        let eval_cp = info
            .as_ref()
            .and_then(|info| info.score)
            .map(|score| match color {
                Color::White => score.centipawns(),
                Color::Black => -score.centipawns(),
            });
        Self {
            ply,
            color,
            mv,
            board,
            info,
            eval_cp,
            think_ms: think.as_millis() as u64,
            timestamp: Utc::now(),
        }
    }

    pub fn fen(&self) -> String {
        self.board.to_fen()
    }

    /// Material left on the board as `(white, black)`, in pawns.
    pub fn material(&self) -> (u32, u32) {
        (
            self.board.material(Color::White),
            self.board.material(Color::Black),
        )
    }
}

/// Errors found while replaying a record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplayError {
    #[error("Invalid start position: {0}")]
    InvalidStart(#[from] FenError),
    #[error("Ply {ply} is illegal: {source}")]
    Illegal {
        ply: usize,
        #[source]
        source: IllegalMoveError,
    },
    #[error("Ply {ply} reached {actual}, record has {expected}")]
    Mismatch {
        ply: usize,
        expected: String,
        actual: String,
    },
}

/// A complete (or partial, if aborted) game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    pub id: Uuid,
    pub white: PlayerInfo,
    pub black: PlayerInfo,
    pub start_fen: String,
    pub plies: Vec<PlyRecord>,
    pub result: GameResult,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Fault messages surfaced while the game ran.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub faults: Vec<String>,
}

impl GameRecord {
    /// Creates an empty record for a game about to start.
    pub fn new(white: PlayerInfo, black: PlayerInfo, start: &Board) -> Self {
        Self {
            id: Uuid::new_v4(),
            white,
            black,
            start_fen: start.to_fen(),
            plies: Vec::new(),
            result: GameResult::InProgress,
            started_at: Utc::now(),
            finished_at: None,
            faults: Vec::new(),
        }
    }

    pub fn player(&self, color: Color) -> &PlayerInfo {
        match color {
            Color::White => &self.white,
            Color::Black => &self.black,
        }
    }

    pub fn moves(&self) -> Vec<Move> {
        self.plies.iter().map(|p| p.mv).collect()
    }

    /// Move list in coordinate notation, e.g. `["e2e4", "e7e5"]`.
    pub fn coordinates(&self) -> Vec<String> {
        self.plies.iter().map(|p| p.mv.to_uci()).collect()
    }

    /// Position after the last recorded ply.
    ///
    /// # Errors
    ///
    /// Returns [`FenError`] if the stored start position does not parse.
    pub fn final_board(&self) -> Result<Board, FenError> {
        match self.plies.last() {
            Some(last) => Ok(last.board.clone()),
            None => Board::from_fen(&self.start_fen),
        }
    }

    /// Replays every move from the start position and checks each snapshot.
    ///
    /// Returns the final board when the record is consistent.
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError::Illegal`] if a recorded move is not legal where
    /// it was played, and [`ReplayError::Mismatch`] if the board it produces
    /// differs from the stored snapshot.
    pub fn replay(&self) -> Result<Board, ReplayError> {
        let mut board = Board::from_fen(&self.start_fen)?;
        for ply in &self.plies {
            board
                .play(ply.mv)
                .map_err(|source| ReplayError::Illegal {
                    ply: ply.ply,
                    source,
                })?;
            if board != ply.board {
                return Err(ReplayError::Mismatch {
                    ply: ply.ply,
                    expected: ply.board.to_fen(),
                    actual: board.to_fen(),
                });
            }
        }
        Ok(board)
    }

    /// Serializes the record as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
