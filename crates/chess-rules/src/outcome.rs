//! Game termination: results, draw rules and position classification.

use crate::zobrist::PositionKey;
use crate::Board;
use chess_core::{Color, PieceKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a game after a ply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "winner", rename_all = "snake_case")]
pub enum GameResult {
    #[default]
    InProgress,
    /// The side to move is mated; carries the winner.
    Checkmate(Color),
    Stalemate,
    DrawByRepetition,
    DrawByFiftyMove,
    DrawByInsufficientMaterial,
    /// A player gave up; carries the winner.
    Resignation(Color),
    /// A player ran out of time; carries the winner.
    TimeForfeit(Color),
    /// The game was cancelled or a player faulted.
    Aborted,
}

impl GameResult {
    pub fn is_terminal(self) -> bool {
        self != GameResult::InProgress
    }

    pub fn winner(self) -> Option<Color> {
        match self {
            GameResult::Checkmate(c) | GameResult::Resignation(c) | GameResult::TimeForfeit(c) => {
                Some(c)
            }
            _ => None,
        }
    }

    pub fn is_draw(self) -> bool {
        matches!(
            self,
            GameResult::Stalemate
                | GameResult::DrawByRepetition
                | GameResult::DrawByFiftyMove
                | GameResult::DrawByInsufficientMaterial
        )
    }

    /// Result token used in PGN move text.
    pub fn pgn_token(self) -> &'static str {
        match self.winner() {
            Some(Color::White) => "1-0",
            Some(Color::Black) => "0-1",
            None if self.is_draw() => "1/2-1/2",
            None => "*",
        }
    }
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameResult::InProgress => write!(f, "in progress"),
            GameResult::Checkmate(c) => write!(f, "{c} wins by checkmate"),
            GameResult::Stalemate => write!(f, "draw by stalemate"),
            GameResult::DrawByRepetition => write!(f, "draw by threefold repetition"),
            GameResult::DrawByFiftyMove => write!(f, "draw by fifty-move rule"),
            GameResult::DrawByInsufficientMaterial => write!(f, "draw by insufficient material"),
            GameResult::Resignation(c) => write!(f, "{c} wins by resignation"),
            GameResult::TimeForfeit(c) => write!(f, "{c} wins on time"),
            GameResult::Aborted => write!(f, "aborted"),
        }
    }
}

/// A draw condition checked after every ply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawRule {
    /// 100 half-moves without a pawn move or capture.
    FiftyMove,
    /// The current position has occurred three times.
    Repetition,
    InsufficientMaterial,
}

impl DrawRule {
    fn result(self) -> GameResult {
        match self {
            DrawRule::FiftyMove => GameResult::DrawByFiftyMove,
            DrawRule::Repetition => GameResult::DrawByRepetition,
            DrawRule::InsufficientMaterial => GameResult::DrawByInsufficientMaterial,
        }
    }
}

/// Order in which draw rules are checked when several hold at once.
pub const DEFAULT_DRAW_ORDER: [DrawRule; 3] = [
    DrawRule::FiftyMove,
    DrawRule::Repetition,
    DrawRule::InsufficientMaterial,
];

/// Half-moves without progress after which the game is drawn.
pub const FIFTY_MOVE_PLIES: u32 = 100;

/// Occurrences of one position that draw the game.
pub const REPETITION_COUNT: usize = 3;

/// Classifies `board`.
///
/// `history` holds the keys of every position reached in the game, including
/// the current one. Draw rules are tested in `draw_order`; rules missing
/// from the order are not applied.
pub fn classify(board: &Board, history: &[PositionKey], draw_order: &[DrawRule]) -> GameResult {
    let us = board.side_to_move();
    if board.legal_moves().is_empty() {
        return if board.is_in_check(us) {
            GameResult::Checkmate(us.opposite())
        } else {
            GameResult::Stalemate
        };
    }

    draw_order
        .iter()
        .find(|rule| draw_holds(**rule, board, history))
        .map_or(GameResult::InProgress, |rule| rule.result())
}

fn draw_holds(rule: DrawRule, board: &Board, history: &[PositionKey]) -> bool {
    match rule {
        DrawRule::FiftyMove => board.halfmove_clock() >= FIFTY_MOVE_PLIES,
        DrawRule::Repetition => {
            let key = board.position_key();
            history.iter().filter(|k| **k == key).count() >= REPETITION_COUNT
        }
        DrawRule::InsufficientMaterial => is_insufficient_material(board),
    }
}

/// True for king vs king and king plus one minor piece vs king.
pub fn is_insufficient_material(board: &Board) -> bool {
    let heavy_or_pawn = [PieceKind::Pawn, PieceKind::Rook, PieceKind::Queen]
        .into_iter()
        .any(|kind| Color::ALL.into_iter().any(|c| !board.pieces_of(kind, c).is_empty()));
    if heavy_or_pawn {
        return false;
    }

    let minors: u32 = [PieceKind::Knight, PieceKind::Bishop]
        .into_iter()
        .flat_map(|kind| Color::ALL.map(|c| board.pieces_of(kind, c).count()))
        .sum();
    minors <= 1
}
