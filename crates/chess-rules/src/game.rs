//! Game management with history tracking.
//!
//! [`Game`] owns the start board, the current board, the applied moves and
//! the key of every position reached, which is what repetition detection and
//! undo-by-replay need.

use crate::outcome::{classify, DrawRule, GameResult, DEFAULT_DRAW_ORDER};
use crate::zobrist::PositionKey;
use crate::{Board, IllegalMoveError};
use chess_core::{FenError, Move};

/// A game in progress.
#[derive(Debug, Clone)]
pub struct Game {
    start: Board,
    board: Board,
    /// Resolved moves, in order.
    moves: Vec<Move>,
    /// Keys of the start position and every position after it.
    keys: Vec<PositionKey>,
    draw_order: Vec<DrawRule>,
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

impl Game {
    /// Creates a game from the standard starting position.
    pub fn new() -> Self {
        Self::from_board(Board::startpos())
    }

    /// Creates a game starting from `board`.
    pub fn from_board(board: Board) -> Self {
        let keys = vec![board.position_key()];
        Self {
            start: board.clone(),
            board,
            moves: Vec::new(),
            keys,
            draw_order: DEFAULT_DRAW_ORDER.to_vec(),
        }
    }

    pub fn from_fen(fen: &str) -> Result<Self, FenError> {
        Ok(Self::from_board(Board::from_fen(fen)?))
    }

    /// Replaces the draw-rule precedence used by [`Game::classify`].
    pub fn with_draw_order(mut self, order: Vec<DrawRule>) -> Self {
        self.draw_order = order;
        self
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn start(&self) -> &Board {
        &self.start
    }

    pub fn moves(&self) -> &[Move] {
        &self.moves
    }

    pub fn history(&self) -> &[PositionKey] {
        &self.keys
    }

    pub fn draw_order(&self) -> &[DrawRule] {
        &self.draw_order
    }

    /// Number of half-moves played.
    pub fn ply_count(&self) -> usize {
        self.moves.len()
    }

    pub fn legal_moves(&self) -> Vec<Move> {
        self.board.legal_moves()
    }

    pub fn to_fen(&self) -> String {
        self.board.to_fen()
    }

    /// Validates and applies a move request, returning the resolved move.
    ///
    /// An illegal request leaves the game unchanged.
    pub fn play(&mut self, request: Move) -> Result<Move, IllegalMoveError> {
        let mv = self.board.play(request)?;
        self.moves.push(mv);
        self.keys.push(self.board.position_key());
        Ok(mv)
    }

    /// Takes back the last move by replaying every earlier one from the start.
    ///
    /// Returns the removed move, or `None` at the start of the game.
    pub fn undo(&mut self) -> Option<Move> {
        let last = self.moves.pop()?;
        let mut board = self.start.clone();
        let mut keys = vec![board.position_key()];
        for mv in &self.moves {
            // Recorded moves were legal when played, so replay cannot fail.
            if board.play(*mv).is_err() {
                debug_assert!(false, "replay of {mv} failed");
                break;
            }
            keys.push(board.position_key());
        }
        self.board = board;
        self.keys = keys;
        Some(last)
    }

    /// How many times the current position has occurred.
    pub fn repetition_count(&self) -> usize {
        let key = self.board.position_key();
        self.keys.iter().filter(|k| **k == key).count()
    }

    pub fn classify(&self) -> GameResult {
        classify(&self.board, &self.keys, &self.draw_order)
    }
}
