//! Chess rules on a bitboard board model.
//!
//! This crate provides:
//! - [`Board`] - position state with validated move application
//! - [`legal_moves`], [`is_in_check`] - move generation and check detection
//! - [`classify`] - termination detection (mate, stalemate, draw rules)
//! - [`Game`] - move and position history with undo by replay
//! - [`perft`] - node counting for generator validation
//!
//! # Example
//!
//! ```
//! use chess_core::Move;
//! use chess_rules::{Game, GameResult};
//!
//! let mut game = Game::new();
//! game.play(Move::from_uci("e2e4").unwrap()).unwrap();
//! game.play(Move::from_uci("e7e5").unwrap()).unwrap();
//! assert_eq!(game.classify(), GameResult::InProgress);
//! ```

mod bitboard;
mod board;
mod game;
pub mod movegen;
mod outcome;
mod zobrist;

pub use bitboard::Bitboard;
pub use board::{Board, IllegalMoveError};
pub use game::Game;
pub use movegen::perft::{perft, perft_divide};
pub use movegen::{
    attacked_squares, bishop_attacks, is_in_check, is_square_attacked, king_attacks,
    knight_attacks, legal_moves, pawn_attacks, queen_attacks, rook_attacks,
};
pub use outcome::{
    classify, is_insufficient_material, DrawRule, GameResult, DEFAULT_DRAW_ORDER,
    FIFTY_MOVE_PLIES, REPETITION_COUNT,
};
pub use zobrist::{position_key, PositionKey};
