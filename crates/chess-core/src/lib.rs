//! Core types for chess.
//!
//! This crate provides the value types shared by the rules, protocol and
//! arena crates:
//! - [`Color`], [`PieceKind`] and [`Piece`] for piece representation
//! - [`Square`], [`File`] and [`Rank`] for board coordinates
//! - [`Move`] and [`MoveFlags`] for move representation
//! - [`CastlingRights`] for the four castling flags
//! - [`Fen`] for FEN parsing and serialization

mod castling;
mod color;
mod fen;
mod mov;
mod piece;
mod square;

pub use castling::CastlingRights;
pub use color::Color;
pub use fen::{Fen, FenError};
pub use mov::{Move, MoveFlags};
pub use piece::{Piece, PieceKind};
pub use square::{File, Rank, Square};
