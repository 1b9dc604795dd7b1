//! Zobrist keys for position identity.
//!
//! A position key XORs one random value per occupied (piece, square), plus
//! values for black to move, the castling rights combination and the en
//! passant file. Two boards with the same placement, side to move, castling
//! rights and en passant square share a key; the move clocks are ignored.

use crate::Board;
use chess_core::{Color, Piece, Square};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a position for repetition counting.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionKey(pub u64);

impl fmt::Debug for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PositionKey({:016x})", self.0)
    }
}

impl fmt::Display for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

struct ZobristKeys {
    /// Indexed by [kind][color][square].
    pieces: [[[u64; 64]; 2]; 6],
    black_to_move: u64,
    /// One key per castling rights bit pattern.
    castling: [u64; 16],
    en_passant: [u64; 8],
}

impl ZobristKeys {
    const fn new() -> Self {
        // xorshift64 with a fixed seed so keys are stable across runs.
        const fn next_random(mut x: u64) -> u64 {
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            x
        }

        let mut state = 0x9E37_79B9_7F4A_7C15u64;
        let mut pieces = [[[0u64; 64]; 2]; 6];
        let mut castling = [0u64; 16];
        let mut en_passant = [0u64; 8];

        let mut kind = 0;
        while kind < 6 {
            let mut color = 0;
            while color < 2 {
                let mut sq = 0;
                while sq < 64 {
                    state = next_random(state);
                    pieces[kind][color][sq] = state;
                    sq += 1;
                }
                color += 1;
            }
            kind += 1;
        }

        state = next_random(state);
        let black_to_move = state;

        // The empty rights set keeps key zero.
        let mut i = 1;
        while i < 16 {
            state = next_random(state);
            castling[i] = state;
            i += 1;
        }

        let mut i = 0;
        while i < 8 {
            state = next_random(state);
            en_passant[i] = state;
            i += 1;
        }

        ZobristKeys {
            pieces,
            black_to_move,
            castling,
            en_passant,
        }
    }

    #[inline]
    const fn piece(&self, piece: Piece, sq: Square) -> u64 {
        self.pieces[piece.kind.index()][piece.color.index()][sq.index() as usize]
    }
}

static KEYS: ZobristKeys = ZobristKeys::new();

/// Computes the repetition key of `board`.
pub fn position_key(board: &Board) -> PositionKey {
    let mut hash = 0u64;
    for sq in board.occupied() {
        if let Some(piece) = board.piece_at(sq) {
            hash ^= KEYS.piece(piece, sq);
        }
    }
    if board.side_to_move() == Color::Black {
        hash ^= KEYS.black_to_move;
    }
    hash ^= KEYS.castling[board.castling().bits() as usize & 0xF];
    if let Some(ep) = board.en_passant() {
        hash ^= KEYS.en_passant[ep.file_index() as usize];
    }
    PositionKey(hash)
}
