//! Perft node counting for validating the move generator.
//!
//! Counts are compared against published values for well-known positions.

use super::{legal_moves, make_move};
use crate::Board;

/// Counts leaf nodes of the legal move tree at `depth`.
pub fn perft(board: &Board, depth: u32) -> u64 {
    if depth == 0 {
        return 1;
    }

    let moves = legal_moves(board);
    if depth == 1 {
        return moves.len() as u64;
    }

    moves
        .into_iter()
        .map(|m| perft(&make_move(board, m), depth - 1))
        .sum()
}

/// Per-move node counts at `depth`, sorted by UCI string.
pub fn perft_divide(board: &Board, depth: u32) -> Vec<(String, u64)> {
    let mut results: Vec<(String, u64)> = legal_moves(board)
        .into_iter()
        .map(|m| {
            let nodes = perft(&make_move(board, m), depth.saturating_sub(1));
            (m.to_uci(), nodes)
        })
        .collect();
    results.sort_by(|a, b| a.0.cmp(&b.0));
    results
}
