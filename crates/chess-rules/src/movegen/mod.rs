//! Move generation.
//!
//! Moves are generated pseudo-legally per piece kind and then filtered by
//! applying each one and discarding those that leave the mover's king
//! attacked.

mod attacks;
pub mod perft;

use crate::{Bitboard, Board};
use chess_core::{Color, Move, MoveFlags, Piece, PieceKind, Square};

pub use attacks::{
    bishop_attacks, king_attacks, knight_attacks, pawn_attacks, queen_attacks, rook_attacks,
};

/// Generates all legal moves for the side to move.
pub fn legal_moves(board: &Board) -> Vec<Move> {
    let us = board.side_to_move;
    let mut moves = Vec::with_capacity(48);
    generate_pawn_moves(board, &mut moves);
    generate_piece_moves(board, &mut moves);
    generate_castling_moves(board, &mut moves);
    moves.retain(|m| !is_in_check(&make_move(board, *m), us));
    moves
}

fn push_pawn_move(moves: &mut Vec<Move>, mv: Move, promotes: bool) {
    if promotes {
        for kind in PieceKind::PROMOTIONS {
            moves.push(mv.with_promotion(kind));
        }
    } else {
        moves.push(mv);
    }
}

fn generate_pawn_moves(board: &Board, moves: &mut Vec<Move>) {
    let us = board.side_to_move;
    let them = board.color_set(us.opposite());
    let occupied = board.occupied();
    let step = us.pawn_step();

    for from in board.pieces_of(PieceKind::Pawn, us) {
        if let Some(one) = from.offset(0, step).filter(|sq| !occupied.contains(*sq)) {
            let promotes = one.rank_index() == us.promotion_rank();
            push_pawn_move(moves, Move::new(from, one), promotes);

            if from.rank_index() == us.pawn_rank() {
                if let Some(two) = one.offset(0, step).filter(|sq| !occupied.contains(*sq)) {
                    moves.push(Move::new(from, two).with_flags(MoveFlags::DOUBLE_PUSH));
                }
            }
        }

        for to in pawn_attacks(from, us) & them {
            let promotes = to.rank_index() == us.promotion_rank();
            let capture = Move::new(from, to).with_flags(MoveFlags::CAPTURE);
            push_pawn_move(moves, capture, promotes);
        }

        if let Some(ep) = board.en_passant {
            let victim = ep.offset(0, -step);
            let has_victim = victim.is_some_and(|sq| {
                board.piece_at(sq) == Some(Piece::new(us.opposite(), PieceKind::Pawn))
            });
            if has_victim && pawn_attacks(from, us).contains(ep) {
                moves.push(
                    Move::new(from, ep).with_flags(MoveFlags::CAPTURE | MoveFlags::EN_PASSANT),
                );
            }
        }
    }
}

fn generate_piece_moves(board: &Board, moves: &mut Vec<Move>) {
    let us = board.side_to_move;
    let ours = board.color_set(us);
    let them = board.color_set(us.opposite());
    let occupied = board.occupied();

    for kind in [
        PieceKind::Knight,
        PieceKind::Bishop,
        PieceKind::Rook,
        PieceKind::Queen,
        PieceKind::King,
    ] {
        for from in board.pieces_of(kind, us) {
            let targets = match kind {
                PieceKind::Knight => knight_attacks(from),
                PieceKind::Bishop => bishop_attacks(from, occupied),
                PieceKind::Rook => rook_attacks(from, occupied),
                PieceKind::Queen => queen_attacks(from, occupied),
                _ => king_attacks(from),
            } & !ours;
            for to in targets {
                let mv = Move::new(from, to);
                moves.push(if them.contains(to) {
                    mv.with_flags(MoveFlags::CAPTURE)
                } else {
                    mv
                });
            }
        }
    }
}

struct CastleSide {
    king_to: Square,
    rook_from: Square,
    /// Squares that must be empty.
    between: &'static [Square],
    /// Squares the king crosses or lands on, which must not be attacked.
    king_path: [Square; 2],
}

const fn castle_sides(color: Color) -> [CastleSide; 2] {
    match color {
        Color::White => [
            CastleSide {
                king_to: Square::G1,
                rook_from: Square::H1,
                between: &[Square::F1, Square::G1],
                king_path: [Square::F1, Square::G1],
            },
            CastleSide {
                king_to: Square::C1,
                rook_from: Square::A1,
                between: &[Square::B1, Square::C1, Square::D1],
                king_path: [Square::D1, Square::C1],
            },
        ],
        Color::Black => [
            CastleSide {
                king_to: Square::G8,
                rook_from: Square::H8,
                between: &[Square::F8, Square::G8],
                king_path: [Square::F8, Square::G8],
            },
            CastleSide {
                king_to: Square::C8,
                rook_from: Square::A8,
                between: &[Square::B8, Square::C8, Square::D8],
                king_path: [Square::D8, Square::C8],
            },
        ],
    }
}

fn king_home(color: Color) -> Square {
    match color {
        Color::White => Square::E1,
        Color::Black => Square::E8,
    }
}

fn generate_castling_moves(board: &Board, moves: &mut Vec<Move>) {
    let us = board.side_to_move;
    let them = us.opposite();
    let home = king_home(us);

    if board.king_square(us) != Some(home) || is_in_check(board, us) {
        return;
    }

    let occupied = board.occupied();
    let [kingside, queenside] = castle_sides(us);
    for (allowed, side) in [
        (board.castling.kingside(us), kingside),
        (board.castling.queenside(us), queenside),
    ] {
        if !allowed || board.piece_at(side.rook_from) != Some(Piece::new(us, PieceKind::Rook)) {
            continue;
        }
        if side.between.iter().any(|sq| occupied.contains(*sq)) {
            continue;
        }
        if side
            .king_path
            .iter()
            .any(|sq| is_square_attacked(board, *sq, them))
        {
            continue;
        }
        moves.push(Move::new(home, side.king_to).with_flags(MoveFlags::CASTLE));
    }
}

/// Returns true if `sq` is attacked by any piece of color `by`.
pub fn is_square_attacked(board: &Board, sq: Square, by: Color) -> bool {
    let occupied = board.occupied();
    let queens = board.pieces_of(PieceKind::Queen, by);

    // A pawn of `by` attacks `sq` exactly when a pawn of the other color on
    // `sq` would attack the pawn's square.
    let checks = [
        pawn_attacks(sq, by.opposite()) & board.pieces_of(PieceKind::Pawn, by),
        knight_attacks(sq) & board.pieces_of(PieceKind::Knight, by),
        king_attacks(sq) & board.pieces_of(PieceKind::King, by),
        bishop_attacks(sq, occupied) & (board.pieces_of(PieceKind::Bishop, by) | queens),
        rook_attacks(sq, occupied) & (board.pieces_of(PieceKind::Rook, by) | queens),
    ];
    checks.iter().any(|bb| !bb.is_empty())
}

/// Returns true if the king of `color` is attacked.
pub fn is_in_check(board: &Board, color: Color) -> bool {
    board
        .king_square(color)
        .is_some_and(|king| is_square_attacked(board, king, color.opposite()))
}

/// Applies a generator-produced move without validating it.
pub(crate) fn make_move(board: &Board, mv: Move) -> Board {
    let mut next = board.clone();
    let us = board.side_to_move;
    let them = us.opposite();
    let (from, to) = (mv.from(), mv.to());

    let Some(moving) = board.piece_at(from) else {
        debug_assert!(false, "no piece on {from} for {mv}");
        return next;
    };

    let mut captured = false;
    if mv.is_en_passant() {
        if let Some(victim) = to.offset(0, -us.pawn_step()) {
            next.remove(victim);
            captured = true;
        }
    } else if next.color_set(them).contains(to) {
        next.remove(to);
        captured = true;
    }

    next.remove(from);
    let placed = mv.promotion().unwrap_or(moving.kind);
    next.put(to, Piece::new(us, placed));

    if mv.is_castle() {
        let back = us.back_rank();
        let (rook_from, rook_to) = if to.file_index() == 6 {
            (Square::from_coords(7, back), Square::from_coords(5, back))
        } else {
            (Square::from_coords(0, back), Square::from_coords(3, back))
        };
        if let (Some(rook_from), Some(rook_to)) = (rook_from, rook_to) {
            next.remove(rook_from);
            next.put(rook_to, Piece::new(us, PieceKind::Rook));
        }
    }

    if moving.kind == PieceKind::King {
        next.castling.revoke_color(us);
    }
    for corner in [from, to] {
        revoke_corner(&mut next, corner);
    }

    next.en_passant = if mv.is_double_push() {
        from.offset(0, us.pawn_step())
    } else {
        None
    };

    if moving.kind == PieceKind::Pawn || captured {
        next.halfmove_clock = 0;
    } else {
        next.halfmove_clock = next.halfmove_clock.saturating_add(1);
    }
    if us == Color::Black {
        next.fullmove_number = next.fullmove_number.saturating_add(1);
    }
    next.side_to_move = them;

    next
}

/// Any move touching a rook's home corner ends castling on that side.
fn revoke_corner(board: &mut Board, sq: Square) {
    match sq {
        Square::H1 => board.castling.revoke_kingside(Color::White),
        Square::A1 => board.castling.revoke_queenside(Color::White),
        Square::H8 => board.castling.revoke_kingside(Color::Black),
        Square::A8 => board.castling.revoke_queenside(Color::Black),
        _ => {}
    }
}

/// Squares attacked by every piece of `color`.
pub fn attacked_squares(board: &Board, color: Color) -> Bitboard {
    Square::all()
        .filter(|sq| is_square_attacked(board, *sq, color))
        .fold(Bitboard::EMPTY, |mut acc, sq| {
            acc.set(sq);
            acc
        })
}
