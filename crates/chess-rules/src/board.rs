//! Board model: piece placement plus the state needed for legality.

use crate::movegen::{self, make_move};
use crate::zobrist::{self, PositionKey};
use crate::Bitboard;
use chess_core::{CastlingRights, Color, Fen, FenError, Move, Piece, PieceKind, Square};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// A move that is not legal on the board it was offered to.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("illegal move {mv} in position {fen}")]
pub struct IllegalMoveError {
    /// The rejected request, as submitted.
    pub mv: Move,
    /// FEN of the board the move was checked against.
    pub fen: String,
}

/// Complete chess position state.
///
/// Boards can only be built from FEN or reached by applying a legal move, so
/// every board holds exactly one king per color.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Board {
    /// Squares occupied by each piece kind, indexed by [`PieceKind::index`].
    pub(crate) pieces: [Bitboard; 6],
    /// Squares occupied by each color.
    pub(crate) colors: [Bitboard; 2],
    pub(crate) side_to_move: Color,
    pub(crate) castling: CastlingRights,
    pub(crate) en_passant: Option<Square>,
    pub(crate) halfmove_clock: u32,
    pub(crate) fullmove_number: u32,
}

impl Board {
    /// The standard starting position.
    pub fn startpos() -> Self {
        Self::from_parsed(&Fen::default())
    }

    /// Parses a board from a FEN string.
    ///
    /// Besides the text checks done by [`Fen::parse`], rejects positions in
    /// which the side that just moved left its own king in check.
    pub fn from_fen(fen: &str) -> Result<Self, FenError> {
        let board = Self::from_parsed(&Fen::parse(fen)?);
        let waiting = board.side_to_move.opposite();
        if movegen::is_in_check(&board, waiting) {
            return Err(FenError::OpponentInCheck(waiting));
        }
        Ok(board)
    }

    fn from_parsed(fen: &Fen) -> Self {
        let mut board = Board {
            pieces: [Bitboard::EMPTY; 6],
            colors: [Bitboard::EMPTY; 2],
            side_to_move: fen.side_to_move,
            castling: fen.castling,
            en_passant: fen.en_passant,
            halfmove_clock: fen.halfmove_clock,
            fullmove_number: fen.fullmove_number,
        };
        for sq in Square::all() {
            if let Some(piece) = fen.piece_at(sq) {
                board.put(sq, piece);
            }
        }
        board
    }

    /// Snapshot of this board as a FEN record.
    pub fn to_parsed(&self) -> Fen {
        let mut squares = [None; 64];
        for sq in Square::all() {
            squares[sq.index() as usize] = self.piece_at(sq);
        }
        Fen {
            squares,
            side_to_move: self.side_to_move,
            castling: self.castling,
            en_passant: self.en_passant,
            halfmove_clock: self.halfmove_clock,
            fullmove_number: self.fullmove_number,
        }
    }

    pub fn to_fen(&self) -> String {
        self.to_parsed().to_string()
    }

    pub fn piece_at(&self, sq: Square) -> Option<Piece> {
        let color = Color::ALL
            .into_iter()
            .find(|c| self.colors[c.index()].contains(sq))?;
        let kind = PieceKind::ALL
            .into_iter()
            .find(|k| self.pieces[k.index()].contains(sq))?;
        Some(Piece::new(color, kind))
    }

    #[inline]
    pub fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    #[inline]
    pub fn castling(&self) -> CastlingRights {
        self.castling
    }

    #[inline]
    pub fn en_passant(&self) -> Option<Square> {
        self.en_passant
    }

    /// Half-moves since the last pawn move or capture.
    #[inline]
    pub fn halfmove_clock(&self) -> u32 {
        self.halfmove_clock
    }

    #[inline]
    pub fn fullmove_number(&self) -> u32 {
        self.fullmove_number
    }

    #[inline]
    pub fn occupied(&self) -> Bitboard {
        self.colors[0] | self.colors[1]
    }

    /// All squares holding pieces of `color`.
    #[inline]
    pub fn color_set(&self, color: Color) -> Bitboard {
        self.colors[color.index()]
    }

    #[inline]
    pub fn pieces_of(&self, kind: PieceKind, color: Color) -> Bitboard {
        self.pieces[kind.index()] & self.colors[color.index()]
    }

    pub fn king_square(&self, color: Color) -> Option<Square> {
        self.pieces_of(PieceKind::King, color).first()
    }

    /// Material of `color` in pawns, kings excluded.
    pub fn material(&self, color: Color) -> u32 {
        PieceKind::ALL
            .into_iter()
            .map(|kind| self.pieces_of(kind, color).count() * kind.material_value())
            .sum()
    }

    /// All legal moves for the side to move.
    pub fn legal_moves(&self) -> Vec<Move> {
        movegen::legal_moves(self)
    }

    pub fn is_in_check(&self, color: Color) -> bool {
        movegen::is_in_check(self, color)
    }

    /// Repetition key over placement, side to move, castling and en passant.
    pub fn position_key(&self) -> PositionKey {
        zobrist::position_key(self)
    }

    /// Matches a move request against the legal moves by coordinates.
    ///
    /// A request without a promotion kind resolves to the queen promotion
    /// when the move promotes. The returned move carries the generator's flags.
    pub fn resolve(&self, request: Move) -> Result<Move, IllegalMoveError> {
        self.legal_moves()
            .into_iter()
            .find(|legal| {
                legal.from() == request.from()
                    && legal.to() == request.to()
                    && match request.promotion() {
                        Some(kind) => legal.promotion() == Some(kind),
                        None => matches!(legal.promotion(), None | Some(PieceKind::Queen)),
                    }
            })
            .ok_or_else(|| IllegalMoveError {
                mv: request,
                fen: self.to_fen(),
            })
    }

    /// Validates `request` and returns the successor board.
    pub fn apply(&self, request: Move) -> Result<Board, IllegalMoveError> {
        let mv = self.resolve(request)?;
        Ok(make_move(self, mv))
    }

    /// Validates `request` and applies it in place, returning the resolved move.
    ///
    /// On error the board is left untouched.
    pub fn play(&mut self, request: Move) -> Result<Move, IllegalMoveError> {
        let mv = self.resolve(request)?;
        *self = make_move(self, mv);
        Ok(mv)
    }

    pub(crate) fn put(&mut self, sq: Square, piece: Piece) {
        self.pieces[piece.kind.index()].set(sq);
        self.colors[piece.color.index()].set(sq);
    }

    pub(crate) fn remove(&mut self, sq: Square) {
        for bb in self.pieces.iter_mut().chain(self.colors.iter_mut()) {
            bb.clear(sq);
        }
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::startpos()
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Board({})", self.to_fen())
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rank in (0..8u8).rev() {
            write!(f, "{} ", rank + 1)?;
            for file in 0..8u8 {
                let c = Square::from_coords(file, rank)
                    .and_then(|sq| self.piece_at(sq))
                    .map_or('.', Piece::fen_char);
                write!(f, " {c}")?;
            }
            writeln!(f)?;
        }
        write!(f, "   a b c d e f g h")
    }
}

impl Serialize for Board {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_fen())
    }
}

impl<'de> Deserialize<'de> for Board {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Board::from_fen(&text).map_err(serde::de::Error::custom)
    }
}
