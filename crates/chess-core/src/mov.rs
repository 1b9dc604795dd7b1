//! Move representation.

use crate::{PieceKind, Square};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::BitOr;

/// Special-move flags attached to a generated move.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MoveFlags(u8);

impl MoveFlags {
    pub const NONE: MoveFlags = MoveFlags(0);
    pub const CAPTURE: MoveFlags = MoveFlags(0b0001);
    pub const EN_PASSANT: MoveFlags = MoveFlags(0b0010);
    pub const CASTLE: MoveFlags = MoveFlags(0b0100);
    pub const DOUBLE_PUSH: MoveFlags = MoveFlags(0b1000);

    /// Returns true if every flag in `other` is set.
    #[inline]
    pub const fn contains(self, other: MoveFlags) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for MoveFlags {
    type Output = MoveFlags;

    fn bitor(self, rhs: MoveFlags) -> MoveFlags {
        MoveFlags(self.0 | rhs.0)
    }
}

impl fmt::Debug for MoveFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (MoveFlags::CAPTURE, "capture"),
            (MoveFlags::EN_PASSANT, "en-passant"),
            (MoveFlags::CASTLE, "castle"),
            (MoveFlags::DOUBLE_PUSH, "double-push"),
        ];
        let set: Vec<&str> = names
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "MoveFlags[{}]", set.join("|"))
    }
}

/// A chess move.
///
/// Moves are immutable values. A move built from coordinates (for example
/// by [`Move::from_uci`]) carries no flags; the move generator produces the
/// fully flagged version, and boards resolve requests against it.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Move {
    from: Square,
    to: Square,
    promotion: Option<PieceKind>,
    flags: MoveFlags,
}

impl Move {
    /// Creates an unflagged move between two squares.
    #[inline]
    pub const fn new(from: Square, to: Square) -> Self {
        Move {
            from,
            to,
            promotion: None,
            flags: MoveFlags::NONE,
        }
    }

    /// Returns a copy promoting to `kind`.
    #[inline]
    pub const fn with_promotion(self, kind: PieceKind) -> Self {
        Move {
            promotion: Some(kind),
            ..self
        }
    }

    /// Returns a copy carrying `flags`.
    #[inline]
    pub const fn with_flags(self, flags: MoveFlags) -> Self {
        Move { flags, ..self }
    }

    #[inline]
    pub const fn from(self) -> Square {
        self.from
    }

    #[inline]
    pub const fn to(self) -> Square {
        self.to
    }

    #[inline]
    pub const fn promotion(self) -> Option<PieceKind> {
        self.promotion
    }

    #[inline]
    pub const fn flags(self) -> MoveFlags {
        self.flags
    }

    #[inline]
    pub const fn is_capture(self) -> bool {
        self.flags.contains(MoveFlags::CAPTURE)
    }

    #[inline]
    pub const fn is_en_passant(self) -> bool {
        self.flags.contains(MoveFlags::EN_PASSANT)
    }

    #[inline]
    pub const fn is_castle(self) -> bool {
        self.flags.contains(MoveFlags::CASTLE)
    }

    #[inline]
    pub const fn is_double_push(self) -> bool {
        self.flags.contains(MoveFlags::DOUBLE_PUSH)
    }

    /// Compares squares and promotion, ignoring flags.
    pub fn same_coordinates(self, other: Move) -> bool {
        self.from == other.from && self.to == other.to && self.promotion == other.promotion
    }

    /// Coordinate notation (e.g. `e2e4`, `e7e8q`).
    pub fn to_uci(self) -> String {
        match self.promotion {
            Some(kind) => format!("{}{}{}", self.from, self.to, kind.letter()),
            None => format!("{}{}", self.from, self.to),
        }
    }

    /// Parses coordinate notation into an unflagged move.
    ///
    /// The null-move spellings `0000`, `(none)` and `null` are rejected, as
    /// is a promotion suffix naming a pawn or king.
    pub fn from_uci(s: &str) -> Option<Self> {
        let s = s.trim();
        if !s.is_ascii() || !(4..=5).contains(&s.len()) {
            return None;
        }
        let from = Square::from_algebraic(&s[0..2])?;
        let to = Square::from_algebraic(&s[2..4])?;
        let mv = Move::new(from, to);
        match s[4..].chars().next() {
            Some(c) => Some(mv.with_promotion(PieceKind::from_promotion_char(c)?)),
            None => Some(mv),
        }
    }
}

impl fmt::Debug for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.flags.is_empty() {
            write!(f, "Move({})", self.to_uci())
        } else {
            write!(f, "Move({} {:?})", self.to_uci(), self.flags)
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uci())
    }
}

impl Serialize for Move {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_uci())
    }
}

impl<'de> Deserialize<'de> for Move {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Move::from_uci(&text)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid move: {text}")))
    }
}
