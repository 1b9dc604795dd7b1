//! Castling rights.

use crate::Color;
use std::fmt;

/// The four castling flags: white/black, kingside/queenside.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CastlingRights(u8);

impl CastlingRights {
    pub const NONE: CastlingRights = CastlingRights(0);
    pub const ALL: CastlingRights = CastlingRights(0b1111);

    const WHITE_KINGSIDE: u8 = 0b0001;
    const WHITE_QUEENSIDE: u8 = 0b0010;
    const BLACK_KINGSIDE: u8 = 0b0100;
    const BLACK_QUEENSIDE: u8 = 0b1000;

    const fn kingside_bit(color: Color) -> u8 {
        match color {
            Color::White => Self::WHITE_KINGSIDE,
            Color::Black => Self::BLACK_KINGSIDE,
        }
    }

    const fn queenside_bit(color: Color) -> u8 {
        match color {
            Color::White => Self::WHITE_QUEENSIDE,
            Color::Black => Self::BLACK_QUEENSIDE,
        }
    }

    #[inline]
    pub const fn kingside(self, color: Color) -> bool {
        self.0 & Self::kingside_bit(color) != 0
    }

    #[inline]
    pub const fn queenside(self, color: Color) -> bool {
        self.0 & Self::queenside_bit(color) != 0
    }

    /// Grants kingside castling to `color`.
    pub fn grant_kingside(&mut self, color: Color) {
        self.0 |= Self::kingside_bit(color);
    }

    /// Grants queenside castling to `color`.
    pub fn grant_queenside(&mut self, color: Color) {
        self.0 |= Self::queenside_bit(color);
    }

    /// Revokes both rights of `color` (its king moved).
    pub fn revoke_color(&mut self, color: Color) {
        self.0 &= !(Self::kingside_bit(color) | Self::queenside_bit(color));
    }

    pub fn revoke_kingside(&mut self, color: Color) {
        self.0 &= !Self::kingside_bit(color);
    }

    pub fn revoke_queenside(&mut self, color: Color) {
        self.0 &= !Self::queenside_bit(color);
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Raw 4-bit value, white kingside in bit 0.
    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Parses the FEN castling field (`KQkq`, any subset, or `-`).
    pub fn from_fen(field: &str) -> Option<Self> {
        let mut rights = CastlingRights::NONE;
        if field == "-" {
            return Some(rights);
        }
        for c in field.chars() {
            match c {
                'K' => rights.grant_kingside(Color::White),
                'Q' => rights.grant_queenside(Color::White),
                'k' => rights.grant_kingside(Color::Black),
                'q' => rights.grant_queenside(Color::Black),
                _ => return None,
            }
        }
        if field.is_empty() {
            None
        } else {
            Some(rights)
        }
    }
}

impl fmt::Display for CastlingRights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("-");
        }
        for (set, c) in [
            (self.kingside(Color::White), 'K'),
            (self.queenside(Color::White), 'Q'),
            (self.kingside(Color::Black), 'k'),
            (self.queenside(Color::Black), 'q'),
        ] {
            if set {
                write!(f, "{c}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for CastlingRights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CastlingRights({self})")
    }
}
