//! Property tests for the text parsers.

use chess_core::{Fen, Move, Square};
use proptest::prelude::*;

proptest! {
    #[test]
    fn fen_parse_never_panics(text in "\\PC{0,90}") {
        let _ = Fen::parse(&text);
    }

    #[test]
    fn fen_parse_accepts_its_own_output(text in "[1-8pnbrqkPNBRQK/]{8,40} [wb] (-|K?Q?k?q?) (-|[a-h][36]) [0-9]{1,2} [1-9][0-9]{0,2}") {
        if let Ok(fen) = Fen::parse(&text) {
            let printed = fen.to_string();
            prop_assert_eq!(Fen::parse(&printed), Ok(fen));
        }
    }

    #[test]
    fn move_from_uci_never_panics(text in "\\PC{0,8}") {
        let _ = Move::from_uci(&text);
    }

    #[test]
    fn move_uci_text_is_stable(from in 0u8..64, to in 0u8..64) {
        let mv = Move::new(Square::from_index(from).unwrap(), Square::from_index(to).unwrap());
        let text = mv.to_uci();
        prop_assert_eq!(text.len(), 4);
        prop_assert_eq!(Move::from_uci(&text), Some(mv));
    }
}
