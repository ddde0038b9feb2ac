//! Castling-right bitmask and the rook squares for each castle.

use super::color::Color;
use super::square::Square;

pub const WHITE_KINGSIDE: u8 = 0b0001;
pub const WHITE_QUEENSIDE: u8 = 0b0010;
pub const BLACK_KINGSIDE: u8 = 0b0100;
pub const BLACK_QUEENSIDE: u8 = 0b1000;
pub const ALL_RIGHTS: u8 = 0b1111;

/// Rights destroyed when a piece moves from or to a square. Indexed by
/// square, ANDed into the rights mask on every move.
pub static RIGHTS_MASK: [u8; 64] = {
    let mut mask = [ALL_RIGHTS; 64];
    mask[0] = ALL_RIGHTS & !WHITE_QUEENSIDE; // a1
    mask[4] = ALL_RIGHTS & !(WHITE_KINGSIDE | WHITE_QUEENSIDE); // e1
    mask[7] = ALL_RIGHTS & !WHITE_KINGSIDE; // h1
    mask[56] = ALL_RIGHTS & !BLACK_QUEENSIDE; // a8
    mask[60] = ALL_RIGHTS & !(BLACK_KINGSIDE | BLACK_QUEENSIDE); // e8
    mask[63] = ALL_RIGHTS & !BLACK_KINGSIDE; // h8
    mask
};

#[inline]
#[must_use]
pub const fn kingside_right(colour: Color) -> u8 {
    match colour {
        Color::White => WHITE_KINGSIDE,
        Color::Black => BLACK_KINGSIDE,
    }
}

#[inline]
#[must_use]
pub const fn queenside_right(colour: Color) -> u8 {
    match colour {
        Color::White => WHITE_QUEENSIDE,
        Color::Black => BLACK_QUEENSIDE,
    }
}

/// Where the rook lands for a castle identified by the king's
/// destination square.
#[inline]
#[must_use]
pub fn rook_to(king_to: Square) -> Square {
    match king_to {
        Square::G1 => Square::F1,
        Square::C1 => Square::D1,
        Square::G8 => Square::F8,
        _ => Square::D8,
    }
}

/// Where the rook starts for a castle identified by the king's
/// destination square.
#[inline]
#[must_use]
pub fn rook_from(king_to: Square) -> Square {
    match king_to {
        Square::G1 => Square::H1,
        Square::C1 => Square::A1,
        Square::G8 => Square::H8,
        _ => Square::A8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rights_masks() {
        assert_eq!(RIGHTS_MASK[4], BLACK_KINGSIDE | BLACK_QUEENSIDE);
        assert_eq!(RIGHTS_MASK[0], ALL_RIGHTS & !WHITE_QUEENSIDE);
        assert_eq!(RIGHTS_MASK[63], ALL_RIGHTS & !BLACK_KINGSIDE);
        assert_eq!(RIGHTS_MASK[27], ALL_RIGHTS);
    }

    #[test]
    fn rook_squares() {
        assert_eq!(rook_from(Square::G1), Square::H1);
        assert_eq!(rook_to(Square::G1), Square::F1);
        assert_eq!(rook_from(Square::C8), Square::A8);
        assert_eq!(rook_to(Square::C8), Square::D8);
    }
}
