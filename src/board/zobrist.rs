//! Zobrist keys for position hashing.
//!
//! Three keys are maintained incrementally: the main hash (pieces,
//! side to move, castling rights, en-passant file), the pawn-king hash
//! (pawns and kings only), and the material hash, which is a *sum* of
//! per-piece primes so that equal piece counts always map to the same
//! key regardless of square.

use once_cell::sync::Lazy;
use rand::prelude::*;

use super::types::{castling, Color, Piece, Square};

pub struct ZobristKeys {
    /// `pieces[colour][piece][square]`
    pub pieces: [[[u64; 64]; 6]; 2],
    pub turn: u64,
    /// One key per castling-rights combination.
    pub castling: [u64; 16],
    /// Keyed by en-passant file.
    pub en_passant: [u64; 8],
    /// `pawn_king[colour][piece][square]`, zero except pawns and kings.
    pub pawn_king: [[[u64; 64]; 6]; 2],
}

impl ZobristKeys {
    fn new() -> Self {
        // Fixed seed: hashes must be reproducible across runs
        let mut rng = StdRng::seed_from_u64(0x9d39_247e_3377_6d41);

        let mut pieces = [[[0u64; 64]; 6]; 2];
        for colour in &mut pieces {
            for piece in colour.iter_mut() {
                for key in piece.iter_mut() {
                    *key = rng.gen();
                }
            }
        }

        let turn = rng.gen();

        // Individual rights get keys; combinations are their XOR
        let singles: [u64; 4] = [rng.gen(), rng.gen(), rng.gen(), rng.gen()];
        let mut castle = [0u64; 16];
        for (mask, slot) in castle.iter_mut().enumerate() {
            for (bit, key) in singles.iter().enumerate() {
                if mask & (1 << bit) != 0 {
                    *slot ^= key;
                }
            }
        }

        let mut en_passant = [0u64; 8];
        for key in &mut en_passant {
            *key = rng.gen();
        }

        let mut pawn_king = [[[0u64; 64]; 6]; 2];
        for colour in &mut pawn_king {
            for piece in [Piece::Pawn, Piece::King] {
                for key in colour[piece.index()].iter_mut() {
                    *key = rng.gen();
                }
            }
        }

        ZobristKeys {
            pieces,
            turn,
            castling: castle,
            en_passant,
            pawn_king,
        }
    }
}

pub static ZOBRIST: Lazy<ZobristKeys> = Lazy::new(ZobristKeys::new);

/// Per-piece primes for the material hash. Summed, not XORed, so the
/// key is a function of piece counts alone. Kings carry no term.
pub const MATERIAL_PRIMES: [[u64; 6]; 2] = [
    [
        17008651141875982339,
        15202887380319082783,
        12311744257139811149,
        10979190538029446137,
        11811845319353239651,
        0,
    ],
    [
        11695583624105689831,
        13469005675588064321,
        15394650811035483107,
        18264461213049635989,
        15484752644942473553,
        0,
    ],
];

#[inline]
#[must_use]
pub fn piece_key(colour: Color, piece: Piece, sq: Square) -> u64 {
    ZOBRIST.pieces[colour.index()][piece.index()][sq.index()]
}

#[inline]
#[must_use]
pub fn pawn_king_key(colour: Color, piece: Piece, sq: Square) -> u64 {
    ZOBRIST.pawn_king[colour.index()][piece.index()][sq.index()]
}

#[inline]
#[must_use]
pub fn castle_key(rights: u8) -> u64 {
    ZOBRIST.castling[(rights & castling::ALL_RIGHTS) as usize]
}

#[inline]
#[must_use]
pub fn en_passant_key(file: usize) -> u64 {
    ZOBRIST.en_passant[file]
}

#[inline]
#[must_use]
pub fn turn_key() -> u64 {
    ZOBRIST.turn
}

#[inline]
#[must_use]
pub fn material_prime(colour: Color, piece: Piece) -> u64 {
    MATERIAL_PRIMES[colour.index()][piece.index()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_stable_across_calls() {
        let a = piece_key(Color::White, Piece::Knight, Square::from_index(12));
        let b = piece_key(Color::White, Piece::Knight, Square::from_index(12));
        assert_eq!(a, b);
        assert_ne!(a, 0);
    }

    #[test]
    fn castle_keys_compose() {
        let k = ZOBRIST.castling[castling::WHITE_KINGSIDE as usize];
        let q = ZOBRIST.castling[castling::WHITE_QUEENSIDE as usize];
        let kq = ZOBRIST.castling[(castling::WHITE_KINGSIDE | castling::WHITE_QUEENSIDE) as usize];
        assert_eq!(k ^ q, kq);
        assert_eq!(ZOBRIST.castling[0], 0);
    }

    #[test]
    fn pawn_king_keys_limited() {
        // Only pawn and king planes carry keys
        for piece in [Piece::Knight, Piece::Bishop, Piece::Rook, Piece::Queen] {
            assert_eq!(pawn_king_key(Color::White, piece, Square::E1), 0);
        }
        assert_ne!(pawn_king_key(Color::White, Piece::Pawn, Square::new(0, 1)), 0);
        assert_ne!(pawn_king_key(Color::Black, Piece::King, Square::E8), 0);
    }
}
