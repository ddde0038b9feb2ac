//! FEN parsing and emission.

use std::str::FromStr;

use super::attacks;
use super::error::FenError;
use super::state::Board;
use super::types::{castling, Color, Piece, Square};

impl Board {
    /// Parse a 6-field FEN. The halfmove and fullmove fields may be
    /// omitted, as many GUIs and test suites do.
    pub fn from_fen(fen: &str) -> Result<Board, FenError> {
        let mut fields = fen.split_whitespace();

        let placement = fields.next().ok_or(FenError::MissingField("placement"))?;
        let side = fields.next().ok_or(FenError::MissingField("side to move"))?;
        let rights = fields.next().unwrap_or("-");
        let ep = fields.next().unwrap_or("-");
        let halfmove = fields.next().unwrap_or("0");
        let _fullmove = fields.next().unwrap_or("1");

        let mut board = Board::empty();

        let ranks: Vec<&str> = placement.split('/').collect();
        if ranks.len() != 8 {
            return Err(FenError::BadRankCount(ranks.len()));
        }
        for (row, rank_text) in ranks.iter().enumerate() {
            let rank = 7 - row;
            let mut file = 0usize;
            for c in rank_text.chars() {
                if let Some(skip) = c.to_digit(10) {
                    file += skip as usize;
                } else {
                    let piece = Piece::from_char(c).ok_or(FenError::BadPiece(c))?;
                    let colour = if c.is_ascii_uppercase() {
                        Color::White
                    } else {
                        Color::Black
                    };
                    if file > 7 {
                        return Err(FenError::BadRankWidth { rank, width: file + 1 });
                    }
                    board.put_piece(colour, piece, Square::new(file, rank));
                    file += 1;
                }
            }
            if file != 8 {
                return Err(FenError::BadRankWidth { rank, width: file });
            }
        }

        board.turn = match side {
            "w" => Color::White,
            "b" => Color::Black,
            other => return Err(FenError::BadSideToMove(other.to_string())),
        };

        board.castle_rights = 0;
        if rights != "-" {
            for c in rights.chars() {
                board.castle_rights |= match c {
                    'K' => castling::WHITE_KINGSIDE,
                    'Q' => castling::WHITE_QUEENSIDE,
                    'k' => castling::BLACK_KINGSIDE,
                    'q' => castling::BLACK_QUEENSIDE,
                    _ => return Err(FenError::BadCastlingRights(rights.to_string())),
                };
            }
        }

        board.ep_square = if ep == "-" {
            None
        } else {
            Some(
                ep.parse::<Square>()
                    .map_err(|_| FenError::BadEnPassant(ep.to_string()))?,
            )
        };

        // The hash only carries an en-passant target a pawn can use,
        // matching what make_move produces after a double push. Many
        // FENs record the target unconditionally; normalize it away so
        // loaded and played-out positions hash identically.
        if let Some(target) = board.ep_square {
            let capturers = attacks::pawn_attacks(!board.turn, target)
                & board.pieces_of(board.turn, Piece::Pawn);
            if capturers.is_empty() {
                board.ep_square = None;
            }
        }

        board.fifty = halfmove.parse().unwrap_or(0);

        for colour in Color::BOTH {
            if board.pieces_of(colour, Piece::King).popcount() != 1 {
                return Err(FenError::NoKing);
            }
        }

        board.refresh_incremental();
        Ok(board)
    }

    /// Emit the position as a FEN string.
    #[must_use]
    pub fn to_fen(&self) -> String {
        let mut out = String::with_capacity(90);

        for rank in (0..8).rev() {
            let mut empties = 0;
            for file in 0..8 {
                match self.piece_at(Square::new(file, rank)) {
                    Some((colour, piece)) => {
                        if empties > 0 {
                            out.push(char::from_digit(empties, 10).unwrap());
                            empties = 0;
                        }
                        out.push(piece.to_fen_char(colour));
                    }
                    None => empties += 1,
                }
            }
            if empties > 0 {
                out.push(char::from_digit(empties, 10).unwrap());
            }
            if rank > 0 {
                out.push('/');
            }
        }

        out.push(' ');
        out.push_str(&self.turn().to_string());
        out.push(' ');

        if self.castle_rights == 0 {
            out.push('-');
        } else {
            for (right, c) in [
                (castling::WHITE_KINGSIDE, 'K'),
                (castling::WHITE_QUEENSIDE, 'Q'),
                (castling::BLACK_KINGSIDE, 'k'),
                (castling::BLACK_QUEENSIDE, 'q'),
            ] {
                if self.castle_rights & right != 0 {
                    out.push(c);
                }
            }
        }

        out.push(' ');
        match self.ep_square {
            Some(sq) => out.push_str(&sq.to_string()),
            None => out.push('-'),
        }

        out.push_str(&format!(" {} {}", self.fifty, 1 + self.ply() / 2));
        out
    }
}

impl FromStr for Board {
    type Err = FenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Board::from_fen(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::state::START_FEN;

    #[test]
    fn start_roundtrip() {
        let board = Board::new();
        assert_eq!(board.to_fen(), START_FEN);
    }

    #[test]
    fn kiwipete_parses() {
        let board: Board =
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1"
                .parse()
                .unwrap();
        assert_eq!(board.occupied().popcount(), 32);
        assert_eq!(board.castle_rights(), castling::ALL_RIGHTS);
    }

    #[test]
    fn tolerates_missing_clocks() {
        let board: Board = "7k/5ppp/8/8/8/8/5PPP/R6K w -".parse().unwrap();
        assert_eq!(board.fifty(), 0);
        assert_eq!(board.turn(), Color::White);
    }

    #[test]
    fn rejects_garbage() {
        assert!(Board::from_fen("").is_err());
        assert!(Board::from_fen("8/8/8/8/8/8/8/9 w - -").is_err());
        assert!(Board::from_fen("8/8/8/8/8/8/8/8 x - -").is_err());
        // No kings
        assert!(Board::from_fen("8/8/8/8/8/8/8/8 w - -").is_err());
        assert!(Board::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQXBNR w KQkq -").is_err());
    }

    #[test]
    fn uncapturable_ep_target_is_normalized() {
        // After 1. e4 there is no black pawn on d4 or f4; a FEN that
        // still records e3 must hash like the played-out position
        let mut played = Board::new();
        let mv = played.parse_uci_move("e2e4").unwrap();
        played.make_move(mv);

        let loaded: Board =
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1"
                .parse()
                .unwrap();
        assert_eq!(loaded.ep_square(), None);
        assert_eq!(loaded.hash(), played.hash());

        let bare: Board = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1"
            .parse()
            .unwrap();
        assert_eq!(loaded.hash(), bare.hash());

        // With a real capturer beside the pushed pawn the target stays
        let capturable: Board =
            "rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3"
                .parse()
                .unwrap();
        assert_eq!(capturable.ep_square().map(|s| s.to_string()), Some("f6".into()));
    }

    #[test]
    fn hash_depends_on_fields() {
        let a: Board = "4k3/8/8/8/8/8/8/4K3 w - - 0 1".parse().unwrap();
        let b: Board = "4k3/8/8/8/8/8/8/4K3 b - - 0 1".parse().unwrap();
        assert_ne!(a.hash(), b.hash());
        // pkhash ignores the side to move
        assert_eq!(a.pkhash(), b.pkhash());
        // identical material maps to an identical material key
        assert_eq!(a.mathash(), b.mathash());
    }
}
