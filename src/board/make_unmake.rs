//! Applying and reverting moves.
//!
//! Four apply paths are dispatched on the move kind. Every path keeps
//! the bitboards, the square array, the three hashes, the packed
//! piece-square sum, castling rights, the en-passant square and the
//! halfmove clock current, and logs piece movements for the NNUE
//! accumulator. Reverting restores the snapshot and reverses the board
//! arrays; the pair is an exact involution.

use super::state::{Board, DeltaList, NnueDelta, NullUndo, Undo};
use super::types::{castling, Bitboard, Color, Move, MoveKind, Piece, Square};
use super::zobrist;
use crate::eval::psqt::psqt;

impl Board {
    /// Apply `mv`, returning the snapshot needed to revert it. The
    /// move must be pseudo-legal; legality is checked afterwards with
    /// `was_legal`.
    pub fn make_move(&mut self, mv: Move) -> Undo {
        let mut undo = Undo {
            captured: None,
            hash: self.hash,
            pkhash: self.pkhash,
            mathash: self.mathash,
            psqt: self.psqt,
            castle_rights: self.castle_rights,
            ep_square: self.ep_square,
            fifty: self.fifty,
            king_attackers: self.king_attackers,
            deltas: DeltaList::default(),
        };

        self.history.push(self.hash);
        self.hash ^= zobrist::turn_key();
        self.fifty += 1;

        match mv.kind() {
            MoveKind::Normal => self.apply_normal(mv, &mut undo),
            MoveKind::Castle => self.apply_castle(mv, &mut undo),
            MoveKind::EnPassant => self.apply_en_passant(mv, &mut undo),
            MoveKind::Promotion => self.apply_promotion(mv, &mut undo),
        }

        self.turn = !self.turn;
        self.king_attackers = self.compute_king_attackers();
        undo
    }

    /// Did the move just applied leave the mover's king safe?
    #[must_use]
    pub fn was_legal(&self) -> bool {
        let mover = !self.turn;
        !self.is_attacked(self.king_square(mover), self.turn)
    }

    pub fn unmake_move(&mut self, mv: Move, undo: &Undo) {
        self.history.pop();
        self.hash = undo.hash;
        self.pkhash = undo.pkhash;
        self.mathash = undo.mathash;
        self.psqt = undo.psqt;
        self.castle_rights = undo.castle_rights;
        self.ep_square = undo.ep_square;
        self.fifty = undo.fifty;
        self.king_attackers = undo.king_attackers;
        self.turn = !self.turn;

        let us = self.turn;
        let from = mv.from();
        let to = mv.to();

        match mv.kind() {
            MoveKind::Normal => {
                let (_, piece) = self.squares[to.index()].expect("moved piece on target");
                self.remove_piece(us, piece, to);
                self.put_piece(us, piece, from);
                if let Some((colour, captured)) = undo.captured {
                    self.put_piece(colour, captured, to);
                }
            }
            MoveKind::Castle => {
                self.remove_piece(us, Piece::King, to);
                self.put_piece(us, Piece::King, from);
                self.remove_piece(us, Piece::Rook, castling::rook_to(to));
                self.put_piece(us, Piece::Rook, castling::rook_from(to));
            }
            MoveKind::EnPassant => {
                let victim = to.offset(-us.forward());
                self.remove_piece(us, Piece::Pawn, to);
                self.put_piece(us, Piece::Pawn, from);
                self.put_piece(!us, Piece::Pawn, victim);
            }
            MoveKind::Promotion => {
                self.remove_piece(us, mv.promoted(), to);
                self.put_piece(us, Piece::Pawn, from);
                if let Some((colour, captured)) = undo.captured {
                    self.put_piece(colour, captured, to);
                }
            }
        }
    }

    /// Pass the move: swap the side to move, clear the en-passant
    /// square, and mark the history so repetitions cannot match across
    /// the null.
    pub fn make_null(&mut self) -> NullUndo {
        let undo = NullUndo {
            hash: self.hash,
            ep_square: self.ep_square,
            king_attackers: self.king_attackers,
        };

        self.history.push(0);
        self.hash ^= zobrist::turn_key();
        if let Some(ep) = self.ep_square.take() {
            self.hash ^= zobrist::en_passant_key(ep.file());
        }
        self.turn = !self.turn;
        self.king_attackers = self.compute_king_attackers();
        undo
    }

    pub fn unmake_null(&mut self, undo: &NullUndo) {
        self.history.pop();
        self.hash = undo.hash;
        self.ep_square = undo.ep_square;
        self.king_attackers = undo.king_attackers;
        self.turn = !self.turn;
    }

    // ---- apply paths ----------------------------------------------------

    fn apply_normal(&mut self, mv: Move, undo: &mut Undo) {
        let us = self.turn;
        let from = mv.from();
        let to = mv.to();
        let (_, piece) = self.squares[from.index()].expect("mover on from-square");

        if piece == Piece::Pawn {
            self.fifty = 0;
        }

        if let Some((them, captured)) = self.squares[to.index()] {
            self.fifty = 0;
            undo.captured = Some((them, captured));
            self.remove_piece(them, captured, to);
            self.hash ^= zobrist::piece_key(them, captured, to);
            self.pkhash ^= zobrist::pawn_king_key(them, captured, to);
            self.mathash = self
                .mathash
                .wrapping_sub(zobrist::material_prime(them, captured));
            self.psqt -= psqt(them, captured, to);
            undo.deltas.push(NnueDelta {
                colour: them,
                piece: captured,
                from: Some(to),
                to: None,
            });
        }

        self.remove_piece(us, piece, from);
        self.put_piece(us, piece, to);
        self.hash ^= zobrist::piece_key(us, piece, from) ^ zobrist::piece_key(us, piece, to);
        self.pkhash ^=
            zobrist::pawn_king_key(us, piece, from) ^ zobrist::pawn_king_key(us, piece, to);
        self.psqt += psqt(us, piece, to) - psqt(us, piece, from);
        undo.deltas.push(NnueDelta {
            colour: us,
            piece,
            from: Some(from),
            to: Some(to),
        });

        self.update_castle_rights(castling::RIGHTS_MASK[from.index()]);
        self.update_castle_rights(castling::RIGHTS_MASK[to.index()]);

        self.clear_ep();

        // A double push only creates an en-passant target when an
        // enemy pawn is placed to use it
        if piece == Piece::Pawn && (to.index() as i32 - from.index() as i32).abs() == 16 {
            let capturers = self.pieces_of(!us, Piece::Pawn)
                & super::masks::isolated_mask(to)
                & Bitboard::rank_mask(to.rank());
            if !capturers.is_empty() {
                let ep = from.offset(us.forward());
                self.ep_square = Some(ep);
                self.hash ^= zobrist::en_passant_key(ep.file());
            }
        }
    }

    fn apply_castle(&mut self, mv: Move, undo: &mut Undo) {
        let us = self.turn;
        let from = mv.from();
        let to = mv.to();
        let rook_from = castling::rook_from(to);
        let rook_to = castling::rook_to(to);

        self.remove_piece(us, Piece::King, from);
        self.put_piece(us, Piece::King, to);
        self.remove_piece(us, Piece::Rook, rook_from);
        self.put_piece(us, Piece::Rook, rook_to);

        self.hash ^= zobrist::piece_key(us, Piece::King, from)
            ^ zobrist::piece_key(us, Piece::King, to)
            ^ zobrist::piece_key(us, Piece::Rook, rook_from)
            ^ zobrist::piece_key(us, Piece::Rook, rook_to);
        self.pkhash ^= zobrist::pawn_king_key(us, Piece::King, from)
            ^ zobrist::pawn_king_key(us, Piece::King, to);
        self.psqt += psqt(us, Piece::King, to) - psqt(us, Piece::King, from)
            + psqt(us, Piece::Rook, rook_to)
            - psqt(us, Piece::Rook, rook_from);

        undo.deltas.push(NnueDelta {
            colour: us,
            piece: Piece::King,
            from: Some(from),
            to: Some(to),
        });
        undo.deltas.push(NnueDelta {
            colour: us,
            piece: Piece::Rook,
            from: Some(rook_from),
            to: Some(rook_to),
        });

        self.update_castle_rights(castling::RIGHTS_MASK[from.index()]);
        self.clear_ep();
    }

    fn apply_en_passant(&mut self, mv: Move, undo: &mut Undo) {
        let us = self.turn;
        let from = mv.from();
        let to = mv.to();
        let victim_sq = to.offset(-us.forward());

        self.fifty = 0;
        undo.captured = Some((!us, Piece::Pawn));

        self.remove_piece(us, Piece::Pawn, from);
        self.put_piece(us, Piece::Pawn, to);
        self.remove_piece(!us, Piece::Pawn, victim_sq);

        self.hash ^= zobrist::piece_key(us, Piece::Pawn, from)
            ^ zobrist::piece_key(us, Piece::Pawn, to)
            ^ zobrist::piece_key(!us, Piece::Pawn, victim_sq);
        self.pkhash ^= zobrist::pawn_king_key(us, Piece::Pawn, from)
            ^ zobrist::pawn_king_key(us, Piece::Pawn, to)
            ^ zobrist::pawn_king_key(!us, Piece::Pawn, victim_sq);
        self.mathash = self
            .mathash
            .wrapping_sub(zobrist::material_prime(!us, Piece::Pawn));
        self.psqt += psqt(us, Piece::Pawn, to)
            - psqt(us, Piece::Pawn, from)
            - psqt(!us, Piece::Pawn, victim_sq);

        undo.deltas.push(NnueDelta {
            colour: us,
            piece: Piece::Pawn,
            from: Some(from),
            to: Some(to),
        });
        undo.deltas.push(NnueDelta {
            colour: !us,
            piece: Piece::Pawn,
            from: Some(victim_sq),
            to: None,
        });

        self.clear_ep();
    }

    fn apply_promotion(&mut self, mv: Move, undo: &mut Undo) {
        let us = self.turn;
        let from = mv.from();
        let to = mv.to();
        let promo = mv.promoted();

        self.fifty = 0;

        if let Some((them, captured)) = self.squares[to.index()] {
            undo.captured = Some((them, captured));
            self.remove_piece(them, captured, to);
            self.hash ^= zobrist::piece_key(them, captured, to);
            self.mathash = self
                .mathash
                .wrapping_sub(zobrist::material_prime(them, captured));
            self.psqt -= psqt(them, captured, to);
            undo.deltas.push(NnueDelta {
                colour: them,
                piece: captured,
                from: Some(to),
                to: None,
            });
        }

        self.remove_piece(us, Piece::Pawn, from);
        self.put_piece(us, promo, to);

        self.hash ^= zobrist::piece_key(us, Piece::Pawn, from) ^ zobrist::piece_key(us, promo, to);
        self.pkhash ^= zobrist::pawn_king_key(us, Piece::Pawn, from);
        self.mathash = self
            .mathash
            .wrapping_sub(zobrist::material_prime(us, Piece::Pawn))
            .wrapping_add(zobrist::material_prime(us, promo));
        self.psqt += psqt(us, promo, to) - psqt(us, Piece::Pawn, from);

        undo.deltas.push(NnueDelta {
            colour: us,
            piece: Piece::Pawn,
            from: Some(from),
            to: None,
        });
        undo.deltas.push(NnueDelta {
            colour: us,
            piece: promo,
            from: None,
            to: Some(to),
        });

        self.update_castle_rights(castling::RIGHTS_MASK[to.index()]);
        self.clear_ep();
    }

    #[inline]
    fn update_castle_rights(&mut self, mask: u8) {
        self.hash ^= zobrist::castle_key(self.castle_rights);
        self.castle_rights &= mask;
        self.hash ^= zobrist::castle_key(self.castle_rights);
    }

    #[inline]
    fn clear_ep(&mut self) {
        if let Some(ep) = self.ep_square.take() {
            self.hash ^= zobrist::en_passant_key(ep.file());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(board: &Board) -> (u64, u64, u64, i32, u8, Option<Square>, u32, Bitboard) {
        (
            board.hash(),
            board.pkhash(),
            board.mathash(),
            board.psqt_score(),
            board.castle_rights(),
            board.ep_square(),
            board.fifty(),
            board.king_attackers(),
        )
    }

    fn involution_check(fen: &str) {
        let mut board: Board = fen.parse().unwrap();
        let before = fields(&board);
        let squares = board.squares;
        let legal = board.gen_legal();
        for &mv in legal.iter() {
            let undo = board.make_move(mv);
            board.unmake_move(mv, &undo);
            assert_eq!(fields(&board), before, "{mv} on {fen}");
            assert_eq!(board.squares, squares, "{mv} on {fen}");
        }
    }

    #[test]
    fn make_unmake_is_involution() {
        for fen in [
            super::super::state::START_FEN,
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
            "n1n5/PPPk4/8/8/8/8/4Kppp/5N1N b - - 0 1",
        ] {
            involution_check(fen);
        }
    }

    #[test]
    fn hash_matches_refresh_after_moves() {
        let mut board = Board::new();
        for text in ["e2e4", "c7c5", "g1f3", "d7d6", "f1b5", "c8d7", "e1g1"] {
            let mv = board.parse_uci_move(text).unwrap();
            board.make_move(mv);

            let mut fresh = board.clone();
            fresh.refresh_incremental();
            assert_eq!(board.hash(), fresh.hash(), "after {text}");
            assert_eq!(board.pkhash(), fresh.pkhash(), "after {text}");
            assert_eq!(board.mathash(), fresh.mathash(), "after {text}");
            assert_eq!(board.psqt_score(), fresh.psqt_score(), "after {text}");
        }
    }

    #[test]
    fn ep_square_only_when_capturable() {
        let mut board = Board::new();
        // 1. e4 with no black pawn able to take: no ep square
        let mv = board.parse_uci_move("e2e4").unwrap();
        board.make_move(mv);
        assert_eq!(board.ep_square(), None);

        // ... d5 then e5, then f5 creates a real target for exf6
        let mut board: Board = "rnbqkbnr/ppppp1pp/8/4P3/8/8/PPPP1PPP/RNBQKBNR b KQkq - 0 2"
            .parse()
            .unwrap();
        let mv = board.parse_uci_move("f7f5").unwrap();
        board.make_move(mv);
        assert_eq!(board.ep_square().map(|s| s.to_string()), Some("f6".into()));
    }

    #[test]
    fn castling_moves_both_pieces() {
        let mut board: Board = "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1".parse().unwrap();
        let mv = board.parse_uci_move("e1g1").unwrap();
        let undo = board.make_move(mv);
        assert_eq!(board.piece_at(Square::G1), Some((Color::White, Piece::King)));
        assert_eq!(board.piece_at(Square::F1), Some((Color::White, Piece::Rook)));
        assert_eq!(board.piece_at(Square::H1), None);
        assert_eq!(board.castle_rights() & 0b0011, 0);
        board.unmake_move(mv, &undo);
        assert_eq!(board.piece_at(Square::E1), Some((Color::White, Piece::King)));
        assert_eq!(board.piece_at(Square::H1), Some((Color::White, Piece::Rook)));
    }

    #[test]
    fn null_move_roundtrip() {
        let mut board: Board =
            "rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3"
                .parse()
                .unwrap();
        let before_hash = board.hash();
        let undo = board.make_null();
        assert_ne!(board.hash(), before_hash);
        assert_eq!(board.ep_square(), None);
        assert_eq!(board.turn(), Color::Black);
        board.unmake_null(&undo);
        assert_eq!(board.hash(), before_hash);
        assert_eq!(board.turn(), Color::White);
        assert!(board.ep_square().is_some());
    }

    #[test]
    fn fifty_counter_resets() {
        let mut board = Board::new();
        let mv = board.parse_uci_move("g1f3").unwrap();
        board.make_move(mv);
        assert_eq!(board.fifty(), 1);
        let mv = board.parse_uci_move("e7e5").unwrap();
        board.make_move(mv);
        assert_eq!(board.fifty(), 0);
    }
}
