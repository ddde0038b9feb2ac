//! Pseudo-legal move generation.
//!
//! Three entry points split the move set the way the search consumes
//! it: noisy (captures and promotions), quiet (pushes, piece moves,
//! castles), and everything. When the king is under a single attack,
//! generation is restricted to the attacker's square and the ray
//! between attacker and king; under a double attack only king moves
//! are produced. Moves may still leave the king exposed (pins,
//! king steps into cover) — the caller verifies legality after apply.

use super::attacks;
use super::state::Board;
use super::types::{castling, Bitboard, Color, Move, MoveKind, MoveList, Piece, Square};

impl Board {
    /// Captures, en-passant and promotions.
    pub fn gen_noisy(&self, list: &mut MoveList) {
        let us = self.turn;
        let friendly = self.colours[us.index()];
        let enemy = self.colours[(!us).index()];
        let occupied = friendly | enemy;
        let empty = !occupied;

        // Under a single check every non-king move must capture the
        // attacker or land on its ray; under a double check only the
        // king may move
        let restriction = match self.check_restriction() {
            Some(mask) => mask,
            None => {
                let king = self.king_square(us);
                for to in attacks::king_attacks(king) & enemy {
                    list.push(Move::new(king, to, MoveKind::Normal));
                }
                return;
            }
        };

        let capture_targets = enemy & restriction;
        let pawns = self.pieces_of(us, Piece::Pawn);
        let promo_rank = Bitboard::promo_rank(us);

        // Pawn captures, split by direction so the origin is a fixed
        // offset of the destination
        let (left, right, left_delta, right_delta) = match us {
            Color::White => (
                Bitboard((pawns.0 << 7) & !Bitboard::FILE_H.0),
                Bitboard((pawns.0 << 9) & !Bitboard::FILE_A.0),
                -7i8,
                -9i8,
            ),
            Color::Black => (
                Bitboard((pawns.0 >> 7) & !Bitboard::FILE_A.0),
                Bitboard((pawns.0 >> 9) & !Bitboard::FILE_H.0),
                7i8,
                9i8,
            ),
        };

        push_pawn_batch(list, left & capture_targets & !promo_rank, left_delta);
        push_pawn_batch(list, right & capture_targets & !promo_rank, right_delta);
        push_promo_batch(list, left & capture_targets & promo_rank, left_delta);
        push_promo_batch(list, right & capture_targets & promo_rank, right_delta);

        // Forward promotions land on empty squares but count as noisy
        let forward_promos = pawns.forward(us) & empty & promo_rank & restriction;
        push_promo_batch(list, forward_promos, -us.forward());

        self.gen_en_passant(list);

        for from in self.pieces_of(us, Piece::Knight) {
            for to in attacks::knight_attacks(from) & capture_targets {
                list.push(Move::new(from, to, MoveKind::Normal));
            }
        }
        for from in self.pieces_of(us, Piece::Bishop) | self.pieces_of(us, Piece::Queen) {
            for to in attacks::bishop_attacks(from, occupied) & capture_targets {
                list.push(Move::new(from, to, MoveKind::Normal));
            }
        }
        for from in self.pieces_of(us, Piece::Rook) | self.pieces_of(us, Piece::Queen) {
            for to in attacks::rook_attacks(from, occupied) & capture_targets {
                list.push(Move::new(from, to, MoveKind::Normal));
            }
        }

        let king = self.king_square(us);
        for to in attacks::king_attacks(king) & enemy {
            list.push(Move::new(king, to, MoveKind::Normal));
        }
    }

    /// `Some(mask)` of allowed non-king destinations, or `None` under
    /// double check.
    fn check_restriction(&self) -> Option<Bitboard> {
        if self.king_attackers.is_empty() {
            Some(Bitboard::ALL)
        } else if self.king_attackers.is_single() {
            let king = self.king_square(self.turn);
            Some(self.king_attackers | attacks::between(self.king_attackers.lsb(), king))
        } else {
            None
        }
    }

    /// Non-captures: pawn pushes, piece moves to empty squares,
    /// castling.
    pub fn gen_quiet(&self, list: &mut MoveList) {
        let us = self.turn;
        let friendly = self.colours[us.index()];
        let enemy = self.colours[(!us).index()];
        let occupied = friendly | enemy;
        let empty = !occupied;

        let targets = match self.check_restriction() {
            Some(mask) => empty & mask,
            None => {
                let king = self.king_square(us);
                for to in attacks::king_attacks(king) & empty {
                    list.push(Move::new(king, to, MoveKind::Normal));
                }
                return;
            }
        };

        let pawns = self.pieces_of(us, Piece::Pawn);
        let promo_rank = Bitboard::promo_rank(us);
        let third = match us {
            Color::White => Bitboard::RANK_3,
            Color::Black => Bitboard::RANK_6,
        };

        let single = pawns.forward(us) & empty & !promo_rank;
        let double = (single & third).forward(us) & empty;
        push_pawn_batch(list, single & targets, -us.forward());
        push_pawn_batch(list, double & targets, -2 * us.forward());

        for from in self.pieces_of(us, Piece::Knight) {
            for to in attacks::knight_attacks(from) & targets {
                list.push(Move::new(from, to, MoveKind::Normal));
            }
        }
        for from in self.pieces_of(us, Piece::Bishop) | self.pieces_of(us, Piece::Queen) {
            for to in attacks::bishop_attacks(from, occupied) & targets {
                list.push(Move::new(from, to, MoveKind::Normal));
            }
        }
        for from in self.pieces_of(us, Piece::Rook) | self.pieces_of(us, Piece::Queen) {
            for to in attacks::rook_attacks(from, occupied) & targets {
                list.push(Move::new(from, to, MoveKind::Normal));
            }
        }

        let king = self.king_square(us);
        for to in attacks::king_attacks(king) & empty {
            list.push(Move::new(king, to, MoveKind::Normal));
        }

        if self.king_attackers.is_empty() {
            self.gen_castles(list);
        }
    }

    /// All pseudo-legal moves.
    pub fn gen_all(&self, list: &mut MoveList) {
        self.gen_noisy(list);
        self.gen_quiet(list);
    }

    /// Fully legal moves, verified by apply/revert. Used by perft, the
    /// UCI move parser and mate detection, not the inner search.
    #[must_use]
    pub fn gen_legal(&mut self) -> MoveList {
        let mut pseudo = MoveList::new();
        self.gen_all(&mut pseudo);

        let mut legal = MoveList::new();
        for &mv in pseudo.iter() {
            let undo = self.make_move(mv);
            if self.was_legal() {
                legal.push(mv);
            }
            self.unmake_move(mv, &undo);
        }
        legal
    }

    fn gen_en_passant(&self, list: &mut MoveList) {
        let Some(ep) = self.ep_square else { return };
        let us = self.turn;
        // Pawns that could capture onto the ep square
        let candidates = attacks::pawn_attacks(!us, ep) & self.pieces_of(us, Piece::Pawn);
        for from in candidates {
            list.push(Move::new(from, ep, MoveKind::EnPassant));
        }
    }

    fn gen_castles(&self, list: &mut MoveList) {
        let us = self.turn;
        let occupied = self.occupied();
        let (king_from, rights_k, rights_q, k_path, q_path, k_cross, q_cross, k_to, q_to) =
            match us {
                Color::White => (
                    Square::E1,
                    castling::kingside_right(us),
                    castling::queenside_right(us),
                    Bitboard(0x60),             // f1, g1
                    Bitboard(0x0E),             // b1, c1, d1
                    Square::F1,
                    Square::D1,
                    Square::G1,
                    Square::C1,
                ),
                Color::Black => (
                    Square::E8,
                    castling::kingside_right(us),
                    castling::queenside_right(us),
                    Bitboard(0x6000_0000_0000_0000),
                    Bitboard(0x0E00_0000_0000_0000),
                    Square::F8,
                    Square::D8,
                    Square::G8,
                    Square::C8,
                ),
            };

        // Rights imply the king and rook have not moved. The crossed
        // square must be safe; the arrival square is checked after
        // apply like any other king move.
        if self.castle_rights & rights_k != 0
            && (occupied & k_path).is_empty()
            && !self.is_attacked(k_cross, !us)
        {
            list.push(Move::new(king_from, k_to, MoveKind::Castle));
        }
        if self.castle_rights & rights_q != 0
            && (occupied & q_path).is_empty()
            && !self.is_attacked(q_cross, !us)
        {
            list.push(Move::new(king_from, q_to, MoveKind::Castle));
        }
    }

    /// Would `mv` be produced by the generator in this position? Moves
    /// pulled from the transposition table or the killer/counter slots
    /// are validated with this before being tried.
    #[must_use]
    pub fn is_pseudo_legal(&self, mv: Move) -> bool {
        if mv.is_none() {
            return false;
        }
        let us = self.turn;
        let from = mv.from();
        let to = mv.to();

        let Some((colour, piece)) = self.piece_at(from) else {
            return false;
        };
        if colour != us {
            return false;
        }

        match mv.kind() {
            MoveKind::Castle => {
                let mut castles = MoveList::new();
                if self.king_attackers.is_empty() {
                    self.gen_castles(&mut castles);
                }
                castles.contains(mv)
            }
            MoveKind::EnPassant => {
                piece == Piece::Pawn
                    && self.ep_square == Some(to)
                    && attacks::pawn_attacks(us, from).contains(to)
            }
            MoveKind::Promotion => {
                piece == Piece::Pawn
                    && Bitboard::promo_rank(us).contains(to)
                    && self.pawn_reaches(from, to)
                    && self.evasion_allows(to)
            }
            MoveKind::Normal => {
                if self.colours[us.index()].contains(to) {
                    return false;
                }
                let reachable = match piece {
                    Piece::Pawn => {
                        return !Bitboard::promo_rank(us).contains(to)
                            && self.pawn_reaches(from, to)
                            && self.evasion_allows(to);
                    }
                    Piece::Knight => attacks::knight_attacks(from),
                    Piece::Bishop => attacks::bishop_attacks(from, self.occupied()),
                    Piece::Rook => attacks::rook_attacks(from, self.occupied()),
                    Piece::Queen => attacks::queen_attacks(from, self.occupied()),
                    Piece::King => attacks::king_attacks(from),
                };
                reachable.contains(to) && (piece == Piece::King || self.evasion_allows(to))
            }
        }
    }

    /// Single pawn step, double step, or capture, consistent with the
    /// occupancy. Promotion-rank handling is the caller's concern.
    fn pawn_reaches(&self, from: Square, to: Square) -> bool {
        let us = self.turn;
        let forward = us.forward() as i32;
        let diff = to.index() as i32 - from.index() as i32;
        let empty = !self.occupied();

        if diff == forward {
            return empty.contains(to);
        }
        if diff == 2 * forward {
            let start_rank = match us {
                Color::White => 1,
                Color::Black => 6,
            };
            return from.rank() == start_rank
                && empty.contains(from.offset(us.forward()))
                && empty.contains(to);
        }
        attacks::pawn_attacks(us, from).contains(to)
            && self.colours[(!us).index()].contains(to)
    }

    /// Under check, non-king moves must land on the checker or block
    /// the ray; under double check nothing but the king may move.
    fn evasion_allows(&self, to: Square) -> bool {
        if self.king_attackers.is_empty() {
            return true;
        }
        if !self.king_attackers.is_single() {
            return false;
        }
        let king = self.king_square(self.turn);
        (self.king_attackers | attacks::between(self.king_attackers.lsb(), king)).contains(to)
    }
}

#[inline]
fn push_pawn_batch(list: &mut MoveList, destinations: Bitboard, delta: i8) {
    for to in destinations {
        list.push(Move::new(to.offset(delta), to, MoveKind::Normal));
    }
}

#[inline]
fn push_promo_batch(list: &mut MoveList, destinations: Bitboard, delta: i8) {
    for to in destinations {
        let from = to.offset(delta);
        list.push(Move::promotion(from, to, Piece::Queen));
        list.push(Move::promotion(from, to, Piece::Rook));
        list.push(Move::promotion(from, to, Piece::Bishop));
        list.push(Move::promotion(from, to, Piece::Knight));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_position_counts() {
        let mut board = Board::new();
        let legal = board.gen_legal();
        assert_eq!(legal.len(), 20);

        let mut noisy = MoveList::new();
        board.gen_noisy(&mut noisy);
        assert!(noisy.is_empty());
    }

    #[test]
    fn evasions_are_restricted() {
        // White king checked by a rook on e8; the b2 knight reaches no
        // blocking square, so only the four king steps survive
        let mut board: Board = "4r2k/8/8/8/8/8/1N6/4K3 w - - 0 1".parse().unwrap();
        assert!(board.in_check());
        let legal = board.gen_legal();
        assert_eq!(legal.len(), 4);
        for mv in legal.iter() {
            assert_eq!(board.piece_at(mv.from()).unwrap().1, Piece::King);
        }
    }

    #[test]
    fn double_check_king_only() {
        let mut board: Board = "4r2k/8/8/8/8/2b5/8/4K3 w - - 0 1".parse().unwrap();
        assert_eq!(board.king_attackers().popcount(), 2);
        let legal = board.gen_legal();
        for mv in legal.iter() {
            assert_eq!(board.piece_at(mv.from()).unwrap().1, Piece::King);
        }
    }

    #[test]
    fn castle_blocked_and_through_check() {
        // The f8 rook covers f1, so only the queenside castle remains
        let board: Board = "4kr2/8/8/8/8/8/8/R3K2R w KQ - 0 1".parse().unwrap();
        let mut list = MoveList::new();
        board.gen_quiet(&mut list);
        let castles: Vec<&Move> = list.iter().filter(|m| m.is_castle()).collect();
        assert_eq!(castles.len(), 1);
        assert_eq!(castles[0].to(), Square::C1);
    }

    #[test]
    fn en_passant_generated() {
        let board: Board =
            "rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3"
                .parse()
                .unwrap();
        let mut list = MoveList::new();
        board.gen_noisy(&mut list);
        let eps: Vec<&Move> = list.iter().filter(|m| m.is_en_passant()).collect();
        assert_eq!(eps.len(), 1);
        assert_eq!(eps[0].to().to_string(), "f6");
    }

    #[test]
    fn pseudo_legal_matches_generation() {
        let boards = [
            Board::new(),
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1"
                .parse()
                .unwrap(),
            "4r2k/8/8/8/8/8/4N3/4K3 w - - 0 1".parse().unwrap(),
        ];
        for board in boards {
            let mut list = MoveList::new();
            board.gen_all(&mut list);
            for mv in list.iter() {
                assert!(board.is_pseudo_legal(*mv), "{mv} in {}", board.to_fen());
            }
            // A move for the wrong side is rejected
            assert!(!board.is_pseudo_legal(Move::new(
                Square::new(0, 7),
                Square::new(0, 5),
                MoveKind::Normal
            )) || board.piece_at(Square::new(0, 7)).map(|(c, _)| c) == Some(board.turn()));
        }
    }
}
