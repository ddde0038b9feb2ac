//! Search behaviour: mates, draws, table round-trips, determinism and
//! stop responsiveness.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use proptest::prelude::*;

use sable::board::types::{Move, MoveKind, Square};
use sable::board::Board;
use sable::search::params::{MATE, MATE_IN_MAX};
use sable::search::smp::SearchPool;
use sable::search::time::Limits;
use sable::tt::{Bound, TranspositionTable};

fn search_fen(fen: &str, depth: i32) -> sable::search::SearchResult {
    let board: Board = fen.parse().unwrap();
    let pool = SearchPool::new(16, 1);
    let stop = Arc::new(AtomicBool::new(false));
    pool.search(&board, &Limits::depth(depth), stop, None)
}

#[test]
fn mates_with_the_rook_ladder() {
    // Two rooks deliver mate in two from scratch
    let result = search_fen("7k/8/8/8/8/8/R7/1R5K w - - 0 1", 6);
    assert!(result.value >= MATE_IN_MAX, "score {}", result.value);
    assert_eq!(result.value, MATE - 3, "mate in two is three plies");
}

#[test]
fn mate_score_has_the_mating_move() {
    let result = search_fen("7k/5ppp/8/8/8/8/5PPP/R6K w - - 0 1", 4);
    assert_eq!(result.best_move.to_string(), "a1a8");
    assert!(result.value >= MATE_IN_MAX);
}

#[test]
fn stalemate_is_a_draw_at_depth_one() {
    let result = search_fen("7k/8/6Q1/8/8/8/8/7K b - - 0 1", 1);
    assert_eq!(result.value, 0);
}

#[test]
fn wins_the_queen_with_a_fork() {
    // Nc7+ forks king and queen
    let result = search_fen("q3k3/8/8/3N4/8/8/8/7K w - - 0 1", 6);
    assert_eq!(result.best_move.to_string(), "d5c7");
    assert!(result.value > 250, "score {}", result.value);
}

#[test]
fn single_thread_search_is_reproducible() {
    let fen = "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10";
    let a = search_fen(fen, 6);
    let b = search_fen(fen, 6);
    assert_eq!(a.best_move, b.best_move);
    assert_eq!(a.value, b.value);
    assert_eq!(a.nodes, b.nodes);
}

#[test]
fn stop_is_honoured_quickly() {
    let board = Board::new();
    let pool = Arc::new(SearchPool::new(16, 1));
    let stop = Arc::new(AtomicBool::new(false));

    let handle = {
        let pool = Arc::clone(&pool);
        let stop = Arc::clone(&stop);
        let board = board.clone();
        std::thread::spawn(move || {
            pool.search(
                &board,
                &Limits {
                    infinite: true,
                    ..Limits::default()
                },
                stop,
                None,
            )
        })
    };

    // Let it dig in, then pull the plug
    std::thread::sleep(Duration::from_millis(200));
    let asked = Instant::now();
    stop.store(true, Ordering::Relaxed);

    let result = handle.join().expect("search thread exits");
    assert!(
        asked.elapsed() < Duration::from_millis(100),
        "stop took {:?}",
        asked.elapsed()
    );
    assert!(!result.best_move.is_none());
}

#[test]
fn deeper_search_never_misses_the_shallow_mate() {
    for depth in 2..=8 {
        let result = search_fen("7k/5ppp/8/8/8/8/5PPP/R6K w - - 0 1", depth);
        assert!(result.value >= MATE_IN_MAX, "depth {depth}");
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Any value/depth/bound combination survives a store-probe trip
    /// while the signature is unmolested.
    #[test]
    fn tt_roundtrip(
        hash in any::<u64>(),
        raw_move in any::<u16>(),
        value in -MATE..=MATE,
        depth in 0i32..127,
        bound_choice in 0u8..3,
    ) {
        let tt = TranspositionTable::new(1);
        let bound = match bound_choice {
            0 => Bound::Upper,
            1 => Bound::Lower,
            _ => Bound::Exact,
        };
        let mv = Move::from_u16(raw_move);

        tt.store(hash, mv, value, depth, bound);
        let hit = tt.probe(hash).expect("fresh store must hit");
        prop_assert_eq!(hit.mv, mv);
        prop_assert_eq!(hit.value, value);
        prop_assert_eq!(hit.depth, depth);
        prop_assert_eq!(hit.bound, bound);
    }
}

#[test]
fn tt_move_ordering_survives_new_search() {
    // A stored best move is replayed first on the next visit
    let tt = TranspositionTable::new(1);
    let mv = Move::new(Square::new(4, 1), Square::new(4, 3), MoveKind::Normal);
    tt.store(0xFEED_0000_0000_0000, mv, 50, 10, Bound::Exact);
    tt.bump_generation();
    let hit = tt.probe(0xFEED_0000_0000_0000).expect("entry survives aging");
    assert_eq!(hit.mv, mv);
}
