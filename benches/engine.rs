//! Criterion benchmarks: perft, evaluation, and a fixed-depth search.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use sable::board::Board;
use sable::eval::{evaluate, EvalCaches};
use sable::search::smp::SearchPool;
use sable::search::time::Limits;

const MIDGAME: &str = "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10";

fn perft_bench(c: &mut Criterion) {
    c.bench_function("perft 4 startpos", |b| {
        let mut board = Board::new();
        b.iter(|| black_box(board.perft(4)));
    });
}

fn evaluate_bench(c: &mut Criterion) {
    c.bench_function("evaluate midgame", |b| {
        let board: Board = MIDGAME.parse().unwrap();
        let mut caches = EvalCaches::new();
        b.iter(|| black_box(evaluate(&board, &mut caches)));
    });
}

fn search_bench(c: &mut Criterion) {
    c.bench_function("search depth 8 midgame", |b| {
        let board: Board = MIDGAME.parse().unwrap();
        b.iter(|| {
            let pool = SearchPool::new(16, 1);
            let stop = Arc::new(AtomicBool::new(false));
            black_box(pool.search(&board, &Limits::depth(8), stop, None))
        });
    });
}

criterion_group!(benches, perft_bench, evaluate_bench, search_bench);
criterion_main!(benches);
