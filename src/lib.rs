//! Sable: a UCI chess engine.
//!
//! Bitboard position with incremental hashing, staged move ordering,
//! principal-variation search over a shared lock-free transposition
//! table, hand-crafted and NNUE evaluation, and Lazy-SMP parallelism.

pub mod board;
pub mod eval;
pub mod nnue;
pub mod search;
pub mod tt;
pub mod uci;
