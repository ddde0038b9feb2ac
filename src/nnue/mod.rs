//! NNUE evaluation: a HalfKP feature transformer feeding a small
//! fully-connected network, with per-ply incrementally updated
//! accumulators.

mod accumulator;
mod network;
pub mod simd;

pub use accumulator::{Accumulator, AccumulatorStack};
pub use network::{Network, HIDDEN1, HIDDEN2, INPUTS, KP_SIZE};
