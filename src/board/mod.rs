//! Bitboard position: representation, attack tables, move generation,
//! make/unmake, exchange evaluation and perft.

pub mod attacks;
mod error;
mod fen;
mod make_unmake;
pub mod masks;
mod movegen;
mod perft;
mod see;
mod state;
pub mod types;
pub mod zobrist;

pub use error::{FenError, MoveParseError, SquareParseError};
pub use see::SEE_VALUES;
pub use state::{Board, DeltaList, NnueDelta, NullUndo, Undo, START_FEN};
