//! Network weights and the forward pass.
//!
//! HalfKP input encoding: one feature per (own-king square, piece
//! square, piece kind and side) triple, kings excluded, squares taken
//! relative to the perspective colour. The transformer maps the 40960
//! features onto 256 neurons per perspective; two 512-to-32 and
//! 32-to-32 affine+ReLU layers and a scalar head produce centipawns.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::board::types::{Color, Piece, Square};
use crate::board::Board;

use super::simd;
use super::Accumulator;

/// Feature-transformer width per perspective.
pub const KP_SIZE: usize = 256;
/// Input features: 64 king squares by 640 piece planes.
pub const INPUTS: usize = 40_960;
/// Concatenated perspectives feeding the first hidden layer.
pub const HIDDEN1: usize = 2 * KP_SIZE;
/// Width of both hidden layers.
pub const HIDDEN2: usize = 32;

struct Layer {
    rows: usize,
    cols: usize,
    weights: Vec<f32>,
    biases: Vec<f32>,
}

impl Layer {
    fn read_from(reader: &mut impl Read, rows: usize, cols: usize) -> std::io::Result<Layer> {
        let mut biases = vec![0f32; cols];
        read_f32s(reader, &mut biases)?;
        let mut weights = vec![0f32; rows * cols];
        read_f32s(reader, &mut weights)?;
        Ok(Layer {
            rows,
            cols,
            weights,
            biases,
        })
    }

    /// Swap [in][out] row-major into [out][in] so each output neuron
    /// owns a contiguous weight row.
    fn transpose(&mut self) {
        let mut swapped = vec![0f32; self.weights.len()];
        for i in 0..self.rows {
            for j in 0..self.cols {
                swapped[j * self.rows + i] = self.weights[i * self.cols + j];
            }
        }
        self.weights = swapped;
    }
}

fn read_f32s(reader: &mut impl Read, out: &mut [f32]) -> std::io::Result<()> {
    let mut buf = [0u8; 4];
    for slot in out {
        reader.read_exact(&mut buf)?;
        *slot = f32::from_le_bytes(buf);
    }
    Ok(())
}

/// A loaded network. Immutable once constructed; shared by all search
/// threads.
pub struct Network {
    transformer: Layer,
    hidden1: Layer,
    hidden2: Layer,
    output: Layer,
}

impl Network {
    /// Read a weight file: for each layer, biases then weights as
    /// little-endian `f32`. The middle layers are stored input-major
    /// and are transposed after loading.
    pub fn load<P: AsRef<Path>>(path: P) -> std::io::Result<Network> {
        let file = File::open(path.as_ref())?;
        let mut reader = BufReader::new(file);

        let transformer = Layer::read_from(&mut reader, INPUTS, KP_SIZE)?;
        let mut hidden1 = Layer::read_from(&mut reader, HIDDEN1, HIDDEN2)?;
        let mut hidden2 = Layer::read_from(&mut reader, HIDDEN2, HIDDEN2)?;
        let output = Layer::read_from(&mut reader, HIDDEN2, 1)?;

        hidden1.transpose();
        hidden2.transpose();

        log::info!("loaded NNUE network from {}", path.as_ref().display());

        Ok(Network {
            transformer,
            hidden1,
            hidden2,
            output,
        })
    }

    /// The transformer weight row for one input feature.
    #[inline]
    pub(super) fn feature_row(&self, feature: usize) -> &[f32] {
        &self.transformer.weights[feature * KP_SIZE..(feature + 1) * KP_SIZE]
    }

    #[inline]
    pub(super) fn feature_biases(&self) -> &[f32] {
        &self.transformer.biases
    }

    /// Forward pass over an up-to-date accumulator, side to move's
    /// point of view, in centipawns.
    #[must_use]
    pub fn evaluate(&self, accumulator: &Accumulator, turn: Color) -> i32 {
        let mut concat = [0f32; HIDDEN1];
        let (us, them) = match turn {
            Color::White => (0, 1),
            Color::Black => (1, 0),
        };
        simd::relu_into(&accumulator.values[us], &mut concat[..KP_SIZE]);
        simd::relu_into(&accumulator.values[them], &mut concat[KP_SIZE..]);

        let mut h1 = [0f32; HIDDEN2];
        self.affine_relu(&self.hidden1, &concat, &mut h1);

        let mut h2 = [0f32; HIDDEN2];
        self.affine_relu(&self.hidden2, &h1, &mut h2);

        let value = simd::dot(&self.output.weights, &h2) + self.output.biases[0];
        value as i32
    }

    fn affine_relu(&self, layer: &Layer, input: &[f32], out: &mut [f32]) {
        for (o, slot) in out.iter_mut().enumerate() {
            let row = &layer.weights[o * layer.rows..(o + 1) * layer.rows];
            *slot = (simd::dot(row, input) + layer.biases[o]).max(0.0);
        }
    }

    /// Build a network with given constant fill values, for tests.
    #[cfg(test)]
    pub(crate) fn stub(weight: f32, bias: f32) -> Network {
        let layer = |rows: usize, cols: usize| Layer {
            rows,
            cols,
            weights: vec![weight; rows * cols],
            biases: vec![bias; cols],
        };
        Network {
            transformer: layer(INPUTS, KP_SIZE),
            hidden1: layer(HIDDEN1, HIDDEN2),
            hidden2: layer(HIDDEN2, HIDDEN2),
            output: layer(HIDDEN2, 1),
        }
    }
}

/// Feature index of `piece` of `piece_colour` on `sq`, viewed by
/// `perspective` whose king stands on `relative king square`.
#[inline]
#[must_use]
pub fn feature_index(
    perspective: Color,
    rel_king_sq: usize,
    piece_colour: Color,
    piece: Piece,
    sq: Square,
) -> usize {
    debug_assert!(piece != Piece::King);
    let rel_sq = sq.relative(perspective).index();
    let own = usize::from(piece_colour == perspective);
    640 * rel_king_sq + 64 * (5 * own + piece.index()) + rel_sq
}

/// Collect the active features of `board` for one perspective.
pub(super) fn active_features(board: &Board, perspective: Color, out: &mut Vec<usize>) {
    out.clear();
    let king_sq = board.king_square(perspective).relative(perspective).index();
    let kings = board.piece_bb(Piece::King);
    for sq in board.occupied() & !kings {
        let (colour, piece) = board.piece_at(sq).expect("occupied square");
        out.push(feature_index(perspective, king_sq, colour, piece, sq));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_index_bounds() {
        for idx in 0..64 {
            let sq = Square::from_index(idx);
            for piece in [Piece::Pawn, Piece::Knight, Piece::Bishop, Piece::Rook, Piece::Queen] {
                for perspective in Color::BOTH {
                    for owner in Color::BOTH {
                        let f = feature_index(perspective, 12, owner, piece, sq);
                        assert!(f < INPUTS);
                    }
                }
            }
        }
    }

    #[test]
    fn own_and_enemy_planes_differ() {
        let sq = Square::new(3, 3);
        let own = feature_index(Color::White, 4, Color::White, Piece::Knight, sq);
        let enemy = feature_index(Color::White, 4, Color::Black, Piece::Knight, sq);
        assert_ne!(own, enemy);
        assert_eq!(own - enemy, 5 * 64);
    }

    #[test]
    fn startpos_has_thirty_features() {
        let board = Board::new();
        let mut features = Vec::new();
        active_features(&board, Color::White, &mut features);
        // 32 pieces minus the two kings
        assert_eq!(features.len(), 30);
        for &f in &features {
            assert!(f < INPUTS);
        }
    }
}
