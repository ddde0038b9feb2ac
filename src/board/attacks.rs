//! Precomputed attack tables.
//!
//! Leaper attacks (knight, king, pawn) are direct lookups. Sliding
//! attacks use magic multiply-shift indexing into flat per-square
//! tables: the relevant occupancy is masked, multiplied by a per-square
//! magic, and shifted down to index the precomputed attack sets.
//!
//! The magic numbers themselves are found once at startup by a seeded
//! random search over sparse candidates, verified perfect against every
//! blocker subset of the mask. Initialization is deterministic.

use once_cell::sync::Lazy;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use super::types::{Bitboard, Color, Square};

const ROOK_DIRS: [(i8, i8); 4] = [(0, 1), (0, -1), (1, 0), (-1, 0)];
const BISHOP_DIRS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];

pub static KNIGHT_ATTACKS: Lazy<[u64; 64]> = Lazy::new(|| {
    leaper_table(&[
        (2, 1),
        (1, 2),
        (-1, 2),
        (-2, 1),
        (-2, -1),
        (-1, -2),
        (1, -2),
        (2, -1),
    ])
});

pub static KING_ATTACKS: Lazy<[u64; 64]> = Lazy::new(|| {
    leaper_table(&[
        (1, 0),
        (-1, 0),
        (0, 1),
        (0, -1),
        (1, 1),
        (1, -1),
        (-1, 1),
        (-1, -1),
    ])
});

/// `PAWN_ATTACKS[colour][sq]`: squares a pawn of `colour` on `sq`
/// attacks.
pub static PAWN_ATTACKS: Lazy<[[u64; 64]; 2]> = Lazy::new(|| {
    let mut table = [[0u64; 64]; 2];
    for sq in 0..64 {
        let bb = Bitboard(1u64 << sq);
        table[0][sq] = bb.pawn_attacks(Color::White).0;
        table[1][sq] = bb.pawn_attacks(Color::Black).0;
    }
    table
});

/// Squares strictly between two squares sharing a rank, file or
/// diagonal; empty otherwise. Drives evasion generation.
pub static BETWEEN: Lazy<Box<[[u64; 64]; 64]>> = Lazy::new(|| {
    let mut table = Box::new([[0u64; 64]; 64]);
    for a in 0..64usize {
        for &(dr, df) in ROOK_DIRS.iter().chain(BISHOP_DIRS.iter()) {
            let mut ray = 0u64;
            let mut r = (a / 8) as i8 + dr;
            let mut f = (a % 8) as i8 + df;
            while (0..8).contains(&r) && (0..8).contains(&f) {
                let b = (r * 8 + f) as usize;
                table[a][b] = ray;
                ray |= 1u64 << b;
                r += dr;
                f += df;
            }
        }
    }
    table
});

fn leaper_table(deltas: &[(i8, i8)]) -> [u64; 64] {
    let mut table = [0u64; 64];
    for (sq, slot) in table.iter_mut().enumerate() {
        let r = (sq / 8) as i8;
        let f = (sq % 8) as i8;
        for &(dr, df) in deltas {
            let (nr, nf) = (r + dr, f + df);
            if (0..8).contains(&nr) && (0..8).contains(&nf) {
                *slot |= 1u64 << (nr * 8 + nf);
            }
        }
    }
    table
}

/// Relevant occupancy mask: the ray squares excluding board edges.
fn slider_mask(sq: usize, dirs: &[(i8, i8); 4]) -> u64 {
    let mut mask = 0u64;
    for &(dr, df) in dirs {
        let mut r = (sq / 8) as i8 + dr;
        let mut f = (sq % 8) as i8 + df;
        while (0..8).contains(&(r + dr)) && (0..8).contains(&(f + df)) {
            mask |= 1u64 << (r * 8 + f);
            r += dr;
            f += df;
        }
    }
    mask
}

/// Slow ray-walk attacks, used to seed the tables and by tests.
fn slider_attacks_slow(sq: usize, occupied: u64, dirs: &[(i8, i8); 4]) -> u64 {
    let mut attacks = 0u64;
    for &(dr, df) in dirs {
        let mut r = (sq / 8) as i8 + dr;
        let mut f = (sq % 8) as i8 + df;
        while (0..8).contains(&r) && (0..8).contains(&f) {
            let bit = 1u64 << (r * 8 + f);
            attacks |= bit;
            if occupied & bit != 0 {
                break;
            }
            r += dr;
            f += df;
        }
    }
    attacks
}

/// The `index`-th subset of the set bits of `mask`.
fn occupancy_subset(index: usize, mask: u64) -> u64 {
    let mut occ = 0u64;
    let mut rest = mask;
    let mut i = 0;
    while rest != 0 {
        let bit = rest & rest.wrapping_neg();
        rest &= rest - 1;
        if index & (1 << i) != 0 {
            occ |= bit;
        }
        i += 1;
    }
    occ
}

pub struct MagicTable {
    masks: [u64; 64],
    magics: [u64; 64],
    shifts: [u32; 64],
    offsets: [usize; 64],
    attacks: Vec<u64>,
}

impl MagicTable {
    fn build(dirs: &[(i8, i8); 4], seed: u64) -> Self {
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut table = MagicTable {
            masks: [0; 64],
            magics: [0; 64],
            shifts: [0; 64],
            offsets: [0; 64],
            attacks: Vec::new(),
        };

        for sq in 0..64 {
            let mask = slider_mask(sq, dirs);
            let bits = mask.count_ones();
            let size = 1usize << bits;
            let shift = 64 - bits;

            let reference: Vec<u64> = (0..size)
                .map(|i| slider_attacks_slow(sq, occupancy_subset(i, mask), dirs))
                .collect();

            // Sparse candidates converge quickly; verify each one is a
            // perfect (possibly constructive-collision) mapping
            let mut scratch = vec![0u64; size];
            let magic = loop {
                let candidate: u64 = rng.gen::<u64>() & rng.gen::<u64>() & rng.gen::<u64>();
                if (mask.wrapping_mul(candidate) >> 56).count_ones() < 6 {
                    continue;
                }
                scratch.iter_mut().for_each(|v| *v = 0);
                let mut ok = true;
                for i in 0..size {
                    let occ = occupancy_subset(i, mask);
                    let idx = (occ.wrapping_mul(candidate) >> shift) as usize;
                    if scratch[idx] == 0 {
                        scratch[idx] = reference[i];
                    } else if scratch[idx] != reference[i] {
                        ok = false;
                        break;
                    }
                }
                if ok {
                    break candidate;
                }
            };

            table.masks[sq] = mask;
            table.magics[sq] = magic;
            table.shifts[sq] = shift;
            table.offsets[sq] = table.attacks.len();
            table.attacks.extend_from_slice(&scratch);
        }

        table
    }

    #[inline]
    fn lookup(&self, sq: usize, occupied: u64) -> u64 {
        let masked = occupied & self.masks[sq];
        let idx = (masked.wrapping_mul(self.magics[sq]) >> self.shifts[sq]) as usize;
        self.attacks[self.offsets[sq] + idx]
    }
}

static ROOK_TABLE: Lazy<MagicTable> = Lazy::new(|| MagicTable::build(&ROOK_DIRS, 0x5eed_0001));
static BISHOP_TABLE: Lazy<MagicTable> = Lazy::new(|| MagicTable::build(&BISHOP_DIRS, 0x5eed_0002));

/// Force table construction before the search threads spawn.
pub fn init() {
    Lazy::force(&ROOK_TABLE);
    Lazy::force(&BISHOP_TABLE);
    Lazy::force(&KNIGHT_ATTACKS);
    Lazy::force(&KING_ATTACKS);
    Lazy::force(&PAWN_ATTACKS);
    Lazy::force(&BETWEEN);
}

#[inline]
#[must_use]
pub fn knight_attacks(sq: Square) -> Bitboard {
    Bitboard(KNIGHT_ATTACKS[sq.index()])
}

#[inline]
#[must_use]
pub fn king_attacks(sq: Square) -> Bitboard {
    Bitboard(KING_ATTACKS[sq.index()])
}

#[inline]
#[must_use]
pub fn pawn_attacks(colour: Color, sq: Square) -> Bitboard {
    Bitboard(PAWN_ATTACKS[colour.index()][sq.index()])
}

#[inline]
#[must_use]
pub fn rook_attacks(sq: Square, occupied: Bitboard) -> Bitboard {
    Bitboard(ROOK_TABLE.lookup(sq.index(), occupied.0))
}

#[inline]
#[must_use]
pub fn bishop_attacks(sq: Square, occupied: Bitboard) -> Bitboard {
    Bitboard(BISHOP_TABLE.lookup(sq.index(), occupied.0))
}

#[inline]
#[must_use]
pub fn queen_attacks(sq: Square, occupied: Bitboard) -> Bitboard {
    rook_attacks(sq, occupied) | bishop_attacks(sq, occupied)
}

#[inline]
#[must_use]
pub fn between(a: Square, b: Square) -> Bitboard {
    Bitboard(BETWEEN[a.index()][b.index()])
}
