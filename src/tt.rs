//! Shared transposition table.
//!
//! Buckets of four slots, 32 bytes per bucket. Each slot packs its
//! whole payload — 16-bit hash signature, move, value, depth and
//! generation-plus-bound — into one 64-bit word held in a relaxed
//! atomic, so slots can be read and written by every search thread
//! with no locking. A racing write simply leaves a word whose
//! signature fails the next probe.
//!
//! Replacement prefers a matching signature, then an empty slot, then
//! the slot minimizing `depth - 8 * age`, where age counts generations
//! since the entry was written. The generation advances once per
//! search; the low two bits of the generation byte carry the bound.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::board::types::Move;

/// Score bound stored with an entry.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Bound {
    Upper = 1,
    Lower = 2,
    Exact = 3,
}

impl Bound {
    #[inline]
    fn from_bits(bits: u8) -> Option<Bound> {
        match bits & 0x3 {
            1 => Some(Bound::Upper),
            2 => Some(Bound::Lower),
            3 => Some(Bound::Exact),
            _ => None,
        }
    }
}

/// Decoded probe result.
#[derive(Clone, Copy, Debug)]
pub struct TTEntry {
    pub mv: Move,
    pub value: i32,
    pub depth: i32,
    pub bound: Bound,
}

const BUCKET_SIZE: usize = 4;
const GEN_MASK: u8 = 0xFC;

#[repr(align(32))]
#[derive(Default)]
struct Bucket {
    slots: [AtomicU64; BUCKET_SIZE],
}

#[inline]
fn pack(key16: u16, mv: Move, value: i16, depth: i8, genbound: u8) -> u64 {
    (u64::from(key16) << 48)
        | (u64::from(mv.as_u16()) << 32)
        | (u64::from(value as u16) << 16)
        | (u64::from(depth as u8) << 8)
        | u64::from(genbound)
}

#[inline]
fn unpack_key16(word: u64) -> u16 {
    (word >> 48) as u16
}

#[inline]
fn unpack_move(word: u64) -> Move {
    Move::from_u16((word >> 32) as u16)
}

#[inline]
fn unpack_value(word: u64) -> i16 {
    (word >> 16) as u16 as i16
}

#[inline]
fn unpack_depth(word: u64) -> i8 {
    (word >> 8) as u8 as i8
}

#[inline]
fn unpack_genbound(word: u64) -> u8 {
    word as u8
}

pub struct TranspositionTable {
    buckets: Box<[Bucket]>,
    mask: usize,
    generation: AtomicU64,
}

impl TranspositionTable {
    /// Allocate the closest power-of-two bucket count at or below
    /// `megabytes`. Sizes below one megabyte are clamped up.
    #[must_use]
    pub fn new(megabytes: usize) -> Self {
        let bytes = megabytes.max(1) << 20;
        let buckets = (bytes / std::mem::size_of::<Bucket>()).next_power_of_two();
        let buckets = if buckets * std::mem::size_of::<Bucket>() > bytes {
            buckets / 2
        } else {
            buckets
        };

        log::debug!(
            "transposition table: {} buckets ({} MB)",
            buckets,
            buckets * std::mem::size_of::<Bucket>() >> 20
        );

        let mut table = Vec::with_capacity(buckets);
        table.resize_with(buckets, Bucket::default);

        TranspositionTable {
            buckets: table.into_boxed_slice(),
            mask: buckets - 1,
            generation: AtomicU64::new(0),
        }
    }

    /// Advance the age before a new search root.
    pub fn bump_generation(&self) {
        self.generation.fetch_add(4, Ordering::Relaxed);
    }

    #[inline]
    fn current_gen(&self) -> u8 {
        self.generation.load(Ordering::Relaxed) as u8 & GEN_MASK
    }

    /// Wipe every entry, as on `ucinewgame`.
    pub fn clear(&self) {
        for bucket in self.buckets.iter() {
            for slot in &bucket.slots {
                slot.store(0, Ordering::Relaxed);
            }
        }
        self.generation.store(0, Ordering::Relaxed);
    }

    /// Look up `hash`. A hit refreshes the entry's generation while
    /// keeping its bound.
    #[must_use]
    pub fn probe(&self, hash: u64) -> Option<TTEntry> {
        let key16 = (hash >> 48) as u16;
        let bucket = &self.buckets[(hash as usize) & self.mask];

        for slot in &bucket.slots {
            let word = slot.load(Ordering::Relaxed);
            if unpack_key16(word) == key16 {
                let bound = Bound::from_bits(unpack_genbound(word))?;

                // Refresh the age, retaining the stored bound
                let refreshed = (word & !u64::from(GEN_MASK))
                    | u64::from(self.current_gen() | bound as u8 & 0x3);
                slot.store(refreshed, Ordering::Relaxed);

                return Some(TTEntry {
                    mv: unpack_move(word),
                    value: i32::from(unpack_value(word)),
                    depth: i32::from(unpack_depth(word)),
                    bound,
                });
            }
        }

        None
    }

    /// Store an entry for `hash`, choosing a victim slot by signature
    /// match, emptiness, then lowest `depth - 8 * age`.
    pub fn store(&self, hash: u64, mv: Move, value: i32, depth: i32, bound: Bound) {
        debug_assert!((-32000..=32000).contains(&value));
        debug_assert!((0..128).contains(&depth));

        let key16 = (hash >> 48) as u16;
        let generation = self.current_gen();
        let bucket = &self.buckets[(hash as usize) & self.mask];

        let mut victim = 0;
        let mut victim_word = bucket.slots[0].load(Ordering::Relaxed);
        let mut victim_score = i32::MAX;

        for (idx, slot) in bucket.slots.iter().enumerate() {
            let word = slot.load(Ordering::Relaxed);

            // A matching signature or an unused slot ends the scan
            if unpack_key16(word) == key16 || unpack_genbound(word) & 0x3 == 0 {
                victim = idx;
                victim_word = word;
                break;
            }

            let age = i32::from(generation.wrapping_sub(unpack_genbound(word) & GEN_MASK) >> 2);
            let score = i32::from(unpack_depth(word)) - 8 * age;
            if score < victim_score {
                victim = idx;
                victim_word = word;
                victim_score = score;
            }
        }

        // Keep a deeper entry for the same position unless the new
        // bound is exact or nearly as deep
        if bound != Bound::Exact
            && unpack_key16(victim_word) == key16
            && depth < i32::from(unpack_depth(victim_word)) - 3
        {
            return;
        }

        let word = pack(
            key16,
            mv,
            value as i16,
            depth as i8,
            generation | bound as u8,
        );
        bucket.slots[victim].store(word, Ordering::Relaxed);
    }

    /// Permille of sampled slots holding an entry from the current
    /// generation, for `info hashfull`.
    #[must_use]
    pub fn hashfull(&self) -> usize {
        let sample = self.buckets.len().min(250);
        let generation = self.current_gen();
        let mut used = 0;
        for bucket in self.buckets.iter().take(sample) {
            for slot in &bucket.slots {
                let genbound = unpack_genbound(slot.load(Ordering::Relaxed));
                if genbound & 0x3 != 0 && genbound & GEN_MASK == generation {
                    used += 1;
                }
            }
        }
        used * 1000 / (sample * BUCKET_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::types::{MoveKind, Square};

    fn mv() -> Move {
        Move::new(Square::E1, Square::G1, MoveKind::Normal)
    }

    #[test]
    fn store_probe_roundtrip() {
        let tt = TranspositionTable::new(1);
        let hash = 0x1234_5678_9ABC_DEF0u64;
        tt.store(hash, mv(), -250, 12, Bound::Exact);

        let hit = tt.probe(hash).expect("stored entry");
        assert_eq!(hit.mv, mv());
        assert_eq!(hit.value, -250);
        assert_eq!(hit.depth, 12);
        assert_eq!(hit.bound, Bound::Exact);
    }

    #[test]
    fn mismatched_signature_misses() {
        let tt = TranspositionTable::new(1);
        tt.store(0x1111_0000_0000_0001, mv(), 10, 5, Bound::Lower);
        // Same bucket index, different signature
        assert!(tt.probe(0x2222_0000_0000_0001).is_none());
    }

    #[test]
    fn same_key_shallow_store_skipped() {
        let tt = TranspositionTable::new(1);
        let hash = 0xABCD_0000_0000_0002u64;
        tt.store(hash, mv(), 100, 20, Bound::Lower);
        // A much shallower non-exact result must not clobber it
        tt.store(hash, Move::NONE, 5, 2, Bound::Upper);
        let hit = tt.probe(hash).unwrap();
        assert_eq!(hit.depth, 20);
        assert_eq!(hit.value, 100);
        // An exact result always lands
        tt.store(hash, mv(), 7, 2, Bound::Exact);
        let hit = tt.probe(hash).unwrap();
        assert_eq!(hit.depth, 2);
        assert_eq!(hit.bound, Bound::Exact);
    }

    #[test]
    fn old_generations_are_replaced_first(){
        let tt = TranspositionTable::new(1);
        // Four entries of an old generation fill a bucket
        let base = 0x0000_0000_0000_0040u64;
        let colliding: Vec<u64> = (0u64..5)
            .map(|i| ((i + 1) << 48) | base)
            .collect();
        for &hash in colliding.iter().take(4) {
            tt.store(hash, mv(), 1, 10, Bound::Lower);
        }
        tt.bump_generation();
        tt.store(colliding[4], mv(), 2, 1, Bound::Lower);
        // The newcomer landed despite the lower depth
        assert!(tt.probe(colliding[4]).is_some());
    }

    #[test]
    fn hashfull_counts_current_generation() {
        let tt = TranspositionTable::new(1);
        assert_eq!(tt.hashfull(), 0);
        for i in 0..100u64 {
            tt.store((i << 48) | i, mv(), 0, 1, Bound::Exact);
        }
        assert!(tt.hashfull() > 0);
        tt.clear();
        assert_eq!(tt.hashfull(), 0);
    }

    #[test]
    fn negative_values_survive_packing() {
        let tt = TranspositionTable::new(1);
        let hash = 0x7777_0000_0000_0003u64;
        tt.store(hash, Move::NONE, -31900, 0, Bound::Upper);
        assert_eq!(tt.probe(hash).unwrap().value, -31900);
    }
}
