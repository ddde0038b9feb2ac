//! Per-thread evaluation caches.
//!
//! All three are power-of-two, direct-mapped, always-replace. Keys are
//! verified on probe, so a stale or colliding entry simply misses.

use crate::board::types::Bitboard;

use super::score::Score;

/// Entries in the pawn-king table. 16K entries of 40 bytes.
const PK_CACHE_SIZE: usize = 1 << 14;

/// Entries in the eval cache; the low 16 bits of the hash index it.
const EVAL_CACHE_SIZE: usize = 1 << 16;
const EVAL_CACHE_MASK: u64 = (EVAL_CACHE_SIZE - 1) as u64;

/// Entries in the material table, indexed by the top bits of the
/// material key.
const MATERIAL_CACHE_SIZE: usize = 1 << 12;
const MATERIAL_SHIFT: u32 = 64 - 12;

/// Cached pawn-and-king structure evaluation.
#[derive(Clone, Copy, Default)]
pub struct PawnKingEntry {
    pub pkhash: u64,
    pub passed: Bitboard,
    /// White-minus-black pawn structure terms.
    pub mg: i32,
    pub eg: i32,
    /// Per-colour king shelter, consumed by the king evaluator.
    pub shelter: [Score; 2],
}

pub struct PawnKingCache {
    entries: Box<[PawnKingEntry]>,
}

impl PawnKingCache {
    #[must_use]
    pub fn new() -> Self {
        PawnKingCache {
            entries: vec![PawnKingEntry::default(); PK_CACHE_SIZE].into_boxed_slice(),
        }
    }

    #[must_use]
    pub fn probe(&self, pkhash: u64) -> Option<&PawnKingEntry> {
        let entry = &self.entries[(pkhash as usize) & (PK_CACHE_SIZE - 1)];
        (entry.pkhash == pkhash && pkhash != 0).then_some(entry)
    }

    pub fn store(&mut self, entry: PawnKingEntry) {
        self.entries[(entry.pkhash as usize) & (PK_CACHE_SIZE - 1)] = entry;
    }

    pub fn clear(&mut self) {
        self.entries.fill(PawnKingEntry::default());
    }
}

impl Default for PawnKingCache {
    fn default() -> Self {
        PawnKingCache::new()
    }
}

/// Full-evaluation cache. Each slot packs the upper bits of the key
/// with a signed 16-bit eval; the low key bits are implied by the
/// index, so rebuilding `(stored_upper | current_lower)` and comparing
/// against the probing key validates the hit.
pub struct EvalCache {
    entries: Box<[u64]>,
}

impl EvalCache {
    #[must_use]
    pub fn new() -> Self {
        EvalCache {
            entries: vec![0u64; EVAL_CACHE_SIZE].into_boxed_slice(),
        }
    }

    #[must_use]
    pub fn probe(&self, hash: u64) -> Option<i32> {
        let entry = self.entries[(hash & EVAL_CACHE_MASK) as usize];
        let key = (entry & !EVAL_CACHE_MASK) | (hash & EVAL_CACHE_MASK);
        (key == hash && entry != 0).then(|| i32::from(entry as u16 as i16))
    }

    pub fn store(&mut self, hash: u64, eval: i32) {
        debug_assert!(i16::try_from(eval).is_ok());
        self.entries[(hash & EVAL_CACHE_MASK) as usize] =
            (hash & !EVAL_CACHE_MASK) | u64::from(eval as i16 as u16);
    }

    pub fn clear(&mut self) {
        self.entries.fill(0);
    }
}

impl Default for EvalCache {
    fn default() -> Self {
        EvalCache::new()
    }
}

#[derive(Clone, Copy, Default)]
struct MaterialEntry {
    mathash: u64,
    eval: Score,
}

/// Cache of the material-signature imbalance term.
pub struct MaterialCache {
    entries: Box<[MaterialEntry]>,
}

impl MaterialCache {
    #[must_use]
    pub fn new() -> Self {
        MaterialCache {
            entries: vec![MaterialEntry::default(); MATERIAL_CACHE_SIZE].into_boxed_slice(),
        }
    }

    #[must_use]
    pub fn probe(&self, mathash: u64) -> Option<Score> {
        let entry = &self.entries[(mathash >> MATERIAL_SHIFT) as usize];
        (entry.mathash == mathash && mathash != 0).then_some(entry.eval)
    }

    pub fn store(&mut self, mathash: u64, eval: Score) {
        self.entries[(mathash >> MATERIAL_SHIFT) as usize] = MaterialEntry { mathash, eval };
    }

    pub fn clear(&mut self) {
        self.entries.fill(MaterialEntry::default());
    }
}

impl Default for MaterialCache {
    fn default() -> Self {
        MaterialCache::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eval_cache_roundtrip() {
        let mut cache = EvalCache::new();
        let hash = 0xDEAD_BEEF_1234_5678u64;
        assert_eq!(cache.probe(hash), None);
        cache.store(hash, -321);
        assert_eq!(cache.probe(hash), Some(-321));
        // A different key indexing the same slot misses
        let alias = hash ^ 0x0001_0000_0000_0000;
        assert_eq!(cache.probe(alias), None);
    }

    #[test]
    fn eval_cache_negative_values() {
        let mut cache = EvalCache::new();
        for eval in [-30_000i32, -1, 0, 1, 155, 30_000] {
            let hash = 0xABCD_0000_0000_0000u64 | (eval.unsigned_abs() as u64);
            cache.store(hash, eval);
            assert_eq!(cache.probe(hash), Some(eval), "eval {eval}");
        }
    }

    #[test]
    fn pk_cache_roundtrip() {
        let mut cache = PawnKingCache::new();
        let entry = PawnKingEntry {
            pkhash: 0x1111_2222_3333_4444,
            passed: Bitboard(0xFF),
            mg: 42,
            eg: -17,
            shelter: [5, -5],
        };
        cache.store(entry);
        let hit = cache.probe(entry.pkhash).unwrap();
        assert_eq!(hit.mg, 42);
        assert_eq!(hit.passed, Bitboard(0xFF));
        assert!(cache.probe(0x9999_8888_7777_6666).is_none());
    }

    #[test]
    fn material_cache_roundtrip() {
        let mut cache = MaterialCache::new();
        cache.store(0xF000_0000_0000_0001, 77);
        assert_eq!(cache.probe(0xF000_0000_0000_0001), Some(77));
        assert_eq!(cache.probe(0xE000_0000_0000_0001), None);
    }
}
