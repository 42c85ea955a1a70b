//! A plain Bloom filter used by the search index as a fast negative check.
//!
//! The filter guarantees zero false negatives; false positives occur with a
//! probability bounded in expectation by the configured error rate. It is
//! therefore only ever consulted as a short-circuit before an authoritative
//! trie walk, never instead of one.
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Sizing parameters for a [`BloomFilter`].
///
/// `error_rate` must lie strictly between 0 and 1 and `capacity` must be at
/// least 1; the derived sizes are clamped so that even degenerate parameters
/// produce a usable (if useless) filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BloomParams {
    /// Expected number of distinct items.
    pub capacity: usize,
    /// Target false-positive rate.
    pub error_rate: f64,
}

impl Default for BloomParams {
    fn default() -> Self {
        BloomParams { capacity: 1000, error_rate: 0.01 }
    }
}

impl BloomParams {
    /// Optimal bit-array size: `m = ceil(-n * ln(p) / ln(2)^2)`.
    fn bit_count(&self) -> usize {
        let n = self.capacity.max(1) as f64;
        let p = self.error_rate.clamp(f64::MIN_POSITIVE, 1.0 - f64::EPSILON);
        let m = -(n * p.ln()) / (2.0_f64.ln().powi(2));
        (m.ceil() as usize).max(1)
    }

    /// Optimal hash-function count: `k = round((m / n) * ln 2)`.
    fn hash_count(&self, bits: usize) -> u32 {
        let n = self.capacity.max(1) as f64;
        let k = (bits as f64 / n) * 2.0_f64.ln();
        (k.round() as u32).max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BloomFilter {
    params: BloomParams,
    bits: Vec<u64>,
    bit_count: usize,
    hash_count: u32,
}

impl BloomFilter {
    pub fn new(params: BloomParams) -> Self {
        let bit_count = params.bit_count();
        let hash_count = params.hash_count(bit_count);
        BloomFilter {
            params,
            bits: vec![0; bit_count.div_ceil(64)],
            bit_count,
            hash_count,
        }
    }

    pub fn params(&self) -> BloomParams {
        self.params
    }

    /// Bit position for `item` under the `seed`-th hash function.
    fn position(&self, item: &[u8], seed: u32) -> usize {
        let mut hasher = Sha256::new();
        hasher.update(seed.to_le_bytes());
        hasher.update(item);
        let digest = hasher.finalize();
        let word = u64::from_le_bytes(digest[..8].try_into().expect("digest has 32 bytes"));
        (word % self.bit_count as u64) as usize
    }

    /// Add an item to the filter.
    pub fn add(&mut self, item: &[u8]) {
        for seed in 0..self.hash_count {
            let index = self.position(item, seed);
            self.bits[index / 64] |= 1 << (index % 64);
        }
    }

    /// Whether the item might be in the set.
    ///
    /// Returns `true` for every item that was added. May return `true` for an
    /// item that was never added, with probability bounded by the configured
    /// error rate.
    pub fn contains(&self, item: &[u8]) -> bool {
        (0..self.hash_count).all(|seed| {
            let index = self.position(item, seed);
            self.bits[index / 64] & (1 << (index % 64)) != 0
        })
    }
}
