//! Bloom filter over a [`BitVector`].
//!
//! Uses double hashing: position `i` is `h1 + i * h2` where `h1` and
//! `h2` are FNV-1a 64 over the key with two different bases. The raw
//! hash values (before the modulo) are exposed through [`hash_values`]
//! so the frozen index can be queried with exactly the values a
//! filter's insert used — the fixed bases keep the on-disk index stable
//! across builds.

use crate::bitvec::BitVector;
use crate::error::{BigsiError, Result};

const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
const FNV_BASIS_H1: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_BASIS_H2: u64 = 0x517c_c1b7_2722_0a95;

/// FNV-1a 64-bit hash with a configurable starting basis.
fn fnv1a_64(data: &[u8], basis: u64) -> u64 {
    let mut hash = basis;
    for &byte in data {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// The raw (un-modded) hash values a key maps to.
///
/// `hash_values(key, k)[i] = h1 + i * h2`. Callers reduce each value
/// modulo the filter (or index) width.
pub fn hash_values(key: &[u8], num_hashes: usize) -> Vec<u64> {
    let h1 = fnv1a_64(key, FNV_BASIS_H1);
    let h2 = fnv1a_64(key, FNV_BASIS_H2);
    (0..num_hashes as u64)
        .map(|i| h1.wrapping_add(i.wrapping_mul(h2)))
        .collect()
}

/// A Bloom filter: `num_hashes` hash functions over a fixed bit vector.
///
/// A key "matches" iff every one of its hash positions is set.
#[derive(Debug, Clone)]
pub struct BloomFilter {
    num_hashes: usize,
    bits: BitVector,
}

impl BloomFilter {
    /// Create an empty filter with explicit geometry.
    pub fn new(num_bits: usize, num_hashes: usize) -> Result<BloomFilter> {
        if num_bits == 0 {
            return Err(BigsiError::invalid("bloom filter needs at least one bit"));
        }
        if num_hashes == 0 {
            return Err(BigsiError::invalid("bloom filter needs at least one hash"));
        }
        Ok(BloomFilter {
            num_hashes,
            bits: BitVector::new(num_bits),
        })
    }

    /// Create a filter sized for `expected_items` at the given target
    /// false positive rate, using the standard optimum:
    /// `m = -n ln p / ln(2)^2`, `k = (m / n) ln 2`.
    pub fn with_fp_rate(expected_items: usize, fp_rate: f64) -> Result<BloomFilter> {
        let (num_bits, num_hashes) = optimal_geometry(expected_items, fp_rate)?;
        BloomFilter::new(num_bits, num_hashes)
    }

    /// Rehydrate a filter from an existing bit vector and hash count.
    pub fn from_parts(num_hashes: usize, bits: BitVector) -> Result<BloomFilter> {
        if bits.capacity() == 0 {
            return Err(BigsiError::invalid("bloom filter needs at least one bit"));
        }
        if num_hashes == 0 {
            return Err(BigsiError::invalid("bloom filter needs at least one hash"));
        }
        Ok(BloomFilter { num_hashes, bits })
    }

    /// Insert a key.
    pub fn insert(&mut self, key: &[u8]) {
        let num_bits = self.bits.capacity() as u64;
        for hv in hash_values(key, self.num_hashes) {
            // In range by construction, set cannot fail
            let _ = self.bits.set((hv % num_bits) as usize, true);
        }
    }

    /// True iff the key might have been inserted (false positives are
    /// possible, false negatives are not).
    pub fn contains(&self, key: &[u8]) -> bool {
        let num_bits = self.bits.capacity() as u64;
        hash_values(key, self.num_hashes)
            .iter()
            .all(|hv| self.bits.get((hv % num_bits) as usize).unwrap_or(false))
    }

    pub fn num_hashes(&self) -> usize {
        self.num_hashes
    }

    pub fn num_bits(&self) -> usize {
        self.bits.capacity()
    }

    /// Borrow the underlying bit vector.
    pub fn bit_vector(&self) -> &BitVector {
        &self.bits
    }

    /// Consume the filter, yielding its bit vector.
    pub fn into_bit_vector(self) -> BitVector {
        self.bits
    }
}

/// Optimal `(num_bits, num_hashes)` for `expected_items` at `fp_rate`.
pub fn optimal_geometry(expected_items: usize, fp_rate: f64) -> Result<(usize, usize)> {
    if expected_items == 0 {
        return Err(BigsiError::invalid("expected_items must be > 0"));
    }
    if !(fp_rate > 0.0 && fp_rate < 1.0) {
        return Err(BigsiError::invalid(format!(
            "false positive rate must be in (0, 1), got {}",
            fp_rate
        )));
    }
    let n = expected_items as f64;
    let m = (-n * fp_rate.ln() / std::f64::consts::LN_2.powi(2)).ceil() as usize;
    let m = m.max(8);
    let k = ((m as f64 / n) * std::f64::consts::LN_2).ceil() as usize;
    Ok((m, k.max(1)))
}
