//! K-mer extraction and bottom-k sketching.
//!
//! A sequence is reduced to the `sketch_size` k-mers with the smallest
//! selection hashes (a KMV sketch), and those representatives are
//! inserted into a Bloom filter. Windows containing anything other than
//! ACGT are skipped; bases are uppercase-normalised first.

use std::collections::BTreeMap;
use std::path::Path;

use needletail::parse_fastx_file;

use crate::bloom::{hash_values, BloomFilter};
use crate::error::{BigsiError, Result};

/// Parameters shared by every sketching call.
#[derive(Debug, Clone, Copy)]
pub struct SketchParams {
    pub k_size: usize,
    pub sketch_size: usize,
    pub num_bits: usize,
    pub num_hashes: usize,
}

/// Iterate the valid k-length windows of a sequence, uppercased.
/// Windows containing non-ACGT bases are dropped.
pub fn canonical_kmers(seq: &[u8], k: usize) -> Vec<Vec<u8>> {
    if k == 0 || seq.len() < k {
        return Vec::new();
    }
    let upper: Vec<u8> = seq.iter().map(|b| b.to_ascii_uppercase()).collect();
    upper
        .windows(k)
        .filter(|w| w.iter().all(|b| matches!(b, b'A' | b'C' | b'G' | b'T')))
        .map(|w| w.to_vec())
        .collect()
}

/// Bottom-k sketch: the `sketch_size` distinct k-mers of `seq` with the
/// smallest selection hashes, in hash order. Deterministic for a given
/// sequence.
pub fn sketch_kmers(seq: &[u8], k: usize, sketch_size: usize) -> Vec<Vec<u8>> {
    let mut ranked: BTreeMap<u64, Vec<u8>> = BTreeMap::new();
    for kmer in canonical_kmers(seq, k) {
        let rank = hash_values(&kmer, 1)[0];
        ranked.entry(rank).or_insert(kmer);
        if ranked.len() > sketch_size {
            let largest = *ranked.keys().next_back().unwrap();
            ranked.remove(&largest);
        }
    }
    ranked.into_values().collect()
}

/// Sketch one sequence into a Bloom filter.
pub fn bloom_for_sequence(seq: &[u8], params: &SketchParams) -> Result<BloomFilter> {
    let mut bf = BloomFilter::new(params.num_bits, params.num_hashes)?;
    for kmer in sketch_kmers(seq, params.k_size, params.sketch_size) {
        bf.insert(&kmer);
    }
    Ok(bf)
}

/// Sketch every record of a FASTA/FASTQ file (gzip transparent) into
/// one `(record id, Bloom filter)` pair per record. Records too short
/// to yield a k-mer produce empty filters, which the index rejects with
/// the record's ID in the message.
pub fn blooms_from_file(path: &Path, params: &SketchParams) -> Result<Vec<(String, BloomFilter)>> {
    let mut reader = parse_fastx_file(path).map_err(|e| BigsiError::InvalidSequence {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;

    let mut out = Vec::new();
    while let Some(record) = reader.next() {
        let record = record.map_err(|e| BigsiError::InvalidSequence {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        let id = String::from_utf8_lossy(record.id())
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_string();
        let bf = bloom_for_sequence(&record.seq(), params)?;
        out.push((id, bf));
    }
    Ok(out)
}
