//! Bit-sliced sequence signature index (BIGSI) with a directory-watching
//! ingest daemon.
//!
//! Each ingested sequence becomes a colour: a Bloom filter built from
//! its k-mer sketch. Freezing the index pivots the per-colour filters
//! into per-bit-position rows, so a query k-mer's hash values select a
//! handful of rows whose bitwise AND lists every colour whose filter
//! would accept that k-mer. The frozen index lives in RocksDB with a
//! JSON metadata sidecar and survives restarts.
//!
//! # Example
//!
//! ```no_run
//! use bigsid::bigsi::Bigsi;
//! use bigsid::bitvec::BitVector;
//! use bigsid::bloom::{hash_values, BloomFilter};
//! use std::path::Path;
//!
//! # fn main() -> bigsid::error::Result<()> {
//! let mut index = Bigsi::new(1024, 3, Path::new("/tmp/bigsi-demo"))?;
//!
//! let mut bf = BloomFilter::new(1024, 3)?;
//! bf.insert(b"ACGTACG");
//! index.add([("sample_1", &bf)], 1)?;
//! index.index()?;
//!
//! let mut hits = BitVector::new(index.colours());
//! index.query(&hash_values(b"ACGTACG", 3), &mut hits)?;
//! assert!(hits.get(0)?);
//! # Ok(())
//! # }
//! ```

pub mod bigsi;
pub mod bitvec;
pub mod bloom;
pub mod commands;
pub mod config;
pub mod daemon;
pub mod error;
pub mod logging;
pub mod sketch;
pub mod storage;

pub use bigsi::Bigsi;
pub use bitvec::BitVector;
pub use bloom::BloomFilter;
pub use config::Config;
pub use error::{BigsiError, Result};

/// Upper bound on the colour counter, chosen so every colour index fits
/// the u32 capacity field of the bit-vector wire format with room for
/// signed consumers.
pub const MAX_COLOURS: usize = i32::MAX as usize;
