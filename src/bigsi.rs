//! The bit-sliced index core.
//!
//! A `Bigsi` is built colour by colour from per-sequence Bloom filters,
//! then frozen: the per-colour vectors are pivoted into per-bit-position
//! rows and written to the row store, after which the index answers
//! membership queries by ANDing the rows a k-mer's hash values select.
//!
//! Build is single-threaded by design; a frozen index is read-only and
//! safe to query from many threads at once.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::bitvec::BitVector;
use crate::bloom::BloomFilter;
use crate::error::{BigsiError, Result};
use crate::storage::{IndexMetadata, IndexStore};
use crate::MAX_COLOURS;

/// BItsliced Genome Signature Index.
///
/// Lifecycle: created empty, zero or more [`add`](Bigsi::add) calls,
/// exactly one [`index`](Bigsi::index) (freeze), then queries and
/// lookups, and finally [`destroy`](Bigsi::destroy). A
/// [`load`](Bigsi::load)ed index enters the frozen state directly.
pub struct Bigsi {
    num_bits: usize,
    num_hashes: usize,
    colour_count: usize,
    frozen: bool,
    // Build-phase state, released at freeze
    id_checker: HashMap<String, usize>,
    colour_table: Vec<String>,
    build_rows: Vec<BitVector>,
    db_dir: PathBuf,
    store: Option<IndexStore>,
}

impl Bigsi {
    /// Create an empty, unfrozen index.
    ///
    /// `num_bits` and `num_hashes` fix the Bloom filter geometry every
    /// colour must share; `db_dir` is where the frozen index will live.
    pub fn new(num_bits: usize, num_hashes: usize, db_dir: &Path) -> Result<Bigsi> {
        if num_bits == 0 {
            return Err(BigsiError::invalid("index needs at least one bit per filter"));
        }
        if num_hashes == 0 {
            return Err(BigsiError::invalid("index needs at least one hash"));
        }
        Ok(Bigsi {
            num_bits,
            num_hashes,
            colour_count: 0,
            frozen: false,
            id_checker: HashMap::new(),
            colour_table: Vec::new(),
            build_rows: Vec::new(),
            db_dir: db_dir.to_path_buf(),
            store: None,
        })
    }

    pub fn num_bits(&self) -> usize {
        self.num_bits
    }

    pub fn num_hashes(&self) -> usize {
        self.num_hashes
    }

    /// Number of colours inserted so far (the colour iterator).
    pub fn colours(&self) -> usize {
        self.colour_count
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn directory(&self) -> &Path {
        &self.db_dir
    }

    /// Assign colours to sequence IDs and record their Bloom filters.
    ///
    /// Entries are consumed in iteration order; each one is checked for
    /// a duplicate ID, an empty filter, and geometry compatibility
    /// before its bit vector is cloned in. `expected` must match the
    /// number of accepted entries. On error, colours accepted earlier in
    /// the call are retained and the caller is expected to destroy the
    /// index.
    pub fn add<'a, I>(&mut self, entries: I, expected: usize) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, &'a BloomFilter)>,
    {
        if self.frozen {
            return Err(BigsiError::AlreadyFrozen);
        }

        let mut accepted = 0usize;
        for (seq_id, bf) in entries {
            if self.id_checker.contains_key(seq_id) {
                return Err(BigsiError::DuplicateSequenceId(seq_id.to_string()));
            }
            if bf.bit_vector().count() == 0 {
                return Err(BigsiError::EmptyFilter {
                    id: seq_id.to_string(),
                });
            }
            if bf.num_hashes() != self.num_hashes || bf.num_bits() != self.num_bits {
                return Err(BigsiError::IncompatibleFilter {
                    id: seq_id.to_string(),
                });
            }

            self.build_rows.push(bf.bit_vector().clone());
            self.id_checker.insert(seq_id.to_string(), self.colour_count);
            self.colour_table.push(seq_id.to_string());

            self.colour_count += 1;
            if self.colour_count == MAX_COLOURS {
                return Err(BigsiError::ColourLimitExceeded { limit: MAX_COLOURS });
            }
            accepted += 1;
        }

        if accepted != expected {
            return Err(BigsiError::EntryCountMismatch {
                expected,
                got: accepted,
            });
        }
        Ok(())
    }

    /// Freeze the index: pivot the per-colour bit vectors into
    /// per-bit-position rows, persist rows and colour table, release the
    /// build state. O(num_bits x colours) bit probes.
    pub fn index(&mut self) -> Result<()> {
        if self.colour_count < 1 {
            return Err(BigsiError::EmptyIndex);
        }
        if self.frozen {
            return Err(BigsiError::AlreadyFrozen);
        }

        let store = IndexStore::create(&self.db_dir)?;

        for i in 0..self.num_bits {
            let mut row = BitVector::new(self.colour_count);
            for colour in 0..self.colour_count {
                if self.build_rows[colour].get(i)? {
                    row.set(colour, true)?;
                }
            }
            store.put_row(i as u32, &row.to_bytes())?;
        }
        debug!("wrote {} index rows to {}", self.num_bits, self.db_dir.display());

        for (colour, seq_id) in self.colour_table.iter().enumerate() {
            store.put_colour(colour as u32, seq_id)?;
        }

        self.build_rows = Vec::new();
        self.id_checker = HashMap::new();
        self.frozen = true;
        self.store = Some(store);

        info!(
            "indexed {} colours across {} rows",
            self.colour_count, self.num_bits
        );
        self.self_check()
    }

    /// Collect the colours whose Bloom filters accept a k-mer, given the
    /// k-mer's raw hash values.
    ///
    /// `result` must have capacity equal to the colour count and is
    /// expected to be all-zero on entry; on return its set bits are the
    /// matching colours.
    pub fn query(&self, hash_values: &[u64], result: &mut BitVector) -> Result<()> {
        if !self.frozen {
            return Err(BigsiError::Unfrozen);
        }
        if hash_values.len() != self.num_hashes {
            return Err(BigsiError::HashCountMismatch {
                expected: self.num_hashes,
                got: hash_values.len(),
            });
        }
        if result.capacity() != self.colour_count {
            return Err(BigsiError::CapacityMismatch {
                expected: self.colour_count,
                got: result.capacity(),
            });
        }
        let store = self.store.as_ref().ok_or(BigsiError::Unfrozen)?;

        for (i, hv) in hash_values.iter().enumerate() {
            let pos = (hv % self.num_bits as u64) as u32;
            let bytes = store.get_row(pos)?.ok_or_else(|| {
                BigsiError::corrupt(format!("index row {} missing from the row store", pos))
            })?;
            let row = BitVector::from_bytes(&bytes)?;

            // An empty row annihilates the AND chain
            if row.count() == 0 {
                result.clear();
                return Ok(());
            }

            if i == 0 {
                result.or_with(&row)?;
            } else {
                result.and_with(&row)?;
                if result.count() == 0 {
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    /// Resolve a colour back to the sequence ID it was assigned at
    /// ingest time.
    pub fn lookup_colour(&self, colour: usize) -> Result<String> {
        if !self.frozen {
            return Err(BigsiError::Unfrozen);
        }
        if colour >= self.colour_count {
            return Err(BigsiError::ColourOutOfRange {
                colour,
                count: self.colour_count,
            });
        }
        let store = self.store.as_ref().ok_or(BigsiError::Unfrozen)?;
        store.get_colour(colour as u32)?.ok_or_else(|| {
            BigsiError::corrupt(format!("colour {} missing from the colour store", colour))
        })
    }

    /// Persist the metadata sidecar and close the stores. Closing is
    /// the durability point; a flushed index can be [`load`](Bigsi::load)ed.
    pub fn flush(mut self) -> Result<()> {
        if !self.frozen {
            return Err(BigsiError::Unfrozen);
        }
        let meta = IndexMetadata::for_directory(
            &self.db_dir,
            self.num_bits,
            self.num_hashes,
            self.colour_count,
        );
        meta.store()?;
        if let Some(store) = self.store.take() {
            store.close()?;
        }
        info!("flushed index to {}", self.db_dir.display());
        Ok(())
    }

    /// Release the index: a frozen index is flushed to disk, an
    /// unfrozen one just drops its transient build state.
    pub fn destroy(self) -> Result<()> {
        if self.frozen {
            return self.flush();
        }
        // Build-phase state (rows, colour table, id checker) drops here
        Ok(())
    }

    /// Load a previously flushed index from its storage directory.
    ///
    /// Requires the metadata document and both store files; finishes
    /// with the same self-check a freeze runs.
    pub fn load(db_dir: &Path) -> Result<Bigsi> {
        let meta = IndexMetadata::load(db_dir)?;
        if meta.num_bits == 0 || meta.num_hashes == 0 || meta.colour_count == 0 {
            return Err(BigsiError::corrupt(format!(
                "metadata in {} describes an empty index",
                db_dir.display()
            )));
        }
        let store = IndexStore::open(db_dir)?;

        let bigsi = Bigsi {
            num_bits: meta.num_bits,
            num_hashes: meta.num_hashes,
            colour_count: meta.colour_count,
            frozen: true,
            id_checker: HashMap::new(),
            colour_table: Vec::new(),
            build_rows: Vec::new(),
            db_dir: db_dir.to_path_buf(),
            store: Some(store),
        };
        bigsi.self_check()?;
        info!(
            "loaded index from {} ({} colours, {} rows)",
            db_dir.display(),
            bigsi.colour_count,
            bigsi.num_bits
        );
        Ok(bigsi)
    }

    /// Probe the highest rows of the store; any non-error result (even
    /// an empty one) means the store is healthy.
    fn self_check(&self) -> Result<()> {
        let hashes: Vec<u64> = (0..self.num_hashes)
            .map(|i| (self.num_bits - 1).saturating_sub(i) as u64)
            .collect();
        let mut result = BitVector::new(self.colour_count);
        self.query(&hashes, &mut result)
    }
}
