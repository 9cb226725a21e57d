//! Persistence adapter: the index's two logical tables mapped onto
//! RocksDB, plus the JSON metadata sidecar.
//!
//! Both tables use 4-byte little-endian integer keys with opaque value
//! bytes: the row store holds serialized bit vectors, the colour store
//! holds NUL-terminated sequence-ID strings. Filenames are derived
//! deterministically from the storage directory.

use std::fs;
use std::path::{Path, PathBuf};

use rocksdb::{Options, DB};
use serde::{Deserialize, Serialize};

use crate::error::{BigsiError, Result};

pub const METADATA_FILENAME: &str = "metadata.json";
pub const BITVECTORS_DB_FILENAME: &str = "bitvectors.db";
pub const COLOURS_DB_FILENAME: &str = "colours.db";

/// An ordered store of integer-keyed opaque values.
pub trait KeyValueStore {
    fn put(&self, key: u32, value: &[u8]) -> Result<()>;
    fn get(&self, key: u32) -> Result<Option<Vec<u8>>>;
    fn flush(&self) -> Result<()>;
}

/// RocksDB-backed [`KeyValueStore`].
pub struct RocksStore {
    db: DB,
    name: String,
}

impl RocksStore {
    /// Open a store, creating it when `create` is set.
    pub fn open(path: &Path, create: bool) -> Result<RocksStore> {
        let mut opts = Options::default();
        opts.create_if_missing(create);
        // Queries run from multiple workers at once
        opts.increase_parallelism(2);
        let db = DB::open(&opts, path)
            .map_err(|e| BigsiError::storage(format!("open {}", path.display()), e))?;
        Ok(RocksStore {
            db,
            name: path.display().to_string(),
        })
    }
}

impl KeyValueStore for RocksStore {
    fn put(&self, key: u32, value: &[u8]) -> Result<()> {
        self.db
            .put(key.to_le_bytes(), value)
            .map_err(|e| BigsiError::storage(format!("put key {} into {}", key, self.name), e))
    }

    fn get(&self, key: u32) -> Result<Option<Vec<u8>>> {
        self.db
            .get(key.to_le_bytes())
            .map_err(|e| BigsiError::storage(format!("get key {} from {}", key, self.name), e))
    }

    fn flush(&self) -> Result<()> {
        self.db
            .flush()
            .map_err(|e| BigsiError::storage(format!("flush {}", self.name), e))
    }
}

/// Sidecar metadata describing a persisted index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexMetadata {
    pub db_directory: PathBuf,
    pub metadata_file: PathBuf,
    pub bitvectors_db: PathBuf,
    pub colours_db: PathBuf,
    pub num_bits: usize,
    pub num_hashes: usize,
    pub colour_count: usize,
}

impl IndexMetadata {
    /// Derive the on-disk layout for a storage directory.
    pub fn for_directory(dir: &Path, num_bits: usize, num_hashes: usize, colour_count: usize) -> IndexMetadata {
        IndexMetadata {
            db_directory: dir.to_path_buf(),
            metadata_file: dir.join(METADATA_FILENAME),
            bitvectors_db: dir.join(BITVECTORS_DB_FILENAME),
            colours_db: dir.join(COLOURS_DB_FILENAME),
            num_bits,
            num_hashes,
            colour_count,
        }
    }

    /// Write the pretty-printed JSON document.
    pub fn store(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&self.metadata_file, json)
            .map_err(|e| BigsiError::io(&self.metadata_file, "write", e))
    }

    /// Read the metadata document from a storage directory.
    pub fn load(dir: &Path) -> Result<IndexMetadata> {
        let path = dir.join(METADATA_FILENAME);
        let content = fs::read_to_string(&path).map_err(|e| BigsiError::io(&path, "read", e))?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// The row store and colour store of one persisted index, opened
/// together and closed together.
pub struct IndexStore {
    rows: RocksStore,
    colours: RocksStore,
    dir: PathBuf,
}

impl IndexStore {
    /// Open both stores with create-if-missing semantics (freeze path).
    pub fn create(dir: &Path) -> Result<IndexStore> {
        fs::create_dir_all(dir).map_err(|e| BigsiError::io(dir, "create directory", e))?;
        Self::open_stores(dir, true)
    }

    /// Open both existing stores (load path). The metadata document and
    /// both store paths must already be present.
    pub fn open(dir: &Path) -> Result<IndexStore> {
        for required in [
            dir.join(METADATA_FILENAME),
            dir.join(BITVECTORS_DB_FILENAME),
            dir.join(COLOURS_DB_FILENAME),
        ] {
            if !required.exists() {
                return Err(BigsiError::io(
                    &required,
                    "open",
                    std::io::Error::new(std::io::ErrorKind::NotFound, "index file missing"),
                ));
            }
        }
        Self::open_stores(dir, false)
    }

    fn open_stores(dir: &Path, create: bool) -> Result<IndexStore> {
        let rows = RocksStore::open(&dir.join(BITVECTORS_DB_FILENAME), create)?;
        let colours = RocksStore::open(&dir.join(COLOURS_DB_FILENAME), create)?;
        Ok(IndexStore {
            rows,
            colours,
            dir: dir.to_path_buf(),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.dir
    }

    pub fn put_row(&self, row: u32, value: &[u8]) -> Result<()> {
        self.rows.put(row, value)
    }

    pub fn get_row(&self, row: u32) -> Result<Option<Vec<u8>>> {
        self.rows.get(row)
    }

    /// Store a colour's sequence ID, NUL-terminated.
    pub fn put_colour(&self, colour: u32, seq_id: &str) -> Result<()> {
        let mut value = Vec::with_capacity(seq_id.len() + 1);
        value.extend_from_slice(seq_id.as_bytes());
        value.push(0);
        self.colours.put(colour, &value)
    }

    /// Fetch a colour's sequence ID, stripping the terminator.
    pub fn get_colour(&self, colour: u32) -> Result<Option<String>> {
        match self.colours.get(colour)? {
            None => Ok(None),
            Some(mut bytes) => {
                if bytes.last() == Some(&0) {
                    bytes.pop();
                }
                String::from_utf8(bytes)
                    .map(Some)
                    .map_err(|_| BigsiError::corrupt(format!("colour {} is not valid UTF-8", colour)))
            }
        }
    }

    /// Flush both stores and release them. Closing is the durability
    /// point for the engine.
    pub fn close(self) -> Result<()> {
        self.rows.flush()?;
        self.colours.flush()?;
        Ok(())
    }
}
