//! The flat configuration record shared by the CLI subcommands and the
//! daemon.
//!
//! Persisted as a pretty-printed JSON document. The daemon rewrites it
//! at startup with its pid and the running flag, and clears both on a
//! clean shutdown; the other subcommands read it to locate the daemon.
//! There is no locking between the writer and readers.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::bloom::optimal_geometry;
use crate::error::{BigsiError, Result};

pub const DEFAULT_K_SIZE: usize = 7;
pub const DEFAULT_SKETCH_SIZE: usize = 128;
pub const DEFAULT_BLOOM_FP_RATE: f64 = 0.001;
pub const DEFAULT_BLOOM_MAX_ELEMENTS: usize = 100_000;

fn default_pid() -> i32 {
    -1
}

/// Everything the daemon and the offline subcommands need to agree on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Where this record lives on disk; rewritten on every store.
    pub config_file: PathBuf,
    /// Directory the daemon watches for new sequence files.
    pub watch_dir: PathBuf,
    /// Directory the daemon chdirs into; holds the log and the index.
    pub working_dir: PathBuf,
    #[serde(default = "default_pid")]
    pub pid: i32,
    #[serde(default)]
    pub running: bool,
    pub k_size: usize,
    pub sketch_size: usize,
    pub bloom_fp_rate: f64,
    pub bloom_max_elements: usize,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            config_file: PathBuf::new(),
            watch_dir: PathBuf::from("watch"),
            working_dir: PathBuf::from("."),
            pid: -1,
            running: false,
            k_size: DEFAULT_K_SIZE,
            sketch_size: DEFAULT_SKETCH_SIZE,
            bloom_fp_rate: DEFAULT_BLOOM_FP_RATE,
            bloom_max_elements: DEFAULT_BLOOM_MAX_ELEMENTS,
        }
    }
}

impl Config {
    /// Read a record from disk.
    pub fn load(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path).map_err(|e| BigsiError::io(path, "read", e))?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the record to `path`, recording the path inside it.
    pub fn store(&mut self, path: &Path) -> Result<()> {
        self.config_file = path.to_path_buf();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|e| BigsiError::io(path, "write", e))
    }

    pub fn validate(&self) -> Result<()> {
        if self.k_size == 0 {
            return Err(BigsiError::invalid("k_size must be > 0"));
        }
        if self.sketch_size == 0 {
            return Err(BigsiError::invalid("sketch_size must be > 0"));
        }
        if !(self.bloom_fp_rate > 0.0 && self.bloom_fp_rate < 1.0) {
            return Err(BigsiError::invalid(format!(
                "bloom_fp_rate must be in (0, 1), got {}",
                self.bloom_fp_rate
            )));
        }
        if self.bloom_max_elements == 0 {
            return Err(BigsiError::invalid("bloom_max_elements must be > 0"));
        }
        Ok(())
    }

    /// Derive the `(num_bits, num_hashes)` every Bloom filter and the
    /// index must share, from the configured rate and element count.
    pub fn bloom_params(&self) -> Result<(usize, usize)> {
        optimal_geometry(self.bloom_max_elements, self.bloom_fp_rate)
    }

    /// The index storage directory, inside the working directory.
    pub fn index_dir(&self) -> PathBuf {
        self.working_dir.join("index")
    }

    /// The daemon's log file, inside the working directory.
    pub fn log_file(&self) -> PathBuf {
        self.working_dir.join("bigsid.log")
    }
}
