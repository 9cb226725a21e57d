//! Unified error type for the bigsid library.
//!
//! Library code returns `BigsiError` so callers can match on failure
//! kinds; CLI code wraps it in `anyhow::Result` for convenience. Every
//! variant renders a one-line message carrying the identifier that
//! triggered it (colour, sequence ID, row index, path).

use std::fmt;
use std::path::PathBuf;

/// Unified error type for the bigsid library.
#[derive(Debug)]
pub enum BigsiError {
    /// Query or lookup called before the index was frozen or loaded.
    Unfrozen,

    /// Add or a second freeze attempted on an already-frozen index.
    AlreadyFrozen,

    /// Freeze called with no colours inserted.
    EmptyIndex,

    /// Query hash count does not match the index hash count.
    HashCountMismatch { expected: usize, got: usize },

    /// Result bit vector capacity does not match the colour count.
    CapacityMismatch { expected: usize, got: usize },

    /// A sequence ID was added twice.
    DuplicateSequenceId(String),

    /// A Bloom filter's geometry disagrees with the index.
    IncompatibleFilter { id: String },

    /// A Bloom filter with zero set bits was supplied.
    EmptyFilter { id: String },

    /// The colour counter would reach the maximum.
    ColourLimitExceeded { limit: usize },

    /// A colour lookup outside [0, colour_count).
    ColourOutOfRange { colour: usize, count: usize },

    /// The number of accepted entries did not match the expected count.
    EntryCountMismatch { expected: usize, got: usize },

    /// A bit index outside a vector's capacity.
    OutOfRange { index: usize, capacity: usize },

    /// A bitwise operation on vectors of different capacities.
    LengthMismatch { left: usize, right: usize },

    /// A serialized value failed validation on read.
    Corrupt { context: String },

    /// A failure from the key-value engine.
    Storage {
        context: String,
        source: rocksdb::Error,
    },

    /// JSON read/write failure.
    Serialization(serde_json::Error),

    /// I/O error with path context.
    Io {
        path: PathBuf,
        operation: &'static str,
        source: std::io::Error,
    },

    /// A sequence file could not be parsed.
    InvalidSequence { path: PathBuf, detail: String },

    /// Filesystem watcher init, path add, or shutdown failed.
    Watcher(notify::Error),

    /// Worker or watcher thread create/join failed.
    Thread(String),

    /// Detaching the daemon process failed.
    Daemon(String),

    /// A constructor was given an unusable parameter.
    InvalidParameter(String),
}

impl fmt::Display for BigsiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BigsiError::Unfrozen => {
                write!(f, "index has not been frozen; run index() or load() first")
            }
            BigsiError::AlreadyFrozen => write!(f, "index has already been frozen"),
            BigsiError::EmptyIndex => write!(f, "no bloom filters inserted; nothing to index"),
            BigsiError::HashCountMismatch { expected, got } => {
                write!(f, "query hash count {} does not match index ({})", got, expected)
            }
            BigsiError::CapacityMismatch { expected, got } => {
                write!(
                    f,
                    "result vector capacity {} does not match colour count {}",
                    got, expected
                )
            }
            BigsiError::DuplicateSequenceId(id) => {
                write!(f, "duplicate sequence ID cannot be added: {}", id)
            }
            BigsiError::IncompatibleFilter { id } => {
                write!(f, "bloom filter incompatible with index geometry: {}", id)
            }
            BigsiError::EmptyFilter { id } => {
                write!(f, "empty bloom filter supplied for: {}", id)
            }
            BigsiError::ColourLimitExceeded { limit } => {
                write!(f, "maximum number of colours reached ({})", limit)
            }
            BigsiError::ColourOutOfRange { colour, count } => {
                write!(f, "colour {} not present in index ({} colours)", colour, count)
            }
            BigsiError::EntryCountMismatch { expected, got } => {
                write!(f, "read {} bloom filters but expected {}", got, expected)
            }
            BigsiError::OutOfRange { index, capacity } => {
                write!(f, "bit index {} out of range for capacity {}", index, capacity)
            }
            BigsiError::LengthMismatch { left, right } => {
                write!(f, "bitwise op on mismatched capacities ({} vs {})", left, right)
            }
            BigsiError::Corrupt { context } => write!(f, "corrupt value: {}", context),
            BigsiError::Storage { context, source } => {
                write!(f, "storage error during {}: {}", context, source)
            }
            BigsiError::Serialization(err) => write!(f, "JSON error: {}", err),
            BigsiError::Io {
                path,
                operation,
                source,
            } => {
                write!(
                    f,
                    "I/O error during {} on '{}': {}",
                    operation,
                    path.display(),
                    source
                )
            }
            BigsiError::InvalidSequence { path, detail } => {
                write!(f, "could not parse '{}': {}", path.display(), detail)
            }
            BigsiError::Watcher(err) => write!(f, "watcher error: {}", err),
            BigsiError::Thread(msg) => write!(f, "thread error: {}", msg),
            BigsiError::Daemon(msg) => write!(f, "daemon error: {}", msg),
            BigsiError::InvalidParameter(msg) => write!(f, "invalid parameter: {}", msg),
        }
    }
}

impl std::error::Error for BigsiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BigsiError::Storage { source, .. } => Some(source),
            BigsiError::Serialization(err) => Some(err),
            BigsiError::Io { source, .. } => Some(source),
            BigsiError::Watcher(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for BigsiError {
    fn from(err: serde_json::Error) -> Self {
        BigsiError::Serialization(err)
    }
}

impl From<std::io::Error> for BigsiError {
    fn from(err: std::io::Error) -> Self {
        BigsiError::Io {
            path: PathBuf::new(),
            operation: "unknown",
            source: err,
        }
    }
}

impl From<notify::Error> for BigsiError {
    fn from(err: notify::Error) -> Self {
        BigsiError::Watcher(err)
    }
}

/// Convenience type alias for Results using BigsiError.
pub type Result<T> = std::result::Result<T, BigsiError>;

impl BigsiError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, operation: &'static str, source: std::io::Error) -> Self {
        BigsiError::Io {
            path: path.into(),
            operation,
            source,
        }
    }

    /// Create a storage error with operation context.
    pub fn storage(context: impl Into<String>, source: rocksdb::Error) -> Self {
        BigsiError::Storage {
            context: context.into(),
            source,
        }
    }

    /// Create a corrupt-value error.
    pub fn corrupt(context: impl Into<String>) -> Self {
        BigsiError::Corrupt {
            context: context.into(),
        }
    }

    /// Create an invalid-parameter error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        BigsiError::InvalidParameter(msg.into())
    }
}
