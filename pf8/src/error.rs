//! Error types for pf8 parsing, key recovery and extraction

use std::path::PathBuf;

use thiserror::Error;

/// Result type for pf8 operations
pub type Result<T> = std::result::Result<T, Error>;

/// pf8 error types
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid pf8 magic bytes
    #[error("Invalid pf8 magic: expected 'pf8', got {0:?}")]
    InvalidMagic([u8; 3]),

    /// Archive ended in the middle of a header field or entry record
    #[error("Truncated archive: expected {expected} bytes, got {actual}")]
    TruncatedArchive { expected: u64, actual: u64 },

    /// Entry name is not valid UTF-8
    #[error("Entry {index} has a non-UTF-8 name")]
    InvalidName { index: usize },

    /// No PNG or OGG member to recover the keystream from
    #[error("No key material: archive contains no usable .png or .ogg member")]
    NoKeyMaterial,

    /// Failed to create or write an output file
    #[error("Failed to write {path}: {source}")]
    Filesystem {
        path: PathBuf,
        source: std::io::Error,
    },
}
