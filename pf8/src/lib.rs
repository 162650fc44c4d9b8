//! pf8 archive reader and decryptor
//!
//! pf8 is the encrypted resource container used by Artemis-engine games:
//! a little-endian entry table followed by file data, with every entry
//! XOR-encrypted under one archive-wide repeating 20-byte keystream. The
//! keystream is never stored; this crate recovers it from the archive's
//! own PNG or OGG members via a known-plaintext attack and then
//! materializes every entry into a destination tree.
//!
//! The pipeline is a pure function of (archive bytes, destination path):
//! no state persists between invocations, and concurrent invocations are
//! safe as long as their destination directories are disjoint.

pub mod error;
pub mod extract;
pub mod index;
pub mod keystream;

pub use error::{Error, Result};
pub use extract::{ExtractReport, extract_archive, extract_entries};
pub use index::{Pf8Entry, Pf8Index};
pub use keystream::{apply_keystream, recover};

use std::fs;
use std::path::Path;

/// pf8 magic bytes
pub const PF8_MAGIC: [u8; 3] = *b"pf8";

/// Length of the repeating XOR keystream in bytes
pub const KEYSTREAM_LENGTH: usize = 20;

/// The archive-wide repeating XOR keystream.
///
/// Applied per entry as `plaintext[i] = ciphertext[i] ^ keystream[i % 20]`,
/// restarting at position 0 for every entry.
pub type Keystream = [u8; KEYSTREAM_LENGTH];

/// A loaded pf8 archive: the immutable whole-file buffer plus its parsed
/// entry table.
#[derive(Debug, Clone)]
pub struct Pf8Archive {
    data: Vec<u8>,
    index: Pf8Index,
}

impl Pf8Archive {
    /// Read an archive from disk and parse its index.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_bytes(fs::read(path)?)
    }

    /// Parse an archive from an in-memory buffer.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let index = Pf8Index::parse(&data)?;
        Ok(Self { data, index })
    }

    /// The parsed entry table.
    pub fn index(&self) -> &Pf8Index {
        &self.index
    }

    /// The raw archive bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Recover the archive's keystream from its own PNG or OGG members.
    pub fn recover_keystream(&self) -> Result<Keystream> {
        keystream::recover(&self.data, &self.index)
    }

    /// Decrypt every entry and write it under `dest`. Returns the number
    /// of files written.
    pub fn extract_to<P: AsRef<Path>>(&self, keystream: &Keystream, dest: P) -> Result<usize> {
        extract::extract_entries(&self.data, &self.index, keystream, dest.as_ref())
    }
}
