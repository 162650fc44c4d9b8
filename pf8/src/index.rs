//! pf8 index parsing
//!
//! Handles parsing of the pf8 archive header and entry table.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};
use tracing::debug;

use crate::{Error, PF8_MAGIC, Result};

/// One logical file stored inside a pf8 archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pf8Entry {
    /// Relative path of the entry, normalized to forward slashes.
    pub name: String,

    /// Absolute offset of the entry's ciphertext within the archive buffer.
    pub offset: u32,

    /// Size of the entry's ciphertext in bytes.
    pub size: u32,
}

impl Pf8Entry {
    /// Slice this entry's ciphertext out of the archive buffer.
    ///
    /// The range is validated during [`Pf8Index::parse`], so this cannot
    /// go out of bounds for an index parsed from the same buffer.
    pub fn ciphertext<'a>(&self, archive: &'a [u8]) -> &'a [u8] {
        let start = self.offset as usize;
        let end = start + self.size as usize;
        &archive[start..end]
    }
}

/// Ordered entry table of a pf8 archive.
///
/// Built once per archive and immutable thereafter. Duplicate names are
/// permitted; extraction order decides which one ends up on disk.
#[derive(Debug, Clone)]
pub struct Pf8Index {
    entries: Vec<Pf8Entry>,
}

impl Pf8Index {
    /// Parse the index table from a whole-archive buffer.
    ///
    /// Layout (little-endian): `magic[3]`, `index_size: u32` (consumed but
    /// not validated), `entry_count: u32`, then `entry_count` records of
    /// `{name_len: u32, name: utf8[name_len], reserved: u32, offset: u32,
    /// size: u32}`.
    ///
    /// Any read past the buffer end aborts the whole parse with
    /// [`Error::TruncatedArchive`]; no partial entry list is returned.
    pub fn parse(archive: &[u8]) -> Result<Self> {
        let length = archive.len() as u64;
        let mut cursor = Cursor::new(archive);

        let mut magic = [0; PF8_MAGIC.len()];
        read_field(&mut cursor, length, &mut magic)?;
        if magic != PF8_MAGIC {
            return Err(Error::InvalidMagic(magic));
        }

        // Index size in bytes. Only consumed to advance the cursor.
        let index_size = read_u32(&mut cursor, length)?;

        let entry_count = read_u32(&mut cursor, length)?;
        debug!("Entry count: {entry_count}, index size: {index_size}");

        let mut entries = Vec::new();
        for index in 0..entry_count as usize {
            let name_len = read_u32(&mut cursor, length)?;
            let name_bytes = read_bytes(&mut cursor, length, name_len as usize)?;
            let name = String::from_utf8(name_bytes)
                .map_err(|_| Error::InvalidName { index })?
                .replace('\\', "/");

            // Reserved field, always observed as zero.
            let _reserved = read_u32(&mut cursor, length)?;

            let offset = read_u32(&mut cursor, length)?;
            let size = read_u32(&mut cursor, length)?;

            let end = u64::from(offset) + u64::from(size);
            if end > length {
                // The entry's data range would overrun the buffer.
                return Err(Error::TruncatedArchive {
                    expected: end,
                    actual: length,
                });
            }

            entries.push(Pf8Entry { name, offset, size });
        }

        Ok(Self { entries })
    }

    /// All entries in file order.
    pub fn entries(&self) -> &[Pf8Entry] {
        &self.entries
    }

    /// Number of entries in the index.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First entry whose normalized name ends with `suffix`.
    pub fn first_with_suffix(&self, suffix: &str) -> Option<&Pf8Entry> {
        self.entries.iter().find(|e| e.name.ends_with(suffix))
    }
}

/// Read `buf.len()` bytes, reporting a truncation instead of an IO error
/// when the buffer cannot satisfy the read.
fn read_field(cursor: &mut Cursor<&[u8]>, length: u64, buf: &mut [u8]) -> Result<()> {
    let expected = cursor.position() + buf.len() as u64;
    if expected > length {
        return Err(Error::TruncatedArchive {
            expected,
            actual: length,
        });
    }
    cursor.read_exact(buf)?;
    Ok(())
}

/// Read `count` bytes into a fresh buffer. Bounds are checked before the
/// allocation so a bogus length field cannot trigger a huge allocation.
fn read_bytes(cursor: &mut Cursor<&[u8]>, length: u64, count: usize) -> Result<Vec<u8>> {
    let expected = cursor.position() + count as u64;
    if expected > length {
        return Err(Error::TruncatedArchive {
            expected,
            actual: length,
        });
    }
    let mut buf = vec![0; count];
    cursor.read_exact(&mut buf)?;
    Ok(buf)
}

fn read_u32(cursor: &mut Cursor<&[u8]>, length: u64) -> Result<u32> {
    let expected = cursor.position() + 4;
    if expected > length {
        return Err(Error::TruncatedArchive {
            expected,
            actual: length,
        });
    }
    Ok(cursor.read_u32::<LittleEndian>()?)
}
