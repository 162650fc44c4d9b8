//! Decryption and materialization of pf8 entries
//!
//! Writes every decrypted entry under a destination root, creating
//! intermediate directories as needed. Extraction is deliberately
//! non-atomic: a mid-run failure leaves a partially populated tree.

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::keystream::apply_keystream;
use crate::{Error, Keystream, Pf8Archive, Pf8Index, Result};

/// Aggregate pass/fail report for one extraction request.
///
/// This is the whole collaborator-facing surface: callers supply an archive
/// path and a destination path and display the message. There is no
/// per-entry error list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractReport {
    pub success: bool,
    pub message: String,
}

/// Decrypt every entry and write it under `dest`.
///
/// Entries are processed in index order; a later entry with the same
/// normalized name overwrites an earlier one. The destination root and any
/// intermediate directories are created as needed. Returns the number of
/// files written.
pub fn extract_entries(
    archive: &[u8],
    index: &Pf8Index,
    keystream: &Keystream,
    dest: &Path,
) -> Result<usize> {
    create_dir_all(dest)?;

    for entry in index.entries() {
        let mut plain = entry.ciphertext(archive).to_vec();
        apply_keystream(&mut plain, keystream);

        let path = dest.join(&entry.name);
        if let Some(parent) = path.parent() {
            create_dir_all(parent)?;
        }
        fs::write(&path, &plain).map_err(|source| Error::Filesystem {
            path: path.clone(),
            source,
        })?;

        debug!("Wrote {} ({} bytes)", path.display(), plain.len());
    }

    Ok(index.len())
}

/// Run the whole pipeline for one request: load the archive, parse its
/// index, recover the keystream, and materialize every entry under `dest`.
///
/// All failures are folded into a single [`ExtractReport`] whose message
/// distinguishes a missing archive file, a malformed archive, failed key
/// recovery, and generic I/O errors.
pub fn extract_archive(archive_path: &Path, dest: &Path) -> ExtractReport {
    match run(archive_path, dest) {
        Ok(written) => {
            info!("Extracted {written} files to {}", dest.display());
            ExtractReport {
                success: true,
                message: "Extraction complete!".to_string(),
            }
        }
        Err(err) => ExtractReport {
            success: false,
            message: err.to_string(),
        },
    }
}

fn run(archive_path: &Path, dest: &Path) -> Result<usize> {
    if !archive_path.is_file() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Archive file not found: {}", archive_path.display()),
        )));
    }

    let archive = Pf8Archive::open(archive_path)?;
    let keystream = archive.recover_keystream()?;
    archive.extract_to(&keystream, dest)
}

fn create_dir_all(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|source| Error::Filesystem {
        path: path.to_path_buf(),
        source,
    })
}
