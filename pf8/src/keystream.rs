//! Keystream recovery for pf8 archives
//!
//! pf8 encrypts every entry with the same repeating 20-byte XOR keystream,
//! restarting at position 0 for each entry. No key is stored anywhere, but
//! the leading bytes of PNG and OGG members are predictable, so the
//! keystream can be recovered from the archive's own contents:
//!
//! - PNG members expose keystream positions 0..16 directly through the file
//!   signature and the fixed IHDR length/type, and the IHDR CRC-32 acts as
//!   an oracle for a bounded search over the remaining four positions.
//! - OGG members expose all 20 positions through the beginning-of-stream
//!   page header, except the two that land in the serial-number field,
//!   which are solved through keystream periodicity.

use tracing::{debug, trace, warn};

use crate::{Error, KEYSTREAM_LENGTH, Keystream, Pf8Index, Result};

/// PNG file signature followed by the IHDR chunk's length and type fields.
///
/// These 16 bytes are identical in every valid PNG file.
const PNG_SIGNATURE_IHDR: [u8; 16] = [
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44, 0x52,
];

/// Legal types for the chunk that may follow IHDR.
const PNG_CHUNK_TYPES: [&str; 19] = [
    "PLTE", "IDAT", "bKGD", "cHRM", "dSIG", "eXIf", "gAMA", "hIST", "iCCP", "iTXt", "pHYs", "sBIT",
    "sPLT", "sRGB", "sTER", "tEXt", "tIME", "tRNS", "zTXt",
];

/// Leading 20 bytes of an OGG beginning-of-stream page: capture pattern,
/// stream structure version, header-type flag (0x02 = first page), and the
/// all-zero granule position. Positions 14..16 fall inside the bitstream
/// serial number and are not actually fixed.
const OGG_PAGE_HEADER: [u8; 20] = [
    0x4f, 0x67, 0x67, 0x53, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00,
];

/// A PNG member must reach through the next chunk's type (file byte 40) to
/// be usable as key material.
const PNG_MIN_LENGTH: usize = 41;

/// An OGG member must reach file bytes 72/73 for the serial-number fix-up.
const OGG_MIN_LENGTH: usize = 74;

/// Recover the archive's keystream from its own contents.
///
/// Tries the PNG strategy first, falling back to the OGG strategy when no
/// usable PNG member exists. Fails with [`Error::NoKeyMaterial`] when
/// neither strategy has a source member to work with.
pub fn recover(archive: &[u8], index: &Pf8Index) -> Result<Keystream> {
    if let Some(entry) = index.first_with_suffix(".png") {
        if let Some(keystream) = recover_from_png(entry.ciphertext(archive)) {
            debug!("Recovered keystream from PNG member {}", entry.name);
            trace!("Keystream: {}", hex::encode(keystream));
            return Ok(keystream);
        }
    }

    if let Some(entry) = index.first_with_suffix(".ogg") {
        let data = entry.ciphertext(archive);
        if data.len() < OGG_MIN_LENGTH {
            return Err(Error::NoKeyMaterial);
        }
        let keystream = recover_from_ogg(data);
        debug!("Recovered keystream from OGG member {}", entry.name);
        trace!("Keystream: {}", hex::encode(keystream));
        return Ok(keystream);
    }

    Err(Error::NoKeyMaterial)
}

/// Recover the keystream from an encrypted PNG member.
///
/// Returns `None` when the member is too short to cover the required file
/// offsets. When the checksum search exhausts without a match, positions
/// 16..20 are left unresolved (zero) and extraction is still attempted;
/// this is a known limitation rather than a hard failure.
pub fn recover_from_png(data: &[u8]) -> Option<Keystream> {
    if data.len() < PNG_MIN_LENGTH {
        return None;
    }

    let mut keystream = [0u8; KEYSTREAM_LENGTH];

    // File bytes 0..16 are fully predictable, giving positions 0..16.
    for (i, &plain) in PNG_SIGNATURE_IHDR.iter().enumerate() {
        keystream[i] = plain ^ data[i];
    }

    match search_ihdr_tail(data, &keystream) {
        Some(tail) => keystream[16..20].copy_from_slice(&tail),
        None => {
            warn!("IHDR checksum search exhausted; keystream positions 16..20 unresolved");
        }
    }

    Some(keystream)
}

/// Bounded search for keystream positions 16..20 using the IHDR CRC-32 as
/// an oracle.
///
/// The IHDR chunk spans file bytes 8..33; its CRC field (bytes 29..33)
/// decrypts with already-known keystream positions. The chunk that follows
/// IHDR has its type at bytes 37..41: the last type character decrypts with
/// position 0, narrowing the legal chunk-type list, and each surviving
/// candidate pins positions 17..20 while position 16 is brute-forced over
/// all 256 values. The first combination whose CRC-32 of the decrypted
/// type and payload matches the decrypted CRC field wins; uniqueness is
/// not verified.
pub fn search_ihdr_tail(data: &[u8], keystream: &Keystream) -> Option<[u8; 4]> {
    // Decrypted IHDR CRC field, file bytes 29..33 (positions 9..13).
    let mut expected_crc = [0u8; 4];
    for (i, crc_byte) in expected_crc.iter_mut().enumerate() {
        *crc_byte = data[29 + i] ^ keystream[(29 + i) % KEYSTREAM_LENGTH];
    }

    // Decrypted IHDR type + payload, file bytes 12..29. Bytes 16..20
    // depend on the unknown positions and are rewritten per guess.
    let mut chunk = [0u8; 17];
    for (i, chunk_byte) in chunk.iter_mut().enumerate() {
        *chunk_byte = data[12 + i] ^ keystream[(12 + i) % KEYSTREAM_LENGTH];
    }

    let last_char = (data[40] ^ keystream[0]) as char;
    let candidates = PNG_CHUNK_TYPES.iter().filter(|t| t.ends_with(last_char));

    for candidate in candidates {
        trace!("Trying chunk type candidate {candidate}");
        let t = candidate.as_bytes();
        let tail17 = t[0] ^ data[37];
        let tail18 = t[1] ^ data[38];
        let tail19 = t[2] ^ data[39];

        chunk[5] = data[17] ^ tail17;
        chunk[6] = data[18] ^ tail18;
        chunk[7] = data[19] ^ tail19;

        for tail16 in 0..=255u8 {
            chunk[4] = data[16] ^ tail16;

            if crc32fast::hash(&chunk).to_be_bytes() == expected_crc {
                return Some([tail16, tail17, tail18, tail19]);
            }
        }
    }

    None
}

/// Recover the keystream from an encrypted OGG member.
///
/// The caller must ensure the member reaches [`OGG_MIN_LENGTH`] bytes.
/// Positions 14/15 land in the serial-number field of the page header, but
/// file bytes 72/73 decrypt to the same plaintext as bytes 14/15 (the
/// serial number repeats in the second page header), so combining them
/// with the known positions 12/13 solves both. No checksum is available in
/// this path; the result is accepted unconditionally.
pub fn recover_from_ogg(data: &[u8]) -> Keystream {
    let mut keystream = [0u8; KEYSTREAM_LENGTH];

    for (i, &plain) in OGG_PAGE_HEADER.iter().enumerate() {
        keystream[i] = plain ^ data[i];
    }

    keystream[14] = (data[72] ^ keystream[72 % KEYSTREAM_LENGTH]) ^ data[14];
    keystream[15] = (data[73] ^ keystream[73 % KEYSTREAM_LENGTH]) ^ data[15];

    keystream
}

/// XOR `data` in place with the keystream, starting at position 0.
///
/// Encryption and decryption are the same operation. Every archive entry
/// restarts the keystream at position 0; there is no running offset across
/// entries.
pub fn apply_keystream(data: &mut [u8], keystream: &Keystream) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= keystream[i % KEYSTREAM_LENGTH];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TEST_KEY: Keystream = [
        0xd3, 0x41, 0x9c, 0x07, 0x5a, 0xee, 0x12, 0x80, 0x33, 0xc4, 0x6f, 0x01, 0xb2, 0x98, 0x5d,
        0xe0, 0x77, 0x2a, 0xf5, 0x4b,
    ];

    /// Build a plausible plaintext PNG prefix: signature, a valid IHDR
    /// chunk, then the length and type of a follow-up chunk.
    fn plaintext_png(next_chunk_type: &str) -> Vec<u8> {
        let mut png = Vec::new();
        png.extend_from_slice(&[0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a]);
        png.extend_from_slice(&13u32.to_be_bytes());

        let mut ihdr = Vec::new();
        ihdr.extend_from_slice(b"IHDR");
        ihdr.extend_from_slice(&640u32.to_be_bytes()); // width
        ihdr.extend_from_slice(&480u32.to_be_bytes()); // height
        ihdr.extend_from_slice(&[8, 6, 0, 0, 0]); // depth, color type, etc.
        png.extend_from_slice(&ihdr);
        png.extend_from_slice(&crc32fast::hash(&ihdr).to_be_bytes());

        png.extend_from_slice(&4u32.to_be_bytes());
        png.extend_from_slice(next_chunk_type.as_bytes());
        png
    }

    fn encrypt(plain: &[u8], keystream: &Keystream) -> Vec<u8> {
        let mut data = plain.to_vec();
        apply_keystream(&mut data, keystream);
        data
    }

    #[test]
    fn test_png_recovers_exact_keystream() {
        let data = encrypt(&plaintext_png("sRGB"), &TEST_KEY);
        let keystream = recover_from_png(&data).unwrap();
        assert_eq!(keystream, TEST_KEY);
    }

    #[test]
    fn test_png_candidate_suffix_collision() {
        // "tEXt", "iTXt" and "zTXt" all end in 't'; only the CRC oracle can
        // tell the true follow-up chunk apart from the earlier candidates.
        let data = encrypt(&plaintext_png("zTXt"), &TEST_KEY);
        let keystream = recover_from_png(&data).unwrap();
        assert_eq!(keystream, TEST_KEY);
    }

    #[test]
    fn test_png_search_accepts_first_match() {
        // First match wins by contract: with an intact CRC the search stops
        // at the true combination, which is also the first one to validate.
        let data = encrypt(&plaintext_png("gAMA"), &TEST_KEY);

        let mut keystream = [0u8; KEYSTREAM_LENGTH];
        for (i, &plain) in PNG_SIGNATURE_IHDR.iter().enumerate() {
            keystream[i] = plain ^ data[i];
        }

        let tail = search_ihdr_tail(&data, &keystream).unwrap();
        assert_eq!(tail, [TEST_KEY[16], TEST_KEY[17], TEST_KEY[18], TEST_KEY[19]]);
    }

    #[test]
    fn test_png_search_exhaustion_leaves_tail_unresolved() {
        let mut plain = plaintext_png("IDAT");
        // Corrupt the stored IHDR CRC so no candidate can validate.
        plain[29] ^= 0xff;
        let data = encrypt(&plain, &TEST_KEY);

        let keystream = recover_from_png(&data).unwrap();
        assert_eq!(keystream[..16], TEST_KEY[..16]);
        assert_eq!(keystream[16..], [0, 0, 0, 0]);
    }

    #[test]
    fn test_png_too_short_yields_nothing() {
        let data = encrypt(&plaintext_png("IDAT")[..40], &TEST_KEY);
        assert!(recover_from_png(&data).is_none());
    }

    /// Build a plaintext OGG prefix: beginning-of-stream page header with a
    /// non-zero serial number, padded out so the second page header repeats
    /// the serial at file bytes 72/73.
    fn plaintext_ogg(serial: [u8; 2]) -> Vec<u8> {
        let mut ogg = vec![0u8; 80];
        ogg[..4].copy_from_slice(b"OggS");
        ogg[5] = 0x02; // beginning-of-stream flag
        ogg[14] = serial[0];
        ogg[15] = serial[1];
        ogg[72] = serial[0];
        ogg[73] = serial[1];
        ogg
    }

    #[test]
    fn test_ogg_recovers_exact_keystream() {
        let data = encrypt(&plaintext_ogg([0xde, 0xad]), &TEST_KEY);
        let keystream = recover_from_ogg(&data);
        assert_eq!(keystream, TEST_KEY);
    }

    #[test]
    fn test_ogg_zero_serial_needs_no_fixup() {
        let data = encrypt(&plaintext_ogg([0, 0]), &TEST_KEY);
        let keystream = recover_from_ogg(&data);
        assert_eq!(keystream, TEST_KEY);
    }

    #[test]
    fn test_apply_keystream_restarts_per_call() {
        let mut first = *b"hello world, this is a long buffer";
        let mut second = *b"hello world, this is a long buffer";
        apply_keystream(&mut first, &TEST_KEY);
        apply_keystream(&mut second, &TEST_KEY);
        assert_eq!(first, second);

        apply_keystream(&mut first, &TEST_KEY);
        assert_eq!(&first, b"hello world, this is a long buffer");
    }
}
