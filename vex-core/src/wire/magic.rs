//! Magic + version header (`spec.md` §4.D).
//!
//! Layout: `[4 bytes base magic][2 bytes little-endian version][1 byte
//! flags]`. The base magic identifies the toolkit; the version selects
//! which wire-layout revision follows; the flags byte declares which
//! optional trailing checksums the frame carries. A competing well-known
//! magic (e.g. Zstd's `0xFD2FB528`) is recognized and mapped to
//! `HeaderUnknown` rather than `Corruption`, per `spec.md` §4.D.

use crate::error::{Error, ErrorCode, Result};

/// The toolkit's base magic bytes, little-endian.
pub const BASE_MAGIC: [u8; 4] = *b"VXZ1";

/// Zstandard's frame magic, recognized so that feeding a `.zst` file
/// produces a distinct, more useful error than generic corruption.
const ZSTD_MAGIC: [u8; 4] = 0x28_B5_2F_FDu32.to_le_bytes();

/// Minimum format version this build's decoder will accept.
pub const MIN_VERSION: u16 = 1;
/// Maximum format version this build's encoder/decoder supports.
pub const MAX_VERSION: u16 = 3;

/// Header byte length (`BASE_MAGIC` + 2-byte version + 1-byte flags).
pub const HEADER_LEN: usize = 7;

/// Write the header for `version`/`flags` into `out`. Does not itself
/// validate `version` against `[MIN_VERSION, MAX_VERSION]`; callers
/// validate before writing so that no output bytes are ever produced for
/// a rejected version (`spec.md` §4.D, §8 "Format-version floor").
pub fn write_header(version: u16, flags: u8, out: &mut Vec<u8>) -> Result<()> {
    validate_version(version)?;
    out.extend_from_slice(&BASE_MAGIC);
    out.extend_from_slice(&version.to_le_bytes());
    out.push(flags);
    Ok(())
}

/// Parse and validate the header at the front of `input`, returning
/// `(version, flags, bytes_consumed)`.
pub fn read_header(input: &[u8]) -> Result<(u16, u8, usize)> {
    if input.len() < HEADER_LEN {
        return Err(Error::new(
            ErrorCode::SrcSizeTooSmall,
            "input shorter than the magic+version+flags header",
        ));
    }
    let magic: [u8; 4] = input[0..4].try_into().unwrap();
    if magic == ZSTD_MAGIC {
        return Err(Error::new(
            ErrorCode::HeaderUnknown,
            "input is a Zstandard frame, not a vex frame",
        ));
    }
    if magic != BASE_MAGIC {
        return Err(Error::new(
            ErrorCode::HeaderUnknown,
            format!("unrecognized magic bytes {magic:02x?}"),
        ));
    }
    let version = u16::from_le_bytes(input[4..6].try_into().unwrap());
    validate_version(version)?;
    let flags = input[6];
    Ok((version, flags, HEADER_LEN))
}

/// Validate that `version` is within `[MIN_VERSION, MAX_VERSION]`, without
/// reading or writing any bytes. Used before a compress call begins.
pub fn validate_version(version: u16) -> Result<()> {
    if version < MIN_VERSION || version > MAX_VERSION {
        return Err(Error::new(
            ErrorCode::FormatVersionUnsupported,
            format!("version {version} is outside [{MIN_VERSION}, {MAX_VERSION}]"),
        ));
    }
    Ok(())
}
