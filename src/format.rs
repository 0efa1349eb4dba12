//! Archive binary layout
//!
//! ```text
//! [signature "DIRCTXTV"][header: pre-order node records][content: file bytes]
//!
//! node record:
//!   kind      u8     0 = file, 1 = directory
//!   path_len  u16
//!   path      path_len bytes, UTF-8, relative to the root ("" for the root)
//!   mtime     u64    seconds since the Unix epoch
//!   file:      offset u64, size u64   (relative to the content section)
//!   directory: child_count u32        (children follow immediately)
//! ```
//!
//! All integers are little-endian.

use crate::error::{DctxError, Result};
use std::io::Read;

/// Leading bytes of every archive
pub const SIGNATURE: &[u8; 8] = b"DIRCTXTV";

/// Longest relative path an archive can store, in bytes
pub const MAX_PATH_LEN: usize = 4096;

/// Kind tag for file records
pub const KIND_FILE: u8 = 0;

/// Kind tag for directory records
pub const KIND_DIRECTORY: u8 = 1;

pub(crate) fn put_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_le_bytes());
}

pub(crate) fn put_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

pub(crate) fn put_u64(buf: &mut Vec<u8>, value: u64) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn take<const N: usize, R: Read>(reader: &mut R) -> Result<[u8; N]> {
    let mut bytes = [0u8; N];
    reader
        .read_exact(&mut bytes)
        .map_err(DctxError::from_archive_io)?;
    Ok(bytes)
}

pub(crate) fn get_u8<R: Read>(reader: &mut R) -> Result<u8> {
    Ok(take::<1, _>(reader)?[0])
}

pub(crate) fn get_u16<R: Read>(reader: &mut R) -> Result<u16> {
    take(reader).map(u16::from_le_bytes)
}

pub(crate) fn get_u32<R: Read>(reader: &mut R) -> Result<u32> {
    take(reader).map(u32::from_le_bytes)
}

pub(crate) fn get_u64<R: Read>(reader: &mut R) -> Result<u64> {
    take(reader).map(u64::from_le_bytes)
}

/// Read and check the archive signature
pub(crate) fn check_signature<R: Read>(reader: &mut R) -> Result<()> {
    let found: [u8; 8] = take(reader)?;
    if &found == SIGNATURE {
        Ok(())
    } else {
        Err(DctxError::InvalidSignature)
    }
}
