//! Utility functions for dircontxt
//!
//! Small helpers shared by the walker, the renderer and the CLI: timestamp
//! conversion, byte formatting, and the chunked stream comparison used to
//! verify suspected modifications.

use chrono::{DateTime, Utc};
use std::fs::Metadata;
use std::io::{self, Read};
use std::time::{SystemTime, UNIX_EPOCH};

/// Chunk size for content copies and comparisons (64 KiB)
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Modification time of `metadata` in whole seconds since the Unix epoch.
///
/// Platforms that cannot report a modification time, and timestamps before
/// the epoch, yield `0`.
pub fn mtime_secs(metadata: &Metadata) -> u64 {
    metadata.modified().map(system_time_secs).unwrap_or(0)
}

/// Whole seconds since the Unix epoch, clamped at zero
pub fn system_time_secs(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Render epoch seconds as an RFC 3339 UTC timestamp
///
/// Out-of-range values fall back to the raw number.
pub fn format_timestamp(secs: u64) -> String {
    i64::try_from(secs)
        .ok()
        .and_then(|s| DateTime::<Utc>::from_timestamp(s, 0))
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| secs.to_string())
}

/// Format bytes as human-readable string
///
/// # Example
///
/// ```rust
/// use dircontxt::utils::format_bytes;
///
/// assert_eq!(format_bytes(512), "512 B");
/// assert_eq!(format_bytes(1536), "1.50 KB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", bytes, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

/// Compare two streams chunk by chunk.
///
/// Both streams are expected to hold `len` bytes. Returns `Ok(true)` only if
/// the first `len` bytes are identical and `left` has nothing beyond them.
/// A stream that ends early yields `Ok(false)`; any other read failure is
/// returned.
pub fn streams_equal<L: Read, R: Read>(mut left: L, mut right: R, len: u64) -> io::Result<bool> {
    let mut left_buf = vec![0u8; CHUNK_SIZE];
    let mut right_buf = vec![0u8; CHUNK_SIZE];
    let mut remaining = len;

    while remaining > 0 {
        let chunk = remaining.min(CHUNK_SIZE as u64) as usize;
        if !fill(&mut left, &mut left_buf[..chunk])? || !fill(&mut right, &mut right_buf[..chunk])? {
            return Ok(false);
        }
        if left_buf[..chunk] != right_buf[..chunk] {
            return Ok(false);
        }
        remaining -= chunk as u64;
    }

    // The left side is the live file; it may have grown since it was sized
    let mut probe = [0u8; 1];
    loop {
        match left.read(&mut probe) {
            Ok(0) => return Ok(true),
            Ok(_) => return Ok(false),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Fill `buf` completely; `Ok(false)` if the stream ends first
fn fill<R: Read>(stream: &mut R, buf: &mut [u8]) -> io::Result<bool> {
    match stream.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.00 MB");
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "1970-01-01T00:00:00+00:00");
        assert_eq!(format_timestamp(u64::MAX), u64::MAX.to_string());
    }

    #[test]
    fn test_streams_equal() {
        let data = vec![7u8; CHUNK_SIZE * 2 + 3];
        let len = data.len() as u64;
        assert!(streams_equal(Cursor::new(&data), Cursor::new(&data), len).unwrap());

        let mut other = data.clone();
        *other.last_mut().unwrap() = 8;
        assert!(!streams_equal(Cursor::new(&data), Cursor::new(&other), len).unwrap());
    }

    #[test]
    fn test_streams_equal_length_mismatch() {
        // Right side shorter than announced
        assert!(!streams_equal(Cursor::new(b"abcd"), Cursor::new(b"ab"), 4).unwrap());
        // Left side grew past the announced length
        assert!(!streams_equal(Cursor::new(b"abcdef"), Cursor::new(b"abcd"), 4).unwrap());
        assert!(streams_equal(Cursor::new(b""), Cursor::new(b""), 0).unwrap());
    }
}
