//! Archive writer
//!
//! Serializes a walked tree into the layout described in
//! [`format`](crate::format). Every header record needs its file's final
//! offset into the content section, so writing happens in two passes:
//!
//! 1. **Content**: visit files in pre-order, stream each one into an
//!    anonymous temporary file and record `offset`/`size` on its node.
//! 2. **Header**: visit the annotated tree in pre-order and encode each
//!    record into memory.
//!
//! The archive is then assembled in a temporary file next to the destination
//! (signature, header, content) and renamed over it. Nothing at the
//! destination changes unless every step succeeded.
//!
//! A file that cannot be opened is stored with size zero and a warning; a
//! read error part-way through keeps the bytes copied so far.

use crate::error::{DctxError, Result};
use crate::format::{put_u16, put_u32, put_u64, KIND_DIRECTORY, KIND_FILE, MAX_PATH_LEN, SIGNATURE};
use crate::tree::{NodeKind, TreeNode};
use crate::types::WriteStats;
use crate::utils::CHUNK_SIZE;
use std::fs::File;
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, instrument, warn};

/// Write `root` as an archive at `dest`.
///
/// On success every file node in `root` carries its final content offset and
/// the number of bytes actually stored.
///
/// # Errors
///
/// - [`DctxError::RootNotDirectory`] if `root` is not the root directory
/// - [`DctxError::PathTooLong`] if a path cannot be encoded
/// - [`DctxError::Io`] / [`DctxError::Persist`] if the work areas or the
///   destination cannot be written
#[instrument(skip(root), fields(dest = %dest.display()))]
pub fn write_archive(dest: &Path, root: &mut TreeNode) -> Result<WriteStats> {
    if !root.is_dir() || !root.relative_path.is_empty() {
        return Err(DctxError::RootNotDirectory);
    }

    let mut stats = WriteStats::default();

    // Pass 1
    let mut content = BufWriter::new(tempfile::tempfile()?);
    let mut offset = 0u64;
    collect_content(root, &mut content, &mut offset, &mut stats)?;
    let mut content = content.into_inner().map_err(|e| e.into_error())?;
    content.seek(SeekFrom::Start(0))?;
    stats.content_bytes = offset;

    // Pass 2
    let mut header = Vec::new();
    encode_node(root, &mut header, &mut stats)?;
    stats.header_bytes = header.len() as u64;

    // Assembly
    let dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut staged = NamedTempFile::new_in(dir)?;
    {
        let mut out = BufWriter::new(staged.as_file_mut());
        out.write_all(SIGNATURE)?;
        out.write_all(&header)?;
        let copied = io::copy(&mut content, &mut out)?;
        if copied != stats.content_bytes {
            return Err(DctxError::internal(format!(
                "content work area holds {} bytes, expected {}",
                copied, stats.content_bytes
            )));
        }
        out.flush()?;
    }
    staged.as_file().sync_all()?;
    staged.persist(dest)?;

    debug!(
        "Wrote archive {}: {} files, {} dirs, header {} bytes, content {} bytes",
        dest.display(),
        stats.files,
        stats.directories,
        stats.header_bytes,
        stats.content_bytes
    );
    Ok(stats)
}

/// Pass 1: stream file bytes into `sink` and annotate offsets
fn collect_content<W: Write>(
    node: &mut TreeNode,
    sink: &mut W,
    offset: &mut u64,
    stats: &mut WriteStats,
) -> Result<()> {
    let disk_path = node.disk_path.clone();
    match &mut node.kind {
        NodeKind::Directory { children } => {
            for child in children.iter_mut() {
                collect_content(child, sink, offset, stats)?;
            }
        }
        NodeKind::File {
            offset: file_offset,
            size,
        } => {
            *file_offset = *offset;
            *size = match disk_path {
                Some(path) => match File::open(&path) {
                    Ok(source) => copy_counted(source, sink, &node.relative_path)?,
                    Err(e) => {
                        warn!("Cannot open {}, storing it empty: {}", path.display(), e);
                        stats.unreadable_files += 1;
                        0
                    }
                },
                None => {
                    warn!("{} has no source on disk, storing it empty", node.relative_path);
                    stats.unreadable_files += 1;
                    0
                }
            };
            *offset += *size;
        }
    }
    Ok(())
}

/// Copy `source` into `sink`, returning the number of bytes copied.
///
/// Read failures end the copy early and keep what was copied; write failures
/// are fatal.
fn copy_counted<R: Read, W: Write>(mut source: R, sink: &mut W, label: &str) -> Result<u64> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut copied = 0u64;
    loop {
        let n = match source.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!("Read error in {} after {} bytes, keeping partial content: {}", label, copied, e);
                break;
            }
        };
        sink.write_all(&buf[..n])?;
        copied += n as u64;
    }
    Ok(copied)
}

/// Pass 2: append one record and, for directories, all descendants
fn encode_node(node: &TreeNode, buf: &mut Vec<u8>, stats: &mut WriteStats) -> Result<()> {
    let path = node.relative_path.as_bytes();
    if path.len() > MAX_PATH_LEN {
        return Err(DctxError::PathTooLong {
            len: path.len(),
            limit: MAX_PATH_LEN,
        });
    }

    match &node.kind {
        NodeKind::File { offset, size } => {
            buf.push(KIND_FILE);
            put_u16(buf, path.len() as u16);
            buf.extend_from_slice(path);
            put_u64(buf, node.modified);
            put_u64(buf, *offset);
            put_u64(buf, *size);
            stats.files += 1;
        }
        NodeKind::Directory { children } => {
            let count = u32::try_from(children.len()).map_err(|_| {
                DctxError::corrupt(format!("{} has too many children", node.relative_path))
            })?;
            buf.push(KIND_DIRECTORY);
            put_u16(buf, path.len() as u16);
            buf.extend_from_slice(path);
            put_u64(buf, node.modified);
            put_u32(buf, count);
            stats.directories += 1;
            for child in children {
                encode_node(child, buf, stats)?;
            }
        }
    }
    Ok(())
}
