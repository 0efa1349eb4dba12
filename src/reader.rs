//! Archive reader
//!
//! Reconstructs the tree stored in an archive header without touching the
//! content section, and fetches individual files' bytes on demand.
//!
//! Header parsing walks the pre-order record stream with an explicit stack:
//! a directory record is followed by exactly `child_count` complete subtrees.
//! Beyond the signature and truncation checks, the reader rejects headers
//! that would break tree invariants: unknown kind tags, non-UTF-8 paths,
//! children whose path is not `parent/name`, duplicate siblings, and file
//! ranges that fall outside the content section.
//!
//! ## Example
//!
//! ```rust,no_run
//! use dircontxt::reader::Archive;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut archive = Archive::open("project.dircontxt")?;
//! let bytes = archive.read_path("src/main.c")?;
//! println!("{} bytes", bytes.len());
//! # Ok(())
//! # }
//! ```

use crate::error::{DctxError, Result};
use crate::format::{check_signature, get_u16, get_u32, get_u64, get_u8, KIND_DIRECTORY, KIND_FILE, MAX_PATH_LEN};
use crate::tree::{child_name, NodeKind, TreeNode};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom, Take};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Upper bound on speculative child-list preallocation
const MAX_PREALLOC: usize = 1024;

/// Parsed archive header
#[derive(Debug, Clone)]
pub struct ArchiveHeader {
    /// Root directory of the stored tree
    pub root: TreeNode,
    /// Absolute file offset where the content section begins
    pub content_start: u64,
    /// Length of the content section in bytes
    pub content_len: u64,
}

/// Read and validate the header of the archive at `path`.
///
/// # Errors
///
/// - [`DctxError::InvalidSignature`] if the file is not an archive
/// - [`DctxError::TruncatedArchive`] if the header ends early
/// - [`DctxError::PathTooLong`] if a record's path length exceeds the limit
/// - [`DctxError::RootNotDirectory`] if the first record is not a directory
/// - [`DctxError::CorruptArchive`] for any other structural inconsistency
#[instrument(fields(path = %path.as_ref().display()), skip(path))]
pub fn read_header(path: impl AsRef<Path>) -> Result<ArchiveHeader> {
    let mut file = File::open(path.as_ref())?;
    read_header_from(&mut file)
}

/// Parse a header from any seekable source positioned at the signature.
pub fn read_header_from<R: Read + Seek>(source: &mut R) -> Result<ArchiveHeader> {
    let mut reader = BufReader::new(source);
    check_signature(&mut reader)?;

    let root = decode_tree(&mut reader)?;
    if !root.is_dir() {
        return Err(DctxError::RootNotDirectory);
    }
    if !root.relative_path.is_empty() {
        return Err(DctxError::corrupt(format!(
            "root path is {:?}, expected empty",
            root.relative_path
        )));
    }

    let content_start = reader.stream_position()?;
    let total_len = reader.seek(SeekFrom::End(0))?;
    let content_len = total_len.saturating_sub(content_start);

    for node in root.iter() {
        if let Some((offset, size)) = node.content_range() {
            let in_range = offset
                .checked_add(size)
                .is_some_and(|end| end <= content_len);
            if !in_range {
                return Err(DctxError::corrupt(format!(
                    "{} spans {}+{} beyond content section of {} bytes",
                    node.relative_path, offset, size, content_len
                )));
            }
        }
    }

    debug!(
        "Read header: {} nodes, content section at {} ({} bytes)",
        root.iter().count(),
        content_start,
        content_len
    );
    Ok(ArchiveHeader {
        root,
        content_start,
        content_len,
    })
}

/// A directory whose children are still being decoded
struct OpenDir {
    relative_path: String,
    modified: u64,
    remaining: usize,
    children: Vec<TreeNode>,
    names: HashSet<String>,
}

impl OpenDir {
    fn close(self) -> TreeNode {
        TreeNode {
            relative_path: self.relative_path,
            modified: self.modified,
            kind: NodeKind::Directory {
                children: self.children,
            },
            disk_path: None,
        }
    }
}

/// One decoded record; directories carry their pending child count
enum Record {
    Complete(TreeNode),
    Open(OpenDir),
}

/// Decode the record stream into a tree.
///
/// Open directories live on an explicit stack, so deep nesting cannot
/// exhaust the call stack.
fn decode_tree<R: Read>(reader: &mut R) -> Result<TreeNode> {
    let mut open: Vec<OpenDir> = Vec::new();
    loop {
        let parent = open
            .last_mut()
            .map(|dir| (dir.relative_path.as_str(), &mut dir.names));
        let mut done = match decode_record(reader, parent)? {
            Record::Open(dir) if dir.remaining > 0 => {
                open.push(dir);
                continue;
            }
            Record::Open(dir) => dir.close(),
            Record::Complete(node) => node,
        };

        loop {
            let Some(top) = open.last_mut() else {
                return Ok(done);
            };
            top.children.push(done);
            top.remaining -= 1;
            if top.remaining > 0 {
                break;
            }
            match open.pop() {
                Some(finished) => done = finished.close(),
                None => return Err(DctxError::internal("open directory stack emptied")),
            }
        }
    }
}

/// Decode a single record.
///
/// `parent` is the enclosing directory's path and the names already taken
/// in it. The record's path is checked against it before anything after
/// the path is read.
fn decode_record<R: Read>(
    reader: &mut R,
    parent: Option<(&str, &mut HashSet<String>)>,
) -> Result<Record> {
    let kind = get_u8(reader)?;
    let path_len = get_u16(reader)? as usize;
    if path_len > MAX_PATH_LEN {
        return Err(DctxError::PathTooLong {
            len: path_len,
            limit: MAX_PATH_LEN,
        });
    }
    let mut path_bytes = vec![0u8; path_len];
    reader
        .read_exact(&mut path_bytes)
        .map_err(DctxError::from_archive_io)?;
    let relative_path = String::from_utf8(path_bytes)
        .map_err(|_| DctxError::corrupt("path is not valid UTF-8"))?;

    if let Some((parent_path, names)) = parent {
        let name = child_name(parent_path, &relative_path).ok_or_else(|| {
            DctxError::corrupt(format!(
                "{:?} is not a child of {:?}",
                relative_path, parent_path
            ))
        })?;
        if !names.insert(name.to_string()) {
            return Err(DctxError::corrupt(format!(
                "duplicate entry {:?}",
                relative_path
            )));
        }
    }

    let modified = get_u64(reader)?;

    match kind {
        KIND_FILE => {
            let offset = get_u64(reader)?;
            let size = get_u64(reader)?;
            Ok(Record::Complete(TreeNode {
                relative_path,
                modified,
                kind: NodeKind::File { offset, size },
                disk_path: None,
            }))
        }
        KIND_DIRECTORY => {
            let remaining = get_u32(reader)? as usize;
            Ok(Record::Open(OpenDir {
                relative_path,
                modified,
                remaining,
                children: Vec::with_capacity(remaining.min(MAX_PREALLOC)),
                names: HashSet::with_capacity(remaining.min(MAX_PREALLOC)),
            }))
        }
        other => Err(DctxError::corrupt(format!("unknown node kind {}", other))),
    }
}

/// Copy one file's stored bytes into `buf`.
///
/// Seeks to `content_start + offset` and reads exactly `size` bytes.
/// Returns the number of bytes written to `buf`.
///
/// # Errors
///
/// - [`DctxError::NotAFile`] for directory nodes
/// - [`DctxError::BufferTooSmall`] if `buf` is shorter than the stored size
/// - [`DctxError::TruncatedArchive`] if the archive ends early
/// - [`DctxError::CorruptArchive`] if the range cannot be addressed
pub fn read_file_content<R: Read + Seek>(
    archive: &mut R,
    content_start: u64,
    node: &TreeNode,
    buf: &mut [u8],
) -> Result<usize> {
    let (offset, size) = node
        .content_range()
        .ok_or_else(|| DctxError::NotAFile(node.relative_path.clone()))?;
    let len = usize::try_from(size)
        .ok()
        .filter(|&len| len <= buf.len())
        .ok_or(DctxError::BufferTooSmall {
            needed: size,
            capacity: buf.len(),
        })?;

    let start = content_start
        .checked_add(offset)
        .ok_or_else(|| DctxError::corrupt(format!("offset {} overflows", offset)))?;
    archive.seek(SeekFrom::Start(start))?;
    archive
        .read_exact(&mut buf[..len])
        .map_err(DctxError::from_archive_io)?;
    Ok(len)
}

/// An open archive: parsed header plus a handle for content reads
#[derive(Debug)]
pub struct Archive {
    path: PathBuf,
    file: File,
    header: ArchiveHeader,
}

impl Archive {
    /// Open an archive and parse its header
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path)?;
        let header = read_header_from(&mut file)?;
        Ok(Self { path, file, header })
    }

    /// Location of the archive on disk
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Root of the stored tree
    pub fn root(&self) -> &TreeNode {
        &self.header.root
    }

    /// Parsed header
    pub fn header(&self) -> &ArchiveHeader {
        &self.header
    }

    /// Offset of the content section within the file
    pub fn content_start(&self) -> u64 {
        self.header.content_start
    }

    /// Length of the content section
    pub fn content_len(&self) -> u64 {
        self.header.content_len
    }

    /// Consume the archive and keep only its tree
    pub fn into_root(self) -> TreeNode {
        self.header.root
    }

    /// Copy a file's bytes into a caller-provided buffer
    pub fn read_file_content(&mut self, node: &TreeNode, buf: &mut [u8]) -> Result<usize> {
        read_file_content(&mut self.file, self.header.content_start, node, buf)
    }

    /// Read a file's bytes into a new buffer of exactly the stored size
    pub fn read_to_vec(&mut self, node: &TreeNode) -> Result<Vec<u8>> {
        let size = node
            .content_size()
            .ok_or_else(|| DctxError::NotAFile(node.relative_path.clone()))?;
        let len = usize::try_from(size).map_err(|_| DctxError::BufferTooSmall {
            needed: size,
            capacity: usize::MAX,
        })?;
        let mut buf = vec![0u8; len];
        self.read_file_content(node, &mut buf)?;
        Ok(buf)
    }

    /// Read the stored bytes of the file at `relative_path`
    pub fn read_path(&mut self, relative_path: &str) -> Result<Vec<u8>> {
        let node = self
            .header
            .root
            .find(relative_path)
            .ok_or_else(|| DctxError::PathNotFound(relative_path.to_string()))?
            .clone();
        self.read_to_vec(&node)
    }

    /// Stream a content range without buffering it whole.
    ///
    /// `offset` and `size` are relative to the content section, as stored on
    /// file nodes.
    pub fn open_range(&mut self, offset: u64, size: u64) -> Result<Take<&mut File>> {
        let in_range = offset
            .checked_add(size)
            .is_some_and(|end| end <= self.header.content_len);
        if !in_range {
            return Err(DctxError::corrupt(format!(
                "range {}+{} outside content section",
                offset, size
            )));
        }
        self.file
            .seek(SeekFrom::Start(self.header.content_start + offset))?;
        Ok((&mut self.file).take(size))
    }

    /// Stream one file's stored bytes
    pub fn content_reader(&mut self, node: &TreeNode) -> Result<Take<&mut File>> {
        let (offset, size) = node
            .content_range()
            .ok_or_else(|| DctxError::NotAFile(node.relative_path.clone()))?;
        self.open_range(offset, size)
    }
}
