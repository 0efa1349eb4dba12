//! Text rendering for language models
//!
//! Produces two plain-text artifacts from an archive:
//!
//! - the **context file**: a manifest of every entry followed by the content
//!   of every file, each block tagged with a short display ID
//! - the **diff file**: a change summary followed by the content of every
//!   added or modified file
//!
//! Display IDs come from one counter shared by files and directories in
//! pre-order (`ROOT`, `F001`, `D002`, ...), so the same tree always yields
//! the same IDs and a diff file's IDs match its context file's.
//!
//! Files whose leading bytes look binary are replaced by a placeholder.
//! Files with a well-known binary extension are additionally flagged in the
//! manifest.

use crate::diff::{ChangeKind, DiffReport};
use crate::error::Result;
use crate::reader::Archive;
use crate::tree::{EntryKind, TreeNode};
use crate::version::SNAPSHOT_MARKER;
use content_inspector::{inspect, ContentType};
use std::collections::HashMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, instrument, warn};

/// Bytes inspected when deciding whether content is binary
const SNIFF_LEN: usize = 8 * 1024;

/// Extensions flagged with `CONTENT:BINARY_HINT` in the manifest
const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "tiff", "ico", "webp", "mp3", "wav", "aac", "ogg",
    "flac", "mp4", "mov", "avi", "mkv", "webm", "exe", "dll", "so", "dylib", "o", "a", "lib",
    "zip", "gz", "tar", "bz2", "xz", "rar", "7z", "pdf", "doc", "docx", "xls", "xlsx", "ppt",
    "pptx", "bin", "dat", "iso", "img", "class", "jar", "pyc", "sqlite", "db", "wasm",
];

const INSTRUCTIONS: &str = "\
<INSTRUCTIONS>
1. Manifest: the DIRECTORY_TREE section lists every file and directory.
   - Entry format: [TYPE] RELATIVE_PATH (ID:UNIQUE_ID, MOD:UNIX_TIMESTAMP, SIZE:BYTES)
   - TYPE is [D] for a directory and [F] for a file; SIZE is given for files only.
   - Files with a binary extension carry CONTENT:BINARY_HINT.
2. Content: to read a file, take its UNIQUE_ID from the manifest and find
   <FILE_CONTENT_START ID=\"UNIQUE_ID\" ...>. The content runs until
   </FILE_CONTENT_END ID=\"UNIQUE_ID\">. Binary files show a placeholder instead.
</INSTRUCTIONS>
";

/// Display IDs keyed by relative path
#[derive(Debug, Clone, Default)]
pub struct DisplayIds {
    ids: HashMap<String, String>,
}

impl DisplayIds {
    /// Number every node of `root` in pre-order
    pub fn assign(root: &TreeNode) -> Self {
        let mut ids = HashMap::new();
        let mut counter = 1u32;
        for node in root.iter() {
            let id = if node.relative_path.is_empty() {
                "ROOT".to_string()
            } else {
                let id = format!("{}{:03}", node.entry_kind().tag(), counter);
                counter += 1;
                id
            };
            ids.insert(node.relative_path.clone(), id);
        }
        Self { ids }
    }

    /// ID of the node at `relative_path`
    pub fn get(&self, relative_path: &str) -> Option<&str> {
        self.ids.get(relative_path).map(String::as_str)
    }
}

/// Whether the file name carries a well-known binary extension
pub fn has_binary_extension(relative_path: &str) -> bool {
    let name = relative_path.rsplit('/').next().unwrap_or(relative_path);
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => BINARY_EXTENSIONS
            .iter()
            .any(|known| known.eq_ignore_ascii_case(ext)),
        _ => false,
    }
}

/// Whether content looks binary, judging by its leading bytes
pub fn looks_binary(content: &[u8]) -> bool {
    let head = &content[..content.len().min(SNIFF_LEN)];
    matches!(inspect(head), ContentType::BINARY)
}

/// Stored file to emit a content block for
struct FileBlock {
    id: String,
    relative_path: String,
    node: TreeNode,
}

fn file_blocks<'a>(
    archive: &Archive,
    ids: &DisplayIds,
    paths: impl Iterator<Item = &'a str>,
) -> Vec<FileBlock> {
    paths
        .filter_map(|path| {
            let node = archive.root().find(path).filter(|n| n.is_file())?;
            Some(FileBlock {
                id: ids.get(path)?.to_string(),
                relative_path: path.to_string(),
                node: node.clone(),
            })
        })
        .collect()
}

/// Write the context text for every node of `archive`
#[instrument(skip_all, fields(version = version))]
pub fn render_context<W: Write>(out: &mut W, archive: &mut Archive, version: &str) -> Result<()> {
    let ids = DisplayIds::assign(archive.root());

    writeln!(out, "{}{}]", SNAPSHOT_MARKER, version)?;
    writeln!(out)?;
    out.write_all(INSTRUCTIONS.as_bytes())?;
    writeln!(out)?;

    writeln!(out, "<DIRECTORY_TREE>")?;
    write_manifest(out, archive.root(), &ids, 0)?;
    writeln!(out, "</DIRECTORY_TREE>")?;

    let blocks = file_blocks(
        archive,
        &ids,
        archive.root().iter().map(|n| n.relative_path.as_str()),
    );
    for block in &blocks {
        write_content_block(out, archive, block, None)?;
    }

    writeln!(out)?;
    writeln!(out, "[END_DIRCONTXT_LLM_SNAPSHOT]")?;
    debug!("Rendered context with {} file blocks", blocks.len());
    Ok(())
}

fn write_manifest<W: Write>(out: &mut W, node: &TreeNode, ids: &DisplayIds, depth: usize) -> Result<()> {
    let indent = "  ".repeat(depth);
    let id = ids.get(&node.relative_path).unwrap_or("?");
    let path = if node.relative_path.is_empty() {
        "."
    } else {
        node.relative_path.as_str()
    };

    match node.content_size() {
        None => {
            writeln!(out, "{}[D] {} (ID:{}, MOD:{})", indent, path, id, node.modified)?;
            for child in node.children() {
                write_manifest(out, child, ids, depth + 1)?;
            }
        }
        Some(size) => {
            let hint = if has_binary_extension(&node.relative_path) {
                ", CONTENT:BINARY_HINT"
            } else {
                ""
            };
            writeln!(
                out,
                "{}[F] {} (ID:{}, MOD:{}, SIZE:{}{})",
                indent, path, id, node.modified, size, hint
            )?;
        }
    }
    Ok(())
}

fn write_content_block<W: Write>(
    out: &mut W,
    archive: &mut Archive,
    block: &FileBlock,
    change: Option<ChangeKind>,
) -> Result<()> {
    writeln!(out)?;
    match change {
        Some(change) => writeln!(
            out,
            "<FILE_CONTENT_START ID=\"{}\" PATH=\"{}\" CHANGE=\"{}\">",
            block.id,
            block.relative_path,
            change.label()
        )?,
        None => writeln!(
            out,
            "<FILE_CONTENT_START ID=\"{}\" PATH=\"{}\">",
            block.id, block.relative_path
        )?,
    }

    match archive.read_to_vec(&block.node) {
        Ok(content) if content.is_empty() => {}
        Ok(content) if looks_binary(&content) => {
            writeln!(
                out,
                "[BINARY CONTENT PLACEHOLDER - Size: {} bytes]",
                content.len()
            )?;
        }
        Ok(content) => {
            out.write_all(&content)?;
            if !content.ends_with(b"\n") {
                writeln!(out)?;
            }
        }
        Err(e) => {
            warn!("Cannot read {} from archive: {}", block.relative_path, e);
            writeln!(out, "[ERROR: could not read file content from archive: {}]", e)?;
        }
    }

    writeln!(out, "</FILE_CONTENT_END ID=\"{}\">", block.id)?;
    Ok(())
}

/// Write the diff text for `report`, whose new side is stored in `archive`
#[instrument(skip_all, fields(from = from_version, to = to_version))]
pub fn render_diff<W: Write>(
    out: &mut W,
    report: &DiffReport,
    archive: &mut Archive,
    from_version: &str,
    to_version: &str,
) -> Result<()> {
    let ids = DisplayIds::assign(archive.root());

    writeln!(out, "[DIRCONTXT_LLM_DIFF_{}_TO_{}]", from_version, to_version)?;
    writeln!(out)?;
    writeln!(out, "<CHANGE_SUMMARY>")?;
    for entry in report {
        writeln!(out, "{}", entry)?;
    }
    writeln!(out, "</CHANGE_SUMMARY>")?;

    let changed = report.entries().iter().filter(|e| {
        e.entry_kind == EntryKind::File && e.change != ChangeKind::Removed
    });
    let blocks = file_blocks(archive, &ids, changed.clone().map(|e| e.relative_path.as_str()));
    for block in &blocks {
        let change = changed
            .clone()
            .find(|e| e.relative_path == block.relative_path)
            .map(|e| e.change);
        write_content_block(out, archive, block, change)?;
    }

    writeln!(out)?;
    writeln!(out, "[END_DIRCONTXT_LLM_DIFF]")?;
    debug!("Rendered diff with {} entries, {} file blocks", report.len(), blocks.len());
    Ok(())
}

/// Render the context text into a string
pub fn context_to_string(archive: &mut Archive, version: &str) -> Result<String> {
    let mut buf = Vec::new();
    render_context(&mut buf, archive, version)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Atomically write rendered text to `dest`
pub fn write_text_file<F>(dest: &Path, render: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<&mut fs::File>) -> Result<()>,
{
    let dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut staged = NamedTempFile::new_in(dir)?;
    {
        let mut out = BufWriter::new(staged.as_file_mut());
        render(&mut out)?;
        out.flush()?;
    }
    staged.persist(dest)?;
    Ok(())
}
