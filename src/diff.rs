//! Tree diff engine
//!
//! Computes what changed between two snapshots of the same directory.
//!
//! ## Overview
//!
//! [`compare`] walks both trees together. For each directory, every child of
//! the new side is looked up among the old side's children by linear scan:
//!
//! - missing on the old side: **Added**
//! - present with a different kind: **Modified** (the subtree is not expanded)
//! - a file whose size or modification time differs: **Modified**
//! - a directory: always recursed into, whatever its timestamp says
//!
//! A second pass over the old side's children reports everything missing
//! from the new side as **Removed**.
//!
//! Timestamps over-report: `touch` or a checkout changes them without
//! changing content. [`verify`] re-checks every Modified file whose size did
//! not change by streaming the live file and the previous archive's copy in
//! 64 KiB chunks; identical content drops the entry. An I/O error during the
//! check keeps the entry.
//!
//! ## Example
//!
//! ```rust,no_run
//! use dircontxt::diff::compare_verified;
//! use dircontxt::ignore::IgnoreRules;
//! use dircontxt::reader::Archive;
//! use dircontxt::walker::walk;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut previous = Archive::open("project.dircontxt")?;
//! let current = walk(Path::new("project"), &IgnoreRules::new())?;
//!
//! let report = compare_verified(&current.root, &mut previous);
//! for entry in report.entries() {
//!     println!("{}", entry);
//! }
//! # Ok(())
//! # }
//! ```

use crate::reader::Archive;
use crate::tree::{EntryKind, TreeNode};
use crate::utils::streams_equal;
use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use tracing::{debug, instrument, trace, warn};

/// Kind of change detected for one path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// Present only in the new snapshot
    Added,
    /// Present only in the old snapshot
    Removed,
    /// Present in both with different kind, size or timestamp
    Modified,
}

impl ChangeKind {
    /// Upper-case label used in rendered summaries
    pub fn label(self) -> &'static str {
        match self {
            ChangeKind::Added => "ADDED",
            ChangeKind::Removed => "REMOVED",
            ChangeKind::Modified => "MODIFIED",
        }
    }
}

/// One detected change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffEntry {
    /// What happened
    pub change: ChangeKind,
    /// File or directory (the new kind for type changes)
    pub entry_kind: EntryKind,
    /// Path relative to the snapshot root
    pub relative_path: String,
}

impl fmt::Display for DiffEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] [{}] {}",
            self.change.label(),
            self.entry_kind.tag(),
            self.relative_path
        )
    }
}

/// Per-kind counts of a report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffCounts {
    /// Added entries
    pub added: usize,
    /// Removed entries
    pub removed: usize,
    /// Modified entries
    pub modified: usize,
}

/// Ordered list of changes between two snapshots
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffReport {
    entries: Vec<DiffEntry>,
}

impl DiffReport {
    /// Create an empty report
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether anything changed
    pub fn has_changes(&self) -> bool {
        !self.entries.is_empty()
    }

    /// Entries in detection order
    pub fn entries(&self) -> &[DiffEntry] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the report is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry for `relative_path`, if any
    pub fn get(&self, relative_path: &str) -> Option<&DiffEntry> {
        self.entries
            .iter()
            .find(|e| e.relative_path == relative_path)
    }

    /// Count entries by change kind
    pub fn counts(&self) -> DiffCounts {
        self.entries
            .iter()
            .fold(DiffCounts::default(), |mut counts, entry| {
                match entry.change {
                    ChangeKind::Added => counts.added += 1,
                    ChangeKind::Removed => counts.removed += 1,
                    ChangeKind::Modified => counts.modified += 1,
                }
                counts
            })
    }

    fn push(&mut self, change: ChangeKind, node: &TreeNode) {
        trace!("{:?} {}", change, node.relative_path);
        self.entries.push(DiffEntry {
            change,
            entry_kind: node.entry_kind(),
            relative_path: node.relative_path.clone(),
        });
    }
}

impl<'a> IntoIterator for &'a DiffReport {
    type Item = &'a DiffEntry;
    type IntoIter = std::slice::Iter<'a, DiffEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Compare two snapshot trees.
///
/// When only one side is present, every node below its root is reported as
/// Added (new only) or Removed (old only). Both sides absent yields an
/// empty report.
pub fn compare(old: Option<&TreeNode>, new: Option<&TreeNode>) -> DiffReport {
    let mut report = DiffReport::new();
    match (old, new) {
        (Some(old), Some(new)) => compare_dirs(old, new, &mut report),
        (None, Some(new)) => report_subtree(new, ChangeKind::Added, &mut report),
        (Some(old), None) => report_subtree(old, ChangeKind::Removed, &mut report),
        (None, None) => {}
    }
    report
}

fn report_subtree(root: &TreeNode, change: ChangeKind, report: &mut DiffReport) {
    for node in root.iter().skip(1) {
        report.push(change, node);
    }
}

fn compare_dirs(old: &TreeNode, new: &TreeNode, report: &mut DiffReport) {
    for new_child in new.children() {
        let Some(old_child) = old.child(&new_child.relative_path) else {
            report.push(ChangeKind::Added, new_child);
            for descendant in new_child.iter().skip(1) {
                report.push(ChangeKind::Added, descendant);
            }
            continue;
        };

        match (old_child.is_dir(), new_child.is_dir()) {
            (true, true) => compare_dirs(old_child, new_child, report),
            (false, false) => {
                if old_child.content_size() != new_child.content_size()
                    || old_child.modified != new_child.modified
                {
                    report.push(ChangeKind::Modified, new_child);
                }
            }
            _ => report.push(ChangeKind::Modified, new_child),
        }
    }

    for old_child in old.children() {
        if new.child(&old_child.relative_path).is_none() {
            report.push(ChangeKind::Removed, old_child);
            for descendant in old_child.iter().skip(1) {
                report.push(ChangeKind::Removed, descendant);
            }
        }
    }
}

/// Drop Modified entries whose content is unchanged.
///
/// Only file entries whose size is equal on both sides are checked: the
/// live bytes at the new node's disk path are compared with the bytes the
/// old node points to in `old_archive`. Returns the number of entries
/// dropped.
#[instrument(skip_all, fields(archive = %old_archive.path().display()))]
pub fn verify(report: &mut DiffReport, new_root: &TreeNode, old_archive: &mut Archive) -> usize {
    let before = report.entries.len();
    report.entries.retain(|entry| {
        if entry.change != ChangeKind::Modified || entry.entry_kind != EntryKind::File {
            return true;
        }
        match content_unchanged(&entry.relative_path, new_root, old_archive) {
            Ok(true) => {
                debug!("{} only changed its timestamp", entry.relative_path);
                false
            }
            Ok(false) => true,
            Err(e) => {
                warn!("Cannot verify {}, keeping it as modified: {}", entry.relative_path, e);
                true
            }
        }
    });
    before - report.entries.len()
}

/// Whether a file's live bytes equal its archived bytes
fn content_unchanged(
    relative_path: &str,
    new_root: &TreeNode,
    old_archive: &mut Archive,
) -> crate::Result<bool> {
    let Some(new_node) = new_root.find(relative_path) else {
        return Ok(false);
    };
    let Some(old_range) = old_archive
        .root()
        .find(relative_path)
        .and_then(TreeNode::content_range)
    else {
        return Ok(false);
    };
    let (Some(new_size), Some(disk_path)) = (new_node.content_size(), new_node.disk_path()) else {
        return Ok(false);
    };
    let (old_offset, old_size) = old_range;
    if new_size != old_size {
        return Ok(false);
    }

    let live = BufReader::new(File::open(disk_path)?);
    let archived = old_archive.open_range(old_offset, old_size)?;
    Ok(streams_equal(live, archived, old_size)?)
}

/// Compare the live tree against a previous archive and verify the result
pub fn compare_verified(new_root: &TreeNode, old_archive: &mut Archive) -> DiffReport {
    let mut report = compare(Some(old_archive.root()), Some(new_root));
    let dropped = verify(&mut report, new_root, old_archive);
    debug!(
        "{} changes after dropping {} timestamp-only modifications",
        report.len(),
        dropped
    );
    report
}
