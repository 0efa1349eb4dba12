//! In-memory directory tree
//!
//! A snapshot is an owning tree of [`TreeNode`]s. Every directory owns its
//! children outright, so dropping the root releases the whole tree. Nodes come
//! from two places:
//!
//! - the [walker](crate::walker), which records where each file lives on disk
//! - the [reader](crate::reader), which reconstructs a tree from an archive
//!   header and leaves `disk_path` empty
//!
//! ## Invariants
//!
//! - The root is a directory whose `relative_path` is `""`
//! - A child's path is its parent's path joined with the child's name by `/`
//! - Sibling names are unique
//! - Children keep discovery order; they are not sorted

use serde::Serialize;
use std::path::{Path, PathBuf};

/// Whether an entry is a file or a directory, without per-kind data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Regular file
    File,
    /// Directory
    Directory,
}

impl EntryKind {
    /// One-letter tag used in rendered listings (`F` or `D`)
    pub fn tag(self) -> char {
        match self {
            EntryKind::File => 'F',
            EntryKind::Directory => 'D',
        }
    }
}

/// Per-kind payload of a tree node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodeKind {
    /// A regular file and its range in the archive content section
    File {
        /// Byte offset into the content section
        offset: u64,
        /// Length of the stored content in bytes
        size: u64,
    },
    /// A directory and its children in discovery order
    Directory {
        /// Owned child nodes
        children: Vec<TreeNode>,
    },
}

/// One filesystem entry in a snapshot
///
/// Equality compares path, modification time and kind (including file
/// offsets and child lists). The on-disk source path is ignored so that a
/// walked tree and its archived copy compare equal.
#[derive(Debug, Clone, Serialize)]
pub struct TreeNode {
    /// Slash-separated path from the snapshot root (`""` for the root)
    pub relative_path: String,
    /// Modification time in seconds since the Unix epoch
    pub modified: u64,
    /// File or directory payload
    #[serde(flatten)]
    pub kind: NodeKind,
    /// Absolute source path for nodes produced by a live walk
    #[serde(skip)]
    pub disk_path: Option<PathBuf>,
}

impl PartialEq for TreeNode {
    fn eq(&self, other: &Self) -> bool {
        self.relative_path == other.relative_path
            && self.modified == other.modified
            && self.kind == other.kind
    }
}

impl Eq for TreeNode {}

impl TreeNode {
    /// Create the root directory node
    pub fn root(modified: u64, disk_path: Option<PathBuf>) -> Self {
        Self::directory(String::new(), modified, disk_path)
    }

    /// Create a directory node with no children
    pub fn directory(relative_path: String, modified: u64, disk_path: Option<PathBuf>) -> Self {
        Self {
            relative_path,
            modified,
            kind: NodeKind::Directory { children: Vec::new() },
            disk_path,
        }
    }

    /// Create a file node.
    ///
    /// `size` is provisional for walked nodes; the archive writer replaces it
    /// with the number of bytes actually copied.
    pub fn file(
        relative_path: String,
        modified: u64,
        size: u64,
        disk_path: Option<PathBuf>,
    ) -> Self {
        Self {
            relative_path,
            modified,
            kind: NodeKind::File { offset: 0, size },
            disk_path,
        }
    }

    /// Whether this node is a directory
    pub fn is_dir(&self) -> bool {
        matches!(self.kind, NodeKind::Directory { .. })
    }

    /// Whether this node is a file
    pub fn is_file(&self) -> bool {
        matches!(self.kind, NodeKind::File { .. })
    }

    /// Kind without payload
    pub fn entry_kind(&self) -> EntryKind {
        match self.kind {
            NodeKind::File { .. } => EntryKind::File,
            NodeKind::Directory { .. } => EntryKind::Directory,
        }
    }

    /// Final path segment (`""` for the root)
    pub fn name(&self) -> &str {
        match self.relative_path.rfind('/') {
            Some(idx) => &self.relative_path[idx + 1..],
            None => &self.relative_path,
        }
    }

    /// Children of a directory; empty for files
    pub fn children(&self) -> &[TreeNode] {
        match &self.kind {
            NodeKind::Directory { children } => children,
            NodeKind::File { .. } => &[],
        }
    }

    /// Mutable child list, or `None` for files
    pub fn children_mut(&mut self) -> Option<&mut Vec<TreeNode>> {
        match &mut self.kind {
            NodeKind::Directory { children } => Some(children),
            NodeKind::File { .. } => None,
        }
    }

    /// Stored content size for files
    pub fn content_size(&self) -> Option<u64> {
        match self.kind {
            NodeKind::File { size, .. } => Some(size),
            NodeKind::Directory { .. } => None,
        }
    }

    /// `(offset, size)` of a file's bytes in the content section
    pub fn content_range(&self) -> Option<(u64, u64)> {
        match self.kind {
            NodeKind::File { offset, size } => Some((offset, size)),
            NodeKind::Directory { .. } => None,
        }
    }

    /// Source path on disk, if this node came from a walk
    pub fn disk_path(&self) -> Option<&Path> {
        self.disk_path.as_deref()
    }

    /// Direct child with the given relative path, found by linear scan
    pub fn child(&self, relative_path: &str) -> Option<&TreeNode> {
        self.children()
            .iter()
            .find(|child| child.relative_path == relative_path)
    }

    /// Descendant (or self) with the given relative path
    pub fn find(&self, relative_path: &str) -> Option<&TreeNode> {
        let target = relative_path.trim_matches('/');
        if target.is_empty() {
            return Some(self);
        }

        let mut current = self;
        let mut end = 0;
        for segment in target.split('/') {
            end += segment.len();
            current = current.child(&target[..end])?;
            end += 1;
        }
        Some(current)
    }

    /// Pre-order iterator over this node and all of its descendants
    pub fn iter(&self) -> PreOrder<'_> {
        PreOrder { stack: vec![self] }
    }

    /// Number of files in this subtree
    pub fn file_count(&self) -> usize {
        self.iter().filter(|n| n.is_file()).count()
    }

    /// Number of directories in this subtree, including this node
    pub fn dir_count(&self) -> usize {
        self.iter().filter(|n| n.is_dir()).count()
    }

    /// Sum of all file content sizes in this subtree
    pub fn total_content_size(&self) -> u64 {
        self.iter().filter_map(TreeNode::content_size).sum()
    }
}

/// Pre-order traversal of a tree, parents before children
pub struct PreOrder<'a> {
    stack: Vec<&'a TreeNode>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = &'a TreeNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children().iter().rev());
        Some(node)
    }
}

/// Join a parent's relative path and a child name with `/`
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        let mut path = String::with_capacity(parent.len() + 1 + name.len());
        path.push_str(parent);
        path.push('/');
        path.push_str(name);
        path
    }
}

/// Name segment of `child` if it is a direct child path of `parent`
pub fn child_name<'a>(parent: &str, child: &'a str) -> Option<&'a str> {
    let name = if parent.is_empty() {
        child
    } else {
        child.strip_prefix(parent)?.strip_prefix('/')?
    };

    if name.is_empty() || name.contains('/') {
        None
    } else {
        Some(name)
    }
}
