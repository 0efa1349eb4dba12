//! # dircontxt - Directory snapshots for language models
//!
//! Captures a directory tree into a single self-describing binary archive and
//! renders it as plain text a language model can read in one pass.
//!
//! ## Overview
//!
//! dircontxt walks a target directory, honoring gitignore-style rules, and
//! lets you:
//! - Write every captured file into one `.dircontxt` archive
//! - Read the archive back and extract any file byte-for-byte
//! - Render a `.llmcontext.txt` file with a directory tree and file contents
//! - Detect what changed since the last snapshot and render a diff file
//! - Copy a rendered snapshot straight to the system clipboard
//!
//! ## Architecture
//!
//! - **Ignore engine**: ordered rules from built-in defaults, a user-global
//!   file, the target's `.dircontxtignore` and extra patterns; the last
//!   matching rule wins
//! - **Walker**: builds an in-memory tree of relative paths and mtimes,
//!   skipping ignored entries and logging anything it cannot read
//! - **Two-pass writer**: stages file content first so the header can record
//!   final offsets, then assembles and atomically renames the archive
//! - **Reader**: decodes and validates the header, and serves file content
//!   by offset without loading the whole archive
//! - **Diff engine**: compares trees by metadata and confirms suspected
//!   modifications by comparing bytes against the previous archive
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dircontxt::DircontxtBuilder;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dctx = DircontxtBuilder::new().build("./my_project")?;
//!
//! // First run writes my_project.dircontxt and my_project.llmcontext.txt
//! let outcome = dctx.snapshot()?;
//! println!("Created {}", outcome.version);
//!
//! // Later runs bump the version and describe what changed
//! let outcome = dctx.snapshot()?;
//! if let Some(diff) = &outcome.diff_file {
//!     println!("Changes written to {}", diff.display());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Lower-Level Building Blocks
//!
//! ### Writing and Reading an Archive
//!
//! ```rust,no_run
//! use dircontxt::{walk, write_archive, Archive, IgnoreRules};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let rules = IgnoreRules::with_builtin_defaults(&[]);
//! let mut walked = walk(Path::new("./project"), &rules)?;
//! write_archive(Path::new("./project.dircontxt"), &mut walked.root)?;
//!
//! let mut archive = Archive::open("./project.dircontxt")?;
//! let bytes = archive.read_path("src/main.rs")?;
//! println!("{} bytes", bytes.len());
//! # Ok(())
//! # }
//! ```
//!
//! ### Comparing Trees
//!
//! ```rust,no_run
//! use dircontxt::{compare_verified, walk, Archive, IgnoreRules};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut old = Archive::open("./project.dircontxt")?;
//! let rules = IgnoreRules::with_builtin_defaults(&[]);
//! let walked = walk(Path::new("./project"), &rules)?;
//!
//! for entry in &compare_verified(&walked.root, &mut old) {
//!     println!("{}", entry);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Archive Format
//!
//! All integers are little-endian.
//!
//! ```text
//! "DIRCTXTV"                         8-byte signature
//! node records, pre-order            root first, children in walk order
//!   kind       u8                    0 = file, 1 = directory
//!   path_len   u16
//!   path       path_len bytes        UTF-8, relative, '/'-separated
//!   mtime      u64                   seconds since the Unix epoch
//!   file:      offset u64, size u64  relative to the content section
//!   directory: child_count u32
//! content section                    file bytes, concatenated
//! ```
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T>`] with a [`DctxError`].
//! Corrupt archives surface as [`DctxError::InvalidSignature`],
//! [`DctxError::TruncatedArchive`], [`DctxError::PathTooLong`],
//! [`DctxError::RootNotDirectory`] or [`DctxError::CorruptArchive`].
//! Per-entry walk problems never fail a snapshot; they are logged and
//! collected as warnings.
//!
//! ## Module Organization
//!
//! - [`ignore`]: Ignore rule compilation, loading and matching
//! - [`walker`]: Filesystem walk into a [`TreeNode`] tree
//! - [`writer`]: Two-pass archive writer
//! - [`reader`]: Archive decoding and content access
//! - [`diff`]: Tree comparison and content verification
//! - [`render`]: Context and diff text rendering
//! - [`dircontxt`](crate::dircontxt): Snapshot orchestration
//! - [`config`]: User configuration file
//! - [`error`]: Error types and handling

// Public API modules
pub mod clipboard;
pub mod config;
pub mod diff;
pub mod dircontxt;
pub mod error;
pub mod format;
pub mod ignore;
pub mod reader;
pub mod render;
pub mod tree;
pub mod types;
pub mod utils;
pub mod version;
pub mod walker;
pub mod writer;

// Re-export main types for convenience
pub use config::AppConfig;
pub use diff::{compare, compare_verified, verify, ChangeKind, DiffEntry, DiffReport};
pub use dircontxt::{Dircontxt, DircontxtBuilder};
pub use error::{DctxError, Result};
pub use ignore::{load_rules, IgnoreRule, IgnoreRules, MatchKind};
pub use reader::{read_header, Archive, ArchiveHeader};
pub use tree::{EntryKind, NodeKind, TreeNode};
pub use types::*;
pub use walker::{walk, WalkOutcome, Walker};
pub use writer::write_archive;
