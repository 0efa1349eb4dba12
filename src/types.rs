//! Core data types shared across dircontxt
//!
//! ## Overview
//!
//! - **Walk results**: [`WalkStats`], [`WalkWarning`]
//! - **Write results**: [`WriteStats`]
//! - **Run configuration**: [`OutputMode`]
//! - **Run results**: [`ArtifactPaths`], [`SnapshotOutcome`]
//!
//! All result types serialize to JSON for the CLI's `--json` output.

use crate::diff::DiffReport;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Counters collected while walking a directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkStats {
    /// Directories added to the tree, excluding the root
    pub directories: usize,
    /// Files added to the tree
    pub files: usize,
    /// Entries excluded by ignore rules
    pub ignored: usize,
    /// Entries that are neither files nor directories (sockets, dangling links, ...)
    pub skipped: usize,
    /// Sum of file sizes as reported by the filesystem
    pub total_bytes: u64,
}

/// A recoverable problem met during a walk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkWarning {
    /// Path the problem relates to
    pub path: PathBuf,
    /// Human-readable description
    pub message: String,
}

impl fmt::Display for WalkWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.message)
    }
}

/// Counters from one archive write
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteStats {
    /// File records written
    pub files: usize,
    /// Directory records written, including the root
    pub directories: usize,
    /// Size of the header section in bytes
    pub header_bytes: u64,
    /// Size of the content section in bytes
    pub content_bytes: u64,
    /// Files whose source could not be opened and were stored empty
    pub unreadable_files: usize,
}

impl WriteStats {
    /// Total archive size including the signature
    pub fn archive_bytes(&self) -> u64 {
        crate::format::SIGNATURE.len() as u64 + self.header_bytes + self.content_bytes
    }
}

/// Which artifacts a snapshot run leaves behind
///
/// The archive is kept in every mode since it is the baseline for the next
/// run's change detection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Archive plus context text (and diff text when something changed)
    #[default]
    Both,
    /// Same artifacts as `Both`
    Text,
    /// Archive only; stale text artifacts are removed
    Binary,
}

impl OutputMode {
    /// Whether text artifacts are produced in this mode
    pub fn writes_text(self) -> bool {
        !matches!(self, OutputMode::Binary)
    }
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "both" => Ok(OutputMode::Both),
            "text" => Ok(OutputMode::Text),
            "binary" => Ok(OutputMode::Binary),
            other => Err(format!("unknown output mode '{}'", other)),
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputMode::Both => "both",
            OutputMode::Text => "text",
            OutputMode::Binary => "binary",
        };
        f.write_str(name)
    }
}

/// Locations of every artifact belonging to one target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    /// `<name>.dircontxt`
    pub archive: PathBuf,
    /// `<name>.llmcontext.txt`
    pub context: PathBuf,
    /// Directory holding the artifacts
    pub output_dir: PathBuf,
    /// Target base name used as the artifact stem
    pub base_name: String,
}

impl ArtifactPaths {
    /// Derive artifact paths for a target named `base_name` in `output_dir`
    pub fn new(output_dir: PathBuf, base_name: &str) -> Self {
        Self {
            archive: output_dir.join(format!("{}.dircontxt", base_name)),
            context: output_dir.join(format!("{}.llmcontext.txt", base_name)),
            output_dir,
            base_name: base_name.to_string(),
        }
    }

    /// Diff text path for a version; only minor versions (`V1.2`) have one
    pub fn diff_for(&self, version: &str) -> Option<PathBuf> {
        version.contains('.').then(|| {
            self.output_dir
                .join(format!("{}.llmcontext-{}-diff.txt", self.base_name, version))
        })
    }

    /// File names the walker must never capture
    pub fn artifact_names(&self) -> Vec<String> {
        [&self.archive, &self.context]
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect()
    }
}

/// Result of one snapshot run
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotOutcome {
    /// Version label of this snapshot
    pub version: String,
    /// Version this snapshot was compared against, if any
    pub previous_version: Option<String>,
    /// Archive path, or `None` when the archive was only temporary
    pub archive: Option<PathBuf>,
    /// Context text path, if written
    pub context: Option<PathBuf>,
    /// Diff text path, if written
    pub diff_file: Option<PathBuf>,
    /// Changes since the previous snapshot, if one existed
    pub changes: Option<DiffReport>,
    /// Walk counters
    pub walk: WalkStats,
    /// Recoverable walk problems
    pub warnings: Vec<WalkWarning>,
    /// Archive write counters
    pub write: WriteStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_mode_parse() {
        assert_eq!("both".parse::<OutputMode>().unwrap(), OutputMode::Both);
        assert_eq!(" TEXT ".parse::<OutputMode>().unwrap(), OutputMode::Text);
        assert_eq!("binary".parse::<OutputMode>().unwrap(), OutputMode::Binary);
        assert!("json".parse::<OutputMode>().is_err());
        assert!(OutputMode::Text.writes_text());
        assert!(!OutputMode::Binary.writes_text());
    }

    #[test]
    fn test_artifact_paths() {
        let paths = ArtifactPaths::new(PathBuf::from("/work"), "proj");
        assert_eq!(paths.archive, PathBuf::from("/work/proj.dircontxt"));
        assert_eq!(paths.context, PathBuf::from("/work/proj.llmcontext.txt"));
        assert_eq!(paths.diff_for("V1"), None);
        assert_eq!(
            paths.diff_for("V1.2"),
            Some(PathBuf::from("/work/proj.llmcontext-V1.2-diff.txt"))
        );
        assert_eq!(
            paths.artifact_names(),
            vec!["proj.dircontxt".to_string(), "proj.llmcontext.txt".to_string()]
        );
    }
}
