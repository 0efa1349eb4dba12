//! Snapshot orchestration
//!
//! [`Dircontxt`] runs the full pipeline for one target directory:
//!
//! 1. find the previous snapshot, if any, and derive the next version
//! 2. load ignore rules
//! 3. walk the target
//! 4. compare against the previous archive and verify suspected changes
//! 5. write the new archive
//! 6. render the context text and, when something changed, the diff text
//!
//! Change detection runs before the new archive replaces the old one, so the
//! old content section is still available for byte comparison.
//!
//! ## Artifacts
//!
//! For a target `/work/proj`, artifacts are written next to it (or into the
//! configured output directory):
//!
//! - `/work/proj.dircontxt` (archive, kept in every mode)
//! - `/work/proj.llmcontext.txt` (context text)
//! - `/work/proj.llmcontext-V1.2-diff.txt` (diff text for version `V1.2`)
//!
//! ## Example
//!
//! ```rust,no_run
//! use dircontxt::{AppConfig, DircontxtBuilder, OutputMode};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dctx = DircontxtBuilder::new()
//!     .config(AppConfig::load())
//!     .ignore_patterns(vec!["*.tmp".to_string()])
//!     .build("./my_project")?;
//!
//! let outcome = dctx.snapshot()?;
//! println!("Snapshot {} written", outcome.version);
//! if let Some(changes) = &outcome.changes {
//!     println!("{} changes since {:?}", changes.len(), outcome.previous_version);
//! }
//! # Ok(())
//! # }
//! ```

use crate::config::{self, AppConfig};
use crate::diff::{compare_verified, DiffReport};
use crate::error::{DctxError, Result};
use crate::ignore::{load_rules, IgnoreRules};
use crate::reader::Archive;
use crate::render::{context_to_string, render_context, render_diff, write_text_file};
use crate::types::{ArtifactPaths, OutputMode, SnapshotOutcome};
use crate::version::{next_version, read_version, INITIAL_VERSION};
use crate::walker::{WalkOutcome, Walker};
use crate::writer::write_archive;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Builder for configuring a [`Dircontxt`] run
///
/// # Examples
///
/// ```rust,no_run
/// use dircontxt::{DircontxtBuilder, OutputMode};
///
/// let dctx = DircontxtBuilder::new()
///     .output_mode(OutputMode::Binary)
///     .follow_symlinks(true)
///     .output_dir("/tmp/snapshots")
///     .build("./project")
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct DircontxtBuilder {
    config: AppConfig,
    ignore_patterns: Vec<String>,
    output_dir: Option<PathBuf>,
    global_ignore_file: Option<PathBuf>,
}

impl DircontxtBuilder {
    /// Create a builder with default settings and the user-global ignore file
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
            ignore_patterns: Vec::new(),
            output_dir: None,
            global_ignore_file: config::global_ignore_path(),
        }
    }

    /// Replace all settings with a loaded configuration
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    /// Set which artifacts a snapshot leaves behind
    pub fn output_mode(mut self, mode: OutputMode) -> Self {
        self.config.output_mode = mode;
        self
    }

    /// Capture symlink targets instead of skipping links
    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.config.follow_symlinks = follow;
        self
    }

    /// Extra ignore patterns, applied after every ignore file
    pub fn ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.ignore_patterns = patterns;
        self
    }

    /// Directory for artifacts (defaults to the target's parent)
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// User-global ignore file, or `None` to skip it
    pub fn global_ignore_file(mut self, path: Option<PathBuf>) -> Self {
        self.global_ignore_file = path;
        self
    }

    /// Resolve the target and derive artifact paths.
    ///
    /// # Errors
    ///
    /// - [`DctxError::RootUnreadable`] if the target cannot be resolved
    /// - [`DctxError::NotADirectory`] if it is not a directory
    /// - [`DctxError::InvalidTarget`] if it has no name to derive artifacts from
    pub fn build(self, target: impl AsRef<Path>) -> Result<Dircontxt> {
        let given = target.as_ref();
        let target = given
            .canonicalize()
            .map_err(|source| DctxError::RootUnreadable {
                path: given.to_path_buf(),
                source,
            })?;
        if !target.is_dir() {
            return Err(DctxError::NotADirectory(target));
        }

        let base_name = target
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| DctxError::InvalidTarget(target.clone()))?;
        let output_dir = match self.output_dir {
            Some(dir) => dir,
            None => target
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| DctxError::InvalidTarget(target.clone()))?,
        };
        let paths = ArtifactPaths::new(output_dir, &base_name);

        debug!("Target {} -> archive {}", target.display(), paths.archive.display());
        Ok(Dircontxt {
            target,
            paths,
            config: self.config,
            ignore_patterns: self.ignore_patterns,
            global_ignore_file: self.global_ignore_file,
        })
    }
}

impl Default for DircontxtBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot runner for one target directory
#[derive(Debug, Clone)]
pub struct Dircontxt {
    target: PathBuf,
    paths: ArtifactPaths,
    config: AppConfig,
    ignore_patterns: Vec<String>,
    global_ignore_file: Option<PathBuf>,
}

/// What is known about the last snapshot of a target
struct PreviousState {
    version: String,
    archive: Option<Archive>,
}

struct Prepared {
    version: String,
    previous_version: Option<String>,
    changes: Option<DiffReport>,
    walked: WalkOutcome,
}

impl Dircontxt {
    /// Canonical target directory
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Artifact locations
    pub fn paths(&self) -> &ArtifactPaths {
        &self.paths
    }

    /// Effective settings
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Ignore rules for this target
    pub fn rules(&self) -> IgnoreRules {
        let names = self.paths.artifact_names();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        load_rules(
            &self.target,
            self.global_ignore_file.as_deref(),
            &names,
            &self.ignore_patterns,
        )
    }

    fn walk(&self) -> Result<WalkOutcome> {
        let rules = self.rules();
        Walker::new(&rules)
            .with_follow_symlinks(self.config.follow_symlinks)
            .walk(&self.target)
    }

    /// Previous version and archive, if both artifacts exist
    fn previous_state(&self) -> Option<PreviousState> {
        if !self.paths.context.is_file() || !self.paths.archive.is_file() {
            debug!("No previous snapshot for {}", self.target.display());
            return None;
        }

        let version = read_version(&self.paths.context).unwrap_or_else(|| {
            warn!(
                "No version in {}, treating it as {}",
                self.paths.context.display(),
                INITIAL_VERSION
            );
            INITIAL_VERSION.to_string()
        });
        let archive = match Archive::open(&self.paths.archive) {
            Ok(archive) => Some(archive),
            Err(e) => {
                warn!(
                    "Cannot read previous archive {}, skipping change detection: {}",
                    self.paths.archive.display(),
                    e.user_message()
                );
                None
            }
        };
        Some(PreviousState { version, archive })
    }

    /// Walk the target and compare it against the previous snapshot
    fn prepare(&self) -> Result<Prepared> {
        let previous = self.previous_state();
        let version = previous
            .as_ref()
            .map(|p| next_version(&p.version))
            .unwrap_or_else(|| INITIAL_VERSION.to_string());
        info!("Creating snapshot {} of {}", version, self.target.display());

        let walked = self.walk()?;
        let (previous_version, changes) = match previous {
            Some(PreviousState { version: from, archive }) => {
                let changes =
                    archive.map(|mut archive| compare_verified(&walked.root, &mut archive));
                (Some(from), changes)
            }
            None => (None, None),
        };
        Ok(Prepared {
            version,
            previous_version,
            changes,
            walked,
        })
    }

    /// Run a full snapshot and write its artifacts.
    ///
    /// # Errors
    ///
    /// Walk root failures, archive write failures, and text artifact write
    /// failures. Problems with the previous snapshot only disable change
    /// detection.
    #[instrument(skip(self), fields(target = %self.target.display()))]
    pub fn snapshot(&self) -> Result<SnapshotOutcome> {
        let Prepared {
            version,
            previous_version,
            changes,
            walked,
        } = self.prepare()?;
        let mut root = walked.root;

        let write = write_archive(&self.paths.archive, &mut root)?;
        let mut outcome = SnapshotOutcome {
            version: version.clone(),
            previous_version,
            archive: Some(self.paths.archive.clone()),
            context: None,
            diff_file: None,
            changes,
            walk: walked.stats,
            warnings: walked.warnings,
            write,
        };

        let diff_path = self.paths.diff_for(&version);
        if self.config.output_mode.writes_text() {
            let mut archive = Archive::open(&self.paths.archive)?;
            write_text_file(&self.paths.context, |out| {
                render_context(out, &mut archive, &version)
            })?;
            outcome.context = Some(self.paths.context.clone());

            if let (Some(report), Some(from), Some(diff_path)) =
                (&outcome.changes, &outcome.previous_version, diff_path)
            {
                if report.has_changes() {
                    write_text_file(&diff_path, |out| {
                        render_diff(out, report, &mut archive, from, &version)
                    })?;
                    outcome.diff_file = Some(diff_path);
                } else {
                    info!("No changes since {}", from);
                }
            }
        } else {
            remove_stale(&self.paths.context);
            if let Some(diff_path) = diff_path {
                remove_stale(&diff_path);
            }
        }

        info!(
            "Snapshot {} complete: {} files, {} bytes of content",
            version, outcome.write.files, outcome.write.content_bytes
        );
        Ok(outcome)
    }

    /// Render the context text without touching any artifact on disk.
    ///
    /// The archive is staged in a temporary directory that is removed
    /// before returning.
    #[instrument(skip(self), fields(target = %self.target.display()))]
    pub fn snapshot_to_string(&self) -> Result<(String, SnapshotOutcome)> {
        let Prepared {
            version,
            previous_version,
            changes,
            walked,
        } = self.prepare()?;
        let mut root = walked.root;

        let staging = tempfile::TempDir::new()?;
        let staged_archive = staging
            .path()
            .join(format!("{}.dircontxt", self.paths.base_name));
        let write = write_archive(&staged_archive, &mut root)?;
        let mut archive = Archive::open(&staged_archive)?;
        let text = context_to_string(&mut archive, &version)?;

        let outcome = SnapshotOutcome {
            version,
            previous_version,
            archive: None,
            context: None,
            diff_file: None,
            changes,
            walk: walked.stats,
            warnings: walked.warnings,
            write,
        };
        Ok((text, outcome))
    }

    /// Changes since the last archive, without writing anything.
    ///
    /// Returns `None` when the target has no archive yet.
    #[instrument(skip(self), fields(target = %self.target.display()))]
    pub fn status(&self) -> Result<Option<DiffReport>> {
        if !self.paths.archive.is_file() {
            return Ok(None);
        }
        let mut archive = Archive::open(&self.paths.archive)?;
        let walked = self.walk()?;
        Ok(Some(compare_verified(&walked.root, &mut archive)))
    }
}

fn remove_stale(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!("Cannot remove {}: {}", path.display(), e),
    }
}
