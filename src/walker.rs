//! Filesystem walker
//!
//! Turns a live directory into a [`TreeNode`] tree, consulting the ignore
//! rules for every entry. The walk is depth-first pre-order in directory
//! enumeration order, so children keep the order the filesystem reports
//! them in. File contents are never read here; each node only records its
//! on-disk path, modification time and current size.
//!
//! ## Failure handling
//!
//! - The root cannot be stat'ed, is not a directory, or cannot be listed:
//!   the walk fails.
//! - Anything below the root (an unlistable subdirectory, an entry that
//!   cannot be stat'ed, a symlink loop, a name that is not UTF-8, a path
//!   too long for the archive): a [`WalkWarning`] is recorded and the walk
//!   continues with the siblings.
//!
//! ## Example
//!
//! ```rust,no_run
//! use dircontxt::ignore::IgnoreRules;
//! use dircontxt::walker::Walker;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let rules = IgnoreRules::with_builtin_defaults(&[]);
//! let outcome = Walker::new(&rules).walk(Path::new("./my_project"))?;
//! println!("{} files, {} ignored", outcome.stats.files, outcome.stats.ignored);
//! # Ok(())
//! # }
//! ```

use crate::error::{DctxError, Result};
use crate::format::MAX_PATH_LEN;
use crate::ignore::IgnoreRules;
use crate::tree::{join_path, TreeNode};
use crate::types::{WalkStats, WalkWarning};
use crate::utils::mtime_secs;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, trace, warn};
use walkdir::WalkDir;

/// Tree and diagnostics produced by one walk
#[derive(Debug, Clone)]
pub struct WalkOutcome {
    /// Root directory node
    pub root: TreeNode,
    /// Counters
    pub stats: WalkStats,
    /// Recoverable problems, in the order they were met
    pub warnings: Vec<WalkWarning>,
}

/// Directory walker bound to a rule set
#[derive(Debug, Clone, Copy)]
pub struct Walker<'a> {
    rules: &'a IgnoreRules,
    follow_symlinks: bool,
}

impl<'a> Walker<'a> {
    /// Create a walker that does not follow symbolic links
    pub fn new(rules: &'a IgnoreRules) -> Self {
        Self {
            rules,
            follow_symlinks: false,
        }
    }

    /// Follow symbolic links and capture their targets
    ///
    /// Link cycles are reported as warnings and not descended into.
    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Walk `root` and build its tree.
    ///
    /// # Errors
    ///
    /// - [`DctxError::RootUnreadable`] if the root cannot be stat'ed or listed
    /// - [`DctxError::NotADirectory`] if the root is not a directory
    #[instrument(skip(self), fields(follow_symlinks = self.follow_symlinks))]
    pub fn walk(&self, root: &Path) -> Result<WalkOutcome> {
        let unreadable = |source| DctxError::RootUnreadable {
            path: root.to_path_buf(),
            source,
        };

        let root_meta = fs::metadata(root).map_err(unreadable)?;
        if !root_meta.is_dir() {
            return Err(DctxError::NotADirectory(root.to_path_buf()));
        }
        fs::read_dir(root).map_err(unreadable)?;

        let mut stats = WalkStats::default();
        let mut warnings = Vec::new();
        // stack[d] is the open directory at depth d
        let mut stack = vec![TreeNode::root(
            mtime_secs(&root_meta),
            Some(root.to_path_buf()),
        )];

        let mut it = WalkDir::new(root)
            .follow_links(self.follow_symlinks)
            .min_depth(1)
            .into_iter();

        while let Some(result) = it.next() {
            let entry = match result {
                Ok(entry) => entry,
                Err(err) => {
                    if err.depth() == 0 {
                        return Err(DctxError::WalkDir(err));
                    }
                    let path = err.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
                    record(&mut warnings, path, err.to_string());
                    continue;
                }
            };

            let depth = entry.depth();
            close_to_depth(&mut stack, depth)?;

            let file_type = entry.file_type();
            let is_dir = file_type.is_dir();
            if !is_dir && !file_type.is_file() {
                trace!("Skipping special entry {}", entry.path().display());
                stats.skipped += 1;
                continue;
            }

            let Some(name) = entry.file_name().to_str() else {
                record(
                    &mut warnings,
                    entry.path().to_path_buf(),
                    "name is not valid UTF-8".to_string(),
                );
                if is_dir {
                    it.skip_current_dir();
                }
                continue;
            };

            let parent_path = stack.last().map(|p| p.relative_path.as_str()).unwrap_or("");
            let relative_path = join_path(parent_path, name);
            if relative_path.len() > MAX_PATH_LEN {
                record(
                    &mut warnings,
                    entry.path().to_path_buf(),
                    format!("relative path exceeds {} bytes", MAX_PATH_LEN),
                );
                if is_dir {
                    it.skip_current_dir();
                }
                continue;
            }

            let ignored = if is_dir {
                self.rules.is_ignored(&format!("{}/", relative_path), name, true)
            } else {
                self.rules.is_ignored(&relative_path, name, false)
            };
            if ignored {
                trace!("Ignoring {}", relative_path);
                stats.ignored += 1;
                if is_dir {
                    it.skip_current_dir();
                }
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(err) => {
                    record(&mut warnings, entry.path().to_path_buf(), err.to_string());
                    if is_dir {
                        it.skip_current_dir();
                    }
                    continue;
                }
            };
            let modified = mtime_secs(&metadata);
            let disk_path = Some(entry.path().to_path_buf());

            if is_dir {
                stats.directories += 1;
                stack.push(TreeNode::directory(relative_path, modified, disk_path));
            } else {
                stats.files += 1;
                stats.total_bytes += metadata.len();
                let node = TreeNode::file(relative_path, modified, metadata.len(), disk_path);
                open_children(&mut stack)?.push(node);
            }
        }

        close_to_depth(&mut stack, 1)?;
        let root_node = stack
            .pop()
            .ok_or_else(|| DctxError::internal("walk stack is empty"))?;

        debug!(
            "Walked {}: {} dirs, {} files, {} ignored, {} skipped, {} warnings",
            root.display(),
            stats.directories,
            stats.files,
            stats.ignored,
            stats.skipped,
            warnings.len()
        );

        Ok(WalkOutcome {
            root: root_node,
            stats,
            warnings,
        })
    }
}

/// Walk `root` with default settings
pub fn walk(root: &Path, rules: &IgnoreRules) -> Result<WalkOutcome> {
    Walker::new(rules).walk(root)
}

fn record(warnings: &mut Vec<WalkWarning>, path: PathBuf, message: String) {
    warn!("Skipping {}: {}", path.display(), message);
    warnings.push(WalkWarning { path, message });
}

/// Child list of the innermost open directory
fn open_children(stack: &mut [TreeNode]) -> Result<&mut Vec<TreeNode>> {
    stack
        .last_mut()
        .and_then(TreeNode::children_mut)
        .ok_or_else(|| DctxError::internal("walk stack has no open directory"))
}

/// Close finished directories until the stack holds `depth` levels
fn close_to_depth(stack: &mut Vec<TreeNode>, depth: usize) -> Result<()> {
    while stack.len() > depth {
        let done = stack
            .pop()
            .ok_or_else(|| DctxError::internal("walk stack underflow"))?;
        open_children(stack)?.push(done);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ignore::IGNORE_FILE_NAME;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn paths(root: &TreeNode) -> BTreeSet<String> {
        root.iter().map(|n| n.relative_path.clone()).collect()
    }

    #[test]
    fn test_walk_builds_tree() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src/nested")).unwrap();
        fs::write(dir.path().join("README.md"), "hello").unwrap();
        fs::write(dir.path().join("src/main.c"), "int main(){}").unwrap();
        fs::write(dir.path().join("src/nested/deep.txt"), "x").unwrap();

        let rules = IgnoreRules::new();
        let outcome = walk(dir.path(), &rules).unwrap();
        let root = &outcome.root;

        assert!(root.is_dir());
        assert_eq!(root.relative_path, "");
        let expected: BTreeSet<String> = ["", "README.md", "src", "src/main.c", "src/nested", "src/nested/deep.txt"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(paths(root), expected);

        let main = root.find("src/main.c").unwrap();
        assert_eq!(main.content_size(), Some(12));
        assert_eq!(main.disk_path(), Some(dir.path().join("src/main.c").as_path()));
        assert!(main.modified > 0);

        assert_eq!(outcome.stats.files, 3);
        assert_eq!(outcome.stats.directories, 2);
        assert_eq!(outcome.stats.total_bytes, 18);
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn test_walk_honors_ignore_rules() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("build")).unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("build/out.o"), "obj").unwrap();
        fs::write(dir.path().join("src/build"), "a file named build").unwrap();
        fs::write(dir.path().join("debug.log"), "log").unwrap();
        fs::write(dir.path().join(IGNORE_FILE_NAME), "build/\n*.log\n").unwrap();

        let rules = crate::ignore::load_rules(dir.path(), None, &[], &[]);
        let outcome = walk(dir.path(), &rules).unwrap();
        let found = paths(&outcome.root);

        assert!(!found.contains("build"));
        assert!(!found.contains("build/out.o"));
        assert!(!found.contains("debug.log"));
        assert!(!found.contains(IGNORE_FILE_NAME));
        assert!(found.contains("src/build"), "directory-only rule must not hide files");
        assert_eq!(outcome.stats.ignored, 3);
    }

    #[test]
    fn test_walk_root_errors() {
        let dir = TempDir::new().unwrap();
        let rules = IgnoreRules::new();

        let missing = dir.path().join("missing");
        assert!(matches!(
            walk(&missing, &rules),
            Err(DctxError::RootUnreadable { .. })
        ));

        let file = dir.path().join("file.txt");
        fs::write(&file, "x").unwrap();
        assert!(matches!(walk(&file, &rules), Err(DctxError::NotADirectory(_))));
    }

    #[test]
    fn test_walk_empty_directory() {
        let dir = TempDir::new().unwrap();
        let outcome = walk(dir.path(), &IgnoreRules::new()).unwrap();
        assert!(outcome.root.children().is_empty());
        assert_eq!(outcome.stats, WalkStats::default());
    }

    #[cfg(unix)]
    #[test]
    fn test_walk_skips_symlinks_by_default() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("target.txt"), "data").unwrap();
        std::os::unix::fs::symlink(dir.path().join("target.txt"), dir.path().join("link.txt")).unwrap();

        let rules = IgnoreRules::new();
        let outcome = walk(dir.path(), &rules).unwrap();
        assert!(outcome.root.find("link.txt").is_none());
        assert_eq!(outcome.stats.skipped, 1);

        let followed = Walker::new(&rules).with_follow_symlinks(true).walk(dir.path()).unwrap();
        assert_eq!(followed.root.find("link.txt").unwrap().content_size(), Some(4));
    }

    #[cfg(unix)]
    #[test]
    fn test_walk_unlistable_subdirectory() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let locked = dir.path().join("locked");
        fs::create_dir_all(&locked).unwrap();
        fs::create_dir_all(dir.path().join("open")).unwrap();
        fs::write(locked.join("hidden.txt"), "hidden").unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::write(dir.path().join("open/b.txt"), "b").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Root can list anything; nothing to check in that case
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let result = walk(dir.path(), &IgnoreRules::new());
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        let outcome = result.unwrap();

        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].path, locked);

        let node = outcome.root.find("locked").unwrap();
        assert!(node.is_dir());
        assert!(node.children().is_empty());

        assert!(outcome.root.find("a.txt").is_some());
        assert!(outcome.root.find("open/b.txt").is_some());
        assert_eq!(outcome.stats.files, 2);
    }
}
