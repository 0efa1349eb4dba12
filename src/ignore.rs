//! Ignore rule engine
//!
//! Decides which entries are left out of a snapshot. Rules are compiled from
//! gitignore-like lines and kept as an ordered list: every rule that matches a
//! path flips the outcome (to ignored, or back to included for `!` rules), and
//! the state after the last rule is the answer.
//!
//! ## Syntax
//!
//! ```text
//! # comment
//! *.log          # name suffix, anywhere in the tree
//! !keep.log      # exception: re-include
//! build/         # directories named `build` only
//! docs/api       # exact path from the snapshot root
//! assets/gen*    # path prefix
//! /TODO          # anchored at the root
//! ```
//!
//! A pattern without `/` and without a leading `*` matches a base name
//! exactly. Any other glob metacharacter is rejected.
//!
//! ## Sources
//!
//! [`load_rules`] assembles the rule list from, in increasing precedence:
//! built-in defaults, the user-global file, the target's
//! [`.dircontxtignore`](IGNORE_FILE_NAME), and extra patterns passed in by
//! the caller.

use crate::error::{DctxError, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, trace, warn};

/// Name of the per-target ignore file
pub const IGNORE_FILE_NAME: &str = ".dircontxtignore";

/// Version-control directories that are never captured
const VCS_DIRS: &[&str] = &[".git/", ".hg/", ".svn/"];

/// How a rule's pattern is compared against a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Exact base-name match at any depth
    Basename,
    /// Exact match of the full relative path
    FullPath,
    /// The relative path starts with the pattern
    PathPrefix,
    /// The base name ends with the pattern
    NameSuffix,
}

/// One compiled ignore pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreRule {
    pattern: String,
    kind: MatchKind,
    directory_only: bool,
    negated: bool,
}

impl IgnoreRule {
    /// Compile a single line of ignore syntax.
    ///
    /// # Returns
    ///
    /// `Ok(None)` for blank lines and comments, `Ok(Some(rule))` otherwise.
    ///
    /// # Errors
    ///
    /// [`DctxError::InvalidPattern`] when nothing is left after stripping the
    /// `!`, `/` markers, or when the pattern uses a wildcard anywhere other
    /// than a single leading (name suffix) or trailing (path prefix) `*`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use dircontxt::ignore::{IgnoreRule, MatchKind};
    ///
    /// let rule = IgnoreRule::compile("!*.log").unwrap().unwrap();
    /// assert_eq!(rule.kind(), MatchKind::NameSuffix);
    /// assert_eq!(rule.pattern(), ".log");
    /// assert!(rule.is_negated());
    /// ```
    pub fn compile(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let invalid = || DctxError::InvalidPattern(line.to_string());

        let (negated, body) = match line.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, line),
        };
        let (directory_only, body) = match body.strip_suffix('/') {
            Some(rest) => (true, rest),
            None => (false, body),
        };
        let (anchored, body) = match body.strip_prefix('/') {
            Some(rest) => (true, rest),
            None => (false, body),
        };
        if body.is_empty() {
            return Err(invalid());
        }

        let (kind, pattern) = if anchored || body.contains('/') {
            match body.strip_suffix('*') {
                Some(prefix) => (MatchKind::PathPrefix, prefix),
                None => (MatchKind::FullPath, body),
            }
        } else if let Some(suffix) = body.strip_prefix('*') {
            (MatchKind::NameSuffix, suffix)
        } else {
            (MatchKind::Basename, body)
        };

        if pattern.contains(['*', '?', '[']) {
            return Err(invalid());
        }
        if pattern.is_empty() && kind != MatchKind::NameSuffix {
            return Err(invalid());
        }

        Ok(Some(Self {
            pattern: pattern.to_string(),
            kind,
            directory_only,
            negated,
        }))
    }

    /// Normalized matcher text
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Matching strategy
    pub fn kind(&self) -> MatchKind {
        self.kind
    }

    /// Whether the rule only applies to directories
    pub fn is_directory_only(&self) -> bool {
        self.directory_only
    }

    /// Whether the rule re-includes matching paths
    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// Test one candidate.
    ///
    /// `path` is the relative path from the snapshot root and may carry a
    /// trailing `/` for directories; `name` is its final segment.
    pub fn matches(&self, path: &str, name: &str, is_dir: bool) -> bool {
        if self.directory_only && !is_dir {
            return false;
        }

        let path = path.trim_end_matches('/');
        match self.kind {
            MatchKind::Basename => name == self.pattern,
            MatchKind::NameSuffix => name.ends_with(&self.pattern),
            MatchKind::FullPath => path == self.pattern,
            MatchKind::PathPrefix => {
                // Directories are compared in `dir/` form so `build/*` covers `build` itself
                path.starts_with(&self.pattern)
                    || (is_dir && self.pattern.strip_suffix('/') == Some(path))
            }
        }
    }
}

/// Evaluate an ordered rule list against one candidate (last match wins)
pub fn is_ignored(path: &str, name: &str, is_dir: bool, rules: &[IgnoreRule]) -> bool {
    rules.iter().fold(false, |ignored, rule| {
        if rule.matches(path, name, is_dir) {
            !rule.negated
        } else {
            ignored
        }
    })
}

/// Ordered collection of compiled rules
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    rules: Vec<IgnoreRule>,
}

impl IgnoreRules {
    /// Create an empty rule list
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in rules: VCS directories, the per-target ignore file, and any
    /// artifact names the caller produces next to the snapshot
    pub fn with_builtin_defaults(artifact_names: &[&str]) -> Self {
        let mut rules = Self::new();
        let builtin = VCS_DIRS
            .iter()
            .copied()
            .chain(std::iter::once(IGNORE_FILE_NAME))
            .chain(artifact_names.iter().copied());
        for line in builtin {
            rules.add_line("<builtin>", 0, line);
        }
        rules
    }

    /// Append an already compiled rule
    pub fn push(&mut self, rule: IgnoreRule) {
        self.rules.push(rule);
    }

    /// Compile and append one pattern, propagating compile errors
    pub fn add_pattern(&mut self, pattern: &str) -> Result<bool> {
        match IgnoreRule::compile(pattern)? {
            Some(rule) => {
                self.rules.push(rule);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Compile every line of `text`, skipping invalid ones with a warning.
    ///
    /// Returns the number of rules added.
    pub fn add_lines(&mut self, source: &str, text: &str) -> usize {
        let mut added = 0;
        for (idx, line) in text.lines().enumerate() {
            if self.add_line(source, idx + 1, line) {
                added += 1;
            }
        }
        added
    }

    fn add_line(&mut self, source: &str, line_no: usize, line: &str) -> bool {
        match IgnoreRule::compile(line) {
            Ok(Some(rule)) => {
                trace!("{}:{}: {:?}", source, line_no, rule);
                self.rules.push(rule);
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!("Skipping ignore rule at {}:{}: {}", source, line_no, e);
                false
            }
        }
    }

    /// Append rules from a file.
    ///
    /// A missing file contributes nothing and is not an error.
    ///
    /// # Errors
    ///
    /// Any other I/O failure while reading the file.
    pub fn load_file(&mut self, path: &Path) -> Result<usize> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let added = self.add_lines(&path.display().to_string(), &text);
        debug!("Loaded {} ignore rules from {}", added, path.display());
        Ok(added)
    }

    /// Whether a candidate is excluded (last match wins)
    pub fn is_ignored(&self, path: &str, name: &str, is_dir: bool) -> bool {
        is_ignored(path, name, is_dir, &self.rules)
    }

    /// Compiled rules in evaluation order
    pub fn rules(&self) -> &[IgnoreRule] {
        &self.rules
    }

    /// Number of rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether no rules are loaded
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Assemble the full rule list for one target directory.
///
/// Sources are appended lowest precedence first: built-in defaults (plus
/// `artifact_names`), `global_file`, `<target>/.dircontxtignore`, then
/// `extra` patterns. Unreadable files and invalid lines are logged and
/// skipped; loading never fails.
pub fn load_rules(
    target: &Path,
    global_file: Option<&Path>,
    artifact_names: &[&str],
    extra: &[String],
) -> IgnoreRules {
    let mut rules = IgnoreRules::with_builtin_defaults(artifact_names);

    let files = global_file
        .into_iter()
        .map(Path::to_path_buf)
        .chain(std::iter::once(target.join(IGNORE_FILE_NAME)));
    for file in files {
        if let Err(e) = rules.load_file(&file) {
            warn!("Cannot read ignore file {}: {}", file.display(), e);
        }
    }

    for (idx, pattern) in extra.iter().enumerate() {
        rules.add_line("<extra>", idx + 1, pattern);
    }

    debug!("{} ignore rules active for {}", rules.len(), target.display());
    rules
}
