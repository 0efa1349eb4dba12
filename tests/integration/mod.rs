//! Multi-run integration tests for dircontxt
//!
//! Generates realistic project trees, mutates them between snapshots and
//! checks that each run reports exactly what changed on disk.

use ::dircontxt::*;
use filetime::FileTime;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use tracing::info;

/// Test harness for repeated snapshots of one generated project
pub struct DctxTestHarness {
    pub parent_dir: TempDir,
    pub target: PathBuf,
    pub dctx: Dircontxt,
    pub file_generator: FileGenerator,
    /// Fake clock for mtimes, so edits inside one second are still visible
    clock: i64,
}

impl DctxTestHarness {
    /// Create a new harness with an empty target directory
    pub fn new() -> Self {
        Self::with_builder(DircontxtBuilder::new())
    }

    /// Create a harness with a customized builder
    pub fn with_builder(builder: DircontxtBuilder) -> Self {
        let parent_dir = TempDir::new().unwrap();
        let target = parent_dir.path().join("project");
        fs::create_dir_all(&target).unwrap();
        let dctx = builder.global_ignore_file(None).build(&target).unwrap();

        Self {
            parent_dir,
            target,
            dctx,
            file_generator: FileGenerator::new(42),
            clock: 1_600_000_000,
        }
    }

    /// Write a file with a fresh, strictly increasing mtime
    pub fn write_file(&mut self, rel: &str, content: &[u8]) -> anyhow::Result<()> {
        let path = self.target.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        self.clock += 10;
        filetime::set_file_mtime(&path, FileTime::from_unix_time(self.clock, 0))?;
        Ok(())
    }

    /// Generate a nested project
    pub fn generate_project(&mut self, config: ProjectConfig) -> anyhow::Result<()> {
        for depth in 1..=config.max_depth {
            for dir_idx in 0..config.dirs_per_level {
                let dir: Vec<String> = (0..depth)
                    .map(|level| format!("dir_{}_{}", level, dir_idx))
                    .collect();
                let dir = dir.join("/");
                for file_idx in 0..config.files_per_dir {
                    let content = self
                        .file_generator
                        .generate_file_content(config.file_size_range.clone());
                    self.write_file(&format!("{}/file_{}.txt", dir, file_idx), &content)?;
                }
            }
        }
        Ok(())
    }

    /// Apply random edits, deletions and additions to files
    pub fn mutate_files(&mut self, config: MutationConfig) -> anyhow::Result<()> {
        let mut files: Vec<String> = self.file_map()?.into_keys().collect();

        for mutation_idx in 0..config.num_mutations {
            if files.is_empty() {
                break;
            }
            match self.file_generator.rng.random_range(0..3) {
                0 => {
                    let idx = self.file_generator.rng.random_range(0..files.len());
                    let rel = files[idx].clone();
                    let content = self
                        .file_generator
                        .generate_file_content(config.file_size_range.clone());
                    self.write_file(&rel, &content)?;
                }
                1 => {
                    let idx = self.file_generator.rng.random_range(0..files.len());
                    let rel = files.remove(idx);
                    fs::remove_file(self.target.join(&rel))?;
                }
                2 => {
                    let rel = format!("mutated_file_{}.txt", mutation_idx);
                    let content = self
                        .file_generator
                        .generate_file_content(config.file_size_range.clone());
                    self.write_file(&rel, &content)?;
                    if !files.contains(&rel) {
                        files.push(rel);
                    }
                }
                _ => unreachable!(),
            }
        }
        Ok(())
    }

    /// Relative path to content for every file on disk
    pub fn file_map(&self) -> anyhow::Result<BTreeMap<String, Vec<u8>>> {
        let mut map = BTreeMap::new();
        for entry in walkdir::WalkDir::new(&self.target).min_depth(1) {
            let entry = entry?;
            if entry.file_type().is_file() {
                let rel = entry
                    .path()
                    .strip_prefix(&self.target)?
                    .to_string_lossy()
                    .replace('\\', "/");
                map.insert(rel, fs::read(entry.path())?);
            }
        }
        Ok(map)
    }
}

/// File changes expected between two on-disk states
pub fn expected_changes(
    before: &BTreeMap<String, Vec<u8>>,
    after: &BTreeMap<String, Vec<u8>>,
) -> BTreeMap<String, ChangeKind> {
    let mut expected = BTreeMap::new();
    for (path, content) in after {
        match before.get(path) {
            None => {
                expected.insert(path.clone(), ChangeKind::Added);
            }
            Some(old) if old != content => {
                expected.insert(path.clone(), ChangeKind::Modified);
            }
            Some(_) => {}
        }
    }
    for path in before.keys() {
        if !after.contains_key(path) {
            expected.insert(path.clone(), ChangeKind::Removed);
        }
    }
    expected
}

/// File entries of a report, keyed by path
pub fn reported_file_changes(report: &DiffReport) -> BTreeMap<String, ChangeKind> {
    report
        .entries()
        .iter()
        .filter(|e| e.entry_kind == EntryKind::File)
        .map(|e| (e.relative_path.clone(), e.change))
        .collect()
}

/// File generator for test data
pub struct FileGenerator {
    rng: StdRng,
}

impl FileGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Generate realistic file content
    pub fn generate_file_content(&mut self, size_range: std::ops::Range<usize>) -> Vec<u8> {
        let size = self.rng.random_range(size_range);
        let mut content = Vec::with_capacity(size);

        let words = ["the", "quick", "brown", "fox", "jumps", "over", "lazy", "dog", "lorem", "ipsum"];
        while content.len() < size {
            let word = words[self.rng.random_range(0..words.len())];
            content.extend_from_slice(word.as_bytes());
            content.push(b' ');
        }

        content.truncate(size);
        content
    }

    /// Generate binary file content
    pub fn generate_binary_content(&mut self, size: usize) -> Vec<u8> {
        let mut content = vec![0u8; size];
        self.rng.fill(&mut content[..]);
        content
    }
}

#[derive(Debug, Clone)]
pub struct ProjectConfig {
    pub max_depth: usize,
    pub dirs_per_level: usize,
    pub files_per_dir: usize,
    pub file_size_range: std::ops::Range<usize>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            dirs_per_level: 3,
            files_per_dir: 5,
            file_size_range: 1..2_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MutationConfig {
    pub num_mutations: usize,
    pub file_size_range: std::ops::Range<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn test_round_trip_generated_project() {
        let mut harness = DctxTestHarness::new();
        harness.generate_project(ProjectConfig::default()).unwrap();
        let blob = harness.file_generator.generate_binary_content(4096);
        harness.write_file("assets/blob.bin", &blob).unwrap();

        harness.dctx.snapshot().unwrap();
        let mut archive = Archive::open(&harness.dctx.paths().archive).unwrap();

        let on_disk = harness.file_map().unwrap();
        info!("Checking {} files", on_disk.len());
        assert_eq!(archive.root().file_count(), on_disk.len());
        for (rel, content) in &on_disk {
            assert_eq!(&archive.read_path(rel).unwrap(), content, "{}", rel);
        }
    }

    #[test]
    #[traced_test]
    fn test_repeated_snapshots_report_exact_changes() {
        let mut harness = DctxTestHarness::new();
        harness
            .generate_project(ProjectConfig {
                max_depth: 2,
                dirs_per_level: 3,
                files_per_dir: 4,
                file_size_range: 10..500,
            })
            .unwrap();
        harness.dctx.snapshot().unwrap();

        let mut expected_version = String::from("V1");
        for round in 0..5 {
            let before = harness.file_map().unwrap();
            harness
                .mutate_files(MutationConfig {
                    num_mutations: 8,
                    file_size_range: 10..500,
                })
                .unwrap();
            let after = harness.file_map().unwrap();

            let outcome = harness.dctx.snapshot().unwrap();
            expected_version = version::next_version(&expected_version);
            assert_eq!(outcome.version, expected_version);

            let changes = outcome.changes.as_ref().unwrap();
            assert_eq!(
                reported_file_changes(changes),
                expected_changes(&before, &after),
                "round {}",
                round
            );
            assert_eq!(outcome.diff_file.is_some(), changes.has_changes());
        }
    }

    #[test]
    fn test_rewrite_with_same_bytes_is_not_reported() {
        let mut harness = DctxTestHarness::new();
        harness.write_file("a.txt", b"unchanged").unwrap();
        harness.write_file("b.txt", b"before").unwrap();
        harness.dctx.snapshot().unwrap();

        // Both get new mtimes; only b.txt gets new bytes of the same length
        harness.write_file("a.txt", b"unchanged").unwrap();
        harness.write_file("b.txt", b"after!").unwrap();

        let outcome = harness.dctx.snapshot().unwrap();
        let changes = reported_file_changes(outcome.changes.as_ref().unwrap());
        assert_eq!(changes.len(), 1);
        assert_eq!(changes.get("b.txt"), Some(&ChangeKind::Modified));
    }

    #[test]
    fn test_binary_mode_keeps_only_the_archive() {
        let mut harness =
            DctxTestHarness::with_builder(DircontxtBuilder::new().output_mode(OutputMode::Binary));
        harness.write_file("a.txt", b"a").unwrap();
        harness.dctx.snapshot().unwrap();
        harness.write_file("a.txt", b"changed").unwrap();
        let outcome = harness.dctx.snapshot().unwrap();

        // No context file means no version to continue from
        assert_eq!(outcome.version, "V1");
        assert!(outcome.context.is_none());
        assert!(outcome.diff_file.is_none());
        assert!(!harness.dctx.paths().context.exists());
        assert!(harness.dctx.paths().archive.is_file());
    }

    #[test]
    fn test_removed_directory_lists_descendants() {
        let mut harness = DctxTestHarness::new();
        harness.write_file("keep.txt", b"k").unwrap();
        harness.write_file("old/a.txt", b"a").unwrap();
        harness.write_file("old/deep/b.txt", b"b").unwrap();
        harness.dctx.snapshot().unwrap();

        fs::remove_dir_all(harness.target.join("old")).unwrap();
        let outcome = harness.dctx.snapshot().unwrap();

        let changes = outcome.changes.as_ref().unwrap();
        let mut paths: Vec<&str> = changes
            .entries()
            .iter()
            .map(|e| e.relative_path.as_str())
            .collect();
        // Parents come before their descendants
        assert_eq!(paths[0], "old");
        paths.sort();
        assert_eq!(paths, vec!["old", "old/a.txt", "old/deep", "old/deep/b.txt"]);
        assert!(changes.entries().iter().all(|e| e.change == ChangeKind::Removed));

        let diff = fs::read_to_string(outcome.diff_file.unwrap()).unwrap();
        assert!(diff.contains("[REMOVED] [D] old/deep"));
        assert!(!diff.contains("<FILE_CONTENT_START"));
    }
}
