//! Property-based testing for dircontxt
//!
//! Uses proptest to verify invariants across randomly generated trees,
//! contents and ignore rule lists.

use ::dircontxt::*;
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Generate relative file paths (0-3 directories deep)
fn path_strategy() -> impl Strategy<Value = String> {
    let dirs = prop::collection::vec(
        prop_oneof!["[a-z]{1,8}", "dir[0-9]{1,2}"],
        0..=3,
    );
    let filename = prop_oneof![
        "file[0-9]{1,3}\\.txt",
        "[a-z]{1,8}\\.(txt|rs|md)",
        "[a-z]{3,10}",
    ];
    (dirs, filename).prop_map(|(dirs, filename)| {
        let mut parts = dirs;
        parts.push(filename);
        parts.join("/")
    })
}

/// Generate random file content
fn content_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        "[a-zA-Z0-9 \n]{0,500}".prop_map(|s| s.into_bytes()),
        prop::collection::vec(any::<u8>(), 0..2000),
        (any::<u8>(), 1..500usize).prop_map(|(byte, count)| vec![byte; count]),
    ]
}

/// Generate a file set whose paths never collide with each other's directories
fn tree_strategy() -> impl Strategy<Value = BTreeMap<String, Vec<u8>>> {
    prop::collection::btree_map(path_strategy(), content_strategy(), 0..30).prop_map(|files| {
        let paths: Vec<String> = files.keys().cloned().collect();
        files
            .into_iter()
            .filter(|(path, _)| {
                let as_dir = format!("{}/", path);
                !paths.iter().any(|other| other.starts_with(&as_dir))
            })
            .collect()
    })
}

fn materialize(root: &Path, files: &BTreeMap<String, Vec<u8>>) -> anyhow::Result<()> {
    for (rel, content) in files {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
    }
    Ok(())
}

/// Generate one ignore line with an optional negation and directory marker
fn rule_strategy() -> impl Strategy<Value = String> {
    (
        any::<bool>(),
        prop_oneof!["[a-c]{1,2}", "\\*\\.(txt|rs)", "/[a-c]{1,2}", "[a-c]/[a-c]"],
        any::<bool>(),
    )
        .prop_map(|(negate, body, dir_only)| {
            format!(
                "{}{}{}",
                if negate { "!" } else { "" },
                body,
                if dir_only { "/" } else { "" }
            )
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(40))]

    /// Every written file is recovered byte-for-byte
    #[test]
    fn archive_round_trip(files in tree_strategy()) {
        let root = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        materialize(root.path(), &files).unwrap();

        let rules = IgnoreRules::new();
        let mut walked = walk(root.path(), &rules).unwrap();
        let dest = out.path().join("snap.dircontxt");
        let stats = write_archive(&dest, &mut walked.root).unwrap();
        prop_assert_eq!(stats.files, files.len());

        let mut archive = Archive::open(&dest).unwrap();
        prop_assert_eq!(archive.root(), &walked.root);
        for (rel, content) in &files {
            prop_assert_eq!(&archive.read_path(rel).unwrap(), content);
        }
        let total: u64 = files.values().map(|c| c.len() as u64).sum();
        prop_assert_eq!(archive.content_len(), total);
    }

    /// A tree compared with itself has no changes
    #[test]
    fn compare_is_reflexive(files in tree_strategy()) {
        let root = TempDir::new().unwrap();
        materialize(root.path(), &files).unwrap();

        let walked = walk(root.path(), &IgnoreRules::new()).unwrap();
        prop_assert!(compare(Some(&walked.root), Some(&walked.root)).is_empty());
    }

    /// Comparing against nothing reports every non-root node once
    #[test]
    fn compare_against_empty(files in tree_strategy()) {
        let root = TempDir::new().unwrap();
        materialize(root.path(), &files).unwrap();

        let walked = walk(root.path(), &IgnoreRules::new()).unwrap();
        let nodes = walked.root.iter().count() - 1;

        let added = compare(None, Some(&walked.root));
        prop_assert_eq!(added.len(), nodes);
        prop_assert!(added.entries().iter().all(|e| e.change == ChangeKind::Added));

        let removed = compare(Some(&walked.root), None);
        prop_assert_eq!(removed.counts().removed, nodes);
    }

    /// The last matching rule decides, and negation flips it
    #[test]
    fn last_match_wins(
        lines in prop::collection::vec(rule_strategy(), 1..8),
        path in "[a-c]{1,2}(/[a-c]{1,2}){0,2}(\\.txt|\\.rs)?",
        is_dir in any::<bool>(),
    ) {
        let mut rules = IgnoreRules::new();
        for line in &lines {
            rules.add_pattern(line).unwrap();
        }
        let name = path.rsplit('/').next().unwrap_or(&path);

        let expected = rules
            .rules()
            .iter()
            .rev()
            .find(|rule| rule.matches(&path, name, is_dir))
            .is_some_and(|rule| !rule.is_negated());
        prop_assert_eq!(rules.is_ignored(&path, name, is_dir), expected);

        // Appending the negation of the decisive pattern always re-includes
        let mut with_negation = rules.clone();
        with_negation.add_pattern(&format!("!{}", path)).unwrap();
        prop_assert!(!with_negation.is_ignored(&path, name, is_dir));
    }
}
