//! Main test module for dircontxt
//!
//! This module includes all test suites:
//! - Integration tests for multi-run snapshot scenarios
//! - Property-based tests for invariants
//! - Edge cases for unusual trees and damaged archives

pub mod integration;
pub mod property;

#[cfg(test)]
mod edge_cases {
    use ::dircontxt::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn target_in(parent: &TempDir) -> PathBuf {
        let target = parent.path().join("target_dir");
        fs::create_dir_all(&target).unwrap();
        target
    }

    fn builder() -> DircontxtBuilder {
        DircontxtBuilder::new().global_ignore_file(None)
    }

    #[test]
    fn test_empty_directory() {
        let parent = TempDir::new().unwrap();
        let target = target_in(&parent);

        let dctx = builder().build(&target).unwrap();
        let outcome = dctx.snapshot().unwrap();
        assert_eq!(outcome.write.files, 0);
        assert_eq!(outcome.write.directories, 1);

        let archive = Archive::open(&dctx.paths().archive).unwrap();
        assert!(archive.root().is_dir());
        assert!(archive.root().children().is_empty());
        assert_eq!(archive.content_len(), 0);

        let context = fs::read_to_string(&dctx.paths().context).unwrap();
        assert!(context.contains("[D] . (ID:ROOT"));
        assert!(!context.contains("<FILE_CONTENT_START"));
    }

    #[test]
    fn test_empty_files_and_nested_empty_dirs() {
        let parent = TempDir::new().unwrap();
        let target = target_in(&parent);
        fs::create_dir_all(target.join("a/b/c")).unwrap();
        fs::write(target.join("a/empty.txt"), "").unwrap();

        let dctx = builder().build(&target).unwrap();
        dctx.snapshot().unwrap();

        let mut archive = Archive::open(&dctx.paths().archive).unwrap();
        assert!(archive.root().find("a/b/c").unwrap().is_dir());
        assert_eq!(archive.read_path("a/empty.txt").unwrap(), Vec::<u8>::new());
        assert_eq!(archive.content_len(), 0);
    }

    #[test]
    fn test_binary_content_placeholder() {
        let parent = TempDir::new().unwrap();
        let target = target_in(&parent);
        fs::write(target.join("blob.bin"), [0u8, 159, 146, 150, 0, 1, 2]).unwrap();
        fs::write(target.join("note.txt"), "plain text").unwrap();

        let dctx = builder().build(&target).unwrap();
        dctx.snapshot().unwrap();

        let context = fs::read_to_string(&dctx.paths().context).unwrap();
        assert!(context.contains("[BINARY CONTENT PLACEHOLDER - Size: 7 bytes]"));
        assert!(context.contains("plain text\n"));

        // The archive keeps the raw bytes
        let mut archive = Archive::open(&dctx.paths().archive).unwrap();
        assert_eq!(archive.read_path("blob.bin").unwrap(), vec![0u8, 159, 146, 150, 0, 1, 2]);
    }

    #[test]
    fn test_unicode_names() {
        let parent = TempDir::new().unwrap();
        let target = target_in(&parent);
        fs::create_dir_all(target.join("données")).unwrap();
        fs::write(target.join("données/résumé.md"), "ça marche").unwrap();

        let dctx = builder().build(&target).unwrap();
        dctx.snapshot().unwrap();

        let mut archive = Archive::open(&dctx.paths().archive).unwrap();
        assert_eq!(
            archive.read_path("données/résumé.md").unwrap(),
            "ça marche".as_bytes()
        );
    }

    #[test]
    fn test_truncated_archive_is_rejected() {
        let parent = TempDir::new().unwrap();
        let target = target_in(&parent);
        fs::write(target.join("a.txt"), "some content").unwrap();

        let dctx = builder().output_mode(OutputMode::Binary).build(&target).unwrap();
        dctx.snapshot().unwrap();

        let bytes = fs::read(&dctx.paths().archive).unwrap();
        let damaged = parent.path().join("damaged.dircontxt");
        fs::write(&damaged, &bytes[..20]).unwrap();
        let err = Archive::open(&damaged).unwrap_err();
        assert!(err.is_corruption(), "{:?}", err);

        fs::write(&damaged, b"NOTDCTXT").unwrap();
        assert!(matches!(
            Archive::open(&damaged),
            Err(DctxError::InvalidSignature)
        ));
    }

    #[test]
    fn test_cat_unknown_path() {
        let parent = TempDir::new().unwrap();
        let target = target_in(&parent);
        fs::create_dir_all(target.join("dir")).unwrap();

        let dctx = builder().build(&target).unwrap();
        dctx.snapshot().unwrap();

        let mut archive = Archive::open(&dctx.paths().archive).unwrap();
        assert!(matches!(
            archive.read_path("missing.txt"),
            Err(DctxError::PathNotFound(_))
        ));
        assert!(matches!(archive.read_path("dir"), Err(DctxError::NotAFile(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_file_does_not_abort() {
        use std::os::unix::fs::PermissionsExt;

        let parent = TempDir::new().unwrap();
        let target = target_in(&parent);
        let secret = target.join("secret.txt");
        fs::write(&secret, "hidden").unwrap();
        fs::write(target.join("open.txt"), "visible").unwrap();
        fs::set_permissions(&secret, fs::Permissions::from_mode(0o000)).unwrap();

        // Root can read anything; nothing to check in that case
        if fs::read(&secret).is_ok() {
            return;
        }

        let dctx = builder().build(&target).unwrap();
        let outcome = dctx.snapshot().unwrap();
        assert_eq!(outcome.write.unreadable_files, 1);

        let mut archive = Archive::open(&dctx.paths().archive).unwrap();
        assert_eq!(archive.read_path("secret.txt").unwrap(), Vec::<u8>::new());
        assert_eq!(archive.read_path("open.txt").unwrap(), b"visible");

        fs::set_permissions(&secret, fs::Permissions::from_mode(0o644)).unwrap();
    }
}
