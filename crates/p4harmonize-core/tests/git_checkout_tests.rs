use p4harmonize_core::lister::{GitLister, IgnoreRules, SourceLister};
use p4harmonize_core::Error;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

fn git(root: &Path, args: &[&str]) {
    let status = Command::new("git")
        .arg("-C")
        .arg(root)
        .args(["-c", "user.name=Builder", "-c", "user.email=builder@example.com"])
        .args(["-c", "core.autocrlf=false", "-c", "commit.gpgsign=false"])
        .args(args)
        .status()
        .unwrap();
    assert!(status.success(), "git {:?} failed", args);
}

/// Two commits: the first adds `README.md`, the second edits it.
fn repository(root: &Path) {
    git(root, &["init", "-q"]);
    fs::write(root.join("README.md"), b"first\n").unwrap();
    git(root, &["add", "README.md"]);
    git(root, &["commit", "-q", "-m", "first"]);
    fs::write(root.join("README.md"), b"second version\n").unwrap();
    git(root, &["commit", "-q", "-a", "-m", "second"]);
}

fn lister(root: &Path, commit: &str) -> GitLister {
    GitLister::new(root, commit, IgnoreRules::new(&[]).unwrap(), false)
}

#[test]
fn test_clean_checkout_of_commit_is_accepted() {
    let root = tempdir().unwrap();
    repository(root.path());

    let commit = lister(root.path(), "HEAD").verify_checkout().unwrap();
    assert_eq!(commit.len(), 40);

    let entries = lister(root.path(), "HEAD").list().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].path, "README.md");
    assert_eq!(entries[0].size, 15);
}

#[test]
fn test_commit_other_than_checkout_is_rejected() {
    let root = tempdir().unwrap();
    repository(root.path());

    // Listing HEAD~1 would pair its sizes with the newer working-tree content.
    let result = lister(root.path(), "HEAD~1").verify_checkout();
    assert!(matches!(result, Err(Error::Validation(_))));
}

#[test]
fn test_modified_tracked_file_is_rejected() {
    let root = tempdir().unwrap();
    repository(root.path());
    fs::write(root.path().join("README.md"), b"local edit\n").unwrap();
    fs::write(root.path().join("untracked.txt"), b"ignored\n").unwrap();

    match lister(root.path(), "HEAD").verify_checkout() {
        Err(Error::Validation(message)) => assert!(message.contains("README.md")),
        other => panic!("expected validation error, got {:?}", other),
    }
}
