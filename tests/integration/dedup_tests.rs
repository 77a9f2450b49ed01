use filetime::{set_file_mtime, FileTime};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};
use treesift::duplicates::{run_dedup, DedupOptions};
use treesift::error::ConfigError;
use walkdir::WalkDir;

fn write_file(root: &Path, rel: &str, content: &str, mtime: i64) -> PathBuf {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    set_file_mtime(&path, FileTime::from_unix_time(mtime, 0)).unwrap();
    path
}

/// Relative path -> content for every regular file under `root`.
fn snapshot(root: &Path) -> BTreeMap<PathBuf, String> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e.path().strip_prefix(root).unwrap().to_path_buf();
            (rel, fs::read_to_string(e.path()).unwrap())
        })
        .collect()
}

fn all_dirs(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_dir())
        .map(|e| e.into_path())
        .collect()
}

fn root_of(dir: &TempDir) -> PathBuf {
    dir.path().canonicalize().unwrap()
}

#[test]
fn test_newest_copy_stays_older_copy_is_quarantined() {
    let dir = tempdir().unwrap();
    let root = root_of(&dir);
    write_file(&root, "a/x.txt", "A", 10);
    write_file(&root, "b/x.txt", "A", 20);

    let report = run_dedup(&DedupOptions::new(root.clone())).unwrap();

    assert_eq!(report.plan.len(), 1);
    assert!(root.join("b/x.txt").exists());
    assert!(!root.join("a/x.txt").exists());
    assert_eq!(
        fs::read_to_string(root.join("Duplicates/a/x.txt")).unwrap(),
        "A"
    );
    // a/ is now empty and gets reclaimed
    assert!(!root.join("a").exists());
    assert!(root.join("Duplicates").exists());
}

#[test]
fn test_second_run_plans_nothing() {
    let dir = tempdir().unwrap();
    let root = root_of(&dir);
    write_file(&root, "one.txt", "same", 1);
    write_file(&root, "sub/two.txt", "same", 2);
    write_file(&root, "sub/deeper/three.txt", "same", 3);
    write_file(&root, "unique.txt", "other", 1);

    let first = run_dedup(&DedupOptions::new(root.clone())).unwrap();
    assert_eq!(first.plan.len(), 2);

    let second = run_dedup(&DedupOptions::new(root.clone())).unwrap();
    assert!(second.plan.is_empty());
    assert_eq!(second.stats.duplicate_groups, 0);
}

#[test]
fn test_no_file_is_lost_or_duplicated() {
    let dir = tempdir().unwrap();
    let root = root_of(&dir);
    write_file(&root, "p/1.txt", "alpha", 5);
    write_file(&root, "q/1.txt", "alpha", 7);
    write_file(&root, "q/2.txt", "alpha", 6);
    write_file(&root, "r/beta.txt", "beta", 1);
    write_file(&root, "s/beta.txt", "beta", 1);
    write_file(&root, "gamma.txt", "gamma", 1);

    let before = snapshot(&root);
    let report = run_dedup(&DedupOptions::new(root.clone())).unwrap();
    let after = snapshot(&root);

    assert!(report.relocation.as_ref().unwrap().all_succeeded());
    assert_eq!(before.len(), after.len());

    let mut contents_before: Vec<_> = before.values().cloned().collect();
    let mut contents_after: Vec<_> = after.values().cloned().collect();
    contents_before.sort();
    contents_after.sort();
    assert_eq!(contents_before, contents_after);

    // Exactly one copy of each content outside the quarantine
    let outside: Vec<_> = after
        .iter()
        .filter(|(rel, _)| !rel.starts_with("Duplicates"))
        .map(|(_, c)| c.as_str())
        .collect();
    let mut sorted = outside.clone();
    sorted.sort_unstable();
    assert_eq!(sorted, vec!["alpha", "beta", "gamma"]);

    // Newest alpha survives; the beta tie goes to the lexicographically smaller path
    assert!(after.contains_key(Path::new("q/1.txt")));
    assert!(after.contains_key(Path::new("r/beta.txt")));
    assert!(after.contains_key(Path::new("Duplicates/s/beta.txt")));
}

#[test]
fn test_tie_prefers_shorter_path() {
    let dir = tempdir().unwrap();
    let root = root_of(&dir);
    write_file(&root, "deep/er/x.txt", "same", 100);
    write_file(&root, "x.txt", "same", 100);

    run_dedup(&DedupOptions::new(root.clone())).unwrap();

    assert!(root.join("x.txt").exists());
    assert!(root.join("Duplicates/deep/er/x.txt").exists());
}

#[test]
fn test_existing_quarantine_entry_is_never_overwritten() {
    let dir = tempdir().unwrap();
    let root = root_of(&dir);
    write_file(&root, "Duplicates/a/x.txt", "earlier run", 1);
    write_file(&root, "a/x.txt", "A", 10);
    write_file(&root, "b/x.txt", "A", 20);

    run_dedup(&DedupOptions::new(root.clone())).unwrap();

    assert_eq!(
        fs::read_to_string(root.join("Duplicates/a/x.txt")).unwrap(),
        "earlier run"
    );
    assert_eq!(
        fs::read_to_string(root.join("Duplicates/a/x (1).txt")).unwrap(),
        "A"
    );
}

#[test]
fn test_quarantine_contents_are_not_rescanned() {
    let dir = tempdir().unwrap();
    let root = root_of(&dir);
    write_file(&root, "Duplicates/old.txt", "same", 1);
    write_file(&root, "keep.txt", "same", 1);

    let report = run_dedup(&DedupOptions::new(root.clone())).unwrap();

    assert_eq!(report.scanned_files, 1);
    assert!(report.plan.is_empty());
}

#[test]
fn test_dry_run_changes_nothing() {
    let dir = tempdir().unwrap();
    let root = root_of(&dir);
    write_file(&root, "a/x.txt", "A", 10);
    write_file(&root, "b/x.txt", "A", 20);
    fs::create_dir_all(root.join("empty/nested")).unwrap();

    let before = snapshot(&root);
    let dirs_before = all_dirs(&root);

    let options = DedupOptions::new(root.clone()).with_dry_run(true);
    let report = run_dedup(&options).unwrap();

    assert_eq!(report.plan.len(), 1);
    assert!(report.relocation.is_none());
    assert!(report.reclaimed.is_none());
    assert_eq!(snapshot(&root), before);
    assert_eq!(all_dirs(&root), dirs_before);
}

#[test]
fn test_keep_empty_dirs() {
    let dir = tempdir().unwrap();
    let root = root_of(&dir);
    write_file(&root, "a/x.txt", "A", 10);
    write_file(&root, "b/x.txt", "A", 20);

    let options = DedupOptions::new(root.clone()).with_keep_empty_dirs(true);
    let report = run_dedup(&options).unwrap();

    assert!(report.reclaimed.is_none());
    assert!(root.join("a").is_dir());
}

#[test]
fn test_preexisting_empty_dirs_are_reclaimed_but_quarantine_kept() {
    let dir = tempdir().unwrap();
    let root = root_of(&dir);
    write_file(&root, "only.txt", "x", 1);
    fs::create_dir_all(root.join("void/inner")).unwrap();
    fs::create_dir_all(root.join("Duplicates/leftover")).unwrap();

    let report = run_dedup(&DedupOptions::new(root.clone())).unwrap();

    assert_eq!(report.reclaimed.unwrap().removed_count(), 2);
    assert!(!root.join("void").exists());
    assert!(root.join("Duplicates/leftover").is_dir());
}

#[test]
fn test_custom_quarantine_name() {
    let dir = tempdir().unwrap();
    let root = root_of(&dir);
    write_file(&root, "a.txt", "A", 1);
    write_file(&root, "b.txt", "A", 2);

    let options = DedupOptions::new(root.clone()).with_quarantine_name("Dupes");
    run_dedup(&options).unwrap();

    assert!(root.join("Dupes/a.txt").exists());
    assert!(!root.join("Duplicates").exists());
}

#[test]
fn test_invalid_quarantine_name() {
    let dir = tempdir().unwrap();
    let options = DedupOptions::new(dir.path().to_path_buf()).with_quarantine_name("../escape");
    assert!(matches!(
        run_dedup(&options),
        Err(ConfigError::InvalidQuarantine { .. })
    ));
}

#[test]
fn test_empty_files_are_duplicates_of_each_other() {
    let dir = tempdir().unwrap();
    let root = root_of(&dir);
    write_file(&root, "e1", "", 1);
    write_file(&root, "e2", "", 2);

    let report = run_dedup(&DedupOptions::new(root.clone())).unwrap();

    assert_eq!(report.plan.len(), 1);
    assert!(root.join("e2").exists());
    assert!(root.join("Duplicates/e1").exists());
}

#[cfg(unix)]
#[test]
fn test_symlinks_are_left_alone() {
    let dir = tempdir().unwrap();
    let root = root_of(&dir);
    let target = write_file(&root, "target.txt", "A", 1);
    std::os::unix::fs::symlink(&target, root.join("link.txt")).unwrap();

    let report = run_dedup(&DedupOptions::new(root.clone())).unwrap();

    assert!(report.plan.is_empty());
    assert!(fs::symlink_metadata(root.join("link.txt")).is_ok());
}

#[cfg(unix)]
#[test]
fn test_follow_symlinks_sees_linked_directory() {
    let dir = tempdir().unwrap();
    let base = root_of(&dir);
    let root = base.join("tree");
    write_file(&root, "real/x.txt", "A", 20);
    write_file(&base, "outside/y.txt", "A", 10);
    std::os::unix::fs::symlink(base.join("outside"), root.join("linked")).unwrap();

    let plain = run_dedup(&DedupOptions::new(root.clone()).with_dry_run(true)).unwrap();
    assert_eq!(plain.scanned_files, 1);
    assert!(plain.plan.is_empty());

    let followed = run_dedup(
        &DedupOptions::new(root.clone())
            .with_dry_run(true)
            .with_follow_symlinks(true),
    )
    .unwrap();
    assert_eq!(followed.scanned_files, 2);
    assert_eq!(followed.plan.len(), 1);
    assert_eq!(followed.plan[0].source, root.join("linked/y.txt"));
}

#[cfg(unix)]
#[test]
fn test_followed_alias_of_same_file_is_not_a_duplicate() {
    let dir = tempdir().unwrap();
    let root = root_of(&dir);
    write_file(&root, "real/x.txt", "A", 20);
    std::os::unix::fs::symlink(root.join("real"), root.join("alias")).unwrap();

    let report = run_dedup(&DedupOptions::new(root.clone()).with_follow_symlinks(true)).unwrap();

    assert_eq!(report.scanned_files, 1);
    assert!(report.plan.is_empty());
    assert_eq!(fs::read_to_string(root.join("real/x.txt")).unwrap(), "A");
}

#[cfg(unix)]
#[test]
fn test_followed_link_into_quarantine_is_not_rescanned() {
    let dir = tempdir().unwrap();
    let root = root_of(&dir);
    write_file(&root, "Duplicates/a/x.txt", "A", 10);
    write_file(&root, "keep.txt", "A", 20);
    std::os::unix::fs::symlink(root.join("Duplicates"), root.join("qalias")).unwrap();

    let report = run_dedup(
        &DedupOptions::new(root.clone())
            .with_dry_run(true)
            .with_follow_symlinks(true),
    )
    .unwrap();

    assert_eq!(report.scanned_files, 1);
    assert!(report.plan.is_empty());
}

/// Skip permission tests when running with privileges that ignore file modes.
#[cfg(unix)]
fn modes_are_enforced(path: &Path) -> bool {
    fs::read(path).is_err()
}

#[cfg(unix)]
#[test]
fn test_unreadable_file_is_skipped_and_left_in_place() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let root = root_of(&dir);
    write_file(&root, "a.txt", "dup", 10);
    write_file(&root, "b.txt", "dup", 20);
    let locked = write_file(&root, "sub/c.txt", "dup", 5);
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
    if !modes_are_enforced(&locked) {
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();
        return;
    }

    let result = run_dedup(&DedupOptions::new(root.clone()));
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();
    let report = result.unwrap();

    assert_eq!(report.hash_failures.len(), 1);
    assert_eq!(report.hash_failures[0].path(), locked.as_path());
    assert_eq!(report.plan.len(), 1);
    assert!(report.plan.iter().all(|r| r.source != locked));
    assert!(locked.exists());
    assert!(root.join("b.txt").exists());
    assert!(root.join("Duplicates/a.txt").exists());
}
