use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};
use treesift::error::ConfigError;
use treesift::reconcile::{run_reconcile, ReconcileOptions};
use walkdir::WalkDir;

struct Layout {
    _dir: TempDir,
    base: PathBuf,
    current: PathBuf,
    older: PathBuf,
    dest: PathBuf,
    links: PathBuf,
}

impl Layout {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        let base = dir.path().canonicalize().unwrap();
        let current = base.join("current");
        let older = base.join("older");
        fs::create_dir_all(&current).unwrap();
        fs::create_dir_all(&older).unwrap();
        Self {
            current,
            older,
            dest: base.join("moved"),
            links: base.join("moved_links"),
            base,
            _dir: dir,
        }
    }

    fn options(&self) -> ReconcileOptions {
        ReconcileOptions::new(
            self.current.clone(),
            self.older.clone(),
            self.dest.clone(),
            self.links.clone(),
        )
    }
}

fn write(root: &Path, rel: &str, content: &str) -> PathBuf {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    path
}

/// Every entry under `root` (files, dirs, links) with file contents.
fn snapshot(root: &Path) -> BTreeMap<PathBuf, Option<String>> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .map(|e| {
            let content = if e.file_type().is_file() {
                Some(fs::read_to_string(e.path()).unwrap())
            } else {
                None
            };
            (e.path().to_path_buf(), content)
        })
        .collect()
}

#[test]
fn test_only_missing_content_moves() {
    let t = Layout::new();
    write(&t.current, "keep.txt", "A");
    write(&t.older, "x.txt", "A");
    write(&t.older, "sub/y.txt", "A");
    write(&t.older, "sub/z.txt", "B");

    let report = run_reconcile(&t.options().with_apply(true)).unwrap();

    assert_eq!(report.plan.regular.len(), 1);
    assert_eq!(report.plan.already_present, 2);
    assert_eq!(fs::read_to_string(t.dest.join("sub/z.txt")).unwrap(), "B");
    assert!(!t.older.join("sub/z.txt").exists());
    // Content already present in current is left where it is
    assert!(t.older.join("x.txt").exists());
    assert!(t.older.join("sub/y.txt").exists());
    // The current tree is never touched
    assert_eq!(fs::read_to_string(t.current.join("keep.txt")).unwrap(), "A");
}

#[test]
fn test_every_moved_file_is_absent_from_current() {
    let t = Layout::new();
    write(&t.current, "a.txt", "one");
    write(&t.current, "b.txt", "two");
    write(&t.older, "1.txt", "one");
    write(&t.older, "2.txt", "three");
    write(&t.older, "deep/3.txt", "four");
    write(&t.older, "deep/4.txt", "two");

    let report = run_reconcile(&t.options()).unwrap();

    let current_contents = ["one", "two"];
    for item in &report.plan.regular {
        let content = fs::read_to_string(&item.source).unwrap();
        assert!(!current_contents.contains(&content.as_str()));
    }
    assert_eq!(report.plan.regular.len(), 2);
    assert_eq!(report.plan.scanned_regular, 4);
}

#[test]
fn test_older_dirs_emptied_by_moves_are_removed() {
    let t = Layout::new();
    write(&t.older, "gone/deeper/only.txt", "unique");
    write(&t.older, "stays/copy.txt", "shared");
    write(&t.current, "copy.txt", "shared");

    let report = run_reconcile(&t.options().with_apply(true)).unwrap();

    assert!(!t.older.join("gone").exists());
    assert!(t.older.join("stays/copy.txt").exists());
    assert!(t.older.is_dir());
    assert_eq!(report.reclaimed.unwrap().removed_count(), 2);
    assert!(t.dest.join("gone/deeper/only.txt").exists());
}

#[test]
fn test_keep_empty_dirs_skips_reclamation() {
    let t = Layout::new();
    write(&t.older, "gone/only.txt", "unique");

    let report = run_reconcile(&t.options().with_apply(true).with_keep_empty_dirs(true)).unwrap();

    assert!(report.reclaimed.is_none());
    assert!(t.older.join("gone").is_dir());
}

#[test]
fn test_existing_destination_is_never_overwritten() {
    let t = Layout::new();
    write(&t.dest, "x.txt", "already here");
    write(&t.older, "x.txt", "incoming");

    let report = run_reconcile(&t.options().with_apply(true)).unwrap();

    assert!(report.relocation_files.unwrap().all_succeeded());
    assert_eq!(fs::read_to_string(t.dest.join("x.txt")).unwrap(), "already here");
    assert_eq!(fs::read_to_string(t.dest.join("x (1).txt")).unwrap(), "incoming");
}

#[test]
fn test_preview_changes_nothing() {
    let t = Layout::new();
    write(&t.current, "a.txt", "A");
    write(&t.older, "b.txt", "B");
    fs::create_dir_all(t.older.join("empty")).unwrap();

    let before_current = snapshot(&t.current);
    let before_older = snapshot(&t.older);

    let report = run_reconcile(&t.options()).unwrap();

    assert!(!report.applied);
    assert_eq!(report.plan.regular.len(), 1);
    assert!(report.relocation_files.is_none());
    assert_eq!(snapshot(&t.current), before_current);
    assert_eq!(snapshot(&t.older), before_older);
    assert!(!t.dest.exists());
    assert!(!t.links.exists());
}

#[test]
fn test_identical_roots_rejected() {
    let t = Layout::new();
    let options = ReconcileOptions::new(
        t.current.clone(),
        t.current.clone(),
        t.dest.clone(),
        t.links.clone(),
    );
    assert!(matches!(
        run_reconcile(&options),
        Err(ConfigError::IdenticalRoots(_))
    ));
}

#[test]
fn test_destination_inside_current_rejected() {
    let t = Layout::new();
    write(&t.older, "b.txt", "B");
    let options = ReconcileOptions::new(
        t.current.clone(),
        t.older.clone(),
        t.current.join("incoming"),
        t.links.clone(),
    )
    .with_apply(true);

    assert!(matches!(
        run_reconcile(&options),
        Err(ConfigError::DestinationInsideCurrent { .. })
    ));
    assert!(t.older.join("b.txt").exists());
    assert!(!t.current.join("incoming").exists());
}

#[test]
fn test_missing_older_rejected() {
    let t = Layout::new();
    let options = ReconcileOptions::new(
        t.current.clone(),
        t.base.join("nope"),
        t.dest.clone(),
        t.links.clone(),
    );
    assert!(matches!(
        run_reconcile(&options),
        Err(ConfigError::RootMissing { label: "older", .. })
    ));
}

#[test]
fn test_destination_inside_older_is_excluded_and_protected() {
    let t = Layout::new();
    write(&t.older, "a/unique.txt", "U");
    let dest = t.older.join("_moved");
    let links = t.older.join("_links");
    let options = ReconcileOptions::new(t.current.clone(), t.older.clone(), dest.clone(), links.clone())
        .with_apply(true);

    let report = run_reconcile(&options).unwrap();

    assert!(!report.roots.cautions.is_empty());
    assert_eq!(report.plan.regular.len(), 1);
    assert_eq!(fs::read_to_string(dest.join("a/unique.txt")).unwrap(), "U");
    // The symlink destination stays empty but is not reclaimed
    assert!(links.is_dir());
    assert!(!t.older.join("a").exists());

    // A second pass does not pick up what was just moved
    let again = run_reconcile(&options).unwrap();
    assert!(again.plan.is_empty());
}

#[cfg(unix)]
#[test]
fn test_every_symlink_moves_regardless_of_target() {
    use std::os::unix::fs::symlink;

    let t = Layout::new();
    let shared = write(&t.current, "shared.txt", "S");
    write(&t.older, "copy.txt", "S");
    symlink(&shared, t.older.join("to_current")).unwrap();
    fs::create_dir_all(t.older.join("sub")).unwrap();
    symlink(t.older.join("copy.txt"), t.older.join("sub/to_copy")).unwrap();
    symlink(t.base.join("missing"), t.older.join("dangling")).unwrap();

    let report = run_reconcile(&t.options().with_apply(true)).unwrap();

    assert_eq!(report.plan.symlinks.len(), 3);
    assert!(report.plan.regular.is_empty());
    let moved = report.relocation_symlinks.unwrap();
    assert_eq!(moved.success_count(), 3);

    for rel in ["to_current", "sub/to_copy", "dangling"] {
        let meta = fs::symlink_metadata(t.links.join(rel)).unwrap();
        assert!(meta.file_type().is_symlink(), "{rel} should still be a link");
        assert!(fs::symlink_metadata(t.older.join(rel)).is_err());
    }
    // Targets are untouched
    assert_eq!(fs::read_to_string(&shared).unwrap(), "S");
    assert_eq!(fs::read_to_string(t.older.join("copy.txt")).unwrap(), "S");
    assert_eq!(fs::read_link(t.links.join("to_current")).unwrap(), shared);
}

#[cfg(unix)]
#[test]
fn test_symlinks_in_current_do_not_count_as_content() {
    use std::os::unix::fs::symlink;

    let t = Layout::new();
    let outside = write(&t.base, "outside.txt", "O");
    symlink(&outside, t.current.join("link")).unwrap();
    write(&t.older, "o.txt", "O");

    let report = run_reconcile(&t.options()).unwrap();

    assert_eq!(report.indexed_files, 0);
    assert_eq!(report.plan.regular.len(), 1);
}

#[test]
fn test_shared_destination_for_files_and_links() {
    let t = Layout::new();
    write(&t.older, "x.txt", "X");
    let options = ReconcileOptions::new(
        t.current.clone(),
        t.older.clone(),
        t.dest.clone(),
        t.dest.clone(),
    )
    .with_apply(true);

    let report = run_reconcile(&options).unwrap();

    assert!(report.relocation_files.unwrap().all_succeeded());
    assert!(t.dest.join("x.txt").exists());
}

#[cfg(unix)]
#[test]
fn test_unreadable_older_file_stays_and_is_counted() {
    use std::os::unix::fs::PermissionsExt;

    let t = Layout::new();
    write(&t.current, "keep.txt", "A");
    let locked = write(&t.older, "locked.bin", "X");
    write(&t.older, "free.txt", "Y");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
    if fs::read(&locked).is_ok() {
        // Modes are not enforced for this user
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();
        return;
    }

    let result = run_reconcile(&t.options().with_apply(true));
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();
    let report = result.unwrap();

    assert_eq!(report.hash_failures.len(), 1);
    assert_eq!(report.hash_failures[0].path(), locked.as_path());
    assert_eq!(report.plan.regular.len(), 1);
    assert!(locked.exists());
    assert!(!t.dest.join("locked.bin").exists());
    assert_eq!(fs::read_to_string(t.dest.join("free.txt")).unwrap(), "Y");
}
