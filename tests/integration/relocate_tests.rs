use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;
use treesift::actions::{relocate_batch, DestinationAllocator, Relocation, RelocationKind};

fn file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_same_desired_destination_gets_numbered_variants() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("out");
    let mut allocator = DestinationAllocator::new();

    let plan: Vec<Relocation> = ["a", "b", "c"]
        .iter()
        .map(|sub| {
            let source = file(dir.path(), &format!("{sub}/x.txt"), sub);
            let destination = allocator.allocate(&out.join("x.txt"));
            Relocation::new(source, destination, RelocationKind::File, 1)
        })
        .collect();

    let result = relocate_batch(&plan, None);

    assert!(result.all_succeeded());
    assert_eq!(fs::read_to_string(out.join("x.txt")).unwrap(), "a");
    assert_eq!(fs::read_to_string(out.join("x (1).txt")).unwrap(), "b");
    assert_eq!(fs::read_to_string(out.join("x (2).txt")).unwrap(), "c");
}

#[test]
fn test_destination_taken_after_planning_is_revalidated() {
    let dir = tempdir().unwrap();
    let source = file(dir.path(), "src/report.pdf", "new");
    let out = dir.path().join("out");

    let mut allocator = DestinationAllocator::new();
    let planned = allocator.allocate(&out.join("report.pdf"));
    assert_eq!(planned, out.join("report.pdf"));

    // Something else lands on the planned destination before execution
    file(&out, "report.pdf", "squatter");

    let plan = vec![Relocation::new(source.clone(), planned, RelocationKind::File, 3)];
    let result = relocate_batch(&plan, None);

    assert!(result.all_succeeded());
    assert_eq!(result.successes[0].destination, out.join("report (1).pdf"));
    assert_eq!(fs::read_to_string(out.join("report.pdf")).unwrap(), "squatter");
    assert_eq!(fs::read_to_string(out.join("report (1).pdf")).unwrap(), "new");
    assert!(!source.exists());
}

#[test]
fn test_source_vanished_before_execution() {
    let dir = tempdir().unwrap();
    let gone = file(dir.path(), "gone.txt", "x");
    let present = file(dir.path(), "present.txt", "y");
    fs::remove_file(&gone).unwrap();

    let plan = vec![
        Relocation::new(gone, dir.path().join("out/gone.txt"), RelocationKind::File, 1),
        Relocation::new(
            present,
            dir.path().join("out/present.txt"),
            RelocationKind::File,
            1,
        ),
    ];
    let result = relocate_batch(&plan, None);

    assert_eq!(result.success_count(), 1);
    assert_eq!(result.failure_count(), 1);
    assert!(dir.path().join("out/present.txt").exists());
}

#[test]
fn test_file_metadata_is_preserved() {
    use filetime::{set_file_mtime, FileTime};

    let dir = tempdir().unwrap();
    let source = file(dir.path(), "old.txt", "x");
    set_file_mtime(&source, FileTime::from_unix_time(1_000_000, 0)).unwrap();
    let destination = dir.path().join("moved/old.txt");

    let result = relocate_batch(
        &[Relocation::new(source, destination.clone(), RelocationKind::File, 1)],
        None,
    );

    assert!(result.all_succeeded());
    let meta = fs::metadata(&destination).unwrap();
    assert_eq!(FileTime::from_last_modification_time(&meta).unix_seconds(), 1_000_000);
}

#[cfg(unix)]
#[test]
fn test_dangling_link_at_destination_is_not_replaced() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("out");
    fs::create_dir_all(&out).unwrap();
    std::os::unix::fs::symlink(dir.path().join("nowhere"), out.join("x.txt")).unwrap();

    let mut allocator = DestinationAllocator::new();
    let destination = allocator.allocate(&out.join("x.txt"));
    assert_eq!(destination, out.join("x (1).txt"));

    let source = file(dir.path(), "x.txt", "data");
    let result = relocate_batch(
        &[Relocation::new(source, destination, RelocationKind::File, 4)],
        None,
    );

    assert!(result.all_succeeded());
    assert!(fs::symlink_metadata(out.join("x.txt"))
        .unwrap()
        .file_type()
        .is_symlink());
}
