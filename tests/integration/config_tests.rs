use std::fs;
use tempfile::tempdir;
use treesift::config::Config;
use treesift::duplicates::{run_dedup, DedupOptions};
use treesift::scanner::HashAlgorithm;

#[test]
fn test_saved_config_round_trips_through_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested/config.json");

    let config = Config {
        hash_algorithm: HashAlgorithm::Blake3,
        quarantine_dir: "Dupes".to_string(),
        io_threads: 2,
        ..Config::default()
    };
    config.save_to(&path).unwrap();

    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded.hash_algorithm, HashAlgorithm::Blake3);
    assert_eq!(loaded.quarantine_dir, "Dupes");
    assert_eq!(loaded.io_threads, 2);
}

#[test]
fn test_partial_config_keeps_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, r#"{ "hash_algorithm": "sha3-256", "io_threads": 0 }"#).unwrap();

    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded.hash_algorithm, HashAlgorithm::Sha3_256);
    assert_eq!(loaded.io_threads, 1);
    assert_eq!(loaded.quarantine_dir, "Duplicates");
}

#[test]
fn test_malformed_config_is_an_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, "{ not json").unwrap();

    assert!(Config::load_from(&path).is_err());
}

#[test]
fn test_config_drives_a_dedup_run() {
    let dir = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    fs::write(root.join("a.txt"), "same").unwrap();
    fs::write(root.join("b.txt"), "same").unwrap();

    let config = Config {
        hash_algorithm: HashAlgorithm::Blake2b,
        quarantine_dir: "Extra".to_string(),
        ..Config::default()
    };
    let options = DedupOptions::new(root.clone())
        .with_quarantine_name(config.quarantine_dir.clone())
        .with_hasher(config.hasher(None))
        .with_io_threads(config.io_threads)
        .with_dry_run(true);

    let report = run_dedup(&options).unwrap();

    assert_eq!(report.quarantine, root.join("Extra"));
    assert_eq!(report.plan.len(), 1);
    assert!(report.plan[0].destination.starts_with(root.join("Extra")));
}
