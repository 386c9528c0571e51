use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

fn fixture() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures/five_sales.csv")
}

/// Project reading the fixture dataset from disk
fn local_project(mode: &str) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("autosales.yaml"),
        format!(
            "name: cli-test\ndataset:\n  source: local\n  local_path: {}\ndatabase:\n  mode: {mode}\n",
            fixture().display()
        ),
    )
    .unwrap();
    dir
}

fn config_arg(dir: &TempDir) -> &str {
    dir.path().to_str().unwrap()
}

#[test]
fn test_init_and_validate() {
    let dir = tempfile::tempdir().unwrap();

    cargo_bin_cmd!("autosales")
        .args(["init", config_arg(&dir), "--name", "dealer-sales"])
        .assert()
        .success();

    assert!(dir.path().join("autosales.yaml").exists());
    assert!(dir.path().join(".gitignore").exists());

    cargo_bin_cmd!("autosales")
        .args(["--config", config_arg(&dir), "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid: dealer-sales"));

    // A second init must not overwrite the project
    cargo_bin_cmd!("autosales")
        .args(["init", config_arg(&dir)])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already contains"));
}

#[test]
fn test_validate_missing_config() {
    let dir = tempfile::tempdir().unwrap();

    cargo_bin_cmd!("autosales")
        .args(["--config", config_arg(&dir), "validate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
}

#[test]
fn test_validate_rejects_local_source_without_path() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("autosales.yaml"),
        "name: broken\ndataset:\n  source: local\n",
    )
    .unwrap();

    cargo_bin_cmd!("autosales")
        .args(["--config", config_arg(&dir), "validate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("local_path"));
}

#[test]
fn test_run_dry_run_end_to_end() {
    let dir = local_project("embedded");

    cargo_bin_cmd!("autosales")
        .args(["--config", config_arg(&dir), "run", "--yes", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("rows read: 6, staged: 5, rejected: 1"))
        .stdout(predicate::str::contains("date_dim: 2 rows"))
        .stdout(predicate::str::contains("state_dim: 3 rows"))
        .stdout(predicate::str::contains("seller_dim: 2 rows"))
        .stdout(predicate::str::contains("vehicle_dim: 4 rows"))
        .stdout(predicate::str::contains("sales_fact: 5 rows"))
        .stdout(predicate::str::contains("Dry run complete"));

    // Dry runs never start the embedded server
    assert!(!dir.path().join(".autosales/pg").exists());
    assert!(dir.path().join(".autosales/staging/sales_fact.csv").exists());
}

#[test]
fn test_stage_commands_in_sequence() {
    let dir = local_project("embedded");

    cargo_bin_cmd!("autosales")
        .args(["--config", config_arg(&dir), "extract"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Extracted"));

    cargo_bin_cmd!("autosales")
        .args(["--config", config_arg(&dir), "extract"])
        .assert()
        .success()
        .stdout(predicate::str::contains("already present"));

    cargo_bin_cmd!("autosales")
        .args(["--config", config_arg(&dir), "transform"])
        .assert()
        .success()
        .stdout(predicate::str::contains("rejected (unknown state): 1"));

    cargo_bin_cmd!("autosales")
        .args(["--config", config_arg(&dir), "load", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("sales_fact: 5 rows"));
}

#[test]
fn test_transform_requires_extract() {
    let dir = local_project("embedded");

    cargo_bin_cmd!("autosales")
        .args(["--config", config_arg(&dir), "transform"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("autosales extract"));
}

#[test]
fn test_load_requires_transform() {
    let dir = local_project("embedded");

    cargo_bin_cmd!("autosales")
        .args(["--config", config_arg(&dir), "load", "--dry-run"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("autosales transform"));
}

#[test]
fn test_external_mode_requires_password() {
    let dir = local_project("external");

    cargo_bin_cmd!("autosales")
        .args(["--config", config_arg(&dir), "extract"])
        .assert()
        .success();
    cargo_bin_cmd!("autosales")
        .args(["--config", config_arg(&dir), "transform"])
        .assert()
        .success();

    cargo_bin_cmd!("autosales")
        .env_remove("AUTOSALES_DB_PASSWORD")
        .args(["--config", config_arg(&dir), "load"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("database password is required"));
}

#[test]
fn test_password_from_env_is_never_echoed() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("autosales.yaml"),
        "name: cli-test\ndatabase:\n  mode: external\n  host: warehouse.invalid\n  port: 1\n",
    )
    .unwrap();

    let output = cargo_bin_cmd!("autosales")
        .env("AUTOSALES_DB_PASSWORD", "s3cret-from-env")
        .args(["--verbose", "--config", config_arg(&dir), "verify"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to connect to postgres://autosales@warehouse.invalid:1/"));
    assert!(!stdout.contains("s3cret-from-env"));
    assert!(!stderr.contains("s3cret-from-env"));
}
