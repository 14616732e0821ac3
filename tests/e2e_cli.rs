use std::path::PathBuf;

use assert_cmd::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

fn demo(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("demos")
        .join(name)
}

#[test]
fn test_help_shows_usage() {
    cargo_bin_cmd!("fnsynth")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Synthesize Rhai functions"));
}

#[test]
fn test_version_shows_version() {
    cargo_bin_cmd!("fnsynth")
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("fnsynth"));
}

#[test]
fn test_prompt_prints_seed_conversation() {
    cargo_bin_cmd!("fnsynth")
        .arg("prompt")
        .arg(demo("statistics.toml"))
        .arg("variance")
        .assert()
        .success()
        .stdout(predicate::str::contains("--- system ---"))
        .stdout(predicate::str::contains(
            "/// Returns the population variance of an array of floats.",
        ))
        .stdout(predicate::str::contains("    // sum the squared deviations"))
        .stdout(predicate::str::contains(
            "fn mean(ls: array<float>) -> float {\n    ...\n}",
        ));
}

#[test]
fn test_prompt_unknown_function_fails() {
    cargo_bin_cmd!("fnsynth")
        .arg("prompt")
        .arg(demo("statistics.toml"))
        .arg("median")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no function named \"median\""));
}

#[test]
fn test_unknown_provider_fails_gracefully() {
    cargo_bin_cmd!("fnsynth")
        .args(["--provider", "nonexistent", "run"])
        .arg(demo("hello_world.toml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown provider"));
}

#[test]
fn test_run_without_api_key_fails_gracefully() {
    let tmp_dir = TempDir::new().expect("create temp dir");
    cargo_bin_cmd!("fnsynth")
        .env_remove("ANTHROPIC_API_KEY")
        .env_remove("OPENAI_API_KEY")
        .env_remove("FNSYNTH_PROVIDER")
        .arg("--cache-dir")
        .arg(tmp_dir.path())
        .args(["--provider", "openai", "run"])
        .arg(demo("hello_world.toml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("OPENAI_API_KEY"));
}

#[test]
fn test_malformed_declaration_fails_before_any_request() {
    let tmp_dir = TempDir::new().expect("create temp dir");
    let path = tmp_dir.path().join("broken.toml");
    std::fs::write(
        &path,
        "[[function]]\nname = \"broken\"\nsynthesis = \"not a table\"\n",
    )
    .expect("write declarations");

    cargo_bin_cmd!("fnsynth")
        .env("OPENAI_API_KEY", "unused")
        .arg("--cache-dir")
        .arg(tmp_dir.path())
        .args(["--provider", "openai", "run"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("malformed synthesis request for \"broken\""));
}

#[test]
fn test_unmatched_pattern_fails() {
    let tmp_dir = TempDir::new().expect("create temp dir");
    let pattern = tmp_dir.path().join("*.toml");
    cargo_bin_cmd!("fnsynth")
        .arg("run")
        .arg(&pattern)
        .assert()
        .failure()
        .stderr(predicate::str::contains("no declaration files match"));
}

#[test]
fn test_history_with_no_records() {
    let tmp_dir = TempDir::new().expect("create temp dir");
    cargo_bin_cmd!("fnsynth")
        .arg("--cache-dir")
        .arg(tmp_dir.path())
        .arg("history")
        .assert()
        .success()
        .stdout(predicate::str::contains("No syntheses recorded."));
}

#[test]
fn test_history_rejects_unknown_status() {
    cargo_bin_cmd!("fnsynth")
        .args(["history", "--status", "done"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid synthesis status"));
}
