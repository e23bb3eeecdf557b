//! Integration tests for the previsbine binary.
// The cargo_bin function is marked deprecated in favor of cargo_bin! macro,
// but both work correctly. Suppressing until assert_cmd stabilizes the new API.
#![allow(deprecated)]

use assert_cmd::cargo::cargo_bin;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// A command isolated from the user's own config and environment.
fn previsbine(home: &Path) -> Command {
    let mut cmd = Command::new(cargo_bin("previsbine"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env_remove("PREVISBINE_FALLOUT4")
        .env_remove("PREVISBINE_XEDIT")
        .env_remove("RUST_LOG");
    cmd
}

fn game_dir() -> TempDir {
    let temp = TempDir::new().unwrap();
    let data = temp.path().join("Data");
    fs::create_dir_all(&data).unwrap();
    fs::write(data.join("MyMod.esp"), "plugin").unwrap();
    temp
}

#[test]
fn cli_shows_help() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    previsbine(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("previs"))
        .stdout(predicate::str::contains("resume"));
    Ok(())
}

#[test]
fn cli_shows_version() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    previsbine(temp.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
    Ok(())
}

#[test]
fn cli_steps_lists_clean_sequence() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    previsbine(temp.path())
        .current_dir(temp.path())
        .arg("steps")
        .assert()
        .success()
        .stdout(predicate::str::contains("8 steps"))
        .stdout(predicate::str::contains("Compress PSG"))
        .stdout(predicate::str::contains("Final Packaging"));
    Ok(())
}

#[test]
fn cli_steps_json_for_filtered_mode() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    let output = previsbine(temp.path())
        .current_dir(temp.path())
        .args(["steps", "--mode", "filtered", "--json"])
        .output()?;

    assert!(output.status.success());
    let steps: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    let slugs: Vec<&str> = steps
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["step"].as_str().unwrap())
        .collect();
    assert_eq!(
        slugs,
        vec![
            "generate-precombined",
            "merge-combined-objects",
            "archive-meshes",
            "generate-previs",
            "merge-previs",
            "final-packaging",
        ]
    );
    Ok(())
}

#[test]
fn cli_steps_reads_project_config() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    fs::write(temp.path().join("previsbine.yml"), "build_mode: xbox\n")?;
    previsbine(temp.path())
        .args(["--working-dir", temp.path().to_str().unwrap(), "steps"])
        .assert()
        .success()
        .stdout(predicate::str::contains("xbox build: 6 steps"));
    Ok(())
}

#[test]
fn cli_status_without_report() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    previsbine(temp.path())
        .current_dir(temp.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("No build report"));
    Ok(())
}

#[test]
fn cli_status_json_without_report_is_null() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    previsbine(temp.path())
        .current_dir(temp.path())
        .args(["status", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::diff("null\n"));
    Ok(())
}

#[test]
fn cli_status_reads_report() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    let logs = temp.path().join("logs");
    fs::create_dir_all(&logs)?;
    fs::write(
        logs.join("last-run.yml"),
        r#"
plugin: MyMod.esp
mode: filtered
working_directory: /work
current_step: generate-previs
history:
  - step: generate-precombined
    status: succeeded
    detail: 120 meshes
    timestamp: 2026-01-01T10:00:00Z
phase:
  phase: halted
  step: generate-previs
  kind: timeout
  detail: timed out after 2h
"#,
    )?;

    previsbine(temp.path())
        .current_dir(temp.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("MyMod.esp (filtered build)"))
        .stdout(predicate::str::contains(
            "previsbine run MyMod.esp --resume-from generate-previs",
        ));
    Ok(())
}

#[test]
fn cli_completions_bash() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    previsbine(temp.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("previsbine"));
    Ok(())
}

#[test]
fn cli_run_without_game_path_exits_2() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    previsbine(temp.path())
        .current_dir(temp.path())
        .args(["run", "MyMod.esp", "--non-interactive", "--yes"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Fallout 4 path"));
    Ok(())
}

#[test]
fn cli_run_rejects_base_game_master() -> Result<(), Box<dyn std::error::Error>> {
    let game = game_dir();
    let work = TempDir::new()?;
    previsbine(work.path())
        .current_dir(work.path())
        .args(["run", "DLCCoast.esm", "--non-interactive"])
        .arg("--fallout4-path")
        .arg(game.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("DLCCoast.esm"));
    Ok(())
}

#[test]
fn cli_run_reports_missing_creation_kit() -> Result<(), Box<dyn std::error::Error>> {
    let game = game_dir();
    let work = TempDir::new()?;
    let xedit = game.path().join("FO4Edit.exe");
    fs::write(&xedit, "")?;
    previsbine(work.path())
        .current_dir(work.path())
        .args(["run", "MyMod.esp", "--mode", "clean", "--non-interactive", "--yes"])
        .arg("--fallout4-path")
        .arg(game.path())
        .arg("--xedit-path")
        .arg(&xedit)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Creation Kit not found"));
    Ok(())
}

#[test]
fn cli_run_rejects_unknown_mode() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    previsbine(temp.path())
        .args(["run", "--mode", "fast"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown build mode"));
    Ok(())
}

#[test]
fn cli_clean_requires_plugin() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    previsbine(temp.path()).arg("clean").assert().failure();
    Ok(())
}

#[test]
fn cli_clean_removes_outputs() -> Result<(), Box<dyn std::error::Error>> {
    let game = game_dir();
    let work = TempDir::new()?;
    let data = game.path().join("Data");
    fs::write(data.join("MyMod - Geometry.ba2"), "ba2")?;
    fs::write(data.join("MyMod.cdx"), "cdx")?;

    previsbine(work.path())
        .current_dir(work.path())
        .args(["clean", "MyMod.esp", "--yes"])
        .env("PREVISBINE_FALLOUT4", game.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 2 build outputs"));

    assert!(!data.join("MyMod - Geometry.ba2").exists());
    assert!(!data.join("MyMod.cdx").exists());
    assert!(data.join("MyMod.esp").exists());
    Ok(())
}
