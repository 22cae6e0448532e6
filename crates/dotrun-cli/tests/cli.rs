//! End-to-end tests for the dotrun binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn dotrun() -> Command {
    Command::cargo_bin("dotrun").unwrap()
}

#[test]
fn test_help_lists_commands() {
    dotrun()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("versions"))
        .stdout(predicate::str::contains("compile"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("kill"));
}

#[test]
fn test_kill_without_match() {
    dotrun()
        .args(["kill", "/nowhere/dotrun-cli-no-such-app"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No matching processes."));
}

#[test]
fn test_missing_dotnet_shows_hint() {
    let temp = TempDir::new().unwrap();
    dotrun()
        .arg("versions")
        .arg("--dotnet")
        .arg(temp.path().join("dotnet"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("toolchain not found"))
        .stderr(predicate::str::contains("hint:"));
}

#[test]
fn test_invalid_package_reference() {
    dotrun()
        .args(["compile", "Program.cs", "--package", "Newtonsoft.Json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected Id@Version"));
}

#[test]
fn test_missing_source_file() {
    let temp = TempDir::new().unwrap();
    dotrun()
        .arg("compile")
        .arg(temp.path().join("Missing.cs"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read"));
}
