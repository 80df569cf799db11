//! Smoke tests for argument parsing and help output. These exercise the
//! compiled binary directly (via `assert_cmd`) rather than internal types,
//! since `main.rs` keeps its `Cli`/`Commands` types private to the binary
//! crate.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_lists_every_subcommand() {
    let mut cmd = Command::cargo_bin("gitchat").unwrap();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("projects"))
        .stdout(predicate::str::contains("index"))
        .stdout(predicate::str::contains("sync"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("stop"))
        .stdout(predicate::str::contains("clear-index"))
        .stdout(predicate::str::contains("search"))
        .stdout(predicate::str::contains("ask"));
}

#[test]
fn index_requires_a_project_id() {
    let mut cmd = Command::cargo_bin("gitchat").unwrap();
    cmd.arg("index");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

#[test]
fn sync_rejects_both_project_id_and_all() {
    let mut cmd = Command::cargo_bin("gitchat").unwrap();
    cmd.args(["sync", "42", "--all"]);
    cmd.assert().failure();
}

#[test]
fn ask_requires_a_project_flag() {
    let mut cmd = Command::cargo_bin("gitchat").unwrap();
    cmd.args(["ask", "where is the retry logic"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("--project"));
}

#[test]
fn projects_subcommand_requires_an_action() {
    let mut cmd = Command::cargo_bin("gitchat").unwrap();
    cmd.arg("projects");
    cmd.assert().failure();
}
