// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace-level binary specs for the engine launcher.

use assert_cmd::Command;

fn machina() -> Command {
    Command::cargo_bin("machina").expect("machina binary builds")
}

#[test]
fn help_exits_cleanly() {
    machina().arg("--help").assert().success();
}

#[test]
fn version_exits_cleanly() {
    machina().arg("--version").assert().success();
}

#[test]
fn missing_machine_name_is_a_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let descriptor = dir.path().join("worker.yaml");
    std::fs::write(
        &descriptor,
        "name: w\ninitial_state: a\nstates: [a]\nevents: []\ntransitions: []\n",
    )
    .unwrap();

    machina().arg(descriptor).assert().failure();
}

#[test]
fn invalid_descriptor_exits_with_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let descriptor = dir.path().join("broken.yaml");
    std::fs::write(
        &descriptor,
        "name: w\ninitial_state: ghost\nstates: [a]\nevents: []\ntransitions: []\n",
    )
    .unwrap();

    machina()
        .arg(&descriptor)
        .arg("--machine-name")
        .arg("spec-test")
        .arg("--database")
        .arg(dir.path().join("machina.db"))
        .arg("--event-socket-path")
        .arg(dir.path().join("events.sock"))
        .arg("--control-socket-prefix")
        .arg(dir.path().join("ctrl"))
        .assert()
        .code(1);
}

#[test]
fn missing_descriptor_file_exits_with_config_error() {
    let dir = tempfile::tempdir().unwrap();
    machina()
        .arg(dir.path().join("absent.yaml"))
        .arg("--machine-name")
        .arg("spec-test")
        .arg("--database")
        .arg(dir.path().join("machina.db"))
        .assert()
        .code(1);
}
