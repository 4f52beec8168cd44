// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn args_parse_with_defaults() {
    let cli = Cli::try_parse_from([
        "machina",
        "worker.yaml",
        "--machine-name",
        "worker-1",
    ])
    .unwrap();
    assert_eq!(cli.descriptor, PathBuf::from("worker.yaml"));
    assert_eq!(cli.machine_name, "worker-1");
    assert_eq!(cli.initial_context, None);
    assert_eq!(cli.actions_dir, None);
}

#[test]
fn machine_name_is_required() {
    let result = Cli::try_parse_from(["machina", "worker.yaml"]);
    assert!(result.is_err());
}

#[test]
fn all_flags_parse() {
    let cli = Cli::try_parse_from([
        "machina",
        "controller.yaml",
        "--machine-name",
        "ctl",
        "--initial-context",
        r#"{"job_id": "j1"}"#,
        "--event-socket-path",
        "/tmp/ev.sock",
        "--control-socket-prefix",
        "/tmp/ctrl",
        "--actions-dir",
        "./actions",
        "--database",
        "/tmp/m.db",
    ])
    .unwrap();
    assert_eq!(cli.event_socket_path, PathBuf::from("/tmp/ev.sock"));
    assert_eq!(cli.control_socket_prefix, PathBuf::from("/tmp/ctrl"));
    assert_eq!(cli.actions_dir, Some(PathBuf::from("./actions")));
    assert_eq!(cli.database, PathBuf::from("/tmp/m.db"));
}

#[test]
fn initial_context_parses_objects() {
    let ctx = parse_initial_context(Some(r#"{"job_id": "jX", "n": 3}"#));
    assert_eq!(ctx.get("job_id"), Some(&json!("jX")));
    assert_eq!(ctx.get("n"), Some(&json!(3)));
}

#[test]
fn malformed_initial_context_falls_back_to_empty() {
    assert!(parse_initial_context(Some("{not json")).is_empty());
    assert!(parse_initial_context(Some(r#"["list"]"#)).is_empty());
    assert!(parse_initial_context(None).is_empty());
}
