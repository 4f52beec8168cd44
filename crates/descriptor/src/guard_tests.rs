// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use machina_core::Context;
use serde_json::json;
use yare::parameterized;

fn ctx() -> Context {
    Context::from_value(json!({
        "mode": "fast",
        "count": 3,
        "flag": false,
        "empty": "",
        "job": {"status": "pending"},
    }))
}

#[test]
fn parses_comparison_forms() {
    assert_eq!(
        Guard::parse("mode == fast").unwrap(),
        Guard::Eq {
            path: "mode".to_string(),
            value: json!("fast")
        }
    );
    assert_eq!(
        Guard::parse("count != 0").unwrap(),
        Guard::Ne {
            path: "count".to_string(),
            value: json!(0)
        }
    );
    assert_eq!(
        Guard::parse("flag").unwrap(),
        Guard::Truthy("flag".to_string())
    );
}

#[test]
fn rejects_malformed_guards() {
    assert!(Guard::parse("").is_err());
    assert!(Guard::parse("a b == c").is_err());
    assert!(Guard::parse("== x").is_err());
}

#[parameterized(
    eq_string = { "mode == fast", true },
    eq_string_miss = { "mode == slow", false },
    eq_quoted = { "mode == \"fast\"", true },
    eq_number = { "count == 3", true },
    eq_nested = { "job.status == pending", true },
    ne_hit = { "count != 0", true },
    ne_miss = { "count != 3", false },
    truthy_number = { "count", true },
    falsy_bool = { "flag", false },
    falsy_empty_string = { "empty", false },
    missing_is_falsy = { "absent", false },
)]
fn eval_cases(guard: &str, expected: bool) {
    assert_eq!(Guard::parse(guard).unwrap().eval(&ctx()), expected);
}

#[test]
fn missing_path_never_equals() {
    let guard = Guard::parse("absent == x").unwrap();
    assert!(!guard.eval(&ctx()));
    // but != against a missing path is vacuously true
    let guard = Guard::parse("absent != x").unwrap();
    assert!(guard.eval(&ctx()));
}

#[test]
fn serde_roundtrip_preserves_meaning() {
    let guard = Guard::parse("job.status == pending").unwrap();
    let text = serde_json::to_string(&guard).unwrap();
    let back: Guard = serde_json::from_str(&text).unwrap();
    assert_eq!(back, guard);
}
