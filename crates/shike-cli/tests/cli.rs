use assert_cmd::Command;
use predicates::prelude::*;

fn shike() -> Command {
    Command::cargo_bin("shike").unwrap()
}

fn json_output(args: &[&str]) -> serde_json::Value {
    let output = shike().args(args).output().unwrap();
    assert!(output.status.success(), "shike {args:?} failed");
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn test_point_as_json() {
    let value = json_output(&["2015年8月12日", "--base", "2021-06-14 10:00:00"]);
    assert_eq!(value["kind"], "point");
    assert_eq!(value["precision"], "accurate");
    assert_eq!(
        value["value"],
        serde_json::json!(["2015-08-12 00:00:00", "2015-08-12 23:59:59"])
    );
}

#[test]
fn test_json_field_base() {
    let value = json_output(&["3年后", "--base", r#"{"year": 2021}"#]);
    assert_eq!(value["kind"], "span");
    assert_eq!(value["precision"], "blur");
    assert_eq!(value["value"][0], "2024-01-01 00:00:00");
}

#[test]
fn test_epoch_base_and_output() {
    let value = json_output(&["明天", "--base", "1623628800", "--epoch"]);
    assert_eq!(value["value"], serde_json::json!([1_623_686_400, 1_623_772_799]));
}

#[test]
fn test_delta_hint() {
    let value = json_output(&["18日", "--hint", "delta"]);
    assert_eq!(value["kind"], "delta");
    assert_eq!(value["value"], serde_json::json!({ "day": 18.0 }));
}

#[test]
fn test_period_count() {
    let value = json_output(&["每年9月", "--base", "[2021, 6, 14]", "--count", "2"]);
    assert_eq!(value["kind"], "period");
    assert_eq!(value["value"]["delta"], serde_json::json!({ "year": 1.0 }));
    assert_eq!(value["value"]["point"]["string"], "9月");
    assert_eq!(
        value["value"]["point"]["occurrences"]
            .as_array()
            .unwrap()
            .len(),
        2
    );
}

#[test]
fn test_open_span_renders_infinity() {
    let value = json_output(&["2020年以前", "--base", "2021-06-14 10:00:00"]);
    assert_eq!(value["value"][0], "-inf");
}

#[test]
fn test_unrecognised_text_fails() {
    shike()
        .args(["你好", "--base", "2021-06-14 10:00:00"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid expression"));
}

#[test]
fn test_bad_base_fails() {
    shike()
        .args(["明天", "--base", "true"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid time base"));
}

#[test]
fn test_unknown_hint_is_rejected() {
    shike()
        .args(["明天", "--hint", "instant"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown expression kind"));
}

#[test]
fn test_unknown_timezone_is_rejected() {
    shike()
        .args(["明天", "--tz", "Mars/Olympus"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown timezone"));
}
