//! jsonl_to_json CLI integration tests.

use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};

fn jsonl_to_json() -> Command {
    cargo_bin_cmd!("jsonl_to_json")
}

fn read_json(path: &std::path::Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn test_merges_match_records() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("matches.jsonl");
    let output = dir.path().join("matches.json");
    fs::write(
        &input,
        concat!(
            r#"{"game_config":{"game":"kuhn_poker"},"agents_config":[],"models_config":[],"token_size":10,"winner":0}"#,
            "\n",
            r#"{"game_config":{"game":"kuhn_poker"},"agents_config":[],"models_config":[],"winner":1}"#,
            "\n"
        ),
    )
    .unwrap();

    jsonl_to_json()
        .arg(&input)
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("Successfully converted"));

    let doc = read_json(&output);
    assert_eq!(doc["game_config"], json!({"game": "kuhn_poker"}));
    assert_eq!(doc["matches"].as_array().unwrap().len(), 2);
    assert_eq!(doc["matches"][1]["winner"], json!(1));
    assert_eq!(doc["token_size"], json!(10));
}

#[test]
fn test_defaults_to_input_jsonl_and_output_json() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("input.jsonl"), "{\"only\": \"één\"}\n").unwrap();

    jsonl_to_json()
        .current_dir(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("input.jsonl").and(predicate::str::contains("output.json")));

    let text = fs::read_to_string(dir.path().join("output.json")).unwrap();
    assert_eq!(text, "{\n  \"only\": \"één\"\n}");
}

#[test]
fn test_missing_config_fails_with_message() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.jsonl");
    let output = dir.path().join("out.json");
    fs::write(&input, "{\"agents_config\":1,\"models_config\":2}\n{}\n").unwrap();

    jsonl_to_json()
        .arg(&input)
        .arg(&output)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Error converting file"))
        .stderr(predicate::str::contains("game_config"));

    assert!(!output.exists());
}

#[test]
fn test_missing_input_fails() {
    let dir = tempfile::tempdir().unwrap();

    jsonl_to_json()
        .arg(dir.path().join("nope.jsonl"))
        .arg(dir.path().join("out.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot read"));
}

#[test]
fn test_log_dir_receives_a_log_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.jsonl");
    let logs = dir.path().join("logs");
    fs::write(&input, "{}\n").unwrap();

    jsonl_to_json()
        .arg(&input)
        .arg(dir.path().join("out.json"))
        .arg("--log-dir")
        .arg(&logs)
        .assert()
        .success();

    let entries: Vec<_> = fs::read_dir(&logs).unwrap().collect();
    assert_eq!(entries.len(), 1);
}
