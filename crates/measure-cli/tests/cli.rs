use assert_cmd::prelude::*;
use std::path::{Path, PathBuf};
use std::process::Command;

fn measure() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("measure"));
    cmd.env_remove("RUST_LOG");
    cmd
}

fn write_input(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("write input");
    path
}

fn stdout_of(assert: &assert_cmd::assert::Assert) -> String {
    String::from_utf8_lossy(&assert.get_output().stdout).into_owned()
}

fn stderr_of(assert: &assert_cmd::assert::Assert) -> String {
    String::from_utf8_lossy(&assert.get_output().stderr).into_owned()
}

#[test]
fn aggregate_prints_sorted_summaries() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "m.txt", "B;20.0\nA;10.0\nA;30.0\n");

    let assert = measure()
        .arg("aggregate")
        .arg(&input)
        .args(["--chunk-rows", "2"])
        .assert()
        .success();
    assert_eq!(stdout_of(&assert), "A: 10.0/20.0/30.0\nB: 20.0/20.0/20.0\n");
}

#[test]
fn aggregate_json_report() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "m.txt", "A;10.0\nB;20.0\nA;30.0\n");

    let assert = measure()
        .args(["aggregate", "--json"])
        .arg(&input)
        .assert()
        .success();
    let report: serde_json::Value = serde_json::from_str(&stdout_of(&assert)).unwrap();
    assert_eq!(report["rows"], 3);
    assert_eq!(report["keys"][0]["key"], "A");
    assert_eq!(report["keys"][0]["mean"], 20.0);
    assert_eq!(report["keys"][1]["count"], 1);
}

#[test]
fn malformed_input_names_kind_and_line() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "bad.txt", "A;1.0\nA;x\n");

    let assert = measure().arg("aggregate").arg(&input).assert().code(3);
    let stderr = stderr_of(&assert);
    assert!(stderr.contains("malformed-record"), "stderr:\n{stderr}");
    assert!(stderr.contains("line 2"), "stderr:\n{stderr}");
    assert!(stdout_of(&assert).is_empty());
}

#[test]
fn missing_input_is_invalid() {
    let dir = tempfile::tempdir().unwrap();

    let assert = measure()
        .arg("aggregate")
        .arg(dir.path().join("missing.txt"))
        .assert()
        .code(2);
    let stderr = stderr_of(&assert);
    assert!(stderr.contains("invalid-input"), "stderr:\n{stderr}");
}

#[test]
fn unknown_encoding_is_invalid() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "m.txt", "A;1\n");

    measure()
        .arg("aggregate")
        .arg(&input)
        .args(["--encoding", "utf-16le"])
        .assert()
        .code(2);
}

#[test]
fn plan_reports_the_profiled_type() {
    let dir = tempfile::tempdir().unwrap();
    let contents: String = (0..=200).map(|v| format!("k{};{v}\n", v % 3)).collect();
    let input = write_input(dir.path(), "ints.txt", &contents);

    let assert = measure().arg("plan").arg(&input).assert().success();
    let stdout = stdout_of(&assert);
    assert!(stdout.contains("measure type: uint8"), "stdout:\n{stdout}");
    assert!(stdout.contains("rows: 201\n"), "stdout:\n{stdout}");

    let assert = measure()
        .args(["plan", "--json", "--chunk-rows", "100"])
        .arg(&input)
        .assert()
        .success();
    let plan: serde_json::Value = serde_json::from_str(&stdout_of(&assert)).unwrap();
    assert_eq!(plan["measure_type"], "uint8");
    assert_eq!(plan["chunk_rows"], 100);
    assert!(plan["estimate"].is_null());
    assert_eq!(plan["profile"]["chunk_types"].as_array().unwrap().len(), 3);
}

#[test]
fn convert_then_inspect_and_aggregate_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "m.txt", "A;10.0\nB;20.0\nA;30.0\nC;-1.5\nB;0.5\n");
    let output = dir.path().join("m.parquet");

    let assert = measure()
        .arg("convert")
        .arg(&input)
        .arg("--output")
        .arg(&output)
        .args(["--chunk-rows", "2"])
        .assert()
        .success();
    assert!(stdout_of(&assert).starts_with("wrote 5 rows in 3 blocks"));

    let assert = measure()
        .args(["inspect", "--json"])
        .arg(&output)
        .assert()
        .success();
    let inspect: serde_json::Value = serde_json::from_str(&stdout_of(&assert)).unwrap();
    assert_eq!(inspect["rows"], 5);
    assert_eq!(inspect["block_rows"], serde_json::json!([2, 2, 1]));
    assert_eq!(inspect["columns"][1]["column_type"], "float32");

    let from_text = measure().arg("aggregate").arg(&input).assert().success();
    let from_artifact = measure()
        .arg("aggregate-artifact")
        .arg(&output)
        .assert()
        .success();
    assert_eq!(stdout_of(&from_artifact), stdout_of(&from_text));
}

#[test]
fn atomic_convert_leaves_nothing_behind_on_failure() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "bad.txt", "A;1.0\nB;oops\n");
    let output = dir.path().join("bad.parquet");

    measure()
        .arg("convert")
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .arg("--atomic")
        .assert()
        .code(3);
    assert!(!output.exists());

    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .filter(|name| name.to_string_lossy().starts_with(".measure-"))
        .collect();
    assert!(leftovers.is_empty(), "{leftovers:?}");
}

#[test]
fn atomic_convert_writes_the_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "m.txt", "A;1\nB;2\n");
    let output = dir.path().join("m.parquet");

    let assert = measure()
        .arg("convert")
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .args(["--atomic", "--json"])
        .assert()
        .success();
    let summary: serde_json::Value = serde_json::from_str(&stdout_of(&assert)).unwrap();
    assert_eq!(summary["rows"], 2);
    assert_eq!(summary["path"], output.to_string_lossy().as_ref());

    measure().arg("inspect").arg(&output).assert().success();
}

#[test]
fn inspecting_a_non_artifact_fails_with_resource_error() {
    let dir = tempfile::tempdir().unwrap();
    let bogus = write_input(dir.path(), "not.parquet", "A;1\n");

    let assert = measure().arg("inspect").arg(&bogus).assert().code(5);
    assert!(stderr_of(&assert).contains("resource"));
}

#[test]
fn header_and_delimiter_flags() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "h.csv", "city,temp\nOslo,1\nOslo,3\n");

    let assert = measure()
        .arg("aggregate")
        .arg(&input)
        .args(["--delimiter", ",", "--header"])
        .assert()
        .success();
    assert_eq!(stdout_of(&assert), "Oslo: 1.0/2.0/3.0\n");
}
