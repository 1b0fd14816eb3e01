//! Integration tests for the `openmx` binary.
//!
//! Each test runs the built binary against a fresh simulated VM and checks
//! its JSON output or exit status.

use serde_json::Value;
use std::io::Write;
use std::process::{Command, Output};

fn openmx(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_openmx"))
        .args(args)
        .env("NO_COLOR", "1")
        .output()
        .expect("failed to run openmx")
}

fn json(args: &[&str]) -> Value {
    let output = openmx(args);
    assert!(
        output.status.success(),
        "openmx {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

fn names(listing: &Value) -> Vec<String> {
    listing
        .as_array()
        .expect("listing is an array")
        .iter()
        .filter_map(|row| row["name"].as_str().map(str::to_string))
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// list / info
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_list_all_beans() {
    let listing = names(&json(&["list", "--json"]));
    assert!(listing.contains(&"java.lang:type=Memory".to_string()));
    assert!(listing.contains(&"java.util.logging:type=Logging".to_string()));
    assert_eq!(listing.len(), 18);
}

#[test]
fn test_list_by_kind() {
    let listing = names(&json(&["list", "--kind", "gc", "--json"]));
    assert_eq!(
        listing,
        vec![
            "java.lang:name=Scavenge,type=GarbageCollector".to_string(),
            "java.lang:name=Global,type=GarbageCollector".to_string(),
        ]
    );

    let output = openmx(&["list", "--kind", "heap"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown bean kind"));
}

#[test]
fn test_info_describes_operations() {
    let info = json(&["info", "threading", "--json"]);
    assert_eq!(info["interface"], "java.lang.management.ThreadMXBean");
    let overloads: Vec<&Value> = info["operations"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|op| op["name"] == "getThreadInfo")
        .collect();
    assert_eq!(overloads.len(), 3);

    let memory = json(&["info", "java.lang:type=Memory", "--json"]);
    let types: Vec<&Value> = memory["notifications"]
        .as_array()
        .unwrap()
        .iter()
        .flat_map(|info| info["types"].as_array().unwrap().iter())
        .collect();
    assert!(types.iter().any(|t| *t == "gc-collection-completed"));
}

// ────────────────────────────────────────────────────────────────────────────
// get / set / invoke
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_get_composite_attribute() {
    let values = json(&["get", "memory", "HeapMemoryUsage", "--json"]);
    let usage = &values["HeapMemoryUsage"];
    assert!(usage["used"].as_i64().unwrap() >= 0);
    assert!(usage["committed"].as_i64().unwrap() >= usage["used"].as_i64().unwrap());
}

#[test]
fn test_get_unknown_attribute_fails() {
    let output = openmx(&["get", "memory", "Nope"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Nope"));
}

#[test]
fn test_set_attribute() {
    let values = json(&["set", "class-loading", "Verbose", "true", "--json"]);
    assert_eq!(values["Verbose"], Value::Bool(true));

    let output = openmx(&["set", "class-loading", "Verbose", "maybe"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("not a valid boolean"));
}

#[test]
fn test_invoke_overloads() {
    let single = json(&["invoke", "threading", "getThreadInfo", "1", "--json"]);
    assert_eq!(single["result"]["threadId"], 1);
    assert_eq!(single["result"]["threadName"], "main");

    let deep = json(&["invoke", "threading", "getThreadInfo", "1", "0", "--json"]);
    assert_eq!(deep["result"]["stackTrace"], Value::Array(Vec::new()));

    let level = json(&[
        "invoke",
        "logging",
        "getLoggerLevel",
        "global",
        "--json",
    ]);
    assert_eq!(level["result"], "");

    let output = openmx(&["invoke", "threading", "getThreadInfo", "zero"]);
    assert!(!output.status.success());
}

// ────────────────────────────────────────────────────────────────────────────
// config / watch
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[simulation]\njit = false").unwrap();
    let path = file.path().to_str().unwrap();

    let listing = json(&["--config", path, "list", "--kind", "compilation", "--json"]);
    assert_eq!(listing, Value::Array(Vec::new()));

    let mut bad = tempfile::NamedTempFile::new().unwrap();
    writeln!(bad, "[simulation]\nheap_max = 0").unwrap();
    let output = openmx(&["--config", bad.path().to_str().unwrap(), "list"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("heap_max"));
}

#[test]
fn test_watch_streams_notifications() {
    let output = openmx(&["watch", "--steps", "300", "--threshold", "1", "--json"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let lines: Vec<Value> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line is JSON"))
        .collect();

    let summary = lines.last().expect("summary line");
    assert!(summary["summary"]["gc-collection-completed"].as_u64().unwrap() > 0);

    let mut last_sequence = 0;
    for event in lines.iter().filter(|line| line["source"] == "java.lang:type=Memory") {
        let sequence = event["sequence"].as_u64().unwrap();
        assert!(sequence > last_sequence);
        last_sequence = sequence;
    }
    assert!(last_sequence > 0);
}
