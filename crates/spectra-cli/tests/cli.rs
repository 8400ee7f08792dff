use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn spectra() -> Command {
    Command::cargo_bin("spectra").unwrap()
}

/// Write a scenario's events and ground truth into `dir`.
fn write_scenario(dir: &TempDir, name: &str) -> (std::path::PathBuf, std::path::PathBuf) {
    let events = dir.path().join(format!("{name}.jsonl"));
    let truth = dir.path().join(format!("{name}.truth.jsonl"));
    spectra()
        .args(["scenario", name, "--out"])
        .arg(&events)
        .arg("--ground-truth")
        .arg(&truth)
        .assert()
        .success();
    (events, truth)
}

#[test]
fn test_scenario_listing() {
    spectra()
        .arg("scenario")
        .assert()
        .success()
        .stdout(predicate::str::contains("cascading_delegation"))
        .stdout(predicate::str::contains("tool_failure"));
}

#[test]
fn test_unknown_scenario_fails() {
    spectra()
        .args(["scenario", "no_such_thing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown scenario"));
}

#[test]
fn test_reconstruct_cascade() {
    let dir = TempDir::new().unwrap();
    let (events, _) = write_scenario(&dir, "cascading_delegation");

    spectra()
        .arg("reconstruct")
        .arg(&events)
        .assert()
        .success()
        .stdout(predicate::str::contains("9 events, 8 edges"))
        .stdout(predicate::str::contains(
            "delegation: 2, intra_agent_sequence: 4, inferred_by_proximity: 2",
        ));
}

#[test]
fn test_reconstruct_json_and_store() {
    let dir = TempDir::new().unwrap();
    let (events, _) = write_scenario(&dir, "simple_delegation");
    let store = dir.path().join("store");

    let output = spectra()
        .args(["--format", "json", "reconstruct"])
        .arg(&events)
        .arg("--store")
        .arg(&store)
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["summary"]["edges"], 4);
    assert_eq!(json["scopes"][0]["correlation_id"], "delegation_001");

    let stored = std::fs::read_to_string(store.join("edges.jsonl")).unwrap();
    assert_eq!(stored.lines().count(), 4);
}

#[test]
fn test_rerun_into_same_store_leaves_it_unchanged() {
    let dir = TempDir::new().unwrap();
    let (events, _) = write_scenario(&dir, "cascading_delegation");
    let store = dir.path().join("store");

    spectra()
        .arg("reconstruct")
        .arg(&events)
        .arg("--store")
        .arg(&store)
        .assert()
        .success();
    let stored_events = std::fs::read_to_string(store.join("events.jsonl")).unwrap();
    let stored_edges = std::fs::read_to_string(store.join("edges.jsonl")).unwrap();
    assert_eq!(stored_events.lines().count(), 9);
    assert_eq!(stored_edges.lines().count(), 8);

    spectra()
        .arg("reconstruct")
        .arg(&events)
        .arg("--store")
        .arg(&store)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to store trace"));
    assert_eq!(
        std::fs::read_to_string(store.join("events.jsonl")).unwrap(),
        stored_events
    );
    assert_eq!(
        std::fs::read_to_string(store.join("edges.jsonl")).unwrap(),
        stored_edges
    );
}

#[test]
fn test_threshold_flag_disables_proximity() {
    let dir = TempDir::new().unwrap();
    let (events, _) = write_scenario(&dir, "simple_delegation");

    spectra()
        .arg("reconstruct")
        .arg(&events)
        .args(["--threshold-us", "500"])
        .assert()
        .success()
        .stdout(predicate::str::contains("3 edges"));
}

#[test]
fn test_evaluate_scenario() {
    spectra()
        .args(["evaluate", "--scenario", "cascading_delegation", "--match-reasons"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Accuracy (recall):   100.00%"));
}

#[test]
fn test_evaluate_from_files() {
    let dir = TempDir::new().unwrap();
    let (events, truth) = write_scenario(&dir, "tool_failure");

    spectra()
        .arg("evaluate")
        .arg("--events")
        .arg(&events)
        .arg("--ground-truth")
        .arg(&truth)
        .assert()
        .success()
        .stdout(predicate::str::contains("(5/6 ground-truth edges)"));
}

#[test]
fn test_evaluate_rejects_ground_truth_outside_scope() {
    let dir = TempDir::new().unwrap();
    let (events, _) = write_scenario(&dir, "single_agent");
    let truth = dir.path().join("bad.truth.jsonl");
    std::fs::write(
        &truth,
        r#"{"from_event_id":"single-0000","to_event_id":"ghost","reason":"delegation"}"#,
    )
    .unwrap();

    spectra()
        .arg("evaluate")
        .arg("--events")
        .arg(&events)
        .arg("--ground-truth")
        .arg(&truth)
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not fit scope"));
}

#[test]
fn test_ablate_default_runs() {
    spectra()
        .args(["ablate", "--scenario", "cascading_delegation"])
        .assert()
        .success()
        .stdout(predicate::str::contains("without REASONING_STEP"))
        .stdout(predicate::str::contains("REASONING_STEP: essential"));
}

#[test]
fn test_ablate_rejects_unknown_type() {
    spectra()
        .args(["ablate", "--scenario", "single_agent", "--exclude", "NOT_A_TYPE"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown event type"));
}

#[test]
fn test_failures_report_trigger() {
    let dir = TempDir::new().unwrap();
    let (events, _) = write_scenario(&dir, "tool_failure");

    spectra()
        .arg("failures")
        .arg(&events)
        .assert()
        .success()
        .stdout(predicate::str::contains("trigger: failure-0003"))
        .stdout(predicate::str::contains("affected agents (1): agent_b"));
}

#[test]
fn test_failures_none_found() {
    let dir = TempDir::new().unwrap();
    let (events, _) = write_scenario(&dir, "single_agent");

    spectra()
        .arg("failures")
        .arg(&events)
        .assert()
        .success()
        .stdout(predicate::str::contains("no_failure_events_found"));
}

#[test]
fn test_graph_dot() {
    let dir = TempDir::new().unwrap();
    let (events, _) = write_scenario(&dir, "simple_delegation");

    spectra()
        .arg("graph")
        .arg(&events)
        .arg("--dot")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("digraph spectra {"))
        .stdout(predicate::str::contains("style=dashed"));
}

#[test]
fn test_graph_text_lists_roots() {
    let dir = TempDir::new().unwrap();
    let (events, _) = write_scenario(&dir, "single_agent");

    spectra()
        .arg("graph")
        .arg(&events)
        .assert()
        .success()
        .stdout(predicate::str::contains("Roots (1): single-0000"));
}

#[test]
fn test_graph_unknown_node() {
    let dir = TempDir::new().unwrap();
    let (events, _) = write_scenario(&dir, "single_agent");

    spectra()
        .arg("graph")
        .arg(&events)
        .args(["--node", "missing"])
        .assert()
        .failure();
}

#[test]
fn test_config_file_overrides_threshold() {
    let dir = TempDir::new().unwrap();
    let (events, _) = write_scenario(&dir, "cascading_delegation");
    let config = dir.path().join("spectra.json");
    std::fs::write(
        &config,
        r#"{"reconstruction": {"proximity_threshold_us": 100}}"#,
    )
    .unwrap();

    spectra()
        .arg("--config")
        .arg(&config)
        .arg("reconstruct")
        .arg(&events)
        .assert()
        .success()
        .stdout(predicate::str::contains("inferred_by_proximity: 0"));
}
