use std::process::Command;

fn temp_path(label: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!(
        "escaperoom-cli-{label}-{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    ))
}

fn exe() -> &'static str {
    env!("CARGO_BIN_EXE_escaperoom-tester")
}

#[test]
fn cli_list_scenarios_writes_output() {
    let output_path = temp_path("list");
    let status = Command::new(exe())
        .args(["--list-scenarios", "--output"])
        .arg(&output_path)
        .status()
        .expect("run cli");
    assert!(status.success());
    let content = std::fs::read_to_string(output_path).expect("read output");
    assert!(content.contains("Available scenarios"));
}

#[test]
fn cli_runs_every_scenario_as_json() {
    let output_path = temp_path("all");
    let status = Command::new(exe())
        .args(["--scenarios", "all", "--report", "json", "--output"])
        .arg(&output_path)
        .status()
        .expect("run cli");
    assert!(status.success());
    let content = std::fs::read_to_string(output_path).expect("read output");
    let report: serde_json::Value = serde_json::from_str(&content).expect("json report");
    let scenarios = report["scenarios"].as_array().expect("scenario list");
    assert_eq!(scenarios.len(), 6);
    assert!(scenarios.iter().all(|s| s["passed"] == true));
}

#[test]
fn cli_replays_a_script() {
    let script = temp_path("script");
    std::fs::write(
        &script,
        "{\"step\":\"open\"}\n{\"step\":\"delta\",\"value\":{\"puzzle_id\":9,\"status\":\"good\"}}\n{\"step\":\"delta\",\"value\":{\"puzzle_id\":9,\"puzzle_solved\":true}}\n{\"step\":\"advance_ms\",\"ms\":500}\n",
    )
    .expect("write script");
    let output_path = temp_path("replay");
    let status = Command::new(exe())
        .args(["--puzzle", "9", "--report", "json", "--script"])
        .arg(&script)
        .arg("--output")
        .arg(&output_path)
        .status()
        .expect("run cli");
    assert!(status.success());
    let content = std::fs::read_to_string(output_path).expect("read output");
    assert!(content.contains("puzzleSuperat/9"));
}

#[test]
fn cli_rejects_an_unknown_puzzle() {
    let script = temp_path("bad-puzzle");
    std::fs::write(&script, "{\"step\":\"open\"}\n").expect("write script");
    let output = Command::new(exe())
        .args(["--puzzle", "42", "--script"])
        .arg(&script)
        .output()
        .expect("run cli");
    assert!(!output.status.success());
}
