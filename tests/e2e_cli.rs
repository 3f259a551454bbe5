mod support;

use std::fs;

use tempfile::tempdir;

use support::{describe, run_cipstress};

const BUILTIN_SCENARIOS: [&str; 15] = [
    "baseline",
    "churn",
    "dpi_explicit",
    "edge",
    "evasion_anomaly",
    "evasion_fuzz",
    "evasion_segment",
    "evasion_timing",
    "firewall_dynics",
    "firewall_hirschmann",
    "firewall_moxa",
    "io",
    "mixed",
    "tunnel_connected",
    "tunnel_ucmm",
];

#[test]
fn e2e_list_prints_every_builtin() -> Result<(), String> {
    let dir = tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
    let output = run_cipstress(dir.path(), ["list"])?;
    if !output.status.success() {
        return Err(describe(&output));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let names: Vec<&str> = stdout
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .collect();
    if names != BUILTIN_SCENARIOS {
        return Err(format!("Unexpected scenario list: {:?}", names));
    }
    Ok(())
}

#[test]
fn e2e_unknown_scenario_fails() -> Result<(), String> {
    let dir = tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
    let output = run_cipstress(dir.path(), ["run", "--scenario", "stampede", "-d", "1s"])?;
    if output.status.success() {
        return Err(format!("Expected failure\n{}", describe(&output)));
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.contains("stampede") {
        return Err(format!("Error does not name the scenario\n{}", describe(&output)));
    }
    Ok(())
}

#[test]
fn e2e_baseline_writes_artifacts() -> Result<(), String> {
    let dir = tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
    let output = run_cipstress(
        dir.path(),
        [
            "run",
            "--scenario",
            "baseline",
            "--duration",
            "1s",
            "--interval",
            "100ms",
            "--emulate-latency-ms",
            "1",
            "--emulate-seed",
            "42",
            "--metrics-csv",
            "metrics.csv",
            "--metrics-json",
            "metrics.json",
            "--distribution-csv",
            "distribution.csv",
            "--summary",
        ],
    )?;
    if !output.status.success() {
        return Err(describe(&output));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.contains("Run Summary") {
        return Err(format!("Summary missing\n{}", describe(&output)));
    }
    let csv = fs::read_to_string(dir.path().join("metrics.csv"))
        .map_err(|err| format!("read metrics.csv failed: {}", err))?;
    let rows = csv.lines().skip(1).count();
    if rows == 0 || !csv.lines().skip(1).all(|line| line.contains(",baseline,")) {
        return Err(format!("Unexpected metrics csv:\n{}", csv));
    }
    let json = fs::read_to_string(dir.path().join("metrics.json"))
        .map_err(|err| format!("read metrics.json failed: {}", err))?;
    let records: serde_json::Value =
        serde_json::from_str(&json).map_err(|err| format!("metrics.json invalid: {}", err))?;
    if records.as_array().map(Vec::len) != Some(rows) {
        return Err("CSV and JSON streams disagree".to_owned());
    }
    if !dir.path().join("distribution.csv").exists() {
        return Err("distribution.csv missing".to_owned());
    }
    Ok(())
}
