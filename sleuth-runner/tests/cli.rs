use std::hash::Hasher;
use std::path::{Path, PathBuf};
use std::process::Command;
use twox_hash::XxHash64;

fn temp_path(label: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "sleuth-cli-{label}-{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    ))
}

fn content_hash(path: &Path) -> u64 {
    let bytes = std::fs::read(path).expect("read file");
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(&bytes);
    hasher.finish()
}

/// The single file named `name` somewhere below `base`.
fn find_file(base: &Path, name: &str) -> PathBuf {
    let mut pending = vec![base.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir).expect("read dir") {
            let path = entry.expect("dir entry").path();
            if path.is_dir() {
                pending.push(path);
            } else if path.file_name().is_some_and(|f| f == name) {
                return path;
            }
        }
    }
    panic!("{name} not found under {}", base.display());
}

fn small_sweep_scenario(label: &str) -> PathBuf {
    let path = temp_path(label).with_extension("json");
    let json = r#"{
        "coefficients": {
            "diffusion": { "start": 10, "stop": 60, "step": 50 },
            "breed": { "start": 40, "stop": 40, "step": 0 },
            "spread": { "start": 30, "stop": 30, "step": 0 },
            "slope_resistance": { "start": 20, "stop": 20, "step": 0 },
            "road_gravity": { "start": 50, "stop": 50, "step": 0 }
        },
        "monte_carlo_iterations": 2,
        "random_seed": 11
    }"#;
    std::fs::write(&path, json).expect("write scenario");
    path
}

#[test]
fn cli_test_mode_writes_check_report() {
    let exe = env!("CARGO_BIN_EXE_sleuth-runner");
    let output_path = temp_path("checks");
    let status = Command::new(exe)
        .args(["--mode", "test", "--seeds", "1,2", "--report", "json", "--output"])
        .arg(&output_path)
        .status()
        .expect("run cli");
    assert!(status.success());
    let content = std::fs::read_to_string(output_path).expect("read output");
    let results: serde_json::Value = serde_json::from_str(&content).expect("parse report");
    let results = results.as_array().expect("array report");
    assert_eq!(results.len(), 5);
    assert!(results.iter().all(|r| r["passed"] == true));
}

#[test]
fn cli_calibrates_scenario_file_to_json() {
    let exe = env!("CARGO_BIN_EXE_sleuth-runner");
    let scenario = small_sweep_scenario("scenario");
    let output_path = temp_path("calibrate");
    let output = Command::new(exe)
        .args(["--mode", "calibrate", "--jobs", "2", "--report", "json", "--scenario"])
        .arg(&scenario)
        .arg("--output")
        .arg(&output_path)
        .output()
        .expect("run cli");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("SLEUTH Growth Runner"));

    let content = std::fs::read_to_string(output_path).expect("read output");
    let report: serde_json::Value = serde_json::from_str(&content).expect("parse report");
    assert_eq!(report["rank_by"], "product");
    let points = report["points"].as_array().expect("points");
    assert_eq!(points.len(), 2);
    let first = points[0]["score"]["product"].as_f64().expect("product");
    let second = points[1]["score"]["product"].as_f64().expect("product");
    assert!(first >= second);
    assert!(report["failures"].as_array().expect("failures").is_empty());
}

#[test]
fn cli_same_seed_reproduces_records_and_report() {
    let exe = env!("CARGO_BIN_EXE_sleuth-runner");
    let scenario = small_sweep_scenario("repro");
    let run = |label: &str| {
        let records = temp_path(&format!("{label}-records"));
        let report = temp_path(&format!("{label}-report"));
        let status = Command::new(exe)
            .args(["--seed", "7", "--report", "json", "--scenario"])
            .arg(&scenario)
            .arg("--records")
            .arg(&records)
            .arg("--output")
            .arg(&report)
            .status()
            .expect("run cli");
        assert!(status.success());
        (find_file(&records, "records.jsonl"), report)
    };

    let (records_a, report_a) = run("a");
    let (records_b, report_b) = run("b");
    assert!(records_a.to_string_lossy().contains("seed-7"));
    assert_eq!(content_hash(&records_a), content_hash(&records_b));
    assert_eq!(content_hash(&report_a), content_hash(&report_b));

    // two points, two iterations, 1990..=2000
    let lines = std::fs::read_to_string(records_a).expect("read records");
    assert_eq!(lines.lines().count(), 44);
}

#[test]
fn cli_predicts_to_requested_year() {
    let exe = env!("CARGO_BIN_EXE_sleuth-runner");
    let records = temp_path("predict-records");
    let output_path = temp_path("predict");
    let status = Command::new(exe)
        .args([
            "--mode",
            "predict",
            "--until",
            "2003",
            "--iterations",
            "3",
            "--report",
            "csv",
            "--records",
        ])
        .arg(&records)
        .arg("--output")
        .arg(&output_path)
        .status()
        .expect("run cli");
    assert!(status.success());

    let content = std::fs::read_to_string(output_path).expect("read output");
    let years: Vec<&str> = content
        .lines()
        .skip(1)
        .filter_map(|line| line.split(',').next())
        .collect();
    assert_eq!(years, vec!["2001", "2002", "2003"]);

    let probability = std::fs::read_to_string(find_file(&records, "probability.json"))
        .expect("read probability");
    let grid: serde_json::Value = serde_json::from_str(&probability).expect("parse grid");
    assert_eq!(grid["rows"], 32);
    assert_eq!(grid["cols"], 32);
}

#[test]
fn cli_prediction_without_stop_year_fails() {
    let exe = env!("CARGO_BIN_EXE_sleuth-runner");
    let output = Command::new(exe)
        .args(["--mode", "predict"])
        .output()
        .expect("run cli");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("stop year"));
}

#[test]
fn cli_rejects_unknown_report_format() {
    let exe = env!("CARGO_BIN_EXE_sleuth-runner");
    let output = Command::new(exe)
        .args(["--report", "yaml"])
        .output()
        .expect("run cli");
    assert!(!output.status.success());
}
