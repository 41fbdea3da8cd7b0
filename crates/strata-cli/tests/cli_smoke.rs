use assert_cmd::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

fn repo_root() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .and_then(|p| p.parent())
        .expect("expected crates/<name> layout")
        .to_path_buf()
}

fn fixture(name: &str) -> PathBuf {
    let path = repo_root().join("fixtures").join(name);
    assert!(path.exists(), "fixture missing: {}", path.display());
    path
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

#[test]
fn cli_arranges_a_snapshot() {
    let exe = assert_cmd::cargo_bin!("strata-cli");
    let output = Command::new(exe)
        .args(["arrange", fixture("shader.json").to_string_lossy().as_ref()])
        .assert()
        .success()
        .get_output()
        .clone();

    let arrangement = stdout_json(&output);
    let positions = arrangement["positions"].as_object().expect("positions");
    for id in ["Texture Coordinate", "Noise Texture", "Color Ramp", "Principled BSDF", "Material Output"] {
        assert!(positions.contains_key(id), "{id} not positioned");
    }
    let x = |id: &str| positions[id]["x"].as_f64().expect("x");
    assert!(x("Texture Coordinate") < x("Noise Texture"));
    assert!(x("Principled BSDF") < x("Material Output"));
    assert!(arrangement["frames"]["Frame"].is_object());
}

#[test]
fn cli_applies_arrangement_and_writes_to_file() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let out = tmp.path().join("arranged.json");

    let exe = assert_cmd::cargo_bin!("strata-cli");
    Command::new(exe)
        .args([
            "arrange",
            "--apply",
            "--pretty",
            "--direction",
            "top-left",
            "--iterations",
            "3",
            "--out",
            out.to_string_lossy().as_ref(),
            fixture("shader.json").to_string_lossy().as_ref(),
        ])
        .assert()
        .success();

    let text = fs::read_to_string(&out).expect("read output");
    let snapshot = strata::GraphSnapshot::from_json(&text).expect("snapshot");
    assert!(snapshot.element("Material Output").is_some());
    let before = strata::GraphSnapshot::from_json(
        &fs::read_to_string(fixture("shader.json")).expect("read fixture"),
    )
    .expect("snapshot");
    assert!(snapshot.elements.len() >= before.elements.len());
}

#[test]
fn cli_reads_config_file_and_stdin() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let config = tmp.path().join("config.json");
    fs::write(&config, r#"{"add_reroutes": false, "margin": {"x": 80.0, "y": 40.0}}"#)
        .expect("write config");

    let exe = assert_cmd::cargo_bin!("strata-cli");
    let output = assert_cmd::Command::new(exe)
        .args(["arrange", "--config", config.to_string_lossy().as_ref(), "-"])
        .write_stdin(fs::read(fixture("shader.json")).expect("read fixture"))
        .assert()
        .success()
        .get_output()
        .clone();

    let arrangement = stdout_json(&output);
    assert!(
        arrangement["added_reroutes"]
            .as_array()
            .is_none_or(|a| a.is_empty())
    );
}

#[test]
fn cli_recenters_on_the_active_node() {
    let exe = assert_cmd::cargo_bin!("strata-cli");
    let output = Command::new(exe)
        .args([
            "recenter",
            "--origin",
            "active-node",
            fixture("shader.json").to_string_lossy().as_ref(),
        ])
        .assert()
        .success()
        .get_output()
        .clone();

    let arrangement = stdout_json(&output);
    let bsdf = &arrangement["positions"]["Principled BSDF"];
    assert_eq!(bsdf["x"].as_f64(), Some(0.0));
    assert_eq!(bsdf["y"].as_f64(), Some(0.0));
}

#[test]
fn cli_batch_reports_failing_graphs() {
    let exe = assert_cmd::cargo_bin!("strata-cli");
    let output = Command::new(exe)
        .args(["batch", fixture("project.json").to_string_lossy().as_ref()])
        .assert()
        .failure()
        .code(1)
        .get_output()
        .clone();

    let graphs = stdout_json(&output);
    let graphs = graphs.as_array().expect("graphs");
    assert_eq!(graphs.len(), 2);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Broken"), "{stderr}");
    assert!(!stderr.contains("Material:"), "{stderr}");
}

#[test]
fn cli_rejects_unknown_flags_with_usage() {
    let exe = assert_cmd::cargo_bin!("strata-cli");
    Command::new(exe)
        .args(["arrange", "--direction", "sideways"])
        .assert()
        .failure()
        .code(2);

    let exe = assert_cmd::cargo_bin!("strata-cli");
    Command::new(exe).args(["--bogus"]).assert().failure().code(2);
}
