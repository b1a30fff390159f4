//! CLI compile integration tests
//!
//! These tests run the `sdforge` binary against a tank and a definition
//! directory written to a scratch directory.

use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn patient_definition() -> Value {
    let element = |path: &str, min: u32, max: &str, code: Option<&str>| {
        let mut el = json!({ "id": path, "path": path, "min": min, "max": max });
        if let Some(code) = code {
            el["type"] = json!([{ "code": code }]);
        }
        el
    };
    json!({
        "resourceType": "StructureDefinition",
        "id": "Patient",
        "name": "Patient",
        "url": "http://hl7.org/fhir/StructureDefinition/Patient",
        "status": "active",
        "kind": "resource",
        "abstract": false,
        "type": "Patient",
        "derivation": "specialization",
        "snapshot": {
            "element": [
                element("Patient", 0, "*", None),
                element("Patient.id", 0, "1", Some("string")),
                element("Patient.active", 0, "1", Some("boolean")),
                element("Patient.name", 0, "*", Some("HumanName")),
            ]
        }
    })
}

fn setup_workspace(temp_dir: &TempDir, tank: Value) -> (PathBuf, PathBuf) {
    let defs = temp_dir.path().join("defs");
    fs::create_dir_all(&defs).unwrap();
    fs::write(
        defs.join("Patient.json"),
        serde_json::to_string_pretty(&patient_definition()).unwrap(),
    )
    .unwrap();

    let tank_path = temp_dir.path().join("tank.json");
    fs::write(&tank_path, serde_json::to_string_pretty(&tank).unwrap()).unwrap();
    (tank_path, defs)
}

fn run_compile(temp_dir: &TempDir, tank: &Path, defs: &Path, extra: &[&str]) -> Output {
    let cli_bin = env!("CARGO_BIN_EXE_sdforge");
    Command::new(cli_bin)
        .current_dir(temp_dir.path())
        .env("RUST_LOG", "off")
        .args([
            "compile",
            "--tank",
            tank.to_str().unwrap(),
            "--defs",
            defs.to_str().unwrap(),
        ])
        .args(extra)
        .output()
        .expect("Failed to execute CLI")
}

#[test]
fn test_cli_compile_prints_summary() {
    let temp_dir = TempDir::new().unwrap();
    let tank = json!({
        "entities": [{
            "kind": "profile",
            "name": "AcmePatient",
            "parent": "Patient",
            "rules": [{ "path": "name", "rule": "cardinality", "min": 1 }]
        }]
    });
    let (tank_path, defs) = setup_workspace(&temp_dir, tank);
    let config_path = temp_dir.path().join("sdforge.toml");
    fs::write(&config_path, "canonical = \"http://acme.org/fhir\"\n").unwrap();

    let output = run_compile(
        &temp_dir,
        &tank_path,
        &defs,
        &["--config", config_path.to_str().unwrap()],
    );

    assert!(
        output.status.success(),
        "CLI command should succeed. Stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Compiled 1 definition(s)"), "{}", stdout);
    assert!(stdout.contains("profiles: 1"), "{}", stdout);
    assert!(
        stdout.contains("http://acme.org/fhir/StructureDefinition/AcmePatient"),
        "{}",
        stdout
    );
}

#[test]
fn test_cli_compile_fails_on_error_diagnostics() {
    let temp_dir = TempDir::new().unwrap();
    let tank = json!({
        "entities": [{ "kind": "profile", "name": "Orphan", "parent": "NoSuchParent" }]
    });
    let (tank_path, defs) = setup_workspace(&temp_dir, tank);

    let output = run_compile(&temp_dir, &tank_path, &defs, &[]);

    assert!(!output.status.success(), "CLI command should fail");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("ERR_STRUCTURAL_DECLARATION"), "{}", stdout);
    assert!(stdout.contains("Compiled 0 definition(s)"), "{}", stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("1 error(s)"), "{}", stderr);
}

#[test]
fn test_cli_compile_rejects_invalid_config() {
    let temp_dir = TempDir::new().unwrap();
    let (tank_path, defs) = setup_workspace(&temp_dir, json!({ "entities": [] }));
    let config_path = temp_dir.path().join("sdforge.toml");
    fs::write(&config_path, "canonical = \"\"\n").unwrap();

    let output = run_compile(
        &temp_dir,
        &tank_path,
        &defs,
        &["--config", config_path.to_str().unwrap()],
    );

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("canonical cannot be empty"), "{}", stderr);
}

#[test]
fn test_cli_compile_reports_missing_tank() {
    let temp_dir = TempDir::new().unwrap();
    let (_, defs) = setup_workspace(&temp_dir, json!({}));
    let missing = temp_dir.path().join("missing.json");

    let output = run_compile(&temp_dir, &missing, &defs, &[]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.starts_with("Error:"), "{}", stderr);
}
