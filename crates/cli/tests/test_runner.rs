// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use rvsoc_core::asm;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn get_rvsoc_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_rvsoc"))
}

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("rvsoc-cli-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_hex(dir: &Path, name: &str, words: &[u32]) -> PathBuf {
    let text: String = words.iter().map(|w| format!("{:08x}\n", w)).collect();
    let path = dir.join(name);
    std::fs::write(&path, text).unwrap();
    path
}

fn run_script(dir: &Path, script: &str) -> (Output, Value) {
    let script_path = dir.join("script.yaml");
    std::fs::write(&script_path, script).unwrap();
    let output = Command::new(get_rvsoc_bin())
        .arg("test")
        .arg("--script")
        .arg(&script_path)
        .arg("--output-dir")
        .arg(dir)
        .output()
        .expect("Failed to run rvsoc");

    let result_path = dir.join("result.json");
    let content = std::fs::read_to_string(&result_path).unwrap_or_else(|_| {
        panic!(
            "no result.json. Exit: {:?}\nStderr: {}",
            output.status.code(),
            String::from_utf8_lossy(&output.stderr)
        )
    });
    let val: Value = serde_json::from_str(&content).unwrap();
    assert_eq!(val["result_schema_version"], "1.0");
    (output, val)
}

fn program() -> Vec<u32> {
    vec![
        asm::addi(7, 0, 0xCA),
        asm::slli(8, 7, 15),
        asm::lui(1, 0x20000),
        asm::sw(1, 8, 0),
        asm::jal(0, 0),
    ]
}

#[test]
fn test_checkpoints_pass() {
    let dir = temp_dir("pass");
    write_hex(&dir, "prog.hex", &program());
    let (output, val) = run_script(
        &dir,
        r#"
schema_version: "1.0"
inputs:
  image: "prog.hex"
limits:
  max_cycles: 1000
checkpoints:
  - after: 2
    expect:
      - register: 8
        value: 0x650000
  - after: 4
    expect:
      - ram_word: { address: 0x20000000, value: 0x650000 }
      - pc: 16
assertions:
  - expected_stop_reason: checkpoints_complete
"#,
    );
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(val["status"], "pass");
    assert_eq!(val["stop_reason"], "checkpoints_complete");
    assert_eq!(val["instructions"], 4);
    assert_eq!(val["image_hash"].as_str().unwrap().len(), 64);
    assert!(dir.join("snapshot.json").exists());
}

#[test]
fn test_failed_checkpoint_exit_code() {
    let dir = temp_dir("fail");
    write_hex(&dir, "prog.hex", &program());
    let (output, val) = run_script(
        &dir,
        r#"
schema_version: "1.0"
inputs:
  image: "prog.hex"
limits:
  max_cycles: 1000
checkpoints:
  - after: 1
    expect:
      - register: 7
        value: 0xCB
"#,
    );
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(val["status"], "fail");
    assert_eq!(val["checkpoints"][0]["expectations"][0]["actual"], 0xCA);
}

#[test]
fn test_halt_stop_reason() {
    let dir = temp_dir("halt");
    write_hex(&dir, "prog.hex", &program());
    let (output, val) = run_script(
        &dir,
        r#"
schema_version: "1.0"
inputs:
  image: "prog.hex"
limits:
  max_cycles: 1000
assertions:
  - expected_stop_reason: halt
"#,
    );
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(val["stop_reason"], "halt");
    assert_eq!(val["instructions"], 5);
}

#[test]
fn test_config_error() {
    let dir = temp_dir("config");
    let (output, val) = run_script(
        &dir,
        r#"
schema_version: "9.9"
inputs:
  image: "prog.hex"
limits:
  max_cycles: 1000
"#,
    );
    assert_eq!(output.status.code(), Some(2));
    assert_eq!(val["status"], "error");
    assert_eq!(val["stop_reason"], "config_error");

    let dir = temp_dir("missing-image");
    let (output, val) = run_script(
        &dir,
        r#"
schema_version: "1.0"
inputs:
  image: "absent.hex"
limits:
  max_cycles: 1000
"#,
    );
    assert_eq!(output.status.code(), Some(2));
    assert!(val["message"].as_str().unwrap().contains("absent.hex"));
}

#[test]
fn test_spi_system_and_snapshot() {
    let dir = temp_dir("spi");
    let image = write_hex(&dir, "prog.hex", &program());
    let system = dir.join("soc.yaml");
    std::fs::write(&system, "name: spi-board\nboot:\n  kind: spi_flash\npwm_count: 1\n").unwrap();
    let snapshot = dir.join("out/snap.json");

    let output = Command::new(get_rvsoc_bin())
        .arg("run")
        .arg("--image")
        .arg(&image)
        .arg("--system")
        .arg(&system)
        .arg("--max-cycles")
        .arg("2000")
        .arg("--snapshot")
        .arg(&snapshot)
        .output()
        .expect("Failed to run rvsoc");
    assert_eq!(output.status.code(), Some(0));

    let val: Value = serde_json::from_str(&std::fs::read_to_string(&snapshot).unwrap()).unwrap();
    assert_eq!(val["cycles"], 2000);
    assert_eq!(val["cpu"]["registers"][8], 0x650000);
    assert!(val["peripherals"]["pwm0"].is_object());
    assert!(val["peripherals"]["pwm1"].is_null());
}
