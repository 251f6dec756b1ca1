// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use rvsoc_config::{BootConfig, SocConfig, StopReason, TestAssertion, TestScript};
use std::path::PathBuf;

fn write_temp_file(name: &str, contents: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("rvsoc-config-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_soc_config_from_file() {
    let path = write_temp_file(
        "board.yaml",
        r#"
name: "icebreaker"
ram_size: "16KiB"
boot:
  kind: spi_flash
  offset: 0x200000
  end: 0x201000
pwm_count: 8
strict_decode: false
strict_csr: true
"#,
    );
    let config = SocConfig::from_file(&path).unwrap();
    assert_eq!(config.name, "icebreaker");
    assert_eq!(config.ram_words().unwrap(), 4096);
    assert_eq!(
        config.boot,
        BootConfig::SpiFlash {
            offset: 0x20_0000,
            end: 0x20_1000
        }
    );
    assert_eq!(config.pwm_count, 8);
    assert!(!config.strict_decode);
    assert!(config.strict_csr);
}

#[test]
fn test_unknown_boot_kind_rejected() {
    let path = write_temp_file("bad-boot.yaml", "boot:\n  kind: nor_flash\n");
    let err = SocConfig::from_file(&path).unwrap_err();
    assert!(format!("{:#}", err).contains("parse"));
}

#[test]
fn test_missing_file() {
    let err = SocConfig::from_file("/nonexistent/soc.yaml").unwrap_err();
    assert!(err.to_string().contains("Failed to open"));
    assert!(TestScript::from_file("/nonexistent/t.yaml").is_err());
}

#[test]
fn test_script_from_file() {
    let path = write_temp_file(
        "script.yaml",
        r#"
schema_version: "1.0"
inputs:
  image: "prog.hex"
  ram_image: "data.hex"
limits:
  max_cycles: 5000
  max_instructions: 100
checkpoints:
  - after: 4
    expect:
      - pc: 0x44
assertions:
  - expected_stop_reason: max_instructions
"#,
    );
    let script = TestScript::from_file(&path).unwrap();
    assert_eq!(script.inputs.ram_image.as_deref(), Some("data.hex"));
    assert_eq!(script.limits.max_instructions, Some(100));
    assert_eq!(script.limits.stall_cycles, None);
    let TestAssertion::ExpectedStopReason(a) = &script.assertions[0];
    assert_eq!(a.expected_stop_reason, StopReason::MaxInstructions);
}

#[test]
fn test_script_unknown_field_rejected() {
    let path = write_temp_file(
        "typo.yaml",
        r#"
schema_version: "1.0"
inputs:
  image: "prog.hex"
limits:
  max_cycle: 5000
"#,
    );
    assert!(TestScript::from_file(&path).is_err());
}
