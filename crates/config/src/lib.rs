// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const SCHEMA_VERSION: &str = "1.0";

/// Default program offset inside SPI flash, past a typical FPGA bitstream.
pub const DEFAULT_SPI_OFFSET: u32 = 2 * 1024 * 1024;
pub const DEFAULT_SPI_WINDOW: u32 = 1024;
/// 24-bit flash addressing.
pub const SPI_ADDRESS_SPACE: u32 = 16 * 1024 * 1024;
/// Size of the RAM window in the address map.
pub const RAM_WINDOW: u64 = 512 * 1024 * 1024;
pub const MAX_PWM_CHANNELS: usize = 256;

fn default_ram_size() -> String {
    "4KiB".to_string()
}

fn default_pwm_count() -> usize {
    3
}

fn default_true() -> bool {
    true
}

fn default_spi_offset() -> u32 {
    DEFAULT_SPI_OFFSET
}

fn default_spi_end() -> u32 {
    DEFAULT_SPI_OFFSET + DEFAULT_SPI_WINDOW
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BootConfig {
    Rom,
    SpiFlash {
        #[serde(default = "default_spi_offset")]
        offset: u32,
        #[serde(default = "default_spi_end")]
        end: u32,
    },
}

impl Default for BootConfig {
    fn default() -> Self {
        BootConfig::Rom
    }
}

impl BootConfig {
    pub fn spi_flash() -> Self {
        BootConfig::SpiFlash {
            offset: DEFAULT_SPI_OFFSET,
            end: DEFAULT_SPI_OFFSET + DEFAULT_SPI_WINDOW,
        }
    }
}

/// SoC description: memory sizes, boot source, peripheral count and
/// decode policies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SocConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_ram_size")]
    pub ram_size: String,
    #[serde(default)]
    pub boot: BootConfig,
    #[serde(default = "default_pwm_count")]
    pub pwm_count: usize,
    #[serde(default = "default_true")]
    pub strict_decode: bool,
    #[serde(default)]
    pub strict_csr: bool,
}

impl Default for SocConfig {
    fn default() -> Self {
        Self {
            name: "rvsoc".to_string(),
            ram_size: default_ram_size(),
            boot: BootConfig::default(),
            pwm_count: default_pwm_count(),
            strict_decode: true,
            strict_csr: false,
        }
    }
}

impl SocConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let f = std::fs::File::open(path)
            .with_context(|| format!("Failed to open SoC config at {:?}", path))?;
        let config: Self = serde_yaml::from_reader(f).context("Failed to parse SoC config YAML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml).context("Failed to parse SoC config YAML")?;
        config.validate()?;
        Ok(config)
    }

    /// RAM size in 32-bit words.
    pub fn ram_words(&self) -> Result<usize> {
        let bytes = parse_size(&self.ram_size)?;
        Ok((bytes / 4) as usize)
    }

    pub fn validate(&self) -> Result<()> {
        let ram_bytes = parse_size(&self.ram_size)
            .with_context(|| format!("Invalid ram_size '{}'", self.ram_size))?;
        if ram_bytes == 0 {
            anyhow::bail!("ram_size must be greater than zero");
        }
        if ram_bytes % 4 != 0 {
            anyhow::bail!("ram_size must be a multiple of 4 bytes, got {}", ram_bytes);
        }
        if ram_bytes > RAM_WINDOW {
            anyhow::bail!(
                "ram_size {} exceeds the {} byte RAM window",
                ram_bytes,
                RAM_WINDOW
            );
        }

        if self.pwm_count > MAX_PWM_CHANNELS {
            anyhow::bail!(
                "pwm_count {} exceeds the maximum of {}",
                self.pwm_count,
                MAX_PWM_CHANNELS
            );
        }

        if let BootConfig::SpiFlash { offset, end } = self.boot {
            if end <= offset {
                anyhow::bail!(
                    "SPI flash end {:#x} must be past offset {:#x}",
                    end,
                    offset
                );
            }
            if end > SPI_ADDRESS_SPACE {
                anyhow::bail!(
                    "SPI flash end {:#x} is beyond the 24-bit address space",
                    end
                );
            }
        }

        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct TestInputs {
    pub image: String,
    #[serde(default)]
    pub ram_image: Option<String>,
    #[serde(default)]
    pub system: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct TestLimits {
    pub max_cycles: u64,
    #[serde(default)]
    pub max_instructions: Option<u64>,
    /// Cycles without a retirement before the run is declared stalled.
    #[serde(default)]
    pub stall_cycles: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Runner failed before simulation started (e.g. script parse/validation error).
    ConfigError,
    MaxCycles,
    MaxInstructions,
    Stall,
    CheckpointsComplete,
    /// The core retired `jal x0, 0`.
    Halt,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PcExpectation {
    pub pc: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RegisterExpectation {
    pub register: u8,
    pub value: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AddressValue {
    pub address: u32,
    pub value: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RamWordExpectation {
    pub ram_word: AddressValue,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CsrExpectation {
    pub csr: AddressValue,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum Expectation {
    Pc(PcExpectation),
    Register(RegisterExpectation),
    RamWord(RamWordExpectation),
    Csr(CsrExpectation),
}

/// Expected architectural state once `after` instructions have retired.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Checkpoint {
    pub after: u64,
    pub expect: Vec<Expectation>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct StopReasonAssertion {
    pub expected_stop_reason: StopReason,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum TestAssertion {
    ExpectedStopReason(StopReasonAssertion),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct TestScript {
    pub schema_version: String,
    pub inputs: TestInputs,
    pub limits: TestLimits,
    #[serde(default)]
    pub checkpoints: Vec<Checkpoint>,
    #[serde(default)]
    pub assertions: Vec<TestAssertion>,
}

impl TestScript {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open test script at {:?}", path.as_ref()))?;
        let script: Self =
            serde_yaml::from_reader(f).context("Failed to parse Test Script YAML")?;
        script.validate()?;
        Ok(script)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != SCHEMA_VERSION {
            anyhow::bail!(
                "Unsupported schema_version '{}'. Supported versions: '{}'",
                self.schema_version,
                SCHEMA_VERSION
            );
        }

        if self.inputs.image.trim().is_empty() {
            anyhow::bail!("Input 'image' path cannot be empty");
        }

        if self.limits.max_cycles == 0 {
            anyhow::bail!("Limit 'max_cycles' must be greater than zero");
        }

        let mut last: Option<u64> = None;
        for checkpoint in &self.checkpoints {
            if last.is_some_and(|prev| checkpoint.after <= prev) {
                anyhow::bail!(
                    "Checkpoint 'after: {}' must be strictly greater than the previous one",
                    checkpoint.after
                );
            }
            last = Some(checkpoint.after);

            for expectation in &checkpoint.expect {
                match expectation {
                    Expectation::Register(r) if r.register >= 32 => {
                        anyhow::bail!("Register index {} out of range (0..31)", r.register)
                    }
                    Expectation::RamWord(w) if w.ram_word.address % 4 != 0 => anyhow::bail!(
                        "RAM expectation address {:#x} is not word aligned",
                        w.ram_word.address
                    ),
                    _ => {}
                }
            }
        }

        Ok(())
    }
}

pub fn parse_size(size_str: &str) -> Result<u64> {
    use human_size::{Byte, Size, SpecificSize};
    let s: Size = size_str
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid size format: {}", e))?;
    let bytes: SpecificSize<Byte> = s.into();
    Ok(bytes.value() as u64)
}
