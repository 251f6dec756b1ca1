// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

mod runner;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

use rvsoc_config::{SocConfig, StopReason, TestAssertion, TestLimits, TestScript};
use rvsoc_core::cpu::RiscV;
use rvsoc_core::memory::BootImage;
use rvsoc_core::metrics::PerformanceMetrics;
use rvsoc_core::{Cpu, Machine};

use runner::CheckpointResult;

const EXIT_PASS: u8 = 0;
const EXIT_ASSERT_FAIL: u8 = 1;
const EXIT_CONFIG_ERROR: u8 = 2;
const EXIT_RUNTIME_ERROR: u8 = 3;

const RESULT_SCHEMA_VERSION: &str = "1.0";
const DEFAULT_MAX_CYCLES: u64 = 100_000;

#[derive(Parser, Debug)]
#[command(author, version, about = "RV32I SoC Simulator", long_about = None)]
struct Cli {
    /// Enable per-instruction execution tracing
    #[arg(short, long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run an image for a fixed number of cycles and print the final state.
    Run(RunArgs),

    /// Deterministic, CI-friendly runner mode driven by a test script (YAML).
    Test(TestArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Boot image (.bin, .hex/.txt or ELF)
    #[arg(short, long)]
    image: PathBuf,

    /// Words preloaded into RAM (.bin or .hex)
    #[arg(long)]
    ram_image: Option<PathBuf>,

    /// Path to the SoC description (YAML)
    #[arg(short, long)]
    system: Option<PathBuf>,

    /// Number of clock cycles to simulate
    #[arg(long, default_value_t = DEFAULT_MAX_CYCLES)]
    max_cycles: u64,

    /// Write a machine snapshot (JSON) after the run.
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct TestArgs {
    /// Path to the test script (YAML)
    #[arg(short = 'c', long)]
    script: PathBuf,

    /// Override the boot image named in the script
    #[arg(short = 'i', long)]
    image: Option<PathBuf>,

    /// Override the SoC description named in the script
    #[arg(short = 's', long)]
    system: Option<PathBuf>,

    /// Override max cycles limit
    #[arg(long)]
    max_cycles: Option<u64>,

    /// Directory to write test artifacts (result.json, snapshot.json)
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TestResult {
    result_schema_version: String,
    status: String,
    cycles: u64,
    instructions: u64,
    traps: u64,
    stop_reason: StopReason,
    limits: TestLimits,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    checkpoints: Vec<CheckpointResult>,
    assertions: Vec<AssertionResult>,
    image_hash: String,
    config: TestConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct AssertionResult {
    assertion: TestAssertion,
    passed: bool,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct TestConfig {
    image: Option<PathBuf>,
    ram_image: Option<PathBuf>,
    system: Option<PathBuf>,
    script: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing with appropriate level based on --trace flag
    if cli.trace {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .init();
    }

    match cli.command {
        Commands::Run(args) => run_image(args),
        Commands::Test(args) => run_test(args),
    }
}

fn hash_file(path: &Path) -> String {
    match std::fs::read(path) {
        Ok(bytes) => {
            let mut hasher = Sha256::new();
            hasher.update(&bytes);
            format!("{:x}", hasher.finalize())
        }
        Err(e) => {
            error!("Failed to read {:?} for hashing: {}", path, e);
            String::new()
        }
    }
}

fn load_soc_config(system: Option<&Path>) -> anyhow::Result<SocConfig> {
    match system {
        Some(path) => {
            info!("Loading SoC description: {:?}", path);
            SocConfig::from_file(path)
        }
        None => {
            info!("Using default SoC configuration");
            Ok(SocConfig::default())
        }
    }
}

fn build(
    image: &Path,
    ram_image: Option<&Path>,
    system: Option<&Path>,
) -> anyhow::Result<Machine<RiscV>> {
    let config = load_soc_config(system)?;
    let mut boot: BootImage = rvsoc_loader::load_image(image)?;
    if let Some(path) = ram_image {
        if !boot.ram.is_empty() {
            warn!("RAM image {:?} replaces RAM segments from {:?}", path, image);
        }
        boot.ram = rvsoc_loader::load_words(path)?;
    }
    rvsoc_core::system::build_machine(&config, boot)
}

fn report_state<C: Cpu>(machine: &Machine<C>, metrics: &PerformanceMetrics) {
    info!("Final PC: {:#010x}", machine.cpu.get_pc());
    for (id, name) in machine.cpu.get_register_names().iter().enumerate().take(32) {
        let value = machine.cpu.get_register(id as u8);
        if value != 0 {
            info!("  {:>4} = {:#010x}", name, value);
        }
    }
    info!(
        "Cycles: {}, instructions: {}, traps: {}, CPI: {:.2}, IPS: {:.0}",
        metrics.get_cycles(),
        metrics.get_instructions(),
        metrics.get_traps(),
        metrics.get_cpi(),
        metrics.get_ips()
    );
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let f = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(f, value)?;
    Ok(())
}

fn run_image(args: RunArgs) -> ExitCode {
    info!("Starting rvsoc simulator");

    let mut machine = match build(&args.image, args.ram_image.as_deref(), args.system.as_deref()) {
        Ok(machine) => machine,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let metrics = Arc::new(PerformanceMetrics::new());
    machine.add_observer(metrics.clone());
    machine.run(args.max_cycles);
    machine.stop();

    report_state(&machine, &metrics);

    if let Some(path) = &args.snapshot {
        if let Err(e) = write_json(path, &machine.snapshot()) {
            error!("Failed to write snapshot {:?}: {:#}", path, e);
            return ExitCode::from(EXIT_RUNTIME_ERROR);
        }
        info!("Snapshot written to {:?}", path);
    }

    ExitCode::from(EXIT_PASS)
}

fn resolve_script_path(script_path: &Path, value: &str) -> PathBuf {
    let p = PathBuf::from(value);
    if p.is_absolute() {
        return p;
    }
    script_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(p)
}

fn run_test(args: TestArgs) -> ExitCode {
    let script = match TestScript::from_file(&args.script) {
        Ok(s) => s,
        Err(e) => {
            let msg = format!("{:#}", e);
            error!("{}", msg);
            let config = TestConfig {
                script: args.script.clone(),
                ..Default::default()
            };
            write_config_error_outputs(&args, config, None, msg);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let limits = TestLimits {
        max_cycles: args.max_cycles.unwrap_or(script.limits.max_cycles),
        ..script.limits.clone()
    };

    let image = args
        .image
        .clone()
        .unwrap_or_else(|| resolve_script_path(&args.script, &script.inputs.image));
    let ram_image = script
        .inputs
        .ram_image
        .as_deref()
        .map(|s| resolve_script_path(&args.script, s));
    let system = args.system.clone().or_else(|| {
        script
            .inputs
            .system
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|s| resolve_script_path(&args.script, s))
    });
    let config = TestConfig {
        image: Some(image.clone()),
        ram_image: ram_image.clone(),
        system: system.clone(),
        script: args.script.clone(),
    };

    let mut machine = match build(&image, ram_image.as_deref(), system.as_deref()) {
        Ok(machine) => machine,
        Err(e) => {
            let msg = format!("{:#}", e);
            error!("{}", msg);
            write_config_error_outputs(&args, config, Some(&limits), msg);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let metrics = Arc::new(PerformanceMetrics::new());
    machine.add_observer(metrics.clone());
    let outcome = runner::run_checkpoints(&mut machine, &limits, &script.checkpoints);
    machine.stop();
    info!(
        "Stopped: {:?} after {} cycles, {} instructions",
        outcome.stop_reason, outcome.cycles, outcome.retired
    );

    let mut all_passed = outcome.checkpoints_passed();
    let mut expected_stop_reason_matched = false;
    let mut assertion_results = Vec::new();
    for assertion in &script.assertions {
        let passed = match assertion {
            TestAssertion::ExpectedStopReason(a) => a.expected_stop_reason == outcome.stop_reason,
        };
        if passed {
            expected_stop_reason_matched = true;
        } else {
            all_passed = false;
            error!("Assertion failed: {:?}", assertion);
        }
        assertion_results.push(AssertionResult {
            assertion: assertion.clone(),
            passed,
        });
    }

    // A stall is only acceptable when the script expects it.
    let stall_unexpected =
        outcome.stop_reason == StopReason::Stall && !expected_stop_reason_matched;
    let passed = all_passed && !stall_unexpected;

    let result = TestResult {
        result_schema_version: RESULT_SCHEMA_VERSION.to_string(),
        status: if passed { "pass" } else { "fail" }.to_string(),
        cycles: outcome.cycles,
        instructions: outcome.retired,
        traps: metrics.get_traps(),
        stop_reason: outcome.stop_reason,
        limits,
        message: None,
        checkpoints: outcome.checkpoints,
        assertions: assertion_results,
        image_hash: hash_file(&image),
        config,
    };

    if let Some(dir) = &args.output_dir {
        let outputs = write_json(&dir.join("result.json"), &result)
            .and_then(|_| write_json(&dir.join("snapshot.json"), &machine.snapshot()));
        if let Err(e) = outputs {
            error!("Failed to write test outputs to {:?}: {:#}", dir, e);
            return ExitCode::from(EXIT_RUNTIME_ERROR);
        }
    }

    if passed {
        info!("Test passed");
        ExitCode::from(EXIT_PASS)
    } else {
        error!("Test failed");
        ExitCode::from(EXIT_ASSERT_FAIL)
    }
}

fn write_config_error_outputs(
    args: &TestArgs,
    config: TestConfig,
    limits: Option<&TestLimits>,
    message: String,
) {
    let Some(dir) = &args.output_dir else {
        return;
    };
    let image_hash = config.image.as_deref().map(hash_file).unwrap_or_default();
    let result = TestResult {
        result_schema_version: RESULT_SCHEMA_VERSION.to_string(),
        status: "error".to_string(),
        cycles: 0,
        instructions: 0,
        traps: 0,
        stop_reason: StopReason::ConfigError,
        limits: limits.cloned().unwrap_or(TestLimits {
            max_cycles: 0,
            max_instructions: None,
            stall_cycles: None,
        }),
        message: Some(message),
        checkpoints: Vec::new(),
        assertions: Vec::new(),
        image_hash,
        config,
    };
    // Best-effort: the exit code already reports the failure.
    if let Err(e) = write_json(&dir.join("result.json"), &result) {
        error!("Failed to write result.json to {:?}: {:#}", dir, e);
    }
}
