// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use rvsoc_config::{Checkpoint, Expectation, StopReason, TestLimits};
use rvsoc_core::{Cpu, Machine};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

/// `jal x0, 0`: the conventional bare-metal end-of-program loop.
pub const HALT_WORD: u32 = 0x0000_006F;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExpectationResult {
    pub expectation: Expectation,
    pub actual: Option<u32>,
    pub passed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckpointResult {
    pub after: u64,
    pub reached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle: Option<u64>,
    pub expectations: Vec<ExpectationResult>,
}

impl CheckpointResult {
    pub fn passed(&self) -> bool {
        self.reached && self.expectations.iter().all(|e| e.passed)
    }
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub stop_reason: StopReason,
    pub cycles: u64,
    pub retired: u64,
    pub checkpoints: Vec<CheckpointResult>,
}

impl RunOutcome {
    pub fn checkpoints_passed(&self) -> bool {
        self.checkpoints.iter().all(CheckpointResult::passed)
    }
}

fn observe<C: Cpu>(machine: &Machine<C>, expectation: &Expectation) -> Option<u32> {
    match expectation {
        Expectation::Pc(_) => Some(machine.cpu.get_pc()),
        Expectation::Register(r) => Some(machine.cpu.get_register(r.register)),
        Expectation::RamWord(w) => machine.read_ram_word(w.ram_word.address),
        Expectation::Csr(c) => u16::try_from(c.csr.address)
            .ok()
            .map(|address| machine.cpu.read_csr(address)),
    }
}

fn expected(expectation: &Expectation) -> u32 {
    match expectation {
        Expectation::Pc(p) => p.pc,
        Expectation::Register(r) => r.value,
        Expectation::RamWord(w) => w.ram_word.value,
        Expectation::Csr(c) => c.csr.value,
    }
}

fn evaluate<C: Cpu>(machine: &Machine<C>, checkpoint: &Checkpoint) -> CheckpointResult {
    let expectations = checkpoint
        .expect
        .iter()
        .map(|expectation| {
            let actual = observe(machine, expectation);
            let passed = actual == Some(expected(expectation));
            if !passed {
                error!(
                    "Checkpoint after {} instructions: expected {:?}, got {:?}",
                    checkpoint.after, expectation, actual
                );
            }
            ExpectationResult {
                expectation: expectation.clone(),
                actual,
                passed,
            }
        })
        .collect();
    CheckpointResult {
        after: checkpoint.after,
        reached: true,
        cycle: Some(machine.total_cycles),
        expectations,
    }
}

fn unreached(checkpoint: &Checkpoint) -> CheckpointResult {
    CheckpointResult {
        after: checkpoint.after,
        reached: false,
        cycle: None,
        expectations: Vec::new(),
    }
}

/// Clocks `machine` until a stop condition fires, checking each
/// checkpoint the moment its retirement count is reached.
pub fn run_checkpoints<C: Cpu>(
    machine: &mut Machine<C>,
    limits: &TestLimits,
    checkpoints: &[Checkpoint],
) -> RunOutcome {
    let start_cycles = machine.total_cycles;
    let mut results = Vec::with_capacity(checkpoints.len());
    let mut pending = checkpoints.iter().peekable();
    let mut last_retire_cycle = 0u64;
    let mut cycles = 0u64;

    while let Some(cp) = pending.next_if(|cp| cp.after <= machine.cpu.retired()) {
        results.push(evaluate(machine, cp));
    }

    let stop_reason = loop {
        if !checkpoints.is_empty() && pending.peek().is_none() {
            break StopReason::CheckpointsComplete;
        }
        if cycles >= limits.max_cycles {
            break StopReason::MaxCycles;
        }
        if limits
            .max_instructions
            .is_some_and(|limit| machine.cpu.retired() >= limit)
        {
            break StopReason::MaxInstructions;
        }
        if let Some(limit) = limits.stall_cycles {
            if cycles - last_retire_cycle >= limit {
                error!(
                    "No retirement for {} cycles (pc {:#x})",
                    limit,
                    machine.cpu.get_pc()
                );
                break StopReason::Stall;
            }
        }

        let report = machine.tick();
        cycles += 1;

        let Some(retired) = report.retired else {
            continue;
        };
        last_retire_cycle = cycles;
        while let Some(cp) = pending.next_if(|cp| cp.after <= machine.cpu.retired()) {
            debug!("Checkpoint after {} reached at cycle {}", cp.after, cycles);
            results.push(evaluate(machine, cp));
        }
        if retired.word == HALT_WORD && report.trap.is_none() {
            info!("Halted at {:#x}", retired.pc);
            break StopReason::Halt;
        }
    };

    results.extend(pending.map(unreached));

    RunOutcome {
        stop_reason,
        cycles: machine.total_cycles - start_cycles,
        retired: machine.cpu.retired(),
        checkpoints: results,
    }
}
