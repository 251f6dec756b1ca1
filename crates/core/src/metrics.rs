// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::cpu::TrapCause;
use crate::SimulationObserver;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

#[derive(Debug)]
pub struct PerformanceMetrics {
    instruction_count: AtomicU64,
    cycle_count: AtomicU64,
    trap_count: AtomicU64,
    traps_by_cause: Mutex<HashMap<&'static str, u64>>,
    start_time: Instant,
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceMetrics {
    pub fn new() -> Self {
        Self {
            instruction_count: AtomicU64::new(0),
            cycle_count: AtomicU64::new(0),
            trap_count: AtomicU64::new(0),
            traps_by_cause: Mutex::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    pub fn reset(&self) {
        self.instruction_count.store(0, Ordering::SeqCst);
        self.cycle_count.store(0, Ordering::SeqCst);
        self.trap_count.store(0, Ordering::SeqCst);
        if let Ok(mut m) = self.traps_by_cause.lock() {
            m.clear();
        }
    }

    pub fn get_instructions(&self) -> u64 {
        self.instruction_count.load(Ordering::SeqCst)
    }

    pub fn get_cycles(&self) -> u64 {
        self.cycle_count.load(Ordering::SeqCst)
    }

    pub fn get_traps(&self) -> u64 {
        self.trap_count.load(Ordering::SeqCst)
    }

    pub fn get_traps_by_cause(&self, cause: TrapCause) -> u64 {
        self.traps_by_cause
            .lock()
            .ok()
            .and_then(|m| m.get(cause.mnemonic()).copied())
            .unwrap_or(0)
    }

    /// Cycles per retired instruction.
    pub fn get_cpi(&self) -> f64 {
        let instructions = self.get_instructions();
        if instructions > 0 {
            self.get_cycles() as f64 / instructions as f64
        } else {
            0.0
        }
    }

    pub fn get_ips(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.get_instructions() as f64 / elapsed
        } else {
            0.0
        }
    }
}

impl SimulationObserver for PerformanceMetrics {
    fn on_cycle(&self, _cycle: u64) {
        self.cycle_count.fetch_add(1, Ordering::SeqCst);
    }

    fn on_retire(&self, _pc: u32, _word: u32) {
        self.instruction_count.fetch_add(1, Ordering::SeqCst);
    }

    fn on_trap(&self, cause: TrapCause, _epc: u32) {
        self.trap_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut m) = self.traps_by_cause.lock() {
            *m.entry(cause.mnemonic()).or_insert(0) += 1;
        }
    }
}
