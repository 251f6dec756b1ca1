// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod alu;
pub mod asm;
pub mod bus;
pub mod cpu;
pub mod csr;
pub mod decoder;
pub mod memory;
pub mod metrics;
pub mod peripherals;
pub mod snapshot;
pub mod system;

use std::any::Any;
use std::sync::Arc;

use bus::{BusAcks, BusRequest};
use cpu::{TickReport, TrapCause};

mod tests;

#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("Image of {words} words does not fit in {capacity} words")]
    ImageTooLarge { words: usize, capacity: usize },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Timed out after {cycles} cycles")]
    Timeout { cycles: u64 },
    #[error("Snapshot error: {0}")]
    Snapshot(String),
}

pub type SimResult<T> = Result<T, SimulationError>;

/// Trait for observing simulation events in a modular way.
pub trait SimulationObserver: std::fmt::Debug + Send + Sync {
    fn on_simulation_start(&self) {}
    fn on_simulation_stop(&self) {}
    fn on_cycle(&self, _cycle: u64) {}
    fn on_retire(&self, _pc: u32, _word: u32) {}
    fn on_trap(&self, _cause: TrapCause, _epc: u32) {}
}

/// Trait representing a clocked CPU core
pub trait Cpu: Send {
    fn reset(&mut self);
    /// Advances one clock cycle, presenting at most one request per bus.
    fn tick(&mut self, bus: &mut dyn Bus) -> TickReport;
    fn retired(&self) -> u64;
    fn set_pc(&mut self, val: u32);
    fn get_pc(&self) -> u32;

    // Debug Access
    fn get_register(&self, id: u8) -> u32;
    fn set_register(&mut self, id: u8, val: u32);
    fn read_csr(&self, address: u16) -> u32;
    fn snapshot(&self) -> snapshot::CpuSnapshot;
    fn apply_snapshot(&mut self, snapshot: &snapshot::CpuSnapshot);
    fn get_register_names(&self) -> Vec<String>;
}

/// Trait representing a memory-mapped peripheral
pub trait Peripheral: std::fmt::Debug + Send {
    fn read(&self, offset: u64) -> SimResult<u8>;
    fn write(&mut self, offset: u64, value: u8) -> SimResult<()>;
    /// Called once per bus cycle.
    fn tick(&mut self) {}
    fn reset(&mut self) {}
    fn as_any(&self) -> Option<&dyn Any> {
        None
    }
    fn as_any_mut(&mut self) -> Option<&mut dyn Any> {
        None
    }
    fn snapshot(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
    fn restore(&mut self, _state: serde_json::Value) -> SimResult<()> {
        Ok(())
    }
}

/// Trait representing the interconnect seen by the core: one instruction
/// and one data master, both clocked together.
pub trait Bus {
    fn cycle(&mut self, ibus: Option<&BusRequest>, dbus: Option<&BusRequest>) -> BusAcks;
}

pub struct Machine<C: Cpu> {
    pub cpu: C,
    pub bus: bus::SystemBus,
    pub observers: Vec<Arc<dyn SimulationObserver>>,
    pub total_cycles: u64,
}

impl<C: Cpu> Machine<C> {
    pub fn new(cpu: C, bus: bus::SystemBus) -> Self {
        Self {
            cpu,
            bus,
            observers: Vec::new(),
            total_cycles: 0,
        }
    }

    pub fn add_observer(&mut self, observer: Arc<dyn SimulationObserver>) {
        observer.on_simulation_start();
        self.observers.push(observer);
    }

    pub fn reset(&mut self) {
        self.cpu.reset();
        self.bus.reset();
        self.total_cycles = 0;
        tracing::info!("Machine reset");
    }

    pub fn tick(&mut self) -> TickReport {
        let report = self.cpu.tick(&mut self.bus);
        self.total_cycles += 1;

        for observer in &self.observers {
            observer.on_cycle(self.total_cycles);
            if let Some(r) = report.retired {
                observer.on_retire(r.pc, r.word);
            }
            if let Some(t) = report.trap {
                observer.on_trap(t.cause, t.epc);
            }
        }
        report
    }

    /// Clocks `max_cycles` cycles.
    pub fn run(&mut self, max_cycles: u64) {
        for _ in 0..max_cycles {
            self.tick();
        }
    }

    /// Clocks until `count` more instructions retire, returning the cycles
    /// spent.
    pub fn run_until_retired(&mut self, count: u64, budget: u64) -> SimResult<u64> {
        let target = self.cpu.retired() + count;
        let mut cycles = 0;
        while self.cpu.retired() < target {
            if cycles >= budget {
                return Err(SimulationError::Timeout { cycles });
            }
            self.tick();
            cycles += 1;
        }
        Ok(cycles)
    }

    pub fn stop(&self) {
        for observer in &self.observers {
            observer.on_simulation_stop();
        }
    }

    pub fn snapshot(&self) -> snapshot::MachineSnapshot {
        snapshot::MachineSnapshot {
            cpu: self.cpu.snapshot(),
            cycles: self.total_cycles,
            boot: self.bus.boot.target().snapshot(),
            peripherals: self
                .bus
                .peripherals
                .iter()
                .map(|p| (p.name.clone(), p.dev.snapshot()))
                .collect(),
        }
    }

    /// Restores core, cycle count and peripheral registers. Transactions
    /// in flight are abandoned and boot storage restarts from reset.
    pub fn apply_snapshot(&mut self, snapshot: snapshot::MachineSnapshot) -> SimResult<()> {
        self.bus.abort_transactions();
        self.cpu.apply_snapshot(&snapshot.cpu);
        self.total_cycles = snapshot.cycles;
        for p in &mut self.bus.peripherals {
            if let Some(state) = snapshot.peripherals.get(&p.name) {
                p.dev.restore(state.clone())?;
            }
        }
        Ok(())
    }

    pub fn peek_peripheral(&self, name: &str) -> Option<serde_json::Value> {
        self.bus.peripheral(name).map(|p| p.dev.snapshot())
    }

    pub fn read_ram_word(&self, addr: u32) -> Option<u32> {
        self.bus.peek_ram_word(addr)
    }
}
