// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod riscv;

pub use riscv::{CoreConfig, Phase, RegisterFile, RiscV};

use serde::{Deserialize, Serialize};

/// Synchronous exception causes, valued as their `mcause` codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrapCause {
    InstructionMisaligned = 1,
    IllegalInstruction = 2,
    Breakpoint = 3,
    LoadMisaligned = 4,
    StoreMisaligned = 6,
    EnvironmentCall = 11,
}

impl TrapCause {
    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            TrapCause::InstructionMisaligned => "IMIS",
            TrapCause::IllegalInstruction => "ILLI",
            TrapCause::Breakpoint => "BREAK",
            TrapCause::LoadMisaligned => "LMIS",
            TrapCause::StoreMisaligned => "SMIS",
            TrapCause::EnvironmentCall => "ECALL",
        }
    }
}

impl std::fmt::Display for TrapCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.mnemonic(), self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retirement {
    pub pc: u32,
    pub word: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrapEvent {
    pub cause: TrapCause,
    /// The return address recorded in `mepc`.
    pub epc: u32,
}

/// What happened in the cycle just clocked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub retired: Option<Retirement>,
    pub trap: Option<TrapEvent>,
}
