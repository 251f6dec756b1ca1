// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::cpu::Phase;
use crate::csr::CsrValue;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MachineSnapshot {
    pub cpu: CpuSnapshot,
    pub cycles: u64,
    /// Boot storage state; informational only, not restored.
    #[serde(default)]
    pub boot: serde_json::Value,
    pub peripherals: HashMap<String, serde_json::Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CpuSnapshot {
    pub registers: Vec<u32>,
    pub pc: u32,
    pub phase: Phase,
    pub ir: u32,
    pub retired: u64,
    pub csrs: Vec<CsrValue>,
}

impl CpuSnapshot {
    pub fn csr(&self, name: &str) -> Option<u32> {
        self.csrs.iter().find(|c| c.name == name).map(|c| c.value)
    }
}
