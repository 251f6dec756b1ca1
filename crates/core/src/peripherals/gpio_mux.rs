// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::{SimResult, SimulationError};
use serde::{Deserialize, Serialize};

const REG_COUNT: usize = 7;
const PINS_PER_REG: usize = 8;
pub const MUX_PINS: usize = REG_COUNT * PINS_PER_REG;

/// Pin function multiplexer: 4-bit selector per pin, all read/write.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct GpioMux {
    regs: [u32; REG_COUNT],
}

impl GpioMux {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selected function for `pin` (0 = plain GPIO).
    pub fn function(&self, pin: usize) -> u8 {
        self.regs
            .get(pin / PINS_PER_REG)
            .map_or(0, |reg| ((reg >> ((pin % PINS_PER_REG) * 4)) & 0xF) as u8)
    }
}

impl crate::Peripheral for GpioMux {
    fn read(&self, offset: u64) -> SimResult<u8> {
        let reg_val = self.regs.get((offset / 4) as usize).copied().unwrap_or(0);
        Ok((reg_val >> ((offset % 4) * 8)) as u8)
    }

    fn write(&mut self, offset: u64, value: u8) -> SimResult<()> {
        if let Some(reg) = self.regs.get_mut((offset / 4) as usize) {
            let shift = (offset % 4) * 8;
            *reg = (*reg & !(0xFF << shift)) | (u32::from(value) << shift);
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.regs = [0; REG_COUNT];
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    fn restore(&mut self, state: serde_json::Value) -> SimResult<()> {
        *self = serde_json::from_value(state)
            .map_err(|e| SimulationError::Snapshot(format!("gpio_mux: {}", e)))?;
        Ok(())
    }
}
