// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::{SimResult, SimulationError};
use serde::{Deserialize, Serialize};

const REG_COMPARE: u64 = 0x00;
const REG_COUNTER: u64 = 0x04;

/// 8-bit PWM channel with a free-running counter.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Pwm {
    compare: u8,
    counter: u8,
}

impl Pwm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compare(&self) -> u8 {
        self.compare
    }

    pub fn counter(&self) -> u8 {
        self.counter
    }

    /// Output level: high once the counter reaches the compare value.
    pub fn output(&self) -> bool {
        self.counter >= self.compare
    }
}

impl crate::Peripheral for Pwm {
    fn read(&self, offset: u64) -> SimResult<u8> {
        Ok(match offset {
            REG_COMPARE => self.compare,
            REG_COUNTER => self.counter,
            _ => 0,
        })
    }

    fn write(&mut self, offset: u64, value: u8) -> SimResult<()> {
        if offset == REG_COMPARE {
            self.compare = value;
        }
        Ok(())
    }

    fn tick(&mut self) {
        self.counter = self.counter.wrapping_add(1);
    }

    fn reset(&mut self) {
        *self = Self::default();
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    fn restore(&mut self, state: serde_json::Value) -> SimResult<()> {
        *self = serde_json::from_value(state)
            .map_err(|e| SimulationError::Snapshot(format!("pwm: {}", e)))?;
        Ok(())
    }

    fn as_any(&self) -> Option<&dyn std::any::Any> {
        Some(self)
    }

    fn as_any_mut(&mut self) -> Option<&mut dyn std::any::Any> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Peripheral;

    #[test]
    fn test_counter_wraps() {
        let mut pwm = Pwm::new();
        for _ in 0..255 {
            pwm.tick();
        }
        assert_eq!(pwm.read(REG_COUNTER).unwrap(), 255);
        pwm.tick();
        assert_eq!(pwm.counter(), 0);
    }

    #[test]
    fn test_duty_cycle() {
        let mut pwm = Pwm::new();
        pwm.write(REG_COMPARE, 64).unwrap();
        let mut high = 0;
        for _ in 0..256 {
            pwm.tick();
            if pwm.output() {
                high += 1;
            }
        }
        assert_eq!(high, 256 - 64);
    }

    #[test]
    fn test_counter_is_read_only() {
        let mut pwm = Pwm::new();
        pwm.write(REG_COUNTER, 0x42).unwrap();
        pwm.write(0x01, 0x42).unwrap();
        assert_eq!(pwm.counter(), 0);
        assert_eq!(pwm.compare(), 0);
    }
}
