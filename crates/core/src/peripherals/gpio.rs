// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::{SimResult, SimulationError};
use serde::{Deserialize, Serialize};

pub const PIN_COUNT: usize = 64;
const PINS_PER_REG: usize = 16;
const REG_COUNT: usize = PIN_COUNT / PINS_PER_REG;

/// GPIO block: four registers, two bits per pin.
///
/// Bit `2p` is the pin level and bit `2p + 1` its direction (1 = output).
/// Input pins read their external level; writes to their value bit are
/// discarded.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Gpio {
    regs: [u32; REG_COUNT],
    inputs: u64,
}

fn value_bit(pin: usize) -> u32 {
    1 << ((pin % PINS_PER_REG) * 2)
}

fn dir_bit(pin: usize) -> u32 {
    value_bit(pin) << 1
}

impl Gpio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_output(&self, pin: usize) -> bool {
        pin < PIN_COUNT && self.regs[pin / PINS_PER_REG] & dir_bit(pin) != 0
    }

    /// Driven level of an output pin, `None` for inputs.
    pub fn output(&self, pin: usize) -> Option<bool> {
        if !self.is_output(pin) {
            return None;
        }
        Some(self.regs[pin / PINS_PER_REG] & value_bit(pin) != 0)
    }

    /// Sets the externally applied level of a pin.
    pub fn set_input(&mut self, pin: usize, level: bool) {
        if pin >= PIN_COUNT {
            return;
        }
        if level {
            self.inputs |= 1 << pin;
        } else {
            self.inputs &= !(1 << pin);
        }
    }

    fn read_reg(&self, index: usize) -> u32 {
        let Some(&raw) = self.regs.get(index) else {
            return 0;
        };
        (0..PINS_PER_REG)
            .map(|p| index * PINS_PER_REG + p)
            .filter(|&pin| raw & dir_bit(pin) == 0)
            .fold(raw, |value, pin| {
                if self.inputs & (1 << pin) != 0 {
                    value | value_bit(pin)
                } else {
                    value & !value_bit(pin)
                }
            })
    }

    fn write_reg(&mut self, index: usize, value: u32) {
        let Some(raw) = self.regs.get_mut(index) else {
            return;
        };
        let mut next = *raw;
        for p in 0..PINS_PER_REG {
            let dir = dir_bit(p);
            let val = value_bit(p);
            next = (next & !dir) | (value & dir);
            if next & dir != 0 {
                next = (next & !val) | (value & val);
            }
        }
        *raw = next;
    }
}

impl crate::Peripheral for Gpio {
    fn read(&self, offset: u64) -> SimResult<u8> {
        let reg_val = self.read_reg((offset / 4) as usize);
        Ok((reg_val >> ((offset % 4) * 8)) as u8)
    }

    fn write(&mut self, offset: u64, value: u8) -> SimResult<()> {
        let index = (offset / 4) as usize;
        if index >= REG_COUNT {
            return Ok(());
        }
        let shift = (offset % 4) * 8;
        let reg_val = (self.regs[index] & !(0xFF << shift)) | (u32::from(value) << shift);
        self.write_reg(index, reg_val);
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
            .map_err(|e| SimulationError::Snapshot(format!("gpio: {}", e)))?;
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

    fn write_word(gpio: &mut Gpio, offset: u64, value: u32) {
        for (i, byte) in value.to_le_bytes().into_iter().enumerate() {
            gpio.write(offset + i as u64, byte).unwrap();
        }
    }

    fn read_word(gpio: &Gpio, offset: u64) -> u32 {
        (0..4).fold(0, |w, i| w | (u32::from(gpio.read(offset + i).unwrap()) << (i * 8)))
    }

    #[test]
    fn test_reset_all_inputs_low() {
        let gpio = Gpio::new();
        for reg in 0..4 {
            assert_eq!(read_word(&gpio, reg * 4), 0);
        }
        assert_eq!(gpio.output(0), None);
    }

    #[test]
    fn test_output_pins_drive_value() {
        let mut gpio = Gpio::new();
        // Pin 0 output high, pin 1 output low, pin 2 output high.
        write_word(&mut gpio, 0, 0b11_10_11);
        assert_eq!(gpio.output(0), Some(true));
        assert_eq!(gpio.output(1), Some(false));
        assert_eq!(gpio.output(2), Some(true));
        assert_eq!(read_word(&gpio, 0), 0b11_10_11);
    }

    #[test]
    fn test_input_value_bits_ignore_writes() {
        let mut gpio = Gpio::new();
        write_word(&mut gpio, 4, 0x5555_5555);
        assert_eq!(read_word(&gpio, 4), 0);
        gpio.set_input(17, true);
        assert_eq!(read_word(&gpio, 4), 0b100);
        gpio.set_input(17, false);
        assert_eq!(read_word(&gpio, 4), 0);
    }

    #[test]
    fn test_high_bank_pins() {
        let mut gpio = Gpio::new();
        write_word(&mut gpio, 12, 0xC000_0000);
        assert_eq!(gpio.output(63), Some(true));
        assert!(!gpio.is_output(62));
        assert_eq!(gpio.output(64), None);
    }

    #[test]
    fn test_snapshot_restore() {
        let mut gpio = Gpio::new();
        write_word(&mut gpio, 0, 0b11);
        gpio.set_input(5, true);
        let snap = gpio.snapshot();
        let mut other = Gpio::new();
        other.restore(snap).unwrap();
        assert_eq!(other.output(0), Some(true));
        assert_eq!(read_word(&other, 0) & value_bit(5), value_bit(5));
    }
}
