// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::{SimResult, SimulationError};

pub const ROM_BASE: u32 = 0x0000_0000;
pub const RAM_BASE: u32 = 0x2000_0000;
pub const GPIO_BASE: u32 = 0x4000_0000;
pub const GPIO_MUX_BASE: u32 = 0x4001_0000;
pub const PWM_BASE: u32 = 0x4002_0000;
pub const PWM_STRIDE: u32 = 0x100;

pub const ROM_WINDOW: u32 = RAM_BASE - ROM_BASE;
pub const RAM_WINDOW: u32 = 0x2000_0000;
pub const GPIO_WINDOW: u32 = GPIO_MUX_BASE - GPIO_BASE;
pub const GPIO_MUX_WINDOW: u32 = PWM_BASE - GPIO_MUX_BASE;

/// Downstream target selected by a decoder window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Boot,
    Ram,
    Peripheral(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub base: u32,
    pub size: u32,
    pub route: Route,
}

impl Window {
    fn contains(&self, addr: u32) -> bool {
        addr >= self.base && addr - self.base < self.size
    }

    fn end(&self) -> u64 {
        u64::from(self.base) + u64::from(self.size)
    }
}

/// Address decoder for one bus master: a table of non-overlapping windows.
#[derive(Debug, Clone, Default)]
pub struct AddressDecoder {
    windows: Vec<Window>,
}

impl AddressDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, base: u32, size: u32, route: Route) -> SimResult<()> {
        let window = Window { base, size, route };
        if size == 0 {
            return Err(SimulationError::InvalidConfig(format!(
                "empty decoder window at {:#010x}",
                base
            )));
        }
        if let Some(other) = self
            .windows
            .iter()
            .find(|w| u64::from(base) < w.end() && u64::from(w.base) < window.end())
        {
            return Err(SimulationError::InvalidConfig(format!(
                "decoder window {:#010x}+{:#x} overlaps {:#010x}+{:#x}",
                base, size, other.base, other.size
            )));
        }
        self.windows.push(window);
        self.windows.sort_by_key(|w| w.base);
        Ok(())
    }

    /// Resolves `addr` to a route and the offset inside its window.
    pub fn resolve(&self, addr: u32) -> Option<(Route, u32)> {
        self.windows
            .iter()
            .find(|w| w.contains(addr))
            .map(|w| (w.route, addr - w.base))
    }

    pub fn windows(&self) -> &[Window] {
        &self.windows
    }
}
