// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Boot storage fetched from an external single-bit SPI flash.
//!
//! The controller wakes the chip with a release-power-down command, then
//! serves each bus read with a `READ` (0x03) command and a 24-bit address,
//! clocking one bit per cycle. A word takes 64 cycles plus one to start.

use crate::bus::{BusRequest, Target};
use serde::Serialize;
use tracing::{debug, trace};

/// Default program location: boards commonly keep the FPGA bitstream at
/// the start of the flash.
pub const DEFAULT_FLASH_OFFSET: u32 = 2 * 1024 * 1024;
pub const DEFAULT_FLASH_WINDOW: u32 = 1024;

const CMD_RELEASE_POWER_DOWN: u8 = 0xAB;
const CMD_READ: u8 = 0x03;
const POWERUP_CYCLES: u32 = 30;
const ADDRESS_MASK: u32 = 0x00FF_FFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlashPhase {
    Command,
    Address,
    Data,
    Ignore,
}

/// Behavioural model of a 25-series SPI NOR flash (mode 0, read only).
#[derive(Debug, Clone)]
pub struct FlashDevice {
    image_base: u32,
    image: Vec<u8>,
    selected: bool,
    powered: bool,
    phase: FlashPhase,
    shift: u32,
    bits: u32,
    address: u32,
}

impl FlashDevice {
    /// A chip holding `image` at flash address `image_base`. Every other
    /// location reads as erased (0xFF).
    pub fn new(image_base: u32, image: Vec<u8>) -> Self {
        Self {
            image_base,
            image,
            selected: false,
            powered: false,
            phase: FlashPhase::Command,
            shift: 0,
            bits: 0,
            address: 0,
        }
    }

    pub fn from_words(image_base: u32, words: &[u32]) -> Self {
        Self::new(
            image_base,
            words.iter().flat_map(|w| w.to_le_bytes()).collect(),
        )
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    /// Drives chip select. Deselecting aborts any command in progress.
    pub fn set_select(&mut self, selected: bool) {
        if selected && !self.selected {
            self.phase = FlashPhase::Command;
            self.shift = 0;
            self.bits = 0;
        }
        self.selected = selected;
    }

    fn byte_at(&self, address: u32) -> u8 {
        address
            .checked_sub(self.image_base)
            .and_then(|offset| self.image.get(offset as usize))
            .copied()
            .unwrap_or(0xFF)
    }

    /// One SCK period: samples `mosi` and returns the MISO level.
    pub fn clock(&mut self, mosi: bool) -> bool {
        if !self.selected {
            return false;
        }
        match self.phase {
            FlashPhase::Command => {
                self.shift = (self.shift << 1) | u32::from(mosi);
                self.bits += 1;
                if self.bits == 8 {
                    let cmd = self.shift as u8;
                    self.shift = 0;
                    self.bits = 0;
                    self.phase = match cmd {
                        CMD_RELEASE_POWER_DOWN => {
                            self.powered = true;
                            FlashPhase::Ignore
                        }
                        CMD_READ if self.powered => FlashPhase::Address,
                        _ => {
                            trace!("flash ignoring command {:#04x}", cmd);
                            FlashPhase::Ignore
                        }
                    };
                }
                false
            }
            FlashPhase::Address => {
                self.shift = (self.shift << 1) | u32::from(mosi);
                self.bits += 1;
                if self.bits == 24 {
                    self.address = self.shift & ADDRESS_MASK;
                    self.bits = 0;
                    self.phase = FlashPhase::Data;
                }
                false
            }
            FlashPhase::Data => {
                let byte = self.byte_at(self.address);
                let bit = (byte >> (7 - self.bits)) & 1 != 0;
                self.bits += 1;
                if self.bits == 8 {
                    self.bits = 0;
                    self.address = (self.address + 1) & ADDRESS_MASK;
                }
                bit
            }
            FlashPhase::Ignore => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpiState {
    Reset,
    PowerUp,
    Waiting,
    Tx,
    Rx,
}

/// SPI flash controller exposed as a read-only bus target.
#[derive(Debug, Clone)]
pub struct SpiRom {
    flash: FlashDevice,
    state: SpiState,
    offset: u32,
    end: u32,
    shift: u32,
    data: u32,
    count: u32,
    /// Read being clocked through Tx/Rx.
    active: Option<BusRequest>,
    /// Acknowledged read, re-acknowledged for as long as it is held.
    held: Option<BusRequest>,
}

impl SpiRom {
    /// Bus address 0 maps to flash address `offset`; `end` bounds the
    /// region the program is expected to occupy.
    pub fn new(offset: u32, end: u32, flash: FlashDevice) -> Self {
        Self {
            flash,
            state: SpiState::Reset,
            offset,
            end,
            shift: 0,
            data: 0,
            count: 0,
            active: None,
            held: None,
        }
    }

    /// Controller over a flash chip holding `words` at `offset`.
    pub fn with_program(offset: u32, end: u32, words: &[u32]) -> Self {
        Self::new(offset, end, FlashDevice::from_words(offset, words))
    }

    pub fn state(&self) -> SpiState {
        self.state
    }

    pub fn flash(&self) -> &FlashDevice {
        &self.flash
    }

    fn shift_out(&mut self) {
        let bit = self.shift >> 31 != 0;
        self.flash.clock(bit);
        self.shift <<= 1;
    }
}

impl Target for SpiRom {
    fn cycle(&mut self, request: Option<&BusRequest>) -> Option<u32> {
        match self.state {
            SpiState::Reset => {
                self.flash.set_select(true);
                self.shift = u32::from(CMD_RELEASE_POWER_DOWN) << 24;
                self.count = 0;
                self.state = SpiState::PowerUp;
                None
            }
            SpiState::PowerUp => {
                if self.count < 8 {
                    self.shift_out();
                    if self.count == 7 {
                        self.flash.set_select(false);
                    }
                }
                self.count += 1;
                if self.count >= POWERUP_CYCLES {
                    trace!("SPI flash awake");
                    self.state = SpiState::Waiting;
                }
                None
            }
            SpiState::Waiting => {
                let Some(req) = request else {
                    self.held = None;
                    return None;
                };
                if self.held.as_ref() == Some(req) {
                    return Some(self.data >> (req.byte_offset() * 8));
                }
                self.held = None;
                if req.write {
                    debug!("SPI ROM write at {:#x} ignored", req.addr);
                    return Some(0);
                }
                let flash_addr = self.offset.wrapping_add(req.addr & !3) & ADDRESS_MASK;
                if u64::from(self.offset) + u64::from(req.addr) >= u64::from(self.end) {
                    debug!(
                        "SPI ROM read at {:#x} is past the program window ({:#x}..{:#x})",
                        req.addr, self.offset, self.end
                    );
                }
                self.flash.set_select(true);
                self.shift = (u32::from(CMD_READ) << 24) | flash_addr;
                self.count = 32;
                self.active = Some(*req);
                trace!("SPI read {:#08x}", flash_addr);
                self.state = SpiState::Tx;
                None
            }
            SpiState::Tx => {
                self.shift_out();
                self.count -= 1;
                if self.count == 0 {
                    self.data = 0;
                    self.state = SpiState::Rx;
                }
                None
            }
            SpiState::Rx => {
                let bit = self.flash.clock(false);
                let pos = (self.count / 8) * 8 + (7 - self.count % 8);
                self.data |= u32::from(bit) << pos;
                self.count += 1;
                if self.count < 32 {
                    return None;
                }
                self.flash.set_select(false);
                trace!("SPI word {:#010x}", self.data);
                self.state = SpiState::Waiting;
                let served = self.active.take();
                match request {
                    Some(req) if served.as_ref() == Some(req) => {
                        self.held = Some(*req);
                        Some(self.data >> (req.byte_offset() * 8))
                    }
                    _ => {
                        debug!(
                            "SPI read of {:#x} no longer requested",
                            served.map_or(0, |r| r.addr)
                        );
                        None
                    }
                }
            }
        }
    }

    fn reset(&mut self) {
        self.flash.set_select(false);
        self.state = SpiState::Reset;
        self.shift = 0;
        self.data = 0;
        self.count = 0;
        self.active = None;
        self.held = None;
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "state": self.state,
            "selected": self.flash.is_selected(),
            "powered": self.flash.is_powered(),
        })
    }
}
