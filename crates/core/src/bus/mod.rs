// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Wishbone-style bus fabric.
//!
//! Each master drives at most one [`BusRequest`] per cycle and holds it until
//! acknowledged. Per-master [`AddressDecoder`]s route requests to the boot
//! storage, RAM or a peripheral; boot storage and RAM are shared by both
//! masters and sit behind an [`Arbiter`].

pub mod arbiter;
pub mod decoder;

pub use arbiter::Arbiter;
pub use decoder::{AddressDecoder, Route};

use crate::memory::Ram;
use crate::{Bus, Peripheral, SimResult};
use bitflags::bitflags;
use serde::Serialize;
use tracing::{debug, warn};

/// Arbiter priority order: the data bus wins contention.
pub const DATA_MASTER: usize = 0;
pub const INSTRUCTION_MASTER: usize = 1;
const MASTERS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Width {
    Byte,
    Half,
    Word,
}

impl Width {
    /// Access width from the low bits of a load/store `funct3`.
    pub fn from_funct3(funct3: u8) -> Self {
        match funct3 & 0b11 {
            0 => Width::Byte,
            1 => Width::Half,
            _ => Width::Word,
        }
    }
}

/// One bus transaction as presented by a master (cyc/stb asserted).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusRequest {
    pub addr: u32,
    /// Write data, right-aligned; targets place it at `addr & 3`.
    pub data: u32,
    pub width: Width,
    pub write: bool,
}

impl BusRequest {
    pub fn read(addr: u32, width: Width) -> Self {
        Self {
            addr,
            data: 0,
            width,
            write: false,
        }
    }

    pub fn write(addr: u32, data: u32, width: Width) -> Self {
        Self {
            addr,
            data,
            width,
            write: true,
        }
    }

    pub fn byte_offset(&self) -> u32 {
        self.addr & 3
    }

    fn relocated(mut self, addr: u32) -> Self {
        self.addr = addr;
        self
    }
}

bitflags! {
    /// Byte-enable lines of a 32-bit data bus.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ByteLanes: u8 {
        const LANE0 = 0b0001;
        const LANE1 = 0b0010;
        const LANE2 = 0b0100;
        const LANE3 = 0b1000;
    }
}

impl ByteLanes {
    /// Lanes touched by an access of `width` at byte `offset`, or `None`
    /// when the access would spill into the next word.
    pub fn for_access(width: Width, offset: u32) -> Option<Self> {
        let span: u32 = match width {
            Width::Byte => 0b0001,
            Width::Half => 0b0011,
            Width::Word => 0b1111,
        };
        let lanes = span << (offset & 3);
        if lanes > 0b1111 {
            None
        } else {
            Some(Self::from_bits_truncate(lanes as u8))
        }
    }

    pub fn mask(self) -> u32 {
        (0..4)
            .filter(|lane| self.bits() & (1 << lane) != 0)
            .fold(0, |mask, lane| mask | (0xFF << (lane * 8)))
    }
}

/// Merges a write request into `word`. `None` if the access crosses lanes.
pub fn merge_write(word: u32, req: &BusRequest) -> Option<u32> {
    let offset = req.byte_offset();
    let mask = ByteLanes::for_access(req.width, offset)?.mask();
    Some((word & !mask) | ((req.data << (offset * 8)) & mask))
}

/// Acknowledges a request on the second consecutive cycle it is held.
#[derive(Debug, Clone, Default)]
pub struct WaitState {
    pending: Option<BusRequest>,
}

impl WaitState {
    pub fn ready(&mut self, request: Option<&BusRequest>) -> bool {
        match request {
            Some(req) if self.pending.as_ref() == Some(req) => {
                self.pending = None;
                true
            }
            Some(req) => {
                self.pending = Some(*req);
                false
            }
            None => {
                self.pending = None;
                false
            }
        }
    }

    pub fn clear(&mut self) {
        self.pending = None;
    }
}

/// A bus slave clocked once per cycle.
///
/// `request` carries the window-relative address. Returning `Some(data)`
/// is the acknowledge; writes acknowledge with 0.
pub trait Target: std::fmt::Debug + Send {
    fn cycle(&mut self, request: Option<&BusRequest>) -> Option<u32>;

    fn reset(&mut self) {}

    /// Drops any transaction in progress, keeping stored contents.
    fn abort(&mut self) {}

    fn snapshot(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
}

impl<T: Target + ?Sized> Target for Box<T> {
    fn cycle(&mut self, request: Option<&BusRequest>) -> Option<u32> {
        (**self).cycle(request)
    }

    fn reset(&mut self) {
        (**self).reset()
    }

    fn abort(&mut self) {
        (**self).abort()
    }

    fn snapshot(&self) -> serde_json::Value {
        (**self).snapshot()
    }
}

/// Acknowledges seen by each master this cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusAcks {
    pub ibus: Option<u32>,
    pub dbus: Option<u32>,
}

impl BusAcks {
    fn set(&mut self, master: usize, data: u32) {
        if master == DATA_MASTER {
            self.dbus = Some(data);
        } else {
            self.ibus = Some(data);
        }
    }
}

/// Data-bus-only register block with one wait state.
pub struct PeripheralEntry {
    pub name: String,
    pub base: u32,
    pub size: u32,
    pub dev: Box<dyn Peripheral>,
    wait: WaitState,
}

impl std::fmt::Debug for PeripheralEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeripheralEntry")
            .field("name", &self.name)
            .field("base", &format_args!("{:#010x}", self.base))
            .field("size", &self.size)
            .finish()
    }
}

impl PeripheralEntry {
    pub fn new(name: &str, base: u32, size: u32, dev: Box<dyn Peripheral>) -> Self {
        Self {
            name: name.to_string(),
            base,
            size,
            dev,
            wait: WaitState::default(),
        }
    }

    fn cycle(&mut self, request: Option<&BusRequest>) -> Option<u32> {
        if !self.wait.ready(request) {
            return None;
        }
        let req = request?;
        let aligned = req.addr & !3;
        let offset = req.byte_offset();

        if req.write {
            let Some(lanes) = ByteLanes::for_access(req.width, offset) else {
                warn!(
                    "{}: {:?} write at +{:#x} crosses a word boundary, dropped",
                    self.name, req.width, req.addr
                );
                return Some(0);
            };
            for lane in (0..4u32).filter(|l| lanes.bits() & (1 << l) != 0) {
                let byte = (req.data >> ((lane - offset) * 8)) as u8;
                if let Err(e) = self.dev.write(u64::from(aligned + lane), byte) {
                    warn!("{}: {}", self.name, e);
                }
            }
            Some(0)
        } else {
            let mut word = 0u32;
            for lane in 0..4u32 {
                let byte = self.dev.read(u64::from(aligned + lane)).unwrap_or_else(|e| {
                    warn!("{}: {}", self.name, e);
                    0
                });
                word |= u32::from(byte) << (lane * 8);
            }
            Some(word >> (offset * 8))
        }
    }
}

/// The SoC interconnect: boot storage, RAM and peripherals behind two
/// address decoders.
#[derive(Debug)]
pub struct SystemBus {
    pub boot: Arbiter<Box<dyn Target>>,
    pub ram: Arbiter<Ram>,
    pub peripherals: Vec<PeripheralEntry>,
    ibus_map: AddressDecoder,
    dbus_map: AddressDecoder,
}

impl SystemBus {
    /// Builds a fabric with boot storage and RAM mapped on both buses.
    pub fn new(boot: Box<dyn Target>, ram: Ram) -> SimResult<Self> {
        let mut ibus_map = AddressDecoder::new();
        let mut dbus_map = AddressDecoder::new();
        for map in [&mut ibus_map, &mut dbus_map] {
            map.add(decoder::ROM_BASE, decoder::ROM_WINDOW, Route::Boot)?;
            map.add(decoder::RAM_BASE, decoder::RAM_WINDOW, Route::Ram)?;
        }
        Ok(Self {
            boot: Arbiter::new(boot),
            ram: Arbiter::new(ram),
            peripherals: Vec::new(),
            ibus_map,
            dbus_map,
        })
    }

    /// Maps a peripheral on the data bus.
    pub fn add_peripheral(
        &mut self,
        name: &str,
        base: u32,
        size: u32,
        dev: Box<dyn Peripheral>,
    ) -> SimResult<()> {
        let index = self.peripherals.len();
        self.dbus_map.add(base, size, Route::Peripheral(index))?;
        self.peripherals
            .push(PeripheralEntry::new(name, base, size, dev));
        Ok(())
    }

    pub fn reset(&mut self) {
        self.boot.reset();
        self.ram.reset();
        for p in &mut self.peripherals {
            p.wait.clear();
            p.dev.reset();
        }
    }

    /// Abandons every in-flight transaction. Boot storage restarts from
    /// reset; RAM and peripheral contents are kept.
    pub fn abort_transactions(&mut self) {
        self.boot.reset();
        self.ram.release();
        for p in &mut self.peripherals {
            p.wait.clear();
        }
    }

    pub fn peripheral(&self, name: &str) -> Option<&PeripheralEntry> {
        self.peripherals.iter().find(|p| p.name == name)
    }

    pub fn peripheral_mut(&mut self, name: &str) -> Option<&mut PeripheralEntry> {
        self.peripherals.iter_mut().find(|p| p.name == name)
    }

    /// Reads a RAM word by absolute address without bus timing.
    pub fn peek_ram_word(&self, addr: u32) -> Option<u32> {
        let offset = addr.checked_sub(decoder::RAM_BASE)?;
        self.ram.target().peek(offset)
    }

    pub fn ibus_map(&self) -> &AddressDecoder {
        &self.ibus_map
    }

    pub fn dbus_map(&self) -> &AddressDecoder {
        &self.dbus_map
    }
}

impl Bus for SystemBus {
    fn cycle(&mut self, ibus: Option<&BusRequest>, dbus: Option<&BusRequest>) -> BusAcks {
        let mut acks = BusAcks::default();
        let mut boot_reqs: [Option<BusRequest>; MASTERS] = [None; MASTERS];
        let mut ram_reqs: [Option<BusRequest>; MASTERS] = [None; MASTERS];
        let mut periph_req: Option<(usize, BusRequest)> = None;

        let routed = [
            (DATA_MASTER, dbus, &self.dbus_map),
            (INSTRUCTION_MASTER, ibus, &self.ibus_map),
        ];
        for (master, req, map) in routed {
            let Some(req) = req else {
                continue;
            };
            match map.resolve(req.addr) {
                Some((Route::Boot, offset)) => boot_reqs[master] = Some(req.relocated(offset)),
                Some((Route::Ram, offset)) => ram_reqs[master] = Some(req.relocated(offset)),
                Some((Route::Peripheral(index), offset)) => {
                    periph_req = Some((index, req.relocated(offset)))
                }
                None => {
                    warn!(
                        "Unmapped {} access at {:#010x} (master {}), acknowledging with 0",
                        if req.write { "write" } else { "read" },
                        req.addr,
                        master
                    );
                    acks.set(master, 0);
                }
            }
        }

        if let Some((master, data)) = self.boot.cycle(&boot_reqs) {
            acks.set(master, data);
        }
        if let Some((master, data)) = self.ram.cycle(&ram_reqs) {
            acks.set(master, data);
        }
        for (index, entry) in self.peripherals.iter_mut().enumerate() {
            entry.dev.tick();
            let req = periph_req
                .filter(|(target, _)| *target == index)
                .map(|(_, r)| r);
            if let Some(data) = entry.cycle(req.as_ref()) {
                debug!("{} acknowledged with {:#010x}", entry.name, data);
                acks.dbus = Some(data);
            }
        }

        acks
    }
}
