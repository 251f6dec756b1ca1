// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Machine-mode control and status registers.
//!
//! Registers are described by a static table of field descriptors. Reads
//! assemble a word from the fields, writes only land in read-write fields,
//! and bits outside every field read as zero.

use serde::{Deserialize, Serialize};

pub const MSTATUS: u16 = 0x300;
pub const MTVEC: u16 = 0x305;
pub const MEPC: u16 = 0x341;
pub const MCAUSE: u16 = 0x342;
pub const MTVAL: u16 = 0x343;
pub const MINSTRET: u16 = 0xB02;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadWrite,
    /// Always reads as the given value; writes are dropped.
    ReadOnlyConst(u32),
    /// Software writes are dropped; hardware updates are still visible.
    WriteIgnored,
}

#[derive(Debug, Clone, Copy)]
pub struct CsrField {
    pub name: &'static str,
    pub lsb: u8,
    pub msb: u8,
    pub access: Access,
}

impl CsrField {
    const fn new(name: &'static str, lsb: u8, msb: u8, access: Access) -> Self {
        Self {
            name,
            lsb,
            msb,
            access,
        }
    }

    /// Mask of the field's bits once shifted down to bit 0.
    pub fn width_mask(&self) -> u32 {
        let width = u32::from(self.msb - self.lsb) + 1;
        if width >= 32 {
            u32::MAX
        } else {
            (1 << width) - 1
        }
    }

    pub fn mask(&self) -> u32 {
        self.width_mask() << self.lsb
    }
}

#[derive(Debug)]
pub struct CsrDescriptor {
    pub name: &'static str,
    pub address: u16,
    pub fields: &'static [CsrField],
}

pub static REGISTRY: &[CsrDescriptor] = &[
    CsrDescriptor {
        name: "minstret",
        address: MINSTRET,
        fields: &[CsrField::new("instrs", 0, 15, Access::ReadWrite)],
    },
    CsrDescriptor {
        name: "mstatus",
        address: MSTATUS,
        fields: &[
            CsrField::new("mie", 3, 3, Access::ReadWrite),
            CsrField::new("mpie", 7, 7, Access::ReadOnlyConst(0)),
        ],
    },
    CsrDescriptor {
        name: "mcause",
        address: MCAUSE,
        fields: &[
            CsrField::new("ecode", 0, 30, Access::ReadWrite),
            CsrField::new("interrupt", 31, 31, Access::ReadWrite),
        ],
    },
    CsrDescriptor {
        name: "mtval",
        address: MTVAL,
        fields: &[CsrField::new("einfo", 0, 31, Access::ReadWrite)],
    },
    CsrDescriptor {
        name: "mtvec",
        address: MTVEC,
        fields: &[
            CsrField::new("mode", 0, 0, Access::ReadWrite),
            CsrField::new("base", 2, 31, Access::ReadWrite),
        ],
    },
    CsrDescriptor {
        name: "mepc",
        address: MEPC,
        fields: &[CsrField::new("mepc", 2, 31, Access::ReadWrite)],
    },
];

/// Result of the write-value function for `funct3[1:0]`.
///
/// `01` replaces, `10` sets and `11` clears the operand's bits. Set and
/// clear with a zero operand, and `00`, leave the current value untouched.
pub fn compute_write_value(f: u8, read: u32, operand: u32) -> u32 {
    match f & 0b11 {
        0b01 => operand,
        0b10 if operand != 0 => operand | read,
        0b11 if operand != 0 => !operand & read,
        _ => read,
    }
}

/// Register storage backed by a descriptor table.
#[derive(Debug, Clone)]
pub struct CsrFile {
    registry: &'static [CsrDescriptor],
    raw: Vec<u32>,
}

impl Default for CsrFile {
    fn default() -> Self {
        Self::new()
    }
}

impl CsrFile {
    pub fn new() -> Self {
        Self::with_registry(REGISTRY)
    }

    pub fn with_registry(registry: &'static [CsrDescriptor]) -> Self {
        Self {
            registry,
            raw: vec![0; registry.len()],
        }
    }

    pub fn reset(&mut self) {
        self.raw.iter_mut().for_each(|r| *r = 0);
    }

    fn index_of(&self, address: u16) -> Option<usize> {
        self.registry.iter().position(|d| d.address == address)
    }

    pub fn is_defined(&self, address: u16) -> bool {
        self.index_of(address).is_some()
    }

    pub fn descriptor(&self, address: u16) -> Option<&'static CsrDescriptor> {
        self.registry.iter().find(|d| d.address == address)
    }

    pub fn read(&self, address: u16) -> u32 {
        let Some(idx) = self.index_of(address) else {
            return 0;
        };
        let raw = self.raw[idx];
        self.registry[idx]
            .fields
            .iter()
            .fold(0, |word, field| match field.access {
                Access::ReadOnlyConst(v) => word | ((v & field.width_mask()) << field.lsb),
                Access::ReadWrite | Access::WriteIgnored => word | (raw & field.mask()),
            })
    }

    /// Applies `value` to the read-write fields of `address`. Unknown
    /// addresses and disabled writes are dropped.
    pub fn commit(&mut self, address: u16, value: u32, write_enabled: bool) {
        if !write_enabled {
            return;
        }
        let Some(idx) = self.index_of(address) else {
            tracing::warn!("Write to unimplemented CSR {:#05x} discarded", address);
            return;
        };
        let writable = self.registry[idx]
            .fields
            .iter()
            .filter(|f| f.access == Access::ReadWrite)
            .fold(0u32, |m, f| m | f.mask());
        let raw = &mut self.raw[idx];
        *raw = (*raw & !writable) | (value & writable);
    }

    /// Hardware-side field update; bypasses everything except constants.
    pub fn set_field(&mut self, address: u16, name: &str, value: u32) {
        let Some(idx) = self.index_of(address) else {
            return;
        };
        if let Some(field) = self.registry[idx].fields.iter().find(|f| f.name == name) {
            if matches!(field.access, Access::ReadOnlyConst(_)) {
                return;
            }
            let raw = &mut self.raw[idx];
            *raw = (*raw & !field.mask()) | ((value & field.width_mask()) << field.lsb);
        }
    }

    pub fn field(&self, address: u16, name: &str) -> u32 {
        self.descriptor(address)
            .and_then(|d| d.fields.iter().find(|f| f.name == name))
            .map(|f| (self.read(address) >> f.lsb) & f.width_mask())
            .unwrap_or(0)
    }

    pub fn increment_instret(&mut self) {
        let count = self.field(MINSTRET, "instrs");
        self.set_field(MINSTRET, "instrs", count.wrapping_add(1));
    }

    /// Handler address for trap `code`: direct mode jumps to the base,
    /// vectored mode adds one word per cause.
    pub fn trap_vector(&self, code: u32) -> u32 {
        let base = self.field(MTVEC, "base");
        let offset = if self.field(MTVEC, "mode") != 0 {
            code
        } else {
            0
        };
        base.wrapping_add(offset) << 2
    }

    pub fn values(&self) -> Vec<CsrValue> {
        self.registry
            .iter()
            .map(|d| CsrValue {
                name: d.name.to_string(),
                address: d.address,
                value: self.read(d.address),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsrValue {
    pub name: String,
    pub address: u16,
    pub value: u32,
}
