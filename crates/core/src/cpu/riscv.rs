// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::{Retirement, TickReport, TrapCause, TrapEvent};
use crate::alu;
use crate::bus::{BusRequest, Width};
use crate::csr::{self, CsrFile, MCAUSE, MEPC, MSTATUS, MTVAL};
use crate::decoder::riscv::{decode_rv32, Instruction, Operand};
use crate::snapshot::CpuSnapshot;
use crate::{Bus, Cpu};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

/// Decode policies. Both default to the safe interpretation of the ISA.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreConfig {
    /// Unrecognised words raise an illegal-instruction trap instead of
    /// retiring as no-ops.
    pub strict_decode: bool,
    /// CSR instructions naming an unimplemented register trap.
    pub strict_csr: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            strict_decode: true,
            strict_csr: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Fetching,
    Executing,
    MemoryPending,
}

#[derive(Debug, Clone, Default)]
pub struct RegisterFile {
    x: [u32; 32],
}

impl RegisterFile {
    pub fn read(&self, n: u8) -> u32 {
        if n == 0 {
            0
        } else {
            self.x[(n & 0x1F) as usize]
        }
    }

    pub fn write(&mut self, n: u8, val: u32) {
        if n != 0 {
            self.x[(n & 0x1F) as usize] = val;
        }
    }

    pub fn values(&self) -> [u32; 32] {
        self.x
    }

    pub fn clear(&mut self) {
        self.x = [0; 32];
    }
}

enum Outcome {
    Jump(u32),
    Trap(TrapCause),
    Wait,
}

/// Multi-cycle RV32I core.
///
/// One instruction is in flight at a time: it is fetched over the
/// instruction bus, executed in the following cycle and, for loads and
/// stores, held until the data bus acknowledges.
#[derive(Debug, Clone)]
pub struct RiscV {
    pub regs: RegisterFile,
    pub pc: u32,
    prev_pc: u32,
    pub phase: Phase,
    pub ir: u32,
    pub csr: CsrFile,
    retired: u64,
    config: CoreConfig,
}

impl Default for RiscV {
    fn default() -> Self {
        Self::new()
    }
}

fn misaligned(addr: u32, width: Width) -> bool {
    match width {
        Width::Byte => false,
        Width::Half => addr & 3 == 3,
        Width::Word => addr & 3 != 0,
    }
}

fn load_value(funct3: u8, data: u32) -> u32 {
    let unsigned = funct3 & 0b100 != 0;
    match Width::from_funct3(funct3) {
        Width::Byte if unsigned => data & 0xFF,
        Width::Byte => data as u8 as i8 as i32 as u32,
        Width::Half if unsigned => data & 0xFFFF,
        Width::Half => data as u16 as i16 as i32 as u32,
        Width::Word => data,
    }
}

impl RiscV {
    pub fn new() -> Self {
        Self::with_config(CoreConfig::default())
    }

    pub fn with_config(config: CoreConfig) -> Self {
        Self {
            regs: RegisterFile::default(),
            pc: 0,
            prev_pc: 0,
            phase: Phase::Fetching,
            ir: 0,
            csr: CsrFile::new(),
            retired: 0,
            config,
        }
    }

    pub fn config(&self) -> CoreConfig {
        self.config
    }

    fn fetch_request(&self) -> Option<BusRequest> {
        (self.phase == Phase::Fetching && self.pc & 3 == 0)
            .then(|| BusRequest::read(self.pc, Width::Word))
    }

    /// Data bus request of the instruction in IR, if it is an aligned
    /// load or store.
    fn memory_request(&self) -> Option<BusRequest> {
        match decode_rv32(self.ir) {
            Instruction::Load {
                funct3, rs1, imm, ..
            } => {
                let addr = self.regs.read(rs1).wrapping_add(imm as u32);
                let width = Width::from_funct3(funct3);
                (!misaligned(addr, width)).then(|| BusRequest::read(addr, width))
            }
            Instruction::Store {
                funct3,
                rs1,
                rs2,
                imm,
            } => {
                let addr = self.regs.read(rs1).wrapping_add(imm as u32);
                let width = Width::from_funct3(funct3);
                (!misaligned(addr, width))
                    .then(|| BusRequest::write(addr, self.regs.read(rs2), width))
            }
            _ => None,
        }
    }

    fn enter_trap(&mut self, cause: TrapCause, epc: u32) -> TrapEvent {
        self.csr.set_field(MCAUSE, "interrupt", 0);
        self.csr.set_field(MCAUSE, "ecode", cause.code());
        self.csr.set_field(MEPC, "mepc", epc >> 2);
        self.csr.set_field(MSTATUS, "mie", 0);
        self.pc = self.csr.trap_vector(cause.code());
        self.phase = Phase::Fetching;
        debug!(
            "Trap {} at {:#010x}, vectoring to {:#010x}",
            cause, epc, self.pc
        );
        TrapEvent { cause, epc }
    }

    fn retire(&mut self, pc: u32, word: u32) -> Retirement {
        self.retired += 1;
        self.phase = Phase::Fetching;
        trace!("Retired {:#010x}: {:#010x}", pc, word);
        Retirement { pc, word }
    }

    fn fetch(&mut self, ack: Option<u32>) -> TickReport {
        if self.pc & 3 != 0 {
            self.csr.set_field(MTVAL, "einfo", self.pc);
            let trap = self.enter_trap(TrapCause::InstructionMisaligned, self.prev_pc);
            return TickReport {
                retired: None,
                trap: Some(trap),
            };
        }
        if let Some(word) = ack {
            self.ir = word;
            self.csr.increment_instret();
            self.phase = Phase::Executing;
        }
        TickReport::default()
    }

    fn execute(&mut self, dbus_ack: Option<u32>) -> TickReport {
        let pc = self.pc;
        let word = self.ir;
        let next = pc.wrapping_add(4);

        let outcome = match decode_rv32(word) {
            Instruction::Lui { rd, imm } => {
                self.regs.write(rd, imm);
                Outcome::Jump(next)
            }
            Instruction::Auipc { rd, imm } => {
                self.regs.write(rd, pc.wrapping_add(imm));
                Outcome::Jump(next)
            }
            Instruction::Jal { rd, imm } => {
                self.regs.write(rd, next);
                Outcome::Jump(pc.wrapping_add(imm as u32))
            }
            Instruction::Jalr { rd, rs1, imm } => {
                let target = self.regs.read(rs1).wrapping_add(imm as u32) & !1;
                self.regs.write(rd, next);
                Outcome::Jump(target)
            }
            Instruction::Branch {
                funct3,
                rs1,
                rs2,
                imm,
            } => {
                let f = if funct3 & 0b100 != 0 {
                    0b0010 | ((funct3 >> 1) & 1)
                } else {
                    alu::SUB
                };
                let y = alu::evaluate(self.regs.read(rs1), self.regs.read(rs2), f);
                let taken = ((y == 0) ^ (funct3 & 1 != 0)) != (funct3 & 0b100 != 0);
                Outcome::Jump(if taken {
                    pc.wrapping_add(imm as u32)
                } else {
                    next
                })
            }
            Instruction::Load {
                funct3,
                rd,
                rs1,
                imm,
            } => {
                let addr = self.regs.read(rs1).wrapping_add(imm as u32);
                if misaligned(addr, Width::from_funct3(funct3)) {
                    self.csr.set_field(MTVAL, "einfo", addr);
                    Outcome::Trap(TrapCause::LoadMisaligned)
                } else if let Some(data) = dbus_ack {
                    self.regs.write(rd, load_value(funct3, data));
                    Outcome::Jump(next)
                } else {
                    Outcome::Wait
                }
            }
            Instruction::Store {
                funct3, rs1, imm, ..
            } => {
                let addr = self.regs.read(rs1).wrapping_add(imm as u32);
                if misaligned(addr, Width::from_funct3(funct3)) {
                    self.csr.set_field(MTVAL, "einfo", addr);
                    Outcome::Trap(TrapCause::StoreMisaligned)
                } else if dbus_ack.is_some() {
                    Outcome::Jump(next)
                } else {
                    Outcome::Wait
                }
            }
            Instruction::Op {
                f,
                rd,
                rs1,
                rhs,
                shift_left,
            } => {
                let a = self.regs.read(rs1);
                let b = match rhs {
                    Operand::Reg(r) => self.regs.read(r),
                    Operand::Imm(v) => v,
                };
                let y = if shift_left {
                    alu::shift_left(a, b)
                } else {
                    alu::evaluate(a, b, f)
                };
                self.regs.write(rd, y);
                Outcome::Jump(next)
            }
            Instruction::Csr {
                funct3,
                rd,
                src,
                csr: address,
            } => {
                if self.config.strict_csr && !self.csr.is_defined(address) {
                    self.csr.set_field(MTVAL, "einfo", word);
                    Outcome::Trap(TrapCause::IllegalInstruction)
                } else {
                    let operand = match src {
                        Operand::Reg(r) => self.regs.read(r),
                        Operand::Imm(v) => v,
                    };
                    let old = self.csr.read(address);
                    let op = funct3 & 0b11;
                    let value = csr::compute_write_value(op, old, operand);
                    self.regs.write(rd, old);
                    // Set/clear with a zero operand are pure reads.
                    self.csr.commit(address, value, op == 0b01 || operand != 0);
                    Outcome::Jump(next)
                }
            }
            Instruction::Ecall => Outcome::Trap(TrapCause::EnvironmentCall),
            Instruction::Ebreak => Outcome::Trap(TrapCause::Breakpoint),
            Instruction::Mret => {
                self.csr.set_field(MSTATUS, "mie", 1);
                Outcome::Jump(self.csr.read(MEPC))
            }
            Instruction::Wfi | Instruction::Fence => Outcome::Jump(next),
            Instruction::Illegal(raw) => {
                if self.config.strict_decode {
                    self.csr.set_field(MTVAL, "einfo", raw);
                    Outcome::Trap(TrapCause::IllegalInstruction)
                } else {
                    warn!("Illegal instruction {:#010x} at {:#010x} ignored", raw, pc);
                    Outcome::Jump(next)
                }
            }
        };

        match outcome {
            Outcome::Jump(target) => {
                self.pc = target;
                TickReport {
                    retired: Some(self.retire(pc, word)),
                    trap: None,
                }
            }
            Outcome::Trap(cause) => {
                let retired = self.retire(pc, word);
                let trap = self.enter_trap(cause, pc);
                TickReport {
                    retired: Some(retired),
                    trap: Some(trap),
                }
            }
            Outcome::Wait => {
                self.phase = Phase::MemoryPending;
                TickReport::default()
            }
        }
    }

    fn complete_memory(&mut self, data: u32) -> TickReport {
        let pc = self.pc;
        let word = self.ir;
        if let Instruction::Load { funct3, rd, .. } = decode_rv32(word) {
            self.regs.write(rd, load_value(funct3, data));
        }
        self.pc = pc.wrapping_add(4);
        TickReport {
            retired: Some(self.retire(pc, word)),
            trap: None,
        }
    }
}

impl Cpu for RiscV {
    fn reset(&mut self) {
        self.regs.clear();
        self.pc = 0;
        self.prev_pc = 0;
        self.phase = Phase::Fetching;
        self.ir = 0;
        self.csr.reset();
        self.retired = 0;
    }

    fn tick(&mut self, bus: &mut dyn Bus) -> TickReport {
        let ibus = self.fetch_request();
        let dbus = match self.phase {
            Phase::Fetching => None,
            Phase::Executing | Phase::MemoryPending => self.memory_request(),
        };
        let acks = bus.cycle(ibus.as_ref(), dbus.as_ref());

        let pc = self.pc;
        let report = match self.phase {
            Phase::Fetching => self.fetch(acks.ibus),
            Phase::Executing => self.execute(acks.dbus),
            Phase::MemoryPending => match acks.dbus {
                Some(data) => self.complete_memory(data),
                None => TickReport::default(),
            },
        };
        self.prev_pc = pc;
        report
    }

    fn retired(&self) -> u64 {
        self.retired
    }

    fn set_pc(&mut self, val: u32) {
        self.pc = val;
    }

    fn get_pc(&self) -> u32 {
        self.pc
    }

    fn get_register(&self, id: u8) -> u32 {
        if id < 32 {
            self.regs.read(id)
        } else if id == 32 {
            self.pc
        } else {
            0
        }
    }

    fn set_register(&mut self, id: u8, val: u32) {
        if id < 32 {
            self.regs.write(id, val);
        } else if id == 32 {
            self.pc = val;
        }
    }

    fn read_csr(&self, address: u16) -> u32 {
        self.csr.read(address)
    }

    fn snapshot(&self) -> CpuSnapshot {
        CpuSnapshot {
            registers: self.regs.values().to_vec(),
            pc: self.pc,
            phase: self.phase,
            ir: self.ir,
            retired: self.retired,
            csrs: self.csr.values(),
        }
    }

    fn apply_snapshot(&mut self, snapshot: &CpuSnapshot) {
        for (i, &val) in snapshot.registers.iter().enumerate().take(32) {
            self.regs.write(i as u8, val);
        }
        self.pc = snapshot.pc;
        self.prev_pc = snapshot.pc;
        self.phase = snapshot.phase;
        self.ir = snapshot.ir;
        self.retired = snapshot.retired;
        for csr in &snapshot.csrs {
            self.csr.commit(csr.address, csr.value, true);
        }
    }

    fn get_register_names(&self) -> Vec<String> {
        let mut names: Vec<String> = (0..32).map(|i| format!("x{}", i)).collect();
        names.push("pc".to_string());
        names
    }
}
