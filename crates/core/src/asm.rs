// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Minimal RV32I encoder for building test and bring-up images.
//!
//! Register arguments follow assembler order (`rd`, `rs1`, `rs2`). Stores
//! take the base register first: `sw(rs1, rs2, imm)` is `sw rs2, imm(rs1)`.
//! Branch and jump offsets are byte offsets.

use crate::decoder::riscv::{
    IMM_EBREAK, IMM_ECALL, IMM_MRET, IMM_WFI, OP_AUIPC, OP_BRANCH, OP_FENCE, OP_IMM, OP_JAL,
    OP_JALR, OP_LOAD, OP_LUI, OP_REG, OP_STORE, OP_SYSTEM,
};

pub fn r_type(opcode: u32, funct3: u32, funct7: u32, rd: u8, rs1: u8, rs2: u8) -> u32 {
    (opcode & 0x7F)
        | ((rd as u32 & 0x1F) << 7)
        | ((funct3 & 0x7) << 12)
        | ((rs1 as u32 & 0x1F) << 15)
        | ((rs2 as u32 & 0x1F) << 20)
        | ((funct7 & 0x7F) << 25)
}

pub fn i_type(opcode: u32, funct3: u32, rd: u8, rs1: u8, imm: i32) -> u32 {
    (opcode & 0x7F)
        | ((rd as u32 & 0x1F) << 7)
        | ((funct3 & 0x7) << 12)
        | ((rs1 as u32 & 0x1F) << 15)
        | ((imm as u32 & 0xFFF) << 20)
}

pub fn s_type(funct3: u32, rs1: u8, rs2: u8, imm: i32) -> u32 {
    let imm = imm as u32;
    OP_STORE
        | ((imm & 0x1F) << 7)
        | ((funct3 & 0x7) << 12)
        | ((rs1 as u32 & 0x1F) << 15)
        | ((rs2 as u32 & 0x1F) << 20)
        | (((imm >> 5) & 0x7F) << 25)
}

pub fn b_type(funct3: u32, rs1: u8, rs2: u8, offset: i32) -> u32 {
    let imm = offset as u32;
    OP_BRANCH
        | (((imm >> 11) & 1) << 7)
        | (((imm >> 1) & 0xF) << 8)
        | ((funct3 & 0x7) << 12)
        | ((rs1 as u32 & 0x1F) << 15)
        | ((rs2 as u32 & 0x1F) << 20)
        | (((imm >> 5) & 0x3F) << 25)
        | (((imm >> 12) & 1) << 31)
}

pub fn u_type(opcode: u32, rd: u8, imm20: u32) -> u32 {
    (opcode & 0x7F) | ((rd as u32 & 0x1F) << 7) | ((imm20 & 0xF_FFFF) << 12)
}

pub fn j_type(rd: u8, offset: i32) -> u32 {
    let imm = offset as u32;
    OP_JAL
        | ((rd as u32 & 0x1F) << 7)
        | (((imm >> 12) & 0xFF) << 12)
        | (((imm >> 11) & 1) << 20)
        | (((imm >> 1) & 0x3FF) << 21)
        | (((imm >> 20) & 1) << 31)
}

pub fn lui(rd: u8, imm20: u32) -> u32 {
    u_type(OP_LUI, rd, imm20)
}

pub fn auipc(rd: u8, imm20: u32) -> u32 {
    u_type(OP_AUIPC, rd, imm20)
}

pub fn jal(rd: u8, offset: i32) -> u32 {
    j_type(rd, offset)
}

pub fn jalr(rd: u8, rs1: u8, imm: i32) -> u32 {
    i_type(OP_JALR, 0, rd, rs1, imm)
}

pub fn beq(rs1: u8, rs2: u8, offset: i32) -> u32 {
    b_type(0b000, rs1, rs2, offset)
}

pub fn bne(rs1: u8, rs2: u8, offset: i32) -> u32 {
    b_type(0b001, rs1, rs2, offset)
}

pub fn blt(rs1: u8, rs2: u8, offset: i32) -> u32 {
    b_type(0b100, rs1, rs2, offset)
}

pub fn bge(rs1: u8, rs2: u8, offset: i32) -> u32 {
    b_type(0b101, rs1, rs2, offset)
}

pub fn bltu(rs1: u8, rs2: u8, offset: i32) -> u32 {
    b_type(0b110, rs1, rs2, offset)
}

pub fn bgeu(rs1: u8, rs2: u8, offset: i32) -> u32 {
    b_type(0b111, rs1, rs2, offset)
}

pub fn lb(rd: u8, rs1: u8, imm: i32) -> u32 {
    i_type(OP_LOAD, 0b000, rd, rs1, imm)
}

pub fn lh(rd: u8, rs1: u8, imm: i32) -> u32 {
    i_type(OP_LOAD, 0b001, rd, rs1, imm)
}

pub fn lw(rd: u8, rs1: u8, imm: i32) -> u32 {
    i_type(OP_LOAD, 0b010, rd, rs1, imm)
}

pub fn lbu(rd: u8, rs1: u8, imm: i32) -> u32 {
    i_type(OP_LOAD, 0b100, rd, rs1, imm)
}

pub fn lhu(rd: u8, rs1: u8, imm: i32) -> u32 {
    i_type(OP_LOAD, 0b101, rd, rs1, imm)
}

pub fn sb(rs1: u8, rs2: u8, imm: i32) -> u32 {
    s_type(0b000, rs1, rs2, imm)
}

pub fn sh(rs1: u8, rs2: u8, imm: i32) -> u32 {
    s_type(0b001, rs1, rs2, imm)
}

pub fn sw(rs1: u8, rs2: u8, imm: i32) -> u32 {
    s_type(0b010, rs1, rs2, imm)
}

pub fn addi(rd: u8, rs1: u8, imm: i32) -> u32 {
    i_type(OP_IMM, 0b000, rd, rs1, imm)
}

pub fn slti(rd: u8, rs1: u8, imm: i32) -> u32 {
    i_type(OP_IMM, 0b010, rd, rs1, imm)
}

pub fn sltiu(rd: u8, rs1: u8, imm: i32) -> u32 {
    i_type(OP_IMM, 0b011, rd, rs1, imm)
}

pub fn xori(rd: u8, rs1: u8, imm: i32) -> u32 {
    i_type(OP_IMM, 0b100, rd, rs1, imm)
}

pub fn ori(rd: u8, rs1: u8, imm: i32) -> u32 {
    i_type(OP_IMM, 0b110, rd, rs1, imm)
}

pub fn andi(rd: u8, rs1: u8, imm: i32) -> u32 {
    i_type(OP_IMM, 0b111, rd, rs1, imm)
}

pub fn slli(rd: u8, rs1: u8, shamt: u8) -> u32 {
    i_type(OP_IMM, 0b001, rd, rs1, i32::from(shamt & 0x1F))
}

pub fn srli(rd: u8, rs1: u8, shamt: u8) -> u32 {
    i_type(OP_IMM, 0b101, rd, rs1, i32::from(shamt & 0x1F))
}

pub fn srai(rd: u8, rs1: u8, shamt: u8) -> u32 {
    i_type(OP_IMM, 0b101, rd, rs1, 0x400 | i32::from(shamt & 0x1F))
}

pub fn add(rd: u8, rs1: u8, rs2: u8) -> u32 {
    r_type(OP_REG, 0b000, 0x00, rd, rs1, rs2)
}

pub fn sub(rd: u8, rs1: u8, rs2: u8) -> u32 {
    r_type(OP_REG, 0b000, 0x20, rd, rs1, rs2)
}

pub fn sll(rd: u8, rs1: u8, rs2: u8) -> u32 {
    r_type(OP_REG, 0b001, 0x00, rd, rs1, rs2)
}

pub fn slt(rd: u8, rs1: u8, rs2: u8) -> u32 {
    r_type(OP_REG, 0b010, 0x00, rd, rs1, rs2)
}

pub fn sltu(rd: u8, rs1: u8, rs2: u8) -> u32 {
    r_type(OP_REG, 0b011, 0x00, rd, rs1, rs2)
}

pub fn xor(rd: u8, rs1: u8, rs2: u8) -> u32 {
    r_type(OP_REG, 0b100, 0x00, rd, rs1, rs2)
}

pub fn srl(rd: u8, rs1: u8, rs2: u8) -> u32 {
    r_type(OP_REG, 0b101, 0x00, rd, rs1, rs2)
}

pub fn sra(rd: u8, rs1: u8, rs2: u8) -> u32 {
    r_type(OP_REG, 0b101, 0x20, rd, rs1, rs2)
}

pub fn or(rd: u8, rs1: u8, rs2: u8) -> u32 {
    r_type(OP_REG, 0b110, 0x00, rd, rs1, rs2)
}

pub fn and(rd: u8, rs1: u8, rs2: u8) -> u32 {
    r_type(OP_REG, 0b111, 0x00, rd, rs1, rs2)
}

pub fn fence() -> u32 {
    i_type(OP_FENCE, 0, 0, 0, 0x0FF)
}

fn system(imm: u32) -> u32 {
    OP_SYSTEM | (imm << 20)
}

pub fn ecall() -> u32 {
    system(IMM_ECALL)
}

pub fn ebreak() -> u32 {
    system(IMM_EBREAK)
}

pub fn mret() -> u32 {
    system(IMM_MRET)
}

pub fn wfi() -> u32 {
    system(IMM_WFI)
}

fn csr(funct3: u32, rd: u8, csr: u16, src: u8) -> u32 {
    OP_SYSTEM
        | ((rd as u32 & 0x1F) << 7)
        | ((funct3 & 0x7) << 12)
        | ((src as u32 & 0x1F) << 15)
        | (u32::from(csr & 0xFFF) << 20)
}

pub fn csrrw(rd: u8, address: u16, rs1: u8) -> u32 {
    csr(0b001, rd, address, rs1)
}

pub fn csrrs(rd: u8, address: u16, rs1: u8) -> u32 {
    csr(0b010, rd, address, rs1)
}

pub fn csrrc(rd: u8, address: u16, rs1: u8) -> u32 {
    csr(0b011, rd, address, rs1)
}

pub fn csrrwi(rd: u8, address: u16, uimm: u8) -> u32 {
    csr(0b101, rd, address, uimm)
}

pub fn csrrsi(rd: u8, address: u16, uimm: u8) -> u32 {
    csr(0b110, rd, address, uimm)
}

pub fn csrrci(rd: u8, address: u16, uimm: u8) -> u32 {
    csr(0b111, rd, address, uimm)
}

pub fn nop() -> u32 {
    addi(0, 0, 0)
}

/// `li rd, value` as LUI + ADDI, rounding the upper part when the low
/// twelve bits would sign-extend negative.
pub fn li(rd: u8, value: u32) -> [u32; 2] {
    let upper = value.wrapping_add(0x800) >> 12;
    let lower = (value & 0xFFF) as i32;
    [lui(rd, upper), addi(rd, rd, (lower << 20) >> 20)]
}
