// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Combinational integer unit.
//!
//! Function codes follow the RV32I encoding: the low three bits are the
//! instruction's `funct3`, bit 3 selects the subtract / arithmetic-shift
//! variant. There is no left shifter; callers bit-reverse the operand and
//! the result around [`SRL`] (see [`shift_left`]).

pub const ADD: u8 = 0b0000;
pub const SUB: u8 = 0b1000;
pub const SLT: u8 = 0b0010;
pub const SLTU: u8 = 0b0011;
pub const XOR: u8 = 0b0100;
pub const OR: u8 = 0b0110;
pub const AND: u8 = 0b0111;
pub const SRL: u8 = 0b0101;
pub const SRA: u8 = 0b1101;

/// Evaluates `a <f> b`. Codes outside the table fall back to AND.
pub fn evaluate(a: u32, b: u32, f: u8) -> u32 {
    let variant = f & 0b1000 != 0;
    match f & 0b111 {
        0b000 if variant => a.wrapping_sub(b),
        0b000 => a.wrapping_add(b),
        0b010 => ((a as i32) < (b as i32)) as u32,
        0b011 => (a < b) as u32,
        0b100 => a ^ b,
        0b110 => a | b,
        0b101 if variant => ((a as i32) >> (b & 0x1F)) as u32,
        0b101 => a >> (b & 0x1F),
        _ => a & b,
    }
}

/// Logical left shift built from the right shifter.
pub fn shift_left(a: u32, amount: u32) -> u32 {
    evaluate(a.reverse_bits(), amount, SRL).reverse_bits()
}
