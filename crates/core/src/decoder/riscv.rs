// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::alu;

pub const OP_LUI: u32 = 0b0110111;
pub const OP_AUIPC: u32 = 0b0010111;
pub const OP_JAL: u32 = 0b1101111;
pub const OP_JALR: u32 = 0b1100111;
pub const OP_BRANCH: u32 = 0b1100011;
pub const OP_LOAD: u32 = 0b0000011;
pub const OP_STORE: u32 = 0b0100011;
pub const OP_IMM: u32 = 0b0010011;
pub const OP_REG: u32 = 0b0110011;
pub const OP_FENCE: u32 = 0b0001111;
pub const OP_SYSTEM: u32 = 0b1110011;

pub const IMM_ECALL: u32 = 0x000;
pub const IMM_EBREAK: u32 = 0x001;
pub const IMM_MRET: u32 = 0x302;
pub const IMM_WFI: u32 = 0x105;

/// Second ALU operand source.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Operand {
    Reg(u8),
    Imm(u32),
}

/// RV32I instruction classes. Field values are already extracted and
/// sign-extended; `funct3` is kept where execution depends on it.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Instruction {
    Lui { rd: u8, imm: u32 },
    Auipc { rd: u8, imm: u32 },
    Jal { rd: u8, imm: i32 },
    Jalr { rd: u8, rs1: u8, imm: i32 },
    Branch { funct3: u8, rs1: u8, rs2: u8, imm: i32 },
    Load { funct3: u8, rd: u8, rs1: u8, imm: i32 },
    Store { funct3: u8, rs1: u8, rs2: u8, imm: i32 },
    /// Register-register or register-immediate ALU operation. `shift_left`
    /// routes the operands through the bit-reversed right shifter.
    Op { f: u8, rd: u8, rs1: u8, rhs: Operand, shift_left: bool },
    Csr { funct3: u8, rd: u8, src: Operand, csr: u16 },
    Ecall,
    Ebreak,
    Mret,
    Wfi,
    Fence,
    Illegal(u32),
}

fn i_imm(inst: u32) -> i32 {
    (inst as i32) >> 20
}

fn s_imm(inst: u32) -> i32 {
    // imm[11:5|4:0]
    let imm11_5 = (inst >> 25) & 0x7F;
    let imm4_0 = (inst >> 7) & 0x1F;
    let offset = (imm11_5 << 5) | imm4_0;
    if (imm11_5 >> 6) == 1 {
        (offset as i32) | !0xFFF
    } else {
        offset as i32
    }
}

fn b_imm(inst: u32) -> i32 {
    // imm[12|10:5|4:1|11]
    let imm12 = (inst >> 31) & 1;
    let imm10_5 = (inst >> 25) & 0x3F;
    let imm4_1 = (inst >> 8) & 0xF;
    let imm11 = (inst >> 7) & 1;
    let offset = (imm12 << 12) | (imm11 << 11) | (imm10_5 << 5) | (imm4_1 << 1);
    if imm12 == 1 {
        (offset as i32) | !0x1FFF
    } else {
        offset as i32
    }
}

fn j_imm(inst: u32) -> i32 {
    // imm[20|10:1|11|19:12]
    let imm20 = (inst >> 31) & 1;
    let imm10_1 = (inst >> 21) & 0x3FF;
    let imm11 = (inst >> 20) & 1;
    let imm19_12 = (inst >> 12) & 0xFF;
    let offset = (imm20 << 20) | (imm19_12 << 12) | (imm11 << 11) | (imm10_1 << 1);
    if imm20 == 1 {
        (offset as i32) | !0xFFFFF
    } else {
        offset as i32
    }
}

/// Pure decode of one instruction word.
pub fn decode_rv32(inst: u32) -> Instruction {
    let opcode = inst & 0x7F;
    let rd = ((inst >> 7) & 0x1F) as u8;
    let funct3 = ((inst >> 12) & 0x7) as u8;
    let rs1 = ((inst >> 15) & 0x1F) as u8;
    let rs2 = ((inst >> 20) & 0x1F) as u8;
    let funct7 = ((inst >> 25) & 0x7F) as u8;

    match opcode {
        OP_LUI => Instruction::Lui {
            rd,
            imm: inst & 0xFFFF_F000,
        },
        OP_AUIPC => Instruction::Auipc {
            rd,
            imm: inst & 0xFFFF_F000,
        },
        OP_JAL => Instruction::Jal {
            rd,
            imm: j_imm(inst),
        },
        OP_JALR if funct3 == 0 => Instruction::Jalr {
            rd,
            rs1,
            imm: i_imm(inst),
        },
        OP_BRANCH => match funct3 {
            // 010 and 011 have no branch encoding.
            2 | 3 => Instruction::Illegal(inst),
            _ => Instruction::Branch {
                funct3,
                rs1,
                rs2,
                imm: b_imm(inst),
            },
        },
        OP_LOAD => match funct3 {
            0 | 1 | 2 | 4 | 5 => Instruction::Load {
                funct3,
                rd,
                rs1,
                imm: i_imm(inst),
            },
            _ => Instruction::Illegal(inst),
        },
        OP_STORE => match funct3 {
            0..=2 => Instruction::Store {
                funct3,
                rs1,
                rs2,
                imm: s_imm(inst),
            },
            _ => Instruction::Illegal(inst),
        },
        OP_IMM => {
            let imm = i_imm(inst) as u32;
            match (funct3, funct7) {
                (1, 0x00) => Instruction::Op {
                    f: alu::SRL,
                    rd,
                    rs1,
                    rhs: Operand::Imm(imm & 0x1F),
                    shift_left: true,
                },
                (1, _) => Instruction::Illegal(inst),
                (5, 0x00) | (5, 0x20) => Instruction::Op {
                    // imm[10] picks the arithmetic variant.
                    f: 0b101 | (((imm >> 10) & 1) << 3) as u8,
                    rd,
                    rs1,
                    rhs: Operand::Imm(imm & 0x1F),
                    shift_left: false,
                },
                (5, _) => Instruction::Illegal(inst),
                _ => Instruction::Op {
                    f: funct3,
                    rd,
                    rs1,
                    rhs: Operand::Imm(imm),
                    shift_left: false,
                },
            }
        }
        OP_REG => match (funct3, funct7) {
            (1, 0x00) => Instruction::Op {
                f: alu::SRL,
                rd,
                rs1,
                rhs: Operand::Reg(rs2),
                shift_left: true,
            },
            (_, 0x00) | (0, 0x20) | (5, 0x20) => Instruction::Op {
                f: funct3 | ((funct7 >> 5) << 3),
                rd,
                rs1,
                rhs: Operand::Reg(rs2),
                shift_left: false,
            },
            _ => Instruction::Illegal(inst),
        },
        OP_FENCE => Instruction::Fence,
        OP_SYSTEM => match funct3 {
            0 => match inst >> 20 {
                IMM_ECALL => Instruction::Ecall,
                IMM_EBREAK => Instruction::Ebreak,
                IMM_MRET => Instruction::Mret,
                IMM_WFI => Instruction::Wfi,
                _ => Instruction::Illegal(inst),
            },
            4 => Instruction::Illegal(inst),
            _ => Instruction::Csr {
                funct3,
                rd,
                // CSR immediates are the zero-extended rs1 field.
                src: if funct3 & 0b100 != 0 {
                    Operand::Imm(u32::from(rs1))
                } else {
                    Operand::Reg(rs1)
                },
                csr: (inst >> 20) as u16,
            },
        },
        _ => Instruction::Illegal(inst),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm;

    #[test]
    fn test_decode_upper_immediates() {
        assert_eq!(
            decode_rv32(asm::lui(5, 0xABCDE)),
            Instruction::Lui {
                rd: 5,
                imm: 0xABCD_E000
            }
        );
        assert_eq!(
            decode_rv32(asm::auipc(1, 0x1)),
            Instruction::Auipc { rd: 1, imm: 0x1000 }
        );
    }

    #[test]
    fn test_decode_jumps() {
        assert_eq!(
            decode_rv32(asm::jal(1, 0)),
            Instruction::Jal { rd: 1, imm: 0 }
        );
        assert_eq!(
            decode_rv32(asm::jal(0, -8)),
            Instruction::Jal { rd: 0, imm: -8 }
        );
        assert_eq!(
            decode_rv32(asm::jal(0, 0x000F_FFFE)),
            Instruction::Jal {
                rd: 0,
                imm: 0x000F_FFFE
            }
        );
        assert_eq!(
            decode_rv32(asm::jalr(0, 1, -4)),
            Instruction::Jalr {
                rd: 0,
                rs1: 1,
                imm: -4
            }
        );
    }

    #[test]
    fn test_decode_branch_immediates() {
        // BEQ x1, x2, +8 from the hand-encoded word.
        assert_eq!(
            decode_rv32(0x0020_8463),
            Instruction::Branch {
                funct3: 0,
                rs1: 1,
                rs2: 2,
                imm: 8
            }
        );
        assert_eq!(
            decode_rv32(asm::bgeu(3, 4, -4096)),
            Instruction::Branch {
                funct3: 7,
                rs1: 3,
                rs2: 4,
                imm: -4096
            }
        );
        assert_eq!(decode_rv32(0x0020_a463), Instruction::Illegal(0x0020_a463));
    }

    #[test]
    fn test_decode_memory() {
        assert_eq!(
            decode_rv32(asm::lhu(7, 2, -1)),
            Instruction::Load {
                funct3: 5,
                rd: 7,
                rs1: 2,
                imm: -1
            }
        );
        assert_eq!(
            decode_rv32(asm::sw(2, 9, -2048)),
            Instruction::Store {
                funct3: 2,
                rs1: 2,
                rs2: 9,
                imm: -2048
            }
        );
        assert_eq!(
            decode_rv32(asm::sb(2, 9, 2047)),
            Instruction::Store {
                funct3: 0,
                rs1: 2,
                rs2: 9,
                imm: 2047
            }
        );
        // LD (funct3 = 011) is RV64 only.
        let ld = asm::i_type(OP_LOAD, 3, 1, 2, 0);
        assert_eq!(decode_rv32(ld), Instruction::Illegal(ld));
    }

    #[test]
    fn test_decode_alu_function_codes() {
        assert_eq!(
            decode_rv32(asm::sub(3, 1, 2)),
            Instruction::Op {
                f: alu::SUB,
                rd: 3,
                rs1: 1,
                rhs: Operand::Reg(2),
                shift_left: false
            }
        );
        assert_eq!(
            decode_rv32(asm::srai(3, 1, 4)),
            Instruction::Op {
                f: alu::SRA,
                rd: 3,
                rs1: 1,
                rhs: Operand::Imm(4),
                shift_left: false
            }
        );
        assert_eq!(
            decode_rv32(asm::slli(8, 7, 15)),
            Instruction::Op {
                f: alu::SRL,
                rd: 8,
                rs1: 7,
                rhs: Operand::Imm(15),
                shift_left: true
            }
        );
        assert_eq!(
            decode_rv32(asm::sltiu(1, 2, -1)),
            Instruction::Op {
                f: alu::SLTU,
                rd: 1,
                rs1: 2,
                rhs: Operand::Imm(0xFFFF_FFFF),
                shift_left: false
            }
        );
        // funct7 = 0x20 is only defined for SUB and SRA.
        let bad = asm::r_type(OP_REG, 7, 0x20, 1, 2, 3);
        assert_eq!(decode_rv32(bad), Instruction::Illegal(bad));
        // RV32M MUL is not part of the base ISA.
        let mul = asm::r_type(OP_REG, 0, 0x01, 1, 2, 3);
        assert_eq!(decode_rv32(mul), Instruction::Illegal(mul));
    }

    #[test]
    fn test_decode_system() {
        assert_eq!(decode_rv32(asm::ecall()), Instruction::Ecall);
        assert_eq!(decode_rv32(asm::ebreak()), Instruction::Ebreak);
        assert_eq!(decode_rv32(asm::mret()), Instruction::Mret);
        assert_eq!(decode_rv32(asm::wfi()), Instruction::Wfi);
        assert_eq!(decode_rv32(asm::fence()), Instruction::Fence);
        assert_eq!(
            decode_rv32(asm::csrrsi(4, 0x300, 0x1F)),
            Instruction::Csr {
                funct3: 6,
                rd: 4,
                src: Operand::Imm(0x1F),
                csr: 0x300
            }
        );
        assert_eq!(
            decode_rv32(asm::csrrw(4, 0x305, 9)),
            Instruction::Csr {
                funct3: 1,
                rd: 4,
                src: Operand::Reg(9),
                csr: 0x305
            }
        );
        assert_eq!(decode_rv32(0), Instruction::Illegal(0));
        assert_eq!(decode_rv32(0xFFFF_FFFF), Instruction::Illegal(0xFFFF_FFFF));
    }
}
