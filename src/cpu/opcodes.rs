//! Immutable decode tables mapping opcode -> (mnemonic, operand roles, condition, base cycles).
//!
//! The source kept a `HashMap<u8, &'static OpCode>` built once via `lazy_static` and consulted it
//! only for display/cycle bookkeeping while a hand-written `match` did the actual execution. This
//! keeps that split, but builds the table by decoding the opcode's bit fields (quadrant/row/column,
//! the standard SM83 `xxyyyzzz` decomposition) instead of listing 256 literal entries, which is the
//! same grouping the source's own `execute.rs` already leaned on for opcodes sharing an addressing
//! mode (e.g. `0x06 | 0x0E | 0x16 | ...`), generalized uniformly over the whole table.

use super::registers::{Reg16, Reg16Stk, Reg8};
use lazy_static::lazy_static;
use std::collections::HashMap;

/// One of the 4 two-bit condition codes used by JR/JP/CALL/RET.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    NZ,
    Z,
    NC,
    C,
}

/// Addressing-mode roles an operand can take. Not every opcode's execution logic consults this --
/// `cpu::execute` decodes registers/conditions directly from the opcode byte -- but it is the
/// canonical place illegal operand combinations become statically unrepresentable, and it is what
/// disassembly/logging and tests read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// None of A, B, C, D, E, H, L, or the `(HL)` indirect role.
    Reg8(Reg8),
    /// One of BC, DE, HL, SP.
    Reg16(Reg16),
    /// One of BC, DE, HL, AF (PUSH/POP only).
    Reg16Stk(Reg16Stk),
    /// SP itself, as in `LD SP,HL`.
    Sp,
    /// `SP+e8`, as in `LD HL,SP+e8` / `ADD SP,e8`.
    SpPlusImm8,
    /// `($FF00+C)`.
    HighC,
    /// `($FF00+n8)`.
    HighImm8,
    /// `(BC)`.
    IndBc,
    /// `(DE)`.
    IndDe,
    /// `(HL+)`.
    IndHlInc,
    /// `(HL-)`.
    IndHlDec,
    /// An immediate 8-bit operand, `n8`/`e8`.
    Imm8,
    /// An immediate 16-bit operand, `n16`.
    Imm16,
    /// A direct 16-bit memory address operand, `(n16)`.
    Addr16,
    /// A branch condition (NZ/Z/NC/C).
    Condition(Condition),
    /// A CB-prefixed bit index 0..7.
    CbBit(u8),
    /// An RST vector (0x00, 0x08, .. 0x38).
    Rst(u8),
    /// No operand.
    None,
}

/// One decode-table record: mnemonic, up to two operand roles, an optional branch condition, and
/// the base T-cycle cost (before any conditional-branch-taken penalty from §4.4).
#[derive(Debug, Clone)]
pub struct OpCode {
    pub op: u8,
    pub mnemonic: String,
    pub operand1: Operand,
    pub operand2: Operand,
    pub condition: Option<Condition>,
    pub cycles: u8,
}

pub(crate) const REG8_ORDER: [Reg8; 8] = [
    Reg8::B,
    Reg8::C,
    Reg8::D,
    Reg8::E,
    Reg8::H,
    Reg8::L,
    Reg8::HlInd,
    Reg8::A,
];
pub(crate) const REG16_ORDER: [Reg16; 4] = [Reg16::BC, Reg16::DE, Reg16::HL, Reg16::SP];
pub(crate) const REG16STK_ORDER: [Reg16Stk; 4] =
    [Reg16Stk::BC, Reg16Stk::DE, Reg16Stk::HL, Reg16Stk::AF];
pub(crate) const COND_ORDER: [Condition; 4] =
    [Condition::NZ, Condition::Z, Condition::NC, Condition::C];
const ALU_MNEMONIC: [&str; 8] = ["ADD", "ADC", "SUB", "SBC", "AND", "XOR", "OR", "CP"];
const ROT_MNEMONIC: [&str; 8] = ["RLC", "RRC", "RL", "RR", "SLA", "SRA", "SWAP", "SRL"];

fn reg8_name(r: Reg8) -> &'static str {
    match r {
        Reg8::A => "A",
        Reg8::B => "B",
        Reg8::C => "C",
        Reg8::D => "D",
        Reg8::E => "E",
        Reg8::F => "F",
        Reg8::H => "H",
        Reg8::L => "L",
        Reg8::HlInd => "(HL)",
    }
}

fn reg16_name(r: Reg16) -> &'static str {
    match r {
        Reg16::BC => "BC",
        Reg16::DE => "DE",
        Reg16::HL => "HL",
        Reg16::SP => "SP",
    }
}

fn reg16stk_name(r: Reg16Stk) -> &'static str {
    match r {
        Reg16Stk::BC => "BC",
        Reg16Stk::DE => "DE",
        Reg16Stk::HL => "HL",
        Reg16Stk::AF => "AF",
    }
}

fn cond_name(c: Condition) -> &'static str {
    match c {
        Condition::NZ => "NZ",
        Condition::Z => "Z",
        Condition::NC => "NC",
        Condition::C => "C",
    }
}

/// Decode a primary-table opcode into an `OpCode` record by its `xxyyyzzz` bit fields.
fn decode_primary(op: u8) -> OpCode {
    let x = (op >> 6) & 0x03;
    let y = (op >> 3) & 0x07;
    let z = op & 0x07;
    let p = (y >> 1) & 0x03;
    let q = y & 0x01;

    let simple = |mnemonic: &str, o1: Operand, o2: Operand, cycles: u8| OpCode {
        op,
        mnemonic: mnemonic.to_string(),
        operand1: o1,
        operand2: o2,
        condition: None,
        cycles,
    };

    match x {
        0 => match z {
            0 => match y {
                0 => simple("NOP", Operand::None, Operand::None, 4),
                1 => simple("LD", Operand::Addr16, Operand::Sp, 20),
                2 => simple("STOP", Operand::None, Operand::None, 4),
                3 => simple("JR", Operand::Imm8, Operand::None, 12),
                _ => {
                    let cc = COND_ORDER[(y - 4) as usize];
                    OpCode {
                        op,
                        mnemonic: format!("JR {},e8", cond_name(cc)),
                        operand1: Operand::Condition(cc),
                        operand2: Operand::Imm8,
                        condition: Some(cc),
                        cycles: 8,
                    }
                }
            },
            1 => {
                let rp = REG16_ORDER[p as usize];
                if q == 0 {
                    simple(
                        &format!("LD {},n16", reg16_name(rp)),
                        Operand::Reg16(rp),
                        Operand::Imm16,
                        12,
                    )
                } else {
                    simple(
                        &format!("ADD HL,{}", reg16_name(rp)),
                        Operand::Reg16(Reg16::HL),
                        Operand::Reg16(rp),
                        8,
                    )
                }
            }
            2 => {
                let (mnemonic, o1, o2) = match (q, p) {
                    (0, 0) => ("LD (BC),A", Operand::IndBc, Operand::Reg8(Reg8::A)),
                    (0, 1) => ("LD (DE),A", Operand::IndDe, Operand::Reg8(Reg8::A)),
                    (0, 2) => ("LD (HL+),A", Operand::IndHlInc, Operand::Reg8(Reg8::A)),
                    (0, 3) => ("LD (HL-),A", Operand::IndHlDec, Operand::Reg8(Reg8::A)),
                    (1, 0) => ("LD A,(BC)", Operand::Reg8(Reg8::A), Operand::IndBc),
                    (1, 1) => ("LD A,(DE)", Operand::Reg8(Reg8::A), Operand::IndDe),
                    (1, 2) => ("LD A,(HL+)", Operand::Reg8(Reg8::A), Operand::IndHlInc),
                    _ => ("LD A,(HL-)", Operand::Reg8(Reg8::A), Operand::IndHlDec),
                };
                simple(mnemonic, o1, o2, 8)
            }
            3 => {
                let rp = REG16_ORDER[p as usize];
                let mnemonic = if q == 0 { "INC" } else { "DEC" };
                simple(
                    &format!("{} {}", mnemonic, reg16_name(rp)),
                    Operand::Reg16(rp),
                    Operand::None,
                    8,
                )
            }
            4 => {
                let r = REG8_ORDER[y as usize];
                let cycles = if matches!(r, Reg8::HlInd) { 12 } else { 4 };
                simple(
                    &format!("INC {}", reg8_name(r)),
                    Operand::Reg8(r),
                    Operand::None,
                    cycles,
                )
            }
            5 => {
                let r = REG8_ORDER[y as usize];
                let cycles = if matches!(r, Reg8::HlInd) { 12 } else { 4 };
                simple(
                    &format!("DEC {}", reg8_name(r)),
                    Operand::Reg8(r),
                    Operand::None,
                    cycles,
                )
            }
            6 => {
                let r = REG8_ORDER[y as usize];
                let cycles = if matches!(r, Reg8::HlInd) { 12 } else { 8 };
                simple(
                    &format!("LD {},n8", reg8_name(r)),
                    Operand::Reg8(r),
                    Operand::Imm8,
                    cycles,
                )
            }
            _ => {
                let mnemonic = [
                    "RLCA", "RRCA", "RLA", "RRA", "DAA", "CPL", "SCF", "CCF",
                ][y as usize];
                simple(mnemonic, Operand::None, Operand::None, 4)
            }
        },
        1 => {
            if y == 6 && z == 6 {
                simple("HALT", Operand::None, Operand::None, 4)
            } else {
                let dst = REG8_ORDER[y as usize];
                let src = REG8_ORDER[z as usize];
                let cycles = if matches!(dst, Reg8::HlInd) || matches!(src, Reg8::HlInd) {
                    8
                } else {
                    4
                };
                simple(
                    &format!("LD {},{}", reg8_name(dst), reg8_name(src)),
                    Operand::Reg8(dst),
                    Operand::Reg8(src),
                    cycles,
                )
            }
        }
        2 => {
            let src = REG8_ORDER[z as usize];
            let cycles = if matches!(src, Reg8::HlInd) { 8 } else { 4 };
            simple(
                &format!("{} A,{}", ALU_MNEMONIC[y as usize], reg8_name(src)),
                Operand::Reg8(Reg8::A),
                Operand::Reg8(src),
                cycles,
            )
        }
        _ => match z {
            0 => match y {
                0..=3 => {
                    let cc = COND_ORDER[y as usize];
                    OpCode {
                        op,
                        mnemonic: format!("RET {}", cond_name(cc)),
                        operand1: Operand::Condition(cc),
                        operand2: Operand::None,
                        condition: Some(cc),
                        cycles: 8,
                    }
                }
                4 => simple("LDH (n8),A", Operand::HighImm8, Operand::Reg8(Reg8::A), 12),
                5 => simple(
                    "ADD SP,e8",
                    Operand::Reg16(Reg16::SP),
                    Operand::Imm8,
                    16,
                ),
                6 => simple("LDH A,(n8)", Operand::Reg8(Reg8::A), Operand::HighImm8, 12),
                _ => simple("LD HL,SP+e8", Operand::Reg16(Reg16::HL), Operand::SpPlusImm8, 12),
            },
            1 => {
                let rp = REG16STK_ORDER[p as usize];
                if q == 0 {
                    simple(
                        &format!("POP {}", reg16stk_name(rp)),
                        Operand::Reg16Stk(rp),
                        Operand::None,
                        12,
                    )
                } else {
                    match p {
                        0 => simple("RET", Operand::None, Operand::None, 16),
                        1 => simple("RETI", Operand::None, Operand::None, 16),
                        2 => simple("JP HL", Operand::Reg16(Reg16::HL), Operand::None, 4),
                        _ => simple("LD SP,HL", Operand::Sp, Operand::Reg16(Reg16::HL), 8),
                    }
                }
            }
            2 => match y {
                0..=3 => {
                    let cc = COND_ORDER[y as usize];
                    OpCode {
                        op,
                        mnemonic: format!("JP {},n16", cond_name(cc)),
                        operand1: Operand::Condition(cc),
                        operand2: Operand::Imm16,
                        condition: Some(cc),
                        cycles: 12,
                    }
                }
                4 => simple("LD (C),A", Operand::HighC, Operand::Reg8(Reg8::A), 8),
                5 => simple("LD (n16),A", Operand::Addr16, Operand::Reg8(Reg8::A), 16),
                6 => simple("LD A,(C)", Operand::Reg8(Reg8::A), Operand::HighC, 8),
                _ => simple("LD A,(n16)", Operand::Reg8(Reg8::A), Operand::Addr16, 16),
            },
            3 => match y {
                0 => simple("JP n16", Operand::Imm16, Operand::None, 16),
                1 => simple("PREFIX CB", Operand::None, Operand::None, 4),
                6 => simple("DI", Operand::None, Operand::None, 4),
                7 => simple("EI", Operand::None, Operand::None, 4),
                _ => simple("ILLEGAL", Operand::None, Operand::None, 4),
            },
            4 => match y {
                0..=3 => {
                    let cc = COND_ORDER[y as usize];
                    OpCode {
                        op,
                        mnemonic: format!("CALL {},n16", cond_name(cc)),
                        operand1: Operand::Condition(cc),
                        operand2: Operand::Imm16,
                        condition: Some(cc),
                        cycles: 12,
                    }
                }
                _ => simple("ILLEGAL", Operand::None, Operand::None, 4),
            },
            5 => {
                let rp = REG16STK_ORDER[p as usize];
                if q == 0 {
                    simple(
                        &format!("PUSH {}", reg16stk_name(rp)),
                        Operand::Reg16Stk(rp),
                        Operand::None,
                        16,
                    )
                } else if p == 0 {
                    simple("CALL n16", Operand::Imm16, Operand::None, 24)
                } else {
                    simple("ILLEGAL", Operand::None, Operand::None, 4)
                }
            }
            6 => simple(
                &format!("{} A,n8", ALU_MNEMONIC[y as usize]),
                Operand::Reg8(Reg8::A),
                Operand::Imm8,
                8,
            ),
            _ => simple(
                &format!("RST {:#04x}", y * 8),
                Operand::Rst(y * 8),
                Operand::None,
                16,
            ),
        },
    }
}

/// Decode a CB-table opcode into an `OpCode` record.
fn decode_cb(op: u8) -> OpCode {
    let x = (op >> 6) & 0x03;
    let y = (op >> 3) & 0x07;
    let z = op & 0x07;
    let r = REG8_ORDER[z as usize];
    let hl = matches!(r, Reg8::HlInd);

    match x {
        0 => OpCode {
            op,
            mnemonic: format!("{} {}", ROT_MNEMONIC[y as usize], reg8_name(r)),
            operand1: Operand::Reg8(r),
            operand2: Operand::None,
            condition: None,
            cycles: if hl { 16 } else { 8 },
        },
        1 => OpCode {
            op,
            mnemonic: format!("BIT {},{}", y, reg8_name(r)),
            operand1: Operand::CbBit(y),
            operand2: Operand::Reg8(r),
            condition: None,
            cycles: if hl { 12 } else { 8 },
        },
        2 => OpCode {
            op,
            mnemonic: format!("RES {},{}", y, reg8_name(r)),
            operand1: Operand::CbBit(y),
            operand2: Operand::Reg8(r),
            condition: None,
            cycles: if hl { 16 } else { 8 },
        },
        _ => OpCode {
            op,
            mnemonic: format!("SET {},{}", y, reg8_name(r)),
            operand1: Operand::CbBit(y),
            operand2: Operand::Reg8(r),
            condition: None,
            cycles: if hl { 16 } else { 8 },
        },
    }
}

lazy_static! {
    /// The 256-entry primary opcode table, built once at first access.
    pub static ref OPCODES: HashMap<u8, OpCode> = {
        let mut map = HashMap::with_capacity(256);
        for op in 0u16..=255 {
            map.insert(op as u8, decode_primary(op as u8));
        }
        map
    };

    /// The 256-entry CB-prefixed opcode table, built once at first access.
    pub static ref CB_OPCODES: HashMap<u8, OpCode> = {
        let mut map = HashMap::with_capacity(256);
        for op in 0u16..=255 {
            map.insert(op as u8, decode_cb(op as u8));
        }
        map
    };
}

/// The eleven opcodes the SM83 has no defined behavior for (§7).
pub const ILLEGAL_OPCODES: [u8; 11] = [
    0xD3, 0xDB, 0xDD, 0xE3, 0xE4, 0xEB, 0xEC, 0xED, 0xF4, 0xFC, 0xFD,
];

pub fn is_illegal(op: u8) -> bool {
    ILLEGAL_OPCODES.contains(&op)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn illegal_opcode_table_matches_spec_list() {
        for op in ILLEGAL_OPCODES {
            assert!(is_illegal(op));
        }
        assert!(!is_illegal(0x00));
        assert!(!is_illegal(0xCB));
    }

    #[test]
    fn nop_is_four_cycles_no_operands() {
        let nop = &OPCODES[&0x00];
        assert_eq!(nop.cycles, 4);
        assert_eq!(nop.mnemonic, "NOP");
    }

    #[test]
    fn jr_cc_base_cycles_is_eight() {
        // 0x20 = JR NZ,e8
        let op = &OPCODES[&0x20];
        assert_eq!(op.cycles, 8);
        assert_eq!(op.condition, Some(Condition::NZ));
    }

    #[test]
    fn call_nn_is_twenty_four_cycles() {
        assert_eq!(OPCODES[&0xCD].cycles, 24);
    }

    #[test]
    fn cb_bit_on_hl_indirect_costs_twelve() {
        // 0x46 = BIT 0,(HL)
        let op = &CB_OPCODES[&0x46];
        assert_eq!(op.cycles, 12);
        assert_eq!(op.mnemonic, "BIT 0,(HL)");
    }

    #[test]
    fn cb_set_on_hl_indirect_costs_sixteen() {
        // 0xC6 = SET 0,(HL)
        assert_eq!(CB_OPCODES[&0xC6].cycles, 16);
    }
}
