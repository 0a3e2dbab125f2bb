//! Opcode execution: every primary and CB-prefixed opcode's effect on registers/bus, with the
//! exact flag semantics from §4.4. Cycle counts mirror `opcodes::OPCODES`/`CB_OPCODES` (kept
//! hand-computed here, independently of that table, the same way real hardware's timing falls
//! out of the instruction's own bus activity rather than a lookup).

use super::opcodes::{is_illegal, Condition, COND_ORDER, REG16STK_ORDER, REG16_ORDER, REG8_ORDER};
use super::registers::{Flags, Reg16, Reg8};
use super::Cpu;
use crate::error::{Error, Result};
use crate::mmu::memory::Memory;
use log::trace;

impl Cpu {
    fn read_r8(&self, r: Reg8) -> u8 {
        match r {
            Reg8::HlInd => self.bus.read(self.reg.read16(Reg16::HL)),
            other => self.reg.read8(other),
        }
    }

    fn write_r8(&mut self, r: Reg8, val: u8) -> Result<()> {
        match r {
            Reg8::HlInd => self.bus.write(self.reg.read16(Reg16::HL), val),
            other => {
                self.reg.write8(other, val);
                Ok(())
            }
        }
    }

    fn condition_met(&self, c: Condition) -> bool {
        match c {
            Condition::NZ => !self.reg.zero(),
            Condition::Z => self.reg.zero(),
            Condition::NC => !self.reg.carry(),
            Condition::C => self.reg.carry(),
        }
    }

    fn jr(&mut self, offset: u8) {
        let signed = offset as i8 as i16;
        self.reg.pc = (self.reg.pc as i16).wrapping_add(signed) as u16;
    }

    // ---- 8-bit ALU --------------------------------------------------------------------------

    fn alu_add(&mut self, val: u8, carry_in: bool) {
        let a = self.reg.a;
        let c = carry_in as u8;
        let result = (a as u16) + (val as u16) + (c as u16);
        let half = (a & 0x0F) + (val & 0x0F) + c > 0x0F;
        self.reg.a = result as u8;
        self.reg.set_flag(Flags::ZERO, self.reg.a == 0);
        self.reg.set_flag(Flags::ADD_SUBTRACT, false);
        self.reg.set_flag(Flags::HALF_CARRY, half);
        self.reg.set_flag(Flags::CARRY, result > 0xFF);
    }

    /// Computes A - val - borrow_in. Writes A back only when `store` is set (CP discards it).
    fn alu_sub(&mut self, val: u8, borrow_in: bool, store: bool) {
        let a = self.reg.a;
        let b = borrow_in as u8;
        let result = (a as i16) - (val as i16) - (b as i16);
        let half = (a as i16 & 0x0F) - (val as i16 & 0x0F) - (b as i16) < 0;
        self.reg.set_flag(Flags::ZERO, (result as u8) == 0);
        self.reg.set_flag(Flags::ADD_SUBTRACT, true);
        self.reg.set_flag(Flags::HALF_CARRY, half);
        self.reg.set_flag(Flags::CARRY, result < 0);
        if store {
            self.reg.a = result as u8;
        }
    }

    fn alu_and(&mut self, val: u8) {
        self.reg.a &= val;
        self.reg.set_flag(Flags::ZERO, self.reg.a == 0);
        self.reg.set_flag(Flags::ADD_SUBTRACT, false);
        self.reg.set_flag(Flags::HALF_CARRY, true);
        self.reg.set_flag(Flags::CARRY, false);
    }

    fn alu_or(&mut self, val: u8) {
        self.reg.a |= val;
        self.reg.set_flag(Flags::ZERO, self.reg.a == 0);
        self.reg.set_flag(Flags::ADD_SUBTRACT, false);
        self.reg.set_flag(Flags::HALF_CARRY, false);
        self.reg.set_flag(Flags::CARRY, false);
    }

    fn alu_xor(&mut self, val: u8) {
        self.reg.a ^= val;
        self.reg.set_flag(Flags::ZERO, self.reg.a == 0);
        self.reg.set_flag(Flags::ADD_SUBTRACT, false);
        self.reg.set_flag(Flags::HALF_CARRY, false);
        self.reg.set_flag(Flags::CARRY, false);
    }

    /// Dispatches one of the 8 ALU-group operations (ADD, ADC, SUB, SBC, AND, XOR, OR, CP).
    fn alu_dispatch(&mut self, y: u8, val: u8) {
        match y {
            0 => self.alu_add(val, false),
            1 => self.alu_add(val, self.reg.carry()),
            2 => self.alu_sub(val, false, true),
            3 => self.alu_sub(val, self.reg.carry(), true),
            4 => self.alu_and(val),
            5 => self.alu_xor(val),
            6 => self.alu_or(val),
            _ => self.alu_sub(val, false, false), // CP
        }
    }

    fn inc8(&mut self, v: u8) -> u8 {
        let half = v & 0x0F == 0x0F;
        let result = v.wrapping_add(1);
        self.reg.set_flag(Flags::ZERO, result == 0);
        self.reg.set_flag(Flags::ADD_SUBTRACT, false);
        self.reg.set_flag(Flags::HALF_CARRY, half);
        result
    }

    fn dec8(&mut self, v: u8) -> u8 {
        let half = v & 0x0F == 0x00;
        let result = v.wrapping_sub(1);
        self.reg.set_flag(Flags::ZERO, result == 0);
        self.reg.set_flag(Flags::ADD_SUBTRACT, true);
        self.reg.set_flag(Flags::HALF_CARRY, half);
        result
    }

    fn daa(&mut self) {
        let mut a = self.reg.a;
        let mut adjust = 0u8;
        let mut carry = self.reg.carry();
        if self.reg.half_carry() || (!self.reg.subtract() && (a & 0x0F) > 0x09) {
            adjust |= 0x06;
        }
        if self.reg.carry() || (!self.reg.subtract() && a > 0x99) {
            adjust |= 0x60;
            carry = true;
        }
        a = if self.reg.subtract() {
            a.wrapping_sub(adjust)
        } else {
            a.wrapping_add(adjust)
        };
        self.reg.a = a;
        self.reg.set_flag(Flags::ZERO, a == 0);
        self.reg.set_flag(Flags::HALF_CARRY, false);
        self.reg.set_flag(Flags::CARRY, carry);
    }

    fn add_hl(&mut self, rp: Reg16) {
        let hl = self.reg.read16(Reg16::HL);
        let val = self.reg.read16(rp);
        let (result, carry) = hl.overflowing_add(val);
        let half = (hl & 0x0FFF) + (val & 0x0FFF) > 0x0FFF;
        self.reg.write16(Reg16::HL, result);
        self.reg.set_flag(Flags::ADD_SUBTRACT, false);
        self.reg.set_flag(Flags::HALF_CARRY, half);
        self.reg.set_flag(Flags::CARRY, carry);
    }

    /// Shared SP+e8 computation for `ADD SP,e8` and `LD HL,SP+e8`: the offset is sign-extended
    /// for the address add, but H/C are computed from the *unsigned* low-byte addition (§4.4).
    fn sp_plus_e8(&mut self) -> (u16, bool, bool) {
        let offset = self.fetch_byte();
        let sp = self.reg.sp;
        let result = (sp as i16).wrapping_add(offset as i8 as i16) as u16;
        let half = (sp as u8 & 0x0F) + (offset & 0x0F) > 0x0F;
        let carry = (sp as u8 as u16) + (offset as u16) > 0xFF;
        (result, half, carry)
    }

    // ---- primary table ----------------------------------------------------------------------

    pub(super) fn execute_primary(&mut self, op: u8) -> Result<u8> {
        if is_illegal(op) {
            return Err(Error::IllegalInstruction {
                opcode: op,
                address: self.reg.pc.wrapping_sub(1),
            });
        }

        let x = (op >> 6) & 0x03;
        let y = (op >> 3) & 0x07;
        let z = op & 0x07;
        let p = (y >> 1) & 0x03;
        let q = y & 0x01;

        trace!("{:#04x} x={} y={} z={}", op, x, y, z);

        let cycles = match x {
            0 => self.execute_block0(y, z, p, q)?,
            1 => {
                let dst = REG8_ORDER[y as usize];
                let src = REG8_ORDER[z as usize];
                let val = self.read_r8(src);
                self.write_r8(dst, val)?;
                if matches!(dst, Reg8::HlInd) || matches!(src, Reg8::HlInd) {
                    8
                } else {
                    4
                }
            }
            2 => {
                let src = REG8_ORDER[z as usize];
                let val = self.read_r8(src);
                self.alu_dispatch(y, val);
                if matches!(src, Reg8::HlInd) {
                    8
                } else {
                    4
                }
            }
            _ => self.execute_block3(y, z, p, q)?,
        };

        Ok(cycles)
    }

    fn execute_block0(&mut self, y: u8, z: u8, p: u8, q: u8) -> Result<u8> {
        Ok(match z {
            0 => match y {
                0 => 4, // NOP
                1 => {
                    let addr = self.fetch_word();
                    let sp = self.reg.sp;
                    self.bus.write(addr, sp as u8)?;
                    self.bus.write(addr.wrapping_add(1), (sp >> 8) as u8)?;
                    20
                }
                2 => {
                    self.stopped = true;
                    4
                }
                3 => {
                    let e8 = self.fetch_byte();
                    self.jr(e8);
                    12
                }
                _ => {
                    let e8 = self.fetch_byte();
                    let cc = COND_ORDER[(y - 4) as usize];
                    if self.condition_met(cc) {
                        self.jr(e8);
                        12
                    } else {
                        8
                    }
                }
            },
            1 => {
                let rp = REG16_ORDER[p as usize];
                if q == 0 {
                    let val = self.fetch_word();
                    self.reg.write16(rp, val);
                    12
                } else {
                    self.add_hl(rp);
                    8
                }
            }
            2 => {
                let a = self.reg.a;
                match (q, p) {
                    (0, 0) => self.bus.write(self.reg.read16(Reg16::BC), a)?,
                    (0, 1) => self.bus.write(self.reg.read16(Reg16::DE), a)?,
                    (0, 2) => {
                        let hl = self.reg.read16(Reg16::HL);
                        self.bus.write(hl, a)?;
                        self.reg.write16(Reg16::HL, hl.wrapping_add(1));
                    }
                    (0, _) => {
                        let hl = self.reg.read16(Reg16::HL);
                        self.bus.write(hl, a)?;
                        self.reg.write16(Reg16::HL, hl.wrapping_sub(1));
                    }
                    (_, 0) => self.reg.a = self.bus.read(self.reg.read16(Reg16::BC)),
                    (_, 1) => self.reg.a = self.bus.read(self.reg.read16(Reg16::DE)),
                    (_, 2) => {
                        let hl = self.reg.read16(Reg16::HL);
                        self.reg.a = self.bus.read(hl);
                        self.reg.write16(Reg16::HL, hl.wrapping_add(1));
                    }
                    (_, _) => {
                        let hl = self.reg.read16(Reg16::HL);
                        self.reg.a = self.bus.read(hl);
                        self.reg.write16(Reg16::HL, hl.wrapping_sub(1));
                    }
                }
                8
            }
            3 => {
                let rp = REG16_ORDER[p as usize];
                let val = self.reg.read16(rp);
                self.reg
                    .write16(rp, if q == 0 { val.wrapping_add(1) } else { val.wrapping_sub(1) });
                8
            }
            4 => {
                let r = REG8_ORDER[y as usize];
                let v = self.read_r8(r);
                let result = self.inc8(v);
                self.write_r8(r, result)?;
                if matches!(r, Reg8::HlInd) {
                    12
                } else {
                    4
                }
            }
            5 => {
                let r = REG8_ORDER[y as usize];
                let v = self.read_r8(r);
                let result = self.dec8(v);
                self.write_r8(r, result)?;
                if matches!(r, Reg8::HlInd) {
                    12
                } else {
                    4
                }
            }
            6 => {
                let r = REG8_ORDER[y as usize];
                let n8 = self.fetch_byte();
                self.write_r8(r, n8)?;
                if matches!(r, Reg8::HlInd) {
                    12
                } else {
                    8
                }
            }
            _ => {
                match y {
                    0 => {
                        let bit7 = self.reg.a >> 7;
                        self.reg.a = (self.reg.a << 1) | bit7;
                        self.reg.set_flag(Flags::ZERO, false);
                        self.reg.set_flag(Flags::ADD_SUBTRACT, false);
                        self.reg.set_flag(Flags::HALF_CARRY, false);
                        self.reg.set_flag(Flags::CARRY, bit7 == 1);
                    }
                    1 => {
                        let bit0 = self.reg.a & 1;
                        self.reg.a = (self.reg.a >> 1) | (bit0 << 7);
                        self.reg.set_flag(Flags::ZERO, false);
                        self.reg.set_flag(Flags::ADD_SUBTRACT, false);
                        self.reg.set_flag(Flags::HALF_CARRY, false);
                        self.reg.set_flag(Flags::CARRY, bit0 == 1);
                    }
                    2 => {
                        let carry_in = self.reg.carry() as u8;
                        let bit7 = self.reg.a >> 7;
                        self.reg.a = (self.reg.a << 1) | carry_in;
                        self.reg.set_flag(Flags::ZERO, false);
                        self.reg.set_flag(Flags::ADD_SUBTRACT, false);
                        self.reg.set_flag(Flags::HALF_CARRY, false);
                        self.reg.set_flag(Flags::CARRY, bit7 == 1);
                    }
                    3 => {
                        let carry_in = self.reg.carry() as u8;
                        let bit0 = self.reg.a & 1;
                        self.reg.a = (self.reg.a >> 1) | (carry_in << 7);
                        self.reg.set_flag(Flags::ZERO, false);
                        self.reg.set_flag(Flags::ADD_SUBTRACT, false);
                        self.reg.set_flag(Flags::HALF_CARRY, false);
                        self.reg.set_flag(Flags::CARRY, bit0 == 1);
                    }
                    4 => self.daa(),
                    5 => {
                        self.reg.a = !self.reg.a;
                        self.reg.set_flag(Flags::ADD_SUBTRACT, true);
                        self.reg.set_flag(Flags::HALF_CARRY, true);
                    }
                    6 => {
                        self.reg.set_flag(Flags::ADD_SUBTRACT, false);
                        self.reg.set_flag(Flags::HALF_CARRY, false);
                        self.reg.set_flag(Flags::CARRY, true);
                    }
                    _ => {
                        self.reg.set_flag(Flags::ADD_SUBTRACT, false);
                        self.reg.set_flag(Flags::HALF_CARRY, false);
                        let carry = self.reg.carry();
                        self.reg.set_flag(Flags::CARRY, !carry);
                    }
                }
                4
            }
        })
    }

    fn execute_block3(&mut self, y: u8, z: u8, p: u8, q: u8) -> Result<u8> {
        Ok(match z {
            0 => match y {
                0..=3 => {
                    let cc = COND_ORDER[y as usize];
                    if self.condition_met(cc) {
                        self.reg.pc = self.pop16()?;
                        20
                    } else {
                        8
                    }
                }
                4 => {
                    let offset = self.fetch_byte();
                    self.bus.write(0xFF00 + offset as u16, self.reg.a)?;
                    12
                }
                5 => {
                    let (result, half, carry) = self.sp_plus_e8();
                    self.reg.sp = result;
                    self.reg.set_flag(Flags::ZERO, false);
                    self.reg.set_flag(Flags::ADD_SUBTRACT, false);
                    self.reg.set_flag(Flags::HALF_CARRY, half);
                    self.reg.set_flag(Flags::CARRY, carry);
                    16
                }
                6 => {
                    let offset = self.fetch_byte();
                    self.reg.a = self.bus.read(0xFF00 + offset as u16);
                    12
                }
                _ => {
                    let (result, half, carry) = self.sp_plus_e8();
                    self.reg.write16(Reg16::HL, result);
                    self.reg.set_flag(Flags::ZERO, false);
                    self.reg.set_flag(Flags::ADD_SUBTRACT, false);
                    self.reg.set_flag(Flags::HALF_CARRY, half);
                    self.reg.set_flag(Flags::CARRY, carry);
                    12
                }
            },
            1 => {
                let rp = REG16STK_ORDER[p as usize];
                if q == 0 {
                    let val = self.pop16()?;
                    self.reg.write16_stk(rp, val);
                    12
                } else {
                    match p {
                        0 => {
                            self.reg.pc = self.pop16()?;
                            16
                        }
                        1 => {
                            self.reg.pc = self.pop16()?;
                            self.ime = true;
                            16
                        }
                        2 => {
                            self.reg.pc = self.reg.read16(Reg16::HL);
                            4
                        }
                        _ => {
                            self.reg.sp = self.reg.read16(Reg16::HL);
                            8
                        }
                    }
                }
            }
            2 => match y {
                0..=3 => {
                    let addr = self.fetch_word();
                    let cc = COND_ORDER[y as usize];
                    if self.condition_met(cc) {
                        self.reg.pc = addr;
                        16
                    } else {
                        12
                    }
                }
                4 => {
                    self.bus.write(0xFF00 + self.reg.c as u16, self.reg.a)?;
                    8
                }
                5 => {
                    let addr = self.fetch_word();
                    self.bus.write(addr, self.reg.a)?;
                    16
                }
                6 => {
                    self.reg.a = self.bus.read(0xFF00 + self.reg.c as u16);
                    8
                }
                _ => {
                    let addr = self.fetch_word();
                    self.reg.a = self.bus.read(addr);
                    16
                }
            },
            3 => match y {
                0 => {
                    self.reg.pc = self.fetch_word();
                    16
                }
                6 => {
                    self.ime = false;
                    self.ei_delay = 0;
                    4
                }
                7 => {
                    self.ei_delay = 2;
                    4
                }
                _ => unreachable!("illegal opcode filtered before dispatch"),
            },
            4 => match y {
                0..=3 => {
                    let addr = self.fetch_word();
                    let cc = COND_ORDER[y as usize];
                    if self.condition_met(cc) {
                        self.push16(self.reg.pc)?;
                        self.reg.pc = addr;
                        24
                    } else {
                        12
                    }
                }
                _ => unreachable!("illegal opcode filtered before dispatch"),
            },
            5 => {
                let rp = REG16STK_ORDER[p as usize];
                if q == 0 {
                    self.push16(self.reg.read16_stk(rp))?;
                    16
                } else if p == 0 {
                    let addr = self.fetch_word();
                    self.push16(self.reg.pc)?;
                    self.reg.pc = addr;
                    24
                } else {
                    unreachable!("illegal opcode filtered before dispatch")
                }
            }
            6 => {
                let n8 = self.fetch_byte();
                self.alu_dispatch(y, n8);
                8
            }
            _ => {
                self.push16(self.reg.pc)?;
                self.reg.pc = (y as u16) * 8;
                16
            }
        })
    }

    // ---- CB-prefixed table --------------------------------------------------------------------

    pub(super) fn execute_cb(&mut self, op: u8) -> Result<u8> {
        let x = (op >> 6) & 0x03;
        let y = (op >> 3) & 0x07;
        let z = op & 0x07;
        let r = REG8_ORDER[z as usize];
        let hl = matches!(r, Reg8::HlInd);

        trace!("CB {:#04x} x={} y={} z={}", op, x, y, z);

        let cycles = match x {
            0 => {
                let v = self.read_r8(r);
                let (result, carry_out) = match y {
                    0 => {
                        let bit7 = v >> 7;
                        ((v << 1) | bit7, bit7 == 1)
                    }
                    1 => {
                        let bit0 = v & 1;
                        ((v >> 1) | (bit0 << 7), bit0 == 1)
                    }
                    2 => {
                        let carry_in = self.reg.carry() as u8;
                        let bit7 = v >> 7;
                        ((v << 1) | carry_in, bit7 == 1)
                    }
                    3 => {
                        let carry_in = self.reg.carry() as u8;
                        let bit0 = v & 1;
                        ((v >> 1) | (carry_in << 7), bit0 == 1)
                    }
                    4 => {
                        let bit7 = v >> 7;
                        (v << 1, bit7 == 1)
                    }
                    5 => {
                        let bit0 = v & 1;
                        ((v >> 1) | (v & 0x80), bit0 == 1)
                    }
                    6 => ((v << 4) | (v >> 4), false),
                    _ => {
                        let bit0 = v & 1;
                        (v >> 1, bit0 == 1)
                    }
                };
                self.write_r8(r, result)?;
                self.reg.set_flag(Flags::ZERO, result == 0);
                self.reg.set_flag(Flags::ADD_SUBTRACT, false);
                self.reg.set_flag(Flags::HALF_CARRY, false);
                self.reg.set_flag(Flags::CARRY, carry_out);
                if hl {
                    16
                } else {
                    8
                }
            }
            1 => {
                let v = self.read_r8(r);
                self.reg.set_flag(Flags::ZERO, v & (1 << y) == 0);
                self.reg.set_flag(Flags::ADD_SUBTRACT, false);
                self.reg.set_flag(Flags::HALF_CARRY, true);
                if hl {
                    12
                } else {
                    8
                }
            }
            2 => {
                let v = self.read_r8(r);
                self.write_r8(r, v & !(1 << y))?;
                if hl {
                    16
                } else {
                    8
                }
            }
            _ => {
                let v = self.read_r8(r);
                self.write_r8(r, v | (1 << y))?;
                if hl {
                    16
                } else {
                    8
                }
            }
        };

        Ok(cycles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::header::CartridgeHeader;
    use crate::cartridge::mbc;
    use crate::cartridge::Cartridge;
    use crate::config::Config;
    use crate::cpu::interrupts::InterruptController;
    use crate::mmu::Bus;

    fn blank_rom() -> Vec<u8> {
        let mut rom = vec![0u8; 0x8000];
        rom[0x0134] = 0x01;
        let mut computed: u8 = 0;
        for &byte in &rom[0x0134..=0x014C] {
            computed = computed.wrapping_sub(byte).wrapping_sub(1);
        }
        rom[0x014D] = computed;
        rom
    }

    fn with_cpu(program: &[u8]) -> Cpu {
        let mut rom = blank_rom();
        rom[0x0100..0x0100 + program.len()].copy_from_slice(program);
        let header = CartridgeHeader::parse(&rom).unwrap();
        let mbc = mbc::classify(header.cartridge_type, rom, vec![]).unwrap();
        let cartridge = Cartridge::from_parts(header, mbc);
        let bus = Bus::new(cartridge, Config::default(), InterruptController::new());
        let mut cpu = Cpu::new(bus);
        cpu.reg.pc = 0x0100;
        cpu.reg.sp = 0xFFFE;
        cpu
    }

    #[test]
    fn add_a_a_matches_documented_scenario() {
        // §8 scenario 2: ADD A,A with A=0x08, flags cleared -> A=0x10, Z=0,N=0,H=1,C=0.
        let mut cpu = with_cpu(&[0x87]); // ADD A,A
        cpu.reg.a = 0x08;
        cpu.step().unwrap();
        assert_eq!(cpu.reg.a, 0x10);
        assert!(!cpu.reg.zero());
        assert!(!cpu.reg.subtract());
        assert!(cpu.reg.half_carry());
        assert!(!cpu.reg.carry());
    }

    #[test]
    fn daa_after_add_matches_documented_scenario() {
        // §8 scenario 3: ADD A,A with A=0x09 then DAA -> A=0x18, Z=0,N=0,H=0,C=0.
        let mut cpu = with_cpu(&[0x87, 0x27]); // ADD A,A ; DAA
        cpu.reg.a = 0x09;
        cpu.step().unwrap();
        cpu.step().unwrap();
        assert_eq!(cpu.reg.a, 0x18);
        assert!(!cpu.reg.zero());
        assert!(!cpu.reg.subtract());
        assert!(!cpu.reg.half_carry());
        assert!(!cpu.reg.carry());
    }

    #[test]
    fn ld_hl_sp_plus_e8_matches_documented_scenarios() {
        // §8 scenario 4, first case.
        let mut cpu = with_cpu(&[0xF8, 0x02]); // LD HL,SP+2
        cpu.reg.sp = 0xFFF8;
        cpu.step().unwrap();
        assert_eq!(cpu.reg.read16(Reg16::HL), 0xFFFA);
        assert!(!cpu.reg.zero());
        assert!(!cpu.reg.half_carry());
        assert!(!cpu.reg.carry());
    }

    #[test]
    fn ld_hl_sp_plus_e8_half_carry_case() {
        // §8 scenario 4, second case.
        let mut cpu = with_cpu(&[0xF8, 0x01]);
        cpu.reg.sp = 0x000F;
        cpu.step().unwrap();
        assert_eq!(cpu.reg.read16(Reg16::HL), 0x0010);
        assert!(cpu.reg.half_carry());
        assert!(!cpu.reg.carry());
    }

    #[test]
    fn rst_18_matches_documented_scenario() {
        // §8 scenario 5: RST $18 with PC=0x1234, SP=0xFFFE. The opcode must live in the ROM image
        // itself (a plain bus write to cartridge ROM space is a no-op for a ROM-only cartridge).
        let mut rom = blank_rom();
        rom[0x1234] = 0xDF; // RST $18
        let header = CartridgeHeader::parse(&rom).unwrap();
        let mbc = mbc::classify(header.cartridge_type, rom, vec![]).unwrap();
        let cartridge = Cartridge::from_parts(header, mbc);
        let bus = Bus::new(cartridge, Config::default(), InterruptController::new());
        let mut cpu = Cpu::new(bus);
        cpu.reg.pc = 0x1234;
        cpu.reg.sp = 0xFFFE;

        cpu.step().unwrap();
        assert_eq!(cpu.reg.pc, 0x0018);
        assert_eq!(cpu.reg.sp, 0xFFFC);
        assert_eq!(cpu.bus.read(0xFFFD), 0x12);
        assert_eq!(cpu.bus.read(0xFFFC), 0x34);
    }

    #[test]
    fn push_then_pop_round_trips_and_restores_sp() {
        let mut cpu = with_cpu(&[0xC5, 0xC1]); // PUSH BC ; POP BC
        cpu.reg.write16(Reg16::BC, 0xBEEF);
        let sp = cpu.reg.sp;
        cpu.step().unwrap();
        cpu.step().unwrap();
        assert_eq!(cpu.reg.read16(Reg16::BC), 0xBEEF);
        assert_eq!(cpu.reg.sp, sp);
    }

    #[test]
    fn conditional_jump_taken_costs_base_plus_four() {
        let mut cpu = with_cpu(&[0x20, 0x05]); // JR NZ,+5
        cpu.reg.set_flag(Flags::ZERO, false);
        let cycles = cpu.step().unwrap();
        assert_eq!(cycles, 12);
    }

    #[test]
    fn conditional_jump_not_taken_costs_base_only() {
        let mut cpu = with_cpu(&[0x20, 0x05]);
        cpu.reg.set_flag(Flags::ZERO, true);
        let cycles = cpu.step().unwrap();
        assert_eq!(cycles, 8);
    }

    #[test]
    fn cb_bit_clears_zero_when_bit_is_set() {
        let mut cpu = with_cpu(&[0xCB, 0x47]); // BIT 0,A
        cpu.reg.a = 0x01;
        cpu.step().unwrap();
        assert!(!cpu.reg.zero());
    }

    #[test]
    fn illegal_opcode_is_a_fatal_error() {
        let mut cpu = with_cpu(&[0xD3]);
        let err = cpu.step().unwrap_err();
        assert!(matches!(err, Error::IllegalInstruction { opcode: 0xD3, .. }));
    }

    #[test]
    fn flag_register_low_nibble_is_always_zero_after_execution() {
        let mut cpu = with_cpu(&[0x3C]); // INC A
        cpu.step().unwrap();
        assert_eq!(cpu.reg.read8(Reg8::F) & 0x0F, 0);
    }
}
