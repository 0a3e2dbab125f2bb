mod execute;
pub mod interrupts;
pub mod opcodes;
pub mod registers;

use crate::error::Result;
use crate::mmu::memory::Memory;
use crate::mmu::Bus;
use interrupts::InterruptKind;
use log::trace;
use registers::Registers;

/// The DMG-01 / CGB had a Sharp LR35902 CPU (speculated to be a SM83 core), a hybrid of the Z80
/// and the 8080. `Cpu` owns its registers and the Bus outright (lifecycle order per §3: Cartridge
/// -> Bus -> Cpu, each borrowing/owning the previous) and drives `step()` as a textbook
/// fetch-decode-execute loop with interrupt dispatch and HALT handled at instruction boundaries.
pub struct Cpu {
    pub reg: Registers,
    bus: Bus,

    /// Interrupt Master Enable.
    ime: bool,
    /// Counts down the one-instruction delay between EI and IME actually taking effect.
    ei_delay: u8,

    halted: bool,
    /// Set when HALT executes with IME==0 while an interrupt is already pending: the next fetch
    /// reads the following byte without advancing PC, replicating the well-known HALT bug.
    halt_bug: bool,
    stopped: bool,
}

impl Cpu {
    pub fn new(bus: Bus) -> Self {
        Self {
            reg: Registers::new(),
            bus,
            ime: false,
            ei_delay: 0,
            halted: false,
            halt_bug: false,
            stopped: false,
        }
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn bus_read(&self, addr: u16) -> u8 {
        self.bus.read(addr)
    }

    pub fn bus_write(&mut self, addr: u16, val: u8) -> Result<()> {
        self.bus.write(addr, val)
    }

    pub fn stopped(&self) -> bool {
        self.stopped
    }

    /// Seed post-boot register/bus state per §4.5, used when the boot ROM is skipped.
    pub fn reset_post_boot(&mut self) {
        self.reg.a = 0x01;
        self.reg.write8(registers::Reg8::F, 0xB0);
        self.reg.b = 0x00;
        self.reg.c = 0x13;
        self.reg.d = 0x00;
        self.reg.e = 0xD8;
        self.reg.h = 0x01;
        self.reg.l = 0x4D;
        self.reg.pc = 0x0100;
        self.reg.sp = 0xFFFE;
        self.bus.timer_mut().set_internal_counter(0xABCC);
    }

    fn apply_ei_delay(&mut self) {
        if self.ei_delay > 0 {
            self.ei_delay -= 1;
            if self.ei_delay == 0 {
                self.ime = true;
            }
        }
    }

    fn pending_interrupts(&self) -> u8 {
        self.bus.ie() & 0x1F & self.bus.interrupts().get_raw()
    }

    /// One CPU step: optionally service a pending interrupt, else fetch-decode-execute one
    /// instruction (or run a HALT zero-op), then tick the Timer by the T-cycles spent.
    pub fn step(&mut self) -> Result<u8> {
        self.apply_ei_delay();
        let pending = self.pending_interrupts();

        if self.halted {
            if pending != 0 {
                self.halted = false;
            } else {
                self.bus.tick_timer(4);
                return Ok(4);
            }
        }

        if self.ime && pending != 0 {
            return self.dispatch_interrupt(pending);
        }

        let opcode = self.fetch_byte();

        if opcode == 0x76 {
            // HALT
            if !self.ime && pending != 0 {
                self.halt_bug = true;
            } else {
                self.halted = true;
            }
            self.bus.tick_timer(4);
            return Ok(4);
        }

        let cycles = if opcode == 0xCB {
            let cb_op = self.fetch_byte();
            self.execute_cb(cb_op)?
        } else {
            self.execute_primary(opcode)?
        };

        self.bus.tick_timer(cycles);
        Ok(cycles)
    }

    /// Fetch the byte at PC. Normally advances PC by one; if the HALT bug is armed, the very next
    /// fetch re-reads the same byte without advancing PC, then clears the bug.
    fn fetch_byte(&mut self) -> u8 {
        let pc = self.reg.pc;
        let byte = self.bus.read(pc);
        if self.halt_bug {
            self.halt_bug = false;
        } else {
            self.reg.pc = pc.wrapping_add(1);
        }
        byte
    }

    fn fetch_word(&mut self) -> u16 {
        let lo = self.fetch_byte();
        let hi = self.fetch_byte();
        u16::from_le_bytes([lo, hi])
    }

    fn dispatch_interrupt(&mut self, pending: u8) -> Result<u8> {
        let kind = InterruptKind::lowest_set(pending).expect("pending != 0 implies a set bit");
        trace!("dispatching interrupt {:?} -> {:#06x}", kind, kind.vector());
        self.bus.interrupts().clear(kind);
        self.ime = false;
        self.push16(self.reg.pc)?;
        self.reg.pc = kind.vector();
        self.bus.tick_timer(20);
        Ok(20)
    }

    fn push16(&mut self, value: u16) -> Result<()> {
        let [lo, hi] = value.to_le_bytes();
        self.reg.sp = self.reg.sp.wrapping_sub(1);
        self.bus.write(self.reg.sp, hi)?;
        self.reg.sp = self.reg.sp.wrapping_sub(1);
        self.bus.write(self.reg.sp, lo)?;
        Ok(())
    }

    fn pop16(&mut self) -> Result<u16> {
        let lo = self.bus.read(self.reg.sp);
        self.reg.sp = self.reg.sp.wrapping_add(1);
        let hi = self.bus.read(self.reg.sp);
        self.reg.sp = self.reg.sp.wrapping_add(1);
        Ok(u16::from_le_bytes([lo, hi]))
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
    fn ei_delays_interrupt_service_by_one_instruction() {
        // EI ; NOP ; NOP, with a Timer interrupt already pending and enabled.
        let mut cpu = with_cpu(&[0xFB, 0x00, 0x00]);
        cpu.bus.write(0xFFFF, 0x04).unwrap(); // IE: Timer
        cpu.bus.interrupts().request(InterruptKind::Timer);

        cpu.step().unwrap(); // EI: ime not yet active
        assert!(!cpu.ime);
        cpu.step().unwrap(); // NOP immediately after EI: still must not service
        assert!(!cpu.ime);
        // Now IME is active; the step after this one services the interrupt.
        let pc_before = cpu.reg.pc;
        cpu.step().unwrap();
        assert_ne!(cpu.reg.pc, pc_before.wrapping_add(1));
    }

    #[test]
    fn di_clears_ime_immediately() {
        let mut cpu = with_cpu(&[0xF3]);
        cpu.ime = true;
        cpu.step().unwrap();
        assert!(!cpu.ime);
    }

    #[test]
    fn halt_with_ime_zero_and_pending_interrupt_sets_halt_bug() {
        let mut cpu = with_cpu(&[0x76, 0x3C]); // HALT ; INC A
        cpu.bus.write(0xFFFF, 0x01).unwrap();
        cpu.bus.interrupts().request(InterruptKind::VBlank);
        cpu.ime = false;

        cpu.step().unwrap();
        assert!(!cpu.halted);
        assert!(cpu.halt_bug);
    }

    #[test]
    fn halt_without_pending_interrupt_suspends_fetch() {
        let mut cpu = with_cpu(&[0x76]);
        cpu.ime = true;
        cpu.step().unwrap();
        assert!(cpu.halted);
        let pc = cpu.reg.pc;
        cpu.step().unwrap();
        assert_eq!(cpu.reg.pc, pc);
    }

    #[test]
    fn interrupt_dispatch_pushes_pc_and_jumps_to_vector() {
        let mut cpu = with_cpu(&[0x00]);
        cpu.ime = true;
        cpu.bus.write(0xFFFF, 0x01).unwrap();
        cpu.bus.interrupts().request(InterruptKind::VBlank);
        cpu.reg.pc = 0x1234;

        let cycles = cpu.step().unwrap();
        assert_eq!(cycles, 20);
        assert_eq!(cpu.reg.pc, 0x0040);
        assert!(!cpu.ime);
        assert_eq!(cpu.bus.read(0xFFFD), 0x12);
        assert_eq!(cpu.bus.read(0xFFFC), 0x34);
    }
}
