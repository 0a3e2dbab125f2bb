//! Memory Bank Controller implementations: None (ROM-only), MBC1, MBC2, MBC3 (+RTC).
//!
//! https://gbdev.io/pandocs/MBC1.html, https://gbdev.io/pandocs/MBC2.html, https://gbdev.io/pandocs/MBC3.html

use crate::error::{Error, Result};
use std::time::{SystemTime, UNIX_EPOCH};

/// Bank Mode (MBC1)
/// MBC1 has two bank modes:
///   ROM Banking Mode (up to 8KByte RAM, 2MByte ROM) (default)
///   RAM Banking Mode (up to 32KByte RAM, 512KByte ROM)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BankMode {
    Rom,
    Ram,
}

/// Supplies the host wall-clock time to the MBC3 RTC latch. Injected so tests can supply a
/// deterministic value instead of reading the real clock (§9 RTC latch note).
pub trait RtcClock {
    /// Seconds since an arbitrary fixed epoch.
    fn now_secs(&self) -> u64;
}

/// Reads the real system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRtcClock;

impl RtcClock for SystemRtcClock {
    fn now_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Returns a fixed value, for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedRtcClock(pub u64);

impl RtcClock for FixedRtcClock {
    fn now_secs(&self) -> u64 {
        self.0
    }
}

/// MBC3's real-time clock registers, latched from wall-clock time on a 0->1 write to $6000-7FFF.
pub struct Rtc {
    seconds: u8,
    minutes: u8,
    hours: u8,
    day_low: u8,
    day_high: u8,
    latch_byte: u8,
    clock: Box<dyn RtcClock + Send>,
}

impl Rtc {
    fn new(clock: Box<dyn RtcClock + Send>) -> Self {
        Self {
            seconds: 0,
            minutes: 0,
            hours: 0,
            day_low: 0,
            day_high: 0,
            latch_byte: 0xFF,
            clock,
        }
    }

    /// Recompute seconds/minutes/hours/day counter from the injected clock.
    fn latch(&mut self) {
        let total = self.clock.now_secs();
        self.seconds = (total % 60) as u8;
        self.minutes = ((total / 60) % 60) as u8;
        self.hours = ((total / 3600) % 24) as u8;
        let days = total / 86400;
        self.day_low = (days & 0xFF) as u8;
        self.day_high = (self.day_high & 0xFE) | ((days >> 8) & 0x01) as u8;
    }

    fn write_latch_byte(&mut self, value: u8) {
        if self.latch_byte == 0x00 && value == 0x01 {
            self.latch();
        }
        self.latch_byte = value;
    }

    fn read(&self, register: u8) -> u8 {
        match register {
            0x08 => self.seconds,
            0x09 => self.minutes,
            0x0A => self.hours,
            0x0B => self.day_low,
            0x0C => self.day_high,
            _ => 0xFF,
        }
    }

    fn write(&mut self, register: u8, value: u8) {
        match register {
            0x08 => self.seconds = value,
            0x09 => self.minutes = value,
            0x0A => self.hours = value,
            0x0B => self.day_low = value,
            0x0C => self.day_high = value,
            _ => {}
        }
    }
}

/// No MBC (ROM only, optionally with a fixed block of cartridge RAM).
pub struct RomOnly {
    rom: Vec<u8>,
    ram: Vec<u8>,
}

impl RomOnly {
    pub fn new(rom: Vec<u8>, ram: Vec<u8>) -> Self {
        Self { rom, ram }
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x7FFF => self.rom.get(addr as usize).copied().unwrap_or(0xFF),
            0xA000..=0xBFFF => {
                let offset = (addr - 0xA000) as usize;
                self.ram.get(offset).copied().unwrap_or(0xFF)
            }
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8) -> Result<()> {
        match addr {
            // RAM-enable is modeled on real MBC hardware only; a RomOnly cartridge has no latch
            // to toggle, so this sub-range stays a silent no-op.
            0x0000..=0x1FFF => Ok(()),
            // No MBC is present to interpret these as bank-control registers.
            0x2000..=0x7FFF => Err(Error::IllegalMemoryWrite(addr)),
            0xA000..=0xBFFF => {
                let offset = (addr - 0xA000) as usize;
                if let Some(byte) = self.ram.get_mut(offset) {
                    *byte = val;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// This is the first MBC chip for the Game Boy. Any newer MBC chips work similarly, so it is
/// relatively easy to upgrade a program from one MBC chip to another.
///
/// 0000-3FFF - ROM Bank 00 (Read Only)
/// 4000-7FFF - ROM Bank 01-7F (Read Only)
/// A000-BFFF - RAM Bank 00-03, if any (Read/Write)
/// 0000-1FFF - RAM Enable (Write Only)
/// 2000-3FFF - ROM Bank Number, low 5 bits (Write Only), 0 promoted to 1
/// 4000-5FFF - RAM Bank Number, or upper 2 bits of ROM Bank Number (Write Only)
/// 6000-7FFF - ROM/RAM Mode Select (Write Only)
pub struct Mbc1 {
    rom: Vec<u8>,
    ram: Vec<u8>,
    bank_mode: BankMode,
    rom_bank_low: u8,
    bank_hi: u8,
    ram_enabled: bool,
}

impl Mbc1 {
    pub fn new(rom: Vec<u8>, ram: Vec<u8>) -> Self {
        Self {
            rom,
            ram,
            bank_mode: BankMode::Rom,
            rom_bank_low: 0x01,
            bank_hi: 0x00,
            ram_enabled: false,
        }
    }

    fn rom_bank(&self) -> usize {
        let low = if self.rom_bank_low == 0 {
            1
        } else {
            self.rom_bank_low
        };
        let bank = match self.bank_mode {
            BankMode::Rom => (self.bank_hi << 5) | low,
            BankMode::Ram => low,
        };
        bank as usize
    }

    fn ram_bank(&self) -> usize {
        match self.bank_mode {
            BankMode::Rom => 0x00,
            BankMode::Ram => self.bank_hi as usize,
        }
    }

    fn rom_byte(&self, bank: usize, offset: usize) -> u8 {
        self.rom
            .get(bank * 0x4000 + offset)
            .copied()
            .unwrap_or(0xFF)
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x3FFF => self.rom.get(addr as usize).copied().unwrap_or(0xFF),
            0x4000..=0x7FFF => self.rom_byte(self.rom_bank(), addr as usize - 0x4000),
            0xA000..=0xBFFF => {
                if !self.ram_enabled {
                    return 0xFF;
                }
                let offset = self.ram_bank() * 0x2000 + (addr as usize - 0xA000);
                self.ram.get(offset).copied().unwrap_or(0xFF)
            }
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8) -> Result<()> {
        match addr {
            0x0000..=0x1FFF => self.ram_enabled = val & 0x0F == 0x0A,
            0x2000..=0x3FFF => self.rom_bank_low = val & 0x1F,
            0x4000..=0x5FFF => self.bank_hi = val & 0x03,
            0x6000..=0x7FFF => {
                self.bank_mode = if val & 0x01 == 0 {
                    BankMode::Rom
                } else {
                    BankMode::Ram
                };
            }
            0xA000..=0xBFFF => {
                if self.ram_enabled {
                    let offset = self.ram_bank() * 0x2000 + (addr as usize - 0xA000);
                    if let Some(byte) = self.ram.get_mut(offset) {
                        *byte = val;
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// MBC2 has a built-in 512x4-bit RAM, addressed by the low 9 bits of the address (bit 8 of the
/// address selects RAM-enable vs. ROM-bank-number control writes within $0000-3FFF).
/// https://gbdev.io/pandocs/MBC2.html
pub struct Mbc2 {
    rom: Vec<u8>,
    ram: [u8; 512],
    rom_bank: u8,
    ram_enabled: bool,
}

impl Mbc2 {
    pub fn new(rom: Vec<u8>) -> Self {
        Self {
            rom,
            ram: [0x00; 512],
            rom_bank: 0x01,
            ram_enabled: false,
        }
    }

    fn rom_bank(&self) -> usize {
        if self.rom_bank == 0 {
            1
        } else {
            self.rom_bank as usize
        }
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x3FFF => self.rom.get(addr as usize).copied().unwrap_or(0xFF),
            0x4000..=0x7FFF => self
                .rom
                .get(self.rom_bank() * 0x4000 + (addr as usize - 0x4000))
                .copied()
                .unwrap_or(0xFF),
            0xA000..=0xBFFF => {
                if !self.ram_enabled {
                    return 0xFF;
                }
                // Only the low 4 bits are wired; the upper nibble always reads high.
                0xF0 | (self.ram[(addr as usize - 0xA000) & 0x1FF] & 0x0F)
            }
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8) -> Result<()> {
        match addr {
            0x0000..=0x3FFF => {
                // Address bit 8 differentiates RAM-enable from ROM-bank-select writes.
                if addr & 0x0100 == 0 {
                    self.ram_enabled = val & 0x0F == 0x0A;
                } else {
                    let bank = val & 0x0F;
                    self.rom_bank = if bank == 0 { 1 } else { bank };
                }
            }
            0x4000..=0x7FFF => {}
            0xA000..=0xBFFF => {
                if self.ram_enabled {
                    self.ram[(addr as usize - 0xA000) & 0x1FF] = val & 0x0F;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// MBC3 adds RAM banks 0-7 and a real-time clock accessible through the same $4000-5FFF selector
/// (values 0-7 select a RAM bank, 8-C select an RTC register).
/// https://gbdev.io/pandocs/MBC3.html
pub struct Mbc3 {
    rom: Vec<u8>,
    ram: Vec<u8>,
    rom_bank: u8,
    selector: u8,
    ram_and_timer_enabled: bool,
    rtc: Rtc,
}

impl Mbc3 {
    pub fn new(rom: Vec<u8>, ram: Vec<u8>, clock: Box<dyn RtcClock + Send>) -> Self {
        Self {
            rom,
            ram,
            rom_bank: 0x01,
            selector: 0x00,
            ram_and_timer_enabled: false,
            rtc: Rtc::new(clock),
        }
    }

    fn rom_bank(&self) -> usize {
        if self.rom_bank == 0 {
            1
        } else {
            self.rom_bank as usize
        }
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x3FFF => self.rom.get(addr as usize).copied().unwrap_or(0xFF),
            0x4000..=0x7FFF => self
                .rom
                .get(self.rom_bank() * 0x4000 + (addr as usize - 0x4000))
                .copied()
                .unwrap_or(0xFF),
            0xA000..=0xBFFF => {
                if !self.ram_and_timer_enabled {
                    return 0xFF;
                }
                if self.selector <= 0x07 {
                    let offset = self.selector as usize * 0x2000 + (addr as usize - 0xA000);
                    self.ram.get(offset).copied().unwrap_or(0xFF)
                } else {
                    self.rtc.read(self.selector)
                }
            }
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8) -> Result<()> {
        match addr {
            0x0000..=0x1FFF => self.ram_and_timer_enabled = val & 0x0F == 0x0A,
            0x2000..=0x3FFF => {
                let bank = val & 0x7F;
                self.rom_bank = if bank == 0 { 1 } else { bank };
            }
            0x4000..=0x5FFF => self.selector = val,
            0x6000..=0x7FFF => self.rtc.write_latch_byte(val),
            0xA000..=0xBFFF => {
                if self.ram_and_timer_enabled {
                    if self.selector <= 0x07 {
                        let offset = self.selector as usize * 0x2000 + (addr as usize - 0xA000);
                        if let Some(byte) = self.ram.get_mut(offset) {
                            *byte = val;
                        }
                    } else {
                        self.rtc.write(self.selector, val);
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Dispatches reads/writes to whichever MBC variant this cartridge uses.
pub enum Mbc {
    None(RomOnly),
    Mbc1(Mbc1),
    Mbc2(Mbc2),
    Mbc3(Mbc3),
}

impl Mbc {
    pub fn read(&self, addr: u16) -> u8 {
        match self {
            Mbc::None(m) => m.read(addr),
            Mbc::Mbc1(m) => m.read(addr),
            Mbc::Mbc2(m) => m.read(addr),
            Mbc::Mbc3(m) => m.read(addr),
        }
    }

    pub fn write(&mut self, addr: u16, val: u8) -> Result<()> {
        match self {
            Mbc::None(m) => m.write(addr, val),
            Mbc::Mbc1(m) => m.write(addr, val),
            Mbc::Mbc2(m) => m.write(addr, val),
            Mbc::Mbc3(m) => m.write(addr, val),
        }
    }
}

/// Classify a cartridge-type header byte into the MBC kind this core implements, or reject it.
pub fn classify(cartridge_type: u8, rom: Vec<u8>, ram: Vec<u8>) -> Result<Mbc> {
    match cartridge_type {
        0x00 | 0x08 | 0x09 => Ok(Mbc::None(RomOnly::new(rom, ram))),
        0x01 | 0x02 | 0x03 => Ok(Mbc::Mbc1(Mbc1::new(rom, ram))),
        0x05 | 0x06 => Ok(Mbc::Mbc2(Mbc2::new(rom))),
        0x0F | 0x10 | 0x11 | 0x12 | 0x13 => {
            Ok(Mbc::Mbc3(Mbc3::new(rom, ram, Box::new(SystemRtcClock))))
        }
        other => Err(Error::UnsupportedMbc(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rom_only_rejects_bank_control_writes() {
        let mut mbc = RomOnly::new(vec![0u8; 0x8000], vec![]);
        assert!(matches!(mbc.write(0x2000, 0x01), Err(Error::IllegalMemoryWrite(0x2000))));
        assert!(matches!(mbc.write(0x6000, 0x01), Err(Error::IllegalMemoryWrite(0x6000))));
    }

    #[test]
    fn rom_only_accepts_ram_enable_as_a_no_op() {
        let mut mbc = RomOnly::new(vec![0u8; 0x8000], vec![]);
        mbc.write(0x0000, 0x0A).unwrap();
    }

    #[test]
    fn mbc1_promotes_bank_zero_to_one() {
        let rom = vec![0u8; 0x4000 * 4];
        let mut mbc = Mbc1::new(rom, vec![]);
        mbc.write(0x2000, 0x00).unwrap();
        assert_eq!(mbc.rom_bank(), 1);
    }

    #[test]
    fn mbc1_ram_is_disabled_by_default() {
        let mbc = Mbc1::new(vec![0u8; 0x4000], vec![0u8; 0x2000]);
        assert_eq!(mbc.read(0xA000), 0xFF);
    }

    #[test]
    fn mbc1_ram_enable_then_write_round_trips() {
        let mut mbc = Mbc1::new(vec![0u8; 0x4000], vec![0u8; 0x2000]);
        mbc.write(0x0000, 0x0A).unwrap();
        mbc.write(0xA010, 0x42).unwrap();
        assert_eq!(mbc.read(0xA010), 0x42);
    }

    #[test]
    fn mbc2_ram_reads_only_low_nibble() {
        let mut mbc = Mbc2::new(vec![0u8; 0x4000]);
        mbc.write(0x0000, 0x0A).unwrap();
        mbc.write(0xA000, 0xFF).unwrap();
        assert_eq!(mbc.read(0xA000), 0xFF);
        mbc.write(0xA000, 0x03).unwrap();
        assert_eq!(mbc.read(0xA000), 0xF3);
    }

    #[test]
    fn mbc3_rtc_latches_on_zero_to_one_transition() {
        let mut mbc =
            Mbc3::new(vec![0u8; 0x4000], vec![0u8; 0x2000], Box::new(FixedRtcClock(90)));
        mbc.write(0x0000, 0x0A).unwrap();
        mbc.write(0x4000, 0x08).unwrap();
        mbc.write(0x6000, 0x00).unwrap();
        mbc.write(0x6000, 0x01).unwrap();
        assert_eq!(mbc.read(0xA000), 30);
    }

    #[test]
    fn classify_rejects_mbc5() {
        assert!(matches!(
            classify(0x19, vec![], vec![]),
            Err(Error::UnsupportedMbc(0x19))
        ));
    }
}
