//! Cartridge loading: ROM file -> validated header -> classified MBC -> read/write surface.

pub mod header;
pub mod mbc;

use crate::error::{Error, Result};
use header::{CartridgeHeader, RamSize, RomSize};
use log::info;
use mbc::Mbc;

/// A loaded Game Boy cartridge: its ROM image, backing RAM, parsed header, and the MBC that
/// multiplexes both into the 16-bit address space.
pub struct Cartridge {
    header: CartridgeHeader,
    mbc: Mbc,
}

impl Cartridge {
    /// Assemble a cartridge from an already-parsed header and classified MBC. Exposed for tests
    /// that build in-memory ROM images rather than reading from disk.
    #[cfg(test)]
    pub fn from_parts(header: CartridgeHeader, mbc: Mbc) -> Self {
        Self { header, mbc }
    }

    /// Read a ROM file from disk, validate its header, and classify its MBC.
    pub fn load(path: &str) -> Result<Self> {
        let rom = std::fs::read(path).map_err(|_| Error::FileNotFound(path.to_string()))?;
        let header = CartridgeHeader::parse(&rom)?;

        let ram_len = if header.cartridge_type == 0x05 || header.cartridge_type == 0x06 {
            // MBC2 always carries its own 512 half-bytes, regardless of the RAM-size byte.
            512
        } else {
            RamSize::try_from(header.ram_size)
                .map(|size| size.byte_len())
                .unwrap_or(0)
        };
        let mut ram = Vec::new();
        ram.try_reserve_exact(ram_len)
            .map_err(|_| Error::MemoryAllocationFailure(ram_len))?;
        ram.resize(ram_len, 0u8);

        info!("Loaded ROM: {}", path);
        info!("Title: {}", header.title);
        info!("Cartridge type: {:#04x}", header.cartridge_type);

        let mbc = mbc::classify(header.cartridge_type, rom, ram)?;
        Ok(Self { header, mbc })
    }

    pub fn read(&self, addr: u16) -> u8 {
        self.mbc.read(addr)
    }

    pub fn write(&mut self, addr: u16, val: u8) -> Result<()> {
        self.mbc.write(addr, val)
    }

    pub fn title(&self) -> &str {
        &self.header.title
    }

    pub fn is_cgb(&self) -> bool {
        self.header.is_cgb()
    }

    pub fn cartridge_type(&self) -> u8 {
        self.header.cartridge_type
    }

    pub fn rom_size(&self) -> Option<RomSize> {
        RomSize::try_from(self.header.rom_size).ok()
    }

    pub fn ram_size(&self) -> Option<RamSize> {
        RamSize::try_from(self.header.ram_size).ok()
    }

    pub fn destination_code(&self) -> u8 {
        self.header.destination_code
    }

    pub fn new_licensee_code(&self) -> u8 {
        self.header.new_licensee_code
    }

    pub fn old_licensee_code(&self) -> u8 {
        self.header.old_licensee_code
    }
}
