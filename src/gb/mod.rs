//! `Gameboy` is the composition root: Cartridge -> Bus -> Cpu (owned in that order per §3), plus
//! the shared `InterruptController` external collaborators use via `request_interrupt`.

use crate::cartridge::Cartridge;
use crate::config::Config;
use crate::cpu::interrupts::{InterruptController, InterruptKind};
use crate::cpu::Cpu;
use crate::error::{Error, Result};
use crate::mmu::Bus;
use log::info;

pub struct Gameboy {
    cpu: Cpu,
    interrupts: InterruptController,
}

impl Gameboy {
    /// Load `rom_path`, wire up the Bus and CPU, and seed post-boot state. Real boot ROM bytes are
    /// Nintendo IP and out of scope, so boot execution is never performed; `config.skip_boot` is
    /// carried for CLI/API completeness but post-boot state is always seeded directly.
    pub fn init(rom_path: &str, config: Config) -> Result<Self> {
        let cartridge = Cartridge::load(rom_path)?;
        let interrupts = InterruptController::new();
        let bus = Bus::new(cartridge, config, interrupts.clone());
        let mut cpu = Cpu::new(bus);
        cpu.reset_post_boot();

        info!("Gameboy initialized ({:?})", config.model);
        Ok(Self { cpu, interrupts })
    }

    /// Run one fetch-decode-execute step (or interrupt dispatch / HALT no-op).
    pub fn step(&mut self) -> Result<u8> {
        self.cpu.step()
    }

    /// Step until the CPU executes STOP or a step returns an error.
    pub fn run(&mut self) -> Result<()> {
        while !self.cpu.stopped() {
            self.step()?;
        }
        Ok(())
    }

    /// Publish an interrupt request from an external collaborator (§6).
    pub fn request_interrupt(&self, kind: u8) -> Result<()> {
        let kind = InterruptKind::from_index(kind).ok_or(Error::UnknownInterruptRequested(kind))?;
        self.interrupts.request(kind);
        Ok(())
    }

    pub fn bus_read(&self, addr: u16) -> u8 {
        self.cpu.bus_read(addr)
    }

    pub fn bus_write(&mut self, addr: u16, val: u8) -> Result<()> {
        self.cpu.bus_write(addr, val)
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }
}
