//! Emulation settings and preferences.

/// The hardware specification for the different models differ; this core implements DMG and CGB
/// bus behavior (bank-switched WRAM/VRAM), per the Non-goals in the spec only MBC1/2/3 cartridges
/// are supported regardless of model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareModel {
    /// Original GameBoy (DMG-01).
    Dmg,
    /// GameBoy Color.
    Cgb,
}

/// Emulation settings and preferences, built from CLI arguments in `main`.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// The model of the emulated machine; gates CGB-only bus registers ($FF4F, $FF70) and WRAM
    /// bank-0-is-1 treatment.
    pub model: HardwareModel,
    /// Skip the boot ROM and seed CPU/Bus state directly to the post-boot values from §4.5.
    pub skip_boot: bool,
    /// Testing mode: implies `skip_boot` and loads the ROM path directly without a boot ROM.
    pub testing: bool,
}

impl Config {
    /// Construct a config for CGB or DMG emulation.
    pub fn new(model: HardwareModel, skip_boot: bool, testing: bool) -> Self {
        Self {
            model,
            skip_boot: skip_boot || testing,
            testing,
        }
    }

    /// True when the bus should expose CGB-only registers and multi-bank WRAM/VRAM switching.
    pub fn is_cgb(&self) -> bool {
        self.model == HardwareModel::Cgb
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            model: HardwareModel::Dmg,
            skip_boot: false,
            testing: false,
        }
    }
}
