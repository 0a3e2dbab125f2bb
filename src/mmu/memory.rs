use crate::error::Result;

/// The single-byte read/write surface every address-space consumer (CPU, external observers)
/// goes through. `read` always succeeds (§3 invariant); `write` can fail for illegal targets.
pub trait Memory {
    fn read(&self, addr: u16) -> u8;
    fn write(&mut self, addr: u16, val: u8) -> Result<()>;
}
