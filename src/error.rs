//! Flat, enumerated error taxonomy for the emulation core.
//!
//! No exceptions cross abstraction boundaries: the CPU and Bus return a `Result` on every
//! fallible operation, and the step loop checks after every step and exits cleanly.

use std::fmt;

/// Errors that can occur while loading a cartridge or executing the emulation core.
pub enum Error {
    /// A write targeted the unusable region ($FEA0-$FEFF) or another region that rejects writes.
    IllegalMemoryWrite(u16),
    /// A RAM/ROM buffer could not be allocated at the requested size.
    MemoryAllocationFailure(usize),
    /// The ROM file could not be found.
    FileNotFound(String),
    /// The ROM file exists but could not be read.
    RomReadFailure(String),
    /// The cartridge header checksum did not match byte $014D.
    HeaderChecksumFailed { expected: u8, computed: u8 },
    /// The cartridge-type byte names an MBC this core does not implement.
    UnsupportedMbc(u8),
    /// The opcode at this address is one of the eleven undefined SM83 opcodes.
    IllegalInstruction { opcode: u8, address: u16 },
    /// `request_interrupt` was called with an interrupt kind this core does not recognize.
    UnknownInterruptRequested(u8),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::IllegalMemoryWrite(addr) => {
                write!(f, "illegal write to address {:#06x}", addr)
            }
            Error::MemoryAllocationFailure(size) => {
                write!(f, "failed to allocate {} bytes", size)
            }
            Error::FileNotFound(path) => write!(f, "ROM file not found: {}", path),
            Error::RomReadFailure(path) => write!(f, "failed to read ROM file: {}", path),
            Error::HeaderChecksumFailed { expected, computed } => write!(
                f,
                "header checksum mismatch: expected {:#04x}, computed {:#04x}",
                expected, computed
            ),
            Error::UnsupportedMbc(byte) => {
                write!(f, "unsupported cartridge type byte {:#04x}", byte)
            }
            Error::IllegalInstruction { opcode, address } => write!(
                f,
                "illegal instruction {:#04x} at address {:#06x}",
                opcode, address
            ),
            Error::UnknownInterruptRequested(kind) => {
                write!(f, "unknown interrupt kind requested: {}", kind)
            }
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (self as &dyn fmt::Display).fmt(f)
    }
}

impl std::error::Error for Error {}

/// Convenience alias used throughout the core.
pub type Result<T> = std::result::Result<T, Error>;
