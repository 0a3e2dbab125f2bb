//! FF0F - IF - Interrupt Flag (R/W), and the shared interrupt-publishing surface.
//!
//! Bit 0: V-Blank  Interrupt Request (INT 40h)  (1=Request)
//! Bit 1: LCD STAT Interrupt Request (INT 48h)  (1=Request)
//! Bit 2: Timer    Interrupt Request (INT 50h)  (1=Request)
//! Bit 3: Serial   Interrupt Request (INT 58h)  (1=Request)
//! Bit 4: Joypad   Interrupt Request (INT 60h)  (1=Request)
//!
//! The source kept IF as a plain field reachable only from inside the Bus. Per the concurrency
//! model, every mutation of IF (CPU dispatch, Timer overflow, and external collaborators calling
//! `request_interrupt`) must go through one lock, so external callers never need direct access to
//! Bus internals.

use std::sync::{Arc, Mutex};

/// The five interrupt sources recognized by the dispatcher, in priority order (lowest index wins
/// when more than one bit is set in `IE & IF`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptKind {
    VBlank = 0,
    LcdStat = 1,
    Timer = 2,
    Serial = 3,
    Joypad = 4,
}

impl InterruptKind {
    pub fn bit(self) -> u8 {
        1 << (self as u8)
    }

    pub fn vector(self) -> u16 {
        0x0040 + (self as u16) * 8
    }

    /// Decode a raw `request_interrupt` kind byte (0..=4), as accepted from external collaborators.
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(InterruptKind::VBlank),
            1 => Some(InterruptKind::LcdStat),
            2 => Some(InterruptKind::Timer),
            3 => Some(InterruptKind::Serial),
            4 => Some(InterruptKind::Joypad),
            _ => None,
        }
    }

    /// Return the lowest-priority-numbered kind with a set bit in `mask`, if any.
    pub fn lowest_set(mask: u8) -> Option<Self> {
        for i in 0..5 {
            if mask & (1 << i) != 0 {
                return InterruptKind::from_index(i);
            }
        }
        None
    }
}

/// Owns the IF register behind a mutex so the CPU (at dispatch), the Timer (on overflow), and
/// external collaborators (`request_interrupt`) can all publish/consume requests with one
/// mutual-exclusion discipline, instead of reaching into Bus internals directly.
#[derive(Clone)]
pub struct InterruptController {
    if_: Arc<Mutex<u8>>,
}

impl InterruptController {
    pub fn new() -> Self {
        Self {
            if_: Arc::new(Mutex::new(0)),
        }
    }

    /// Set a bit in IF. Thread-safe: this is the only entry point external collaborators use.
    pub fn request(&self, kind: InterruptKind) {
        let mut guard = self.if_.lock().unwrap();
        *guard |= kind.bit();
    }

    /// Clear a bit in IF (used by the CPU once an interrupt has been dispatched).
    pub fn clear(&self, kind: InterruptKind) {
        let mut guard = self.if_.lock().unwrap();
        *guard &= !kind.bit();
    }

    /// Raw IF value, masked to the 5 meaningful bits.
    pub fn get_raw(&self) -> u8 {
        *self.if_.lock().unwrap() & 0x1F
    }

    /// Overwrite IF directly (used when the CPU writes $FF0F).
    pub fn set_raw(&self, value: u8) {
        let mut guard = self.if_.lock().unwrap();
        *guard = value & 0x1F;
    }
}

impl Default for InterruptController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_sets_the_matching_bit() {
        let ctrl = InterruptController::new();
        ctrl.request(InterruptKind::Timer);
        assert_eq!(ctrl.get_raw(), 0b0000_0100);
    }

    #[test]
    fn lowest_set_prefers_vblank_over_timer() {
        assert_eq!(
            InterruptKind::lowest_set(InterruptKind::Timer.bit() | InterruptKind::VBlank.bit()),
            Some(InterruptKind::VBlank)
        );
    }

    #[test]
    fn clear_only_affects_its_own_bit() {
        let ctrl = InterruptController::new();
        ctrl.request(InterruptKind::Timer);
        ctrl.request(InterruptKind::Joypad);
        ctrl.clear(InterruptKind::Timer);
        assert_eq!(ctrl.get_raw(), InterruptKind::Joypad.bit());
    }
}
