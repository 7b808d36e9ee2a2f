//! Reset and clock control.

use critical_section::CriticalSection;

mod clock;
pub use clock::*;

mod clock_read;
pub use clock_read::read_clocks_from_hw;

mod clock_switch;
pub use clock_switch::{ClockError, Rcc, SwitchState, WaitStage};

mod clock_config;
pub use clock_config::{init, Config, ConfigBuilder, FlashLatency};

mod mco;
pub use mco::{McoChannel, McoPrescaler, McoSource};

use crate::pac::RegisterFile;
use crate::Peripheral;

/// Enables peripheral `p`.
pub fn enable_with_cs<R: RegisterFile>(regs: &R, p: Peripheral, _cs: CriticalSection) {
    regs.set(p.enable_field(), 1);
}

/// Enables peripheral `p`.
pub fn enable<R: RegisterFile>(regs: &R, p: Peripheral) {
    critical_section::with(|cs| enable_with_cs(regs, p, cs));
}

/// Enables and resets peripheral `p`.
///
/// Peripherals without a reset line of their own are only enabled.
pub fn enable_and_reset_with_cs<R: RegisterFile>(regs: &R, p: Peripheral, _cs: CriticalSection) {
    regs.set(p.enable_field(), 1);
    if let Some(reset) = p.reset_field() {
        regs.set(reset, 1);
        regs.set(reset, 0);
    }
}

/// Enables and resets peripheral `p`.
///
/// Peripherals without a reset line of their own are only enabled.
pub fn enable_and_reset<R: RegisterFile>(regs: &R, p: Peripheral) {
    critical_section::with(|cs| enable_and_reset_with_cs(regs, p, cs));
}

/// Disables peripheral `p`.
pub fn disable_with_cs<R: RegisterFile>(regs: &R, p: Peripheral, _cs: CriticalSection) {
    regs.set(p.enable_field(), 0);
}

/// Disables peripheral `p`.
pub fn disable<R: RegisterFile>(regs: &R, p: Peripheral) {
    critical_section::with(|cs| disable_with_cs(regs, p, cs));
}

/// Whether the clock of peripheral `p` is gated on.
pub fn is_enabled<R: RegisterFile>(regs: &R, p: Peripheral) -> bool {
    regs.is_set(p.enable_field())
}

/// Kernel clock frequency of peripheral `p` in the tree `clocks`.
pub fn frequency(clocks: &Clocks, p: Peripheral) -> crate::time::Hertz {
    clocks.bus(p.bus_clock())
}

#[cfg(test)]
mod tests;
