//! SysTick busy-wait delays.
//!
//! The 24-bit SysTick counter is set up once for a period of one time unit and
//! every delay then counts wrap-arounds. Writing `VAL` restarts the period, so a
//! delay of `n` units is `n` restarted periods plus the polling overhead of each
//! one; expect it to run about 2% long. Nothing corrects for that.
//!
//! Do not call into a [`SysTick`] from an interrupt handler while a delay is in
//! progress.

use core::fmt;

use crate::pac::{Reg, RegisterFile, SYSTICK};
use crate::time::Hertz;
use crate::utils::relax;

const CTRL: Reg = SYSTICK.ctrl().reg();
const LOAD: Reg = SYSTICK.load().reg();
const VAL: Reg = SYSTICK.val().reg();

/// Largest value the 24-bit reload register holds.
const MAX_RELOAD: u32 = SYSTICK.load().reload().mask();

#[non_exhaustive]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// `reload_ticks - 1` does not fit the 24-bit reload register.
    ReloadOutOfRange,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ReloadOutOfRange => write!(f, "SysTick reload value out of range"),
        }
    }
}

impl core::error::Error for ConfigError {}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimeUnit {
    Micros,
    Millis,
}

impl TimeUnit {
    /// `count` units in microseconds, saturating.
    pub const fn to_micros(self, count: u32) -> u32 {
        match self {
            TimeUnit::Micros => count,
            TimeUnit::Millis => count.saturating_mul(1000),
        }
    }

    const fn per_second(self) -> u32 {
        match self {
            TimeUnit::Micros => 1_000_000,
            TimeUnit::Millis => 1_000,
        }
    }
}

/// SysTick driver.
pub struct SysTick<'d, R: RegisterFile> {
    regs: &'d R,
}

impl<'d, R: RegisterFile> SysTick<'d, R> {
    pub fn new(regs: &'d R) -> Self {
        Self { regs }
    }

    /// Runs the counter from the processor clock with a period of `reload_ticks`.
    pub fn configure(&mut self, reload_ticks: u32, interrupt: bool) -> Result<(), ConfigError> {
        let reload = reload_ticks.wrapping_sub(1);
        if reload > MAX_RELOAD {
            return Err(ConfigError::ReloadOutOfRange);
        }

        self.regs.write(CTRL, 0);
        self.regs.write(LOAD, reload);
        self.regs.write(VAL, 0);

        let ctrl = SYSTICK.ctrl();
        let mut value = ctrl.enable().mask() | ctrl.clksource().mask();
        if interrupt {
            value |= ctrl.tickint().mask();
        }
        self.regs.write(CTRL, value);

        trace!("systick: reload {}, interrupt {}", reload, interrupt);
        Ok(())
    }

    /// Period of one `unit` at `cpu_clock`.
    ///
    /// Delays in either unit assume a microsecond period.
    pub fn configure_timebase(&mut self, cpu_clock: Hertz, unit: TimeUnit) -> Result<(), ConfigError> {
        self.configure(cpu_clock.0 / unit.per_second(), false)
    }

    /// Busy-waits `count` periods, with milliseconds counted as 1000 periods each.
    pub fn delay(&mut self, count: u32, unit: TimeUnit) {
        for _ in 0..unit.to_micros(count) {
            self.regs.write(VAL, 0);
            while !self.regs.is_set(SYSTICK.ctrl().countflag()) {
                relax();
            }
        }
    }

    /// Stops the counter.
    pub fn deconfigure(&mut self) {
        self.regs.write(CTRL, 0);
    }
}

impl<'d, R: RegisterFile> embedded_hal_1::delay::DelayNs for SysTick<'d, R> {
    fn delay_ns(&mut self, ns: u32) {
        self.delay(ns.div_ceil(1000), TimeUnit::Micros);
    }

    fn delay_us(&mut self, us: u32) {
        self.delay(us, TimeUnit::Micros);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delay(ms, TimeUnit::Millis);
    }
}

impl<'d, R: RegisterFile> embedded_hal_02::blocking::delay::DelayUs<u32> for SysTick<'d, R> {
    fn delay_us(&mut self, us: u32) {
        self.delay(us, TimeUnit::Micros);
    }
}

impl<'d, R: RegisterFile> embedded_hal_02::blocking::delay::DelayUs<u16> for SysTick<'d, R> {
    fn delay_us(&mut self, us: u16) {
        self.delay(us as u32, TimeUnit::Micros);
    }
}

impl<'d, R: RegisterFile> embedded_hal_02::blocking::delay::DelayMs<u32> for SysTick<'d, R> {
    fn delay_ms(&mut self, ms: u32) {
        self.delay(ms, TimeUnit::Millis);
    }
}

impl<'d, R: RegisterFile> embedded_hal_02::blocking::delay::DelayMs<u16> for SysTick<'d, R> {
    fn delay_ms(&mut self, ms: u16) {
        self.delay(ms as u32, TimeUnit::Millis);
    }
}

#[cfg(test)]
mod tests;
