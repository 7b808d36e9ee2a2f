#![cfg_attr(not(test), no_std)]
#![doc = include_str!("../README.md")]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod utils;

pub mod pac;
pub mod rcc;
pub mod gpio;
pub mod usart;
pub mod systick;
pub mod time;

use core::sync::atomic::{AtomicBool, Ordering};

/// HAL configuration for the STM32F4
pub mod config {
    use crate::rcc;
    use crate::utils::PollLimit;

    /// HAL configuration passed when initializing.
    #[non_exhaustive]
    pub struct Config {
        pub rcc: rcc::Config,
        /// Bound on every wait for an oscillator, the PLL or a clock switch.
        pub poll_limit: PollLimit,
    }

    impl Default for Config {
        fn default() -> Self {
            Self {
                rcc: rcc::Config::default(),
                poll_limit: PollLimit::Unbounded,
            }
        }
    }
}
pub use config::Config;

static REGS: pac::Mmio = unsafe { pac::Mmio::steal() };
static TAKEN: AtomicBool = AtomicBool::new(false);

/// Initialize the clock tree with the provided configuration.
///
/// Returns the clock controller over the memory-mapped registers, from which
/// [`registers`] hands out further drivers.
///
/// This should only be called once at startup, otherwise it panics.
pub fn init(config: Config) -> Result<rcc::Rcc<'static, pac::Mmio>, rcc::ClockError> {
    if TAKEN.swap(true, Ordering::AcqRel) {
        panic!("init called more than once");
    }
    rcc::init(&REGS, config.rcc, config.poll_limit)
}

/// Memory-mapped register file shared by every driver on the chip.
///
/// Only meaningful after [`init`].
pub fn registers() -> &'static pac::Mmio {
    &REGS
}

pub(crate) mod _generated {
    #![allow(dead_code)]
    #![allow(unused_imports)]
    #![allow(non_snake_case)]
    #![allow(missing_docs)]
    #![allow(clippy::all)]

    include!(concat!(env!("OUT_DIR"), "/_generated.rs"));
}

pub use _generated::{Peripheral, Port, UsartInstance};
