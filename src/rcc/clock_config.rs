//! Clock configuration, initialization, and runtime reconfiguration.

use core::cmp::max;

use super::{
    AhbPrescaler, ApbPrescaler, BusPrescalers, ClockError, ClockSource, Hse, HseMode, Pll, PllPDiv,
    PllSource, Rcc, RtcPrescaler,
};
use super::{
    HCLK_MAX, HSE_MAX, HSE_MIN, HSI_FREQ, PCLK1_MAX, PCLK2_MAX, PLL48_MAX, RTC_MAX, SYSCLK_MAX,
    VCO_IN_MAX, VCO_IN_MIN, VCO_OUT_MAX, VCO_OUT_MIN,
};
use crate::pac::{RegisterFile, FLASH};
use crate::time::Hertz;
use crate::utils::PollLimit;

/// Flash access time above which one more wait state is needed (2.7 V to 3.6 V).
const FLASH_WS_STEP_HZ: u32 = 30_000_000;
const FLASH_WS_MAX: u8 = 7;

/// Flash wait states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashLatency {
    /// Derived from HCLK for a 2.7 V to 3.6 V supply.
    Auto,
    Fixed(u8),
}

impl FlashLatency {
    pub const fn wait_states(self, hclk: Hertz) -> u8 {
        match self {
            FlashLatency::Auto => {
                if hclk.0 == 0 {
                    0
                } else {
                    ((hclk.0 - 1) / FLASH_WS_STEP_HZ) as u8
                }
            }
            FlashLatency::Fixed(ws) => ws,
        }
    }
}

/// Clock configuration
///
/// Defaults to the reset state: 16 MHz HSI, no PLL, all buses undivided.
/// [`ConfigBuilder::hse_168mhz`] gives the usual full-speed setup.
#[non_exhaustive]
#[derive(Clone, Copy, Debug)]
pub struct ConfigBuilder {
    /// System clock source
    pub sys: ClockSource,
    /// External oscillator, if fitted
    pub hse: Option<Hse>,
    /// Main PLL, required when `sys` is [`ClockSource::Pll`]
    pub pll: Option<Pll>,
    /// AHB, APB1, APB2 and RTC dividers
    pub prescalers: BusPrescalers,
    pub flash_latency: FlashLatency,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    pub const fn new() -> Self {
        Self {
            sys: ClockSource::Hsi,
            hse: None,
            pll: None,
            prescalers: BusPrescalers::new(),
            flash_latency: FlashLatency::Auto,
        }
    }

    /// 168 MHz sysclk and 48 MHz PLL48 from an 8 MHz crystal.
    ///
    /// - HCLK = 168 MHz
    /// - PCLK1 = 168 MHz / 4 = 42 MHz
    /// - PCLK2 = 168 MHz / 2 = 84 MHz
    pub const fn hse_168mhz() -> Self {
        Self {
            sys: ClockSource::Pll,
            hse: Some(Hse { freq: Hertz(8_000_000), mode: HseMode::Oscillator }),
            pll: Some(Pll {
                source: PllSource::Hse,
                prediv: 8,
                mul: 336,
                divp: PllPDiv::Div2,
                divq: 7,
            }),
            prescalers: BusPrescalers {
                ahb: AhbPrescaler::Div1,
                apb1: ApbPrescaler::Div4,
                apb2: ApbPrescaler::Div2,
                rtc: RtcPrescaler::NONE,
            },
            flash_latency: FlashLatency::Auto,
        }
    }

    pub const fn with_sys(mut self, sys: ClockSource) -> Self {
        self.sys = sys;
        self
    }

    pub const fn with_hse(mut self, hse: Hse) -> Self {
        self.hse = Some(hse);
        self
    }

    pub const fn with_pll(mut self, pll: Pll) -> Self {
        self.pll = Some(pll);
        self
    }

    pub const fn with_prescalers(mut self, prescalers: BusPrescalers) -> Self {
        self.prescalers = prescalers;
        self
    }

    pub const fn with_flash_latency(mut self, flash_latency: FlashLatency) -> Self {
        self.flash_latency = flash_latency;
        self
    }

    /// Validate the clock configuration at compile time.
    ///
    /// Panics with a descriptive message if the configuration is invalid.
    /// Use inside `const { }` blocks to get compile-time errors.
    ///
    /// Note: Uses `::core::panic!` to bypass defmt's panic override,
    /// which is not const-compatible.
    pub const fn check(&self) {
        // Check sysclk source consistency
        match self.sys {
            ClockSource::Pll => {
                if self.pll.is_none() {
                    ::core::panic!("sysclk is set to PLL, but pll is None");
                }
            }
            ClockSource::Hse => {
                if self.hse.is_none() {
                    ::core::panic!("sysclk is set to HSE, but hse is None");
                }
            }
            ClockSource::Hsi => {}
        }

        if let Some(hse) = self.hse {
            if hse.freq.0 < HSE_MIN.0 || hse.freq.0 > HSE_MAX.0 {
                ::core::panic!("HSE frequency out of range (4-26 MHz)");
            }
        }

        if let Some(pll) = self.pll {
            let input_hz = match pll.source {
                PllSource::Hsi => HSI_FREQ.0,
                PllSource::Hse => match self.hse {
                    Some(hse) => hse.freq.0,
                    None => ::core::panic!("PLL source is HSE, but hse is None"),
                },
            };

            if pll.prediv < 2 || pll.prediv > 63 {
                ::core::panic!("PLL M out of range (2-63)");
            }
            if pll.mul < 50 || pll.mul > 432 {
                ::core::panic!("PLL N out of range (50-432)");
            }
            if pll.divq < 2 || pll.divq > 15 {
                ::core::panic!("PLL Q out of range (2-15)");
            }

            let vco_in = pll.vco_in_hz(input_hz);
            if vco_in < VCO_IN_MIN.0 || vco_in > VCO_IN_MAX.0 {
                ::core::panic!("PLL VCO input out of range (1-2 MHz), adjust M");
            }
            let vco_out = pll.vco_out_hz(input_hz);
            if vco_out < VCO_OUT_MIN.0 || vco_out > VCO_OUT_MAX.0 {
                ::core::panic!("PLL VCO output out of range (100-432 MHz), adjust N");
            }

            #[cfg(not(feature = "unchecked-overclocking"))]
            {
                if pll.q_output_hz(input_hz) > PLL48_MAX.0 {
                    ::core::panic!("PLL48 frequency exceeds maximum limit (48 MHz), increase Q");
                }
            }
        }

        // Check frequency limits
        #[cfg(not(feature = "unchecked-overclocking"))]
        {
            if self.get_sysclk_freq_hz() > SYSCLK_MAX.0 {
                ::core::panic!("sysclk frequency exceeds maximum limit (168 MHz)");
            }
            let hclk_hz = self.get_hclk_freq_hz();
            if hclk_hz > HCLK_MAX.0 {
                ::core::panic!("HCLK frequency exceeds maximum limit (168 MHz)");
            }
            if hclk_hz / self.prescalers.apb1.divisor() > PCLK1_MAX.0 {
                ::core::panic!("PCLK1 exceeds maximum limit (42 MHz), increase apb1");
            }
            if hclk_hz / self.prescalers.apb2.divisor() > PCLK2_MAX.0 {
                ::core::panic!("PCLK2 exceeds maximum limit (84 MHz), increase apb2");
            }
            if let (Some(hse), Some(div)) = (self.hse, self.prescalers.rtc.divisor()) {
                if hse.freq.0 / div > RTC_MAX.0 {
                    ::core::panic!("RTC clock exceeds maximum limit (1 MHz), increase rtc");
                }
            }
        }

        if let FlashLatency::Fixed(ws) = self.flash_latency {
            if ws > FLASH_WS_MAX {
                ::core::panic!("flash latency out of range (0-7)");
            }
        }
    }

    /// Validate and return a [`Config`]. Use in `const { }` blocks for compile-time checking.
    ///
    /// ```rust,ignore
    /// const { rcc::ConfigBuilder::hse_168mhz().checked() }
    /// ```
    pub const fn checked(self) -> Config {
        self.check();
        Config(self)
    }

    pub(crate) const fn get_sysclk_freq_hz(&self) -> u32 {
        match self.sys {
            ClockSource::Hsi => HSI_FREQ.0,
            ClockSource::Hse => match self.hse {
                Some(hse) => hse.freq.0,
                None => ::core::panic!("HSE is not configured"),
            },
            ClockSource::Pll => match self.pll {
                Some(pll) => {
                    let input_hz = match pll.source {
                        PllSource::Hsi => HSI_FREQ.0,
                        PllSource::Hse => match self.hse {
                            Some(hse) => hse.freq.0,
                            None => ::core::panic!("HSE is not configured"),
                        },
                    };
                    pll.p_output_hz(input_hz)
                }
                None => ::core::panic!("PLL is not configured"),
            },
        }
    }

    pub(crate) const fn get_hclk_freq_hz(&self) -> u32 {
        self.get_sysclk_freq_hz() / self.prescalers.ahb.divisor()
    }
}

/// A validated clock configuration.
///
/// Can only be constructed via [`ConfigBuilder::checked()`], which validates at
/// compile time when used inside a `const { }` block.
#[derive(Clone, Copy, Debug)]
pub struct Config(pub(crate) ConfigBuilder);

impl Config {
    pub fn builder(&self) -> &ConfigBuilder {
        &self.0
    }
}

impl Default for Config {
    fn default() -> Self {
        const { ConfigBuilder::new().checked() }
    }
}

// =============================================================================
// Flash access control
// =============================================================================

fn set_flash_latency<R: RegisterFile>(regs: &R, ws: u8) {
    trace!("rcc: flash latency {} wait states", ws);
    regs.set(FLASH.acr().latency(), ws as u32);
}

// =============================================================================
// Runtime Reconfiguration
// =============================================================================

impl<'d, R: RegisterFile> Rcc<'d, R> {
    /// Applies a whole configuration: source, PLL, prescalers and flash wait
    /// states.
    ///
    /// Wait states are raised before the clock speeds up and lowered only after
    /// it has slowed down. The switch itself resets the AHB prescaler, so until
    /// the new prescalers land HCLK runs at the undivided sysclk and the wait
    /// states must cover that too.
    pub fn reconfigure(&mut self, config: Config) -> Result<(), ClockError> {
        let config = &config.0;
        let target_ws = config.flash_latency.wait_states(Hertz(config.get_hclk_freq_hz()));
        let switch_ws = max(target_ws, FlashLatency::Auto.wait_states(Hertz(config.get_sysclk_freq_hz())));
        let current_ws = self.regs.get(FLASH.acr().latency()) as u8;

        if switch_ws > current_ws {
            set_flash_latency(self.regs, switch_ws);
        }

        let sysclk = self.select_system_clock_source(config.sys, config.pll)?;
        self.apply_bus_prescalers(sysclk, config.prescalers);

        if target_ws < max(current_ws, switch_ws) {
            set_flash_latency(self.regs, target_ws);
        }

        let acr = FLASH.acr();
        self.regs.modify(acr.reg(), |r| r | acr.prften().mask() | acr.icen().mask() | acr.dcen().mask());

        info!(
            "rcc: sysclk {} Hz, hclk {} Hz, pclk1 {} Hz, pclk2 {} Hz, {} wait states",
            self.clocks().sysclk.0,
            self.clocks().hclk.0,
            self.clocks().pclk1.0,
            self.clocks().pclk2.0,
            target_ws
        );
        Ok(())
    }
}

// =============================================================================
// Initialization
// =============================================================================

/// Brings the clock tree up from reset and returns the controller owning it.
pub fn init<R: RegisterFile>(regs: &R, config: Config, poll_limit: PollLimit) -> Result<Rcc<'_, R>, ClockError> {
    let mut rcc = Rcc::new(regs, config.0.hse, poll_limit)?;
    rcc.reconfigure(config)?;
    Ok(rcc)
}
