//! Clock types, constants and operator impls.

use crate::time::{Hertz, MaybeHertz};
use core::ops;

// =============================================================================
// Constants
// =============================================================================

pub const HSI_FREQ: Hertz = Hertz(16_000_000);

pub const HSE_MIN: Hertz = Hertz(4_000_000);
pub const HSE_MAX: Hertz = Hertz(26_000_000);

pub const SYSCLK_MAX: Hertz = Hertz(168_000_000);
pub const HCLK_MAX: Hertz = Hertz(168_000_000);
pub const PCLK1_MAX: Hertz = Hertz(42_000_000);
pub const PCLK2_MAX: Hertz = Hertz(84_000_000);
/// USB OTG FS, SDIO and RNG need exactly 48 MHz, never more.
pub const PLL48_MAX: Hertz = Hertz(48_000_000);
pub const RTC_MAX: Hertz = Hertz(1_000_000);

pub const VCO_IN_MIN: Hertz = Hertz(1_000_000);
pub const VCO_IN_MAX: Hertz = Hertz(2_000_000);
pub const VCO_OUT_MIN: Hertz = Hertz(100_000_000);
pub const VCO_OUT_MAX: Hertz = Hertz(432_000_000);

// =============================================================================
// Sources
// =============================================================================

/// System clock source, encoded as in `CFGR.SW` / `CFGR.SWS`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ClockSource {
    Hsi = 0b00,
    Hse = 0b01,
    Pll = 0b10,
}

impl ClockSource {
    pub const fn to_bits(self) -> u32 {
        self as u32
    }

    pub const fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            0b00 => Some(ClockSource::Hsi),
            0b01 => Some(ClockSource::Hse),
            0b10 => Some(ClockSource::Pll),
            _ => None,
        }
    }
}

/// Oscillator feeding the main PLL.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PllSource {
    Hsi,
    Hse,
}

impl PllSource {
    pub const fn to_bits(self) -> u32 {
        match self {
            PllSource::Hsi => 0,
            PllSource::Hse => 1,
        }
    }

    pub const fn from_bits(bits: u32) -> Self {
        if bits & 1 == 0 { PllSource::Hsi } else { PllSource::Hse }
    }
}

impl From<PllSource> for ClockSource {
    fn from(value: PllSource) -> Self {
        match value {
            PllSource::Hsi => ClockSource::Hsi,
            PllSource::Hse => ClockSource::Hse,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HseMode {
    /// A crystal or resonator on OSC_IN/OSC_OUT.
    Oscillator,
    /// An external clock driven into OSC_IN.
    Bypass,
}

/// External high-speed clock present on the board.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Hse {
    pub freq: Hertz,
    pub mode: HseMode,
}

impl Hse {
    pub const fn new(freq: Hertz) -> Self {
        Self { freq, mode: HseMode::Oscillator }
    }

    pub const fn with_mode(mut self, mode: HseMode) -> Self {
        self.mode = mode;
        self
    }
}

// =============================================================================
// PLL
// =============================================================================

/// Main PLL output divider for the system clock domain.
///
/// Only even values are available; the register stores `P / 2 - 1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PllPDiv {
    Div2 = 2,
    Div4 = 4,
    Div6 = 6,
    Div8 = 8,
}

impl PllPDiv {
    pub const fn divisor(self) -> u32 {
        self as u32
    }

    pub const fn to_bits(self) -> u32 {
        self.divisor() / 2 - 1
    }

    pub const fn from_bits(bits: u32) -> Self {
        match bits & 0b11 {
            0 => PllPDiv::Div2,
            1 => PllPDiv::Div4,
            2 => PllPDiv::Div6,
            _ => PllPDiv::Div8,
        }
    }
}

/// Main PLL configuration.
///
/// `f_vco = f_in / prediv * mul`, `f_sys = f_vco / divp`, `f_48 = f_vco / divq`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Pll {
    pub source: PllSource,
    /// M, 2..=63
    pub prediv: u8,
    /// N, 50..=432
    pub mul: u16,
    /// P
    pub divp: PllPDiv,
    /// Q, 2..=15
    pub divq: u8,
}

impl Pll {
    pub const fn new(source: PllSource, prediv: u8, mul: u16, divp: PllPDiv, divq: u8) -> Self {
        Self { source, prediv, mul, divp, divq }
    }

    pub const fn with_source(mut self, source: PllSource) -> Self {
        self.source = source;
        self
    }

    pub const fn with_prediv(mut self, prediv: u8) -> Self {
        self.prediv = prediv;
        self
    }

    pub const fn with_mul(mut self, mul: u16) -> Self {
        self.mul = mul;
        self
    }

    pub const fn with_divp(mut self, divp: PllPDiv) -> Self {
        self.divp = divp;
        self
    }

    pub const fn with_divq(mut self, divq: u8) -> Self {
        self.divq = divq;
        self
    }

    pub const fn vco_in_hz(&self, input_hz: u32) -> u32 {
        match input_hz.checked_div(self.prediv as u32) {
            Some(hz) => hz,
            None => 0,
        }
    }

    /// VCO output, saturating at `u32::MAX` for settings far out of range.
    pub const fn vco_out_hz(&self, input_hz: u32) -> u32 {
        saturate(self.vco_out(input_hz))
    }

    pub const fn p_output_hz(&self, input_hz: u32) -> u32 {
        saturate(self.vco_out(input_hz) / self.divp.divisor() as u64)
    }

    pub const fn q_output_hz(&self, input_hz: u32) -> u32 {
        match self.vco_out(input_hz).checked_div(self.divq as u64) {
            Some(hz) => saturate(hz),
            None => 0,
        }
    }

    // N up to 511 times a VCO input of up to 26 MHz does not fit 32 bits
    const fn vco_out(&self, input_hz: u32) -> u64 {
        self.vco_in_hz(input_hz) as u64 * self.mul as u64
    }
}

const fn saturate(hz: u64) -> u32 {
    if hz > u32::MAX as u64 {
        u32::MAX
    } else {
        hz as u32
    }
}

// =============================================================================
// Prescalers and operator impls
// =============================================================================

/// HCLK = SYSCLK / AHB prescaler
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AhbPrescaler {
    #[default]
    Div1,
    Div2,
    Div4,
    Div8,
    Div16,
    Div64,
    Div128,
    Div256,
    Div512,
}

impl AhbPrescaler {
    pub const fn to_bits(self) -> u32 {
        match self {
            AhbPrescaler::Div1 => 0b0000,
            AhbPrescaler::Div2 => 0b1000,
            AhbPrescaler::Div4 => 0b1001,
            AhbPrescaler::Div8 => 0b1010,
            AhbPrescaler::Div16 => 0b1011,
            AhbPrescaler::Div64 => 0b1100,
            AhbPrescaler::Div128 => 0b1101,
            AhbPrescaler::Div256 => 0b1110,
            AhbPrescaler::Div512 => 0b1111,
        }
    }

    /// Codes below `0b1000` all mean "not divided".
    pub const fn from_bits(bits: u32) -> Self {
        match bits & 0b1111 {
            0b1000 => AhbPrescaler::Div2,
            0b1001 => AhbPrescaler::Div4,
            0b1010 => AhbPrescaler::Div8,
            0b1011 => AhbPrescaler::Div16,
            0b1100 => AhbPrescaler::Div64,
            0b1101 => AhbPrescaler::Div128,
            0b1110 => AhbPrescaler::Div256,
            0b1111 => AhbPrescaler::Div512,
            _ => AhbPrescaler::Div1,
        }
    }

    pub const fn divisor(self) -> u32 {
        match self {
            AhbPrescaler::Div1 => 1,
            AhbPrescaler::Div2 => 2,
            AhbPrescaler::Div4 => 4,
            AhbPrescaler::Div8 => 8,
            AhbPrescaler::Div16 => 16,
            AhbPrescaler::Div64 => 64,
            AhbPrescaler::Div128 => 128,
            AhbPrescaler::Div256 => 256,
            AhbPrescaler::Div512 => 512,
        }
    }
}

/// PCLKx = HCLK / APB prescaler
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ApbPrescaler {
    #[default]
    Div1,
    Div2,
    Div4,
    Div8,
    Div16,
}

impl ApbPrescaler {
    pub const fn to_bits(self) -> u32 {
        match self {
            ApbPrescaler::Div1 => 0b000,
            ApbPrescaler::Div2 => 0b100,
            ApbPrescaler::Div4 => 0b101,
            ApbPrescaler::Div8 => 0b110,
            ApbPrescaler::Div16 => 0b111,
        }
    }

    /// Codes below `0b100` all mean "not divided".
    pub const fn from_bits(bits: u32) -> Self {
        match bits & 0b111 {
            0b100 => ApbPrescaler::Div2,
            0b101 => ApbPrescaler::Div4,
            0b110 => ApbPrescaler::Div8,
            0b111 => ApbPrescaler::Div16,
            _ => ApbPrescaler::Div1,
        }
    }

    pub const fn divisor(self) -> u32 {
        match self {
            ApbPrescaler::Div1 => 1,
            ApbPrescaler::Div2 => 2,
            ApbPrescaler::Div4 => 4,
            ApbPrescaler::Div8 => 8,
            ApbPrescaler::Div16 => 16,
        }
    }
}

/// RTC clock = HSE / RTCPRE. Values 0 and 1 gate the clock off.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RtcPrescaler(pub u8);

impl RtcPrescaler {
    pub const NONE: Self = Self(0);

    pub const fn to_bits(self) -> u32 {
        (self.0 & 0b1_1111) as u32
    }

    pub const fn divisor(self) -> Option<u32> {
        match self.0 {
            0 | 1 => None,
            d => Some(d as u32),
        }
    }
}

impl ops::Div<AhbPrescaler> for Hertz {
    type Output = Hertz;
    fn div(self, rhs: AhbPrescaler) -> Self::Output {
        Hertz(self.0 / rhs.divisor())
    }
}

impl ops::Div<ApbPrescaler> for Hertz {
    type Output = Hertz;
    fn div(self, rhs: ApbPrescaler) -> Self::Output {
        Hertz(self.0 / rhs.divisor())
    }
}

/// The four independent dividers in `CFGR`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusPrescalers {
    pub ahb: AhbPrescaler,
    pub apb1: ApbPrescaler,
    pub apb2: ApbPrescaler,
    pub rtc: RtcPrescaler,
}

impl BusPrescalers {
    pub const fn new() -> Self {
        Self {
            ahb: AhbPrescaler::Div1,
            apb1: ApbPrescaler::Div1,
            apb2: ApbPrescaler::Div1,
            rtc: RtcPrescaler::NONE,
        }
    }

    pub const fn with_ahb(mut self, ahb: AhbPrescaler) -> Self {
        self.ahb = ahb;
        self
    }

    pub const fn with_apb1(mut self, apb1: ApbPrescaler) -> Self {
        self.apb1 = apb1;
        self
    }

    pub const fn with_apb2(mut self, apb2: ApbPrescaler) -> Self {
        self.apb2 = apb2;
        self
    }

    pub const fn with_rtc(mut self, rtc: RtcPrescaler) -> Self {
        self.rtc = rtc;
        self
    }
}

// =============================================================================
// Clocks struct
// =============================================================================

/// Clock domains a peripheral can be fed from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusClock {
    Hclk,
    Pclk1,
    Pclk2,
    /// Timers on APB1 run at twice PCLK1 whenever APB1 is divided.
    Pclk1Tim,
    Pclk2Tim,
}

/// Clocks configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Clocks {
    pub sysclk: Hertz,
    // AHB
    pub hclk: Hertz,
    // APB
    pub pclk1: Hertz,
    pub pclk2: Hertz,
    pub pclk1_tim: Hertz,
    pub pclk2_tim: Hertz,

    /// PLL Q output (None if the PLL is off)
    pub pll48: MaybeHertz,
    /// HSE / RTCPRE (None without HSE or with RTCPRE < 2)
    pub rtc: MaybeHertz,
}

impl Clocks {
    /// Derives the bus tree from a system clock and the prescalers.
    pub fn compute(sysclk: Hertz, prescalers: &BusPrescalers, pll48: MaybeHertz, hse: Option<Hse>) -> Self {
        let hclk = sysclk / prescalers.ahb;
        let pclk1 = hclk / prescalers.apb1;
        let pclk2 = hclk / prescalers.apb2;
        Self {
            sysclk,
            hclk,
            pclk1,
            pclk2,
            pclk1_tim: timer_clock(pclk1, prescalers.apb1),
            pclk2_tim: timer_clock(pclk2, prescalers.apb2),
            pll48,
            rtc: match (hse, prescalers.rtc.divisor()) {
                (Some(hse), Some(div)) => MaybeHertz::from(hse.freq / div),
                _ => MaybeHertz::NONE,
            },
        }
    }

    pub fn bus(&self, clock: BusClock) -> Hertz {
        match clock {
            BusClock::Hclk => self.hclk,
            BusClock::Pclk1 => self.pclk1,
            BusClock::Pclk2 => self.pclk2,
            BusClock::Pclk1Tim => self.pclk1_tim,
            BusClock::Pclk2Tim => self.pclk2_tim,
        }
    }
}

fn timer_clock(pclk: Hertz, prescaler: ApbPrescaler) -> Hertz {
    match prescaler {
        ApbPrescaler::Div1 => pclk,
        _ => pclk * 2u32,
    }
}
