//! Clock frequencies from register readback.
//!
//! Nothing here writes to hardware. The only input besides the registers is the
//! HSE frequency, which the chip cannot report.

use super::{
    AhbPrescaler, ApbPrescaler, BusPrescalers, ClockError, ClockSource, Clocks, Hse, Pll,
    PllPDiv, PllSource, RtcPrescaler, HSI_FREQ,
};
use crate::pac::{RegisterFile, RCC};
use crate::time::{Hertz, MaybeHertz};

/// Source currently driving sysclk, per `CFGR.SWS`.
pub(crate) fn get_sysclk_source<R: RegisterFile>(regs: &R) -> ClockSource {
    // 0b11 is "not applicable" and never reported by the hardware
    ClockSource::from_bits(regs.get(RCC.cfgr().sws())).unwrap_or(ClockSource::Hsi)
}

/// Decodes the current `PLLCFGR` contents.
pub(crate) fn get_pll_config<R: RegisterFile>(regs: &R) -> Pll {
    let pllcfgr = RCC.pllcfgr();
    let raw = regs.read(pllcfgr.reg());
    Pll {
        source: PllSource::from_bits(pllcfgr.pllsrc().extract(raw)),
        prediv: pllcfgr.pllm().extract(raw) as u8,
        mul: pllcfgr.plln().extract(raw) as u16,
        divp: PllPDiv::from_bits(pllcfgr.pllp().extract(raw)),
        divq: pllcfgr.pllq().extract(raw) as u8,
    }
}

pub(crate) fn get_prescalers<R: RegisterFile>(regs: &R) -> BusPrescalers {
    let cfgr = RCC.cfgr();
    let raw = regs.read(cfgr.reg());
    BusPrescalers {
        ahb: AhbPrescaler::from_bits(cfgr.hpre().extract(raw)),
        apb1: ApbPrescaler::from_bits(cfgr.ppre1().extract(raw)),
        apb2: ApbPrescaler::from_bits(cfgr.ppre2().extract(raw)),
        rtc: RtcPrescaler(cfgr.rtcpre().extract(raw) as u8),
    }
}

fn get_hse_freq(hse: Option<Hse>) -> Result<Hertz, ClockError> {
    hse.map(|h| h.freq).ok_or(ClockError::HseNotConfigured)
}

fn get_pll_input_freq(pll: &Pll, hse: Option<Hse>) -> Result<Hertz, ClockError> {
    match pll.source {
        PllSource::Hsi => Ok(HSI_FREQ),
        PllSource::Hse => get_hse_freq(hse),
    }
}

/// Get current PLL Q output frequency, `None` if the PLL is not locked or its
/// input is unknown.
pub(crate) fn get_pll_q_freq<R: RegisterFile>(regs: &R, hse: Option<Hse>) -> Option<Hertz> {
    if !regs.is_set(RCC.cr().pllrdy()) {
        return None;
    }
    let pll = get_pll_config(regs);
    let input = get_pll_input_freq(&pll, hse).ok()?;
    Some(Hertz(pll.q_output_hz(input.0)))
}

/// Get current sysclk frequency from hardware registers.
pub(crate) fn get_sysclk_freq<R: RegisterFile>(regs: &R, hse: Option<Hse>) -> Result<Hertz, ClockError> {
    match get_sysclk_source(regs) {
        ClockSource::Hsi => Ok(HSI_FREQ),
        ClockSource::Hse => get_hse_freq(hse),
        ClockSource::Pll => {
            let pll = get_pll_config(regs);
            let input = get_pll_input_freq(&pll, hse)?;
            Ok(Hertz(pll.p_output_hz(input.0)))
        }
    }
}

/// Recomputes the whole clock tree from the registers.
///
/// Fails with [`ClockError::HseNotConfigured`] if the tree depends on HSE and
/// `hse` is `None`.
pub fn read_clocks_from_hw<R: RegisterFile>(regs: &R, hse: Option<Hse>) -> Result<Clocks, ClockError> {
    let sysclk = get_sysclk_freq(regs, hse)?;
    let prescalers = get_prescalers(regs);
    let pll48 = MaybeHertz::from(get_pll_q_freq(regs, hse));
    Ok(Clocks::compute(sysclk, &prescalers, pll48, hse))
}
