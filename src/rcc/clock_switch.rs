//! System clock source switching.
//!
//! [`Rcc`] drives the oscillators and the main PLL and moves sysclk between
//! them without ever stopping the source the CPU is running from. Every wait on
//! a hardware flag is a busy poll bounded by the controller's [`PollLimit`].
//!
//! None of this is reentrant: do not call into an `Rcc` from an interrupt handler
//! while another call is waiting on a flag.

use core::fmt;

use super::clock_read::{get_sysclk_source, read_clocks_from_hw};
use super::{AhbPrescaler, BusPrescalers, ClockSource, Clocks, Hse, HseMode, Pll};
use crate::pac::{Field, RegisterFile, RCC};
use crate::time::Hertz;
use crate::utils::{blocking_wait, PollLimit};

/// Progress of a clock switch request.
///
/// `Idle → SourceEnabling → SourceReady → (PllDisabling → PllConfiguring →
/// PllLocking →) Switching → Switched`. `Switched` doubles as the idle state of
/// the next request. When a wait times out the state stays at the stage that
/// timed out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SwitchState {
    Idle,
    SourceEnabling,
    SourceReady,
    PllDisabling,
    PllConfiguring,
    PllLocking,
    Switching,
    Switched,
}

/// Hardware flag a bounded wait gave up on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WaitStage {
    /// `HSIRDY` / `HSERDY`
    OscillatorReady,
    /// `PLLRDY` going low after `PLLON` was cleared
    PllDisable,
    /// `PLLRDY`
    PllLock,
    /// `CFGR.SWS` mirroring `CFGR.SW`
    SourceSwitch,
}

/// Clock controller error
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum ClockError {
    Timeout { stage: WaitStage },
    /// PLL selected as sysclk without a PLL configuration.
    MissingPllConfig,
    /// HSE requested but no HSE was described to the controller.
    HseNotConfigured,
    /// The source is not routable to that clock output channel.
    InvalidMcoSource,
}

impl fmt::Display for ClockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClockError::Timeout { stage } => write!(f, "Timed out waiting for {:?}", stage),
            ClockError::MissingPllConfig => write!(f, "PLL selected without a PLL configuration"),
            ClockError::HseNotConfigured => write!(f, "HSE used but not configured"),
            ClockError::InvalidMcoSource => write!(f, "Source not available on this clock output"),
        }
    }
}

impl core::error::Error for ClockError {}

/// Clock source controller.
pub struct Rcc<'d, R: RegisterFile> {
    pub(crate) regs: &'d R,
    poll_limit: PollLimit,
    hse: Option<Hse>,
    state: SwitchState,
    clocks: Clocks,
}

impl<'d, R: RegisterFile> Rcc<'d, R> {
    /// Takes over the clock tree in whatever state it is.
    ///
    /// Fails if the current tree runs from HSE but `hse` is `None`.
    pub fn new(regs: &'d R, hse: Option<Hse>, poll_limit: PollLimit) -> Result<Self, ClockError> {
        let clocks = read_clocks_from_hw(regs, hse)?;
        Ok(Self {
            regs,
            poll_limit,
            hse,
            state: SwitchState::Idle,
            clocks,
        })
    }

    pub fn state(&self) -> SwitchState {
        self.state
    }

    /// Clock tree as of the last switch or prescaler update.
    pub fn clocks(&self) -> &Clocks {
        &self.clocks
    }

    pub fn hse(&self) -> Option<Hse> {
        self.hse
    }

    pub fn poll_limit(&self) -> PollLimit {
        self.poll_limit
    }

    /// Source currently driving sysclk, per `CFGR.SWS`.
    pub fn current_source(&self) -> ClockSource {
        get_sysclk_source(self.regs)
    }

    fn transition(&mut self, state: SwitchState) {
        trace!("rcc: {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    /// Polls `field` until it reads `value`.
    fn wait_for(&self, field: Field, value: bool, stage: WaitStage) -> Result<(), ClockError> {
        blocking_wait(|| self.regs.is_set(field) != value, self.poll_limit).map_err(|_| {
            warn!("rcc: timed out in {:?}", stage);
            ClockError::Timeout { stage }
        })
    }

    /// Turns `source` on and waits until it reports ready.
    ///
    /// Other enable bits are left as they are. For [`ClockSource::Pll`] the PLL
    /// is started with whatever configuration `PLLCFGR` currently holds.
    pub fn enable_and_await_ready(&mut self, source: ClockSource) -> Result<(), ClockError> {
        match source {
            ClockSource::Hsi => {
                self.transition(SwitchState::SourceEnabling);
                self.regs.set(RCC.cr().hsion(), 1);
                self.wait_for(RCC.cr().hsirdy(), true, WaitStage::OscillatorReady)?;
            }
            ClockSource::Hse => {
                let hse = self.hse.ok_or(ClockError::HseNotConfigured)?;
                self.transition(SwitchState::SourceEnabling);
                // HSEBYP is only writable while HSE is off
                if !self.regs.is_set(RCC.cr().hseon()) {
                    self.regs.set(RCC.cr().hsebyp(), (hse.mode == HseMode::Bypass) as u32);
                }
                self.regs.set(RCC.cr().hseon(), 1);
                self.wait_for(RCC.cr().hserdy(), true, WaitStage::OscillatorReady)?;
            }
            ClockSource::Pll => {
                self.transition(SwitchState::SourceEnabling);
                self.regs.set(RCC.cr().pllon(), 1);
                self.wait_for(RCC.cr().pllrdy(), true, WaitStage::PllLock)?;
            }
        }
        self.transition(SwitchState::SourceReady);
        Ok(())
    }

    /// Writes `CFGR.SW` and waits for `CFGR.SWS` to follow.
    fn switch_to(&mut self, source: ClockSource) -> Result<(), ClockError> {
        self.transition(SwitchState::Switching);
        self.regs.set(RCC.cfgr().sw(), source.to_bits());
        blocking_wait(|| self.regs.get(RCC.cfgr().sws()) != source.to_bits(), self.poll_limit).map_err(|_| {
            warn!("rcc: timed out in {:?}", WaitStage::SourceSwitch);
            ClockError::Timeout { stage: WaitStage::SourceSwitch }
        })?;
        self.transition(SwitchState::Switched);
        Ok(())
    }

    /// Reprograms and relocks the main PLL.
    ///
    /// The feed oscillator is started first. If sysclk runs from the PLL it is
    /// moved onto that oscillator before the PLL is stopped. No PLL field is
    /// written before `PLLRDY` reads back low, and all of them are replaced in a
    /// single write.
    pub fn configure_pll(&mut self, pll: &Pll) -> Result<(), ClockError> {
        let feed = ClockSource::from(pll.source);
        self.enable_and_await_ready(feed)?;

        if self.current_source() == ClockSource::Pll {
            debug!("rcc: sysclk runs from the PLL, moving it to {:?}", feed);
            self.switch_to(feed)?;
        }

        self.transition(SwitchState::PllDisabling);
        self.regs.set(RCC.cr().pllon(), 0);
        self.wait_for(RCC.cr().pllrdy(), false, WaitStage::PllDisable)?;

        self.transition(SwitchState::PllConfiguring);
        let pllcfgr = RCC.pllcfgr();
        self.regs.modify(pllcfgr.reg(), |r| {
            let r = pllcfgr.pllm().insert(r, pll.prediv as u32);
            let r = pllcfgr.plln().insert(r, pll.mul as u32);
            let r = pllcfgr.pllp().insert(r, pll.divp.to_bits());
            let r = pllcfgr.pllsrc().insert(r, pll.source.to_bits());
            pllcfgr.pllq().insert(r, pll.divq as u32)
        });

        self.transition(SwitchState::PllLocking);
        self.regs.set(RCC.cr().pllon(), 1);
        self.wait_for(RCC.cr().pllrdy(), true, WaitStage::PllLock)?;

        self.transition(SwitchState::SourceReady);
        self.clocks = read_clocks_from_hw(self.regs, self.hse)?;
        Ok(())
    }

    /// Moves sysclk to `source` and returns the new sysclk frequency.
    ///
    /// `pll` is required for [`ClockSource::Pll`] and ignored otherwise. After the
    /// switch the AHB prescaler is reset to undivided; follow up with
    /// [`Rcc::apply_bus_prescalers`] for the new frequency.
    pub fn select_system_clock_source(&mut self, source: ClockSource, pll: Option<Pll>) -> Result<Hertz, ClockError> {
        match source {
            ClockSource::Pll => {
                let pll = pll.ok_or(ClockError::MissingPllConfig)?;
                self.configure_pll(&pll)?;
            }
            _ => self.enable_and_await_ready(source)?,
        }

        self.switch_to(source)?;
        self.regs.set(RCC.cfgr().hpre(), AhbPrescaler::Div1.to_bits());

        self.clocks = read_clocks_from_hw(self.regs, self.hse)?;
        debug!("rcc: sysclk from {:?}, {:?}", source, self.clocks);
        Ok(self.clocks.sysclk)
    }

    /// Writes the AHB, APB1, APB2 and RTC dividers.
    ///
    /// No frequency limit is checked here: choosing dividers that keep each bus
    /// within its rating for `sysclk` is up to the caller.
    pub fn apply_bus_prescalers(&mut self, sysclk: Hertz, prescalers: BusPrescalers) -> Clocks {
        self.regs.set(RCC.cfgr().hpre(), prescalers.ahb.to_bits());
        self.regs.set(RCC.cfgr().ppre1(), prescalers.apb1.to_bits());
        self.regs.set(RCC.cfgr().ppre2(), prescalers.apb2.to_bits());
        self.regs.set(RCC.cfgr().rtcpre(), prescalers.rtc.to_bits());

        self.clocks = Clocks::compute(sysclk, &prescalers, self.clocks.pll48, self.hse);
        debug!("rcc: {:?}", self.clocks);
        self.clocks
    }
}
