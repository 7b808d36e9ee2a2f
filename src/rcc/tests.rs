use super::*;
use crate::gpio::Gpio;
use crate::pac::sim::SimRegisters;
use crate::pac::{gpio as gpio_regs, Reg, FLASH, RCC};
use crate::time::{Hertz, MaybeHertz};
use crate::utils::PollLimit;
use crate::{Peripheral, Port};

const CR: Reg = RCC.cr().reg();
const PLLCFGR: Reg = RCC.pllcfgr().reg();
const CFGR: Reg = RCC.cfgr().reg();
const ACR: Reg = FLASH.acr().reg();

fn hse8() -> Option<Hse> {
    Some(Hse::new(Hertz::mhz(8)))
}

const PLL_168: Pll = Pll::new(PllSource::Hse, 8, 336, PllPDiv::Div2, 7);
const PLL_HSI_84: Pll = Pll::new(PllSource::Hsi, 16, 336, PllPDiv::Div4, 7);
const PLL_HSI_96: Pll = Pll::new(PllSource::Hsi, 16, 192, PllPDiv::Div2, 4);

fn position(log: &[(Reg, u32)], pred: impl Fn(Reg, u32) -> bool) -> usize {
    log.iter().position(|&(r, v)| pred(r, v)).expect("write not found")
}

#[test]
fn starts_on_hsi() {
    let sim = SimRegisters::new();
    let rcc = Rcc::new(&sim, None, PollLimit::Unbounded).unwrap();

    assert_eq!(rcc.state(), SwitchState::Idle);
    assert_eq!(rcc.current_source(), ClockSource::Hsi);
    assert_eq!(rcc.clocks().sysclk, HSI_FREQ);
    assert_eq!(rcc.clocks().pclk2, HSI_FREQ);
    assert_eq!(rcc.clocks().pll48, MaybeHertz::NONE);
}

#[test]
fn running_from_unknown_hse_is_rejected() {
    let sim = SimRegisters::new();
    // HSE on and ready, selected and reported
    sim.force(CR, 0x0003_0083);
    sim.force(CFGR, 0b0101);
    assert_eq!(Rcc::new(&sim, None, PollLimit::Unbounded).err(), Some(ClockError::HseNotConfigured));

    let sim = SimRegisters::new();
    // PLL fed from HSE, locked and driving sysclk
    sim.force(CR, 0x0303_0083);
    sim.force(CFGR, 0b1010);
    sim.force(PLLCFGR, RCC.pllcfgr().pllsrc().insert(0x2400_3010, 1));
    assert_eq!(Rcc::new(&sim, None, PollLimit::Unbounded).err(), Some(ClockError::HseNotConfigured));
    assert_eq!(Rcc::new(&sim, hse8(), PollLimit::Unbounded).map(|rcc| rcc.current_source()), Ok(ClockSource::Pll));
}

#[test]
fn switch_to_hse_keeps_hsi_running() {
    let sim = SimRegisters::new();
    let mut rcc = Rcc::new(&sim, hse8(), PollLimit::Unbounded).unwrap();

    assert_eq!(rcc.select_system_clock_source(ClockSource::Hse, None), Ok(Hertz::mhz(8)));
    assert_eq!(rcc.state(), SwitchState::Switched);
    assert_eq!(sim.peek_field(RCC.cfgr().sws()), 0b01);
    assert_eq!(sim.peek_field(RCC.cr().hseon()), 1);
    assert_eq!(sim.peek_field(RCC.cr().hsion()), 1);
    assert_eq!(rcc.clocks().hclk, Hertz::mhz(8));

    // HSI never went down on the way
    let log = sim.writes();
    let switch = position(&log, |r, v| r == CFGR && RCC.cfgr().sw().extract(v) == 0b01);
    let cr_writes: Vec<u32> = log[..switch].iter().filter(|(r, _)| *r == CR).map(|&(_, v)| v).collect();
    assert!(!cr_writes.is_empty());
    assert!(cr_writes.iter().all(|&v| RCC.cr().hsion().extract(v) == 1));
}

#[test]
fn hse_bypass_is_set_before_hse_on() {
    let sim = SimRegisters::new();
    let hse = Hse::new(Hertz::mhz(8)).with_mode(HseMode::Bypass);
    let mut rcc = Rcc::new(&sim, Some(hse), PollLimit::Unbounded).unwrap();

    rcc.enable_and_await_ready(ClockSource::Hse).unwrap();

    let writes = sim.writes_to(CR);
    assert_eq!(writes.len(), 2);
    assert_eq!(RCC.cr().hsebyp().extract(writes[0]), 1);
    assert_eq!(RCC.cr().hseon().extract(writes[0]), 0);
    assert_eq!(RCC.cr().hseon().extract(writes[1]), 1);
    assert_eq!(rcc.state(), SwitchState::SourceReady);
}

#[test]
fn hse_without_description_is_rejected() {
    let sim = SimRegisters::new();
    let mut rcc = Rcc::new(&sim, None, PollLimit::Unbounded).unwrap();

    assert_eq!(rcc.enable_and_await_ready(ClockSource::Hse), Err(ClockError::HseNotConfigured));
    assert_eq!(rcc.select_system_clock_source(ClockSource::Pll, Some(PLL_168)), Err(ClockError::HseNotConfigured));
    assert!(sim.writes().is_empty());
}

#[test]
fn pll_without_config_is_rejected() {
    let sim = SimRegisters::new();
    let mut rcc = Rcc::new(&sim, hse8(), PollLimit::Unbounded).unwrap();

    assert_eq!(rcc.select_system_clock_source(ClockSource::Pll, None), Err(ClockError::MissingPllConfig));
    assert_eq!(rcc.state(), SwitchState::Idle);
}

#[test]
fn pll_168mhz_from_hse() {
    let sim = SimRegisters::new();
    let mut rcc = Rcc::new(&sim, hse8(), PollLimit::Unbounded).unwrap();

    assert_eq!(rcc.select_system_clock_source(ClockSource::Pll, Some(PLL_168)), Ok(Hertz::mhz(168)));
    assert_eq!(rcc.state(), SwitchState::Switched);
    assert_eq!(rcc.current_source(), ClockSource::Pll);

    // M=8, N=336, P=2 (encoded 0), HSE, Q=7; reserved bit 29 of the reset value survives
    assert_eq!(sim.peek(PLLCFGR), 0x2740_5408);
    assert_eq!(sim.peek_field(RCC.pllcfgr().pllp()), 0);

    let clocks = rcc.clocks();
    assert_eq!(clocks.hclk, Hertz::mhz(168));
    assert_eq!(clocks.pll48, MaybeHertz::from(Hertz::mhz(48)));
}

#[test]
fn pllcfgr_written_once_after_pll_is_off() {
    let sim = SimRegisters::new();
    let mut rcc = Rcc::new(&sim, hse8(), PollLimit::Unbounded).unwrap();

    rcc.select_system_clock_source(ClockSource::Pll, Some(PLL_168)).unwrap();

    let log = sim.writes();
    assert_eq!(sim.writes_to(PLLCFGR).len(), 1);
    let pll_cfg = position(&log, |r, _| r == PLLCFGR);
    let last_cr = log[..pll_cfg].iter().rev().find(|(r, _)| *r == CR).map(|&(_, v)| v);
    assert_eq!(last_cr.map(|v| RCC.cr().pllon().extract(v)), Some(0));
    let pll_on = position(&log, |r, v| r == CR && RCC.cr().pllon().extract(v) == 1);
    let switch = position(&log, |r, v| r == CFGR && RCC.cfgr().sw().extract(v) == 0b10);
    assert!(pll_cfg < pll_on);
    assert!(pll_on < switch);
}

#[test]
fn reconfiguring_the_running_pll_moves_sysclk_first() {
    let sim = SimRegisters::new();
    let mut rcc = Rcc::new(&sim, None, PollLimit::Unbounded).unwrap();
    assert_eq!(rcc.select_system_clock_source(ClockSource::Pll, Some(PLL_HSI_84)), Ok(Hertz::mhz(84)));

    sim.clear_log();
    assert_eq!(rcc.select_system_clock_source(ClockSource::Pll, Some(PLL_HSI_96)), Ok(Hertz::mhz(96)));

    let log = sim.writes();
    let to_hsi = position(&log, |r, v| r == CFGR && RCC.cfgr().sw().extract(v) == 0b00);
    let pll_off = position(&log, |r, v| r == CR && RCC.cr().pllon().extract(v) == 0);
    let pll_cfg = position(&log, |r, _| r == PLLCFGR);
    assert!(to_hsi < pll_off);
    assert!(pll_off < pll_cfg);
    assert_eq!(rcc.clocks().pll48, MaybeHertz::from(Hertz::mhz(48)));
}

#[test]
fn stuck_pll_disable_times_out_before_touching_pllcfgr() {
    let sim = SimRegisters::new();
    sim.force(CR, 0x0300_0083);
    sim.set_ready_latency(RCC.cr().pllrdy(), Some(3), None);
    let mut rcc = Rcc::new(&sim, None, PollLimit::Iterations(10)).unwrap();

    assert_eq!(
        rcc.configure_pll(&PLL_HSI_84),
        Err(ClockError::Timeout { stage: WaitStage::PllDisable })
    );
    assert_eq!(rcc.state(), SwitchState::PllDisabling);
    assert!(sim.writes_to(PLLCFGR).is_empty());
}

#[test]
fn pll_that_never_locks_times_out() {
    let sim = SimRegisters::new();
    sim.set_ready_latency(RCC.cr().pllrdy(), None, Some(1));
    let mut rcc = Rcc::new(&sim, None, PollLimit::Iterations(10)).unwrap();

    assert_eq!(
        rcc.select_system_clock_source(ClockSource::Pll, Some(PLL_HSI_84)),
        Err(ClockError::Timeout { stage: WaitStage::PllLock })
    );
    assert_eq!(rcc.state(), SwitchState::PllLocking);
    assert_eq!(rcc.current_source(), ClockSource::Hsi);
}

#[test]
fn oscillator_that_never_starts_times_out() {
    let sim = SimRegisters::new();
    sim.set_ready_latency(RCC.cr().hserdy(), None, Some(0));
    let mut rcc = Rcc::new(&sim, hse8(), PollLimit::Iterations(8)).unwrap();

    assert_eq!(
        rcc.select_system_clock_source(ClockSource::Hse, None),
        Err(ClockError::Timeout { stage: WaitStage::OscillatorReady })
    );
    assert_eq!(rcc.state(), SwitchState::SourceEnabling);
    assert_eq!(sim.peek_field(RCC.cfgr().sw()), 0b00);
}

#[test]
fn switch_waits_for_status_mirror() {
    let sim = SimRegisters::new();
    sim.stall_clock_switch(true);
    let mut rcc = Rcc::new(&sim, hse8(), PollLimit::Iterations(16)).unwrap();

    assert_eq!(
        rcc.select_system_clock_source(ClockSource::Hse, None),
        Err(ClockError::Timeout { stage: WaitStage::SourceSwitch })
    );
    assert_eq!(rcc.state(), SwitchState::Switching);
    // select written, status still on HSI
    assert_eq!(sim.peek_field(RCC.cfgr().sw()), 0b01);
    assert_eq!(sim.peek_field(RCC.cfgr().sws()), 0b00);
    assert!(sim.reads_of(CFGR) >= 16);
}

#[test]
fn switch_resets_ahb_prescaler() {
    let sim = SimRegisters::new();
    sim.force(CFGR, RCC.cfgr().hpre().insert(0, AhbPrescaler::Div2.to_bits()));
    let mut rcc = Rcc::new(&sim, hse8(), PollLimit::Unbounded).unwrap();
    assert_eq!(rcc.clocks().hclk, Hertz::mhz(8));

    rcc.select_system_clock_source(ClockSource::Hse, None).unwrap();

    assert_eq!(sim.peek_field(RCC.cfgr().hpre()), 0);
    assert_eq!(rcc.clocks().hclk, Hertz::mhz(8));
}

#[test]
fn bus_prescalers_are_independent_fields() {
    let sim = SimRegisters::new();
    let mut rcc = Rcc::new(&sim, hse8(), PollLimit::Unbounded).unwrap();
    let sysclk = rcc.select_system_clock_source(ClockSource::Pll, Some(PLL_168)).unwrap();

    let prescalers = BusPrescalers::new()
        .with_apb1(ApbPrescaler::Div4)
        .with_apb2(ApbPrescaler::Div2)
        .with_rtc(RtcPrescaler(8));
    let clocks = rcc.apply_bus_prescalers(sysclk, prescalers);

    assert_eq!(sim.peek_field(RCC.cfgr().hpre()), 0b0000);
    assert_eq!(sim.peek_field(RCC.cfgr().ppre1()), 0b101);
    assert_eq!(sim.peek_field(RCC.cfgr().ppre2()), 0b100);
    assert_eq!(sim.peek_field(RCC.cfgr().rtcpre()), 8);
    assert_eq!(sim.peek_field(RCC.cfgr().sw()), 0b10);

    assert_eq!(clocks.pclk1, Hertz::mhz(42));
    assert_eq!(clocks.pclk2, Hertz::mhz(84));
    assert_eq!(clocks.pclk1_tim, Hertz::mhz(84));
    assert_eq!(clocks.pclk2_tim, Hertz::mhz(168));
    assert_eq!(clocks.rtc, MaybeHertz::from(Hertz::mhz(1)));
    assert_eq!(rcc.clocks(), &clocks);
    assert_eq!(read_clocks_from_hw(&sim, hse8()), Ok(clocks));
}

#[test]
fn mco1_leaves_mco2_alone() {
    let sim = SimRegisters::new();
    let mco2 = RCC.cfgr().mco2().insert(RCC.cfgr().mco2pre().insert(0, 0b110), 0b11);
    sim.force(CFGR, mco2);
    let mut rcc = Rcc::new(&sim, None, PollLimit::Unbounded).unwrap();
    let mut gpio = Gpio::new(&sim);

    rcc.configure_clock_output(McoChannel::Mco1, McoSource::Pll, McoPrescaler::Div4, &mut gpio).unwrap();

    assert_eq!(sim.peek_field(RCC.cfgr().mco1()), 0b11);
    assert_eq!(sim.peek_field(RCC.cfgr().mco1pre()), 0b110);
    assert_eq!(sim.peek_field(RCC.cfgr().mco2()), 0b11);
    assert_eq!(sim.peek_field(RCC.cfgr().mco2pre()), 0b110);

    let pa = gpio_regs::Regs::new(Port::A.address());
    assert_eq!(sim.peek_field(pa.moder().moder(8)), 0b10);
    assert_eq!(sim.peek_field(pa.afr(1).afr(0)), 0);
    assert_eq!(sim.peek_field(pa.ospeedr().ospeedr(8)), 0b11);
    assert!(is_enabled(&sim, Peripheral::GPIOA));
}

#[test]
fn mco2_on_pc9() {
    let sim = SimRegisters::new();
    let mut rcc = Rcc::new(&sim, None, PollLimit::Unbounded).unwrap();
    let mut gpio = Gpio::new(&sim);

    rcc.configure_clock_output(McoChannel::Mco2, McoSource::Sysclk, McoPrescaler::Div5, &mut gpio).unwrap();

    assert_eq!(sim.peek_field(RCC.cfgr().mco2()), 0b00);
    assert_eq!(sim.peek_field(RCC.cfgr().mco2pre()), 0b111);
    assert_eq!(sim.peek_field(RCC.cfgr().mco1pre()), 0);
    let pc = gpio_regs::Regs::new(Port::C.address());
    assert_eq!(sim.peek_field(pc.moder().moder(9)), 0b10);
    assert!(is_enabled(&sim, Peripheral::GPIOC));
}

#[test]
fn mco_rejects_unroutable_source() {
    let sim = SimRegisters::new();
    let mut rcc = Rcc::new(&sim, None, PollLimit::Unbounded).unwrap();
    let mut gpio = Gpio::new(&sim);

    assert_eq!(
        rcc.configure_clock_output(McoChannel::Mco2, McoSource::Hsi, McoPrescaler::Div1, &mut gpio),
        Err(ClockError::InvalidMcoSource)
    );
    assert_eq!(
        rcc.configure_clock_output(McoChannel::Mco1, McoSource::Sysclk, McoPrescaler::Div1, &mut gpio),
        Err(ClockError::InvalidMcoSource)
    );
    assert!(sim.writes().is_empty());
}

#[test]
fn peripheral_enable_sets_the_mapped_bit() {
    let sim = SimRegisters::new();
    let apb1enr = RCC.apb1enr().reg();
    let apb2rstr = RCC.apb2rstr().reg();
    assert_eq!(apb1enr.address(), 0x4002_3840);
    assert_eq!(apb2rstr.address(), 0x4002_3824);

    enable(&sim, Peripheral::USART2);
    assert_eq!(sim.peek(apb1enr), 1 << 17);

    enable(&sim, Peripheral::UART4);
    disable(&sim, Peripheral::USART2);
    assert_eq!(sim.peek(apb1enr), 1 << 19);

    enable_and_reset(&sim, Peripheral::USART1);
    assert_eq!(sim.writes_to(apb2rstr), [1 << 4, 0]);

    sim.clear_log();
    enable_and_reset(&sim, Peripheral::ADC1);
    assert_eq!(sim.writes_to(apb2rstr), [1 << 8, 0]);
    assert!(is_enabled(&sim, Peripheral::ADC1));
}

#[test]
fn peripheral_table() {
    assert_eq!(Peripheral::USART2.address(), 0x4000_4400);
    assert_eq!(Peripheral::USART2.bus_clock(), BusClock::Pclk1);
    assert_eq!(Peripheral::USART6.bus_clock(), BusClock::Pclk2);
    assert_eq!(Peripheral::TIM2.bus_clock(), BusClock::Pclk1Tim);
    assert_eq!(Port::ALL.len(), 9);
    assert_eq!(Port::I.peripheral(), Peripheral::GPIOI);
    assert_eq!(crate::UsartInstance::UART4.af(), 8);
    assert_eq!(crate::UsartInstance::USART3.af(), 7);
}

#[test]
fn init_168mhz() {
    let sim = SimRegisters::new();
    let rcc = init(&sim, const { ConfigBuilder::hse_168mhz().checked() }, PollLimit::Unbounded).unwrap();

    let clocks = rcc.clocks();
    assert_eq!(clocks.sysclk, Hertz::mhz(168));
    assert_eq!(clocks.pclk1, Hertz::mhz(42));
    assert_eq!(clocks.pclk2, Hertz::mhz(84));
    assert_eq!(frequency(clocks, Peripheral::USART2), Hertz::mhz(42));

    assert_eq!(sim.peek_field(FLASH.acr().latency()), 5);
    assert_eq!(sim.peek_field(FLASH.acr().prften()), 1);
    assert_eq!(sim.peek_field(FLASH.acr().icen()), 1);
    assert_eq!(sim.peek_field(FLASH.acr().dcen()), 1);

    // wait states go up before sysclk does
    let log = sim.writes();
    let latency = position(&log, |r, _| r == ACR);
    let switch = position(&log, |r, v| r == CFGR && RCC.cfgr().sw().extract(v) == 0b10);
    assert!(latency < switch);
}

#[test]
fn init_back_to_hsi_lowers_wait_states_last() {
    let sim = SimRegisters::new();
    let mut rcc = init(&sim, ConfigBuilder::hse_168mhz().checked(), PollLimit::Unbounded).unwrap();

    sim.clear_log();
    rcc.reconfigure(ConfigBuilder::new().checked()).unwrap();

    assert_eq!(rcc.clocks().sysclk, HSI_FREQ);
    assert_eq!(sim.peek_field(FLASH.acr().latency()), 0);
    let log = sim.writes();
    let switch = position(&log, |r, v| r == CFGR && RCC.cfgr().sw().extract(v) == 0b00);
    let latency = position(&log, |r, v| r == ACR && FLASH.acr().latency().extract(v) == 0);
    assert!(switch < latency);
}

/// Replays the write log and checks that every HCLK the chip passes through is
/// covered by the wait states programmed at that moment.
fn assert_wait_states_cover_hclk(log: &[(Reg, u32)], hse: Hertz, pll: Pll) {
    let mut latency = 0;
    let mut sw = 0b00;
    let mut hpre = 0;
    for &(reg, value) in log {
        if reg == ACR {
            latency = FLASH.acr().latency().extract(value) as u8;
        } else if reg == CFGR {
            sw = RCC.cfgr().sw().extract(value);
            hpre = RCC.cfgr().hpre().extract(value);
        } else {
            continue;
        }
        let sysclk = match sw {
            0b00 => HSI_FREQ.0,
            0b01 => hse.0,
            _ => pll.p_output_hz(hse.0),
        };
        let hclk = sysclk / AhbPrescaler::from_bits(hpre).divisor();
        assert!(
            FlashLatency::Auto.wait_states(Hertz(hclk)) <= latency,
            "hclk {} Hz with {} wait states",
            hclk,
            latency
        );
    }
}

#[test]
fn wait_states_cover_every_intermediate_hclk() {
    let sim = SimRegisters::new();
    init(&sim, ConfigBuilder::hse_168mhz().checked(), PollLimit::Unbounded).unwrap();
    assert_wait_states_cover_hclk(&sim.writes(), Hertz::mhz(8), PLL_168);
    assert_eq!(sim.peek_field(FLASH.acr().latency()), 5);
}

#[test]
fn divided_hclk_still_covers_undivided_switch() {
    let sim = SimRegisters::new();
    let config = ConfigBuilder::hse_168mhz()
        .with_prescalers(BusPrescalers::new().with_ahb(AhbPrescaler::Div8))
        .checked();
    let rcc = init(&sim, config, PollLimit::Unbounded).unwrap();

    assert_eq!(rcc.clocks().hclk, Hertz::mhz(21));
    assert_wait_states_cover_hclk(&sim.writes(), Hertz::mhz(8), PLL_168);
    // raised for the switch, back down once HCLK is divided
    assert_eq!(sim.writes_to(ACR).iter().map(|&v| FLASH.acr().latency().extract(v)).max(), Some(5));
    assert_eq!(sim.peek_field(FLASH.acr().latency()), 0);
}

#[test]
fn pll_outputs_above_32_bits_saturate() {
    let pll = Pll::new(PllSource::Hse, 2, 432, PllPDiv::Div8, 15);
    let hse = 26_000_000;

    assert_eq!(pll.vco_in_hz(hse), 13_000_000);
    assert_eq!(pll.vco_out_hz(hse), u32::MAX);
    assert_eq!(pll.p_output_hz(hse), 702_000_000);
    assert_eq!(pll.q_output_hz(hse), 374_400_000);
}

#[test]
fn out_of_range_pll_is_read_back_without_overflow() {
    let sim = SimRegisters::new();
    let mut rcc = Rcc::new(&sim, Some(Hse::new(Hertz::mhz(26))), PollLimit::Unbounded).unwrap();

    assert_eq!(rcc.configure_pll(&Pll::new(PllSource::Hse, 2, 432, PllPDiv::Div8, 15)), Ok(()));
    assert_eq!(rcc.current_source(), ClockSource::Hsi);
    assert_eq!(rcc.clocks().pll48, MaybeHertz::from(Hertz(374_400_000)));
}

#[test]
fn flash_latency_from_hclk() {
    assert_eq!(FlashLatency::Auto.wait_states(Hertz::mhz(16)), 0);
    assert_eq!(FlashLatency::Auto.wait_states(Hertz::mhz(30)), 0);
    assert_eq!(FlashLatency::Auto.wait_states(Hertz::mhz(31)), 1);
    assert_eq!(FlashLatency::Auto.wait_states(Hertz::mhz(168)), 5);
    assert_eq!(FlashLatency::Fixed(3).wait_states(Hertz::mhz(168)), 3);
}

#[test]
fn prescaler_encodings() {
    assert_eq!(PllPDiv::Div2.to_bits(), 0);
    assert_eq!(PllPDiv::Div4.to_bits(), 1);
    assert_eq!(PllPDiv::Div6.to_bits(), 2);
    assert_eq!(PllPDiv::Div8.to_bits(), 3);
    assert_eq!(AhbPrescaler::from_bits(0b0111), AhbPrescaler::Div1);
    assert_eq!(AhbPrescaler::from_bits(AhbPrescaler::Div512.to_bits()), AhbPrescaler::Div512);
    assert_eq!(ApbPrescaler::from_bits(0b011), ApbPrescaler::Div1);
    assert_eq!(Hertz::mhz(168) / AhbPrescaler::Div64, Hertz(2_625_000));
    assert_eq!(RtcPrescaler(1).divisor(), None);
}

#[test]
#[should_panic(expected = "sysclk is set to PLL, but pll is None")]
fn check_rejects_pll_without_config() {
    ConfigBuilder::new().with_sys(ClockSource::Pll).check();
}

#[test]
#[should_panic(expected = "PLL VCO input out of range")]
fn check_rejects_vco_input() {
    ConfigBuilder::hse_168mhz().with_pll(PLL_168.with_prediv(2)).check();
}

#[test]
#[should_panic(expected = "PCLK1 exceeds maximum limit")]
fn check_rejects_fast_apb1() {
    ConfigBuilder::hse_168mhz()
        .with_prescalers(BusPrescalers::new().with_apb1(ApbPrescaler::Div2).with_apb2(ApbPrescaler::Div2))
        .check();
}
