use super::*;
use crate::pac::sim::SimRegisters;

#[test]
fn reload_range() {
    let sim = SimRegisters::new();
    let mut systick = SysTick::new(&sim);

    assert_eq!(systick.configure(0, false), Err(ConfigError::ReloadOutOfRange));
    assert_eq!(systick.configure(MAX_RELOAD + 2, false), Err(ConfigError::ReloadOutOfRange));
    assert!(sim.writes().is_empty());

    assert_eq!(systick.configure(MAX_RELOAD + 1, false), Ok(()));
    assert_eq!(sim.peek(LOAD), 0x00FF_FFFF);
    assert_eq!(systick.configure(1, false), Ok(()));
    assert_eq!(sim.peek(LOAD), 0);
}

#[test]
fn configure_sequence() {
    let sim = SimRegisters::new();
    let mut systick = SysTick::new(&sim);

    systick.configure(16_000, false).unwrap();
    assert_eq!(sim.writes(), [(CTRL, 0), (LOAD, 15_999), (VAL, 0), (CTRL, 0b101)]);

    sim.clear_log();
    systick.configure(16_000, true).unwrap();
    assert_eq!(sim.writes_to(CTRL), [0, 0b111]);
}

#[test]
fn timebase_from_cpu_clock() {
    let sim = SimRegisters::new();
    let mut systick = SysTick::new(&sim);

    systick.configure_timebase(Hertz::mhz(16), TimeUnit::Micros).unwrap();
    assert_eq!(sim.peek(LOAD), 15);
    systick.configure_timebase(Hertz::mhz(168), TimeUnit::Millis).unwrap();
    assert_eq!(sim.peek(LOAD), 167_999);
}

#[test]
fn millisecond_delay_counts_microsecond_periods() {
    let sim = SimRegisters::new();
    let mut systick = SysTick::new(&sim);
    systick.configure_timebase(Hertz::mhz(16), TimeUnit::Micros).unwrap();
    sim.clear_log();

    systick.delay(5, TimeUnit::Millis);

    assert_eq!(sim.writes_to(VAL).len(), 5000);
    assert_eq!(sim.writes().len(), 5000);
}

#[test]
fn each_period_polls_until_wrap() {
    let sim = SimRegisters::new();
    let mut systick = SysTick::new(&sim);
    systick.configure(16, false).unwrap();
    sim.set_systick_period(4);
    sim.clear_log();

    systick.delay(3, TimeUnit::Micros);

    assert_eq!(sim.writes_to(VAL).len(), 3);
    assert_eq!(sim.reads_of(CTRL), 3 * 5);

    sim.clear_log();
    systick.delay(0, TimeUnit::Millis);
    assert!(sim.writes().is_empty());
}

#[test]
fn millis_saturate() {
    assert_eq!(TimeUnit::Millis.to_micros(7), 7000);
    assert_eq!(TimeUnit::Millis.to_micros(u32::MAX), u32::MAX);
    assert_eq!(TimeUnit::Micros.to_micros(u32::MAX), u32::MAX);
}

#[test]
fn deconfigure_stops_counter() {
    let sim = SimRegisters::new();
    let mut systick = SysTick::new(&sim);
    systick.configure(16, true).unwrap();

    systick.deconfigure();

    assert_eq!(sim.peek(CTRL), 0);
}

#[test]
fn hal_delay_traits() {
    use embedded_hal_1::delay::DelayNs;

    let sim = SimRegisters::new();
    let mut systick = SysTick::new(&sim);
    systick.configure_timebase(Hertz::mhz(16), TimeUnit::Micros).unwrap();

    sim.clear_log();
    systick.delay_ns(1500);
    assert_eq!(sim.writes_to(VAL).len(), 2);

    sim.clear_log();
    DelayNs::delay_ms(&mut systick, 2);
    assert_eq!(sim.writes_to(VAL).len(), 2000);

    sim.clear_log();
    embedded_hal_02::blocking::delay::DelayUs::<u16>::delay_us(&mut systick, 7u16);
    assert_eq!(sim.writes_to(VAL).len(), 7);
}
