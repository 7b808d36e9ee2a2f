#![no_std]
#![no_main]

use cortex_m_rt::entry;
use defmt::*;
use f4_clock_hal::gpio::{Gpio, Pin};
use f4_clock_hal::rcc::{self, ConfigBuilder, McoChannel, McoPrescaler, McoSource};
use f4_clock_hal::systick::{SysTick, TimeUnit};
use f4_clock_hal::usart::{Config, Usart};
use f4_clock_hal::{Port, UsartInstance};
use {defmt_rtt as _, panic_probe as _};

// 8 MHz crystal on the board. Scope PA8 for PLL / 4 = 42 MHz and
// connect a USB-serial adapter to PA2/PA3 at 115200 baud.

#[entry]
fn main() -> ! {
    let mut config = f4_clock_hal::Config::default();
    config.rcc = const { ConfigBuilder::hse_168mhz().checked() };
    let mut rcc = unwrap!(f4_clock_hal::init(config));
    let regs = f4_clock_hal::registers();
    let clocks = *rcc.clocks();
    info!("Clocks: {}", clocks);

    let mut gpio = Gpio::new(regs);
    unwrap!(rcc.configure_clock_output(McoChannel::Mco1, McoSource::Pll, McoPrescaler::Div4, &mut gpio));

    let mut systick = SysTick::new(regs);
    unwrap!(systick.configure_timebase(clocks.sysclk, TimeUnit::Micros));

    let pclk = rcc::frequency(&clocks, UsartInstance::USART2.peripheral());
    let mut usart = unwrap!(Usart::new(
        regs,
        UsartInstance::USART2,
        pclk,
        Some(Pin::new(Port::A, 2)),
        Some(Pin::new(Port::A, 3)),
        &mut gpio,
        &Config::default(),
    ));
    info!("USART2 divisor: {}", usart.divisor());

    loop {
        unwrap!(usart.blocking_write(b"Hello STM32F407!\n"));
        systick.delay(1000, TimeUnit::Millis);
    }
}
