//! Pin configuration.
//!
//! Clock outputs and serial ports only need a pin to be put into a given
//! electrical mode. [`PinConfig`] is that capability; [`Gpio`] implements it on
//! top of the port registers.

use crate::pac::{self, RegisterFile};
use crate::rcc;
use crate::Port;

/// A single pin, e.g. `Pin::new(Port::A, 8)` for PA8.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Pin {
    pub port: Port,
    pub pin: u8,
}

impl Pin {
    pub const fn new(port: Port, pin: u8) -> Self {
        ::core::assert!(pin < 16, "pin number out of range");
        Self { port, pin }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    Input = 0b00,
    Output = 0b01,
    AlternateFunction = 0b10,
    Analog = 0b11,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Speed {
    Low = 0b00,
    Medium = 0b01,
    High = 0b10,
    VeryHigh = 0b11,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputType {
    PushPull = 0,
    OpenDrain = 1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Pull {
    None = 0b00,
    Up = 0b01,
    Down = 0b10,
}

/// Puts pins into a requested electrical mode.
pub trait PinConfig {
    fn enable_port_clock(&mut self, port: Port);

    fn set_pin_mode(&mut self, pin: Pin, mode: Mode);

    fn set_alternate_function(&mut self, pin: Pin, af: u8);

    fn set_output_speed(&mut self, pin: Pin, speed: Speed);

    fn set_output_type(&mut self, pin: Pin, output_type: OutputType);

    fn set_pull(&mut self, pin: Pin, pull: Pull);
}

/// [`PinConfig`] over the GPIO port registers.
pub struct Gpio<'d, R: RegisterFile> {
    regs: &'d R,
}

impl<'d, R: RegisterFile> Gpio<'d, R> {
    pub fn new(regs: &'d R) -> Self {
        Self { regs }
    }

    fn port(pin: Pin) -> pac::gpio::Regs {
        pac::gpio::Regs::new(pin.port.address())
    }
}

impl<'d, R: RegisterFile> PinConfig for Gpio<'d, R> {
    fn enable_port_clock(&mut self, port: Port) {
        rcc::enable(self.regs, port.peripheral());
    }

    fn set_pin_mode(&mut self, pin: Pin, mode: Mode) {
        self.regs.set(Self::port(pin).moder().moder(pin.pin as usize), mode as u32);
    }

    fn set_alternate_function(&mut self, pin: Pin, af: u8) {
        let n = pin.pin as usize;
        self.regs.set(Self::port(pin).afr(n / 8).afr(n % 8), af as u32);
    }

    fn set_output_speed(&mut self, pin: Pin, speed: Speed) {
        self.regs.set(Self::port(pin).ospeedr().ospeedr(pin.pin as usize), speed as u32);
    }

    fn set_output_type(&mut self, pin: Pin, output_type: OutputType) {
        self.regs.set(Self::port(pin).otyper().ot(pin.pin as usize), output_type as u32);
    }

    fn set_pull(&mut self, pin: Pin, pull: Pull) {
        self.regs.set(Self::port(pin).pupdr().pupdr(pin.pin as usize), pull as u32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pac::sim::SimRegisters;
    use crate::pac::RCC;

    #[test]
    fn alternate_function_lands_in_the_right_half() {
        let sim = SimRegisters::new();
        let mut gpio = Gpio::new(&sim);
        let pa = pac::gpio::Regs::new(Port::A.address());

        gpio.set_alternate_function(Pin::new(Port::A, 2), 7);
        gpio.set_alternate_function(Pin::new(Port::A, 10), 8);

        assert_eq!(pa.afr(1).reg().address(), Port::A.address() + 0x24);
        assert_eq!(sim.peek(pa.afr(0).reg()), 7 << 8);
        assert_eq!(sim.peek(pa.afr(1).reg()), 8 << 8);
    }

    #[test]
    fn pin_mode_keeps_neighbours() {
        let sim = SimRegisters::new();
        let pc = pac::gpio::Regs::new(Port::C.address());
        sim.force(pc.moder().reg(), 0xFFFF_FFFF);
        let mut gpio = Gpio::new(&sim);

        gpio.set_pin_mode(Pin::new(Port::C, 9), Mode::AlternateFunction);
        gpio.set_output_speed(Pin::new(Port::C, 9), Speed::VeryHigh);

        assert_eq!(sim.peek(pc.moder().reg()), 0xFFF3_FFFF | (0b10 << 18));
        assert_eq!(sim.peek(pc.ospeedr().reg()), 0b11 << 18);
    }

    #[test]
    fn port_clock_sets_only_its_bit() {
        let sim = SimRegisters::new();
        let mut gpio = Gpio::new(&sim);

        gpio.enable_port_clock(Port::C);

        let enable = Port::C.peripheral().enable_field();
        assert_eq!(enable, RCC.ahb1enr().gpiocen());
        assert_eq!(enable.reg().address(), RCC.base() + 0x30);
        assert_eq!(sim.peek(enable.reg()), 1 << 2);
    }
}
