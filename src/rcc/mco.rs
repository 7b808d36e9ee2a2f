//! Microcontroller clock outputs (MCO1 on PA8, MCO2 on PC9).

use super::{ClockError, Rcc};
use crate::gpio::{Mode, Pin, PinConfig, Speed};
use crate::pac::{Field, RegisterFile, RCC};
use crate::Port;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum McoChannel {
    Mco1,
    Mco2,
}

impl McoChannel {
    pub const fn pin(self) -> Pin {
        match self {
            McoChannel::Mco1 => Pin::new(Port::A, 8),
            McoChannel::Mco2 => Pin::new(Port::C, 9),
        }
    }

    const fn source_field(self) -> Field {
        match self {
            McoChannel::Mco1 => RCC.cfgr().mco1(),
            McoChannel::Mco2 => RCC.cfgr().mco2(),
        }
    }

    const fn prescaler_field(self) -> Field {
        match self {
            McoChannel::Mco1 => RCC.cfgr().mco1pre(),
            McoChannel::Mco2 => RCC.cfgr().mco2pre(),
        }
    }
}

/// Signal routed to an MCO pin.
///
/// MCO1 carries HSI, LSE, HSE or PLL; MCO2 carries SYSCLK, PLLI2S, HSE or PLL.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum McoSource {
    Hsi,
    Lse,
    Hse,
    Pll,
    Sysclk,
    PllI2s,
}

impl McoSource {
    /// Field encoding on `channel`, `None` if the channel cannot carry it.
    pub const fn to_bits(self, channel: McoChannel) -> Option<u32> {
        match (channel, self) {
            (McoChannel::Mco1, McoSource::Hsi) => Some(0b00),
            (McoChannel::Mco1, McoSource::Lse) => Some(0b01),
            (McoChannel::Mco1, McoSource::Hse) => Some(0b10),
            (McoChannel::Mco1, McoSource::Pll) => Some(0b11),
            (McoChannel::Mco2, McoSource::Sysclk) => Some(0b00),
            (McoChannel::Mco2, McoSource::PllI2s) => Some(0b01),
            (McoChannel::Mco2, McoSource::Hse) => Some(0b10),
            (McoChannel::Mco2, McoSource::Pll) => Some(0b11),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum McoPrescaler {
    #[default]
    Div1,
    Div2,
    Div3,
    Div4,
    Div5,
}

impl McoPrescaler {
    pub const fn to_bits(self) -> u32 {
        match self {
            McoPrescaler::Div1 => 0b000,
            McoPrescaler::Div2 => 0b100,
            McoPrescaler::Div3 => 0b101,
            McoPrescaler::Div4 => 0b110,
            McoPrescaler::Div5 => 0b111,
        }
    }
}

impl<'d, R: RegisterFile> Rcc<'d, R> {
    /// Routes `source` to the pin of `channel`, divided by `prescaler`.
    ///
    /// The pin is switched to alternate function 0 at very high speed through
    /// `pins`. Only the fields of `channel` are rewritten.
    pub fn configure_clock_output(
        &mut self,
        channel: McoChannel,
        source: McoSource,
        prescaler: McoPrescaler,
        pins: &mut impl PinConfig,
    ) -> Result<(), ClockError> {
        let bits = source.to_bits(channel).ok_or(ClockError::InvalidMcoSource)?;

        let pin = channel.pin();
        pins.enable_port_clock(pin.port);
        pins.set_pin_mode(pin, Mode::AlternateFunction);
        pins.set_alternate_function(pin, 0);
        pins.set_output_speed(pin, Speed::VeryHigh);

        let (source_field, prescaler_field) = (channel.source_field(), channel.prescaler_field());
        self.regs.modify(source_field.reg(), |r| {
            let r = source_field.insert(r, bits);
            prescaler_field.insert(r, prescaler.to_bits())
        });

        debug!("rcc: {:?} outputs {:?} {:?}", channel, source, prescaler);
        Ok(())
    }
}
