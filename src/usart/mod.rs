//! Universal Synchronous/Asynchronous Receiver Transmitter (USART, UART)
#![warn(missing_docs)]

use core::fmt;

use embassy_embedded_hal::SetConfig;

use crate::gpio::{Mode as PinMode, OutputType, Pin, PinConfig, Pull, Speed};
use crate::pac::usart::Regs;
use crate::pac::RegisterFile;
use crate::time::Hertz;
use crate::utils::relax;
use crate::{rcc, UsartInstance};

/// Samples taken per bit on the receive line.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Oversampling {
    /// 16 samples per bit, 4 fraction bits
    #[default]
    By16,
    /// 8 samples per bit, 3 fraction bits, twice the maximum baud rate
    By8,
}

impl Oversampling {
    /// Samples per bit, which is also the scale of the fraction field.
    pub const fn samples(self) -> u32 {
        match self {
            Oversampling::By16 => 16,
            Oversampling::By8 => 8,
        }
    }

    const fn fraction_mask(self) -> u32 {
        match self {
            Oversampling::By16 => 0xF,
            Oversampling::By8 => 0x7,
        }
    }
}

impl TryFrom<u8> for Oversampling {
    type Error = ConfigError;

    fn try_from(samples: u8) -> Result<Self, Self::Error> {
        match samples {
            16 => Ok(Oversampling::By16),
            8 => Ok(Oversampling::By8),
            _ => Err(ConfigError::UnsupportedMode),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Operating mode
pub enum Mode {
    /// Asynchronous, no clock output
    #[default]
    Async,
    /// Synchronous, clock driven on CK
    Sync,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Word length, parity bit included
pub enum DataBits {
    /// 8 Data Bits
    DataBits8,
    /// 9 Data Bits
    DataBits9,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Parity
pub enum Parity {
    /// No parity
    ParityNone,
    /// Even Parity
    ParityEven,
    /// Odd Parity
    ParityOdd,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Number of stop bits
pub enum StopBits {
    #[doc = "1 stop bit"]
    STOP1,
    #[doc = "0.5 stop bits"]
    STOP0P5,
    #[doc = "2 stop bits"]
    STOP2,
    #[doc = "1.5 stop bits"]
    STOP1P5,
}

impl StopBits {
    const fn to_bits(self) -> u32 {
        match self {
            StopBits::STOP1 => 0b00,
            StopBits::STOP0P5 => 0b01,
            StopBits::STOP2 => 0b10,
            StopBits::STOP1P5 => 0b11,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Enabled halves of the line
pub enum Direction {
    /// Receiver only
    Rx,
    /// Transmitter only
    Tx,
    /// Both
    RxTx,
}

impl Direction {
    const fn rx(self) -> bool {
        matches!(self, Direction::Rx | Direction::RxTx)
    }

    const fn tx(self) -> bool {
        matches!(self, Direction::Tx | Direction::RxTx)
    }
}

#[non_exhaustive]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Config Error
pub enum ConfigError {
    /// Oversampling other than 8 or 16 samples per bit
    UnsupportedMode,
    /// Baud rate of zero
    ZeroBaudrate,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnsupportedMode => write!(f, "unsupported oversampling mode"),
            ConfigError::ZeroBaudrate => write!(f, "baud rate must not be zero"),
        }
    }
}

impl core::error::Error for ConfigError {}

#[non_exhaustive]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Config
pub struct Config {
    /// Baud rate
    pub baudrate: u32,
    /// Receiver oversampling
    pub oversampling: Oversampling,
    /// Asynchronous or synchronous operation
    pub mode: Mode,
    /// Number of data bits
    pub data_bits: DataBits,
    /// Parity type
    pub parity: Parity,
    /// Number of stop bits
    pub stop_bits: StopBits,
    /// Receiver and transmitter enables
    pub direction: Direction,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            baudrate: 115200,
            oversampling: Oversampling::By16,
            mode: Mode::Async,
            data_bits: DataBits::DataBits8,
            parity: Parity::ParityNone,
            stop_bits: StopBits::STOP1,
            direction: Direction::RxTx,
        }
    }
}

/// Serial error
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// Framing error
    Framing,
    /// Noise error
    Noise,
    /// RX buffer overrun
    Overrun,
    /// Parity check error
    Parity,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Framing => write!(f, "framing error"),
            Error::Noise => write!(f, "noise error"),
            Error::Overrun => write!(f, "RX buffer overrun"),
            Error::Parity => write!(f, "parity check error"),
        }
    }
}

impl core::error::Error for Error {}

/// `USARTDIV` as programmed into `BRR`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RateDivisor {
    /// Integer part, 12 bits on the register
    pub mantissa: u32,
    /// Fraction in sixteenths (By16) or eighths (By8)
    pub fraction: u32,
    /// Oversampling the fraction is scaled for
    pub oversampling: Oversampling,
}

impl RateDivisor {
    /// Register bit pattern: mantissa above bit 4, fraction below.
    pub const fn bits(&self) -> u32 {
        (self.mantissa << 4) | (self.fraction & self.oversampling.fraction_mask())
    }

    /// Decodes a `BRR` value read back from an instance running with `oversampling`.
    pub const fn from_bits(bits: u32, oversampling: Oversampling) -> Self {
        Self {
            mantissa: (bits >> 4) & 0xFFF,
            fraction: bits & oversampling.fraction_mask(),
            oversampling,
        }
    }

    /// Baud rate this divisor really produces from `bus_clock`.
    pub const fn actual_baudrate(&self, bus_clock: Hertz) -> u32 {
        let samples = self.oversampling.samples() as u64;
        let div = self.mantissa as u64 * samples + self.fraction as u64;
        match (bus_clock.0 as u64).checked_div(div) {
            Some(baud) => baud as u32,
            None => 0,
        }
    }
}

/// Computes the `BRR` divisor for `baudrate` out of `bus_clock`.
///
/// `USARTDIV = bus_clock / (8 * (2 - OVER8) * baudrate)`. The fraction is scaled
/// to the oversampling and rounded half away from zero; a fraction that rounds
/// up to a whole unit carries into the mantissa. The result is not range
/// checked: divisors that are zero or overflow the 12-bit mantissa are the
/// caller's problem.
pub fn compute_divisor(bus_clock: Hertz, baudrate: u32, oversampling: Oversampling) -> Result<RateDivisor, ConfigError> {
    if baudrate == 0 {
        return Err(ConfigError::ZeroBaudrate);
    }

    let scale = oversampling.samples() as u64;
    let den = baudrate as u64 * scale;
    let clock = bus_clock.0 as u64;

    let mut mantissa = clock / den;
    let rem = clock % den;
    // round(rem / den * scale)
    let mut fraction = (2 * rem * scale + den) / (2 * den);
    if fraction >= scale {
        fraction = 0;
        mantissa += 1;
    }

    Ok(RateDivisor {
        mantissa: mantissa as u32,
        fraction: fraction as u32,
        oversampling,
    })
}

fn brr_mask(brr: crate::pac::usart::regs::Brr) -> u32 {
    brr.div_mantissa().mask() | brr.div_fraction().mask()
}

/// Blocking serial driver.
///
/// Like the clock controller, none of the methods may be called from an
/// interrupt handler while another call is busy-waiting on the status register.
pub struct Usart<'d, R: RegisterFile> {
    regs: &'d R,
    instance: UsartInstance,
    block: Regs,
    kernel_clock: Hertz,
    config: Config,
}

impl<'d, R: RegisterFile> Usart<'d, R> {
    /// Enables `instance`, routes `tx` and `rx` to it and applies `config`.
    ///
    /// `kernel_clock` is the instance's bus clock, see [`rcc::frequency`].
    pub fn new(
        regs: &'d R,
        instance: UsartInstance,
        kernel_clock: Hertz,
        tx: Option<Pin>,
        rx: Option<Pin>,
        pins: &mut impl PinConfig,
        config: &Config,
    ) -> Result<Self, ConfigError> {
        // reject a bad config before the peripheral is touched
        compute_divisor(kernel_clock, config.baudrate, config.oversampling)?;

        rcc::enable(regs, instance.peripheral());

        let af = instance.af();
        if let Some(pin) = tx {
            pins.enable_port_clock(pin.port);
            pins.set_pin_mode(pin, PinMode::AlternateFunction);
            pins.set_alternate_function(pin, af);
            pins.set_output_type(pin, OutputType::PushPull);
            pins.set_output_speed(pin, Speed::VeryHigh);
            pins.set_pull(pin, Pull::None);
        }
        if let Some(pin) = rx {
            pins.enable_port_clock(pin.port);
            pins.set_pin_mode(pin, PinMode::AlternateFunction);
            pins.set_alternate_function(pin, af);
        }

        let mut this = Self {
            regs,
            instance,
            block: Regs::new(instance.address()),
            kernel_clock,
            config: *config,
        };
        this.configure(config)?;
        Ok(this)
    }

    /// Instance driven by this handle.
    pub fn instance(&self) -> UsartInstance {
        self.instance
    }

    /// Config currently applied.
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn configure(&mut self, config: &Config) -> Result<(), ConfigError> {
        let divisor = compute_divisor(self.kernel_clock, config.baudrate, config.oversampling)?;
        let (cr1, cr2) = (self.block.cr1(), self.block.cr2());

        self.regs.set(cr1.ue(), 0);
        self.write_divisor(config.baudrate, &divisor);

        self.regs.modify(cr2.reg(), |r| {
            let r = cr2.stop().insert(r, config.stop_bits.to_bits());
            cr2.clken().insert(r, (config.mode == Mode::Sync) as u32)
        });

        self.regs.modify(cr1.reg(), |r| {
            let r = cr1.re().insert(r, config.direction.rx() as u32);
            let r = cr1.te().insert(r, config.direction.tx() as u32);
            let r = cr1.pce().insert(r, (config.parity != Parity::ParityNone) as u32);
            let r = cr1.ps().insert(r, (config.parity == Parity::ParityOdd) as u32);
            let r = cr1.m().insert(r, (config.data_bits == DataBits::DataBits9) as u32);
            let r = cr1.over8().insert(r, (config.oversampling == Oversampling::By8) as u32);
            cr1.ue().insert(r, 1)
        });

        self.config = *config;
        debug!("usart: {:?} configured, {:?}", self.instance, config);
        Ok(())
    }

    fn write_divisor(&self, baudrate: u32, divisor: &RateDivisor) {
        let brr = self.block.brr();
        self.regs.write(brr.reg(), divisor.bits() & brr_mask(brr));
        trace!(
            "usart: {:?} oversampling, desired baudrate: {}, actual baudrate: {}",
            divisor.oversampling,
            baudrate,
            divisor.actual_baudrate(self.kernel_clock)
        );
    }

    /// Reconfigure the driver
    pub fn set_config(&mut self, config: &Config) -> Result<(), ConfigError> {
        self.configure(config)
    }

    /// Set baudrate, keeping the rest of the frame format.
    pub fn set_baudrate(&mut self, baudrate: u32) -> Result<(), ConfigError> {
        let divisor = compute_divisor(self.kernel_clock, baudrate, self.config.oversampling)?;
        let ue = self.block.cr1().ue();

        self.config.baudrate = baudrate;
        self.regs.set(ue, 0);
        self.write_divisor(baudrate, &divisor);
        self.regs.set(ue, 1);
        Ok(())
    }

    /// Divisor currently programmed, read back from `BRR`.
    pub fn divisor(&self) -> RateDivisor {
        let oversampling = if self.regs.is_set(self.block.cr1().over8()) {
            Oversampling::By8
        } else {
            Oversampling::By16
        };
        let brr = self.block.brr();
        RateDivisor::from_bits(self.regs.read(brr.reg()) & brr_mask(brr), oversampling)
    }

    /// Perform a blocking write
    pub fn blocking_write(&mut self, buffer: &[u8]) -> Result<(), Error> {
        let txe = self.block.sr().txe();
        for &b in buffer {
            while !self.regs.is_set(txe) {
                relax();
            }
            self.regs.write(self.block.dr().reg(), b as u32);
        }
        Ok(())
    }

    /// Block until transmission complete
    pub fn blocking_flush(&mut self) -> Result<(), Error> {
        let tc = self.block.sr().tc();
        while !self.regs.is_set(tc) {
            relax();
        }
        Ok(())
    }

    /// Reads `SR`. A pending error is cleared by the following `DR` read.
    fn check_rx_flags(&mut self) -> Result<bool, Error> {
        let flags = self.block.sr();
        let sr = self.regs.read(flags.reg());
        let error = if flags.pe().extract(sr) != 0 {
            Some(Error::Parity)
        } else if flags.fe().extract(sr) != 0 {
            Some(Error::Framing)
        } else if flags.nf().extract(sr) != 0 {
            Some(Error::Noise)
        } else if flags.ore().extract(sr) != 0 {
            Some(Error::Overrun)
        } else {
            None
        };

        match error {
            Some(e) => {
                self.regs.read(self.block.dr().reg());
                warn!("usart: {:?} {:?}", self.instance, e);
                Err(e)
            }
            None => Ok(flags.rxne().extract(sr) != 0),
        }
    }

    /// Read a single u8 if there is one available, otherwise return WouldBlock
    pub fn nb_read(&mut self) -> Result<u8, nb::Error<Error>> {
        if self.check_rx_flags()? {
            Ok(self.regs.read(self.block.dr().reg()) as u8)
        } else {
            Err(nb::Error::WouldBlock)
        }
    }

    /// Perform a blocking read into `buffer`
    pub fn blocking_read(&mut self, buffer: &mut [u8]) -> Result<(), Error> {
        for b in buffer {
            while !self.check_rx_flags()? {
                relax();
            }
            *b = self.regs.read(self.block.dr().reg()) as u8;
        }
        Ok(())
    }
}

impl<'d, R: RegisterFile> SetConfig for Usart<'d, R> {
    type Config = Config;
    type ConfigError = ConfigError;

    fn set_config(&mut self, config: &Self::Config) -> Result<(), Self::ConfigError> {
        self.configure(config)
    }
}

impl<'d, R: RegisterFile> embedded_hal_02::serial::Read<u8> for Usart<'d, R> {
    type Error = Error;
    fn read(&mut self) -> Result<u8, nb::Error<Self::Error>> {
        self.nb_read()
    }
}

impl<'d, R: RegisterFile> embedded_hal_02::blocking::serial::Write<u8> for Usart<'d, R> {
    type Error = Error;
    fn bwrite_all(&mut self, buffer: &[u8]) -> Result<(), Self::Error> {
        self.blocking_write(buffer)
    }
    fn bflush(&mut self) -> Result<(), Self::Error> {
        self.blocking_flush()
    }
}

impl embedded_hal_nb::serial::Error for Error {
    fn kind(&self) -> embedded_hal_nb::serial::ErrorKind {
        match *self {
            Self::Framing => embedded_hal_nb::serial::ErrorKind::FrameFormat,
            Self::Noise => embedded_hal_nb::serial::ErrorKind::Noise,
            Self::Overrun => embedded_hal_nb::serial::ErrorKind::Overrun,
            Self::Parity => embedded_hal_nb::serial::ErrorKind::Parity,
        }
    }
}

impl<'d, R: RegisterFile> embedded_hal_nb::serial::ErrorType for Usart<'d, R> {
    type Error = Error;
}

impl<'d, R: RegisterFile> embedded_hal_nb::serial::Read for Usart<'d, R> {
    fn read(&mut self) -> nb::Result<u8, Self::Error> {
        self.nb_read()
    }
}

impl<'d, R: RegisterFile> embedded_hal_nb::serial::Write for Usart<'d, R> {
    fn write(&mut self, char: u8) -> nb::Result<(), Self::Error> {
        self.blocking_write(&[char]).map_err(nb::Error::Other)
    }

    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        self.blocking_flush().map_err(nb::Error::Other)
    }
}

impl embedded_io::Error for Error {
    fn kind(&self) -> embedded_io::ErrorKind {
        embedded_io::ErrorKind::Other
    }
}

impl<R: RegisterFile> embedded_io::ErrorType for Usart<'_, R> {
    type Error = Error;
}

impl<R: RegisterFile> embedded_io::Write for Usart<'_, R> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.blocking_write(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.blocking_flush()
    }
}

impl<R: RegisterFile> embedded_io::Read for Usart<'_, R> {
    /// Blocks for the first byte, then takes whatever else is already received.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let Some((first, rest)) = buf.split_first_mut() else {
            return Ok(0);
        };
        while !self.check_rx_flags()? {
            relax();
        }
        *first = self.regs.read(self.block.dr().reg()) as u8;

        let mut n = 1;
        for b in rest {
            match self.nb_read() {
                Ok(byte) => *b = byte,
                Err(nb::Error::WouldBlock) => break,
                Err(nb::Error::Other(e)) => return Err(e),
            }
            n += 1;
        }
        Ok(n)
    }
}
