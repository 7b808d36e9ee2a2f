//! Register-level access for the blocks this crate drives.
//!
//! Every driver talks to hardware through a [`RegisterFile`], so the same clock
//! and serial code runs against [`Mmio`] on the chip and against
//! [`sim::SimRegisters`] on the host.
//!
//! Block layouts (`rcc`, `flash`, `systick`, `gpio`, `usart`) and the fixed
//! `RCC`, `FLASH` and `SYSTICK` instances are generated from the chip's register
//! descriptions under `data/`.

#[allow(clippy::all)]
mod generated {
    include!(concat!(env!("OUT_DIR"), "/pac.rs"));
}
pub use generated::*;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

/// A 32-bit register, identified by its absolute address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Reg(u32);

impl Reg {
    pub const fn at(base: u32, offset: u32) -> Self {
        Self(base + offset)
    }

    pub const fn address(self) -> u32 {
        self.0
    }
}

/// A contiguous bit field inside a [`Reg`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Field {
    reg: Reg,
    offset: u8,
    width: u8,
}

impl Field {
    pub const fn new(reg: Reg, offset: u8, width: u8) -> Self {
        ::core::assert!(width >= 1 && offset as u32 + width as u32 <= 32);
        Self { reg, offset, width }
    }

    pub const fn reg(self) -> Reg {
        self.reg
    }

    pub const fn offset(self) -> u8 {
        self.offset
    }

    pub const fn width(self) -> u8 {
        self.width
    }

    /// Mask of the field, in register position.
    pub const fn mask(self) -> u32 {
        let bits = if self.width >= 32 { u32::MAX } else { (1u32 << self.width) - 1 };
        bits << self.offset
    }

    pub const fn extract(self, raw: u32) -> u32 {
        (raw & self.mask()) >> self.offset
    }

    /// `raw` with the field cleared and `value` written into it.
    /// Bits of `value` beyond the field width are dropped.
    pub const fn insert(self, raw: u32, value: u32) -> u32 {
        (raw & !self.mask()) | ((value << self.offset) & self.mask())
    }
}

/// Word-wide access to memory-mapped registers.
///
/// Both accessors take `&self`: registers are shared mutable state, exactly like
/// the hardware they stand for. Implementations are not expected to be `Sync`;
/// drivers must not be called from an interrupt while they are busy-waiting.
pub trait RegisterFile {
    fn read(&self, reg: Reg) -> u32;

    fn write(&self, reg: Reg, value: u32);

    #[inline]
    fn modify(&self, reg: Reg, f: impl FnOnce(u32) -> u32) {
        let value = self.read(reg);
        self.write(reg, f(value));
    }

    #[inline]
    fn get(&self, field: Field) -> u32 {
        field.extract(self.read(field.reg()))
    }

    /// Read-modify-write of a single field, other bits untouched.
    #[inline]
    fn set(&self, field: Field, value: u32) {
        self.modify(field.reg(), |r| field.insert(r, value));
    }

    #[inline]
    fn is_set(&self, field: Field) -> bool {
        self.get(field) != 0
    }
}

impl<R: RegisterFile + ?Sized> RegisterFile for &R {
    fn read(&self, reg: Reg) -> u32 {
        (**self).read(reg)
    }

    fn write(&self, reg: Reg, value: u32) {
        (**self).write(reg, value)
    }
}

/// Volatile access to the real peripheral address space.
#[derive(Clone, Copy, Debug)]
pub struct Mmio {
    _private: (),
}

impl Mmio {
    /// # Safety
    ///
    /// Only valid on the target chip. The caller takes over ownership of the RCC,
    /// FLASH, SysTick, GPIO and USART blocks; nothing else may drive them
    /// concurrently.
    pub const unsafe fn steal() -> Self {
        Self { _private: () }
    }
}

impl RegisterFile for Mmio {
    #[inline(always)]
    fn read(&self, reg: Reg) -> u32 {
        // Safety: `Mmio` only exists on the target, where every `Reg` built by this
        // crate is a valid, aligned peripheral register.
        unsafe { core::ptr::read_volatile(reg.address() as usize as *const u32) }
    }

    #[inline(always)]
    fn write(&self, reg: Reg, value: u32) {
        // Safety: see `read`.
        unsafe { core::ptr::write_volatile(reg.address() as usize as *mut u32, value) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const R: Reg = Reg::at(0x4000_0000, 0x08);

    #[test]
    fn field_insert_and_extract() {
        let f = Field::new(R, 4, 4);
        assert_eq!(f.mask(), 0xF0);
        assert_eq!(f.insert(0xFFFF_FFFF, 0b1010), 0xFFFF_FFAF);
        assert_eq!(f.extract(0x0000_00A0), 0b1010);
        // value wider than the field is truncated
        assert_eq!(f.insert(0, 0x1F), 0xF0);

        let full = Field::new(R, 0, 32);
        assert_eq!(full.mask(), u32::MAX);
        assert_eq!(R.address(), 0x4000_0008);
    }

    #[test]
    fn systick_at_core_peripheral_address() {
        assert_eq!(cortex_m::peripheral::SYST::PTR as usize, SYSTICK.base() as usize);
    }
}
