use embedded_storage::nor_flash::NorFlash;

use crate::raw::{CONFIG_PAGE_SIZE, WORD_SIZE};

/// The flash controller primitives the store is built on. See [`NorFlashPlatform`] for an
/// implementation on top of `embedded-storage` and `Stm32f1Flash` (feature `stm32f1`) for the
/// register level implementation.
///
/// Program and erase commands only start an operation. The store polls [`Platform::busy`] until
/// the controller is idle and checks [`Platform::error_flags`] afterwards.
pub trait Platform {
    /// Enables programming. Has no effect if the controller is already unlocked.
    fn unlock(&mut self);

    /// Disables programming. Has no effect if the controller is already locked.
    fn lock(&mut self);

    fn locked(&mut self) -> bool;

    /// Starts programming one word at the absolute flash `address`.
    fn write_word(&mut self, address: u32, value: u16);

    fn read_word(&mut self, address: u32) -> Result<u16, ReadFault>;

    /// Starts erasing the page containing `page_address`.
    fn erase_page(&mut self, page_address: u32);

    fn busy(&mut self) -> bool;

    fn error_flags(&mut self) -> ErrorFlags;

    /// Error flags are sticky until cleared.
    fn clear_error_flags(&mut self);
}

impl<T: Platform> Platform for &mut T {
    fn unlock(&mut self) {
        T::unlock(self)
    }

    fn lock(&mut self) {
        T::lock(self)
    }

    fn locked(&mut self) -> bool {
        T::locked(self)
    }

    fn write_word(&mut self, address: u32, value: u16) {
        T::write_word(self, address, value)
    }

    fn read_word(&mut self, address: u32) -> Result<u16, ReadFault> {
        T::read_word(self, address)
    }

    fn erase_page(&mut self, page_address: u32) {
        T::erase_page(self, page_address)
    }

    fn busy(&mut self) -> bool {
        T::busy(self)
    }

    fn error_flags(&mut self) -> ErrorFlags {
        T::error_flags(self)
    }

    fn clear_error_flags(&mut self) {
        T::clear_error_flags(self)
    }
}

/// Error bits reported by the flash controller after a program or erase operation.
#[derive(Debug, Default, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ErrorFlags {
    /// Programming a word that was not erased
    pub programming: bool,
    /// The target address is write protected
    pub write_protection: bool,
}

impl ErrorFlags {
    pub const NONE: ErrorFlags = ErrorFlags {
        programming: false,
        write_protection: false,
    };

    pub fn any(&self) -> bool {
        self.programming || self.write_protection
    }
}

/// The word could not be read. Memory mapped flash never reports this.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReadFault;

/// Drives any `embedded-storage` NOR flash through the [`Platform`] primitives.
///
/// Addresses are offsets into `flash`. The operations of a [`NorFlash`] are blocking, so the
/// controller is never busy and a failed operation is reported through the programming error
/// flag. `NorFlash` implementations have no lock, the lock state is only tracked so programming
/// a locked flash fails the same way it does on hardware.
///
/// A page erase covers every sector of the config page. The sector size has to divide
/// [`CONFIG_PAGE_SIZE`], which is checked when the adapter is created.
pub struct NorFlashPlatform<F: NorFlash> {
    inner: F,
    locked: bool,
    flags: ErrorFlags,
}

impl<F: NorFlash> NorFlashPlatform<F> {
    // Words are programmed and read as a whole, the flash granularity has to divide into them.
    const WORD_ACCESS: () = assert!(
        WORD_SIZE.is_multiple_of(F::WRITE_SIZE)
            && F::READ_SIZE <= MAX_READ_CHUNK
            && MAX_READ_CHUNK.is_multiple_of(F::READ_SIZE),
        "flash granularity does not allow word access"
    );

    // The config page is erased as a whole sector range, a larger sector would take its
    // neighbours with it.
    const PAGE_ERASE: () = assert!(
        CONFIG_PAGE_SIZE.is_multiple_of(F::ERASE_SIZE),
        "flash sectors must divide the config page"
    );

    pub fn new(inner: F) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::WORD_ACCESS;
        #[allow(clippy::let_unit_value)]
        let () = Self::PAGE_ERASE;
        Self {
            inner,
            locked: true,
            flags: ErrorFlags::NONE,
        }
    }

    pub fn into_inner(self) -> F {
        self.inner
    }
}

const MAX_READ_CHUNK: usize = 16;

impl<F: NorFlash> Platform for NorFlashPlatform<F> {
    fn unlock(&mut self) {
        self.locked = false;
    }

    fn lock(&mut self) {
        self.locked = true;
    }

    fn locked(&mut self) -> bool {
        self.locked
    }

    fn write_word(&mut self, address: u32, value: u16) {
        if self.locked {
            self.flags.write_protection = true;
            return;
        }
        let bytes = value.to_le_bytes();
        if self.inner.write(address, &bytes).is_err() {
            self.flags.programming = true;
        }
    }

    fn read_word(&mut self, address: u32) -> Result<u16, ReadFault> {
        let start = align_floor(address as usize, F::READ_SIZE);
        let end = align_ceil(address as usize + WORD_SIZE, F::READ_SIZE);
        let mut buf = [0u8; MAX_READ_CHUNK * 2];
        let chunk = &mut buf[..end - start];
        self.inner
            .read(start as u32, chunk)
            .map_err(|_| ReadFault)?;
        let at = address as usize - start;
        Ok(u16::from_le_bytes([chunk[at], chunk[at + 1]]))
    }

    fn erase_page(&mut self, page_address: u32) {
        if self.locked {
            self.flags.write_protection = true;
            return;
        }
        let from = align_floor(page_address as usize, CONFIG_PAGE_SIZE) as u32;
        let to = from + CONFIG_PAGE_SIZE as u32;
        if self.inner.erase(from, to).is_err() {
            self.flags.programming = true;
        }
    }

    fn busy(&mut self) -> bool {
        false
    }

    fn error_flags(&mut self) -> ErrorFlags {
        self.flags
    }

    fn clear_error_flags(&mut self) {
        self.flags = ErrorFlags::NONE;
    }
}

#[inline(always)]
pub(crate) const fn align_ceil(size: usize, alignment: usize) -> usize {
    if alignment.is_power_of_two() {
        size.saturating_add(alignment - 1) & !(alignment - 1)
    } else {
        size.saturating_add(alignment - 1) / alignment * alignment
    }
}

#[inline(always)]
pub(crate) const fn align_floor(size: usize, alignment: usize) -> usize {
    if alignment.is_power_of_two() {
        size & !(alignment - 1)
    } else {
        size / alignment * alignment
    }
}

#[cfg(feature = "stm32f1")]
mod chip {
    use super::{ErrorFlags, Platform, ReadFault};
    use stm32f1::stm32f103::{FLASH, flash};

    const KEY1: u32 = 0x4567_0123;
    const KEY2: u32 = 0xCDEF_89AB;

    /// The embedded flash controller of the STM32F1 family. Flash is memory mapped, so reads are
    /// plain volatile loads from the absolute address.
    pub struct Stm32f1Flash {
        regs: FLASH,
    }

    impl Stm32f1Flash {
        pub fn new(regs: FLASH) -> Self {
            Self { regs }
        }

        pub fn free(self) -> FLASH {
            self.regs
        }

        fn rb(&self) -> &flash::RegisterBlock {
            &self.regs
        }
    }

    impl Platform for Stm32f1Flash {
        fn unlock(&mut self) {
            if self.rb().cr.read().lock().bit_is_clear() {
                return;
            }
            // Key order matters, a wrong sequence locks the controller until reset.
            unsafe {
                self.rb().keyr.write(|w| w.key().bits(KEY1));
                self.rb().keyr.write(|w| w.key().bits(KEY2));
            }
        }

        fn lock(&mut self) {
            self.rb().cr.modify(|_, w| w.lock().set_bit());
        }

        fn locked(&mut self) -> bool {
            self.rb().cr.read().lock().bit_is_set()
        }

        fn write_word(&mut self, address: u32, value: u16) {
            self.rb()
                .cr
                .modify(|_, w| w.per().clear_bit().pg().set_bit());
            // Safety: the store only passes word aligned addresses inside its own page.
            unsafe { core::ptr::write_volatile(address as *mut u16, value) };
        }

        fn read_word(&mut self, address: u32) -> Result<u16, ReadFault> {
            // Safety: see write_word
            Ok(unsafe { core::ptr::read_volatile(address as *const u16) })
        }

        fn erase_page(&mut self, page_address: u32) {
            self.rb()
                .cr
                .modify(|_, w| w.pg().clear_bit().per().set_bit());
            unsafe {
                self.rb().ar.write(|w| w.far().bits(page_address));
            }
            self.rb().cr.modify(|_, w| w.strt().set_bit());
        }

        fn busy(&mut self) -> bool {
            // BSY lags the start of an operation by one cycle.
            cortex_nop();
            self.rb().sr.read().bsy().bit_is_set()
        }

        fn error_flags(&mut self) -> ErrorFlags {
            let sr = self.rb().sr.read();
            ErrorFlags {
                programming: sr.pgerr().bit_is_set(),
                write_protection: sr.wrprterr().bit_is_set(),
            }
        }

        fn clear_error_flags(&mut self) {
            // The error bits are cleared by writing ones.
            self.rb()
                .sr
                .write(|w| w.pgerr().set_bit().wrprterr().set_bit().eop().set_bit());
        }
    }

    #[inline(always)]
    fn cortex_nop() {
        // Safety: a single nop touches neither memory nor flags.
        unsafe { core::arch::asm!("nop", options(nomem, nostack, preserves_flags)) };
    }
}

#[cfg(feature = "stm32f1")]
pub use chip::*;
