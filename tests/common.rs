#![allow(dead_code)]

// filename according to https://doc.rust-lang.org/book/ch11-03-test-organization.html
use embedded_storage::nor_flash::{
    ErrorType, NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash,
};
use vl_config_store::platform::{ErrorFlags, Platform, ReadFault};
use vl_config_store::{CONFIG_PAGE_SIZE, ENTRY_COUNT, RECORD_SIZE, WORD_SIZE};

/// Where the config page lives on a 64k STM32F103, the last flash page.
pub const PAGE_ADDRESS: u32 = 0x0800_FC00;
pub const STATUS_TABLE_SIZE: usize = ENTRY_COUNT * WORD_SIZE;

pub const fn status_address(slot: usize) -> u32 {
    PAGE_ADDRESS + (slot * WORD_SIZE) as u32
}

pub const fn record_address(slot: usize) -> u32 {
    PAGE_ADDRESS + (STATUS_TABLE_SIZE + slot * RECORD_SIZE) as u32
}

/// Register level model of the STM32F1 flash controller backing one config page.
///
/// Programming only clears bits, and like on the real controller programming a word that is
/// neither erased nor written with zero raises the programming error flag. Every command keeps
/// the controller busy for `busy_cycles` polls.
pub struct Flash {
    pub words: Vec<u16>,
    pub locked: bool,
    pub flags: ErrorFlags,
    pub operations: Vec<Operation>,
    pub busy_cycles: usize,
    pub busy_polls: usize,
    busy_remaining: usize,

    /// Number of program/erase commands after which every command fails
    pub fail_after_operation: usize,
    /// Words written to this address end up with bit 0 flipped
    pub corrupt_write_at: Option<u32>,
    /// This address keeps reading zero after an erase
    pub stuck_after_erase: Option<u32>,
    pub unlock_broken: bool,
    pub fail_reads: bool,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Operation {
    Unlock,
    Lock,
    Write { address: u32, value: u16 },
    Erase { address: u32 },
}

impl Flash {
    pub fn new() -> Self {
        Self {
            words: vec![0xFFFF; CONFIG_PAGE_SIZE / WORD_SIZE],
            locked: true,
            flags: ErrorFlags::NONE,
            operations: vec![],
            busy_cycles: 0,
            busy_polls: 0,
            busy_remaining: 0,
            fail_after_operation: usize::MAX,
            corrupt_write_at: None,
            stuck_after_erase: None,
            unlock_broken: false,
            fail_reads: false,
        }
    }

    pub fn new_with_fault(fail_after_operation: usize) -> Self {
        Self {
            fail_after_operation,
            ..Self::new()
        }
    }

    pub fn disable_faults(&mut self) {
        self.fail_after_operation = usize::MAX;
        self.corrupt_write_at = None;
        self.stuck_after_erase = None;
    }

    fn index(address: u32) -> usize {
        assert!(address >= PAGE_ADDRESS, "access below the config page: {address:#010x}");
        assert!(address.is_multiple_of(WORD_SIZE as u32));
        let index = (address - PAGE_ADDRESS) as usize / WORD_SIZE;
        assert!(index < CONFIG_PAGE_SIZE / WORD_SIZE, "access above the config page: {address:#010x}");
        index
    }

    /// Value of the word at the absolute `address`.
    pub fn word(&self, address: u32) -> u16 {
        self.words[Self::index(address)]
    }

    /// Overwrites a word without any flash semantics, to prepare a page.
    pub fn poke(&mut self, address: u32, value: u16) {
        self.words[Self::index(address)] = value;
    }

    pub fn status_words(&self) -> Vec<u16> {
        (0..ENTRY_COUNT).map(|slot| self.word(status_address(slot))).collect()
    }

    pub fn record_words(&self, slot: usize) -> Vec<u16> {
        (0..RECORD_SIZE / WORD_SIZE)
            .map(|i| self.word(record_address(slot) + (i * WORD_SIZE) as u32))
            .collect()
    }

    pub fn erases(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op, Operation::Erase { .. }))
            .count()
    }

    pub fn writes(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op, Operation::Write { .. }))
            .count()
    }

    pub fn clear_operations(&mut self) {
        self.operations.clear();
    }

    pub fn dump_operations(&self) {
        println!("Operations:");
        for op in &self.operations {
            println!("  {:?}", op);
        }
    }

    fn commands(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op, Operation::Write { .. } | Operation::Erase { .. }))
            .count()
    }
}

impl Platform for Flash {
    fn unlock(&mut self) {
        self.operations.push(Operation::Unlock);
        if !self.unlock_broken {
            self.locked = false;
        }
    }

    fn lock(&mut self) {
        self.operations.push(Operation::Lock);
        self.locked = true;
    }

    fn locked(&mut self) -> bool {
        self.locked
    }

    fn write_word(&mut self, address: u32, value: u16) {
        println!("    flash: write: 0x{address:08X} = 0x{value:04X} #{:>3}", self.operations.len());
        assert_eq!(self.busy_remaining, 0, "write while busy");

        let failing = self.commands() >= self.fail_after_operation;
        self.operations.push(Operation::Write { address, value });
        self.busy_remaining = self.busy_cycles;

        if self.locked {
            self.flags.write_protection = true;
            return;
        }
        if failing {
            println!("    flash: FAULT");
            self.flags.programming = true;
            return;
        }

        let index = Self::index(address);
        if self.words[index] != 0xFFFF && value != 0 {
            self.flags.programming = true;
            return;
        }

        let value = match self.corrupt_write_at {
            Some(at) if at == address => value ^ 1,
            _ => value,
        };
        // flash can only flip bits from 1 to 0
        self.words[index] &= value;
    }

    fn read_word(&mut self, address: u32) -> Result<u16, ReadFault> {
        if self.fail_reads {
            return Err(ReadFault);
        }
        Ok(self.word(address))
    }

    fn erase_page(&mut self, page_address: u32) {
        println!("    flash: erase: 0x{page_address:08X} #{:>3}", self.operations.len());
        assert_eq!(page_address, PAGE_ADDRESS);
        assert_eq!(self.busy_remaining, 0, "erase while busy");

        let failing = self.commands() >= self.fail_after_operation;
        self.operations.push(Operation::Erase {
            address: page_address,
        });
        self.busy_remaining = self.busy_cycles;

        if self.locked {
            self.flags.write_protection = true;
            return;
        }
        if failing {
            println!("    flash: FAULT");
            self.flags.programming = true;
            return;
        }

        self.words.fill(0xFFFF);
        if let Some(address) = self.stuck_after_erase {
            self.poke(address, 0);
        }
    }

    fn busy(&mut self) -> bool {
        self.busy_polls += 1;
        if self.busy_remaining > 0 {
            self.busy_remaining -= 1;
            true
        } else {
            false
        }
    }

    fn error_flags(&mut self) -> ErrorFlags {
        self.flags
    }

    fn clear_error_flags(&mut self) {
        self.flags = ErrorFlags::NONE;
    }
}

pub const NOR_ERASE_SIZE: usize = 1024;
pub const NOR_READ_SIZE: usize = 4;
pub const NOR_WRITE_SIZE: usize = 2;

/// A plain `embedded-storage` NOR flash with offsets starting at zero, erased in sectors of
/// `SECTOR` bytes.
pub struct NorFlashMock<const SECTOR: usize = NOR_ERASE_SIZE> {
    pub buf: Vec<u8>,
    pub erased: Vec<(u32, u32)>,
    pub fail_writes: bool,
}

impl NorFlashMock {
    pub fn new(pages: usize) -> Self {
        Self::with_sectors(pages)
    }
}

impl<const SECTOR: usize> NorFlashMock<SECTOR> {
    pub fn with_sectors(sectors: usize) -> Self {
        Self {
            buf: vec![0xffu8; SECTOR * sectors],
            erased: vec![],
            fail_writes: false,
        }
    }
}

#[derive(Debug)]
pub struct FlashError;

impl NorFlashError for FlashError {
    fn kind(&self) -> NorFlashErrorKind {
        NorFlashErrorKind::Other
    }
}

impl<const SECTOR: usize> ErrorType for NorFlashMock<SECTOR> {
    type Error = FlashError;
}

impl<const SECTOR: usize> ReadNorFlash for NorFlashMock<SECTOR> {
    const READ_SIZE: usize = NOR_READ_SIZE;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        assert!(offset.is_multiple_of(Self::READ_SIZE as _));
        assert!(bytes.len().is_multiple_of(Self::READ_SIZE));

        let offset = offset as usize;
        bytes.copy_from_slice(&self.buf[offset..offset + bytes.len()]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.buf.len()
    }
}

impl<const SECTOR: usize> NorFlash for NorFlashMock<SECTOR> {
    const WRITE_SIZE: usize = NOR_WRITE_SIZE;

    const ERASE_SIZE: usize = SECTOR;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        assert!(from.is_multiple_of(Self::ERASE_SIZE as _));
        assert!(to.is_multiple_of(Self::ERASE_SIZE as _));

        self.erased.push((from, to));
        for addr in from..to {
            self.buf[addr as usize] = 0xff;
        }
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        assert!(offset.is_multiple_of(Self::WRITE_SIZE as _));
        assert!(bytes.len().is_multiple_of(Self::WRITE_SIZE));

        if self.fail_writes {
            return Err(FlashError);
        }

        let offset = offset as usize;
        for (i, &val) in bytes.iter().enumerate() {
            self.buf[offset + i] &= val;
        }
        Ok(())
    }
}
