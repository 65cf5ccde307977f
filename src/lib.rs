#![doc = include_str!("../README.md")]
#![cfg_attr(not(target_arch = "x86_64"), no_std)]

mod boot;
pub mod error;
mod internal;
pub mod platform;
mod raw;
mod record;
mod validate;

pub use boot::{BootMode, Startup};
pub use raw::{
    CONFIG_PAGE_SIZE, ENTRY_COUNT, HEAT_SENSOR_COUNT, MODULE_LENGTH, RECORD_SIZE, RECORD_WORDS,
    SLOT_SIZE, SlotState, SlotStatus, WORD_SIZE,
};
pub use record::{
    BROADCAST_ADDRESS, Color, ConfigRecord, DEFAULT_ADDRESS, INVALID_ADDRESS, LegalColor,
};
pub use validate::{Diagnostics, Silent, Violation, config_valid};
#[cfg(feature = "defmt")]
pub use validate::DefmtDiagnostics;

use crate::error::Error;
use crate::platform::Platform;
use crate::raw::{PageScan, record_offset};
#[cfg(feature = "defmt")]
use defmt::{trace, warn};

/// Slot usage of the config page.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PageStatistics {
    pub free: u8,
    pub in_use: u8,
    pub old: u8,
    pub dirty: u8,
    pub corrupt: u8,
    /// State of every slot, in page order.
    pub slots: [SlotState; ENTRY_COUNT],
}

impl PageStatistics {
    /// A consistent page has at most one slot in use and no status word outside the known
    /// encodings. Dirty slots are the harmless leftovers of an aborted save.
    pub fn is_consistent(&self) -> bool {
        self.in_use <= 1 && self.corrupt == 0
    }
}

/// The ConfigStore owns the config page and keeps the current configuration in memory.
///
/// The page holds [`ENTRY_COUNT`] slots. Every save goes to the next free slot and retires the
/// previous one, the page is only erased once all slots have been used.
pub struct ConfigStore<T: Platform> {
    pub(crate) hal: T,
    pub(crate) page_address: u32,
    pub(crate) current: Option<ConfigRecord>,
}

impl<T: Platform> ConfigStore<T> {
    /// Creates a store for the config page at the absolute flash address `page_address`. The
    /// page is not read until [`ConfigStore::load`] is called.
    pub fn new(page_address: u32, hal: T) -> Result<ConfigStore<T>, Error> {
        if !(page_address as usize).is_multiple_of(CONFIG_PAGE_SIZE) {
            return Err(Error::InvalidPageAddress);
        }

        Ok(Self {
            hal,
            page_address,
            current: None,
        })
    }

    /// Loads the configuration from the slot in use and makes it the current configuration.
    ///
    /// Returns `Ok(None)` if no slot is in use, which is the normal state of a module that has
    /// never been configured.
    pub fn load(&mut self) -> Result<Option<ConfigRecord>, Error> {
        let scan = self.scan()?;

        #[cfg(feature = "debug-logs")]
        println!("ConfigStore: load {scan:?}");

        let Some(slot) = scan.first_in_use() else {
            #[cfg(feature = "defmt")]
            trace!("load: no slot in use");
            return Ok(None);
        };

        if scan.count(SlotState::InUse) > 1 {
            // Left behind by a commit interrupted between marking the new slot and retiring the
            // old one. The next save retires all of them.
            #[cfg(feature = "defmt")]
            warn!(
                "load: {} slots in use, using slot {}",
                scan.count(SlotState::InUse),
                slot
            );
        }

        let record = self.read_record(slot)?;
        self.current = Some(record.clone());
        Ok(Some(record))
    }

    /// Writes `record` to the next free slot and makes it the slot in use. Erases the page first
    /// if all slots have been used.
    ///
    /// If writing fails the previous configuration stays in use.
    pub fn save(&mut self, record: &ConfigRecord) -> Result<(), Error> {
        #[cfg(feature = "debug-logs")]
        println!("ConfigStore: save");

        // A freshly erased page always has a free slot, so the second attempt has to succeed.
        for attempt in 0..2 {
            let scan = self.scan()?;

            #[cfg(feature = "debug-logs")]
            println!("  attempt {attempt}: {scan:?}");

            let Some(target) = scan.first_free() else {
                if attempt == 0 {
                    #[cfg(feature = "defmt")]
                    trace!("save: page full, erasing");
                    self.erase()?;
                }
                continue;
            };

            self.unlock()?;
            let result = self.commit_slot(target, record, &scan);
            self.hal.lock();

            return match result {
                Ok(()) => {
                    self.current = Some(record.clone());
                    Ok(())
                }
                Err(e) => {
                    #[cfg(feature = "defmt")]
                    warn!("save: aborted writing slot {}: {}", target, e);
                    Err(e)
                }
            };
        }

        Err(Error::NoFreeSlot)
    }

    /// Erases the config page and verifies that every word reads back erased. The current
    /// configuration in memory is kept.
    pub fn erase(&mut self) -> Result<(), Error> {
        self.unlock()?;
        let result = self.erase_page();
        self.hal.lock();
        result?;
        self.verify_erased()
    }

    /// Returns detailed statistics about the slot usage of the config page.
    pub fn statistics(&mut self) -> Result<PageStatistics, Error> {
        let scan = self.scan()?;
        Ok(PageStatistics::from(&scan))
    }

    /// The configuration loaded or saved last, if any.
    pub fn current(&self) -> Option<&ConfigRecord> {
        self.current.as_ref()
    }

    /// The current configuration for editing. Starts from the factory configuration if none has
    /// been loaded. Call [`ConfigStore::commit`] to persist the changes.
    pub fn current_mut(&mut self) -> &mut ConfigRecord {
        self.current.get_or_insert_with(ConfigRecord::default)
    }

    /// Saves the current configuration.
    pub fn commit(&mut self) -> Result<(), Error> {
        let record = self.current_mut().clone();
        self.save(&record)
    }

    /// Validates the current configuration, see [`config_valid`]. A store without a current
    /// configuration is never valid.
    pub fn is_valid<D: Diagnostics + ?Sized>(&self, diagnostics: &mut D) -> bool {
        match &self.current {
            Some(record) => config_valid(record, diagnostics),
            None => false,
        }
    }

    pub fn page_address(&self) -> u32 {
        self.page_address
    }

    /// Absolute flash address of the record in `slot`.
    pub fn record_address(&self, slot: usize) -> u32 {
        self.page_address + record_offset(slot) as u32
    }

    pub fn into_inner(self) -> T {
        self.hal
    }
}

impl From<&PageScan> for PageStatistics {
    fn from(scan: &PageScan) -> Self {
        PageStatistics {
            free: scan.count(SlotState::Free) as u8,
            in_use: scan.count(SlotState::InUse) as u8,
            old: scan.count(SlotState::Old) as u8,
            dirty: scan.count(SlotState::Dirty) as u8,
            corrupt: scan.corrupt() as u8,
            slots: scan.slots,
        }
    }
}
