use crate::error::Error;
use crate::error::WriteFailureKind::{Controller, EraseVerify, Mismatch};
use crate::platform::Platform;
use crate::raw::{
    ENTRY_COUNT, ERASED_WORD, PAGE_WORDS, PageScan, RECORD_WORDS, SlotState, SlotStatus,
    WORD_SIZE, record_offset, status_offset,
};
use crate::{ConfigRecord, ConfigStore};
#[cfg(feature = "defmt")]
use defmt::{trace, warn};

impl<T: Platform> ConfigStore<T> {
    /// Reads every status word and classifies the slots. Free slots have their payload checked
    /// as well, a save that failed half way leaves a free status in front of programmed words.
    pub(crate) fn scan(&mut self) -> Result<PageScan, Error> {
        let mut slots = [SlotState::Free; ENTRY_COUNT];

        for (slot, state) in slots.iter_mut().enumerate() {
            let raw = self.read_word(self.page_address + status_offset(slot) as u32)?;
            *state = match SlotStatus::from_repr(raw) {
                Some(SlotStatus::Free) if !self.payload_erased(slot)? => SlotState::Dirty,
                Some(status) => status.into(),
                None => {
                    #[cfg(feature = "defmt")]
                    warn!("scan: slot {} has unknown status {:#x}", slot, raw);
                    SlotState::Corrupt(raw)
                }
            };
        }

        Ok(PageScan { slots })
    }

    fn payload_erased(&mut self, slot: usize) -> Result<bool, Error> {
        let base = self.page_address + record_offset(slot) as u32;
        for word in 0..RECORD_WORDS {
            if self.read_word(base + (word * WORD_SIZE) as u32)? != ERASED_WORD {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub(crate) fn read_record(&mut self, slot: usize) -> Result<ConfigRecord, Error> {
        #[cfg(feature = "defmt")]
        trace!("read_record: slot {}", slot);

        let base = self.page_address + record_offset(slot) as u32;
        let mut words = [0u16; RECORD_WORDS];
        for (i, word) in words.iter_mut().enumerate() {
            *word = self.read_word(base + (i * WORD_SIZE) as u32)?;
        }
        Ok(ConfigRecord::from_words(&words))
    }

    /// Programs `record` into `target`, then hands the in use status over from every slot
    /// currently in use. The flash has to be unlocked.
    ///
    /// The new slot is marked in use before the old ones are retired, an interruption in between
    /// leaves two slots in use rather than none.
    pub(crate) fn commit_slot(
        &mut self,
        target: usize,
        record: &ConfigRecord,
        scan: &PageScan,
    ) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("commit_slot: {}", target);

        #[cfg(feature = "debug-logs")]
        println!("  ConfigStore: commit_slot {target}");

        let base = self.page_address + record_offset(target) as u32;
        for (i, &word) in record.to_words().iter().enumerate() {
            self.write_word_checked(base + (i * WORD_SIZE) as u32, word)?;
        }

        self.write_status(target, SlotStatus::InUse)?;

        for last in scan.in_use() {
            self.write_status(last, SlotStatus::Old)?;
        }

        Ok(())
    }

    fn write_status(&mut self, slot: usize, status: SlotStatus) -> Result<(), Error> {
        #[cfg(feature = "debug-logs")]
        println!("  ConfigStore: slot {slot} -> {status}");

        self.write_word_checked(
            self.page_address + status_offset(slot) as u32,
            status as u16,
        )
    }

    /// Programs one word, waits for the controller and reads the word back.
    pub(crate) fn write_word_checked(&mut self, address: u32, value: u16) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("write_word_checked @{:#x}: {:#x}", address, value);

        self.hal.write_word(address, value);
        self.wait_idle();

        if self.hal.error_flags().any() {
            self.hal.clear_error_flags();
            return Err(Error::WriteFailure {
                address,
                kind: Controller,
            });
        }

        if self.read_word(address)? != value {
            return Err(Error::WriteFailure {
                address,
                kind: Mismatch,
            });
        }

        Ok(())
    }

    /// Starts the page erase and waits for it. The flash has to be unlocked.
    pub(crate) fn erase_page(&mut self) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("erase_page: @{:#x}", self.page_address);

        #[cfg(feature = "debug-logs")]
        println!("  ConfigStore: erase_page {:#010x}", self.page_address);

        self.hal.erase_page(self.page_address);
        self.wait_idle();

        if self.hal.error_flags().any() {
            self.hal.clear_error_flags();
            return Err(Error::WriteFailure {
                address: self.page_address,
                kind: Controller,
            });
        }

        Ok(())
    }

    pub(crate) fn verify_erased(&mut self) -> Result<(), Error> {
        for word in 0..PAGE_WORDS {
            let address = self.page_address + (word * WORD_SIZE) as u32;
            if self.read_word(address)? != ERASED_WORD {
                return Err(Error::WriteFailure {
                    address,
                    kind: EraseVerify,
                });
            }
        }
        Ok(())
    }

    pub(crate) fn unlock(&mut self) -> Result<(), Error> {
        self.hal.unlock();
        if self.hal.locked() {
            return Err(Error::UnlockFailed);
        }
        Ok(())
    }

    // No timeout: a controller that never becomes idle stalls the caller.
    fn wait_idle(&mut self) {
        while self.hal.busy() {}
    }

    fn read_word(&mut self, address: u32) -> Result<u16, Error> {
        self.hal
            .read_word(address)
            .map_err(|_| Error::ReadFailure { address })
    }
}
