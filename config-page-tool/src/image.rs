use vl_config_store::platform::{ErrorFlags, Platform, ReadFault};
use vl_config_store::{CONFIG_PAGE_SIZE, ConfigRecord, ConfigStore, PageStatistics, WORD_SIZE};

use crate::error::Error;

/// A config page held in memory. Programming follows NOR semantics, bits can only be cleared,
/// so the store behaves exactly as it does on a module.
pub(crate) struct MemoryFlash {
    words: Vec<u16>,
    locked: bool,
    flags: ErrorFlags,
}

impl MemoryFlash {
    pub(crate) fn erased() -> Self {
        Self {
            words: vec![u16::MAX; CONFIG_PAGE_SIZE / WORD_SIZE],
            locked: true,
            flags: ErrorFlags::NONE,
        }
    }

    pub(crate) fn from_image(data: &[u8]) -> Result<Self, Error> {
        if data.len() != CONFIG_PAGE_SIZE {
            return Err(Error::InvalidImageSize(data.len(), CONFIG_PAGE_SIZE));
        }

        let words = data
            .chunks_exact(WORD_SIZE)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();

        Ok(Self {
            words,
            ..Self::erased()
        })
    }

    pub(crate) fn into_image(self) -> Vec<u8> {
        self.words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    fn index(&self, address: u32) -> Option<usize> {
        let index = address as usize / WORD_SIZE;
        (address as usize % WORD_SIZE == 0 && index < self.words.len()).then_some(index)
    }
}

impl Platform for MemoryFlash {
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
        match self.index(address) {
            Some(index) if !self.locked => self.words[index] &= value,
            Some(_) => self.flags.write_protection = true,
            None => self.flags.programming = true,
        }
    }

    fn read_word(&mut self, address: u32) -> Result<u16, ReadFault> {
        self.index(address).map(|i| self.words[i]).ok_or(ReadFault)
    }

    fn erase_page(&mut self, _page_address: u32) {
        if self.locked {
            self.flags.write_protection = true;
        } else {
            self.words.fill(u16::MAX);
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

/// Builds the image of a freshly erased config page after saving `record` once.
pub(crate) fn generate_image(record: &ConfigRecord) -> Result<Vec<u8>, Error> {
    let mut flash = MemoryFlash::erased();
    ConfigStore::new(0, &mut flash)?.save(record)?;
    Ok(flash.into_image())
}

/// Loads the record in use from a page image read back from a module.
pub(crate) fn parse_image(data: &[u8]) -> Result<(ConfigRecord, PageStatistics), Error> {
    let mut flash = MemoryFlash::from_image(data)?;
    let mut store = ConfigStore::new(0, &mut flash)?;
    let statistics = store.statistics()?;
    let record = store.load()?.ok_or(Error::NoConfig)?;
    Ok((record, statistics))
}

#[cfg(test)]
mod tests {
    use vl_config_store::{ENTRY_COUNT, SlotState};

    use super::*;

    #[test]
    fn generated_image_uses_first_slot() {
        let image = generate_image(&ConfigRecord::default()).unwrap();
        assert_eq!(image.len(), CONFIG_PAGE_SIZE);
        assert_eq!(image[0..2], [0x55, 0x55]);
        assert!(image[2..ENTRY_COUNT * WORD_SIZE].iter().all(|&b| b == 0xFF));

        let (record, statistics) = parse_image(&image).unwrap();
        assert_eq!(record, ConfigRecord::default());
        assert_eq!(statistics.slots[0], SlotState::InUse);
        assert_eq!(statistics.free as usize, ENTRY_COUNT - 1);
    }

    #[test]
    fn erased_image_has_no_config() {
        let image = MemoryFlash::erased().into_image();
        assert!(matches!(parse_image(&image), Err(Error::NoConfig)));
    }

    #[test]
    fn image_size_is_checked() {
        assert!(matches!(
            parse_image(&[0xFF; 512]),
            Err(Error::InvalidImageSize(512, CONFIG_PAGE_SIZE))
        ));
    }

    #[test]
    fn locked_flash_rejects_writes() {
        let mut flash = MemoryFlash::erased();
        flash.write_word(0, 0);
        assert!(flash.error_flags().write_protection);
        assert_eq!(flash.read_word(0), Ok(u16::MAX));
        assert_eq!(flash.read_word(CONFIG_PAGE_SIZE as u32), Err(ReadFault));
    }
}
