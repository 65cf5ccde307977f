use core::fmt::{Debug, Formatter};
use core::mem::size_of;

/// Number of LED channels on one module.
pub const MODULE_LENGTH: usize = 16;
/// Number of heat sensors on one module.
pub const HEAT_SENSOR_COUNT: usize = 4;

/// Size of the flash page reserved for the configuration. The page is erased as a whole.
pub const CONFIG_PAGE_SIZE: usize = 1024;
/// The flash controller programs half-words.
pub const WORD_SIZE: usize = size_of::<u16>();

pub(crate) const WHITE_CORRECTION_OFFSET: usize = 0;
pub(crate) const MY_ADDRESS_OFFSET: usize =
    WHITE_CORRECTION_OFFSET + MODULE_LENGTH * size_of::<u16>();
pub(crate) const HEAT_LIMIT_OFFSET: usize = MY_ADDRESS_OFFSET + size_of::<u16>();
pub(crate) const PHYSICAL_LED_OFFSET: usize = HEAT_LIMIT_OFFSET + HEAT_SENSOR_COUNT * size_of::<u16>();
pub(crate) const LED_COLOR_OFFSET: usize = PHYSICAL_LED_OFFSET + MODULE_LENGTH * size_of::<u8>();

/// Serialized size of one [`crate::ConfigRecord`] in bytes.
pub const RECORD_SIZE: usize = LED_COLOR_OFFSET + MODULE_LENGTH * size_of::<u32>();
/// Serialized size of one [`crate::ConfigRecord`] in flash words.
pub const RECORD_WORDS: usize = RECORD_SIZE / WORD_SIZE;
/// A slot is one status word plus one record.
pub const SLOT_SIZE: usize = RECORD_SIZE + WORD_SIZE;
/// Number of slots that fit into the configuration page.
pub const ENTRY_COUNT: usize = CONFIG_PAGE_SIZE / SLOT_SIZE;

pub(crate) const PAGE_WORDS: usize = CONFIG_PAGE_SIZE / WORD_SIZE;
pub(crate) const ERASED_WORD: u16 = u16::MAX;

// The record is written word by word, a trailing half word would be lost.
const _: () = assert!(
    RECORD_SIZE.is_multiple_of(WORD_SIZE),
    "the config record must be a whole number of flash words"
);

const _: () = assert!(
    ENTRY_COUNT * SLOT_SIZE <= CONFIG_PAGE_SIZE,
    "the slot table must fit into the config page"
);

// With a single slot there is nowhere to write the next record before retiring the current one.
const _: () = assert!(ENTRY_COUNT >= 2, "the config page must hold at least two slots");

const _: () = assert!(
    CONFIG_PAGE_SIZE.is_multiple_of(WORD_SIZE),
    "the config page must be a whole number of flash words"
);

/// The status word in front of every slot. The encodings follow the erased (all ones) and
/// programmed states of the flash, every transition only clears bits.
#[derive(strum::FromRepr, strum::Display, Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum SlotStatus {
    // Default state after a page erase.
    Free = 0xFFFF,

    // The slot holding the authoritative record.
    InUse = 0x5555,

    // Superseded by a later slot, reclaimed by the next page erase.
    Old = 0x0000,
}

/// Byte offset of the status word of `slot`, relative to the page start.
///
/// The page starts with all status words, the records follow back to back.
#[inline(always)]
pub(crate) const fn status_offset(slot: usize) -> usize {
    slot * WORD_SIZE
}

/// Byte offset of the record of `slot`, relative to the page start.
#[inline(always)]
pub(crate) const fn record_offset(slot: usize) -> usize {
    ENTRY_COUNT * WORD_SIZE + slot * RECORD_SIZE
}

/// The state a slot was found in while scanning the page.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlotState {
    /// Status and payload are erased, the slot can take the next record.
    Free,
    /// The status says free but the payload has been programmed partially, usually by an
    /// aborted save. Reusable only after the next erase.
    Dirty,
    InUse,
    Old,
    /// The status word holds none of the known encodings.
    Corrupt(u16),
}

impl From<SlotStatus> for SlotState {
    fn from(val: SlotStatus) -> Self {
        match val {
            SlotStatus::Free => SlotState::Free,
            SlotStatus::InUse => SlotState::InUse,
            SlotStatus::Old => SlotState::Old,
        }
    }
}

/// Result of one pass over the status words.
#[derive(Clone, PartialEq)]
pub(crate) struct PageScan {
    pub(crate) slots: [SlotState; ENTRY_COUNT],
}

impl PageScan {
    /// The first slot in use. More than one only after an interrupted commit or corruption.
    pub(crate) fn first_in_use(&self) -> Option<usize> {
        self.slots.iter().position(|&s| s == SlotState::InUse)
    }

    pub(crate) fn in_use(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == SlotState::InUse)
            .map(|(i, _)| i)
    }

    pub(crate) fn first_free(&self) -> Option<usize> {
        self.slots.iter().position(|&s| s == SlotState::Free)
    }

    pub(crate) fn count(&self, state: SlotState) -> usize {
        self.slots.iter().filter(|&&s| s == state).count()
    }

    pub(crate) fn corrupt(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s, SlotState::Corrupt(_)))
            .count()
    }
}

impl Debug for PageScan {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_str("PageScan [")?;
        for (i, state) in self.slots.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match state {
                SlotState::Free => f.write_str("free")?,
                SlotState::Dirty => f.write_str("dirty")?,
                SlotState::InUse => f.write_str("in use")?,
                SlotState::Old => f.write_str("old")?,
                SlotState::Corrupt(raw) => f.write_fmt(format_args!("corrupt(0x{raw:0>4x})"))?,
            }
        }
        f.write_str("]")
    }
}
