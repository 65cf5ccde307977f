use crate::raw::{
    HEAT_LIMIT_OFFSET, HEAT_SENSOR_COUNT, LED_COLOR_OFFSET, MODULE_LENGTH, MY_ADDRESS_OFFSET,
    PHYSICAL_LED_OFFSET, RECORD_SIZE, RECORD_WORDS, WHITE_CORRECTION_OFFSET, WORD_SIZE,
};
use core::fmt;
use core::mem::size_of;

/// Address a module has before it has been given one. Never valid.
pub const INVALID_ADDRESS: u16 = 0x00FF;
/// Address all modules listen to. Allowed, but almost certainly a mistake.
pub const BROADCAST_ADDRESS: u16 = 0x00FE;
/// Address of a freshly configured module.
pub const DEFAULT_ADDRESS: u16 = 0x00FD;

/// A packed four channel colour: red in the lowest byte, then green, blue and white.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Color(pub u32);

impl Color {
    pub const RED: Color = Color(LegalColor::Red as u32);
    pub const GREEN: Color = Color(LegalColor::Green as u32);
    pub const BLUE: Color = Color(LegalColor::Blue as u32);
    pub const WHITE: Color = Color(LegalColor::White as u32);

    pub const fn from_channels(red: u8, green: u8, blue: u8, white: u8) -> Self {
        Self(u32::from_le_bytes([red, green, blue, white]))
    }

    /// Returns `[red, green, blue, white]`.
    pub const fn channels(&self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    /// The named colour this value encodes, if it is one of the colours an LED can be fitted with.
    pub fn legal(&self) -> Option<LegalColor> {
        LegalColor::from_repr(self.0)
    }
}

impl fmt::Debug for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.legal() {
            Some(named) => write!(f, "Color({named})"),
            None => write!(f, "Color(0x{:0>8x})", self.0),
        }
    }
}

impl From<LegalColor> for Color {
    fn from(val: LegalColor) -> Self {
        Color(val as u32)
    }
}

/// The colours a physical LED can have.
#[derive(strum::FromRepr, strum::Display, strum::EnumString, Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[strum(serialize_all = "lowercase")]
#[repr(u32)]
pub enum LegalColor {
    Red = 0x0000_00FF,
    Green = 0x0000_FF00,
    Blue = 0x00FF_0000,
    White = 0xFF00_0000,
}

/// Per-module calibration and identity data. One of these is live in the config page at any time.
#[derive(Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConfigRecord {
    /// Brightness correction, indexed by physical LED.
    pub white_correction: [u16; MODULE_LENGTH],
    pub my_address: u16,
    /// Overheat threshold, indexed by heat sensor.
    pub heat_limit: [u16; HEAT_SENSOR_COUNT],
    /// Maps a logical LED index to the physical LED driving it.
    pub physical_led: [u8; MODULE_LENGTH],
    /// Colour of each logical LED.
    pub led_color: [Color; MODULE_LENGTH],
}

impl Default for ConfigRecord {
    /// The factory configuration: full brightness, default address, heat limits disabled, LEDs in
    /// board order and all white.
    fn default() -> Self {
        let mut physical_led = [0u8; MODULE_LENGTH];
        for (i, led) in physical_led.iter_mut().enumerate() {
            *led = i as u8;
        }
        Self::filled(u16::MAX, DEFAULT_ADDRESS, u16::MAX, physical_led, Color::WHITE)
    }
}

impl ConfigRecord {
    /// Creates a record where every channel and every sensor share the same value.
    pub const fn filled(
        white_correction: u16,
        my_address: u16,
        heat_limit: u16,
        physical_led: [u8; MODULE_LENGTH],
        color: Color,
    ) -> Self {
        Self {
            white_correction: [white_correction; MODULE_LENGTH],
            my_address,
            heat_limit: [heat_limit; HEAT_SENSOR_COUNT],
            physical_led,
            led_color: [color; MODULE_LENGTH],
        }
    }

    /// White correction of a logical LED, looked up through the permutation.
    ///
    /// Returns `None` if `led` is out of range or maps to a non-existing physical LED.
    pub fn white_correction_for(&self, led: usize) -> Option<u16> {
        let physical = *self.physical_led.get(led)? as usize;
        self.white_correction.get(physical).copied()
    }

    /// Sets the white correction of a logical LED. Returns `false` if the LED does not exist.
    pub fn set_white_correction(&mut self, led: usize, value: u16) -> bool {
        let Some(&physical) = self.physical_led.get(led) else {
            return false;
        };
        match self.white_correction.get_mut(physical as usize) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Moves the white correction of a logical LED by `delta`. A step that would leave
    /// `0..=0xFFFF` is ignored and the value stays as it was. Returns the resulting value.
    pub fn adjust_white_correction(&mut self, led: usize, delta: i32) -> Option<u16> {
        let current = self.white_correction_for(led)?;
        let Some(adjusted) = (current as i32)
            .checked_add(delta)
            .and_then(|v| u16::try_from(v).ok())
        else {
            return Some(current);
        };
        self.set_white_correction(led, adjusted);
        Some(adjusted)
    }

    /// Serializes the record in its flash layout: fields in declaration order, little endian,
    /// no padding.
    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut buf = [0u8; RECORD_SIZE];

        for (i, value) in self.white_correction.iter().enumerate() {
            let at = WHITE_CORRECTION_OFFSET + i * size_of::<u16>();
            buf[at..at + 2].copy_from_slice(&value.to_le_bytes());
        }

        buf[MY_ADDRESS_OFFSET..MY_ADDRESS_OFFSET + 2].copy_from_slice(&self.my_address.to_le_bytes());

        for (i, value) in self.heat_limit.iter().enumerate() {
            let at = HEAT_LIMIT_OFFSET + i * size_of::<u16>();
            buf[at..at + 2].copy_from_slice(&value.to_le_bytes());
        }

        buf[PHYSICAL_LED_OFFSET..PHYSICAL_LED_OFFSET + MODULE_LENGTH]
            .copy_from_slice(&self.physical_led);

        for (i, color) in self.led_color.iter().enumerate() {
            let at = LED_COLOR_OFFSET + i * size_of::<u32>();
            buf[at..at + 4].copy_from_slice(&color.0.to_le_bytes());
        }

        buf
    }

    pub fn from_bytes(buf: &[u8; RECORD_SIZE]) -> Self {
        let u16_at = |at: usize| u16::from_le_bytes([buf[at], buf[at + 1]]);
        let u32_at = |at: usize| u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]);

        let mut record = Self {
            white_correction: [0; MODULE_LENGTH],
            my_address: u16_at(MY_ADDRESS_OFFSET),
            heat_limit: [0; HEAT_SENSOR_COUNT],
            physical_led: [0; MODULE_LENGTH],
            led_color: [Color(0); MODULE_LENGTH],
        };

        for (i, value) in record.white_correction.iter_mut().enumerate() {
            *value = u16_at(WHITE_CORRECTION_OFFSET + i * size_of::<u16>());
        }
        for (i, value) in record.heat_limit.iter_mut().enumerate() {
            *value = u16_at(HEAT_LIMIT_OFFSET + i * size_of::<u16>());
        }
        record
            .physical_led
            .copy_from_slice(&buf[PHYSICAL_LED_OFFSET..PHYSICAL_LED_OFFSET + MODULE_LENGTH]);
        for (i, color) in record.led_color.iter_mut().enumerate() {
            *color = Color(u32_at(LED_COLOR_OFFSET + i * size_of::<u32>()));
        }

        record
    }

    /// The record as the sequence of flash words it is programmed as.
    pub fn to_words(&self) -> [u16; RECORD_WORDS] {
        let bytes = self.to_bytes();
        let mut words = [0u16; RECORD_WORDS];
        for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(WORD_SIZE)) {
            *word = u16::from_le_bytes([chunk[0], chunk[1]]);
        }
        words
    }

    pub fn from_words(words: &[u16; RECORD_WORDS]) -> Self {
        let mut bytes = [0u8; RECORD_SIZE];
        for (chunk, word) in bytes.chunks_exact_mut(WORD_SIZE).zip(words) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        Self::from_bytes(&bytes)
    }
}
