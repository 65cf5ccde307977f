//! Host side generator and parser for LED module config pages.
//!
//! A module's configuration is described as a `field,value` CSV file. The tool turns it into the
//! exact page image the firmware would leave in flash after its first save, and reads such
//! images back into CSV.

pub mod error;

mod csv;
mod image;

use std::fs;
use std::io::Write;
use std::path::Path;

pub use error::Error;
pub use vl_config_store::{CONFIG_PAGE_SIZE, ConfigRecord, PageStatistics};

/// The configuration destined for one module's config page.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigPage {
    pub record: ConfigRecord,
}

impl ConfigPage {
    pub fn new(record: ConfigRecord) -> Self {
        Self { record }
    }

    /// Parse config CSV content from a string.
    ///
    /// Fields missing from the CSV keep their factory default.
    pub fn from_csv(content: &str) -> Result<Self, Error> {
        csv::parser::parse_csv(content)
    }

    /// Parse a config CSV file at the given `path`.
    pub fn from_csv_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let content = fs::read_to_string(path)?;
        csv::parser::parse_csv(&content)
    }

    /// Serialize this configuration to CSV and return the content as a `String`.
    pub fn to_csv(&self) -> Result<String, Error> {
        csv::writer::write_csv_content(self)
    }

    /// Serialize this configuration to a CSV file at the given `path`.
    ///
    /// Every field is written, in record order. Colours an LED can be fitted with are written
    /// by name, anything else as eight hex digits.
    pub fn to_csv_file<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        csv::writer::write_csv(self, path)
    }

    /// Run the firmware's validity check on this configuration.
    ///
    /// Returns the warnings of a valid configuration. An invalid one is rejected with every
    /// diagnostic line, warnings included.
    pub fn validate(&self) -> Result<Vec<String>, Error> {
        let mut lines = vec![];
        let valid = vl_config_store::config_valid(&self.record, &mut |line: &str| {
            lines.push(line.to_string())
        });

        if valid {
            Ok(lines)
        } else {
            Err(Error::InvalidConfig(lines))
        }
    }

    /// Generate a config page image in memory.
    ///
    /// The image is [`CONFIG_PAGE_SIZE`] bytes long and holds the record in the first slot.
    pub fn generate_image(&self) -> Result<Vec<u8>, Error> {
        image::generate_image(&self.record)
    }

    /// Generate a config page image and write it to `path`.
    pub fn generate_image_file<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let data = self.generate_image()?;
        fs::File::create(path)?.write_all(&data)?;
        Ok(())
    }

    /// Parse a config page image from an in-memory byte slice.
    ///
    /// Returns the configuration in use together with the slot usage of the page.
    pub fn parse_image(data: &[u8]) -> Result<(Self, PageStatistics), Error> {
        let (record, statistics) = image::parse_image(data)?;
        Ok((Self { record }, statistics))
    }

    /// Parse a config page image file at the given `path`.
    pub fn parse_image_file<P: AsRef<Path>>(path: P) -> Result<(Self, PageStatistics), Error> {
        let data = fs::read(path)?;
        Self::parse_image(&data)
    }
}
