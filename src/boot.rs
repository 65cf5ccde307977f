use crate::error::Error;
use crate::platform::Platform;
use crate::{ConfigRecord, ConfigStore};
#[cfg(feature = "defmt")]
use defmt::{info, warn};

/// How the module was asked to start.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BootMode {
    /// Drive the LEDs with the stored configuration.
    Normal,
    /// Start the configuration console first. Works without a stored configuration.
    Configuration,
}

/// Outcome of [`ConfigStore::startup`].
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Startup {
    /// A configuration was loaded and is the current configuration.
    Configured,
    /// Nothing is stored yet. The factory configuration is current and waits to be edited.
    Unconfigured,
}

impl<T: Platform> ConfigStore<T> {
    /// Loads the configuration at boot and applies the startup policy: a module without a
    /// configuration may only come up in configuration mode.
    pub fn startup(&mut self, mode: BootMode) -> Result<Startup, Error> {
        match (self.load()?, mode) {
            (Some(_), _) => {
                #[cfg(feature = "defmt")]
                info!("startup: configuration loaded");
                Ok(Startup::Configured)
            }
            (None, BootMode::Configuration) => {
                #[cfg(feature = "defmt")]
                info!("startup: no configuration, starting from factory defaults");
                self.current = Some(ConfigRecord::default());
                Ok(Startup::Unconfigured)
            }
            (None, BootMode::Normal) => {
                #[cfg(feature = "defmt")]
                warn!("startup: no configuration found");
                Err(Error::NoConfig)
            }
        }
    }
}
