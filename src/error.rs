use thiserror::Error;

/// Errors that can occur while loading or saving the configuration. Marked as non-exhaustive to
/// allow for future additions. A caller will usually treat every variant except `NoConfig` as
/// fatal, the persistent state can no longer be trusted.
#[derive(Error, Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// The config page has to be aligned to its own size (1k)
    #[error("invalid config page address")]
    InvalidPageAddress,

    /// The flash controller is still locked after writing the unlock keys
    #[error("flash unlock failed")]
    UnlockFailed,

    /// A word did not end up in flash as intended. `address` is the absolute flash address of the
    /// offending word.
    #[error("flash write failed at {address:#010x}: {kind}")]
    WriteFailure { address: u32, kind: WriteFailureKind },

    /// The provided platform could not read the word at `address`
    #[error("flash read failed at {address:#010x}")]
    ReadFailure { address: u32 },

    /// Even a freshly erased page has no free slot. This is a bug in the page accounting, not a
    /// transient condition.
    #[error("no free config slot after erase")]
    NoFreeSlot,

    /// No configuration is stored but the module was started in normal mode.
    #[error("no configuration found")]
    NoConfig,
}

#[derive(strum::Display, Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WriteFailureKind {
    /// The controller flagged a programming or write protection error
    #[strum(to_string = "controller error")]
    Controller,

    /// The word read back differs from the word written
    #[strum(to_string = "read back mismatch")]
    Mismatch,

    /// A word of the page is not erased after a page erase
    #[strum(to_string = "erase verification failed")]
    EraseVerify,
}
