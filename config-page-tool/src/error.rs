use thiserror::Error;

/// Errors that can occur during CSV parsing, image generation, or image parsing.
#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to parse CSV: {0}")]
    CsvError(#[from] csv::Error),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("hex decoding error: {0}")]
    HexError(#[from] hex::FromHexError),

    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("field {0} given more than once")]
    DuplicateField(String),

    #[error("field {field} needs {expected} values, found {found}")]
    InvalidLength {
        field: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("invalid configuration: {}", .0.join(" "))]
    InvalidConfig(Vec<String>),

    #[error("invalid image size {0}: must be {1} bytes")]
    InvalidImageSize(usize, usize),

    #[error("image holds no configuration")]
    NoConfig,

    #[error("config store error: {0}")]
    Store(#[from] vl_config_store::error::Error),
}
