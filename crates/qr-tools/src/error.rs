use thiserror::Error;

#[derive(Error, Debug)]
pub enum QrToolError {
    #[error("Nothing to encode")]
    EmptyInput,

    #[error("Data is too long for a QR code ({0} bytes)")]
    TooLong(usize),

    #[error("Unknown QR option: {0}")]
    InvalidOption(String),

    #[error("QR encoding failed: {0}")]
    Encode(String),
}
