use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImageToolError {
    #[error("Could not decode image: {0}")]
    Decode(String),

    #[error("Unknown image format: {0}")]
    UnknownFormat(String),

    #[error("Quality must be between 1 and 100, got {0}")]
    InvalidQuality(u8),

    #[error("Maximum dimension must be at least 1 pixel")]
    InvalidDimension,

    #[error("Failed to encode image: {0}")]
    Encode(String),
}
