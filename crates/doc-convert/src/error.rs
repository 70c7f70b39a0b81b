use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Unsupported document: {0}")]
    Unsupported(String),

    #[error("Conversion failed: {0}")]
    Processing(String),

    #[error("Office suite failed: {0}")]
    Office(String),

    #[error("Office suite timed out after {0} seconds")]
    Timeout(u64),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid DOCX archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Invalid document XML: {0}")]
    Xml(#[from] quick_xml::Error),
}

impl ConvertError {
    /// True when the input itself is at fault rather than the converter
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            ConvertError::Unsupported(_) | ConvertError::Zip(_) | ConvertError::Xml(_)
        )
    }
}
