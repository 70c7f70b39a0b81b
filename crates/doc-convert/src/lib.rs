//! PDF <-> DOCX conversion
//!
//! Each conversion first decides on a [`ConversionStrategy`]: a headless
//! office suite when one is installed, otherwise the pure-Rust converters in
//! [`library`]. An office failure is logged and the library path is used
//! instead.

pub mod error;
pub mod library;
pub mod model;
pub mod office;
pub mod strategy;

pub use error::ConvertError;
pub use strategy::{ConversionStrategy, OfficeConfig, OfficeSuite};

use serde::Serialize;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionKind {
    PdfToWord,
    WordToPdf,
}

impl ConversionKind {
    pub fn source_extension(self) -> &'static str {
        match self {
            ConversionKind::PdfToWord => "pdf",
            ConversionKind::WordToPdf => "docx",
        }
    }

    pub fn target_extension(self) -> &'static str {
        match self {
            ConversionKind::PdfToWord => "docx",
            ConversionKind::WordToPdf => "pdf",
        }
    }

    pub fn target_mime_type(self) -> &'static str {
        match self {
            ConversionKind::PdfToWord => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            ConversionKind::WordToPdf => "application/pdf",
        }
    }

    /// Argument for the office suite's `--convert-to`
    fn office_filter(self) -> &'static str {
        match self {
            ConversionKind::PdfToWord => "docx:MS Word 2007 XML",
            ConversionKind::WordToPdf => "pdf",
        }
    }

    /// Reject inputs that are not the expected document type
    fn check_input(self, input: &[u8]) -> Result<(), ConvertError> {
        match self {
            ConversionKind::PdfToWord => library::pdf_text::load_pdf(input).map(|_| ()),
            ConversionKind::WordToPdf => {
                if library::docx_reader::is_docx(input) {
                    Ok(())
                } else {
                    Err(ConvertError::Unsupported("Not a DOCX document".into()))
                }
            }
        }
    }

    fn run_library(self, input: &[u8]) -> Result<Vec<u8>, ConvertError> {
        match self {
            ConversionKind::PdfToWord => library::pdf_to_docx(input),
            ConversionKind::WordToPdf => library::docx_to_pdf(input),
        }
    }
}

/// Which engine produced a conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Engine {
    Office,
    Library,
}

#[derive(Debug, Clone)]
pub struct Conversion {
    pub data: Vec<u8>,
    pub engine: Engine,
}

#[derive(Debug, Clone, Default)]
pub struct Converter {
    config: OfficeConfig,
}

impl Converter {
    pub fn new(config: OfficeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OfficeConfig {
        &self.config
    }

    /// Detect the strategy a conversion started now would use
    pub fn strategy(&self) -> ConversionStrategy {
        ConversionStrategy::detect(&self.config)
    }

    /// Convert `input`, using `scratch` for any intermediate files
    pub async fn convert(
        &self,
        kind: ConversionKind,
        input: Vec<u8>,
        scratch: &Path,
    ) -> Result<Conversion, ConvertError> {
        let input = run_blocking(move || kind.check_input(&input).map(|()| input)).await?;

        let start = Instant::now();
        if let ConversionStrategy::Office(suite) = self.strategy() {
            match office::convert_with_office(&suite, kind, &input, scratch, self.config.timeout)
                .await
            {
                Ok(data) => {
                    info!(
                        "{:?} via {} in {:?}",
                        kind,
                        suite.binary.display(),
                        start.elapsed()
                    );
                    return Ok(Conversion {
                        data,
                        engine: Engine::Office,
                    });
                }
                Err(e) => warn!("Office conversion failed, using library fallback: {}", e),
            }
        }

        let data = run_blocking(move || kind.run_library(&input)).await?;
        info!("{:?} via library in {:?}", kind, start.elapsed());

        Ok(Conversion {
            data,
            engine: Engine::Library,
        })
    }
}

/// Run parsing or conversion work on the blocking pool
async fn run_blocking<T, F>(task: F) -> Result<T, ConvertError>
where
    F: FnOnce() -> Result<T, ConvertError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| ConvertError::Processing(format!("Conversion task failed: {}", e)))?
}
