use crate::compress::{compress_document, CompressionLevel};
use crate::error::PdfToolError;
use crate::merge::merge_documents;
use crate::rotate::rotate_pages;
use crate::sign::{stamp_signature, SignaturePlacement};
use crate::split::{extract_pages, split_by_ranges};
use crate::get_page_count;
use serde::Serialize;
use std::time::Instant;

/// One PDF operation together with its inputs
#[derive(Debug, Clone)]
pub enum PdfCommand {
    Merge {
        files: Vec<Vec<u8>>,
    },
    Split {
        file: Vec<u8>,
        ranges: Vec<(u32, u32)>,
    },
    Extract {
        file: Vec<u8>,
        pages: Vec<(u32, u32)>,
    },
    Rotate {
        file: Vec<u8>,
        angle: i32,
        range: Option<(u32, u32)>,
    },
    Compress {
        file: Vec<u8>,
        level: CompressionLevel,
    },
    Sign {
        file: Vec<u8>,
        signature: Vec<u8>,
        placement: SignaturePlacement,
    },
}

/// What an operation produced
#[derive(Debug, Clone, PartialEq)]
pub enum PdfArtifact {
    Document(Vec<u8>),
    Parts(Vec<Vec<u8>>),
}

impl PdfArtifact {
    pub fn size(&self) -> usize {
        match self {
            PdfArtifact::Document(data) => data.len(),
            PdfArtifact::Parts(parts) => parts.iter().map(Vec::len).sum(),
        }
    }

    pub fn into_document(self) -> Option<Vec<u8>> {
        match self {
            PdfArtifact::Document(data) => Some(data),
            PdfArtifact::Parts(_) => None,
        }
    }

    pub fn into_parts(self) -> Vec<Vec<u8>> {
        match self {
            PdfArtifact::Document(data) => vec![data],
            PdfArtifact::Parts(parts) => parts,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProcessResult {
    pub artifact: PdfArtifact,
    pub metrics: ProcessMetrics,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessMetrics {
    pub input_size_bytes: usize,
    pub output_size_bytes: usize,
    pub page_count: u32,
    pub processing_time_ms: u64,
}

impl PdfCommand {
    pub fn name(&self) -> &'static str {
        match self {
            PdfCommand::Merge { .. } => "merge",
            PdfCommand::Split { .. } => "split",
            PdfCommand::Extract { .. } => "extract",
            PdfCommand::Rotate { .. } => "rotate",
            PdfCommand::Compress { .. } => "compress",
            PdfCommand::Sign { .. } => "sign",
        }
    }

    fn input_size(&self) -> usize {
        match self {
            PdfCommand::Merge { files } => files.iter().map(Vec::len).sum(),
            PdfCommand::Split { file, .. }
            | PdfCommand::Extract { file, .. }
            | PdfCommand::Rotate { file, .. }
            | PdfCommand::Compress { file, .. }
            | PdfCommand::Sign { file, .. } => file.len(),
        }
    }

    /// Run the operation and measure it
    pub fn execute(self) -> Result<ProcessResult, PdfToolError> {
        let start = Instant::now();
        let input_size_bytes = self.input_size();

        let artifact = match self {
            PdfCommand::Merge { files } => PdfArtifact::Document(merge_documents(files)?),
            PdfCommand::Split { file, ranges } => {
                PdfArtifact::Parts(split_by_ranges(&file, &ranges)?)
            }
            PdfCommand::Extract { file, pages } => {
                PdfArtifact::Document(extract_pages(&file, &pages)?)
            }
            PdfCommand::Rotate { file, angle, range } => {
                PdfArtifact::Document(rotate_pages(&file, angle, range)?)
            }
            PdfCommand::Compress { file, level } => {
                PdfArtifact::Document(compress_document(&file, level)?.data)
            }
            PdfCommand::Sign {
                file,
                signature,
                placement,
            } => PdfArtifact::Document(stamp_signature(&file, &signature, &placement)?),
        };

        let page_count = match &artifact {
            PdfArtifact::Document(data) => get_page_count(data)?,
            PdfArtifact::Parts(parts) => parts
                .iter()
                .map(|part| get_page_count(part))
                .sum::<Result<u32, _>>()?,
        };

        Ok(ProcessResult {
            metrics: ProcessMetrics {
                input_size_bytes,
                output_size_bytes: artifact.size(),
                page_count,
                processing_time_ms: start.elapsed().as_millis() as u64,
            },
            artifact,
        })
    }
}
