//! Command-line and environment configuration

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use doc_convert::OfficeConfig;
use qr_tools::QrFormat;

use crate::upload::FileKind;

/// Command-line arguments; every flag can also come from the environment or `.env`
#[derive(Parser, Debug, Clone)]
#[command(name = "utility-server")]
#[command(about = "File utility server: images, QR codes, PDFs and Word documents")]
pub struct Args {
    /// Host address to bind to
    #[arg(long, env = "UTILITY_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "3000")]
    pub port: u16,

    /// Directory for per-request scratch space
    #[arg(long, env = "UPLOAD_FOLDER", default_value = "static/uploads")]
    pub upload_dir: PathBuf,

    /// Accepted image extensions
    #[arg(
        long,
        env = "IMAGE_EXTENSIONS",
        value_delimiter = ',',
        default_value = "png,jpg,jpeg,webp,gif,bmp,tif,tiff"
    )]
    pub image_extensions: Vec<String>,

    /// Accepted PDF extensions
    #[arg(long, env = "PDF_EXTENSIONS", value_delimiter = ',', default_value = "pdf")]
    pub pdf_extensions: Vec<String>,

    /// Accepted Word extensions
    #[arg(long, env = "WORD_EXTENSIONS", value_delimiter = ',', default_value = "docx")]
    pub word_extensions: Vec<String>,

    /// Image quality used when a request gives none
    #[arg(
        long,
        env = "DEFAULT_QUALITY",
        default_value = "30",
        value_parser = clap::value_parser!(u8).range(1..=100)
    )]
    pub default_quality: u8,

    /// QR output format used when a request gives none (png or svg)
    #[arg(long, env = "QR_FORMAT", default_value = "png")]
    pub qr_format: String,

    /// Request body limit in megabytes
    #[arg(long, env = "MAX_UPLOAD_MB", default_value = "20")]
    pub max_upload_mb: usize,

    /// Office suite executable (otherwise soffice/libreoffice is searched on PATH)
    #[arg(long, env = "OFFICE_BINARY")]
    pub office_binary: Option<PathBuf>,

    /// Never use an office suite for document conversion
    #[arg(long, env = "NO_OFFICE")]
    pub no_office: bool,

    /// Seconds before an office conversion is abandoned
    #[arg(long, env = "OFFICE_TIMEOUT_SECS", default_value = "120")]
    pub office_timeout_secs: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Settings shared by all handlers
#[derive(Debug, Clone)]
pub struct Config {
    pub upload_dir: PathBuf,
    pub image_extensions: Vec<String>,
    pub pdf_extensions: Vec<String>,
    pub word_extensions: Vec<String>,
    pub default_quality: u8,
    pub qr_format: QrFormat,
    pub max_upload_bytes: usize,
    pub office: OfficeConfig,
}

impl Config {
    pub fn from_args(args: &Args) -> anyhow::Result<Self> {
        let qr_format = args
            .qr_format
            .parse::<QrFormat>()
            .with_context(|| format!("Invalid QR_FORMAT '{}'", args.qr_format))?;

        if args.max_upload_mb == 0 {
            anyhow::bail!("MAX_UPLOAD_MB must be at least 1");
        }

        Ok(Self {
            upload_dir: args.upload_dir.clone(),
            image_extensions: normalize_extensions(&args.image_extensions),
            pdf_extensions: normalize_extensions(&args.pdf_extensions),
            word_extensions: normalize_extensions(&args.word_extensions),
            default_quality: args.default_quality,
            qr_format,
            max_upload_bytes: args.max_upload_mb.saturating_mul(1024 * 1024),
            office: OfficeConfig {
                enabled: !args.no_office,
                binary: args.office_binary.clone(),
                timeout: Duration::from_secs(args.office_timeout_secs),
            },
        })
    }

    /// Allowed extensions for uploads of `kind`
    pub fn extensions(&self, kind: FileKind) -> &[String] {
        match kind {
            FileKind::Image => &self.image_extensions,
            FileKind::Pdf => &self.pdf_extensions,
            FileKind::Word => &self.word_extensions,
        }
    }
}

/// Lowercase, strip dots and whitespace, drop empties and duplicates
fn normalize_extensions(raw: &[String]) -> Vec<String> {
    let mut extensions: Vec<String> = Vec::new();
    for ext in raw {
        let ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
        if !ext.is_empty() && !extensions.contains(&ext) {
            extensions.push(ext);
        }
    }
    extensions
}
