//! API handlers for the utility server
//!
//! Every tool endpoint follows the same path: parse the upload, validate it,
//! run exactly one adapter on the blocking pool, and answer with a download.

use std::io::{Cursor, Write};
use std::time::Instant;

use axum::extract::{rejection::FormRejection, Multipart, State};
use axum::{Form, Json};
use doc_convert::ConversionKind;
use image_tools::{ImageKind, ImageOptions, ProcessedImage};
use pdf_tools::{
    parse_range_groups, parse_ranges, parse_span, CompressionLevel, CoordinateOrigin, PdfCommand,
    ProcessResult, SignaturePlacement,
};
use qr_tools::{ErrorCorrection, QrFormat, QrOptions, DEFAULT_SIZE};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::error::ServerError;
use crate::upload::{Download, FileKind, UploadForm};
use crate::AppState;

const PDF_MIME: &str = "application/pdf";

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Handler: GET /health
pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "utility-server",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Tool metadata
#[derive(Serialize)]
pub struct ToolInfo {
    pub name: &'static str,
    pub method: &'static str,
    pub path: &'static str,
    pub description: &'static str,
    /// Accepted upload extensions; empty for text-only tools
    pub accepts: Vec<String>,
}

/// Tool list response
#[derive(Serialize)]
pub struct ToolListResponse {
    pub success: bool,
    pub tools: Vec<ToolInfo>,
    pub count: usize,
    /// `office` or `library`, as detected for a conversion started now
    pub conversion_strategy: &'static str,
    pub default_quality: u8,
    pub max_upload_bytes: usize,
}

const TOOLS: [(&str, &str, &str, Option<FileKind>); 12] = [
    ("compress_image", "/compress", "Re-encode an image at a lower quality", Some(FileKind::Image)),
    ("convert_image", "/convert", "Convert an image to another format", Some(FileKind::Image)),
    ("qr_code", "/qr", "Generate a QR code as PNG or SVG", None),
    ("compress_pdf", "/pdf/compress", "Shrink a PDF", Some(FileKind::Pdf)),
    ("merge_pdf", "/pdf/merge", "Combine several PDFs into one", Some(FileKind::Pdf)),
    ("split_pdf", "/pdf/split", "Split a PDF into page ranges", Some(FileKind::Pdf)),
    ("extract_pages", "/pdf/extract", "Keep selected pages of a PDF", Some(FileKind::Pdf)),
    ("rotate_pdf", "/pdf/rotate", "Rotate PDF pages", Some(FileKind::Pdf)),
    ("sign_pdf", "/pdf/sign", "Stamp a signature image onto a page", Some(FileKind::Pdf)),
    ("pdf_to_word", "/pdf/to-word", "Convert a PDF to a Word document", Some(FileKind::Pdf)),
    ("word_to_pdf", "/word/to-pdf", "Convert a Word document to PDF", Some(FileKind::Word)),
    ("health", "/health", "Service health", None),
];

/// Handler: GET /api/tools
pub async fn handle_list_tools(State(state): State<AppState>) -> Json<ToolListResponse> {
    let tools: Vec<ToolInfo> = TOOLS
        .iter()
        .map(|&(name, path, description, kind)| ToolInfo {
            name,
            method: if name == "health" { "GET" } else { "POST" },
            path,
            description,
            accepts: kind
                .map(|kind| state.config.extensions(kind).to_vec())
                .unwrap_or_default(),
        })
        .collect();

    let count = tools.len();

    Json(ToolListResponse {
        success: true,
        tools,
        count,
        conversion_strategy: state.converter.strategy().name(),
        default_quality: state.config.default_quality,
        max_upload_bytes: state.config.max_upload_bytes,
    })
}

/// Run a synchronous tool on the blocking pool, logging its duration
async fn run_tool<T, F>(tool: &'static str, job: F) -> Result<T, ServerError>
where
    F: FnOnce() -> Result<T, ServerError> + Send + 'static,
    T: Send + 'static,
{
    let start = Instant::now();
    let result = tokio::task::spawn_blocking(job).await?;
    match &result {
        Ok(_) => info!("{} finished in {:?}", tool, start.elapsed()),
        Err(e) => warn!("{} failed after {:?}: {}", tool, start.elapsed(), e),
    }
    result
}

/// Output name for an image: keep the client name when the format is unchanged
fn image_filename(prefix: &str, filename: &str, processed: &ProcessedImage) -> String {
    let (stem, extension) = match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (filename, None),
    };
    let same_format = extension
        .and_then(|ext| ext.parse::<ImageKind>().ok())
        .is_some_and(|kind| kind == processed.format);

    if same_format {
        format!("{}_{}", prefix, filename)
    } else {
        format!("{}_{}.{}", prefix, stem, processed.format.extension())
    }
}

/// Handler: POST /compress
pub async fn handle_compress_image(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Download, ServerError> {
    let mut form = UploadForm::from_multipart(multipart).await?;
    let upload = form.take_file("image")?;
    upload.validate(FileKind::Image, state.config.extensions(FileKind::Image))?;

    let options = ImageOptions {
        format: form.text("format").map(str::parse::<ImageKind>).transpose()?,
        quality: form.parse("quality")?.unwrap_or(state.config.default_quality),
        max_dimension: form.parse("max_dimension")?,
    };

    let original_size = upload.data.len();
    let data = upload.data;
    let processed =
        run_tool("compress_image", move || Ok(image_tools::process_image(&data, &options)?))
            .await?;

    info!(
        "Image {}x{} {:?}: {} -> {} bytes",
        processed.width,
        processed.height,
        processed.format,
        original_size,
        processed.data.len()
    );

    let filename = image_filename("compressed", &upload.filename, &processed);
    Ok(Download::new(
        filename,
        processed.format.mime_type(),
        processed.data,
        original_size,
    ))
}

/// Handler: POST /convert
pub async fn handle_convert_image(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Download, ServerError> {
    let mut form = UploadForm::from_multipart(multipart).await?;
    let upload = form.take_file("image")?;
    upload.validate(FileKind::Image, state.config.extensions(FileKind::Image))?;

    let format = form
        .text("format")
        .ok_or_else(|| ServerError::InvalidInput("Missing field 'format'".into()))?
        .parse::<ImageKind>()?;
    let quality = form.parse("quality")?.unwrap_or(state.config.default_quality);

    let filename = format!("converted_{}.{}", upload.stem(), format.extension());
    let original_size = upload.data.len();
    let data = upload.data;
    let processed = run_tool("convert_image", move || {
        Ok(image_tools::convert_image(&data, format, quality)?)
    })
    .await?;

    Ok(Download::new(
        filename,
        processed.format.mime_type(),
        processed.data,
        original_size,
    ))
}

/// QR form body
#[derive(Debug, Deserialize)]
pub struct QrRequest {
    #[serde(default)]
    pub data: String,
    pub format: Option<String>,
    pub error_correction: Option<String>,
    pub size: Option<String>,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// Handler: POST /qr
pub async fn handle_generate_qr(
    State(state): State<AppState>,
    form: Result<Form<QrRequest>, FormRejection>,
) -> Result<Download, ServerError> {
    let Form(req) = form.map_err(|e| ServerError::InvalidInput(e.body_text()))?;

    let size = non_blank(req.size.as_deref())
        .map(|size| {
            size.parse::<u32>()
                .map_err(|_| ServerError::InvalidInput(format!("Invalid size '{}'", size)))
        })
        .transpose()?
        .unwrap_or(DEFAULT_SIZE);

    let options = QrOptions {
        format: non_blank(req.format.as_deref())
            .map(str::parse::<QrFormat>)
            .transpose()?
            .unwrap_or(state.config.qr_format),
        error_correction: non_blank(req.error_correction.as_deref())
            .map(str::parse::<ErrorCorrection>)
            .transpose()?
            .unwrap_or_default(),
        size,
    };

    let original_size = req.data.len();
    let data = req.data;
    let qr = run_tool("qr_code", move || Ok(qr_tools::generate_qr(&data, &options)?)).await?;

    Ok(Download::new(
        format!("qr_code.{}", qr.extension()),
        qr.mime_type(),
        qr.data,
        original_size,
    ))
}

/// Execute a PDF command on the blocking pool
async fn run_pdf(command: PdfCommand) -> Result<ProcessResult, ServerError> {
    let result = run_tool(command.name(), move || Ok(command.execute()?)).await?;
    let metrics = &result.metrics;
    info!(
        "PDF {} -> {} bytes, {} pages, {}ms",
        metrics.input_size_bytes,
        metrics.output_size_bytes,
        metrics.page_count,
        metrics.processing_time_ms
    );
    Ok(result)
}

fn single_document(result: ProcessResult) -> Result<Vec<u8>, ServerError> {
    result
        .artifact
        .into_document()
        .ok_or_else(|| ServerError::ProcessingError("Expected a single document".into()))
}

/// Handler: POST /pdf/compress
pub async fn handle_compress_pdf(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Download, ServerError> {
    let mut form = UploadForm::from_multipart(multipart).await?;
    let upload = form.take_file("file")?;
    upload.validate(FileKind::Pdf, state.config.extensions(FileKind::Pdf))?;
    let level: CompressionLevel = form.parse("level")?.unwrap_or_default();

    let filename = format!("compressed_{}", upload.filename);
    let original_size = upload.data.len();
    let result = run_pdf(PdfCommand::Compress {
        file: upload.data,
        level,
    })
    .await?;

    Ok(Download::new(filename, PDF_MIME, single_document(result)?, original_size))
}

/// Handler: POST /pdf/merge
pub async fn handle_merge_pdf(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Download, ServerError> {
    let mut form = UploadForm::from_multipart(multipart).await?;
    let uploads = form.take_files("files");
    if uploads.len() < 2 {
        return Err(ServerError::InvalidInput(
            "Select at least two PDF files to merge".into(),
        ));
    }
    for upload in &uploads {
        upload.validate(FileKind::Pdf, state.config.extensions(FileKind::Pdf))?;
    }

    let original_size = uploads.iter().map(|upload| upload.data.len()).sum();
    let files = uploads.into_iter().map(|upload| upload.data).collect();
    let result = run_pdf(PdfCommand::Merge { files }).await?;

    Ok(Download::new(
        "merged_output.pdf",
        PDF_MIME,
        single_document(result)?,
        original_size,
    ))
}

/// Pack split parts as `split_<n>_<name>` entries
fn zip_parts(parts: &[Vec<u8>], name: &str) -> Result<Vec<u8>, ServerError> {
    let mut buffer = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
        let options = SimpleFileOptions::default();
        for (index, part) in parts.iter().enumerate() {
            zip.start_file(format!("split_{}_{}", index + 1, name), options)?;
            zip.write_all(part)?;
        }
        zip.finish()?;
    }
    Ok(buffer)
}

/// Handler: POST /pdf/split
pub async fn handle_split_pdf(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Download, ServerError> {
    let mut form = UploadForm::from_multipart(multipart).await?;
    let upload = form.take_file("file")?;
    upload.validate(FileKind::Pdf, state.config.extensions(FileKind::Pdf))?;
    let ranges = parse_range_groups(
        form.text("ranges")
            .ok_or_else(|| ServerError::InvalidInput("Missing field 'ranges'".into()))?,
    )?;

    let archive_name = format!("split_{}.zip", upload.stem());
    let name = upload.filename;
    let original_size = upload.data.len();
    let result = run_pdf(PdfCommand::Split {
        file: upload.data,
        ranges,
    })
    .await?;

    let parts = result.artifact.into_parts();
    let archive = run_tool("zip_parts", move || zip_parts(&parts, &name)).await?;

    Ok(Download::new(archive_name, "application/zip", archive, original_size))
}

/// Handler: POST /pdf/extract
pub async fn handle_extract_pages(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Download, ServerError> {
    let mut form = UploadForm::from_multipart(multipart).await?;
    let upload = form.take_file("file")?;
    upload.validate(FileKind::Pdf, state.config.extensions(FileKind::Pdf))?;
    let pages = parse_ranges(
        form.text("pages")
            .ok_or_else(|| ServerError::InvalidInput("Missing field 'pages'".into()))?,
    )?;

    let filename = format!("extracted_{}", upload.filename);
    let original_size = upload.data.len();
    let result = run_pdf(PdfCommand::Extract {
        file: upload.data,
        pages,
    })
    .await?;

    Ok(Download::new(filename, PDF_MIME, single_document(result)?, original_size))
}

/// Handler: POST /pdf/rotate
pub async fn handle_rotate_pdf(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Download, ServerError> {
    let mut form = UploadForm::from_multipart(multipart).await?;
    let upload = form.take_file("file")?;
    upload.validate(FileKind::Pdf, state.config.extensions(FileKind::Pdf))?;
    let angle: i32 = form.require("rotation")?;
    let range = form.text("pages").map(parse_span).transpose()?;

    let filename = format!("rotated_{}", upload.filename);
    let original_size = upload.data.len();
    let result = run_pdf(PdfCommand::Rotate {
        file: upload.data,
        angle,
        range,
    })
    .await?;

    Ok(Download::new(filename, PDF_MIME, single_document(result)?, original_size))
}

/// Read the placement fields of a signing form
fn signature_placement(form: &UploadForm) -> Result<SignaturePlacement, ServerError> {
    let mut placement =
        SignaturePlacement::new(form.require("page")?, form.require("x")?, form.require("y")?);

    if let Some(scale) = form.parse("scale")? {
        placement = placement.with_scale(scale);
    }
    if let Some(width) = form.parse("width")? {
        placement = placement.with_width(width);
    }
    if let Some(rotation) = form.parse("rotation")? {
        placement = placement.with_rotation(rotation);
    }
    if let Some(origin) = form.parse::<CoordinateOrigin>("origin")? {
        placement = placement.with_origin(origin);
    }

    match (
        form.parse::<f64>("viewport_width")?,
        form.parse::<f64>("viewport_height")?,
    ) {
        (Some(width), Some(height)) => placement = placement.with_viewport(width, height),
        (None, None) => {}
        _ => {
            return Err(ServerError::InvalidInput(
                "viewport_width and viewport_height must be given together".into(),
            ))
        }
    }

    Ok(placement)
}

/// Handler: POST /pdf/sign
pub async fn handle_sign_pdf(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Download, ServerError> {
    let mut form = UploadForm::from_multipart(multipart).await?;
    let upload = form.take_file("file")?;
    upload.validate(FileKind::Pdf, state.config.extensions(FileKind::Pdf))?;
    let signature = form.take_file("signature")?;
    signature.validate(FileKind::Image, state.config.extensions(FileKind::Image))?;
    let placement = signature_placement(&form)?;

    let filename = format!("signed_{}", upload.filename);
    let original_size = upload.data.len();
    let result = run_pdf(PdfCommand::Sign {
        file: upload.data,
        signature: signature.data,
        placement,
    })
    .await?;

    Ok(Download::new(filename, PDF_MIME, single_document(result)?, original_size))
}

/// Shared body of the two document conversion endpoints
async fn convert_document(
    state: &AppState,
    multipart: Multipart,
    kind: ConversionKind,
    file_kind: FileKind,
) -> Result<Download, ServerError> {
    let mut form = UploadForm::from_multipart(multipart).await?;
    let upload = form.take_file("file")?;
    upload.validate(file_kind, state.config.extensions(file_kind))?;

    let filename = format!(
        "converted_{}.{}",
        upload.stem(),
        kind.target_extension()
    );
    let original_size = upload.data.len();

    tokio::fs::create_dir_all(&state.config.upload_dir).await?;
    let scratch = tempfile::Builder::new()
        .prefix("convert-")
        .tempdir_in(&state.config.upload_dir)?;

    let start = Instant::now();
    let conversion = state
        .converter
        .convert(kind, upload.data, scratch.path())
        .await?;
    info!(
        "{:?} via {:?} finished in {:?}",
        kind,
        conversion.engine,
        start.elapsed()
    );

    Ok(Download::new(
        filename,
        kind.target_mime_type(),
        conversion.data,
        original_size,
    ))
}

/// Handler: POST /pdf/to-word
pub async fn handle_pdf_to_word(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Download, ServerError> {
    convert_document(&state, multipart, ConversionKind::PdfToWord, FileKind::Pdf).await
}

/// Handler: POST /word/to-pdf
pub async fn handle_word_to_pdf(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Download, ServerError> {
    convert_document(&state, multipart, ConversionKind::WordToPdf, FileKind::Word).await
}
