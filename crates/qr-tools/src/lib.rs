//! QR tool adapter
//!
//! Encodes text as a QR symbol and renders it as a PNG raster or an SVG
//! document, with the standard four-module quiet zone.

pub mod error;

pub use error::QrToolError;

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, GrayImage, ImageEncoder, Luma};
use qrcode::render::svg;
use qrcode::types::QrError;
use qrcode::{Color, EcLevel, QrCode};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Modules of white border on each side
const QUIET_ZONE: u32 = 4;

pub const DEFAULT_SIZE: u32 = 256;

/// Largest accepted `size`, in pixels
pub const MAX_SIZE: u32 = 4096;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QrFormat {
    #[default]
    Png,
    Svg,
}

impl QrFormat {
    pub fn extension(self) -> &'static str {
        match self {
            QrFormat::Png => "png",
            QrFormat::Svg => "svg",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            QrFormat::Png => "image/png",
            QrFormat::Svg => "image/svg+xml",
        }
    }
}

impl FromStr for QrFormat {
    type Err = QrToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(QrFormat::Png),
            "svg" => Ok(QrFormat::Svg),
            other => Err(QrToolError::InvalidOption(format!("format '{}'", other))),
        }
    }
}

/// Error correction level: roughly 7%, 15%, 25% or 30% of the symbol may be lost
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCorrection {
    L,
    #[default]
    M,
    Q,
    H,
}

impl ErrorCorrection {
    fn level(self) -> EcLevel {
        match self {
            ErrorCorrection::L => EcLevel::L,
            ErrorCorrection::M => EcLevel::M,
            ErrorCorrection::Q => EcLevel::Q,
            ErrorCorrection::H => EcLevel::H,
        }
    }
}

impl FromStr for ErrorCorrection {
    type Err = QrToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "L" | "LOW" => Ok(ErrorCorrection::L),
            "M" | "MEDIUM" => Ok(ErrorCorrection::M),
            "Q" | "QUARTILE" => Ok(ErrorCorrection::Q),
            "H" | "HIGH" => Ok(ErrorCorrection::H),
            other => Err(QrToolError::InvalidOption(format!(
                "error correction '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QrOptions {
    pub format: QrFormat,
    pub error_correction: ErrorCorrection,
    /// Minimum width and height of the output, in pixels
    pub size: u32,
}

impl Default for QrOptions {
    fn default() -> Self {
        Self {
            format: QrFormat::Png,
            error_correction: ErrorCorrection::M,
            size: DEFAULT_SIZE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QrImage {
    pub data: Vec<u8>,
    pub format: QrFormat,
}

impl QrImage {
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    pub fn extension(&self) -> &'static str {
        self.format.extension()
    }
}

/// Encode `data` and render it according to `options`
pub fn generate_qr(data: &str, options: &QrOptions) -> Result<QrImage, QrToolError> {
    if data.trim().is_empty() {
        return Err(QrToolError::EmptyInput);
    }
    if options.size == 0 || options.size > MAX_SIZE {
        return Err(QrToolError::InvalidOption(format!(
            "size {} (expected 1 to {})",
            options.size, MAX_SIZE
        )));
    }

    let code = QrCode::with_error_correction_level(data.as_bytes(), options.error_correction.level())
        .map_err(|e| match e {
            QrError::DataTooLong => QrToolError::TooLong(data.len()),
            other => QrToolError::Encode(other.to_string()),
        })?;

    let bytes = match options.format {
        QrFormat::Png => render_png(&code, options.size)?,
        QrFormat::Svg => render_svg(&code, options.size),
    };

    Ok(QrImage {
        data: bytes,
        format: options.format,
    })
}

/// Rasterise with whole-pixel modules, scaled up until `min_size` is reached
///
/// The side never exceeds [`MAX_SIZE`]; a large symbol at a large size gets
/// the biggest whole-pixel scale that still fits.
fn render_png(code: &QrCode, min_size: u32) -> Result<Vec<u8>, QrToolError> {
    let modules = code.width() as u32;
    let total = modules + 2 * QUIET_ZONE;
    let scale = min_size.div_ceil(total).min(MAX_SIZE / total).max(1);
    let side = total * scale;

    let colors = code.to_colors();
    let image = GrayImage::from_fn(side, side, |x, y| {
        let (mx, my) = (x / scale, y / scale);
        let dark = mx >= QUIET_ZONE
            && my >= QUIET_ZONE
            && mx < QUIET_ZONE + modules
            && my < QUIET_ZONE + modules
            && colors[((my - QUIET_ZONE) * modules + (mx - QUIET_ZONE)) as usize] == Color::Dark;
        if dark {
            Luma([0])
        } else {
            Luma([255])
        }
    });

    let mut buf = Vec::new();
    PngEncoder::new(&mut buf)
        .write_image(image.as_raw(), side, side, ExtendedColorType::L8)
        .map_err(|e| QrToolError::Encode(e.to_string()))?;
    Ok(buf)
}

fn render_svg(code: &QrCode, min_size: u32) -> Vec<u8> {
    code.render::<svg::Color>()
        .min_dimensions(min_size, min_size)
        .quiet_zone(true)
        .build()
        .into_bytes()
}
