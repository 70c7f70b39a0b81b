//! Image tool adapter
//!
//! Re-encodes uploaded images, either in their own format (compression) or in
//! a different one (conversion), optionally downscaling them first.

pub mod error;
pub mod format;

pub use error::ImageToolError;
pub use format::ImageKind;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use serde::Serialize;
use std::io::Cursor;
use tracing::debug;

/// How to re-encode an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageOptions {
    /// Target format; `None` keeps the source format
    pub format: Option<ImageKind>,
    /// Encoder quality, 1 to 100 (only JPEG honours it)
    pub quality: u8,
    /// Downscale so that neither side exceeds this many pixels
    pub max_dimension: Option<u32>,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            format: None,
            quality: 30,
            max_dimension: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessedImage {
    #[serde(skip)]
    pub data: Vec<u8>,
    pub format: ImageKind,
    pub width: u32,
    pub height: u32,
    pub original_size: usize,
}

/// Re-encode in the source format at `quality`; never grows the file
pub fn compress_image(
    bytes: &[u8],
    quality: u8,
    max_dimension: Option<u32>,
) -> Result<ProcessedImage, ImageToolError> {
    process_image(
        bytes,
        &ImageOptions {
            format: None,
            quality,
            max_dimension,
        },
    )
}

/// Re-encode into `format`
pub fn convert_image(
    bytes: &[u8],
    format: ImageKind,
    quality: u8,
) -> Result<ProcessedImage, ImageToolError> {
    process_image(
        bytes,
        &ImageOptions {
            format: Some(format),
            quality,
            max_dimension: None,
        },
    )
}

/// Decode, optionally resize, and re-encode `bytes`
pub fn process_image(
    bytes: &[u8],
    options: &ImageOptions,
) -> Result<ProcessedImage, ImageToolError> {
    if !(1..=100).contains(&options.quality) {
        return Err(ImageToolError::InvalidQuality(options.quality));
    }
    if options.max_dimension == Some(0) {
        return Err(ImageToolError::InvalidDimension);
    }

    let source = ImageKind::detect(bytes).ok_or_else(|| {
        ImageToolError::Decode("Unrecognised image format".into())
    })?;
    let original = image::load_from_memory_with_format(bytes, source.image_format())
        .map_err(|e| ImageToolError::Decode(e.to_string()))?;

    let (width, height) = (original.width(), original.height());
    let image = match options.max_dimension {
        Some(max) if width > max || height > max => {
            original.resize(max, max, FilterType::Lanczos3)
        }
        _ => original,
    };

    let target = options.format.unwrap_or(source);
    let data = encode(&image, target, options.quality)?;

    debug!(
        "Re-encoded {:?} -> {:?}: {} -> {} bytes",
        source,
        target,
        bytes.len(),
        data.len()
    );

    if target == source && data.len() > bytes.len() {
        debug!("Re-encoding grew the file, keeping original bytes");
        return Ok(ProcessedImage {
            data: bytes.to_vec(),
            format: source,
            width,
            height,
            original_size: bytes.len(),
        });
    }

    Ok(ProcessedImage {
        data,
        format: target,
        width: image.width(),
        height: image.height(),
        original_size: bytes.len(),
    })
}

/// Encode `image` as `kind`
pub fn encode(image: &DynamicImage, kind: ImageKind, quality: u8) -> Result<Vec<u8>, ImageToolError> {
    let mut buf = Vec::new();
    let result = match kind {
        ImageKind::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8())
            .write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality)),
        ImageKind::Png => image.write_with_encoder(PngEncoder::new_with_quality(
            &mut buf,
            CompressionType::Best,
            PngFilter::Adaptive,
        )),
        ImageKind::WebP => DynamicImage::ImageRgba8(image.to_rgba8())
            .write_with_encoder(WebPEncoder::new_lossless(&mut buf)),
        ImageKind::Gif => DynamicImage::ImageRgba8(image.to_rgba8())
            .write_to(&mut Cursor::new(&mut buf), kind.image_format()),
        ImageKind::Bmp | ImageKind::Tiff => {
            let flattened = if image.color().has_alpha() {
                DynamicImage::ImageRgba8(image.to_rgba8())
            } else {
                DynamicImage::ImageRgb8(image.to_rgb8())
            };
            flattened.write_to(&mut Cursor::new(&mut buf), kind.image_format())
        }
    };

    result.map_err(|e| ImageToolError::Encode(e.to_string()))?;
    Ok(buf)
}
