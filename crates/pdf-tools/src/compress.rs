//! PDF compression
//!
//! Three levels, each including the previous one:
//! - `Low`: Flate-compress every stream that is still uncompressed
//! - `Medium`: also drop empty streams, prune unreachable objects and renumber
//! - `High`: also re-encode large 8-bit RGB / gray images as JPEG
//!
//! The output is never larger than the input; if nothing helped the original
//! bytes are returned untouched.

use crate::error::PdfToolError;
use crate::{load_document, save_document};
use flate2::read::ZlibDecoder;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, RgbImage};
use lopdf::{Document, Object, ObjectId, Stream};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::str::FromStr;

/// JPEG quality used when re-encoding embedded images
const IMAGE_QUALITY: u8 = 60;

/// Longest side of a re-encoded image, in pixels
const MAX_IMAGE_DIMENSION: u32 = 1600;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl FromStr for CompressionLevel {
    type Err = PdfToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(CompressionLevel::Low),
            "medium" => Ok(CompressionLevel::Medium),
            "high" => Ok(CompressionLevel::High),
            other => Err(PdfToolError::InvalidInput(format!(
                "Unknown compression level '{}' (expected low, medium or high)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompressionOutcome {
    #[serde(skip)]
    pub data: Vec<u8>,
    pub original_size: usize,
    pub compressed_size: usize,
    /// Share of the original size saved, 0.0 to 100.0
    pub percentage: f64,
}

impl CompressionOutcome {
    fn new(data: Vec<u8>, original_size: usize) -> Self {
        let compressed_size = data.len();
        let percentage = if original_size == 0 {
            0.0
        } else {
            (original_size.saturating_sub(compressed_size)) as f64 * 100.0 / original_size as f64
        };
        Self {
            data,
            original_size,
            compressed_size,
            percentage,
        }
    }
}

/// Compress `bytes` at the given level
pub fn compress_document(
    bytes: &[u8],
    level: CompressionLevel,
) -> Result<CompressionOutcome, PdfToolError> {
    let mut doc = load_document(bytes)?;

    if level == CompressionLevel::High {
        recompress_images(&mut doc);
    }

    doc.compress();

    if level != CompressionLevel::Low {
        doc.delete_zero_length_streams();
        doc.prune_objects();
        doc.renumber_objects();
    }

    let output = save_document(&mut doc)?;
    let data = if output.len() < bytes.len() {
        output
    } else {
        bytes.to_vec()
    };

    Ok(CompressionOutcome::new(data, bytes.len()))
}

/// Re-encode every eligible image stream, keeping only re-encodings that shrink it
fn recompress_images(doc: &mut Document) -> usize {
    let image_ids: Vec<ObjectId> = doc
        .objects
        .iter()
        .filter(|(_, object)| matches!(object, Object::Stream(stream) if is_image(stream)))
        .map(|(id, _)| *id)
        .collect();

    let mut replaced = 0;
    for id in image_ids {
        let Some(Object::Stream(stream)) = doc.objects.get_mut(&id) else {
            continue;
        };
        if let Some((jpeg, width, height)) = reencode_image(stream) {
            if jpeg.len() < stream.content.len() {
                stream.dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));
                stream.dict.remove(b"DecodeParms");
                stream.dict.set("Width", Object::Integer(width as i64));
                stream.dict.set("Height", Object::Integer(height as i64));
                stream.set_content(jpeg);
                replaced += 1;
            }
        }
    }
    replaced
}

fn is_image(stream: &Stream) -> bool {
    matches!(stream.dict.get(b"Subtype"), Ok(Object::Name(name)) if name == b"Image")
}

fn name_of<'a>(stream: &'a Stream, key: &[u8]) -> Option<&'a [u8]> {
    match stream.dict.get(key) {
        Ok(Object::Name(name)) => Some(name.as_slice()),
        _ => None,
    }
}

/// Decode a raw or Flate image and return it as JPEG with its new size
///
/// Anything unusual (other filters, predictors, masks, indexed color) is left alone.
fn reencode_image(stream: &Stream) -> Option<(Vec<u8>, u32, u32)> {
    if stream.dict.has(b"DecodeParms") || stream.dict.has(b"Decode") {
        return None;
    }
    if stream.dict.get(b"BitsPerComponent").ok()?.as_i64().ok()? != 8 {
        return None;
    }

    let width = u32::try_from(stream.dict.get(b"Width").ok()?.as_i64().ok()?).ok()?;
    let height = u32::try_from(stream.dict.get(b"Height").ok()?.as_i64().ok()?).ok()?;
    if width == 0 || height == 0 {
        return None;
    }

    let raw = match name_of(stream, b"Filter") {
        None if !stream.dict.has(b"Filter") => stream.content.clone(),
        Some(b"FlateDecode") => {
            let mut decoded = Vec::new();
            ZlibDecoder::new(stream.content.as_slice())
                .read_to_end(&mut decoded)
                .ok()?;
            decoded
        }
        _ => return None,
    };

    let pixels = (width as usize).checked_mul(height as usize)?;
    let image = match name_of(stream, b"ColorSpace")? {
        b"DeviceRGB" => {
            let len = pixels.checked_mul(3)?;
            DynamicImage::ImageRgb8(RgbImage::from_raw(width, height, raw.get(..len)?.to_vec())?)
        }
        b"DeviceGray" => {
            DynamicImage::ImageLuma8(GrayImage::from_raw(width, height, raw.get(..pixels)?.to_vec())?)
        }
        _ => return None,
    };

    let image = if width.max(height) > MAX_IMAGE_DIMENSION {
        image.resize(MAX_IMAGE_DIMENSION, MAX_IMAGE_DIMENSION, FilterType::Lanczos3)
    } else {
        image
    };

    let mut jpeg = Vec::new();
    image
        .write_with_encoder(JpegEncoder::new_with_quality(&mut jpeg, IMAGE_QUALITY))
        .ok()?;

    Some((jpeg, image.width(), image.height()))
}
