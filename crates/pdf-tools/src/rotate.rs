//! Page rotation
//!
//! Rotation is expressed through the page `/Rotate` entry, so page content
//! streams are never touched.

use crate::error::PdfToolError;
use crate::merge::find_inherited;
use crate::{clamp_range, load_document, save_document};
use lopdf::{Document, Object, ObjectId};

/// Rotate pages by `angle` degrees clockwise
///
/// `angle` must be a multiple of 90 (negative values rotate counter-clockwise).
/// `range` is an optional 1-indexed inclusive page span, clamped into the
/// document; without it every page is rotated.
pub fn rotate_pages(
    bytes: &[u8],
    angle: i32,
    range: Option<(u32, u32)>,
) -> Result<Vec<u8>, PdfToolError> {
    if angle % 90 != 0 {
        return Err(PdfToolError::InvalidInput(format!(
            "Rotation must be a multiple of 90 degrees, got {}",
            angle
        )));
    }

    let mut doc = load_document(bytes)?;
    let pages: Vec<ObjectId> = doc.get_pages().values().copied().collect();
    let page_count = pages.len() as u32;
    if page_count == 0 {
        return Err(PdfToolError::InvalidInput("Document has no pages".into()));
    }

    let (start, end) = match range {
        Some((start, end)) => clamp_range(start, end, page_count),
        None => (0, page_count),
    };

    for &page_id in &pages[start as usize..end as usize] {
        let current = page_rotation(&doc, page_id);
        let rotated = normalize_rotation(current + normalize_rotation(angle));

        let page = doc
            .get_object_mut(page_id)
            .and_then(|object| object.as_dict_mut())
            .map_err(|e| PdfToolError::OperationError(format!("Invalid page object: {}", e)))?;
        page.set("Rotate", Object::Integer(rotated as i64));
    }

    save_document(&mut doc)
}

/// Effective rotation of a page, inheriting from the page tree if necessary
pub fn page_rotation(doc: &Document, page_id: ObjectId) -> i32 {
    find_inherited(doc, page_id, b"Rotate")
        .and_then(|rotate| rotate.as_i64().ok())
        .map(|angle| angle.rem_euclid(360) as i32)
        .unwrap_or(0)
}

/// Normalize rotation to 0, 90, 180, or 270
pub fn normalize_rotation(angle: i32) -> i32 {
    angle.rem_euclid(360)
}
