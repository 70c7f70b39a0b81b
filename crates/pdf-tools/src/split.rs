//! PDF Split and page extraction
//!
//! Extracts pages from a PDF by deleting everything else and pruning the
//! objects that become unreachable.

use crate::error::PdfToolError;
use crate::{clamp_range, load_document, save_document};
use lopdf::Document;
use std::collections::BTreeSet;

/// Extract only the pages covered by `spans` (1-indexed, inclusive) into a new PDF
///
/// Spans are intersected with the document, so page numbers outside it are
/// ignored. If none of the requested pages exist the request is rejected.
pub fn extract_pages(bytes: &[u8], spans: &[(u32, u32)]) -> Result<Vec<u8>, PdfToolError> {
    if spans.is_empty() {
        return Err(PdfToolError::InvalidRange("No pages specified".into()));
    }

    let doc = load_document(bytes)?;
    let page_count = doc.get_pages().len() as u32;

    let keep: BTreeSet<u32> = spans
        .iter()
        .flat_map(|&(start, end)| start.max(1)..=end.min(page_count))
        .collect();

    if keep.is_empty() {
        return Err(PdfToolError::InvalidRange(format!(
            "None of the requested pages exist (document has {} pages)",
            page_count
        )));
    }

    keep_pages(doc, &keep)
}

/// Split a PDF into one document per `(start, end)` range (1-indexed, inclusive)
///
/// Ranges are clamped into the document rather than rejected, so every
/// range yields at least one page.
pub fn split_by_ranges(bytes: &[u8], ranges: &[(u32, u32)]) -> Result<Vec<Vec<u8>>, PdfToolError> {
    if ranges.is_empty() {
        return Err(PdfToolError::InvalidRange("No page ranges specified".into()));
    }

    let doc = load_document(bytes)?;
    let page_count = doc.get_pages().len() as u32;
    if page_count == 0 {
        return Err(PdfToolError::InvalidInput("Document has no pages".into()));
    }

    ranges
        .iter()
        .map(|&(start, end)| {
            let (first, last) = clamp_range(start, end, page_count);
            let keep: BTreeSet<u32> = (first + 1..=last).collect();
            keep_pages(doc.clone(), &keep)
        })
        .collect()
}

/// Delete every page not in `keep`, prune orphans and serialize
fn keep_pages(mut doc: Document, keep: &BTreeSet<u32>) -> Result<Vec<u8>, PdfToolError> {
    let page_count = doc.get_pages().len() as u32;

    let to_delete: Vec<u32> = (1..=page_count).filter(|p| !keep.contains(p)).collect();
    if !to_delete.is_empty() {
        doc.delete_pages(&to_delete);
    }

    doc.prune_objects();
    doc.compress();

    save_document(&mut doc)
}
