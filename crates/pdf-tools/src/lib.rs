//! PDF tool adapter
//!
//! Thin operations over lopdf used by the utility server:
//! - `merge_documents`: concatenate several PDFs
//! - `split_by_ranges` / `extract_pages`: carve documents into parts
//! - `rotate_pages`: adjust page `/Rotate`
//! - `compress_document`: stream compression, pruning and image re-encoding
//! - `stamp_signature`: draw a signature image onto a page
//!
//! `PdfCommand` bundles these behind a single operation selector.

pub mod command;
pub mod compress;
pub mod coords;
pub mod error;
pub mod merge;
pub mod rotate;
pub mod sign;
pub mod split;

#[cfg(test)]
pub(crate) mod test_support;

pub use command::{PdfArtifact, PdfCommand, ProcessMetrics, ProcessResult};
pub use compress::{compress_document, CompressionLevel, CompressionOutcome};
pub use coords::{dom_to_pdf, CoordinateOrigin};
pub use error::PdfToolError;
pub use merge::merge_documents;
pub use rotate::{normalize_rotation, rotate_pages};
pub use sign::{stamp_signature, SignaturePlacement};
pub use split::{extract_pages, split_by_ranges};

use lopdf::Document;

/// Parse PDF bytes into a document, mapping lopdf failures to `ParseError`
pub fn load_document(bytes: &[u8]) -> Result<Document, PdfToolError> {
    let doc =
        Document::load_mem(bytes).map_err(|e| PdfToolError::ParseError(e.to_string()))?;
    if doc.trailer.get(b"Encrypt").is_ok() {
        return Err(PdfToolError::ParseError(
            "Encrypted PDFs are not supported".into(),
        ));
    }
    Ok(doc)
}

/// Serialize a document back into bytes
pub fn save_document(doc: &mut Document) -> Result<Vec<u8>, PdfToolError> {
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| PdfToolError::OperationError(format!("Save failed: {}", e)))?;
    Ok(buffer)
}

/// Parse PDF bytes and return page count
pub fn get_page_count(bytes: &[u8]) -> Result<u32, PdfToolError> {
    let doc = load_document(bytes)?;
    Ok(doc.get_pages().len() as u32)
}

/// Parse page range string like "1-3, 5, 8-10" into sorted, merged spans
///
/// Overlapping and adjacent spans are joined, so "1-3, 2-4, 5" becomes
/// `[(1, 5)]`. Spans are never expanded into individual pages here.
pub fn parse_ranges(input: &str) -> Result<Vec<(u32, u32)>, PdfToolError> {
    let mut spans: Vec<(u32, u32)> = input
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(parse_span)
        .collect::<Result<_, _>>()?;
    spans.sort_unstable();

    let mut merged: Vec<(u32, u32)> = Vec::with_capacity(spans.len());
    for (start, end) in spans {
        match merged.last_mut() {
            Some(last) if start <= last.1.saturating_add(1) => last.1 = last.1.max(end),
            _ => merged.push((start, end)),
        }
    }

    Ok(merged)
}

/// Parse split groups like "1-3; 4-6" (also newline separated) into `(start, end)` pairs
///
/// Order is preserved; a bare number `n` becomes `(n, n)`.
pub fn parse_range_groups(input: &str) -> Result<Vec<(u32, u32)>, PdfToolError> {
    let groups: Vec<(u32, u32)> = input
        .split(|c: char| c == ';' || c == '\n')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(parse_span)
        .collect::<Result<_, _>>()?;

    if groups.is_empty() {
        return Err(PdfToolError::InvalidRange("No page ranges given".into()));
    }
    Ok(groups)
}

/// Parse a single "a-b" or "a" span
pub fn parse_span(part: &str) -> Result<(u32, u32), PdfToolError> {
    let part = part.trim();
    if let Some((start, end)) = part.split_once('-') {
        let start: u32 = start
            .trim()
            .parse()
            .map_err(|_| PdfToolError::InvalidRange(format!("Invalid start: {}", start)))?;
        let end: u32 = end
            .trim()
            .parse()
            .map_err(|_| PdfToolError::InvalidRange(format!("Invalid end: {}", end)))?;

        if start > end {
            return Err(PdfToolError::InvalidRange(format!(
                "Start {} > end {}",
                start, end
            )));
        }
        Ok((start, end))
    } else {
        let page: u32 = part
            .parse()
            .map_err(|_| PdfToolError::InvalidRange(format!("Invalid page: {}", part)))?;
        Ok((page, page))
    }
}

/// Clamp a 1-based inclusive range into a document of `page_count` pages
///
/// Returns a 0-based half-open range. `start` lands in `[0, n-1]` and `end`
/// is at least `start + 1`, so the result is never empty.
pub(crate) fn clamp_range(start: u32, end: u32, page_count: u32) -> (u32, u32) {
    let last = page_count.saturating_sub(1);
    let start = start.saturating_sub(1).min(last);
    let end = end.min(page_count).max(start + 1);
    (start, end)
}
