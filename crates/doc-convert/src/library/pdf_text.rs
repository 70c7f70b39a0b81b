//! Text recovery from PDF pages

use crate::error::ConvertError;
use crate::model::{Block, Paragraph};
use lopdf::Document;
use tracing::debug;

/// Load a PDF for conversion, rejecting unreadable and encrypted files
pub fn load_pdf(bytes: &[u8]) -> Result<Document, ConvertError> {
    let doc = Document::load_mem(bytes)
        .map_err(|e| ConvertError::Unsupported(format!("Not a readable PDF: {}", e)))?;
    if doc.trailer.get(b"Encrypt").is_ok() {
        return Err(ConvertError::Unsupported(
            "Encrypted PDFs are not supported".into(),
        ));
    }
    Ok(doc)
}

/// Extract each page's text as paragraphs, with a page break between pages
pub fn read_pdf(bytes: &[u8]) -> Result<Vec<Block>, ConvertError> {
    let doc = load_pdf(bytes)?;
    let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();

    let mut blocks = Vec::new();
    for (index, page_number) in page_numbers.iter().enumerate() {
        if index > 0 {
            blocks.push(Block::PageBreak);
        }
        let text = match doc.extract_text(&[*page_number]) {
            Ok(text) => text,
            Err(e) => {
                debug!("No text recovered from page {}: {}", page_number, e);
                continue;
            }
        };
        blocks.extend(paragraphs(&text).into_iter().map(Block::Paragraph));
    }

    Ok(blocks)
}

/// Group lines into paragraphs; blank lines separate paragraphs
pub(crate) fn paragraphs(text: &str) -> Vec<Paragraph> {
    let mut result = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            if !current.is_empty() {
                result.push(Paragraph::new(current.join(" ")));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        result.push(Paragraph::new(current.join(" ")));
    }

    result
}
