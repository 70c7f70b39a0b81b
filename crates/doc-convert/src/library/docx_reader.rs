//! WordprocessingML reader
//!
//! Walks `word/document.xml` once and produces paragraphs and tables in
//! document order. Run formatting is ignored; paragraph style and
//! justification are kept.

use crate::error::ConvertError;
use crate::model::{Alignment, Block, Paragraph, ParagraphStyle, Table};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use zip::ZipArchive;

const DOCUMENT_PART: &str = "word/document.xml";
const STYLES_PART: &str = "word/styles.xml";

/// Largest uncompressed package part the reader will inflate
const MAX_PART_BYTES: u64 = 32 * 1024 * 1024;

/// Open a DOCX package and read its body
pub fn read_docx(bytes: &[u8]) -> Result<Vec<Block>, ConvertError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ConvertError::Unsupported(format!("Not a DOCX package: {}", e)))?;

    let document = read_part(&mut archive, DOCUMENT_PART, MAX_PART_BYTES)?
        .ok_or_else(|| ConvertError::Unsupported(format!("Missing {}", DOCUMENT_PART)))?;
    let styles = match read_part(&mut archive, STYLES_PART, MAX_PART_BYTES)? {
        Some(xml) => style_names(&xml)?,
        None => HashMap::new(),
    };

    parse_document(&document, &styles)
}

/// Check that `bytes` look like a DOCX package without parsing the body
pub fn is_docx(bytes: &[u8]) -> bool {
    ZipArchive::new(Cursor::new(bytes))
        .map(|archive| archive.file_names().any(|name| name == DOCUMENT_PART))
        .unwrap_or(false)
}

/// Read one part as text, refusing to inflate more than `limit` bytes
///
/// The declared size is checked first; the read itself is capped as well
/// since the central directory can understate it.
fn read_part(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    path: &str,
    limit: u64,
) -> Result<Option<String>, ConvertError> {
    let file = match archive.by_name(path) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let too_large = || ConvertError::Unsupported(format!("{} exceeds {} bytes", path, limit));
    if file.size() > limit {
        return Err(too_large());
    }

    let mut content = String::new();
    file.take(limit + 1).read_to_string(&mut content)?;
    if content.len() as u64 > limit {
        return Err(too_large());
    }
    Ok(Some(content))
}

fn attribute(element: &BytesStart, local: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == local)
        .and_then(|attr| attr.unescape_value().ok().map(|value| value.into_owned()))
}

/// Map style ids to display names from `word/styles.xml`
fn style_names(xml: &str) -> Result<HashMap<String, String>, ConvertError> {
    let mut reader = Reader::from_str(xml);
    let mut names = HashMap::new();
    let mut current_id: Option<String> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"style" => current_id = attribute(&e, b"styleId"),
                b"name" => {
                    if let (Some(id), Some(name)) = (current_id.as_ref(), attribute(&e, b"val")) {
                        names.insert(id.clone(), name);
                    }
                }
                _ => {}
            },
            Event::End(e) if e.local_name().as_ref() == b"style" => current_id = None,
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(names)
}

#[derive(Default)]
struct ParagraphState {
    text: String,
    style: ParagraphStyle,
    alignment: Option<Alignment>,
}

#[derive(Default)]
struct TableState {
    rows: Vec<Vec<String>>,
    row: Vec<String>,
    cell: Vec<String>,
}

/// Parse the body of `word/document.xml`
pub fn parse_document(
    xml: &str,
    styles: &HashMap<String, String>,
) -> Result<Vec<Block>, ConvertError> {
    let mut reader = Reader::from_str(xml);
    let mut blocks = Vec::new();

    let mut paragraph: Option<ParagraphState> = None;
    let mut table: Option<TableState> = None;
    // Nested tables are flattened into the outer cell
    let mut table_depth = 0usize;
    let mut in_text = false;
    // `w:tab` also appears in paragraph properties as a tab stop definition
    let mut in_run = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"tbl" => {
                    table_depth += 1;
                    if table_depth == 1 {
                        table = Some(TableState::default());
                    }
                }
                b"tr" if table_depth == 1 => {
                    if let Some(table) = table.as_mut() {
                        table.row.clear();
                    }
                }
                b"tc" if table_depth == 1 => {
                    if let Some(table) = table.as_mut() {
                        table.cell.clear();
                    }
                }
                b"p" => paragraph = Some(ParagraphState::default()),
                b"r" => in_run = true,
                b"t" => in_text = true,
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"pStyle" => {
                    if let (Some(state), Some(id)) = (paragraph.as_mut(), attribute(&e, b"val")) {
                        let name = styles.get(&id).map(String::as_str).unwrap_or(&id);
                        state.style = match ParagraphStyle::from_style_name(name) {
                            ParagraphStyle::Normal => ParagraphStyle::from_style_name(&id),
                            style => style,
                        };
                    }
                }
                b"jc" => {
                    if let (Some(state), Some(value)) = (paragraph.as_mut(), attribute(&e, b"val")) {
                        state.alignment = Some(Alignment::from_jc(&value));
                    }
                }
                b"tab" if in_run => {
                    if let Some(state) = paragraph.as_mut() {
                        state.text.push('\t');
                    }
                }
                b"br" | b"cr" if in_run => {
                    if let Some(state) = paragraph.as_mut() {
                        state.text.push('\n');
                    }
                }
                // Self-closing paragraph: an empty line
                b"p" if table_depth == 0 => blocks.push(Block::Paragraph(Paragraph::default())),
                _ => {}
            },
            Event::Text(t) if in_text => {
                if let Some(state) = paragraph.as_mut() {
                    state.text.push_str(&t.unescape()?);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"r" => in_run = false,
                b"p" => {
                    let Some(state) = paragraph.take() else {
                        continue;
                    };
                    match table.as_mut() {
                        Some(table) if table_depth > 0 => table.cell.push(state.text),
                        _ => blocks.push(Block::Paragraph(Paragraph {
                            text: state.text,
                            style: state.style,
                            alignment: state.alignment,
                        })),
                    }
                }
                b"tc" if table_depth == 1 => {
                    if let Some(table) = table.as_mut() {
                        let text = table.cell.join("\n").trim().to_string();
                        table.row.push(text);
                        table.cell.clear();
                    }
                }
                b"tr" if table_depth == 1 => {
                    if let Some(table) = table.as_mut() {
                        let row = std::mem::take(&mut table.row);
                        table.rows.push(row);
                    }
                }
                b"tbl" => {
                    table_depth = table_depth.saturating_sub(1);
                    if table_depth == 0 {
                        if let Some(done) = table.take() {
                            if !done.rows.is_empty() {
                                blocks.push(Block::Table(Table { rows: done.rows }));
                            }
                        }
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(blocks)
}
