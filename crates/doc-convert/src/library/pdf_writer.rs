//! Block layout onto Letter pages
//!
//! A small flowing layout engine: paragraphs are word-wrapped with the
//! Helvetica metrics, tables are drawn as ruled grids, and a new page is
//! started whenever the next line or table row would cross the bottom margin.

use super::fonts::{encode_win_ansi, Font};
use crate::error::ConvertError;
use crate::model::{Alignment, Block, Paragraph, ParagraphStyle, Table};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};

pub const PAGE_WIDTH: f64 = 612.0;
pub const PAGE_HEIGHT: f64 = 792.0;
pub const MARGIN_LEFT: f64 = 72.0;
pub const MARGIN_RIGHT: f64 = 72.0;
pub const MARGIN_TOP: f64 = 72.0;
pub const MARGIN_BOTTOM: f64 = 18.0;

const CONTENT_WIDTH: f64 = PAGE_WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
const TOP: f64 = PAGE_HEIGHT - MARGIN_TOP;

/// Gap after every non-empty paragraph (0.1 inch)
const PARAGRAPH_GAP: f64 = 7.2;
/// Height of an empty paragraph, and the gap around tables (0.2 inch)
const SPACER: f64 = 14.4;

const CELL_PADDING_X: f64 = 6.0;
const CELL_PADDING_TOP: f64 = 3.0;
const CELL_PADDING_BOTTOM: f64 = 3.0;
const HEADER_PADDING_BOTTOM: f64 = 12.0;
const HEADER_FONT_SIZE: f64 = 12.0;
const BODY_FONT_SIZE: f64 = 10.0;

const GREY: [f64; 3] = [0.5, 0.5, 0.5];
const WHITESMOKE: [f64; 3] = [0.96, 0.96, 0.96];
const BEIGE: [f64; 3] = [0.96, 0.96, 0.86];
const BLACK: [f64; 3] = [0.0, 0.0, 0.0];

#[derive(Debug, Clone, Copy, PartialEq)]
struct TextStyle {
    font: Font,
    size: f64,
    alignment: Alignment,
}

impl TextStyle {
    fn for_paragraph(paragraph: &Paragraph) -> Self {
        let (font, size, default_alignment) = match paragraph.style {
            ParagraphStyle::Title | ParagraphStyle::Heading1 => (Font::Bold, 16.0, Alignment::Center),
            ParagraphStyle::Heading2 => (Font::Bold, 14.0, Alignment::Left),
            ParagraphStyle::Heading3 => (Font::Bold, 12.0, Alignment::Left),
            ParagraphStyle::Normal => (Font::Regular, BODY_FONT_SIZE, Alignment::Left),
        };
        Self {
            font,
            size,
            alignment: paragraph.alignment.unwrap_or(default_alignment),
        }
    }

    fn leading(&self) -> f64 {
        self.size * 1.2
    }
}

/// One wrapped line, already WinAnsi-encoded
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Line {
    pub text: Vec<u8>,
    pub width: f64,
    /// Last line of its paragraph or ended by an explicit break
    pub hard_end: bool,
}

/// Word-wrap `text` into lines no wider than `max_width`
///
/// Explicit newlines always break. Words wider than the line are split
/// between characters.
pub(crate) fn wrap_text(text: &str, font: Font, size: f64, max_width: f64) -> Vec<Line> {
    let space = font.measure(b" ", size);
    let mut lines = Vec::new();

    for segment in text.split('\n') {
        let mut current: Vec<u8> = Vec::new();
        let mut width = 0.0;

        for word in segment.split([' ', '\t']).filter(|w| !w.is_empty()) {
            let encoded = encode_win_ansi(word);
            let word_width = font.measure(&encoded, size);

            if !current.is_empty() && width + space + word_width <= max_width {
                current.push(b' ');
                current.extend_from_slice(&encoded);
                width += space + word_width;
                continue;
            }

            if !current.is_empty() {
                lines.push(Line {
                    text: std::mem::take(&mut current),
                    width,
                    hard_end: false,
                });
                width = 0.0;
            }

            if word_width <= max_width {
                current = encoded;
                width = word_width;
                continue;
            }

            // Hard-split a word that cannot fit on any line
            for byte in encoded {
                let glyph = font.measure(&[byte], size);
                if !current.is_empty() && width + glyph > max_width {
                    lines.push(Line {
                        text: std::mem::take(&mut current),
                        width,
                        hard_end: false,
                    });
                    width = 0.0;
                }
                current.push(byte);
                width += glyph;
            }
        }

        lines.push(Line {
            text: current,
            width,
            hard_end: true,
        });
    }

    lines
}

struct PageBuilder {
    pages: Vec<Vec<Operation>>,
    current: Vec<Operation>,
    y: f64,
}

impl PageBuilder {
    fn new() -> Self {
        Self {
            pages: Vec::new(),
            current: Vec::new(),
            y: TOP,
        }
    }

    fn new_page(&mut self) {
        self.pages.push(std::mem::take(&mut self.current));
        self.y = TOP;
    }

    /// Start a new page unless `height` still fits (a fresh page always accepts)
    fn reserve(&mut self, height: f64) {
        if self.y - height < MARGIN_BOTTOM && self.y < TOP {
            self.new_page();
        }
    }

    fn skip(&mut self, height: f64) {
        if self.y - height < MARGIN_BOTTOM {
            self.new_page();
        } else {
            self.y -= height;
        }
    }

    fn fill_color(&mut self, [r, g, b]: [f64; 3]) {
        self.current.push(Operation::new(
            "rg",
            vec![real(r), real(g), real(b)],
        ));
    }

    fn text(&mut self, font: Font, size: f64, x: f64, baseline: f64, word_spacing: f64, text: Vec<u8>) {
        self.current.push(Operation::new("BT", vec![]));
        self.current.push(Operation::new(
            "Tf",
            vec![Object::Name(font.resource_name().to_vec()), real(size)],
        ));
        if word_spacing != 0.0 {
            self.current.push(Operation::new("Tw", vec![real(word_spacing)]));
        }
        self.current.push(Operation::new("Td", vec![real(x), real(baseline)]));
        self.current.push(Operation::new(
            "Tj",
            vec![Object::String(text, StringFormat::Literal)],
        ));
        // Word spacing is graphics state and would leak into later lines
        if word_spacing != 0.0 {
            self.current.push(Operation::new("Tw", vec![real(0.0)]));
        }
        self.current.push(Operation::new("ET", vec![]));
    }

    fn rect(&mut self, x: f64, y: f64, width: f64, height: f64, operator: &str) {
        self.current.push(Operation::new(
            "re",
            vec![real(x), real(y), real(width), real(height)],
        ));
        self.current.push(Operation::new(operator, vec![]));
    }

    fn paragraph(&mut self, paragraph: &Paragraph) {
        if paragraph.is_blank() {
            self.skip(SPACER);
            return;
        }

        let style = TextStyle::for_paragraph(paragraph);
        let leading = style.leading();
        self.fill_color(BLACK);

        for line in wrap_text(paragraph.text.trim(), style.font, style.size, CONTENT_WIDTH) {
            self.reserve(leading);
            self.y -= leading;
            let baseline = self.y + (leading - style.size);

            let slack = (CONTENT_WIDTH - line.width).max(0.0);
            let (x, word_spacing) = match style.alignment {
                Alignment::Left => (MARGIN_LEFT, 0.0),
                Alignment::Center => (MARGIN_LEFT + slack / 2.0, 0.0),
                Alignment::Right => (MARGIN_LEFT + slack, 0.0),
                Alignment::Justify => {
                    let gaps = line.text.iter().filter(|&&b| b == b' ').count();
                    if line.hard_end || gaps == 0 {
                        (MARGIN_LEFT, 0.0)
                    } else {
                        (MARGIN_LEFT, slack / gaps as f64)
                    }
                }
            };
            self.text(style.font, style.size, x, baseline, word_spacing, line.text);
        }

        self.skip(PARAGRAPH_GAP);
    }

    fn table(&mut self, table: &Table) {
        let columns = table.column_count();
        if columns == 0 {
            return;
        }
        let column_width = CONTENT_WIDTH / columns as f64;
        let text_width = (column_width - 2.0 * CELL_PADDING_X).max(1.0);

        self.skip(SPACER);

        for (index, row) in table.rows.iter().enumerate() {
            let header = index == 0;
            let (font, size, padding_bottom) = if header {
                (Font::Bold, HEADER_FONT_SIZE, HEADER_PADDING_BOTTOM)
            } else {
                (Font::Regular, BODY_FONT_SIZE, CELL_PADDING_BOTTOM)
            };
            let leading = size * 1.2;

            let cells: Vec<Vec<Line>> = (0..columns)
                .map(|col| {
                    let text = row.get(col).map(String::as_str).unwrap_or("");
                    wrap_text(text, font, size, text_width)
                })
                .collect();
            let line_count = cells.iter().map(Vec::len).max().unwrap_or(1).max(1);
            let row_height = CELL_PADDING_TOP + line_count as f64 * leading + padding_bottom;

            self.reserve(row_height);
            let top = self.y;
            let bottom = top - row_height;

            self.fill_color(if header { GREY } else { BEIGE });
            self.rect(MARGIN_LEFT, bottom, CONTENT_WIDTH, row_height, "f");

            self.current.push(Operation::new("w", vec![real(1.0)]));
            self.current.push(Operation::new(
                "RG",
                vec![real(BLACK[0]), real(BLACK[1]), real(BLACK[2])],
            ));
            for col in 0..columns {
                let x = MARGIN_LEFT + col as f64 * column_width;
                self.rect(x, bottom, column_width, row_height, "S");
            }

            self.fill_color(if header { WHITESMOKE } else { BLACK });
            for (col, lines) in cells.into_iter().enumerate() {
                let x = MARGIN_LEFT + col as f64 * column_width + CELL_PADDING_X;
                let mut line_top = top - CELL_PADDING_TOP;
                for line in lines {
                    line_top -= leading;
                    if !line.text.is_empty() {
                        self.text(font, size, x, line_top + (leading - size), 0.0, line.text);
                    }
                }
            }

            self.y = bottom;
        }

        self.fill_color(BLACK);
        self.skip(SPACER);
    }

    fn finish(mut self) -> Vec<Vec<Operation>> {
        if !self.current.is_empty() || self.pages.is_empty() {
            self.pages.push(self.current);
        }
        self.pages
    }
}

fn real(value: f64) -> Object {
    Object::Real(value as f32)
}

/// Lay out `blocks` and serialize the resulting PDF
pub fn write_pdf(blocks: &[Block]) -> Result<Vec<u8>, ConvertError> {
    let mut builder = PageBuilder::new();
    for block in blocks {
        match block {
            Block::Paragraph(paragraph) => builder.paragraph(paragraph),
            Block::Table(table) => builder.table(table),
            Block::PageBreak => builder.new_page(),
        }
    }

    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let mut fonts = Dictionary::new();
    for font in [Font::Regular, Font::Bold] {
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => Object::Name(font.base_font().to_vec()),
            "Encoding" => "WinAnsiEncoding",
        });
        fonts.set(font.resource_name().to_vec(), Object::Reference(font_id));
    }
    let resources_id = doc.add_object(dictionary! {
        "Font" => fonts,
    });

    let mut kids: Vec<ObjectId> = Vec::new();
    for operations in builder.finish() {
        let content = Content { operations }
            .encode()
            .map_err(|e| ConvertError::Processing(format!("Failed to encode page: {}", e)))?;
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id);
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids.iter().map(|&id| Object::Reference(id)).collect::<Vec<_>>(),
            "Count" => kids.len() as i64,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), Object::Real(PAGE_WIDTH as f32), Object::Real(PAGE_HEIGHT as f32)],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| ConvertError::Processing(format!("Failed to write PDF: {}", e)))?;
    Ok(buffer)
}
