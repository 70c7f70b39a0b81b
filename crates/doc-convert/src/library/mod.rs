//! Pure-Rust conversion path, used when no office suite is available

pub mod docx_reader;
pub mod docx_writer;
pub mod fonts;
pub mod pdf_text;
pub mod pdf_writer;

use crate::error::ConvertError;

/// PDF to DOCX: recovered text only, one paragraph per text block
pub fn pdf_to_docx(pdf: &[u8]) -> Result<Vec<u8>, ConvertError> {
    let blocks = pdf_text::read_pdf(pdf)?;
    docx_writer::write_docx(&blocks)
}

/// DOCX to PDF: paragraphs and tables laid out on Letter pages
pub fn docx_to_pdf(docx: &[u8]) -> Result<Vec<u8>, ConvertError> {
    let blocks = docx_reader::read_docx(docx)?;
    pdf_writer::write_pdf(&blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Block, Paragraph, ParagraphStyle, Table};
    use lopdf::Document;

    fn sample_docx() -> Vec<u8> {
        docx_writer::write_docx(&[
            Block::Paragraph(Paragraph::new("Quarterly Report").with_style(ParagraphStyle::Title)),
            Block::Paragraph(Paragraph::new("Revenue grew in every region.")),
            Block::Table(Table {
                rows: vec![
                    vec!["Region".into(), "Revenue".into()],
                    vec!["North".into(), "120".into()],
                ],
            }),
        ])
        .unwrap()
    }

    #[test]
    fn test_docx_to_pdf_produces_pdf() {
        let pdf = docx_to_pdf(&sample_docx()).unwrap();
        assert!(pdf.starts_with(b"%PDF"));
        let doc = Document::load_mem(&pdf).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn test_pdf_to_docx_recovers_text() {
        let pdf = docx_to_pdf(&sample_docx()).unwrap();
        let docx = pdf_to_docx(&pdf).unwrap();

        let blocks = docx_reader::read_docx(&docx).unwrap();
        let text: String = blocks
            .iter()
            .filter_map(|block| match block {
                Block::Paragraph(p) => Some(p.text.clone()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(" ");
        assert!(text.contains("Quarterly Report"), "{}", text);
        assert!(text.contains("Revenue grew"), "{}", text);
    }

    #[test]
    fn test_multi_page_pdf_gets_page_breaks() {
        let blocks = vec![
            Block::Paragraph(Paragraph::new("One")),
            Block::PageBreak,
            Block::Paragraph(Paragraph::new("Two")),
        ];
        let pdf = pdf_writer::write_pdf(&blocks).unwrap();
        let recovered = pdf_text::read_pdf(&pdf).unwrap();
        assert_eq!(
            recovered.iter().filter(|b| **b == Block::PageBreak).count(),
            1
        );
    }

    #[test]
    fn test_wrong_inputs_are_unsupported() {
        assert!(docx_to_pdf(b"%PDF-1.7").unwrap_err().is_input_error());
        assert!(pdf_to_docx(b"PK\x03\x04").unwrap_err().is_input_error());
    }
}
