//! Minimal WordprocessingML package writer

use crate::error::ConvertError;
use crate::model::{Block, Paragraph, ParagraphStyle, Table};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const WORD_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  <Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
  <Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/>
</Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>
</Relationships>"#;

const DOCUMENT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
</Relationships>"#;

const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:rPr><w:sz w:val="20"/></w:rPr></w:style>
  <w:style w:type="paragraph" w:styleId="Title"><w:name w:val="Title"/><w:basedOn w:val="Normal"/><w:pPr><w:jc w:val="center"/></w:pPr><w:rPr><w:b/><w:sz w:val="32"/></w:rPr></w:style>
  <w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/><w:basedOn w:val="Normal"/><w:rPr><w:b/><w:sz w:val="32"/></w:rPr></w:style>
  <w:style w:type="paragraph" w:styleId="Heading2"><w:name w:val="heading 2"/><w:basedOn w:val="Normal"/><w:rPr><w:b/><w:sz w:val="28"/></w:rPr></w:style>
  <w:style w:type="paragraph" w:styleId="Heading3"><w:name w:val="heading 3"/><w:basedOn w:val="Normal"/><w:rPr><w:b/><w:sz w:val="24"/></w:rPr></w:style>
</w:styles>"#;

type XmlWriter = Writer<Cursor<Vec<u8>>>;

/// Serialize `blocks` into a `.docx` package
pub fn write_docx(blocks: &[Block]) -> Result<Vec<u8>, ConvertError> {
    let document = document_xml(blocks)?;

    let mut buffer = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for (path, content) in [
            ("[Content_Types].xml", CONTENT_TYPES.as_bytes()),
            ("_rels/.rels", PACKAGE_RELS.as_bytes()),
            ("word/_rels/document.xml.rels", DOCUMENT_RELS.as_bytes()),
            ("word/styles.xml", STYLES.as_bytes()),
            ("word/document.xml", document.as_slice()),
        ] {
            zip.start_file(path, options)?;
            zip.write_all(content)?;
        }
        zip.finish()?;
    }
    Ok(buffer)
}

fn document_xml(blocks: &[Block]) -> Result<Vec<u8>, ConvertError> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;

    let mut root = BytesStart::new("w:document");
    root.push_attribute(("xmlns:w", WORD_NS));
    writer.write_event(Event::Start(root))?;
    writer.write_event(Event::Start(BytesStart::new("w:body")))?;

    for block in blocks {
        match block {
            Block::Paragraph(paragraph) => write_paragraph(&mut writer, paragraph)?,
            Block::Table(table) => write_table(&mut writer, table)?,
            Block::PageBreak => write_page_break(&mut writer)?,
        }
    }

    writer.write_event(Event::End(BytesEnd::new("w:body")))?;
    writer.write_event(Event::End(BytesEnd::new("w:document")))?;

    Ok(writer.into_inner().into_inner())
}

fn empty_with_val(writer: &mut XmlWriter, name: &str, value: &str) -> Result<(), ConvertError> {
    let mut element = BytesStart::new(name);
    element.push_attribute(("w:val", value));
    writer.write_event(Event::Empty(element))?;
    Ok(())
}

fn write_paragraph(writer: &mut XmlWriter, paragraph: &Paragraph) -> Result<(), ConvertError> {
    writer.write_event(Event::Start(BytesStart::new("w:p")))?;

    if paragraph.style != ParagraphStyle::Normal || paragraph.alignment.is_some() {
        writer.write_event(Event::Start(BytesStart::new("w:pPr")))?;
        if let Some(id) = paragraph.style.style_id() {
            empty_with_val(writer, "w:pStyle", id)?;
        }
        if let Some(alignment) = paragraph.alignment {
            empty_with_val(writer, "w:jc", alignment.jc())?;
        }
        writer.write_event(Event::End(BytesEnd::new("w:pPr")))?;
    }

    if !paragraph.text.is_empty() {
        writer.write_event(Event::Start(BytesStart::new("w:r")))?;
        for (index, line) in paragraph.text.split('\n').enumerate() {
            if index > 0 {
                writer.write_event(Event::Empty(BytesStart::new("w:br")))?;
            }
            for (part, piece) in line.split('\t').enumerate() {
                if part > 0 {
                    writer.write_event(Event::Empty(BytesStart::new("w:tab")))?;
                }
                if piece.is_empty() {
                    continue;
                }
                let mut text = BytesStart::new("w:t");
                text.push_attribute(("xml:space", "preserve"));
                writer.write_event(Event::Start(text))?;
                writer.write_event(Event::Text(BytesText::new(piece)))?;
                writer.write_event(Event::End(BytesEnd::new("w:t")))?;
            }
        }
        writer.write_event(Event::End(BytesEnd::new("w:r")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("w:p")))?;
    Ok(())
}

fn write_table(writer: &mut XmlWriter, table: &Table) -> Result<(), ConvertError> {
    writer.write_event(Event::Start(BytesStart::new("w:tbl")))?;
    for row in &table.rows {
        writer.write_event(Event::Start(BytesStart::new("w:tr")))?;
        for cell in row {
            writer.write_event(Event::Start(BytesStart::new("w:tc")))?;
            // A cell must contain at least one paragraph
            write_paragraph(writer, &Paragraph::new(cell.as_str()))?;
            writer.write_event(Event::End(BytesEnd::new("w:tc")))?;
        }
        writer.write_event(Event::End(BytesEnd::new("w:tr")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("w:tbl")))?;
    Ok(())
}

fn write_page_break(writer: &mut XmlWriter) -> Result<(), ConvertError> {
    writer.write_event(Event::Start(BytesStart::new("w:p")))?;
    writer.write_event(Event::Start(BytesStart::new("w:r")))?;
    let mut br = BytesStart::new("w:br");
    br.push_attribute(("w:type", "page"));
    writer.write_event(Event::Empty(br))?;
    writer.write_event(Event::End(BytesEnd::new("w:r")))?;
    writer.write_event(Event::End(BytesEnd::new("w:p")))?;
    Ok(())
}
