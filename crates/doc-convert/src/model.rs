//! Intermediate document model shared by the readers and writers

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParagraphStyle {
    #[default]
    Normal,
    Title,
    Heading1,
    Heading2,
    Heading3,
}

impl ParagraphStyle {
    /// Classify a WordprocessingML style by id or display name
    ///
    /// Matches "Heading1", "heading 1", "Title" and so on; anything else is body text.
    pub fn from_style_name(name: &str) -> Self {
        let key: String = name
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "title" => ParagraphStyle::Title,
            "heading1" => ParagraphStyle::Heading1,
            "heading2" => ParagraphStyle::Heading2,
            "heading3" => ParagraphStyle::Heading3,
            _ => ParagraphStyle::Normal,
        }
    }

    /// Style id written into generated documents
    pub fn style_id(self) -> Option<&'static str> {
        match self {
            ParagraphStyle::Normal => None,
            ParagraphStyle::Title => Some("Title"),
            ParagraphStyle::Heading1 => Some("Heading1"),
            ParagraphStyle::Heading2 => Some("Heading2"),
            ParagraphStyle::Heading3 => Some("Heading3"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

impl Alignment {
    /// Map a `w:jc` value
    pub fn from_jc(value: &str) -> Self {
        match value {
            "center" => Alignment::Center,
            "right" | "end" => Alignment::Right,
            "both" | "distribute" => Alignment::Justify,
            _ => Alignment::Left,
        }
    }

    pub fn jc(self) -> &'static str {
        match self {
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Right => "right",
            Alignment::Justify => "both",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Paragraph {
    pub text: String,
    pub style: ParagraphStyle,
    /// Explicit alignment; `None` uses the style's default
    pub alignment: Option<Alignment>,
}

impl Paragraph {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_style(mut self, style: ParagraphStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = Some(alignment);
        self
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    /// Cell text by row; the first row is treated as the header
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
    PageBreak,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_style_names() {
        assert_eq!(ParagraphStyle::from_style_name("Heading1"), ParagraphStyle::Heading1);
        assert_eq!(ParagraphStyle::from_style_name("heading 2"), ParagraphStyle::Heading2);
        assert_eq!(ParagraphStyle::from_style_name("Title"), ParagraphStyle::Title);
        assert_eq!(ParagraphStyle::from_style_name("Heading 4"), ParagraphStyle::Normal);
        assert_eq!(ParagraphStyle::from_style_name("ListParagraph"), ParagraphStyle::Normal);
    }

    #[test]
    fn test_alignment_values() {
        assert_eq!(Alignment::from_jc("both"), Alignment::Justify);
        assert_eq!(Alignment::from_jc("center"), Alignment::Center);
        assert_eq!(Alignment::from_jc("start"), Alignment::Left);
        assert_eq!(Alignment::from_jc(Alignment::Right.jc()), Alignment::Right);
    }

    #[test]
    fn test_table_columns() {
        let table = Table {
            rows: vec![vec!["a".into()], vec!["b".into(), "c".into()]],
        };
        assert_eq!(table.column_count(), 2);
        assert_eq!(Table::default().column_count(), 0);
    }
}
