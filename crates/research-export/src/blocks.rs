//! Format-neutral document model produced by the HTML walker

/// Report palette
pub mod colors {
    pub const BROWN_BLACK: &str = "3B312A";
    pub const BLUE_DARKER: &str = "003D5A";
    pub const TEXT_SECONDARY: &str = "333333";
}

/// A span of uniformly formatted text
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    /// Points
    pub size: f32,
    pub bold: bool,
    pub italic: bool,
    /// Hex RGB without `#`
    pub color: Option<&'static str>,
}

impl TextRun {
    pub fn new(text: impl Into<String>, size: f32) -> Self {
        Self {
            text: text.into(),
            size,
            bold: false,
            italic: false,
            color: None,
        }
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn italic(mut self) -> Self {
        self.italic = true;
        self
    }

    pub fn color(mut self, color: &'static str) -> Self {
        self.color = Some(color);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Alignment {
    #[default]
    Left,
    Center,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Paragraph {
    pub runs: Vec<TextRun>,
    pub alignment: Alignment,
}

impl Paragraph {
    pub fn new(runs: Vec<TextRun>) -> Self {
        Self {
            runs,
            alignment: Alignment::Left,
        }
    }

    /// Paragraph holding a single run
    pub fn single(run: TextRun) -> Self {
        Self::new(vec![run])
    }

    pub fn centered(mut self) -> Self {
        self.alignment = Alignment::Center;
        self
    }

    /// Concatenated text of every run
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }

    pub fn is_blank(&self) -> bool {
        self.runs.iter().all(|r| r.text.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableCell {
    pub paragraphs: Vec<Paragraph>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub rows: Vec<Vec<TableCell>>,
}

impl Table {
    pub fn columns(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
}

/// Decoded raster image
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBlock {
    pub data: Vec<u8>,
    pub alt: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DocumentBlock {
    Paragraph(Paragraph),
    Table(Table),
    Image(ImageBlock),
    PageBreak,
}

impl DocumentBlock {
    pub fn as_paragraph(&self) -> Option<&Paragraph> {
        match self {
            Self::Paragraph(p) => Some(p),
            _ => None,
        }
    }
}
