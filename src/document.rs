//! A printable document as plain data, and the canvas it is drawn on.
//!
//! Composers build a [`Document`]; [`render`] replays it onto any [`Canvas`]
//! as a flat sequence of cell placements. The canvas owns pagination.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Align {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TextStyle {
    Normal,
    Bold,
    Small,
    Heading,
    Title,
}

impl TextStyle {
    pub fn font_size(&self) -> f32 {
        match self {
            TextStyle::Normal | TextStyle::Bold => 10.0,
            TextStyle::Small => 8.0,
            TextStyle::Heading => 12.0,
            TextStyle::Title => 14.0,
        }
    }

    pub fn is_bold(&self) -> bool {
        matches!(self, TextStyle::Bold | TextStyle::Heading | TextStyle::Title)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub header: String,
    /// Millimetres; scaled down together with the other columns if the table is too wide.
    pub width: f32,
    pub align: Align,
}

impl Column {
    pub fn text(header: &str, width: f32) -> Self {
        Column {
            header: header.to_string(),
            width,
            align: Align::Left,
        }
    }

    pub fn numeric(header: &str, width: f32) -> Self {
        Column {
            header: header.to_string(),
            width,
            align: Align::Right,
        }
    }
}

/// A closing row such as "Making Charges" or "TOTAL": the label spans every
/// column but the last, the value sits under the last one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub label: String,
    pub value: String,
    pub emphasis: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<String>>,
    pub summary: Vec<SummaryRow>,
    pub body_style: TextStyle,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Self {
        Table {
            columns,
            rows: Vec::new(),
            summary: Vec::new(),
            body_style: TextStyle::Normal,
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Block {
    /// Centered document title.
    Title(String),
    Heading(String),
    /// A line of text spanning the page.
    Text(String),
    /// `label` in a fixed-width bold column, `value` after it.
    Field { label: String, value: String },
    Spacer(f32),
    Table(Table),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub title: String,
    pub blocks: Vec<Block>,
}

impl Document {
    pub fn new(title: impl Into<String>) -> Self {
        Document {
            title: title.into(),
            blocks: Vec::new(),
        }
    }

    pub fn push(&mut self, block: Block) -> &mut Self {
        self.blocks.push(block);
        self
    }

    pub fn field(&mut self, label: &str, value: impl Into<String>) -> &mut Self {
        self.push(Block::Field {
            label: label.to_string(),
            value: value.into(),
        })
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Table(t) => Some(t),
            _ => None,
        })
    }

    /// Value of the first `Field` with this label.
    pub fn field_value(&self, label: &str) -> Option<&str> {
        self.blocks.iter().find_map(|b| match b {
            Block::Field { label: l, value } if l == label => Some(value.as_str()),
            _ => None,
        })
    }
}

/// Append-only drawing surface. Cells are placed left to right on the
/// current line; `end_row` moves below the tallest of them.
pub trait Canvas {
    /// Usable width of one line, in millimetres.
    fn line_width(&self) -> f32;

    fn cell(&mut self, width: f32, text: &str, style: TextStyle, align: Align, border: bool);

    fn end_row(&mut self);

    fn gap(&mut self, height: f32);

    /// A borderless cell on a row of its own; wraps at `width`.
    fn text_block(&mut self, width: f32, text: &str, style: TextStyle, align: Align) {
        self.cell(width, text, style, align, false);
        self.end_row();
    }
}

const FIELD_LABEL_W: f32 = 45.0;

pub fn render<C: Canvas + ?Sized>(doc: &Document, canvas: &mut C) {
    let full = canvas.line_width();
    for block in &doc.blocks {
        match block {
            Block::Title(text) => {
                canvas.text_block(full, text, TextStyle::Title, Align::Center);
                canvas.gap(6.0);
            }
            Block::Heading(text) => {
                canvas.gap(2.0);
                canvas.text_block(full, text, TextStyle::Heading, Align::Left);
            }
            Block::Text(text) => canvas.text_block(full, text, TextStyle::Normal, Align::Left),
            Block::Field { label, value } => {
                canvas.cell(FIELD_LABEL_W, label, TextStyle::Bold, Align::Left, false);
                canvas.cell(full - FIELD_LABEL_W, value, TextStyle::Normal, Align::Left, false);
                canvas.end_row();
            }
            Block::Spacer(h) => canvas.gap(*h),
            Block::Table(table) => render_table(table, full, canvas),
        }
    }
}

fn render_table<C: Canvas + ?Sized>(table: &Table, full: f32, canvas: &mut C) {
    let total: f32 = table.columns.iter().map(|c| c.width).sum();
    let scale = if total > full && total > 0.0 { full / total } else { 1.0 };
    let widths: Vec<f32> = table.columns.iter().map(|c| c.width * scale).collect();

    for (col, w) in table.columns.iter().zip(&widths) {
        canvas.cell(*w, &col.header, TextStyle::Bold, Align::Center, true);
    }
    canvas.end_row();

    for row in &table.rows {
        for ((col, w), text) in table.columns.iter().zip(&widths).zip(row) {
            canvas.cell(*w, text, table.body_style, col.align, true);
        }
        canvas.end_row();
    }

    if let Some((last_w, rest)) = widths.split_last() {
        let label_w: f32 = rest.iter().sum();
        for s in &table.summary {
            let style = if s.emphasis { TextStyle::Bold } else { table.body_style };
            if label_w > 0.0 {
                canvas.cell(label_w, &s.label, style, Align::Right, true);
            }
            canvas.cell(*last_w, &s.value, style, Align::Right, true);
            canvas.end_row();
        }
    }
}
