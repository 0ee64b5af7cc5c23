//! A4 PDF output for [`Document`]s. Text is set in embedded DejaVu Sans so
//! names in any script the font covers (Arabic, Cyrillic, ...) print as entered.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use printpdf::{IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference, Point};
use ttf_parser::Face;

use crate::document::{render, Align, Canvas, Document, TextStyle};
use crate::error::{LedgerError, Result};
use crate::format::sanitize_filename;

const PAGE_W: f32 = 210.0;
const PAGE_H: f32 = 297.0;
const MARGIN_X: f32 = 15.0;
const MARGIN_TOP: f32 = 15.0;
const MARGIN_BOTTOM: f32 = 15.0;
const CELL_PAD_X: f32 = 1.2;
const CELL_PAD_Y: f32 = 1.2;
const BORDER_THICKNESS: f32 = 0.3;
const PT_TO_MM: f32 = 25.4 / 72.0;

static FONT_BYTES: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");
static FONT_BOLD_BYTES: &[u8] = include_bytes!("../assets/DejaVuSans-Bold.ttf");

/// The font as placed in the PDF, and the same font parsed for measuring.
struct EmbeddedFont {
    pdf: IndirectFontRef,
    face: Face<'static>,
}

impl EmbeddedFont {
    fn load(doc: &PdfDocumentReference, bytes: &'static [u8]) -> Result<Self> {
        let pdf = doc
            .add_external_font(Cursor::new(bytes))
            .map_err(|e| LedgerError::Render(e.to_string()))?;
        Ok(EmbeddedFont {
            pdf,
            face: parse_face(bytes)?,
        })
    }
}

fn parse_face(bytes: &'static [u8]) -> Result<Face<'static>> {
    Face::parse(bytes, 0).map_err(|e| LedgerError::Render(format!("embedded font: {e}")))
}

struct PendingCell {
    width: f32,
    text: String,
    style: TextStyle,
    align: Align,
    border: bool,
}

/// Cells are buffered until `end_row`, so a row's height is known before
/// anything in it is drawn and a row never straddles a page break.
pub struct PdfCanvas {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: EmbeddedFont,
    bold: EmbeddedFont,
    y: f32,
    pages: usize,
    pending: Vec<PendingCell>,
}

impl PdfCanvas {
    pub fn new(title: &str) -> Result<Self> {
        let (doc, page1, layer1) = PdfDocument::new(title, Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
        let layer = doc.get_page(page1).get_layer(layer1);
        let regular = EmbeddedFont::load(&doc, FONT_BYTES)?;
        let bold = EmbeddedFont::load(&doc, FONT_BOLD_BYTES)?;
        Ok(PdfCanvas {
            doc,
            layer,
            regular,
            bold,
            y: top_y(),
            pages: 1,
            pending: Vec::new(),
        })
    }

    fn font(&self, style: TextStyle) -> &EmbeddedFont {
        if style.is_bold() {
            &self.bold
        } else {
            &self.regular
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages
    }

    pub fn into_bytes(mut self) -> Result<Vec<u8>> {
        self.flush_row();
        let mut writer = std::io::BufWriter::new(Vec::<u8>::new());
        self.doc
            .save(&mut writer)
            .map_err(|e| LedgerError::Render(e.to_string()))?;
        writer
            .into_inner()
            .map_err(|e| LedgerError::Render(e.to_string()))
    }

    fn new_page(&mut self) {
        let (page, layer) = self.doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = top_y();
        self.pages += 1;
    }

    fn flush_row(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let cells = std::mem::take(&mut self.pending);
        let wrapped: Vec<Vec<String>> = cells
            .iter()
            .map(|c| {
                wrap_to_width(
                    &self.font(c.style).face,
                    &c.text,
                    c.style.font_size(),
                    c.width - 2.0 * CELL_PAD_X,
                )
            })
            .collect();
        let height = cells
            .iter()
            .zip(&wrapped)
            .map(|(c, lines)| lines.len().max(1) as f32 * line_height(c.style) + 2.0 * CELL_PAD_Y)
            .fold(0.0_f32, f32::max);

        // A row taller than a whole page is drawn anyway rather than looping.
        if self.y - height < MARGIN_BOTTOM && self.y < top_y() {
            self.new_page();
        }

        let top = self.y;
        let mut x = MARGIN_X;
        for (cell, lines) in cells.iter().zip(&wrapped) {
            let size = cell.style.font_size();
            let font = self.font(cell.style);
            let first_baseline = top - CELL_PAD_Y - font_ascent_mm(&font.face, size);
            for (idx, line) in lines.iter().enumerate() {
                let w = text_width_mm(&font.face, line, size);
                let tx = match cell.align {
                    Align::Left => x + CELL_PAD_X,
                    Align::Right => (x + cell.width - CELL_PAD_X - w).max(x),
                    Align::Center => (x + (cell.width - w) / 2.0).max(x),
                };
                let ty = first_baseline - idx as f32 * line_height(cell.style);
                push_line(&self.layer, &font.pdf, line, size, tx, ty);
            }
            if cell.border {
                draw_box(&self.layer, x, top - height, cell.width, height);
            }
            x += cell.width;
        }
        self.y = top - height;
    }
}

impl Canvas for PdfCanvas {
    fn line_width(&self) -> f32 {
        PAGE_W - 2.0 * MARGIN_X
    }

    fn cell(&mut self, width: f32, text: &str, style: TextStyle, align: Align, border: bool) {
        self.pending.push(PendingCell {
            width,
            text: text.to_string(),
            style,
            align,
            border,
        });
    }

    fn end_row(&mut self) {
        self.flush_row();
    }

    fn gap(&mut self, height: f32) {
        self.flush_row();
        self.y -= height;
        if self.y < MARGIN_BOTTOM {
            self.new_page();
        }
    }
}

pub fn render_pdf(doc: &Document) -> Result<Vec<u8>> {
    let mut canvas = PdfCanvas::new(&doc.title)?;
    render(doc, &mut canvas);
    tracing::debug!(title = %doc.title, pages = canvas.page_count(), "rendered document");
    canvas.into_bytes()
}

/// Renders `doc` and writes it as `dir/file_name`, creating `dir` if needed.
pub fn write_document(doc: &Document, dir: &Path, file_name: &str) -> Result<PathBuf> {
    let bytes = render_pdf(doc)?;
    std::fs::create_dir_all(dir)?;
    let full_path = dir.join(sanitize_filename(file_name));
    std::fs::write(&full_path, bytes)?;
    tracing::info!(path = %full_path.display(), "wrote document");
    Ok(full_path)
}

fn top_y() -> f32 {
    PAGE_H - MARGIN_TOP
}

fn line_height(style: TextStyle) -> f32 {
    style.font_size() * PT_TO_MM * 1.3
}

fn push_line(layer: &PdfLayerReference, font: &IndirectFontRef, text: &str, font_size: f32, x: f32, y: f32) {
    layer.use_text(text, font_size, Mm(x), Mm(y), font);
}

fn draw_box(layer: &PdfLayerReference, x: f32, y: f32, w: f32, h: f32) {
    layer.set_outline_thickness(BORDER_THICKNESS);
    layer.add_line(Line {
        points: vec![
            (Point::new(Mm(x), Mm(y)), false),
            (Point::new(Mm(x + w), Mm(y)), false),
            (Point::new(Mm(x + w), Mm(y + h)), false),
            (Point::new(Mm(x), Mm(y + h)), false),
        ],
        is_closed: true,
    });
}

fn text_width_mm(face: &Face<'_>, text: &str, font_size_pt: f32) -> f32 {
    let units_per_em = face.units_per_em() as f32;
    if units_per_em <= 0.0 {
        return 0.0;
    }
    let width_units: u32 = text
        .chars()
        .filter_map(|ch| face.glyph_index(ch))
        .map(|gid| u32::from(face.glyph_hor_advance(gid).unwrap_or(0)))
        .sum();
    (width_units as f32 / units_per_em) * font_size_pt * PT_TO_MM
}

fn font_ascent_mm(face: &Face<'_>, font_size_pt: f32) -> f32 {
    let units_per_em = face.units_per_em() as f32;
    if units_per_em <= 0.0 {
        return font_size_pt * PT_TO_MM * 0.8;
    }
    (face.ascender() as f32 / units_per_em) * font_size_pt * PT_TO_MM
}

/// Greedy word wrap at `max_width_mm`; a single word wider than that is split.
fn wrap_to_width(face: &Face<'_>, input: &str, font_size: f32, max_width_mm: f32) -> Vec<String> {
    let fits = |s: &str| text_width_mm(face, s, font_size) <= max_width_mm;
    let mut out: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in input.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };
        if fits(&candidate) {
            current = candidate;
            continue;
        }
        if !current.is_empty() {
            out.push(std::mem::take(&mut current));
        }
        for ch in word.chars() {
            current.push(ch);
            if !fits(&current) && current.chars().count() > 1 {
                current.pop();
                out.push(std::mem::take(&mut current));
                current.push(ch);
            }
        }
    }

    if !current.is_empty() {
        out.push(current);
    }
    out
}
