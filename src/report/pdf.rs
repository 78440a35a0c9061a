//! PDF layout of a `ReportDocument` via `printpdf`.
//!
//! Built-in Helvetica only, so text is reduced to printable ASCII. The whole
//! document is written to memory before it is returned.

use std::io::BufWriter;

use printpdf::*;

use super::document::ReportDocument;
use crate::pipeline::DiagnosticError;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const LEFT: f32 = 20.0;
const TOP: f32 = 280.0;
/// Lowest baseline for body content; the footer sits below it.
const BOTTOM: f32 = 22.0;
const FOOTER_Y: f32 = 12.0;
const IMAGE_WIDTH_MM: f32 = 120.0;
const WRAP_CHARS: usize = 80;

fn layout_error(e: impl std::fmt::Display) -> DiagnosticError {
    DiagnosticError::ReportGeneration(format!("PDF layout failed: {e}"))
}

/// Tracks the current page and vertical position; opens a new page (with
/// its own footer) whenever the next block would not fit.
struct PageCursor<'a> {
    doc: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    y: f32,
    page_no: usize,
    font: &'a IndirectFontRef,
    footer: String,
}

impl PageCursor<'_> {
    fn ensure(&mut self, needed: f32) {
        if self.y - needed < BOTTOM {
            self.new_page();
        }
    }

    fn new_page(&mut self) {
        let (page, layer) = self.doc.add_page(
            Mm(PAGE_WIDTH),
            Mm(PAGE_HEIGHT),
            format!("Page {}", self.page_no + 1),
        );
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.page_no += 1;
        self.y = TOP;
        self.draw_footer();
    }

    fn draw_footer(&self) {
        let text = format!("{} | Page {}", self.footer, self.page_no);
        self.layer
            .use_text(ascii(&text), 8.0, Mm(LEFT), Mm(FOOTER_Y), self.font);
    }

    fn text(&mut self, text: &str, size: f32, indent: f32, font: &IndirectFontRef, advance: f32) {
        self.ensure(advance);
        self.layer
            .use_text(ascii(text), size, Mm(LEFT + indent), Mm(self.y), font);
        self.y -= advance;
    }
}

/// Lay out the report as PDF bytes.
pub fn render_pdf(document: &ReportDocument) -> Result<Vec<u8>, DiagnosticError> {
    let (doc, _pages) = layout(document)?;
    let mut buf = BufWriter::new(Vec::new());
    doc.save(&mut buf).map_err(layout_error)?;
    buf.into_inner().map_err(layout_error)
}

/// Build the PDF document. Returns it with its page count.
fn layout(document: &ReportDocument) -> Result<(PdfDocumentReference, usize), DiagnosticError> {
    let title = ascii(&document.title);
    let (doc, page1, layer1) =
        PdfDocument::new(title.as_str(), Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Page 1");
    let font = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(layout_error)?;
    let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(layout_error)?;

    let visualization = ::image::load_from_memory(&document.visualization_png)
        .map_err(layout_error)?
        .to_rgb8();

    let mut cursor = PageCursor {
        doc: &doc,
        layer: doc.get_page(page1).get_layer(layer1),
        y: TOP,
        page_no: 1,
        font: &font,
        footer: document.footer(),
    };
    cursor.draw_footer();

    // Title
    cursor.text(&document.title, 16.0, 0.0, &bold, 12.0);

    for section in &document.sections {
        cursor.ensure(14.0);
        cursor.y -= 2.0;
        cursor.text(&section.heading.to_uppercase(), 11.0, 0.0, &bold, 6.0);
        for row in &section.rows {
            let line = format!("{}: {}", row.label, row.value);
            for wrapped in wrap_text(&line, WRAP_CHARS) {
                cursor.text(&wrapped, 9.5, 5.0, &font, 5.0);
            }
        }
        cursor.y -= 3.0;
    }

    // Visualization
    let (px_w, px_h) = visualization.dimensions();
    let (dpi, height_mm) = image_placement(px_w, px_h);
    cursor.ensure(height_mm + 10.0);
    cursor.text("VISUALIZATION", 11.0, 0.0, &bold, 4.0);

    let xobject = ImageXObject {
        width: Px(px_w as usize),
        height: Px(px_h as usize),
        color_space: ColorSpace::Rgb,
        bits_per_component: ColorBits::Bit8,
        interpolate: true,
        image_data: visualization.into_raw(),
        image_filter: None,
        smask: None,
        clipping_bbox: None,
    };
    Image::from(xobject).add_to_layer(
        cursor.layer.clone(),
        ImageTransform {
            translate_x: Some(Mm(LEFT)),
            translate_y: Some(Mm(cursor.y - height_mm)),
            dpi: Some(dpi),
            ..Default::default()
        },
    );
    cursor.y -= height_mm;
    let pages = cursor.page_no;
    drop(cursor);

    Ok((doc, pages))
}

/// DPI and rendered height for the visualization: full image width unless
/// that would run past the usable page height, then scaled down to fit.
fn image_placement(px_w: u32, px_h: u32) -> (f32, f32) {
    let max_height = TOP - BOTTOM - 10.0;
    let dpi = px_w.max(1) as f32 * 25.4 / IMAGE_WIDTH_MM;
    let height_mm = px_h as f32 * 25.4 / dpi;
    if height_mm <= max_height {
        return (dpi, height_mm);
    }
    (px_h as f32 * 25.4 / max_height, max_height)
}

/// Built-in PDF fonts cover ASCII only.
fn ascii(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '?' })
        .collect()
}

/// Simple word-wrap helper for PDF text rendering.
fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.len() + word.len() + 1 > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}
