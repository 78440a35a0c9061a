//! Prediction overlay: the radiograph on top, a score panel below it.

use std::io::Cursor;
use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use rusttype::{Font, Scale};

use crate::models::{format_percent, PredictionSet};
use crate::pipeline::DiagnosticError;

static FONT_BYTES: &[u8] = include_bytes!("../../resources/fonts/DejaVuSans.ttf");

/// Output width. Height follows the source aspect ratio.
const CANVAS_WIDTH: u32 = 512;
const MAX_IMAGE_HEIGHT: u32 = 768;
const MARGIN: u32 = 16;
const TEXT_SIZE: u32 = 20;
const LINE_HEIGHT: u32 = TEXT_SIZE + 10;
const BAR_HEIGHT: u32 = 6;
/// Space reserved for the "LABEL: 99.99%" text in each score row.
const LABEL_COLUMN: u32 = 260;

const BACKGROUND: Rgb<u8> = Rgb([18, 18, 24]);
const TEXT: Rgb<u8> = Rgb([230, 230, 230]);
const HEADLINE: Rgb<u8> = Rgb([255, 196, 0]);
const BAR: Rgb<u8> = Rgb([0, 150, 220]);
const BAR_TRACK: Rgb<u8> = Rgb([55, 55, 65]);

/// Render the stored image with every class score, highest first, and a
/// headline for the top class. Returns PNG bytes.
pub fn render_visualization(
    image_path: &Path,
    predictions: &PredictionSet,
) -> Result<Vec<u8>, DiagnosticError> {
    let bytes = std::fs::read(image_path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            DiagnosticError::BackingImageMissing(image_path.display().to_string())
        } else {
            DiagnosticError::ReportGeneration(format!(
                "backing image {} unavailable: {e}",
                image_path.display()
            ))
        }
    })?;
    let source = image::load_from_memory(&bytes)
        .map_err(|e| DiagnosticError::ReportGeneration(format!("backing image unreadable: {e}")))?
        .to_rgb8();
    compose(&source, predictions)
}

fn load_font() -> Result<Font<'static>, DiagnosticError> {
    Font::try_from_bytes(FONT_BYTES)
        .ok_or_else(|| DiagnosticError::ReportGeneration("embedded font unreadable".into()))
}

fn compose(source: &RgbImage, predictions: &PredictionSet) -> Result<Vec<u8>, DiagnosticError> {
    let font = load_font()?;
    let scale = Scale::uniform(TEXT_SIZE as f32);
    let ranked = predictions.ranked();
    let top = ranked.first().ok_or_else(|| {
        DiagnosticError::ReportGeneration("test has no class scores".into())
    })?;

    let (src_w, src_h) = source.dimensions();
    let image_height = ((u64::from(src_h) * u64::from(CANVAS_WIDTH)) / u64::from(src_w.max(1)))
        .clamp(1, u64::from(MAX_IMAGE_HEIGHT)) as u32;
    let resized = image::imageops::resize(source, CANVAS_WIDTH, image_height, FilterType::Triangle);

    let rows = ranked.len() as u32;
    let panel_height = MARGIN * 2 + LINE_HEIGHT * (rows + 1) + MARGIN / 2;
    let mut canvas = RgbImage::from_pixel(CANVAS_WIDTH, image_height + panel_height, BACKGROUND);
    image::imageops::replace(&mut canvas, &resized, 0, 0);

    let mut y = image_height + MARGIN;
    let headline = format!("Predicted: {} ({})", top.label, top.percent());
    draw_text_mut(&mut canvas, HEADLINE, MARGIN, y, scale, &font, &headline);
    y += LINE_HEIGHT + MARGIN / 2;

    let bar_x = MARGIN + LABEL_COLUMN;
    let bar_width = CANVAS_WIDTH - bar_x - MARGIN;
    for score in ranked {
        let line = format!("{}: {}", score.label, format_percent(score.confidence));
        draw_text_mut(&mut canvas, TEXT, MARGIN, y, scale, &font, &line);

        let bar_y = y + TEXT_SIZE.saturating_sub(BAR_HEIGHT) / 2;
        fill_rect(&mut canvas, bar_x, bar_y, bar_width, BAR_HEIGHT, BAR_TRACK);
        let filled = (score.confidence.clamp(0.0, 1.0) * f64::from(bar_width)).round() as u32;
        fill_rect(&mut canvas, bar_x, bar_y, filled, BAR_HEIGHT, BAR);
        y += LINE_HEIGHT;
    }

    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(canvas)
        .write_to(&mut buf, ImageOutputFormat::Png)
        .map_err(|e: image::ImageError| DiagnosticError::ReportGeneration(e.to_string()))?;
    Ok(buf.into_inner())
}

/// `Rect` rejects empty sizes, so zero-width bars are skipped.
fn fill_rect(canvas: &mut RgbImage, x: u32, y: u32, w: u32, h: u32, color: Rgb<u8>) {
    if w == 0 || h == 0 {
        return;
    }
    draw_filled_rect_mut(canvas, Rect::at(x as i32, y as i32).of_size(w, h), color);
}
