// src/pdf/text.rs
//! Positioned text extraction.
//!
//! Glyph decoding (font encodings, `/Differences`, ToUnicode CMaps, widths)
//! is left to `pdf-extract`; this module only collects where each character
//! lands in user space. That is all the TOC walker needs: whole-page text
//! for marker tests and the text sitting under a link rectangle.

use super::Rect;
use crate::utils::error::PdfError;
use pdf_extract::{MediaBox, OutputDev, OutputError, Transform};
use std::cmp::Ordering;
use std::panic::{self, AssertUnwindSafe};

/// Baselines closer than this fraction of the font size share a line.
const LINE_TOLERANCE: f64 = 0.5;
/// Horizontal gaps wider than this fraction of the font size become a space.
const WORD_GAP: f64 = 0.15;

/// One decoded character, placed in user space.
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    pub text: String,
    /// Baseline origin.
    pub x: f64,
    pub y: f64,
    /// Horizontal advance in user space.
    pub width: f64,
    /// Effective font size in user space.
    pub size: f64,
}

impl Glyph {
    fn centre(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.size * 0.3)
    }
}

/// All glyphs of a page.
#[derive(Debug, Clone, Default)]
pub struct PageText {
    glyphs: Vec<Glyph>,
}

impl PageText {
    /// Page text, lines top to bottom separated by `\n`.
    pub fn text(&self) -> String {
        render_lines(self.glyphs.iter().collect())
    }

    /// Text of the glyphs whose centre falls inside `rect`, trimmed.
    pub fn text_in_rect(&self, rect: &Rect) -> String {
        let clipped: Vec<&Glyph> = self
            .glyphs
            .iter()
            .filter(|g| {
                let (cx, cy) = g.centre();
                rect.contains(cx, cy)
            })
            .collect();
        render_lines(clipped).trim().to_string()
    }
}

fn render_lines(mut glyphs: Vec<&Glyph>) -> String {
    glyphs.sort_by(|a, b| b.y.partial_cmp(&a.y).unwrap_or(Ordering::Equal));

    let mut lines: Vec<Vec<&Glyph>> = Vec::new();
    let mut anchor_y = f64::NAN;
    for glyph in glyphs {
        let tolerance = glyph.size.max(1.0) * LINE_TOLERANCE;
        match lines.last_mut() {
            Some(line) if (anchor_y - glyph.y).abs() <= tolerance => line.push(glyph),
            _ => {
                anchor_y = glyph.y;
                lines.push(vec![glyph]);
            }
        }
    }

    let mut out = String::new();
    for (i, line) in lines.iter_mut().enumerate() {
        line.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal));
        if i > 0 {
            out.push('\n');
        }
        let mut prev_end: Option<f64> = None;
        for glyph in line.iter() {
            if let Some(end) = prev_end {
                let gap = glyph.x - end;
                if gap > glyph.size * WORD_GAP
                    && !out.ends_with(' ')
                    && !glyph.text.starts_with(' ')
                {
                    out.push(' ');
                }
            }
            out.push_str(&glyph.text);
            prev_end = Some(glyph.x + glyph.width);
        }
    }
    out
}

/// `OutputDev` sink that keeps every character with its position.
#[derive(Default)]
struct GlyphCollector {
    glyphs: Vec<Glyph>,
}

impl OutputDev for GlyphCollector {
    fn begin_page(
        &mut self,
        _page_num: u32,
        _media_box: &MediaBox,
        _art_box: Option<(f64, f64, f64, f64)>,
    ) -> Result<(), OutputError> {
        Ok(())
    }

    fn end_page(&mut self) -> Result<(), OutputError> {
        Ok(())
    }

    fn output_character(
        &mut self,
        trm: &Transform,
        width: f64,
        _spacing: f64,
        font_size: f64,
        char: &str,
    ) -> Result<(), OutputError> {
        if char.is_empty() {
            return Ok(());
        }
        // `trm` excludes the font size; its determinant carries any scaling
        // from Tm and the CTM.
        let scale = (trm.m11 * trm.m22 - trm.m12 * trm.m21).abs().sqrt();
        let size = font_size * scale;
        self.glyphs.push(Glyph {
            text: char.to_string(),
            x: trm.m31,
            y: trm.m32,
            width: width * size,
            size,
        });
        Ok(())
    }

    fn begin_word(&mut self) -> Result<(), OutputError> {
        Ok(())
    }

    fn end_word(&mut self) -> Result<(), OutputError> {
        Ok(())
    }

    fn end_line(&mut self) -> Result<(), OutputError> {
        Ok(())
    }
}

/// Runs `decode`, turning a decoder panic on malformed input into an error.
fn guarded<F>(page_number: u32, decode: F) -> Result<(), PdfError>
where
    F: FnOnce() -> Result<(), OutputError>,
{
    match panic::catch_unwind(AssertUnwindSafe(decode)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(PdfError::Structure(format!(
            "text of page {}: {:?}",
            page_number, e
        ))),
        Err(_) => {
            tracing::warn!("Text decoder aborted on page {}", page_number);
            Err(PdfError::Structure(format!(
                "text of page {} could not be decoded",
                page_number
            )))
        }
    }
}

/// Decodes the glyphs of the 1-based `page_number`.
pub(crate) fn decode_page(doc: &lopdf::Document, page_number: u32) -> Result<PageText, PdfError> {
    let mut collector = GlyphCollector::default();
    guarded(page_number, || {
        pdf_extract::output_doc_page(doc, &mut collector, page_number)
    })?;
    tracing::trace!("Page {}: {} glyphs", page_number, collector.glyphs.len());

    Ok(PageText {
        glyphs: collector.glyphs,
    })
}
