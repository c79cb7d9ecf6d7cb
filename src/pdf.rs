use std::io::BufWriter;

use printpdf::path::PaintMode;
use printpdf::*;

use crate::error::{AppError, Result};
use crate::report::ReportBlock;

// A4 dimensions (mm)
const PAGE_W: f32 = 210.0;
const PAGE_H: f32 = 297.0;
const BAND_H: f32 = 15.0;
const MARGIN_TOP: f32 = BAND_H + 10.0;
const MARGIN_BOTTOM: f32 = 15.0;
const MARGIN_LEFT: f32 = 15.0;
const MARGIN_RIGHT: f32 = 15.0;
const LINE_H: f32 = 5.5;
const TITLE_LINE_H: f32 = 6.5;
const CARD_GAP: f32 = 4.0;
const FONT_SIZE: f32 = 10.0;
const TITLE_SIZE: f32 = 11.0;
const BAND_TITLE_SIZE: f32 = 14.0;

// Average Helvetica glyph width, mm per pt of font size.
const CHAR_W: f32 = 0.18;

/// The builtin fonts only cover the Latin-1 range. Accented Portuguese text
/// is fine; anything beyond (typographic dashes, emoji) is mapped down.
fn latin1(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '\u{2013}' | '\u{2014}' => '-',
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201C}' | '\u{201D}' => '"',
            c if (c as u32) <= 0xFF => c,
            _ => '?',
        })
        .collect()
}

fn chars_per_line(size: f32) -> usize {
    let usable = PAGE_W - MARGIN_LEFT - MARGIN_RIGHT;
    ((usable / (size * CHAR_W)) as usize).max(1)
}

/// Wrap one logical line to the page width. Hard newlines inside a textarea
/// value are respected.
fn wrap_line(text: &str, size: f32) -> Vec<String> {
    let width = chars_per_line(size);
    let mut out = Vec::new();
    for part in text.split('\n') {
        if part.is_empty() {
            out.push(String::new());
            continue;
        }
        for piece in textwrap::wrap(part, width) {
            out.push(piece.into_owned());
        }
    }
    if out.is_empty() {
        out.push(String::new());
    }
    out
}

struct PdfWriter {
    doc: PdfDocumentReference,
    font: IndirectFontRef,
    font_bold: IndirectFontRef,
    current_page: PdfPageIndex,
    current_layer: PdfLayerIndex,
    y: f32,
    band_title: String,
}

impl PdfWriter {
    fn new(band_title: &str) -> Result<Self> {
        let (doc, page, layer) = PdfDocument::new(band_title, Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| AppError::Pdf(format!("{e:?}")))?;
        let font_bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| AppError::Pdf(format!("{e:?}")))?;
        let mut writer = Self {
            doc,
            font,
            font_bold,
            current_page: page,
            current_layer: layer,
            y: MARGIN_TOP,
            band_title: latin1(band_title),
        };
        writer.band();
        Ok(writer)
    }

    fn pdf_y(&self) -> f32 {
        PAGE_H - self.y
    }

    fn layer(&self) -> PdfLayerReference {
        self.doc
            .get_page(self.current_page)
            .get_layer(self.current_layer)
    }

    /// Filled title band across the top of the current page, redrawn on
    /// every page.
    fn band(&mut self) {
        let layer = self.layer();
        layer.set_fill_color(Color::Rgb(Rgb::new(0.0, 0.2, 0.4, None)));
        let rect = Rect::new(Mm(0.0), Mm(PAGE_H - BAND_H), Mm(PAGE_W), Mm(PAGE_H))
            .with_mode(PaintMode::Fill);
        layer.add_rect(rect);

        layer.set_fill_color(Color::Rgb(Rgb::new(1.0, 1.0, 1.0, None)));
        let tw = self.band_title.len() as f32 * BAND_TITLE_SIZE * CHAR_W;
        let x = ((PAGE_W - tw) / 2.0).max(MARGIN_LEFT);
        layer.use_text(
            self.band_title.clone(),
            BAND_TITLE_SIZE,
            Mm(x),
            Mm(PAGE_H - BAND_H / 2.0 - 2.0),
            &self.font_bold,
        );
        layer.set_fill_color(Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None)));
    }

    fn new_page(&mut self) {
        let (page, layer) = self.doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "Layer");
        self.current_page = page;
        self.current_layer = layer;
        self.y = MARGIN_TOP;
        self.band();
    }

    fn usable_height(&self) -> f32 {
        PAGE_H - MARGIN_TOP - MARGIN_BOTTOM
    }

    fn remaining(&self) -> f32 {
        PAGE_H - MARGIN_BOTTOM - self.y
    }

    fn ensure_space(&mut self, needed: f32) {
        if self.y + needed > PAGE_H - MARGIN_BOTTOM {
            self.new_page();
        }
    }

    fn text(&self, s: &str, size: f32, bold: bool) {
        let font = if bold { &self.font_bold } else { &self.font };
        self.layer()
            .use_text(s, size, Mm(MARGIN_LEFT), Mm(self.pdf_y()), font);
    }

    fn to_bytes(self) -> Result<Vec<u8>> {
        let mut buf = BufWriter::new(Vec::new());
        self.doc
            .save(&mut buf)
            .map_err(|e| AppError::Pdf(format!("{e:?}")))?;
        buf.into_inner().map_err(|e| AppError::Pdf(e.to_string()))
    }
}

/// Render the report cards. Each card's height is estimated up front from
/// its wrapped line count; a card that does not fit the remaining page goes
/// to a fresh page, and a card taller than a whole page degrades to
/// line-by-line flow with per-line breaks.
pub fn render_report(blocks: &[ReportBlock], reviewer_name: &str) -> Result<Vec<u8>> {
    let band_title = format!("Acompanhamento - Controladoria ({reviewer_name})");
    let mut pdf = PdfWriter::new(&band_title)?;

    for block in blocks {
        let title_lines = wrap_line(&latin1(&block.title), TITLE_SIZE);
        let body_lines: Vec<String> = block
            .lines
            .iter()
            .flat_map(|line| wrap_line(&latin1(line), FONT_SIZE))
            .collect();

        let card_h = title_lines.len() as f32 * TITLE_LINE_H + body_lines.len() as f32 * LINE_H;
        if card_h > pdf.remaining() && card_h <= pdf.usable_height() {
            pdf.new_page();
        }

        for line in &title_lines {
            pdf.ensure_space(TITLE_LINE_H);
            pdf.text(line, TITLE_SIZE, true);
            pdf.y += TITLE_LINE_H;
        }
        for line in &body_lines {
            pdf.ensure_space(LINE_H);
            pdf.text(line, FONT_SIZE, false);
            pdf.y += LINE_H;
        }
        pdf.y += CARD_GAP;
    }

    pdf.to_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(title: &str, lines: &[&str]) -> ReportBlock {
        ReportBlock {
            title: title.to_string(),
            lines: lines.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_latin1_mapping() {
        assert_eq!(
            latin1("Acompanhamento – Controladoria"),
            "Acompanhamento - Controladoria"
        );
        assert_eq!(latin1("Conciliações"), "Conciliações");
        assert_eq!(latin1("ok ✓"), "ok ?");
    }

    #[test]
    fn test_wrap_line_short_text_single_line() {
        assert_eq!(wrap_line("Saldo atual: R$ 100,00", FONT_SIZE).len(), 1);
        assert_eq!(wrap_line("", FONT_SIZE).len(), 1);
    }

    #[test]
    fn test_wrap_line_long_text_wraps() {
        let long = "palavra ".repeat(60);
        assert!(wrap_line(&long, FONT_SIZE).len() > 1);
    }

    #[test]
    fn test_wrap_line_respects_hard_newlines() {
        let lines = wrap_line("linha um\nlinha dois", FONT_SIZE);
        assert_eq!(lines, vec!["linha um", "linha dois"]);
    }

    #[test]
    fn test_render_produces_pdf() {
        let blocks = vec![block(
            "Financeiro - Itaú",
            &["Responsável: Carlos", "Extrato bancário: confere"],
        )];
        let bytes = render_report(&blocks, "Pedrina Freitas").unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_render_empty_block_list_still_valid() {
        let bytes = render_report(&[], "Ana").unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    fn page_count(bytes: &[u8]) -> usize {
        let text = String::from_utf8_lossy(bytes);
        // "/Type/Pages" (the page tree node) also matches the prefix. lopdf
        // serializes names without a space after "/Type".
        let count = |pat: &str| text.matches(pat).count();
        (count("/Type /Page") + count("/Type/Page"))
            - (count("/Type /Pages") + count("/Type/Pages"))
    }

    #[test]
    fn test_render_paginates_long_content() {
        let observations = format!("Observações: {}", "pendência grave ".repeat(400));
        let blocks: Vec<ReportBlock> = (0..20)
            .map(|i| block(&format!("Setor {i}"), &[observations.as_str()]))
            .collect();
        let bytes = render_report(&blocks, "Ana").unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert!(page_count(&bytes) >= 2);

        let small = render_report(&blocks[..1], "Ana").unwrap();
        assert!(page_count(&small) >= 1);
        assert!(page_count(&bytes) > page_count(&small));
    }
}
