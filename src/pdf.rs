//! PDF backend – a [`DocumentWriter`] over `printpdf` (v0.8 ops-based API).
//!
//! Buffers one op list per page and assembles the document on `finish`.
//! Builtin generic families map onto the PDF base-14 fonts; embedded fonts
//! are registered from raw sfnt bytes. Flow coordinates are top-left-origin;
//! PDF's origin is bottom-left, so everything flips here and nowhere else.

use std::collections::HashMap;

use printpdf::*;

use crate::assets::parse_data_uri;
use crate::content;
use crate::error::{Error, Result};
use crate::fonts::{FontHandle, Generic, VariantKey};
use crate::writer::{DocumentWriter, TextRun};

/// A registered XObject with the pixel dimensions of the source image.
struct ImageResource {
    xobj_id: XObjectId,
    px_width: u32,
    px_height: u32,
}

/// printpdf-backed document writer.
pub struct PdfWriter {
    doc: PdfDocument,
    page_width: f32,
    page_height: f32,
    pages: Vec<Vec<Op>>,
    embedded: HashMap<(String, VariantKey), FontId>,
    images: HashMap<String, Option<ImageResource>>,
    warnings: Vec<PdfWarnMsg>,
}

impl PdfWriter {
    pub fn new(title: &str, page_width: f32, page_height: f32) -> Self {
        Self {
            doc: PdfDocument::new(title),
            page_width,
            page_height,
            pages: vec![Vec::new()],
            embedded: HashMap::new(),
            images: HashMap::new(),
            warnings: Vec::new(),
        }
    }

    /// A4 portrait: 595.28 × 841.89 pt.
    pub fn a4(title: &str) -> Self {
        Self::new(title, 595.28, 841.89)
    }

    fn current(&mut self) -> &mut Vec<Op> {
        self.pages.last_mut().expect("writer always has a page")
    }

    /// Assemble and serialize the PDF.
    pub fn finish(mut self) -> Vec<u8> {
        let page_w = Mm(self.page_width * 0.352778);
        let page_h = Mm(self.page_height * 0.352778);
        let pages: Vec<PdfPage> = self
            .pages
            .drain(..)
            .map(|ops| PdfPage::new(page_w, page_h, ops))
            .collect();
        self.doc.with_pages(pages);
        self.doc.save(&PdfSaveOptions::default(), &mut Vec::new())
    }

    fn builtin_for(generic: Generic, variant: VariantKey) -> BuiltinFont {
        match (generic, variant.is_bold(), variant.is_italic()) {
            (Generic::Serif, false, false) => BuiltinFont::TimesRoman,
            (Generic::Serif, true, false) => BuiltinFont::TimesBold,
            (Generic::Serif, false, true) => BuiltinFont::TimesItalic,
            (Generic::Serif, true, true) => BuiltinFont::TimesBoldItalic,
            (Generic::SansSerif, false, false) => BuiltinFont::Helvetica,
            (Generic::SansSerif, true, false) => BuiltinFont::HelveticaBold,
            (Generic::SansSerif, false, true) => BuiltinFont::HelveticaOblique,
            (Generic::SansSerif, true, true) => BuiltinFont::HelveticaBoldOblique,
            (Generic::Monospace, false, false) => BuiltinFont::Courier,
            (Generic::Monospace, true, false) => BuiltinFont::CourierBold,
            (Generic::Monospace, false, true) => BuiltinFont::CourierOblique,
            (Generic::Monospace, true, true) => BuiltinFont::CourierBoldOblique,
        }
    }

    /// Embedded font id for a handle, with regular-variant fallback.
    fn embedded_for(&self, family: &str, variant: VariantKey) -> Option<FontId> {
        let key = (family.to_ascii_lowercase(), variant);
        self.embedded
            .get(&key)
            .or_else(|| {
                self.embedded
                    .get(&(key.0.clone(), VariantKey::Regular))
            })
            .cloned()
    }

    /// Decode + register an image source on first use.
    fn image_resource(&mut self, src: &str) -> Result<&ImageResource> {
        if !self.images.contains_key(src) {
            let loaded = self.load_image(src);
            if let Err(err) = &loaded {
                log::warn!("image registration failed: {err}");
            }
            self.images.insert(src.to_string(), loaded.ok());
        }
        self.images
            .get(src)
            .and_then(|r| r.as_ref())
            .ok_or_else(|| Error::AssetLoad {
                src: src.to_string(),
                reason: "not embeddable".to_string(),
            })
    }

    fn load_image(&mut self, src: &str) -> Result<ImageResource> {
        let bytes = parse_data_uri(src)?;
        let decoded = ::image::load_from_memory(&bytes).map_err(|e| Error::AssetLoad {
            src: src.to_string(),
            reason: format!("decode error: {e}"),
        })?;
        let raw =
            RawImage::decode_from_bytes(&bytes, &mut self.warnings).map_err(|e| Error::AssetLoad {
                src: src.to_string(),
                reason: format!("embed error: {e}"),
            })?;
        Ok(ImageResource {
            xobj_id: self.doc.add_image(&raw),
            px_width: decoded.width(),
            px_height: decoded.height(),
        })
    }
}

/// Convert a UTF-8 string to raw Windows-1252 bytes wrapped in a String so
/// printpdf writes them unchanged into the stream (builtin fonts use
/// WinAnsiEncoding, one byte per glyph).
fn to_winlatin(s: &str) -> String {
    let bytes: Vec<u8> = s
        .chars()
        .map(|c| match c {
            '\u{20AC}' => 0x80, // euro
            '\u{201A}' => 0x82, // single low-9 quote
            '\u{201E}' => 0x84, // double low-9 quote
            '\u{2026}' => 0x85, // ellipsis
            '\u{2018}' => 0x91, // left single quote
            '\u{2019}' => 0x92, // right single quote
            '\u{201C}' => 0x93, // left double quote
            '\u{201D}' => 0x94, // right double quote
            '\u{2022}' => 0x95, // bullet
            '\u{2013}' => 0x96, // en-dash
            '\u{2014}' => 0x97, // em-dash
            '\u{2122}' => 0x99, // trademark
            '\u{00A0}' => 0x20, // non-breaking space -> space
            c if (c as u32) < 256 => c as u8,
            _ => b'?',
        })
        .collect();
    // SAFETY: intentionally non-UTF-8 for the 0x80-0x9F range; printpdf
    // passes these bytes straight through, decoded by WinAnsiEncoding.
    #[allow(unsafe_code)]
    unsafe {
        String::from_utf8_unchecked(bytes)
    }
}

fn rgb(color: content::Color) -> Color {
    Color::Rgb(Rgb {
        r: color.r,
        g: color.g,
        b: color.b,
        icc_profile: None,
    })
}

fn point(x: f32, y: f32) -> LinePoint {
    LinePoint {
        p: Point { x: Pt(x), y: Pt(y) },
        bezier: false,
    }
}

fn control(x: f32, y: f32) -> LinePoint {
    LinePoint {
        p: Point { x: Pt(x), y: Pt(y) },
        bezier: true,
    }
}

impl DocumentWriter for PdfWriter {
    fn page_size(&self) -> (f32, f32) {
        (self.page_width, self.page_height)
    }

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn add_page(&mut self) {
        self.pages.push(Vec::new());
    }

    fn draw_text(&mut self, x: f32, y: f32, run: &TextRun) {
        let pdf_y = self.page_height - y;
        let fill = rgb(run.color);
        let size = Pt(run.size);

        let embedded = match &run.font {
            FontHandle::Embedded { family, variant } | FontHandle::Named { family, variant } => {
                self.embedded_for(family, *variant)
            }
            FontHandle::Builtin { .. } => None,
        };

        let ops = self.current();
        ops.push(Op::StartTextSection);
        ops.push(Op::SetTextCursor {
            pos: Point {
                x: Pt(x),
                y: Pt(pdf_y),
            },
        });
        ops.push(Op::SetFillColor { col: fill });

        match embedded {
            Some(font) => {
                ops.push(Op::SetFontSize {
                    size,
                    font: font.clone(),
                });
                ops.push(Op::WriteText {
                    items: vec![TextItem::Text(run.text.clone())],
                    font,
                });
            }
            None => {
                // A named family nobody embedded falls back to the default
                // serif, completing the resolution chain at the backend.
                let font = match &run.font {
                    FontHandle::Builtin { generic, variant } => {
                        Self::builtin_for(*generic, *variant)
                    }
                    other => Self::builtin_for(Generic::Serif, other.variant()),
                };
                ops.push(Op::SetFontSizeBuiltinFont { size, font });
                ops.push(Op::WriteTextBuiltinFont {
                    items: vec![TextItem::Text(to_winlatin(&run.text))],
                    font,
                });
            }
        }
        ops.push(Op::EndTextSection);
    }

    fn draw_line(&mut self, from: (f32, f32), to: (f32, f32), width: f32, color: content::Color) {
        let h = self.page_height;
        let ops_line = Line {
            points: vec![point(from.0, h - from.1), point(to.0, h - to.1)],
            is_closed: false,
        };
        let ops = self.current();
        ops.push(Op::SetOutlineColor { col: rgb(color) });
        ops.push(Op::SetOutlineThickness { pt: Pt(width) });
        ops.push(Op::DrawLine { line: ops_line });
    }

    fn draw_rect(&mut self, x: f32, y: f32, width: f32, height: f32, fill: content::Color) {
        let pdf_top = self.page_height - y;
        let pdf_bottom = pdf_top - height;
        let polygon = Polygon {
            rings: vec![PolygonRing {
                points: vec![
                    point(x, pdf_bottom),
                    point(x + width, pdf_bottom),
                    point(x + width, pdf_top),
                    point(x, pdf_top),
                ],
            }],
            mode: PaintMode::Fill,
            winding_order: WindingOrder::NonZero,
        };
        let ops = self.current();
        ops.push(Op::SetFillColor { col: rgb(fill) });
        ops.push(Op::DrawPolygon { polygon });
    }

    fn draw_circle(&mut self, cx: f32, cy: f32, radius: f32, fill: content::Color) {
        // Four cubic segments; 0.5523 is the standard circle kappa.
        let k = radius * 0.5523;
        let y = self.page_height - cy;
        let polygon = Polygon {
            rings: vec![PolygonRing {
                points: vec![
                    point(cx + radius, y),
                    control(cx + radius, y + k),
                    control(cx + k, y + radius),
                    point(cx, y + radius),
                    control(cx - k, y + radius),
                    control(cx - radius, y + k),
                    point(cx - radius, y),
                    control(cx - radius, y - k),
                    control(cx - k, y - radius),
                    point(cx, y - radius),
                    control(cx + k, y - radius),
                    control(cx + radius, y - k),
                    point(cx + radius, y),
                ],
            }],
            mode: PaintMode::Fill,
            winding_order: WindingOrder::NonZero,
        };
        let ops = self.current();
        ops.push(Op::SetFillColor { col: rgb(fill) });
        ops.push(Op::DrawPolygon { polygon });
    }

    fn draw_image(&mut self, src: &str, x: f32, y: f32, width: f32, height: f32) -> Result<()> {
        let page_height = self.page_height;
        let (xobj_id, px_w, px_h) = {
            let res = self.image_resource(src)?;
            (res.xobj_id.clone(), res.px_width, res.px_height)
        };
        // At dpi 72 printpdf renders 1 px = 1 pt, so scale = pt / px.
        let scale_x = if px_w > 0 { width / px_w as f32 } else { 1.0 };
        let scale_y = if px_h > 0 { height / px_h as f32 } else { 1.0 };
        self.current().push(Op::UseXobject {
            id: xobj_id,
            transform: XObjectTransform {
                translate_x: Some(Pt(x)),
                translate_y: Some(Pt(page_height - y - height)),
                dpi: Some(72.0),
                scale_x: Some(scale_x),
                scale_y: Some(scale_y),
                rotate: None,
            },
        });
        Ok(())
    }

    fn register_font(&mut self, family: &str, variant: VariantKey, bytes: &[u8]) -> Result<()> {
        let parsed = ParsedFont::from_bytes(bytes, 0, &mut self.warnings).ok_or_else(|| {
            Error::FontFormat(format!("backend rejected font bytes for {family:?}"))
        })?;
        let id = self.doc.add_font(&parsed);
        self.embedded
            .insert((family.to_ascii_lowercase(), variant), id);
        Ok(())
    }

    fn substitute_token(&mut self, token: &str, value: &str) {
        // Builtin-font text was transcoded to WinAnsi bytes; tokens are
        // plain ASCII, so replacement stays byte-safe either way.
        let win_token = to_winlatin(token);
        let win_value = to_winlatin(value);
        for ops in &mut self.pages {
            for op in ops.iter_mut() {
                match op {
                    Op::WriteText { items, .. } => {
                        for item in items.iter_mut() {
                            if let TextItem::Text(text) = item {
                                if text.contains(token) {
                                    *text = text.replace(token, value);
                                }
                            }
                        }
                    }
                    Op::WriteTextBuiltinFont { items, .. } => {
                        for item in items.iter_mut() {
                            if let TextItem::Text(text) = item {
                                if text.contains(&win_token) {
                                    *text = text.replace(&win_token, &win_value);
                                }
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Color as CssColor;

    #[test]
    fn empty_document_is_valid_pdf() {
        let writer = PdfWriter::a4("test");
        let bytes = writer.finish();
        assert!(bytes.len() > 100, "PDF too small: {} bytes", bytes.len());
        assert_eq!(&bytes[0..5], b"%PDF-");
    }

    #[test]
    fn pages_accumulate() {
        let mut writer = PdfWriter::a4("test");
        assert_eq!(writer.page_count(), 1);
        writer.add_page();
        writer.draw_rect(10.0, 10.0, 50.0, 20.0, CssColor::BLACK);
        assert_eq!(writer.page_count(), 2);
        let bytes = writer.finish();
        assert_eq!(&bytes[0..5], b"%PDF-");
    }

    #[test]
    fn winlatin_maps_typographic_chars() {
        let s = to_winlatin("a\u{2022}b\u{2014}c");
        let bytes = s.as_bytes();
        assert_eq!(bytes, &[b'a', 0x95, b'b', 0x97, b'c']);
    }
}
