//! Recorded drawing commands – the serializable intermediate representation
//! between the flow engine and a concrete backend. This is the "frozen"
//! structure that encodes exactly what lands on each page, and the writer of
//! choice for tests.

use serde::{Deserialize, Serialize};

use crate::content::Color;
use crate::error::{Error, Result};
use crate::fonts::{FontHandle, Generic, VariantKey};
use crate::writer::{DocumentWriter, TextRun};

/// One absolute-position drawing primitive. Coordinates are top-left-origin
/// pt; text y is the baseline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DrawOp {
    Text {
        x: f32,
        y: f32,
        text: String,
        font_family: String,
        bold: bool,
        italic: bool,
        size: f32,
        color: [f32; 4],
    },
    Line {
        from: (f32, f32),
        to: (f32, f32),
        width: f32,
        color: [f32; 4],
    },
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        fill: [f32; 4],
    },
    Circle {
        cx: f32,
        cy: f32,
        radius: f32,
        fill: [f32; 4],
    },
    Image {
        src: String,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedPage {
    pub index: usize,
    pub ops: Vec<DrawOp>,
}

/// A complete recorded document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedDocument {
    pub page_width: f32,
    pub page_height: f32,
    pub pages: Vec<RecordedPage>,
}

impl RecordedDocument {
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Writer(e.to_string()))
    }
}

fn describe_font(handle: &FontHandle) -> (String, bool, bool) {
    let variant = handle.variant();
    let family = match handle {
        FontHandle::Embedded { family, .. } | FontHandle::Named { family, .. } => family.clone(),
        FontHandle::Builtin { generic, .. } => match generic {
            Generic::Serif => "serif".to_string(),
            Generic::SansSerif => "sans-serif".to_string(),
            Generic::Monospace => "monospace".to_string(),
        },
    };
    (family, variant.is_bold(), variant.is_italic())
}

fn rgba(c: Color) -> [f32; 4] {
    [c.r, c.g, c.b, c.a]
}

/// In-memory writer that records every primitive. Backing for tests and for
/// callers that want the frozen command stream instead of a file format.
pub struct RecordingWriter {
    pub doc: RecordedDocument,
    /// Fonts registered for embedding: (family, variant, byte length).
    pub fonts: Vec<(String, VariantKey, usize)>,
    /// Sources that should fail to draw, for exercising placeholder paths.
    pub fail_sources: Vec<String>,
}

impl RecordingWriter {
    pub fn new(page_width: f32, page_height: f32) -> Self {
        Self {
            doc: RecordedDocument {
                page_width,
                page_height,
                pages: vec![RecordedPage {
                    index: 0,
                    ops: Vec::new(),
                }],
            },
            fonts: Vec::new(),
            fail_sources: Vec::new(),
        }
    }

    /// A4 portrait: 210 × 297 mm = 595.28 × 841.89 pt.
    pub fn a4() -> Self {
        Self::new(595.28, 841.89)
    }

    fn current(&mut self) -> &mut RecordedPage {
        self.doc
            .pages
            .last_mut()
            .expect("a recording always has at least one page")
    }

    /// All text op strings on one page, in emit order.
    pub fn page_texts(&self, page: usize) -> Vec<&str> {
        self.doc.pages[page]
            .ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Concatenated text of the whole document, pages in order.
    pub fn all_text(&self) -> String {
        let mut out = String::new();
        for page in &self.doc.pages {
            for op in &page.ops {
                if let DrawOp::Text { text, .. } = op {
                    if !out.is_empty() {
                        out.push(' ');
                    }
                    out.push_str(text);
                }
            }
        }
        out
    }
}

impl DocumentWriter for RecordingWriter {
    fn page_size(&self) -> (f32, f32) {
        (self.doc.page_width, self.doc.page_height)
    }

    fn page_count(&self) -> usize {
        self.doc.pages.len()
    }

    fn add_page(&mut self) {
        let index = self.doc.pages.len();
        self.doc.pages.push(RecordedPage {
            index,
            ops: Vec::new(),
        });
    }

    fn draw_text(&mut self, x: f32, y: f32, run: &TextRun) {
        let (font_family, bold, italic) = describe_font(&run.font);
        let op = DrawOp::Text {
            x,
            y,
            text: run.text.clone(),
            font_family,
            bold,
            italic,
            size: run.size,
            color: rgba(run.color),
        };
        self.current().ops.push(op);
    }

    fn draw_line(&mut self, from: (f32, f32), to: (f32, f32), width: f32, color: Color) {
        let op = DrawOp::Line {
            from,
            to,
            width,
            color: rgba(color),
        };
        self.current().ops.push(op);
    }

    fn draw_rect(&mut self, x: f32, y: f32, width: f32, height: f32, fill: Color) {
        let op = DrawOp::Rect {
            x,
            y,
            width,
            height,
            fill: rgba(fill),
        };
        self.current().ops.push(op);
    }

    fn draw_circle(&mut self, cx: f32, cy: f32, radius: f32, fill: Color) {
        let op = DrawOp::Circle {
            cx,
            cy,
            radius,
            fill: rgba(fill),
        };
        self.current().ops.push(op);
    }

    fn draw_image(&mut self, src: &str, x: f32, y: f32, width: f32, height: f32) -> Result<()> {
        if self.fail_sources.iter().any(|s| s == src) {
            return Err(Error::AssetLoad {
                src: src.to_string(),
                reason: "marked as failing".to_string(),
            });
        }
        let op = DrawOp::Image {
            src: src.to_string(),
            x,
            y,
            width,
            height,
        };
        self.current().ops.push(op);
        Ok(())
    }

    fn register_font(&mut self, family: &str, variant: VariantKey, bytes: &[u8]) -> Result<()> {
        self.fonts.push((family.to_string(), variant, bytes.len()));
        Ok(())
    }

    fn substitute_token(&mut self, token: &str, value: &str) {
        for page in &mut self.doc.pages {
            for op in &mut page.ops {
                if let DrawOp::Text { text, .. } = op {
                    if text.contains(token) {
                        *text = text.replace(token, value);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::FontHandle;

    #[test]
    fn records_in_emit_order_and_roundtrips() {
        let mut w = RecordingWriter::new(600.0, 800.0);
        w.draw_text(
            10.0,
            20.0,
            &TextRun {
                text: "hello".to_string(),
                font: FontHandle::Builtin {
                    generic: Generic::Serif,
                    variant: VariantKey::Regular,
                },
                size: 12.0,
                color: Color::BLACK,
            },
        );
        w.add_page();
        w.draw_rect(0.0, 0.0, 10.0, 10.0, Color::WHITE);

        assert_eq!(w.page_count(), 2);
        assert_eq!(w.page_texts(0), vec!["hello"]);

        let json = w.doc.to_json();
        let parsed = RecordedDocument::from_json(&json).unwrap();
        assert_eq!(parsed.pages.len(), 2);
        assert!((parsed.page_width - 600.0).abs() < 0.01);
    }

    #[test]
    fn token_substitution_is_global() {
        let mut w = RecordingWriter::new(600.0, 800.0);
        let run = TextRun {
            text: "Page 1 of {pages}".to_string(),
            font: FontHandle::Builtin {
                generic: Generic::Serif,
                variant: VariantKey::Regular,
            },
            size: 10.0,
            color: Color::BLACK,
        };
        w.draw_text(0.0, 0.0, &run);
        w.add_page();
        w.draw_text(0.0, 0.0, &run);
        w.substitute_token("{pages}", "2");
        assert_eq!(w.page_texts(0), vec!["Page 1 of 2"]);
        assert_eq!(w.page_texts(1), vec!["Page 1 of 2"]);
    }

    #[test]
    fn failing_sources_error_out() {
        let mut w = RecordingWriter::new(600.0, 800.0);
        w.fail_sources.push("broken".to_string());
        assert!(w.draw_image("broken", 0.0, 0.0, 10.0, 10.0).is_err());
        assert!(w.draw_image("fine", 0.0, 0.0, 10.0, 10.0).is_ok());
    }
}
