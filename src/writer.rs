//! Document-writer boundary – the trait the flow engine draws through.
//!
//! The engine produces an ordered sequence of primitive invocations per page
//! and never sees how a backend assembles them into a file. Coordinates are
//! top-left-origin points; text y is the baseline.

use crate::content::Color;
use crate::error::Result;
use crate::fonts::{FontHandle, VariantKey};

/// Running page-number token, resolved while a footer/header renders.
pub const PAGE_NUMBER_TOKEN: &str = "{page}";
/// Total-page-count sentinel, substituted once after the whole document.
pub const TOTAL_PAGES_TOKEN: &str = "{pages}";

/// One styled text run, parameterized by an already-selected font handle.
#[derive(Debug, Clone)]
pub struct TextRun {
    pub text: String,
    pub font: FontHandle,
    /// Font size in pt.
    pub size: f32,
    pub color: Color,
}

/// Backend the engine renders into.
pub trait DocumentWriter {
    /// Page width/height in pt.
    fn page_size(&self) -> (f32, f32);

    /// Number of pages so far (≥ 1; the current page is the last).
    fn page_count(&self) -> usize;

    /// Start a new page; subsequent draws land on it.
    fn add_page(&mut self);

    /// Draw a text run with its baseline at (x, y).
    fn draw_text(&mut self, x: f32, y: f32, run: &TextRun);

    fn draw_line(&mut self, from: (f32, f32), to: (f32, f32), width: f32, color: Color);

    /// Filled rectangle from its top-left corner.
    fn draw_rect(&mut self, x: f32, y: f32, width: f32, height: f32, fill: Color);

    /// Filled circle (list bullets).
    fn draw_circle(&mut self, cx: f32, cy: f32, radius: f32, fill: Color);

    /// Place an image box; `src` identifies bytes the backend has access to
    /// (the engine pre-loads assets before layout).
    fn draw_image(&mut self, src: &str, x: f32, y: f32, width: f32, height: f32) -> Result<()>;

    /// Register embeddable font bytes under a family/variant key.
    fn register_font(&mut self, family: &str, variant: VariantKey, bytes: &[u8]) -> Result<()>;

    /// Replace every occurrence of `token` in already-emitted text, across
    /// all pages. Used once, after rendering, for the total-page sentinel.
    fn substitute_token(&mut self, token: &str, value: &str);
}

/// A page's content rectangle. Base margins come from configuration; the
/// current top/bottom grow as header/footer space is reserved and snap back
/// to base on every new page.
#[derive(Debug, Clone)]
pub struct PageFrame {
    pub page_width: f32,
    pub page_height: f32,
    base_top: f32,
    base_bottom: f32,
    pub margin_left: f32,
    pub margin_right: f32,
    pub margin_top: f32,
    pub margin_bottom: f32,
}

impl PageFrame {
    pub fn new(page_width: f32, page_height: f32, top: f32, right: f32, bottom: f32, left: f32) -> Self {
        Self {
            page_width,
            page_height,
            base_top: top,
            base_bottom: bottom,
            margin_left: left,
            margin_right: right,
            margin_top: top,
            margin_bottom: bottom,
        }
    }

    pub fn content_width(&self) -> f32 {
        self.page_width - self.margin_left - self.margin_right
    }

    pub fn content_left(&self) -> f32 {
        self.margin_left
    }

    /// Top edge of the content area (current, including reservations).
    pub fn top(&self) -> f32 {
        self.margin_top
    }

    /// Lowest y a line may end at.
    pub fn bottom_limit(&self) -> f32 {
        self.page_height - self.margin_bottom
    }

    pub fn reserve_top(&mut self, height: f32) {
        self.margin_top += height;
    }

    pub fn reserve_bottom(&mut self, height: f32) {
        self.margin_bottom += height;
    }

    /// Drop reservations at a page boundary; repeating regions re-reserve.
    pub fn reset_margins(&mut self) {
        self.margin_top = self.base_top;
        self.margin_bottom = self.base_bottom;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_reservation_and_reset() {
        let mut frame = PageFrame::new(595.0, 842.0, 40.0, 40.0, 40.0, 40.0);
        assert_eq!(frame.content_width(), 515.0);
        assert_eq!(frame.bottom_limit(), 802.0);

        frame.reserve_top(30.0);
        frame.reserve_bottom(20.0);
        assert_eq!(frame.top(), 70.0);
        assert_eq!(frame.bottom_limit(), 782.0);

        frame.reset_margins();
        assert_eq!(frame.top(), 40.0);
        assert_eq!(frame.bottom_limit(), 802.0);
    }
}
