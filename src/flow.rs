//! Flow renderer – vertical flow of blocks and lines inside the page frame.
//!
//! Owns the cursor and the current block's fragment buffer. Handles collapsed
//! block spacing, line commits, mid-paragraph page breaks, float sweeps after
//! every committed line or image, and the repeating header/footer regions.

use crate::content::{Color, FloatSide, Sides, Style};
use crate::floats::{FloatCoordinator, NodeProbe};
use crate::fonts::FontManager;
use crate::linebreak::{break_lines, flatten, Fragment, Line, TextStyle};
use crate::writer::{DocumentWriter, PageFrame, TextRun, PAGE_NUMBER_TOKEN, TOTAL_PAGES_TOKEN};

/// Position tolerance when deciding whether the cursor sits at the frame top.
const EPS: f32 = 0.01;

/// Fill used for the placeholder box of an image that failed to load.
const PLACEHOLDER_FILL: Color = Color {
    r: 0.88,
    g: 0.88,
    b: 0.88,
    a: 1.0,
};

/// The flow's writing position. Single logical owner at a time; y never
/// decreases within one page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cursor {
    pub x: f32,
    pub y: f32,
    /// Available line width from x, after float shrinkage.
    pub width: f32,
}

/// Engine configuration: unit conversion and page margins.
#[derive(Debug, Clone)]
pub struct FlowOptions {
    /// Base font size in pt; a style's `font_scale` multiplies this.
    pub base_font_pt: f32,
    /// Conversion factor from style px to document pt.
    pub px_to_pt: f32,
    /// Page margins in pt.
    pub margin: Sides,
    /// Fixed spacing added when reserving header/footer space.
    pub region_gap: f32,
}

impl Default for FlowOptions {
    fn default() -> Self {
        Self {
            base_font_pt: 12.0,
            px_to_pt: 0.75,
            margin: Sides::uniform(40.0),
            region_gap: 8.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    Header,
    Footer,
}

/// A header/footer re-rendered on every page, stored as pre-flattened
/// fragments (data, not a closure).
#[derive(Debug, Clone)]
pub struct RepeatRegion {
    pub kind: RegionKind,
    pub fragments: Vec<Fragment>,
}

/// One flow region over a document writer. Construct fresh per conversion;
/// cursor, buffer, and watch predicates are never shared.
pub struct Flow<'a, W: DocumentWriter> {
    pub writer: &'a mut W,
    pub fonts: &'a FontManager,
    pub opts: FlowOptions,
    pub frame: PageFrame,
    pub cursor: Cursor,
    pub floats: FloatCoordinator,
    fragments: Vec<Fragment>,
    block_style: Option<Style>,
    /// Prior block's margin-bottom (px), for margin collapsing.
    prev_margin_bottom: f32,
    /// Extra left offset applied to every committed line; resets to zero
    /// across a page break.
    indent: f32,
    regions: Vec<RepeatRegion>,
    page_dirty: bool,
}

impl<'a, W: DocumentWriter> Flow<'a, W> {
    pub fn new(writer: &'a mut W, fonts: &'a FontManager, opts: FlowOptions) -> Self {
        let (page_width, page_height) = writer.page_size();
        let frame = PageFrame::new(
            page_width,
            page_height,
            opts.margin.top,
            opts.margin.right,
            opts.margin.bottom,
            opts.margin.left,
        );
        let cursor = Cursor {
            x: frame.content_left(),
            y: frame.top(),
            width: frame.content_width(),
        };
        Self {
            writer,
            fonts,
            opts,
            frame,
            cursor,
            floats: FloatCoordinator::new(),
            fragments: Vec::new(),
            block_style: None,
            prev_margin_bottom: 0.0,
            indent: 0.0,
            regions: Vec::new(),
            page_dirty: false,
        }
    }

    /// Convert a style px length to pt.
    pub fn px(&self, v: f32) -> f32 {
        v * self.opts.px_to_pt
    }

    /// Resolve a block/inline style into the fragment-level text style.
    pub fn text_style(&self, style: &Style) -> TextStyle {
        TextStyle {
            family: style.family.clone(),
            size: self.opts.base_font_pt * style.font_scale,
            weight: style.weight,
            font_style: style.font_style,
            color: style.color,
            align: style.align,
            line_height: style.line_height,
        }
    }

    pub fn set_indent(&mut self, indent: f32) {
        self.indent = indent;
    }

    pub fn indent(&self) -> f32 {
        self.indent
    }

    /// Width currently available for line breaking.
    fn line_width(&self) -> f32 {
        (self.cursor.width - self.indent).max(1.0)
    }

    // -----------------------------------------------------------------------
    // Block boundaries
    // -----------------------------------------------------------------------

    /// Enter a block: honor page-break-before and `clear`, sweep float
    /// predicates against the incoming node, then apply collapsed spacing.
    pub fn open_block(&mut self, style: &Style) {
        if style.page_break_before && self.page_dirty {
            self.new_page();
        }
        let probe = NodeProbe {
            clears: style.clear,
            min_width: 0.0,
        };
        self.floats.sweep(&mut self.cursor, Some(&probe));

        let spacing_before =
            (style.margin.top - self.prev_margin_bottom).max(0.0) + style.padding.top;
        self.cursor.y += self.px(spacing_before);
        self.prev_margin_bottom = style.margin.bottom;
        self.block_style = Some(style.clone());
    }

    /// Leave a block: apply spacing-after and drop any unflushed fragments.
    /// Blocks nest, so the closing style is the caller's to name.
    pub fn close_block(&mut self, style: &Style) {
        self.cursor.y += self.px(style.margin.bottom + style.padding.bottom);
        self.block_style = None;
        self.fragments.clear();
    }

    /// Drop a half-open block without applying spacing; used when a node
    /// failed mid-render and the flow must stay consistent for its siblings.
    pub fn abort_block(&mut self) {
        self.block_style = None;
        self.fragments.clear();
    }

    pub fn queue_text(&mut self, text: &str, style: &Style) {
        let resolved = self.text_style(style);
        self.fragments.push(Fragment::new(text, resolved));
    }

    pub fn queue_separator(&mut self, style: &Style) {
        let resolved = self.text_style(style);
        self.fragments.push(Fragment::separator(resolved));
    }

    /// Break and commit the buffered fragments as lines.
    ///
    /// Returns the page-relative (x, baseline-y) of the first emitted line,
    /// which is what list markers hang off.
    pub fn flush_block(&mut self) -> Option<(f32, f32)> {
        let frags = std::mem::take(&mut self.fragments);
        if frags.is_empty() {
            return None;
        }
        let background = self
            .block_style
            .as_ref()
            .map(|s| s.background)
            .filter(|c| !c.is_transparent());

        let mut lines = break_lines(&frags, self.line_width(), self.fonts);
        let mut first_origin: Option<(f32, f32)> = None;
        let mut i = 0;
        while i < lines.len() {
            let advance = lines[i].advance;

            // Mid-paragraph page break: never on an otherwise-empty page,
            // and the break itself adds no extra advance.
            if self.cursor.y > self.frame.top() + EPS
                && self.cursor.y + advance > self.frame.bottom_limit()
            {
                self.new_page();
                let rest = flatten(&lines[i..]);
                lines = break_lines(&rest, self.line_width(), self.fonts);
                i = 0;
                if lines.is_empty() {
                    break;
                }
                continue;
            }

            let line = lines[i].clone();
            if let Some(bg) = background {
                let (bg_x, bg_y, bg_w) =
                    (self.cursor.x + self.indent, self.cursor.y, self.line_width());
                self.writer.draw_rect(bg_x, bg_y, bg_w, advance, bg);
            }
            self.cursor.y += advance;
            let origin_x = self.cursor.x + self.indent + line.align_offset;
            self.commit_line(&line, origin_x, self.cursor.y);
            self.page_dirty = true;
            if first_origin.is_none() && !line.spans.is_empty() {
                first_origin = Some((origin_x, self.cursor.y));
            }

            // Sweep after every committed line; a geometry change means the
            // remaining lines were broken against a stale width.
            if self.floats.sweep(&mut self.cursor, None) && i + 1 < lines.len() {
                let rest = flatten(&lines[i + 1..]);
                let mut rebroken = break_lines(&rest, self.line_width(), self.fonts);
                lines.truncate(i + 1);
                lines.append(&mut rebroken);
            }
            i += 1;
        }
        first_origin
    }

    /// Draw one line's spans at the given origin, widening inter-word gaps
    /// for justified lines.
    fn commit_line(&mut self, line: &Line, x: f32, baseline: f32) {
        let mut x_run = x;
        for span in &line.spans {
            let handle = self
                .fonts
                .resolve(&span.style.family, span.style.weight, span.style.font_style);
            if line.word_gap_extra > 0.0 {
                let space = self.fonts.measure(" ", &handle, span.style.size);
                for (j, word) in span.text.split(' ').enumerate() {
                    if j > 0 {
                        x_run += space + line.word_gap_extra;
                    }
                    if word.is_empty() {
                        continue;
                    }
                    self.writer.draw_text(
                        x_run,
                        baseline,
                        &TextRun {
                            text: word.to_string(),
                            font: handle.clone(),
                            size: span.style.size,
                            color: span.style.color,
                        },
                    );
                    x_run += self.fonts.measure(word, &handle, span.style.size);
                }
            } else {
                if !span.text.is_empty() {
                    self.writer.draw_text(
                        x_run,
                        baseline,
                        &TextRun {
                            text: span.text.clone(),
                            font: handle.clone(),
                            size: span.style.size,
                            color: span.style.color,
                        },
                    );
                }
                x_run += self.fonts.measure(&span.text, &handle, span.style.size);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Pages
    // -----------------------------------------------------------------------

    /// Close the current page and start the next one. Margins snap back to
    /// base, repeating regions re-render (growing their reservations), and
    /// indentation resets. Floats never span pages: the frame geometry is
    /// rebuilt from scratch and pending watchers are dropped.
    pub fn new_page(&mut self) {
        self.writer.add_page();
        self.frame.reset_margins();
        self.indent = 0.0;
        self.floats = FloatCoordinator::new();
        self.cursor.x = self.frame.content_left();
        self.cursor.width = self.frame.content_width();
        self.render_regions();
        self.cursor.y = self.frame.top();
        self.page_dirty = false;
    }

    /// Break the page if `height` cannot fit below the cursor. No-op on an
    /// otherwise-empty page (oversized content renders where it is).
    pub fn ensure_room(&mut self, height: f32) {
        if self.cursor.y > self.frame.top() + EPS
            && self.cursor.y + height > self.frame.bottom_limit()
        {
            self.new_page();
        }
    }

    /// Sweep float predicates for an arriving node (clear / starvation).
    pub fn sweep_for_node(&mut self, probe: NodeProbe) -> bool {
        self.floats.sweep(&mut self.cursor, Some(&probe))
    }

    /// True while nothing has been drawn into the current page's body.
    pub fn at_page_top(&self) -> bool {
        self.cursor.y <= self.frame.top() + EPS
    }

    /// Record that the current page carries body content; page-break checks
    /// only fire on dirty pages.
    pub fn mark_page_dirty(&mut self) {
        self.page_dirty = true;
    }

    // -----------------------------------------------------------------------
    // Repeating regions (headers / footers)
    // -----------------------------------------------------------------------

    /// Register a header region and render it immediately at the current
    /// top margin, reserving its space.
    pub fn add_header(&mut self, fragments: Vec<Fragment>) {
        let region = RepeatRegion {
            kind: RegionKind::Header,
            fragments,
        };
        self.render_region(&region);
        self.regions.push(region);
        if self.cursor.y < self.frame.top() {
            self.cursor.y = self.frame.top();
        }
    }

    /// Register a footer region; symmetric to [`Flow::add_header`] on the
    /// bottom margin.
    pub fn add_footer(&mut self, fragments: Vec<Fragment>) {
        let region = RepeatRegion {
            kind: RegionKind::Footer,
            fragments,
        };
        self.render_region(&region);
        self.regions.push(region);
    }

    fn render_regions(&mut self) {
        let regions = self.regions.clone();
        for region in &regions {
            self.render_region(region);
        }
    }

    fn render_region(&mut self, region: &RepeatRegion) {
        // The running page number resolves now; the total-page sentinel
        // stays in the emitted text until the document is finished.
        let page_no = self.writer.page_count().to_string();
        let frags: Vec<Fragment> = region
            .fragments
            .iter()
            .map(|f| Fragment::new(f.text.replace(PAGE_NUMBER_TOKEN, &page_no), f.style.clone()))
            .collect();
        let lines = break_lines(&frags, self.frame.content_width(), self.fonts);
        let height: f32 = lines.iter().map(|l| l.advance).sum();

        match region.kind {
            RegionKind::Header => {
                let mut y = self.frame.top();
                for line in &lines {
                    y += line.advance;
                    let x = self.frame.content_left() + line.align_offset;
                    self.commit_line(line, x, y);
                }
                self.frame.reserve_top(height + self.opts.region_gap);
            }
            RegionKind::Footer => {
                let mut y = self.frame.bottom_limit() - height;
                for line in &lines {
                    y += line.advance;
                    let x = self.frame.content_left() + line.align_offset;
                    self.commit_line(line, x, y);
                }
                self.frame.reserve_bottom(height + self.opts.region_gap);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Non-text content
    // -----------------------------------------------------------------------

    /// Place an image box of the given pt dimensions. Floated images shrink
    /// the frame and register watch predicates; in-flow images advance the
    /// cursor. A failed load draws a placeholder at the same geometry.
    pub fn place_image(&mut self, src: &str, width: f32, height: f32, style: &Style) {
        match style.float {
            FloatSide::Left | FloatSide::Right => {
                let x = match style.float {
                    FloatSide::Right => {
                        self.cursor.x + self.cursor.width
                            - width
                            - self.px(style.margin.right)
                    }
                    _ => self.cursor.x + self.indent + self.px(style.margin.left),
                };
                let top = self.cursor.y + self.px(style.margin.top);
                self.draw_image_or_placeholder(src, x, top, width, height);
                let box_w = width + self.px(style.margin.horizontal());
                let box_h = height + self.px(style.margin.top + style.margin.bottom);
                self.floats
                    .place(&mut self.cursor, style.float, box_w, box_h);
            }
            FloatSide::None => {
                self.ensure_room(height);
                let x = self.cursor.x + self.indent;
                self.draw_image_or_placeholder(src, x, self.cursor.y, width, height);
                self.cursor.y += height;
            }
        }
        self.page_dirty = true;
        self.floats.sweep(&mut self.cursor, None);
    }

    fn draw_image_or_placeholder(&mut self, src: &str, x: f32, y: f32, w: f32, h: f32) {
        if let Err(err) = self.writer.draw_image(src, x, y, w, h) {
            log::warn!("drawing placeholder box for image: {err}");
            self.writer.draw_rect(x, y, w, h, PLACEHOLDER_FILL);
        }
    }

    /// Horizontal rule across the available width.
    pub fn draw_rule(&mut self, style: &Style) {
        let thickness = 0.75;
        let gap = self.px(3.0);
        self.ensure_room(gap * 2.0 + thickness);
        let y = self.cursor.y + gap;
        let x = self.cursor.x + self.indent;
        let width = self.line_width();
        self.writer
            .draw_line((x, y), (x + width, y), thickness, style.color);
        self.cursor.y = y + gap + thickness;
        self.page_dirty = true;
    }

    /// Finish the flow: resolve the total-page sentinel and hand the cursor
    /// back so another flow region can chain after this one.
    pub fn finish(&mut self) -> (f32, f32) {
        let total = self.writer.page_count().to_string();
        self.writer.substitute_token(TOTAL_PAGES_TOKEN, &total);
        (self.cursor.x, self.cursor.y)
    }
}
