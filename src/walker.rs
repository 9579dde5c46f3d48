//! Content walker – traverses the styled node tree in document order and
//! drives the flow renderer.
//!
//! The walker owns per-conversion state the components share: the effective
//! style stack for unstyled text nodes, the ordered-list counter stack, and
//! the pending item-number prefix. Every sibling renders behind an error
//! boundary: one malformed node is logged and skipped, never the document.

use crate::assets::{self, AssetStore};
use crate::content::{Content, Element, FloatSide, ImageElement, ListElement, Style};
use crate::floats::NodeProbe;
use crate::flow::{Flow, FlowOptions};
use crate::fonts::{FontHandle, FontManager};
use crate::linebreak::Fragment;
use crate::lists::{bullet_marker, ordered_prefix, CounterStack};
use crate::table;
use crate::writer::DocumentWriter;

/// Render one flow region of styled content into a writer.
///
/// Assets referenced by the tree are settled before any layout runs, and
/// every font embedded in the registry is registered with the writer up
/// front. Returns the final cursor (x, y) so a caller can chain further
/// flow regions into the same document.
pub fn render_flow<W: DocumentWriter>(
    nodes: &[Content],
    writer: &mut W,
    fonts: &FontManager,
    assets: &mut AssetStore,
    options: FlowOptions,
) -> (f32, f32) {
    assets.preload(nodes);

    for (family, variant) in fonts.embedded_keys() {
        let handle = FontHandle::Embedded {
            family: family.clone(),
            variant,
        };
        if let Some(bytes) = fonts.font_bytes(&handle) {
            if let Err(err) = writer.register_font(&family, variant, bytes) {
                // Fatal to this one registration only; resolution falls
                // through the normal family chain.
                log::warn!("font registration for {family:?} failed: {err}");
            }
        }
    }

    let flow = Flow::new(writer, fonts, options);
    let mut walker = Walker {
        flow,
        assets: &*assets,
        counters: CounterStack::new(),
        styles: vec![Style::default()],
        list_kinds: Vec::new(),
        pending_prefix: None,
        list_indent: 0.0,
    };
    walker.render_children(nodes);
    walker.flow.finish()
}

struct Walker<'a, W: DocumentWriter> {
    flow: Flow<'a, W>,
    assets: &'a AssetStore,
    counters: CounterStack,
    /// Effective-style stack; text nodes take the top. Also how overrides
    /// (a forced family inside a code-like span) reach nested text.
    styles: Vec<Style>,
    /// Enclosing list kinds, innermost last (`true` = ordered).
    list_kinds: Vec<bool>,
    /// "{n}. " awaiting the item's first non-empty text node.
    pending_prefix: Option<String>,
    /// Indent in pt accumulated from list nesting.
    list_indent: f32,
}

fn is_inline(node: &Content) -> bool {
    matches!(
        node,
        Content::Text(_) | Content::Span(_) | Content::LineBreak
    )
}

impl<'a, W: DocumentWriter> Walker<'a, W> {
    fn effective_style(&self) -> Style {
        self.styles.last().cloned().unwrap_or_default()
    }

    /// Render a sibling run: inline nodes accumulate in the paragraph
    /// buffer, block-level nodes force a flush first. Returns the first
    /// flushed line's origin for marker placement.
    fn render_children(&mut self, children: &[Content]) -> Option<(f32, f32)> {
        let mut first_origin: Option<(f32, f32)> = None;
        for child in children {
            if !is_inline(child) {
                if let Some(origin) = self.flow.flush_block() {
                    first_origin.get_or_insert(origin);
                }
            }
            self.dispatch_guarded(child);
        }
        if let Some(origin) = self.flow.flush_block() {
            first_origin.get_or_insert(origin);
        }
        first_origin
    }

    /// Per-node error boundary: a failed node is logged and skipped, with
    /// counters, style stack, and the paragraph buffer rolled back so its
    /// siblings render normally.
    fn dispatch_guarded(&mut self, node: &Content) {
        let counter_depth = self.counters.depth();
        let style_depth = self.styles.len();
        let list_depth = self.list_kinds.len();
        if let Err(err) = self.dispatch(node) {
            log::warn!("skipping node after render failure: {err}");
            self.counters.truncate_to(counter_depth);
            self.styles.truncate(style_depth);
            self.list_kinds.truncate(list_depth);
            self.flow.abort_block();
        }
    }

    fn dispatch(&mut self, node: &Content) -> crate::error::Result<()> {
        match node {
            Content::Text(text) => {
                self.queue_text(text);
                Ok(())
            }
            Content::Span(e) => {
                self.styles.push(e.style.clone());
                for child in &e.children {
                    self.dispatch_guarded(child);
                }
                self.styles.pop();
                Ok(())
            }
            Content::LineBreak => {
                let style = self.effective_style();
                self.flow.queue_separator(&style);
                Ok(())
            }
            Content::Block(e) => {
                self.render_block(e);
                Ok(())
            }
            Content::List(list) => {
                self.render_list(list);
                Ok(())
            }
            Content::ListItem(e) => {
                self.render_list_item(e);
                Ok(())
            }
            Content::Table(t) => {
                self.flow.open_block(&t.style);
                let result = table::render(&mut self.flow, t);
                self.flow.close_block(&t.style);
                result
            }
            Content::Image(img) => {
                self.render_image(img);
                Ok(())
            }
            Content::Rule(e) => {
                self.flow.open_block(&e.style);
                self.flow.draw_rule(&e.style);
                self.flow.close_block(&e.style);
                Ok(())
            }
            Content::Header(e) => {
                let fragments = self.inline_fragments(e);
                self.flow.add_header(fragments);
                Ok(())
            }
            Content::Footer(e) => {
                let fragments = self.inline_fragments(e);
                self.flow.add_footer(fragments);
                Ok(())
            }
        }
    }

    fn queue_text(&mut self, text: &str) {
        let style = self.effective_style();
        if !text.trim().is_empty() {
            // The item number prefixes only the first non-empty text node;
            // later text (after a nested sub-list, say) is not renumbered.
            if let Some(prefix) = self.pending_prefix.take() {
                self.flow.queue_text(&prefix, &style);
            }
        }
        self.flow.queue_text(text, &style);
    }

    fn render_block(&mut self, e: &Element) {
        if e.style.float != FloatSide::None {
            if let (Some(w), Some(h)) = (e.style.width, e.style.height) {
                self.render_floated_box(e, w, h);
                return;
            }
            // Height unknowable in one pass; fall through to normal flow.
        }
        self.flow.open_block(&e.style);
        self.styles.push(e.style.clone());
        self.render_children(&e.children);
        self.styles.pop();
        self.flow.close_block(&e.style);
    }

    /// A floated block with explicit dimensions renders as a fixed box: its
    /// inline text flows inside the box, and the surrounding flow shrinks
    /// around it exactly like a floated image.
    fn render_floated_box(&mut self, e: &Element, width_px: f32, height_px: f32) {
        let style = &e.style;
        let w = self.flow.px(width_px);
        let h = self.flow.px(height_px);
        self.flow.sweep_for_node(NodeProbe {
            clears: style.clear,
            min_width: w,
        });

        let saved = self.flow.cursor;
        let x = match style.float {
            FloatSide::Right => {
                saved.x + saved.width - w - self.flow.px(style.margin.right)
            }
            _ => saved.x + self.flow.indent() + self.flow.px(style.margin.left),
        };
        let top = saved.y + self.flow.px(style.margin.top);
        if !style.background.is_transparent() {
            self.flow.writer.draw_rect(x, top, w, h, style.background);
        }

        // Flow the box's inline content inside its own rectangle.
        self.flow.cursor = crate::flow::Cursor {
            x: x + self.flow.px(style.padding.left),
            y: top + self.flow.px(style.padding.top),
            width: (w - self.flow.px(style.padding.horizontal())).max(1.0),
        };
        self.styles.push(style.clone());
        for child in &e.children {
            if is_inline(child) {
                self.dispatch_guarded(child);
            }
        }
        self.flow.flush_block();
        self.styles.pop();
        self.flow.cursor = saved;

        let box_w = w + self.flow.px(style.margin.horizontal());
        let box_h = h + self.flow.px(style.margin.top + style.margin.bottom);
        self.flow
            .floats
            .place(&mut self.flow.cursor, style.float, box_w, box_h);
        self.flow.mark_page_dirty();
    }

    fn render_list(&mut self, list: &ListElement) {
        self.flow.open_block(&list.style);
        if list.ordered {
            self.counters.enter_ordered();
        }
        self.list_kinds.push(list.ordered);

        let indent_delta = self.flow.px(list.style.padding.left);
        self.list_indent += indent_delta;
        self.flow.set_indent(self.list_indent);

        self.styles.push(list.style.clone());
        self.render_children(&list.children);
        self.styles.pop();

        self.list_indent -= indent_delta;
        self.flow.set_indent(self.list_indent);
        self.list_kinds.pop();
        if list.ordered {
            self.counters.exit_ordered();
        }
        self.flow.close_block(&list.style);
    }

    fn render_list_item(&mut self, e: &Element) {
        let ordered = self.list_kinds.last().copied().unwrap_or(false);
        // A page break zeroes the flow indent; each item re-applies its
        // list's nesting indent.
        self.flow.set_indent(self.list_indent);
        self.flow.open_block(&e.style);
        self.styles.push(e.style.clone());

        // An enclosing item's still-unconsumed prefix must survive a nested
        // item; this item's own prefix dies with it.
        let enclosing_prefix = self.pending_prefix.take();
        if ordered {
            if let Some(n) = self.counters.next() {
                self.pending_prefix = Some(ordered_prefix(n));
            }
        }

        let origin = self.render_children(&e.children);
        self.pending_prefix = enclosing_prefix;

        if !ordered {
            // The bullet hangs off the first rendered line's actual origin,
            // not the block's nominal edge.
            if let Some(origin) = origin {
                let size = self.flow.text_style(&e.style).size;
                let marker = bullet_marker(origin, size);
                self.flow
                    .writer
                    .draw_circle(marker.cx, marker.cy, marker.radius, e.style.color);
            }
        }

        self.styles.pop();
        self.flow.close_block(&e.style);
    }

    fn render_image(&mut self, img: &ImageElement) {
        let style = &img.style;
        let max_width = (self.flow.cursor.width - self.flow.indent()).max(1.0);
        let (w, h) =
            assets::resolve_dimensions(img, self.assets, self.flow.opts.px_to_pt, max_width);

        if style.float == FloatSide::None {
            self.flow.open_block(style);
            // Geometry is known, so an arriving image can prove starvation.
            self.flow.sweep_for_node(NodeProbe {
                clears: false,
                min_width: w,
            });
            self.flow.place_image(&img.src, w, h, style);
            self.flow.close_block(style);
        } else {
            // A float never advances y; its margins live inside the float
            // box that place_image registers.
            self.flow.sweep_for_node(NodeProbe {
                clears: style.clear,
                min_width: w,
            });
            self.flow.place_image(&img.src, w, h, style);
        }
    }

    /// Flatten a header/footer element to styled fragments; these regions
    /// re-render on every page, so they carry data instead of tree refs.
    fn inline_fragments(&mut self, e: &Element) -> Vec<Fragment> {
        let mut out = Vec::new();
        self.styles.push(e.style.clone());
        self.collect_inline(&e.children, &mut out);
        self.styles.pop();
        out
    }

    fn collect_inline(&mut self, children: &[Content], out: &mut Vec<Fragment>) {
        for child in children {
            match child {
                Content::Text(text) => {
                    let style = self.effective_style();
                    out.push(Fragment::new(text.clone(), self.flow.text_style(&style)));
                }
                Content::Span(e) => {
                    self.styles.push(e.style.clone());
                    self.collect_inline(&e.children, out);
                    self.styles.pop();
                }
                Content::LineBreak => {
                    let style = self.effective_style();
                    out.push(Fragment::separator(self.flow.text_style(&style)));
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{ColumnSpec, Element, TableElement, TextAlign};
    use crate::ops::{DrawOp, RecordingWriter};

    fn text_block(text: &str) -> Content {
        Content::Block(Element::with_children(
            Style::default(),
            vec![Content::Text(text.to_string())],
        ))
    }

    fn item(text: &str) -> Content {
        Content::ListItem(Element::with_children(
            Style::default(),
            vec![Content::Text(text.to_string())],
        ))
    }

    fn render(nodes: &[Content]) -> RecordingWriter {
        let mut writer = RecordingWriter::a4();
        let fonts = FontManager::new();
        let mut assets = AssetStore::new();
        render_flow(nodes, &mut writer, &fonts, &mut assets, FlowOptions::default());
        writer
    }

    #[test]
    fn nested_ordered_numbering() {
        // [A, B, [C, D], E] must number 1, 2, (1, 2), 3.
        let nested = Content::List(ListElement {
            style: Style::default(),
            ordered: true,
            children: vec![item("C"), item("D")],
        });
        let list = Content::List(ListElement {
            style: Style::default(),
            ordered: true,
            children: vec![item("A"), item("B"), nested, item("E")],
        });

        let writer = render(&[list]);
        let text = writer.all_text();
        for expected in ["1. A", "2. B", "1. C", "2. D", "3. E"] {
            assert!(text.contains(expected), "missing {expected:?} in {text:?}");
        }
        assert!(!text.contains("4."), "counter leaked: {text:?}");
    }

    #[test]
    fn text_after_nested_sublist_is_not_renumbered() {
        let nested = Content::List(ListElement {
            style: Style::default(),
            ordered: true,
            children: vec![item("inner")],
        });
        let outer = Content::List(ListElement {
            style: Style::default(),
            ordered: true,
            children: vec![Content::ListItem(Element::with_children(
                Style::default(),
                vec![
                    Content::Text("head".to_string()),
                    nested,
                    Content::Text("tail".to_string()),
                ],
            ))],
        });
        let writer = render(&[outer]);
        let text = writer.all_text();
        assert!(text.contains("1. head"), "got {text:?}");
        assert!(text.contains("1. inner"), "got {text:?}");
        assert!(!text.contains("2. tail"), "tail was renumbered: {text:?}");
        assert!(text.contains("tail"));
    }

    #[test]
    fn unordered_items_draw_circle_markers() {
        let list = Content::List(ListElement {
            style: Style::default(),
            ordered: false,
            children: vec![item("one"), item("two")],
        });
        let writer = render(&[list]);
        let circles = writer.doc.pages[0]
            .ops
            .iter()
            .filter(|op| matches!(op, DrawOp::Circle { .. }))
            .count();
        assert_eq!(circles, 2);
    }

    #[test]
    fn failed_node_does_not_abort_siblings() {
        // A degenerate table between two paragraphs: zero-width columns.
        let bad_table = Content::Table(TableElement {
            style: Style::default(),
            columns: Some(vec![ColumnSpec {
                label: "x".to_string(),
                width: Some(0.0),
            }]),
            rows: vec![vec!["cell".to_string()]],
            repeat_header: false,
        });
        let writer = render(&[text_block("before"), bad_table, text_block("after")]);
        let text = writer.all_text();
        assert!(text.contains("before"));
        assert!(text.contains("after"));
        assert!(!text.contains("cell"));
    }

    #[test]
    fn spans_override_text_style() {
        let mut bold = Style::default();
        bold.weight = crate::content::FontWeight::Bold;
        let para = Content::Block(Element::with_children(
            Style::default(),
            vec![
                Content::Text("plain ".to_string()),
                Content::Span(Element::with_children(
                    bold,
                    vec![Content::Text("strong".to_string())],
                )),
            ],
        ));
        let writer = render(&[para]);
        let bold_runs: Vec<_> = writer.doc.pages[0]
            .ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, bold: true, .. } => Some(text.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(bold_runs, vec!["strong"]);
    }

    #[test]
    fn centered_text_is_offset() {
        let mut centered = Style::default();
        centered.align = TextAlign::Center;
        let writer = render(&[Content::Block(Element::with_children(
            centered,
            vec![Content::Text("mid".to_string())],
        ))]);
        match &writer.doc.pages[0].ops[0] {
            DrawOp::Text { x, .. } => assert!(*x > 100.0, "expected centered x, got {x}"),
            other => panic!("expected text op, got {other:?}"),
        }
    }
}
