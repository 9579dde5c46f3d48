//! Line breaker – converts a queue of styled text fragments into
//! width-bounded lines using metric-based measurement.
//!
//! Fragments are the atomic styling unit: a run of text under one resolved
//! style. The breaker greedily packs fragment widths, splits an overflowing
//! fragment at its last fitting whitespace boundary, and finally applies
//! per-line alignment (left/center/right/justify).

use crate::content::{Color, FontStyle, FontWeight, TextAlign};
use crate::fonts::FontManager;

/// Explicit line-separator marker; a fragment holding exactly this forces an
/// unconditional break and survives whitespace purging verbatim.
pub const LINE_SEPARATOR: char = '\u{2028}';

/// Resolved text style carried by every fragment. Sizes are absolute pt.
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub family: String,
    pub size: f32,
    pub weight: FontWeight,
    pub font_style: FontStyle,
    pub color: Color,
    pub align: TextAlign,
    /// Line height as a multiple of the font size.
    pub line_height: f32,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            family: String::new(),
            size: 12.0,
            weight: FontWeight::Normal,
            font_style: FontStyle::Normal,
            color: Color::BLACK,
            align: TextAlign::Left,
            line_height: 1.15,
        }
    }
}

/// A run of text sharing one resolved style. Immutable once queued.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub text: String,
    pub style: TextStyle,
}

impl Fragment {
    pub fn new(text: impl Into<String>, style: TextStyle) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }

    pub fn separator(style: TextStyle) -> Self {
        Self {
            text: LINE_SEPARATOR.to_string(),
            style,
        }
    }

    pub fn is_separator(&self) -> bool {
        self.text.len() == LINE_SEPARATOR.len_utf8() && self.text.starts_with(LINE_SEPARATOR)
    }
}

/// One styled piece of a produced line.
#[derive(Debug, Clone)]
pub struct Span {
    pub text: String,
    pub style: TextStyle,
}

/// A finished line: ordered spans plus derived alignment data.
#[derive(Debug, Clone)]
pub struct Line {
    pub spans: Vec<Span>,
    /// Measured text width in pt.
    pub width: f32,
    /// Leading x offset from alignment (right/center).
    pub align_offset: f32,
    /// Extra width added to every inter-word gap (justify only).
    pub word_gap_extra: f32,
    /// Vertical advance for this line in pt.
    pub advance: f32,
    /// True when the line was closed by an explicit separator.
    pub forced: bool,
}

impl Line {
    /// Concatenated text of all spans.
    pub fn text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }

    /// Number of inter-word gaps (single spaces) across the whole line.
    pub fn gap_count(&self) -> usize {
        self.text().matches(' ').count()
    }

    fn empty() -> Self {
        Self {
            spans: Vec::new(),
            width: 0.0,
            align_offset: 0.0,
            word_gap_extra: 0.0,
            advance: 0.0,
            forced: false,
        }
    }
}

fn measure(fonts: &FontManager, text: &str, style: &TextStyle) -> f32 {
    let handle = fonts.resolve(&style.family, style.weight, style.font_style);
    fonts.measure(text, &handle, style.size)
}

fn line_advance(style: &TextStyle) -> f32 {
    (style.size * style.line_height).max(style.size)
}

// ---------------------------------------------------------------------------
// Whitespace purge
// ---------------------------------------------------------------------------

/// Collapse whitespace the way flowed text renders it: internal runs become
/// one space, only the very first and very last fragment of the queue are
/// trimmed at their outer edge, separator markers pass through verbatim.
pub fn purge_whitespace(frags: &[Fragment]) -> Vec<Fragment> {
    let mut out: Vec<Fragment> = Vec::new();
    for frag in frags {
        if frag.is_separator() {
            out.push(frag.clone());
            continue;
        }
        let mut text = collapse_runs(&frag.text);
        // A run spanning a fragment boundary still collapses to one space.
        if let Some(prev) = out.last() {
            if !prev.is_separator() && prev.text.ends_with(' ') && text.starts_with(' ') {
                text.remove(0);
            }
        }
        out.push(Fragment::new(text, frag.style.clone()));
    }

    if let Some(first) = out.first_mut() {
        if !first.is_separator() {
            first.text = first.text.trim_start().to_string();
        }
    }
    if let Some(last) = out.last_mut() {
        if !last.is_separator() {
            last.text = last.text.trim_end().to_string();
        }
    }
    out.retain(|f| f.is_separator() || !f.text.is_empty());
    out
}

fn collapse_runs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_run = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !in_run {
                out.push(' ');
            }
            in_run = true;
        } else {
            out.push(ch);
            in_run = false;
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Breaking
// ---------------------------------------------------------------------------

/// Where an overflowing fragment can be cut against the remaining width.
enum Fit<'t> {
    /// The whole text fits.
    All,
    /// `head` fits; `tail` continues on the next line (break space consumed).
    Split { head: &'t str, tail: &'t str },
    /// Not even the first break boundary fits.
    None,
}

fn fit_at_boundary<'t>(
    fonts: &FontManager,
    text: &'t str,
    style: &TextStyle,
    available: f32,
) -> Fit<'t> {
    if measure(fonts, text, style) <= available {
        return Fit::All;
    }
    let mut best: Option<usize> = None;
    for (idx, _) in text.match_indices(' ') {
        if measure(fonts, &text[..idx], style) <= available {
            best = Some(idx);
        } else {
            break;
        }
    }
    match best {
        Some(idx) => Fit::Split {
            head: &text[..idx],
            tail: &text[idx + 1..],
        },
        None => Fit::None,
    }
}

/// Break a purged-or-raw fragment queue into lines bounded by `max_width`.
///
/// The returned lines carry alignment offsets and justify gap widths; commit
/// order is the produced order.
pub fn break_lines(frags: &[Fragment], max_width: f32, fonts: &FontManager) -> Vec<Line> {
    let frags = purge_whitespace(frags);
    let mut lines: Vec<Line> = Vec::new();
    let mut cur = Line::empty();
    let mut cur_width = 0.0f32;

    let mut close = |cur: &mut Line, cur_width: &mut f32, lines: &mut Vec<Line>, forced: bool| {
        trim_line_edges(cur);
        cur.forced = forced;
        lines.push(std::mem::replace(cur, Line::empty()));
        *cur_width = 0.0;
    };

    for frag in &frags {
        if frag.is_separator() {
            if cur.spans.is_empty() {
                // A blank forced line still advances by its own height.
                cur.advance = line_advance(&frag.style);
            }
            close(&mut cur, &mut cur_width, &mut lines, true);
            continue;
        }

        let mut text = frag.text.as_str();
        loop {
            let available = max_width - cur_width;
            match fit_at_boundary(fonts, text, &frag.style, available) {
                Fit::All => {
                    cur_width += measure(fonts, text, &frag.style);
                    push_span(&mut cur, text, &frag.style);
                    break;
                }
                Fit::Split { head, tail } => {
                    // A fragment-leading space on an empty line is layout
                    // noise, not a break.
                    if head.is_empty() && cur.spans.is_empty() {
                        text = tail;
                        continue;
                    }
                    cur_width += measure(fonts, head, &frag.style);
                    push_span(&mut cur, head, &frag.style);
                    close(&mut cur, &mut cur_width, &mut lines, false);
                    // The running width resets to whatever the final piece
                    // measures, which the next loop turn recomputes.
                    text = tail;
                }
                Fit::None => {
                    if !cur.spans.is_empty() {
                        // Wrap first, then retry against the full width.
                        close(&mut cur, &mut cur_width, &mut lines, false);
                        continue;
                    }
                    // A single unbreakable token longer than the line is
                    // emitted verbatim, alone.
                    let cut = text.find(' ');
                    let (token, rest) = match cut {
                        Some(idx) => (&text[..idx], &text[idx + 1..]),
                        None => (text, ""),
                    };
                    push_span(&mut cur, token, &frag.style);
                    close(&mut cur, &mut cur_width, &mut lines, false);
                    if rest.is_empty() {
                        break;
                    }
                    text = rest;
                }
            }
        }
    }
    if !cur.spans.is_empty() {
        trim_line_edges(&mut cur);
        lines.push(cur);
    }

    apply_alignment(&mut lines, max_width, fonts);
    lines
}

fn push_span(line: &mut Line, text: &str, style: &TextStyle) {
    if text.is_empty() {
        return;
    }
    line.advance = line.advance.max(line_advance(style));
    // Merge adjacent spans with identical styles; keeps commit output tight.
    if let Some(last) = line.spans.last_mut() {
        if last.style == *style {
            last.text.push_str(text);
            return;
        }
    }
    line.spans.push(Span {
        text: text.to_string(),
        style: style.clone(),
    });
}

/// Lines never begin or end with layout whitespace; the purge only trims the
/// queue's outer edges, so fragment-boundary spaces can land on a break.
fn trim_line_edges(line: &mut Line) {
    if let Some(first) = line.spans.first_mut() {
        let trimmed = first.text.trim_start();
        if trimmed.len() != first.text.len() {
            first.text = trimmed.to_string();
        }
    }
    if let Some(last) = line.spans.last_mut() {
        let trimmed = last.text.trim_end();
        if trimmed.len() != last.text.len() {
            last.text = trimmed.to_string();
        }
    }
    line.spans.retain(|s| !s.text.is_empty());
}

/// Derive each line's alignment offset / justify gap from its measured
/// width. A paragraph's final line and separator-forced lines get no added
/// gap width.
fn apply_alignment(lines: &mut [Line], max_width: f32, fonts: &FontManager) {
    let count = lines.len();
    for (i, line) in lines.iter_mut().enumerate() {
        line.width = line
            .spans
            .iter()
            .map(|s| measure(fonts, &s.text, &s.style))
            .sum();
        let leftover = (max_width - line.width).max(0.0);
        let align = line
            .spans
            .first()
            .map(|s| s.style.align)
            .unwrap_or(TextAlign::Left);
        match align {
            TextAlign::Left => {}
            TextAlign::Right => line.align_offset = leftover,
            TextAlign::Center => line.align_offset = leftover / 2.0,
            TextAlign::Justify => {
                let is_last = i + 1 == count || line.forced;
                let gaps = line.gap_count();
                if !is_last && gaps > 0 {
                    line.word_gap_extra = leftover / gaps as f32;
                }
            }
        }
    }
}

/// Turn not-yet-committed lines back into a fragment queue so they can be
/// re-broken after a frame-width change. Break points consumed a single
/// space, which is what gets re-inserted between lines; separator-forced
/// lines get their marker back.
pub fn flatten(lines: &[Line]) -> Vec<Fragment> {
    let mut frags: Vec<Fragment> = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        for span in &line.spans {
            frags.push(Fragment::new(span.text.clone(), span.style.clone()));
        }
        if line.forced {
            let style = line
                .spans
                .last()
                .map(|s| s.style.clone())
                .unwrap_or_default();
            frags.push(Fragment::separator(style));
        } else if i + 1 < lines.len() {
            if let Some(last) = frags.last_mut() {
                if !last.is_separator() {
                    last.text.push(' ');
                }
            }
        }
    }
    frags
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style(size: f32) -> TextStyle {
        TextStyle {
            family: "serif".to_string(),
            size,
            ..TextStyle::default()
        }
    }

    fn fonts() -> FontManager {
        FontManager::new()
    }

    // Heuristic serif width: 0.5 × size per char, so at size 10 every char
    // is 5 pt wide. A 100 pt line fits 20 chars.

    #[test]
    fn concat_equals_purged_input() {
        let frags = vec![
            Fragment::new("  The   quick ", style(10.0)),
            Fragment::new(" brown  fox jumps over the lazy dog  ", style(10.0)),
        ];
        let purged: String = purge_whitespace(&frags)
            .iter()
            .map(|f| f.text.as_str())
            .collect();
        let lines = break_lines(&frags, 100.0, &fonts());
        assert!(lines.len() > 1);
        let joined = lines
            .iter()
            .map(|l| l.text())
            .collect::<Vec<_>>()
            .join(" ");
        assert_eq!(joined, purged);
        assert_eq!(purged, "The quick brown fox jumps over the lazy dog");
    }

    #[test]
    fn no_line_exceeds_max_width() {
        let frags = vec![Fragment::new(
            "alpha beta gamma delta epsilon zeta eta theta",
            style(10.0),
        )];
        let f = fonts();
        for line in break_lines(&frags, 80.0, &f) {
            assert!(
                line.width <= 80.0 + 0.01,
                "line {:?} measures {}",
                line.text(),
                line.width
            );
        }
    }

    #[test]
    fn unbreakable_token_emitted_alone() {
        let frags = vec![Fragment::new(
            "hi incomprehensibilities end",
            style(10.0),
        )];
        let lines = break_lines(&frags, 60.0, &fonts());
        let texts: Vec<String> = lines.iter().map(|l| l.text()).collect();
        assert_eq!(texts, vec!["hi", "incomprehensibilities", "end"]);
        // The long token alone may overflow; nothing else may.
        assert!(lines[1].width > 60.0);
        assert!(lines[0].width <= 60.0 && lines[2].width <= 60.0);
    }

    #[test]
    fn separator_forces_break_and_survives_purge() {
        let mut s = style(10.0);
        s.align = TextAlign::Left;
        let frags = vec![
            Fragment::new("one", s.clone()),
            Fragment::separator(s.clone()),
            Fragment::new("two", s),
        ];
        let lines = break_lines(&frags, 500.0, &fonts());
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text(), "one");
        assert!(lines[0].forced);
        assert_eq!(lines[1].text(), "two");
    }

    #[test]
    fn right_and_center_offsets() {
        let mut right = style(10.0);
        right.align = TextAlign::Right;
        let lines = break_lines(&[Fragment::new("abcd", right)], 100.0, &fonts());
        // 4 chars × 5 pt = 20 pt wide; offset = 80.
        assert!((lines[0].align_offset - 80.0).abs() < 0.01);

        let mut center = style(10.0);
        center.align = TextAlign::Center;
        let lines = break_lines(&[Fragment::new("abcd", center)], 100.0, &fonts());
        assert!((lines[0].align_offset - 40.0).abs() < 0.01);
    }

    #[test]
    fn justify_fills_available_width_except_last_line() {
        let mut s = style(10.0);
        s.align = TextAlign::Justify;
        let frags = vec![Fragment::new("aaa bbb ccc ddd eee fff ggg hhh", s)];
        let f = fonts();
        let lines = break_lines(&frags, 100.0, &f);
        assert!(lines.len() >= 2);
        for line in &lines[..lines.len() - 1] {
            let gaps = line.gap_count() as f32;
            assert!(gaps >= 2.0);
            let filled = line.width + gaps * line.word_gap_extra;
            assert!(
                (filled - 100.0).abs() < 0.01,
                "expected full justification, got {filled}"
            );
        }
        assert_eq!(lines.last().unwrap().word_gap_extra, 0.0);
    }

    #[test]
    fn mixed_styles_keep_fragment_boundaries() {
        let plain = style(10.0);
        let mut bold = style(10.0);
        bold.weight = FontWeight::Bold;
        let frags = vec![
            Fragment::new("normal ", plain.clone()),
            Fragment::new("bold", bold),
            Fragment::new(" tail", plain),
        ];
        let lines = break_lines(&frags, 500.0, &fonts());
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].spans.len(), 3);
        assert_eq!(lines[0].text(), "normal bold tail");
    }

    #[test]
    fn flatten_and_rebreak_is_stable() {
        let frags = vec![Fragment::new(
            "one two three four five six seven eight",
            style(10.0),
        )];
        let f = fonts();
        let narrow = break_lines(&frags, 80.0, &f);
        assert!(narrow.len() > 1);
        let wide = break_lines(&flatten(&narrow), 500.0, &f);
        assert_eq!(wide.len(), 1);
        assert_eq!(wide[0].text(), "one two three four five six seven eight");
    }

    #[test]
    fn advance_uses_largest_span() {
        let small = style(10.0);
        let big = style(20.0);
        let frags = vec![
            Fragment::new("a ", small),
            Fragment::new("b", big),
        ];
        let lines = break_lines(&frags, 500.0, &fonts());
        assert!((lines[0].advance - 23.0).abs() < 0.01, "20 × 1.15");
    }
}
