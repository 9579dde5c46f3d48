//! Table layout – column sizing from header proportions, fixed-height rows,
//! and row-level pagination with optional header repetition.

use crate::content::{Color, ColumnSpec, FontWeight, TableElement};
use crate::error::{Error, Result};
use crate::flow::Flow;
use crate::fonts::FontManager;
use crate::linebreak::TextStyle;
use crate::writer::DocumentWriter;

const HEADER_FILL: Color = Color {
    r: 0.93,
    g: 0.93,
    b: 0.93,
    a: 1.0,
};
const ROW_SEPARATOR: Color = Color {
    r: 0.8,
    g: 0.8,
    b: 0.8,
    a: 1.0,
};

/// A table with resolved absolute column widths.
#[derive(Debug)]
pub struct TableModel {
    pub columns: Vec<ColumnSpec>,
    pub rows: Vec<Vec<String>>,
    /// Column widths in pt; their sum never exceeds the available frame.
    pub widths: Vec<f32>,
    /// No header markup existed; column keys were synthesized from the
    /// first data row and the header renders with zero height.
    pub synthesized_header: bool,
}

impl TableModel {
    /// Resolve column widths against the available frame width.
    pub fn build(table: &TableElement, available: f32) -> Result<Self> {
        if available <= 0.0 {
            return Err(Error::DegenerateLayout(format!(
                "table frame width {available} is not positive"
            )));
        }
        let (columns, synthesized_header) = match &table.columns {
            Some(cols) if !cols.is_empty() => (cols.clone(), false),
            _ => {
                let n = table.rows.first().map(|r| r.len()).unwrap_or(0);
                if n == 0 {
                    return Err(Error::DegenerateLayout(
                        "table has neither header cells nor data rows".to_string(),
                    ));
                }
                let columns = (1..=n)
                    .map(|i| ColumnSpec {
                        label: format!("col{i}"),
                        width: None,
                    })
                    .collect();
                (columns, true)
            }
        };

        let widths = resolve_widths(&columns, available)?;
        Ok(Self {
            columns,
            rows: table.rows.clone(),
            widths,
            synthesized_header,
        })
    }

    pub fn total_width(&self) -> f32 {
        self.widths.iter().sum()
    }
}

/// Each column takes its proportional share of the table's natural width,
/// scaled to the frame; equal shares when any hint is missing. A final
/// common factor clamps the total back inside the frame.
fn resolve_widths(columns: &[ColumnSpec], available: f32) -> Result<Vec<f32>> {
    let hints: Vec<Option<f32>> = columns.iter().map(|c| c.width).collect();
    let mut widths: Vec<f32> = if hints.iter().all(|h| h.is_some()) {
        let natural: f32 = hints.iter().map(|h| h.unwrap_or(0.0)).sum();
        if natural <= 0.0 {
            return Err(Error::DegenerateLayout(
                "table natural width is not positive".to_string(),
            ));
        }
        hints
            .iter()
            .map(|h| h.unwrap_or(0.0) / natural * available)
            .collect()
    } else {
        vec![available / columns.len() as f32; columns.len()]
    };

    let total: f32 = widths.iter().sum();
    if total > available {
        let factor = available / total;
        for w in &mut widths {
            *w *= factor;
        }
    }

    if widths.iter().any(|w| *w <= 0.0) {
        return Err(Error::DegenerateLayout(
            "a column resolved to zero width".to_string(),
        ));
    }
    Ok(widths)
}

/// Truncate cell text to its first line and to what fits the column width.
/// Overflow clips silently.
fn clip_cell<'t>(
    text: &'t str,
    style: &TextStyle,
    max_width: f32,
    fonts: &FontManager,
) -> &'t str {
    let line = text.split('\n').next().unwrap_or("");
    let handle = fonts.resolve(&style.family, style.weight, style.font_style);
    if fonts.measure(line, &handle, style.size) <= max_width {
        return line;
    }
    let mut fit = 0;
    for (idx, ch) in line.char_indices() {
        let next = idx + ch.len_utf8();
        if fonts.measure(&line[..next], &handle, style.size) > max_width {
            break;
        }
        fit = next;
    }
    &line[..fit]
}

/// Render a table at the cursor, paginating by rows.
pub fn render<W: DocumentWriter>(flow: &mut Flow<'_, W>, table: &TableElement) -> Result<()> {
    let available = (flow.cursor.width - flow.indent()).max(0.0);
    let model = TableModel::build(table, available)?;

    let body_style = flow.text_style(&table.style);
    let mut header_style = body_style.clone();
    header_style.weight = FontWeight::Bold;

    let pad_h = flow.px(8.0);
    let pad_v = flow.px(4.0);
    let row_h = (body_style.size * body_style.line_height).max(body_style.size) + 2.0 * pad_v;
    let header_h = if model.synthesized_header { 0.0 } else { row_h };

    // One bulk break when the whole estimated table fits a fresh page
    // better than the remaining space.
    let estimated = header_h + model.rows.len() as f32 * row_h;
    flow.ensure_room(estimated);

    if !model.synthesized_header {
        draw_header(flow, &model, &header_style, row_h, pad_h, pad_v);
    }

    for row in &model.rows {
        // Every row re-checks the bottom margin on its own.
        if !flow.at_page_top() && flow.cursor.y + row_h > flow.frame.bottom_limit() {
            flow.new_page();
            if table.repeat_header && !model.synthesized_header {
                draw_header(flow, &model, &header_style, row_h, pad_h, pad_v);
            }
        }
        draw_row(flow, &model, row, &body_style, row_h, pad_h, pad_v);
    }
    Ok(())
}

fn draw_header<W: DocumentWriter>(
    flow: &mut Flow<'_, W>,
    model: &TableModel,
    style: &TextStyle,
    row_h: f32,
    pad_h: f32,
    pad_v: f32,
) {
    let x0 = flow.cursor.x + flow.indent();
    let y0 = flow.cursor.y;
    flow.writer
        .draw_rect(x0, y0, model.total_width(), row_h, HEADER_FILL);

    let labels: Vec<String> = model.columns.iter().map(|c| c.label.clone()).collect();
    draw_cells(flow, model, &labels, style, y0, pad_h, pad_v);

    flow.cursor.y += row_h;
    flow.writer.draw_line(
        (x0, flow.cursor.y),
        (x0 + model.total_width(), flow.cursor.y),
        0.75,
        style.color,
    );
    flow.mark_page_dirty();
}

fn draw_row<W: DocumentWriter>(
    flow: &mut Flow<'_, W>,
    model: &TableModel,
    row: &[String],
    style: &TextStyle,
    row_h: f32,
    pad_h: f32,
    pad_v: f32,
) {
    let x0 = flow.cursor.x + flow.indent();
    let y0 = flow.cursor.y;
    draw_cells(flow, model, row, style, y0, pad_h, pad_v);

    flow.cursor.y += row_h;
    flow.writer.draw_line(
        (x0, flow.cursor.y),
        (x0 + model.total_width(), flow.cursor.y),
        0.5,
        ROW_SEPARATOR,
    );
    flow.mark_page_dirty();
}

fn draw_cells<W: DocumentWriter>(
    flow: &mut Flow<'_, W>,
    model: &TableModel,
    cells: &[String],
    style: &TextStyle,
    y_top: f32,
    pad_h: f32,
    pad_v: f32,
) {
    let mut x = flow.cursor.x + flow.indent();
    let baseline = y_top + pad_v + style.size;
    for (i, width) in model.widths.iter().enumerate() {
        if let Some(cell) = cells.get(i) {
            let inner = (width - 2.0 * pad_h).max(0.0);
            let clipped = clip_cell(cell, style, inner, flow.fonts).to_string();
            if !clipped.is_empty() {
                let handle = flow
                    .fonts
                    .resolve(&style.family, style.weight, style.font_style);
                flow.writer.draw_text(
                    x + pad_h,
                    baseline,
                    &crate::writer::TextRun {
                        text: clipped,
                        font: handle,
                        size: style.size,
                        color: style.color,
                    },
                );
            }
        }
        x += width;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Style;

    fn spec(label: &str, width: Option<f32>) -> ColumnSpec {
        ColumnSpec {
            label: label.to_string(),
            width,
        }
    }

    fn table(columns: Option<Vec<ColumnSpec>>, rows: Vec<Vec<String>>) -> TableElement {
        TableElement {
            style: Style::default(),
            columns,
            rows,
            repeat_header: false,
        }
    }

    #[test]
    fn proportional_widths_scale_to_frame() {
        let t = table(
            Some(vec![spec("a", Some(100.0)), spec("b", Some(300.0))]),
            vec![],
        );
        let model = TableModel::build(&t, 400.0).unwrap();
        assert!((model.widths[0] - 100.0).abs() < 0.01);
        assert!((model.widths[1] - 300.0).abs() < 0.01);
        assert!(model.total_width() <= 400.0 + 0.01);
    }

    #[test]
    fn missing_hints_fall_back_to_equal_shares() {
        let t = table(
            Some(vec![
                spec("a", Some(50.0)),
                spec("b", None),
                spec("c", Some(10.0)),
            ]),
            vec![],
        );
        let model = TableModel::build(&t, 300.0).unwrap();
        for w in &model.widths {
            assert!((w - 100.0).abs() < 0.01);
        }
    }

    #[test]
    fn widths_never_exceed_frame() {
        for avail in [10.0_f32, 123.4, 515.0] {
            let t = table(
                Some(vec![
                    spec("a", Some(1.0)),
                    spec("b", Some(2.0)),
                    spec("c", Some(997.0)),
                ]),
                vec![],
            );
            let model = TableModel::build(&t, avail).unwrap();
            assert!(model.total_width() <= avail + 0.01, "avail {avail}");
        }
    }

    #[test]
    fn headerless_table_synthesizes_columns() {
        let t = table(
            None,
            vec![vec!["1".to_string(), "2".to_string(), "3".to_string()]],
        );
        let model = TableModel::build(&t, 300.0).unwrap();
        assert!(model.synthesized_header);
        assert_eq!(model.columns.len(), 3);
        assert_eq!(model.columns[0].label, "col1");
    }

    #[test]
    fn degenerate_widths_are_rejected() {
        let empty = table(None, vec![]);
        assert!(matches!(
            TableModel::build(&empty, 300.0),
            Err(Error::DegenerateLayout(_))
        ));

        let zero_hints = table(
            Some(vec![spec("a", Some(0.0)), spec("b", Some(0.0))]),
            vec![],
        );
        assert!(matches!(
            TableModel::build(&zero_hints, 300.0),
            Err(Error::DegenerateLayout(_))
        ));

        let no_frame = table(Some(vec![spec("a", Some(10.0))]), vec![]);
        assert!(matches!(
            TableModel::build(&no_frame, 0.0),
            Err(Error::DegenerateLayout(_))
        ));
    }
}
