//! Grouping spans into lines, with multi-column support
//!
//! Headings are often shown with several text operators (a section number
//! and a title, or a kerned run split by the producer). Lines are the unit
//! the classifier and spatial filter work on.

use crate::extractor::TextSpan;
use crate::geometry::BBox;

/// Spans closer than this vertically (in points) share a line
const Y_TOLERANCE: f32 = 3.0;

/// A line of text (grouped spans)
#[derive(Debug, Clone)]
pub struct TextLine {
    /// Spans sorted left to right
    pub spans: Vec<TextSpan>,
    /// Baseline of the first span
    pub y: f32,
    pub page: u32,
}

impl TextLine {
    /// Span texts joined with single spaces
    pub fn text(&self) -> String {
        let joined = self
            .spans
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        normalize_whitespace(&joined)
    }

    /// Largest font size on the line
    pub fn font_size(&self) -> f32 {
        self.spans.iter().map(|s| s.font_size).fold(0.0, f32::max)
    }

    /// Union of the span boxes
    pub fn bbox(&self) -> BBox {
        self.spans
            .iter()
            .map(|s| s.bbox)
            .reduce(|a, b| a.union(&b))
            .unwrap_or_default()
    }

    /// Reading sequence of the earliest span
    pub fn order(&self) -> usize {
        self.spans.iter().map(|s| s.order).min().unwrap_or(0)
    }
}

/// Collapse runs of whitespace to a single space and trim
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Median of the given font sizes, `None` when there are none
pub fn median_font_size(sizes: &[f32]) -> Option<f32> {
    let mut sorted: Vec<f32> = sizes.iter().copied().filter(|s| *s > 0.0).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

/// Represents a column region on a page
#[derive(Debug, Clone)]
struct ColumnRegion {
    x_min: f32,
    x_max: f32,
}

/// Detect column boundaries on a page based on X-position gaps
fn detect_columns(spans: &[TextSpan]) -> Vec<ColumnRegion> {
    if spans.is_empty() {
        return vec![];
    }

    let x_min = spans.iter().map(|s| s.bbox.x0).fold(f32::INFINITY, f32::min);
    let x_max = spans
        .iter()
        .map(|s| s.bbox.x1)
        .fold(f32::NEG_INFINITY, f32::max);

    let single = vec![ColumnRegion { x_min, x_max }];

    let page_width = x_max - x_min;
    // Narrow pages and sparse pages are never split
    if page_width < 200.0 || spans.len() < 20 {
        return single;
    }

    // A column gutter is a vertical band no span crosses, wider than 4% of the text width
    let mut intervals: Vec<(f32, f32)> = spans.iter().map(|s| (s.bbox.x0, s.bbox.x1)).collect();
    intervals.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let min_gutter = page_width * 0.04;
    let mut boundaries = vec![x_min];
    let mut reach = intervals[0].1;
    for &(start, end) in &intervals[1..] {
        if start - reach > min_gutter {
            boundaries.push((start + reach) / 2.0);
        }
        reach = reach.max(end);
    }
    boundaries.push(x_max + 1.0);

    let columns: Vec<ColumnRegion> = boundaries
        .windows(2)
        .map(|w| ColumnRegion {
            x_min: w[0],
            x_max: w[1],
        })
        .collect();

    // Only two-column layouts are handled; 3+ columns are rare and error-prone
    if columns.len() == 2 {
        let counts: Vec<usize> = columns
            .iter()
            .map(|col| {
                spans
                    .iter()
                    .filter(|s| s.bbox.x0 >= col.x_min && s.bbox.x0 < col.x_max)
                    .count()
            })
            .collect();

        // Each column should hold at least 20% of the content
        let total: usize = counts.iter().sum();
        if counts.iter().all(|&c| c >= total / 5) {
            return columns;
        }
    }

    single
}

/// Group spans into lines, page by page, preserving reading order
pub fn group_into_lines(spans: &[TextSpan]) -> Vec<TextLine> {
    if spans.is_empty() {
        return Vec::new();
    }

    let mut pages: Vec<u32> = spans.iter().map(|s| s.page).collect();
    pages.sort();
    pages.dedup();

    let mut all_lines = Vec::new();

    for page in pages {
        let page_spans: Vec<TextSpan> = spans.iter().filter(|s| s.page == page).cloned().collect();
        let columns = detect_columns(&page_spans);

        if columns.len() <= 1 {
            all_lines.extend(group_single_column(page_spans));
        } else {
            for column in &columns {
                let col_spans: Vec<TextSpan> = page_spans
                    .iter()
                    .filter(|s| s.bbox.x0 >= column.x_min && s.bbox.x0 < column.x_max)
                    .cloned()
                    .collect();
                all_lines.extend(group_single_column(col_spans));
            }
        }
    }

    all_lines
}

/// Group spans from a single column into lines.
///
/// Stream order is kept (it is usually reading order); only consecutive spans
/// on the same baseline are merged.
fn group_single_column(spans: Vec<TextSpan>) -> Vec<TextLine> {
    let mut lines: Vec<TextLine> = Vec::new();

    for span in spans {
        let y = span.baseline();
        match lines.last_mut() {
            Some(last) if last.page == span.page && (last.y - y).abs() < Y_TOLERANCE => {
                last.spans.push(span);
            }
            _ => {
                let page = span.page;
                lines.push(TextLine {
                    spans: vec![span],
                    y,
                    page,
                });
            }
        }
    }

    for line in &mut lines {
        line.spans.sort_by(|a, b| {
            a.bbox
                .x0
                .partial_cmp(&b.bbox.x0)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    lines
}

/// Sort spans top-to-bottom, then left-to-right.
///
/// Spans are first clustered into rows: walking down from the highest
/// baseline, a span joins the current row while it is within `Y_TOLERANCE`
/// of the row's first baseline. Rows are then ordered by x.
pub fn sort_reading_order<'a>(spans: &mut [&'a TextSpan]) {
    spans.sort_by(|a, b| b.baseline().total_cmp(&a.baseline()));

    let mut keyed: Vec<(usize, &'a TextSpan)> = Vec::with_capacity(spans.len());
    let mut row = 0usize;
    let mut anchor: Option<f32> = None;
    for &span in spans.iter() {
        let y = span.baseline();
        match anchor {
            Some(top) if top - y < Y_TOLERANCE => {}
            Some(_) => {
                row += 1;
                anchor = Some(y);
            }
            None => anchor = Some(y),
        }
        keyed.push((row, span));
    }

    keyed.sort_by(|(ra, a), (rb, b)| ra.cmp(rb).then(a.bbox.x0.total_cmp(&b.bbox.x0)));
    for (slot, (_, span)) in spans.iter_mut().zip(keyed) {
        *slot = span;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(text: &str, x: f32, y: f32, order: usize) -> TextSpan {
        TextSpan {
            text: text.into(),
            font_size: 12.0,
            font_name: "Helvetica".into(),
            bbox: BBox::new(x, y - 2.4, x + text.len() as f32 * 6.0, y + 9.6),
            page: 1,
            order,
        }
    }

    #[test]
    fn test_group_into_lines() {
        let spans = vec![
            span("Hello", 100.0, 700.0, 0),
            span("World", 160.0, 700.0, 1),
            span("Next line", 100.0, 680.0, 2),
        ];

        let lines = group_into_lines(&spans);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text(), "Hello World");
        assert_eq!(lines[1].text(), "Next line");
        assert_eq!(lines[1].order(), 2);
    }

    #[test]
    fn test_line_sorted_by_x() {
        let spans = vec![span("Title", 130.0, 700.0, 0), span("2.1", 100.0, 700.0, 1)];
        let lines = group_into_lines(&spans);
        assert_eq!(lines[0].text(), "2.1 Title");
        assert_eq!(lines[0].order(), 0);
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  a \t b\n\nc "), "a b c");
        assert_eq!(normalize_whitespace("   "), "");
    }

    #[test]
    fn test_median_font_size() {
        assert_eq!(median_font_size(&[]), None);
        assert_eq!(median_font_size(&[10.0, 24.0, 10.0]), Some(10.0));
        assert_eq!(median_font_size(&[10.0, 12.0]), Some(11.0));
    }

    #[test]
    fn test_sort_reading_order() {
        let a = span("second", 300.0, 700.0, 0);
        let b = span("first", 100.0, 701.0, 1);
        let c = span("third", 100.0, 650.0, 2);
        let mut refs = vec![&c, &a, &b];
        sort_reading_order(&mut refs);
        let texts: Vec<&str> = refs.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_sort_reading_order_chained_baselines() {
        // 705 and 702.5 share a row; 700 is more than 3pt below the row start
        let a = span("low", 300.0, 700.0, 0);
        let b = span("mid", 100.0, 702.5, 1);
        let c = span("top", 200.0, 705.0, 2);
        let mut refs = vec![&a, &b, &c];
        sort_reading_order(&mut refs);
        let texts: Vec<&str> = refs.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["mid", "top", "low"]);
    }

    #[test]
    fn test_sort_reading_order_many_staggered_spans() {
        let spans: Vec<TextSpan> = (0..400)
            .map(|i| span("w", ((i * 37) % 500) as f32, 700.0 - (i % 60) as f32 * 1.7, i))
            .collect();
        let mut refs: Vec<&TextSpan> = spans.iter().rev().collect();
        sort_reading_order(&mut refs);

        assert_eq!(refs.len(), 400);
        // Never moves up by a full row
        assert!(refs
            .windows(2)
            .all(|w| w[1].baseline() - w[0].baseline() < Y_TOLERANCE));
        // Same input order gives the same result
        let mut again: Vec<&TextSpan> = spans.iter().collect();
        sort_reading_order(&mut again);
        let key = |v: &[&TextSpan]| v.iter().map(|s| s.order).collect::<Vec<_>>();
        assert_eq!(key(&refs), key(&again));
    }
}
