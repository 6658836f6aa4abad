//! Title extraction from the first page's typography

use crate::extractor::TextSpan;
use crate::layout::{normalize_whitespace, sort_reading_order};

/// Font sizes closer than this are treated as equal
const SIZE_TOLERANCE: f32 = 0.05;

/// Build the document title from the first page's spans.
///
/// Every span set in the page's largest font size is taken in reading order
/// (top-to-bottom, left-to-right) and joined with single spaces. An empty
/// page yields an empty title.
pub fn extract_title(first_page: &[TextSpan]) -> String {
    extract_title_with(first_page, false)
}

/// Like [`extract_title`], optionally dropping repeated draws of the same
/// text at the same position (producers fake bold type by painting a run twice)
pub fn extract_title_with(first_page: &[TextSpan], collapse_repeats: bool) -> String {
    let max_size = first_page
        .iter()
        .filter(|s| !s.text.trim().is_empty())
        .map(|s| s.font_size)
        .fold(0.0f32, f32::max);

    if max_size <= 0.0 {
        return String::new();
    }

    let mut parts: Vec<&TextSpan> = first_page
        .iter()
        .filter(|s| !s.text.trim().is_empty() && (s.font_size - max_size).abs() < SIZE_TOLERANCE)
        .collect();
    sort_reading_order(&mut parts);

    let mut kept: Vec<&TextSpan> = Vec::with_capacity(parts.len());
    for span in parts {
        let repeated = collapse_repeats
            && kept.iter().any(|k| {
                k.text.trim() == span.text.trim() && span.bbox.overlap_ratio(&k.bbox) > 0.5
            });
        if !repeated {
            kept.push(span);
        }
    }

    let joined = kept
        .iter()
        .map(|s| s.text.trim())
        .collect::<Vec<_>>()
        .join(" ");
    normalize_whitespace(&joined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BBox;

    fn span(text: &str, size: f32, x: f32, y: f32, order: usize) -> TextSpan {
        TextSpan {
            text: text.into(),
            font_size: size,
            font_name: "Helvetica-Bold".into(),
            bbox: BBox::new(x, y - size * 0.2, x + 100.0, y + size * 0.8),
            page: 1,
            order,
        }
    }

    #[test]
    fn test_single_span_title() {
        let spans = vec![span("  Revision   History ", 20.0, 72.0, 700.0, 0)];
        assert_eq!(extract_title(&spans), "Revision History");
    }

    #[test]
    fn test_empty_page() {
        assert_eq!(extract_title(&[]), "");
        assert_eq!(extract_title(&[span("   ", 30.0, 0.0, 0.0, 0)]), "");
    }

    #[test]
    fn test_largest_spans_in_reading_order() {
        let spans = vec![
            span("Foundation Level", 24.0, 72.0, 650.0, 0),
            span("body text", 11.0, 72.0, 600.0, 1),
            span("Overview", 24.0, 72.0, 700.0, 2),
            span("Extensions", 24.0, 190.0, 650.0, 3),
        ];
        assert_eq!(extract_title(&spans), "Overview Foundation Level Extensions");
    }

    #[test]
    fn test_collapse_repeated_draws() {
        let spans = vec![
            span("RFP", 24.0, 72.0, 700.0, 0),
            span("RFP", 24.0, 72.5, 700.0, 1),
        ];
        assert_eq!(extract_title_with(&spans, true), "RFP");
        assert_eq!(extract_title_with(&spans, false), "RFP RFP");
    }

    #[test]
    fn test_staggered_baselines() {
        // Superscript-style offsets: neighbours within 3pt, ends far apart
        let spans: Vec<TextSpan> = (0..60)
            .map(|i| span("Word", 24.0, 72.0 + i as f32 * 40.0, 700.0 - (i % 12) as f32 * 1.7, i))
            .collect();
        let title = extract_title(&spans);
        assert_eq!(title.split(' ').count(), 60);
    }

    #[test]
    fn test_repeated_words_elsewhere_kept() {
        let spans = vec![
            span("Go", 24.0, 72.0, 700.0, 0),
            span("Go", 24.0, 300.0, 700.0, 1),
        ];
        assert_eq!(extract_title_with(&spans, true), "Go Go");
    }
}
