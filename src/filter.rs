//! Spatial filtering of heading candidates
//!
//! Lines whose spans sit inside a detected table region (tables of contents,
//! data tables) or inside the running header/footer margins are marked as
//! excluded. They stay in the line list so the caller can still see them.

use crate::extractor::{DocumentLayout, TextSpan};
use crate::geometry::BBox;
use crate::layout::TextLine;
use crate::tables::TableRegion;

/// Why a line was taken out of heading candidacy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    /// Inside a table region
    Table,
    /// Inside the page header/footer margin
    Margin,
}

/// A line together with its spatial verdict
#[derive(Debug, Clone)]
pub struct FilteredLine {
    pub line: TextLine,
    pub excluded: Option<Exclusion>,
}

impl FilteredLine {
    pub fn is_candidate(&self) -> bool {
        self.excluded.is_none()
    }
}

/// Largest overlap ratio between `bbox` and any region on `page`
pub fn table_overlap(bbox: &BBox, page: u32, regions: &[TableRegion]) -> f32 {
    regions
        .iter()
        .filter(|r| r.page == page)
        .map(|r| bbox.overlap_ratio(&r.bbox))
        .fold(0.0, f32::max)
}

/// Whether a span is substantially inside a table region on its page
pub fn span_in_table(span: &TextSpan, regions: &[TableRegion], threshold: f32) -> bool {
    table_overlap(&span.bbox, span.page, regions) >= threshold
}

/// Mark lines that fall inside tables or page margins.
///
/// A line is excluded when any of its spans reaches `overlap_threshold`
/// against a region on the same page. `margin` is a fraction of the page
/// height; 0.0 disables the margin check.
pub fn apply_spatial_filter(
    lines: Vec<TextLine>,
    regions: &[TableRegion],
    layout: &DocumentLayout,
    overlap_threshold: f32,
    margin: f32,
) -> Vec<FilteredLine> {
    let mut table_hits = 0usize;

    let filtered: Vec<FilteredLine> = lines
        .into_iter()
        .map(|line| {
            let excluded = if line
                .spans
                .iter()
                .any(|s| span_in_table(s, regions, overlap_threshold))
            {
                table_hits += 1;
                Some(Exclusion::Table)
            } else if margin > 0.0 && in_margin(&line, layout, margin) {
                Some(Exclusion::Margin)
            } else {
                None
            };
            FilteredLine { line, excluded }
        })
        .collect();

    if table_hits > 0 {
        log::debug!("{} line(s) excluded as table content", table_hits);
    }
    filtered
}

fn in_margin(line: &TextLine, layout: &DocumentLayout, margin: f32) -> bool {
    let Some(page) = layout.page(line.page) else {
        return false;
    };
    let media = page.media_box;
    let band = media.height() * margin;
    let bbox = line.bbox();
    bbox.y0 > media.y1 - band || bbox.y1 < media.y0 + band
}
