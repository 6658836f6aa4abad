//! Table region detection
//!
//! Finds page areas that hold tabular content so that their text can be kept
//! out of the outline. Two strategies are available:
//! - `Lines`: ruling lines from the content stream are snapped, joined and
//!   intersected; connected grids with at least two cells become regions
//! - `Text`: rows of body-sized text with three or more consistently aligned
//!   columns (for borderless tables)

use crate::extractor::{Edge, Orientation, PageLayout, TextSpan};
use crate::geometry::BBox;
use crate::layout::median_font_size;
use serde::Deserialize;
use std::collections::HashSet;

/// Edges within this distance (points) are considered collinear
const SNAP_TOLERANCE: f32 = 3.0;
/// Collinear edges with gaps up to this size are joined
const JOIN_TOLERANCE: f32 = 3.0;
/// Slack when testing whether two edges cross
const INTERSECTION_TOLERANCE: f32 = 3.0;
/// Edges shorter than this are ignored
const MIN_EDGE_LENGTH: f32 = 3.0;

/// Which evidence the table finder uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TableStrategy {
    /// Ruling-line grids only
    #[default]
    Lines,
    /// Text alignment only
    Text,
    /// Union of both
    Both,
}

/// A page area believed to contain a table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableRegion {
    pub bbox: BBox,
    /// Page number (1-indexed)
    pub page: u32,
}

/// Detect table regions on one page
pub fn detect_table_regions(page: &PageLayout, strategy: TableStrategy) -> Vec<TableRegion> {
    let mut boxes = Vec::new();

    if matches!(strategy, TableStrategy::Lines | TableStrategy::Both) {
        boxes.extend(find_ruled_tables(&page.edges));
    }
    if matches!(strategy, TableStrategy::Text | TableStrategy::Both) {
        boxes.extend(find_aligned_tables(&page.spans));
    }

    let regions: Vec<TableRegion> = boxes
        .into_iter()
        .map(|bbox| TableRegion {
            bbox,
            page: page.number,
        })
        .collect();

    if !regions.is_empty() {
        log::debug!("page {}: {} table region(s)", page.number, regions.len());
    }
    regions
}

// ============================================================================
// Ruling-line grids
// ============================================================================

/// Find table bounding boxes from ruling edges
pub fn find_ruled_tables(edges: &[Edge]) -> Vec<BBox> {
    let horizontal = merge_edges(edges, Orientation::Horizontal);
    let vertical = merge_edges(edges, Orientation::Vertical);

    if horizontal.len() < 2 || vertical.len() < 2 {
        return vec![];
    }

    // Intersections as (vertical index, horizontal index)
    let mut crossings: Vec<(usize, usize)> = Vec::new();
    for (vi, v) in vertical.iter().enumerate() {
        for (hi, h) in horizontal.iter().enumerate() {
            if crosses(v, h) {
                crossings.push((vi, hi));
            }
        }
    }

    // Connected components over edges; verticals are 0..V, horizontals V..V+H
    let mut groups = UnionFind::new(vertical.len() + horizontal.len());
    for &(vi, hi) in &crossings {
        groups.union(vi, vertical.len() + hi);
    }

    let roots: Vec<usize> = (0..vertical.len() + horizontal.len())
        .map(|i| groups.find(i))
        .collect();
    let (v_roots, h_roots) = roots.split_at(vertical.len());

    let mut tables = Vec::new();
    let mut seen_roots = HashSet::new();

    for &root in v_roots {
        if !seen_roots.insert(root) {
            continue;
        }

        let points: HashSet<(i32, i32)> = crossings
            .iter()
            .filter(|(vi, _)| v_roots[*vi] == root)
            .map(|&(vi, hi)| (key(vertical[vi].position), key(horizontal[hi].position)))
            .collect();

        if count_cells(&points) < 2 {
            continue;
        }

        let bbox = vertical
            .iter()
            .zip(v_roots)
            .chain(horizontal.iter().zip(h_roots))
            .filter(|(_, &r)| r == root)
            .map(|(edge, _)| edge.bbox())
            .reduce(|a, b| a.union(&b));

        if let Some(bbox) = bbox {
            tables.push(bbox);
        }
    }

    tables
}

/// Quantize a coordinate to 0.1pt for set membership
fn key(v: f32) -> i32 {
    (v * 10.0).round() as i32
}

/// Count grid cells whose four corners are all intersections
fn count_cells(points: &HashSet<(i32, i32)>) -> usize {
    let mut xs: Vec<i32> = points.iter().map(|p| p.0).collect();
    let mut ys: Vec<i32> = points.iter().map(|p| p.1).collect();
    xs.sort_unstable();
    xs.dedup();
    ys.sort_unstable();
    ys.dedup();

    let mut cells = 0;
    for x in xs.windows(2) {
        for y in ys.windows(2) {
            if points.contains(&(x[0], y[0]))
                && points.contains(&(x[1], y[0]))
                && points.contains(&(x[0], y[1]))
                && points.contains(&(x[1], y[1]))
            {
                cells += 1;
            }
        }
    }
    cells
}

fn crosses(v: &Edge, h: &Edge) -> bool {
    v.position >= h.start - INTERSECTION_TOLERANCE
        && v.position <= h.end + INTERSECTION_TOLERANCE
        && h.position >= v.start - INTERSECTION_TOLERANCE
        && h.position <= v.end + INTERSECTION_TOLERANCE
}

/// Snap edges of one orientation to shared positions and join collinear pieces
fn merge_edges(edges: &[Edge], orientation: Orientation) -> Vec<Edge> {
    let mut selected: Vec<Edge> = edges
        .iter()
        .filter(|e| e.orientation == orientation && e.length() >= MIN_EDGE_LENGTH)
        .copied()
        .collect();
    if selected.is_empty() {
        return selected;
    }

    selected.sort_by(|a, b| {
        a.position
            .partial_cmp(&b.position)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    // Snap: cluster positions, each cluster takes its mean position
    let mut clusters: Vec<Vec<Edge>> = Vec::new();
    for edge in selected {
        match clusters.last_mut() {
            Some(cluster)
                if edge.position - cluster[cluster.len() - 1].position <= SNAP_TOLERANCE =>
            {
                cluster.push(edge)
            }
            _ => clusters.push(vec![edge]),
        }
    }

    let mut merged = Vec::new();
    for mut cluster in clusters {
        let position = cluster.iter().map(|e| e.position).sum::<f32>() / cluster.len() as f32;
        cluster.sort_by(|a, b| a.start.partial_cmp(&b.start).unwrap_or(std::cmp::Ordering::Equal));

        let mut current = Edge {
            position,
            ..cluster[0]
        };
        for edge in &cluster[1..] {
            if edge.start <= current.end + JOIN_TOLERANCE {
                current.end = current.end.max(edge.end);
            } else {
                merged.push(current);
                current = Edge { position, ..*edge };
            }
        }
        merged.push(current);
    }

    merged
}

/// Minimal disjoint-set over edge indices
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[rb] = ra;
        }
    }
}

// ============================================================================
// Text alignment
// ============================================================================

/// Find borderless tables from body-sized text arranged in aligned columns.
///
/// Requires rows with 3+ distinct X-position clusters and verifies that
/// column positions are consistent across rows (tables have fixed columns,
/// paragraph text has varying word positions).
pub fn find_aligned_tables(spans: &[TextSpan]) -> Vec<BBox> {
    let sizes: Vec<f32> = spans.iter().map(|s| s.font_size).collect();
    let Some(body) = median_font_size(&sizes) else {
        return vec![];
    };

    let candidates: Vec<&TextSpan> = spans
        .iter()
        .filter(|s| s.font_size <= body * 1.05 && s.font_size >= 6.0)
        .collect();
    if candidates.len() < 9 {
        return vec![];
    }

    // Step 1: Group spans by baseline (8pt tolerance for same row)
    let mut row_groups: Vec<(f32, Vec<&TextSpan>)> = Vec::new();
    for span in &candidates {
        let y = span.baseline();
        match row_groups.iter_mut().find(|(center, _)| (y - *center).abs() < 8.0) {
            Some((_, members)) => members.push(span),
            None => row_groups.push((y, vec![span])),
        }
    }

    // Step 2: Keep rows with 3+ X clusters (20pt tolerance)
    let mut qualifying_rows: Vec<(f32, Vec<f32>, Vec<&TextSpan>)> = Vec::new();
    for (y, members) in row_groups {
        let mut xs: Vec<f32> = members.iter().map(|s| s.bbox.x0).collect();
        xs.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let mut cluster_starts = vec![xs[0]];
        let mut last_x = xs[0];
        for &x in &xs[1..] {
            if x - last_x > 20.0 {
                cluster_starts.push(x);
                last_x = x;
            }
        }

        if cluster_starts.len() >= 3 {
            qualifying_rows.push((y, cluster_starts, members));
        }
    }

    if qualifying_rows.len() < 3 {
        return vec![];
    }

    // Step 3: Contiguous runs of qualifying rows (25pt max gap)
    qualifying_rows.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut runs: Vec<Vec<usize>> = Vec::new();
    let mut current = vec![0usize];
    for i in 1..qualifying_rows.len() {
        if qualifying_rows[i].0 - qualifying_rows[i - 1].0 > 25.0 {
            if current.len() >= 3 {
                runs.push(std::mem::take(&mut current));
            }
            current = vec![i];
        } else {
            current.push(i);
        }
    }
    if current.len() >= 3 {
        runs.push(current);
    }

    // Step 4: Cross-row column alignment
    let mut tables = Vec::new();
    for run in runs {
        let tolerance = 10.0f32;
        let mut total_score = 0.0f32;
        let mut pairs = 0u32;

        for (a_pos, &a) in run.iter().enumerate() {
            for &b in &run[a_pos + 1..] {
                let cols_a = &qualifying_rows[a].1;
                let cols_b = &qualifying_rows[b].1;
                let matches_a = cols_a
                    .iter()
                    .filter(|&&x| cols_b.iter().any(|&y| (x - y).abs() < tolerance))
                    .count();
                let matches_b = cols_b
                    .iter()
                    .filter(|&&y| cols_a.iter().any(|&x| (x - y).abs() < tolerance))
                    .count();
                let max_len = cols_a.len().max(cols_b.len());
                total_score += (matches_a + matches_b) as f32 / (2 * max_len) as f32;
                pairs += 1;
            }
        }

        let avg = if pairs > 0 {
            total_score / pairs as f32
        } else {
            0.0
        };

        if avg >= 0.5 {
            let bbox = run
                .iter()
                .flat_map(|&i| qualifying_rows[i].2.iter().map(|s| s.bbox))
                .reduce(|a, b| a.union(&b));
            if let Some(bbox) = bbox {
                tables.push(bbox.expand(1.0));
            }
        }
    }

    tables
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Edges of a rows x cols grid with 100x20 cells starting at (50, 500)
    fn grid(rows: usize, cols: usize) -> Vec<Edge> {
        let (x0, y0, w, h) = (50.0, 500.0, 100.0, 20.0);
        let width = w * cols as f32;
        let height = h * rows as f32;
        let mut edges = Vec::new();
        for r in 0..=rows {
            edges.push(Edge::horizontal(y0 + h * r as f32, x0, x0 + width));
        }
        for c in 0..=cols {
            edges.push(Edge::vertical(x0 + w * c as f32, y0, y0 + height));
        }
        edges
    }

    fn span(text: &str, x: f32, y: f32) -> TextSpan {
        TextSpan {
            text: text.into(),
            font_size: 10.0,
            font_name: "Helvetica".into(),
            bbox: BBox::new(x, y - 2.0, x + 30.0, y + 8.0),
            page: 1,
            order: 0,
        }
    }

    #[test]
    fn test_ruled_grid_detected() {
        let tables = find_ruled_tables(&grid(3, 2));
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0], BBox::new(50.0, 500.0, 250.0, 560.0));
    }

    #[test]
    fn test_single_box_is_not_a_table() {
        assert!(find_ruled_tables(&grid(1, 1)).is_empty());
    }

    #[test]
    fn test_split_edges_are_joined() {
        let mut edges = grid(2, 2);
        // Replace the top rule with two touching halves, slightly misaligned
        edges.remove(2);
        edges.push(Edge::horizontal(540.5, 50.0, 150.0));
        edges.push(Edge::horizontal(539.8, 151.0, 250.0));
        let tables = find_ruled_tables(&edges);
        assert_eq!(tables.len(), 1);
        assert!(tables[0].y1 >= 540.0);
    }

    #[test]
    fn test_two_separate_grids() {
        let mut edges = grid(2, 2);
        for e in grid(2, 2) {
            let shifted = match e.orientation {
                Orientation::Horizontal => Edge::horizontal(e.position - 300.0, e.start, e.end),
                Orientation::Vertical => Edge::vertical(e.position, e.start - 300.0, e.end - 300.0),
            };
            edges.push(shifted);
        }
        assert_eq!(find_ruled_tables(&edges).len(), 2);
    }

    #[test]
    fn test_underline_rules_are_not_tables() {
        let edges = vec![
            Edge::horizontal(700.0, 72.0, 540.0),
            Edge::horizontal(100.0, 72.0, 540.0),
        ];
        assert!(find_ruled_tables(&edges).is_empty());
    }

    #[test]
    fn test_aligned_text_table() {
        let mut spans = Vec::new();
        for row in 0..4 {
            let y = 600.0 - row as f32 * 14.0;
            spans.push(span("Item", 72.0, y));
            spans.push(span("Qty", 200.0, y));
            spans.push(span("Cost", 320.0, y));
        }
        let tables = find_aligned_tables(&spans);
        assert_eq!(tables.len(), 1);
        assert!(tables[0].contains(&spans[0].bbox));
        assert!(tables[0].contains(&spans[11].bbox));
    }

    #[test]
    fn test_paragraph_text_not_table() {
        let spans: Vec<TextSpan> = (0..12)
            .map(|i| span("words words words", 72.0, 600.0 - i as f32 * 14.0))
            .collect();
        assert!(find_aligned_tables(&spans).is_empty());
    }

    #[test]
    fn test_strategy_selection() {
        let page = PageLayout {
            number: 3,
            media_box: BBox::new(0.0, 0.0, 612.0, 792.0),
            spans: vec![],
            edges: grid(2, 3),
        };
        let regions = detect_table_regions(&page, TableStrategy::Lines);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].page, 3);
        assert!(detect_table_regions(&page, TableStrategy::Text).is_empty());
    }
}
