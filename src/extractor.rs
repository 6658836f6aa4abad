//! Text span and ruling-line extraction from PDF pages using lopdf
//!
//! Walks each page's content stream once, tracking the graphics and text
//! state, and produces:
//! - `TextSpan`s: one per show-text operator, with font size, font name,
//!   bounding box and a document-wide reading sequence number
//! - `Edge`s: horizontal and vertical ruling lines from stroked or filled
//!   paths, used by the table finder

use crate::fonts::{get_number, resolve, FontInfo, PageFonts};
use crate::geometry::BBox;
use crate::OutlineError;
use lopdf::content::Content;
use lopdf::{Document, Object, ObjectId};
use std::path::Path;

/// Fraction of the font size below the baseline covered by a span's box
const DESCENT: f32 = 0.2;
/// Fraction of the font size above the baseline covered by a span's box
const ASCENT: f32 = 0.8;
/// Paths thinner than this (in points) are treated as a single rule
const RULE_THICKNESS: f32 = 3.0;
/// Default page size (US Letter) when no MediaBox can be found
const DEFAULT_MEDIA_BOX: BBox = BBox {
    x0: 0.0,
    y0: 0.0,
    x1: 612.0,
    y1: 792.0,
};

/// A run of text shown by a single text operator
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    /// The text content
    pub text: String,
    /// Rendered font size (Tf size scaled by text matrix and CTM)
    pub font_size: f32,
    /// Font name (BaseFont, falling back to the resource name)
    pub font_name: String,
    /// Bounding box in page space
    pub bbox: BBox,
    /// Page number (1-indexed)
    pub page: u32,
    /// Position in document reading sequence
    pub order: usize,
}

impl TextSpan {
    /// Baseline y position
    pub fn baseline(&self) -> f32 {
        self.bbox.y0 + self.font_size * DESCENT
    }
}

/// Orientation of a ruling edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// A horizontal or vertical ruling line in page space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub orientation: Orientation,
    /// y for horizontal edges, x for vertical edges
    pub position: f32,
    /// Lower end along the edge direction
    pub start: f32,
    /// Upper end along the edge direction
    pub end: f32,
}

impl Edge {
    pub fn horizontal(y: f32, x0: f32, x1: f32) -> Self {
        Edge {
            orientation: Orientation::Horizontal,
            position: y,
            start: x0.min(x1),
            end: x0.max(x1),
        }
    }

    pub fn vertical(x: f32, y0: f32, y1: f32) -> Self {
        Edge {
            orientation: Orientation::Vertical,
            position: x,
            start: y0.min(y1),
            end: y0.max(y1),
        }
    }

    pub fn length(&self) -> f32 {
        self.end - self.start
    }

    pub fn bbox(&self) -> BBox {
        match self.orientation {
            Orientation::Horizontal => BBox::new(self.start, self.position, self.end, self.position),
            Orientation::Vertical => BBox::new(self.position, self.start, self.position, self.end),
        }
    }
}

/// Everything extracted from one page
#[derive(Debug, Clone, Default)]
pub struct PageLayout {
    /// Page number (1-indexed)
    pub number: u32,
    /// Page MediaBox
    pub media_box: BBox,
    pub spans: Vec<TextSpan>,
    pub edges: Vec<Edge>,
}

/// All pages of a document
#[derive(Debug, Clone, Default)]
pub struct DocumentLayout {
    pub pages: Vec<PageLayout>,
}

impl DocumentLayout {
    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    pub fn page(&self, number: u32) -> Option<&PageLayout> {
        self.pages.iter().find(|p| p.number == number)
    }

    /// Spans of every page in reading order
    pub fn spans(&self) -> impl Iterator<Item = &TextSpan> {
        self.pages.iter().flat_map(|p| p.spans.iter())
    }
}

/// Extract spans and edges from a PDF file
pub fn extract_layout<P: AsRef<Path>>(path: P) -> Result<DocumentLayout, OutlineError> {
    let doc = Document::load(path)?;
    checked_layout(&doc)
}

/// Extract spans and edges from a PDF memory buffer
pub fn extract_layout_mem(buffer: &[u8]) -> Result<DocumentLayout, OutlineError> {
    let doc = Document::load_mem(buffer)?;
    checked_layout(&doc)
}

/// A document without a page tree cannot carry an outline
fn checked_layout(doc: &Document) -> Result<DocumentLayout, OutlineError> {
    if doc.get_pages().is_empty() {
        return Err(OutlineError::InvalidStructure);
    }
    Ok(extract_layout_from_doc(doc))
}

/// Extract spans and edges from a loaded document.
///
/// Pages whose content cannot be decoded contribute zero spans.
pub fn extract_layout_from_doc(doc: &Document) -> DocumentLayout {
    let mut pages = Vec::new();
    let mut order = 0usize;

    for (&page_num, &page_id) in doc.get_pages().iter() {
        let media_box = page_media_box(doc, page_id);
        let (spans, edges) = match extract_page(doc, page_id, page_num, &mut order) {
            Ok(found) => found,
            Err(e) => {
                log::warn!("page {}: unreadable content stream, skipping: {}", page_num, e);
                (Vec::new(), Vec::new())
            }
        };
        log::debug!(
            "page {}: {} spans, {} ruling edges",
            page_num,
            spans.len(),
            edges.len()
        );
        pages.push(PageLayout {
            number: page_num,
            media_box,
            spans,
            edges,
        });
    }

    DocumentLayout { pages }
}

/// Multiply two 2D transformation matrices
/// Matrix format: [a, b, c, d, e, f] representing:
/// | a  b  0 |
/// | c  d  0 |
/// | e  f  1 |
fn multiply_matrices(m1: &[f32; 6], m2: &[f32; 6]) -> [f32; 6] {
    [
        m1[0] * m2[0] + m1[1] * m2[2],
        m1[0] * m2[1] + m1[1] * m2[3],
        m1[2] * m2[0] + m1[3] * m2[2],
        m1[2] * m2[1] + m1[3] * m2[3],
        m1[4] * m2[0] + m1[5] * m2[2] + m2[4],
        m1[4] * m2[1] + m1[5] * m2[3] + m2[5],
    ]
}

fn translate(tx: f32, ty: f32) -> [f32; 6] {
    [1.0, 0.0, 0.0, 1.0, tx, ty]
}

fn apply(m: &[f32; 6], x: f32, y: f32) -> (f32, f32) {
    (m[0] * x + m[2] * y + m[4], m[1] * x + m[3] * y + m[5])
}

const IDENTITY: [f32; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// Graphics state saved by `q` and restored by `Q`
#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: [f32; 6],
    font: String,
    font_size: f32,
    char_spacing: f32,
    word_spacing: f32,
    horizontal_scale: f32,
    leading: Option<f32>,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: IDENTITY,
            font: String::new(),
            font_size: 12.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: None,
        }
    }
}

impl GraphicsState {
    /// Line advance for T*, ' and "; approximated from the font size when TL was never set
    fn line_advance(&self) -> f32 {
        self.leading.unwrap_or(self.font_size * 1.2)
    }
}

/// A path under construction, in user space
#[derive(Debug, Default)]
struct PathBuilder {
    segments: Vec<((f32, f32), (f32, f32))>,
    rects: Vec<BBox>,
    current: Option<(f32, f32)>,
    subpath_start: Option<(f32, f32)>,
}

impl PathBuilder {
    fn move_to(&mut self, p: (f32, f32)) {
        self.current = Some(p);
        self.subpath_start = Some(p);
    }

    fn line_to(&mut self, p: (f32, f32)) {
        if let Some(from) = self.current {
            self.segments.push((from, p));
        }
        self.current = Some(p);
    }

    fn close(&mut self) {
        if let (Some(from), Some(to)) = (self.current, self.subpath_start) {
            if from != to {
                self.segments.push((from, to));
            }
            self.current = Some(to);
        }
    }

    /// Turn the painted path into ruling edges and reset it
    fn paint(&mut self, edges: &mut Vec<Edge>) {
        for &((x0, y0), (x1, y1)) in &self.segments {
            if (y1 - y0).abs() <= 1.0 && (x1 - x0).abs() > 1.0 {
                edges.push(Edge::horizontal((y0 + y1) / 2.0, x0, x1));
            } else if (x1 - x0).abs() <= 1.0 && (y1 - y0).abs() > 1.0 {
                edges.push(Edge::vertical((x0 + x1) / 2.0, y0, y1));
            }
        }

        for rect in &self.rects {
            let (w, h) = (rect.width(), rect.height());
            if h <= RULE_THICKNESS && w > RULE_THICKNESS {
                edges.push(Edge::horizontal((rect.y0 + rect.y1) / 2.0, rect.x0, rect.x1));
            } else if w <= RULE_THICKNESS && h > RULE_THICKNESS {
                edges.push(Edge::vertical((rect.x0 + rect.x1) / 2.0, rect.y0, rect.y1));
            } else if w > RULE_THICKNESS && h > RULE_THICKNESS {
                edges.push(Edge::horizontal(rect.y0, rect.x0, rect.x1));
                edges.push(Edge::horizontal(rect.y1, rect.x0, rect.x1));
                edges.push(Edge::vertical(rect.x0, rect.y0, rect.y1));
                edges.push(Edge::vertical(rect.x1, rect.y0, rect.y1));
            }
        }

        self.clear();
    }

    fn clear(&mut self) {
        self.segments.clear();
        self.rects.clear();
        self.current = None;
        self.subpath_start = None;
    }
}

/// Interpret a single page's content stream
fn extract_page(
    doc: &Document,
    page_id: ObjectId,
    page_num: u32,
    order: &mut usize,
) -> Result<(Vec<TextSpan>, Vec<Edge>), OutlineError> {
    let fonts = PageFonts::load(doc, page_id);

    let content_data = doc
        .get_page_content(page_id)
        .map_err(|e| OutlineError::Parse(e.to_string()))?;
    let content = Content::decode(&content_data).map_err(|e| OutlineError::Parse(e.to_string()))?;

    let mut spans = Vec::new();
    let mut edges = Vec::new();

    let mut gs = GraphicsState::default();
    let mut gs_stack: Vec<GraphicsState> = Vec::new();
    let mut path = PathBuilder::default();

    let mut text_matrix = IDENTITY;
    let mut line_matrix = IDENTITY;
    let mut in_text_block = false;

    for op in &content.operations {
        let num = |i: usize| op.operands.get(i).and_then(get_number);

        match op.operator.as_str() {
            "q" => gs_stack.push(gs.clone()),
            "Q" => {
                if let Some(saved) = gs_stack.pop() {
                    gs = saved;
                }
            }
            "cm" => {
                if op.operands.len() >= 6 {
                    let m = [
                        num(0).unwrap_or(1.0),
                        num(1).unwrap_or(0.0),
                        num(2).unwrap_or(0.0),
                        num(3).unwrap_or(1.0),
                        num(4).unwrap_or(0.0),
                        num(5).unwrap_or(0.0),
                    ];
                    gs.ctm = multiply_matrices(&m, &gs.ctm);
                }
            }

            // Path construction
            "m" => {
                if let (Some(x), Some(y)) = (num(0), num(1)) {
                    path.move_to(apply(&gs.ctm, x, y));
                }
            }
            "l" => {
                if let (Some(x), Some(y)) = (num(0), num(1)) {
                    path.line_to(apply(&gs.ctm, x, y));
                }
            }
            "re" => {
                if let (Some(x), Some(y), Some(w), Some(h)) = (num(0), num(1), num(2), num(3)) {
                    let (ax, ay) = apply(&gs.ctm, x, y);
                    let (bx, by) = apply(&gs.ctm, x + w, y + h);
                    path.rects.push(BBox::new(ax, ay, bx, by));
                    path.move_to((ax, ay));
                }
            }
            "h" => path.close(),
            "S" | "f" | "F" | "f*" | "B" | "B*" => path.paint(&mut edges),
            "s" | "b" | "b*" => {
                path.close();
                path.paint(&mut edges);
            }
            "n" => path.clear(),

            // Text state
            "BT" => {
                in_text_block = true;
                text_matrix = IDENTITY;
                line_matrix = IDENTITY;
            }
            "ET" => in_text_block = false,
            "Tf" => {
                if op.operands.len() >= 2 {
                    if let Ok(name) = op.operands[0].as_name() {
                        gs.font = String::from_utf8_lossy(name).to_string();
                    }
                    if let Some(size) = num(1) {
                        gs.font_size = size;
                    }
                }
            }
            "Tc" => gs.char_spacing = num(0).unwrap_or(0.0),
            "Tw" => gs.word_spacing = num(0).unwrap_or(0.0),
            "Tz" => gs.horizontal_scale = num(0).unwrap_or(100.0) / 100.0,
            "TL" => gs.leading = num(0),
            "Td" | "TD" => {
                if let (Some(tx), Some(ty)) = (num(0), num(1)) {
                    if op.operator == "TD" {
                        gs.leading = Some(-ty);
                    }
                    line_matrix = multiply_matrices(&translate(tx, ty), &line_matrix);
                    text_matrix = line_matrix;
                }
            }
            "Tm" => {
                if op.operands.len() >= 6 {
                    for (i, operand) in op.operands.iter().take(6).enumerate() {
                        text_matrix[i] =
                            get_number(operand).unwrap_or(if i == 0 || i == 3 { 1.0 } else { 0.0 });
                    }
                    line_matrix = text_matrix;
                }
            }
            "T*" => {
                line_matrix = multiply_matrices(&translate(0.0, -gs.line_advance()), &line_matrix);
                text_matrix = line_matrix;
            }

            // Text showing
            "Tj" | "'" | "\"" | "TJ" => {
                if !in_text_block {
                    continue;
                }
                let operand = match op.operator.as_str() {
                    "'" => {
                        line_matrix =
                            multiply_matrices(&translate(0.0, -gs.line_advance()), &line_matrix);
                        text_matrix = line_matrix;
                        op.operands.first()
                    }
                    "\"" => {
                        gs.word_spacing = num(0).unwrap_or(gs.word_spacing);
                        gs.char_spacing = num(1).unwrap_or(gs.char_spacing);
                        line_matrix =
                            multiply_matrices(&translate(0.0, -gs.line_advance()), &line_matrix);
                        text_matrix = line_matrix;
                        op.operands.get(2)
                    }
                    _ => op.operands.first(),
                };
                let Some(operand) = operand else {
                    continue;
                };

                let font = fonts.get(&gs.font);
                let (text, advance) = show_text(operand, doc, font, &gs);
                let start_matrix = text_matrix;
                text_matrix = multiply_matrices(&translate(advance, 0.0), &text_matrix);

                if text.trim().is_empty() {
                    continue;
                }

                let combined = multiply_matrices(&start_matrix, &gs.ctm);
                let font_size = effective_font_size(gs.font_size, &combined);
                let (x0, y0) = apply(&combined, 0.0, 0.0);
                let (x1, _) = apply(&combined, advance, 0.0);
                let bbox = BBox::new(
                    x0.min(x1),
                    y0 - font_size * DESCENT,
                    x0.max(x1),
                    y0 + font_size * ASCENT,
                );

                let font_name = font
                    .map(|f| f.base_font.clone())
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| gs.font.clone());

                spans.push(TextSpan {
                    text,
                    font_size,
                    font_name,
                    bbox,
                    page: page_num,
                    order: *order,
                });
                *order += 1;
            }
            _ => {}
        }
    }

    Ok((spans, edges))
}

/// Decode a text operand and measure its advance in unscaled text space.
///
/// TJ arrays mix strings with kerning adjustments in 1/1000 em; a large
/// negative adjustment is a visual word gap and becomes a space.
fn show_text(
    operand: &Object,
    doc: &Document,
    font: Option<&FontInfo>,
    gs: &GraphicsState,
) -> (String, f32) {
    match operand {
        Object::String(bytes, _) => string_advance(bytes, doc, font, gs),
        Object::Array(parts) => {
            let mut text = String::new();
            let mut advance = 0.0;
            for part in parts {
                match part {
                    Object::String(bytes, _) => {
                        let (t, a) = string_advance(bytes, doc, font, gs);
                        text.push_str(&t);
                        advance += a;
                    }
                    other => {
                        if let Some(adjust) = get_number(other) {
                            advance -= adjust / 1000.0 * gs.font_size * gs.horizontal_scale;
                            if adjust < -200.0 && !text.is_empty() && !text.ends_with(' ') {
                                text.push(' ');
                            }
                        }
                    }
                }
            }
            (text, advance)
        }
        _ => (String::new(), 0.0),
    }
}

fn string_advance(
    bytes: &[u8],
    doc: &Document,
    font: Option<&FontInfo>,
    gs: &GraphicsState,
) -> (String, f32) {
    let (text, glyph_units, codes) = match font {
        Some(font) => {
            let codes = font.codes(bytes);
            let units: f32 = codes.iter().map(|&c| font.glyph_width(c)).sum();
            let spaces = codes.iter().filter(|&&c| c == 32).count();
            (font.decode(doc, bytes), units, (codes.len(), spaces))
        }
        None => {
            let text = crate::fonts::decode_fallback(bytes);
            let spaces = bytes.iter().filter(|&&b| b == b' ').count();
            (text, bytes.len() as f32 * 500.0, (bytes.len(), spaces))
        }
    };

    let (glyphs, spaces) = codes;
    let advance = (glyph_units / 1000.0 * gs.font_size
        + gs.char_spacing * glyphs as f32
        + gs.word_spacing * spaces as f32)
        * gs.horizontal_scale;

    (text, advance)
}

/// Compute effective font size from base size and the combined text/CTM matrix
fn effective_font_size(base_size: f32, matrix: &[f32; 6]) -> f32 {
    let scale_x = (matrix[0].powi(2) + matrix[1].powi(2)).sqrt();
    let scale_y = (matrix[2].powi(2) + matrix[3].powi(2)).sqrt();
    // Rotated or mirrored text still reports its visual size
    let scale = scale_x.max(scale_y);
    (base_size * scale).abs()
}

/// The page's MediaBox, following /Parent for inherited values
fn page_media_box(doc: &Document, page_id: ObjectId) -> BBox {
    let mut current = doc.get_dictionary(page_id).ok();
    let mut depth = 0;

    while let Some(dict) = current {
        if let Ok(mb) = dict.get(b"MediaBox") {
            if let Ok(values) = resolve(doc, mb).as_array() {
                let nums: Vec<f32> = values
                    .iter()
                    .filter_map(|v| get_number(resolve(doc, v)))
                    .collect();
                if nums.len() == 4 {
                    return BBox::new(nums[0], nums[1], nums[2], nums[3]);
                }
            }
        }
        depth += 1;
        if depth > 32 {
            break;
        }
        current = dict
            .get(b"Parent")
            .ok()
            .and_then(|p| p.as_reference().ok())
            .and_then(|id| doc.get_dictionary(id).ok());
    }

    DEFAULT_MEDIA_BOX
}
