//! Title and outline extraction from digitally-authored PDFs using lopdf
//!
//! The pipeline reads the text layer and ruling lines of every page, then:
//! - takes the title from the largest type on page 1
//! - finds table regions and keeps their text out of the outline
//! - classifies the remaining lines as H1/H2/H3 by numbering, known section
//!   names and relative font size
//! - collapses running headers and resolves final page numbers

pub mod batch;
pub mod classifier;
pub mod config;
pub mod extractor;
pub mod filter;
pub mod fonts;
pub mod geometry;
pub mod hierarchy;
pub mod layout;
pub mod output;
pub mod tables;
pub mod title;
pub mod tounicode;

pub use batch::{list_pdfs, run_batch, BatchReport};
pub use classifier::{HeadingCandidate, HeadingClassifier, HeadingLevel, Verdict};
pub use config::{BatchDirs, OutlineOptions, SpecialSection};
pub use extractor::{extract_layout, extract_layout_mem, DocumentLayout, PageLayout, TextSpan};
pub use geometry::BBox;
pub use hierarchy::{DedupMode, PageOverrides};
pub use output::OutlineDocument;
pub use tables::{TableRegion, TableStrategy};
pub use title::extract_title;

use filter::FilteredLine;
use std::path::{Path, PathBuf};

/// Outline extraction with a fixed set of options.
///
/// Patterns and the override table are compiled once here and reused for
/// every document, so one extractor serves a whole batch run.
#[derive(Debug, Clone)]
pub struct OutlineExtractor {
    options: OutlineOptions,
    classifier: HeadingClassifier,
    overrides: PageOverrides,
}

impl OutlineExtractor {
    pub fn new(options: OutlineOptions) -> Result<Self, OutlineError> {
        options.validate()?;
        let classifier = HeadingClassifier::new(&options)?;
        let overrides = options.page_overrides();
        Ok(Self {
            options,
            classifier,
            overrides,
        })
    }

    pub fn options(&self) -> &OutlineOptions {
        &self.options
    }

    pub fn classifier(&self) -> &HeadingClassifier {
        &self.classifier
    }

    /// Extract the outline of a PDF file
    pub fn extract_file<P: AsRef<Path>>(&self, path: P) -> Result<OutlineDocument, OutlineError> {
        let layout = extract_layout(path)?;
        Ok(self.extract_from_layout(&layout))
    }

    /// Extract the outline of a PDF held in memory
    pub fn extract_mem(&self, buffer: &[u8]) -> Result<OutlineDocument, OutlineError> {
        let layout = extract_layout_mem(buffer)?;
        Ok(self.extract_from_layout(&layout))
    }

    /// Run the heading pipeline on already extracted pages
    pub fn extract_from_layout(&self, layout: &DocumentLayout) -> OutlineDocument {
        let title = layout
            .page(1)
            .map(|p| title::extract_title_with(&p.spans, self.options.collapse_title_repeats))
            .unwrap_or_default();

        let regions = self.table_regions(layout);
        let lines = self.filtered_lines(layout, &regions);
        let candidates = self.classifier.classify_lines(&lines);
        log::debug!(
            "{} line(s), {} table region(s), {} heading candidate(s)",
            lines.len(),
            regions.len(),
            candidates.len()
        );

        let outline = hierarchy::assign_hierarchy(
            candidates,
            self.options.dedup,
            &self.overrides,
            layout.page_count(),
        );

        OutlineDocument::new(title, outline)
    }

    /// Table regions of every page
    pub fn table_regions(&self, layout: &DocumentLayout) -> Vec<TableRegion> {
        layout
            .pages
            .iter()
            .flat_map(|page| tables::detect_table_regions(page, self.options.table_strategy))
            .collect()
    }

    /// Lines of every page with their spatial verdicts
    pub fn filtered_lines(&self, layout: &DocumentLayout, regions: &[TableRegion]) -> Vec<FilteredLine> {
        let lines = layout
            .pages
            .iter()
            .flat_map(|page| crate::layout::group_into_lines(&page.spans))
            .collect();
        filter::apply_spatial_filter(
            lines,
            regions,
            layout,
            self.options.table_overlap_threshold,
            self.options.header_footer_margin,
        )
    }
}

/// Extract the outline of a PDF file with default options
pub fn extract_outline<P: AsRef<Path>>(path: P) -> Result<OutlineDocument, OutlineError> {
    OutlineExtractor::new(OutlineOptions::default())?.extract_file(path)
}

#[derive(Debug, thiserror::Error)]
pub enum OutlineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parsing error: {0}")]
    Parse(String),
    #[error("Invalid PDF structure")]
    InvalidStructure,
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Input directory not found: {}", .0.display())]
    MissingInputDir(PathBuf),
}

impl From<lopdf::Error> for OutlineError {
    fn from(e: lopdf::Error) -> Self {
        OutlineError::Parse(e.to_string())
    }
}
