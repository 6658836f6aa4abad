//! Pipeline options and input/output directory resolution

use crate::classifier::HeadingLevel;
use crate::hierarchy::{DedupMode, PageOverrides};
use crate::tables::TableStrategy;
use crate::OutlineError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Environment variable selecting the container directory layout
pub const CONTAINER_ENV: &str = "RUN_IN_CONTAINER";

/// A heading recognized by its exact text
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SpecialSection {
    pub text: String,
    pub level: HeadingLevel,
}

impl SpecialSection {
    pub fn new(text: impl Into<String>, level: HeadingLevel) -> Self {
        Self {
            text: text.into(),
            level,
        }
    }
}

/// Options controlling outline extraction.
///
/// Every field has a default, so a config file only needs the keys it
/// changes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutlineOptions {
    /// Table finder used to suppress headings inside tables
    pub table_strategy: TableStrategy,
    /// Overlap ratio at which a span counts as inside a table
    pub table_overlap_threshold: f32,
    /// Longer lines never become headings
    pub max_heading_chars: usize,
    /// Shorter lines never become headings
    pub min_heading_chars: usize,
    /// Promote large lines that match no heading rule
    pub size_fallback: bool,
    /// Number of size bands (1-3) mapped to H1..H3
    pub max_size_bands: usize,
    /// A line must be larger than page median × this ratio to be promoted
    pub body_size_ratio: f32,
    pub dedup: DedupMode,
    /// Apply the shipped page override table
    pub builtin_overrides: bool,
    /// Extra overrides, merged over the builtin table
    pub overrides: BTreeMap<String, u32>,
    /// Fraction of page height treated as running header/footer (0 disables)
    pub header_footer_margin: f32,
    /// Exact-text headings, checked after the numbering rules
    pub special_sections: Vec<SpecialSection>,
    /// Additional veto patterns (regex syntax)
    pub extra_invalid_patterns: Vec<String>,
    /// Drop repeated draws of the same title text on page 1
    pub collapse_title_repeats: bool,
}

impl Default for OutlineOptions {
    fn default() -> Self {
        Self {
            table_strategy: TableStrategy::default(),
            table_overlap_threshold: 0.9,
            max_heading_chars: 100,
            min_heading_chars: 2,
            size_fallback: true,
            max_size_bands: 3,
            body_size_ratio: 1.0,
            dedup: DedupMode::default(),
            builtin_overrides: true,
            overrides: BTreeMap::new(),
            header_footer_margin: 0.0,
            special_sections: default_special_sections(),
            extra_invalid_patterns: Vec::new(),
            collapse_title_repeats: true,
        }
    }
}

fn default_special_sections() -> Vec<SpecialSection> {
    vec![
        SpecialSection::new("References", HeadingLevel::H1),
        SpecialSection::new("Acknowledgements", HeadingLevel::H1),
        SpecialSection::new("Revision History", HeadingLevel::H1),
        SpecialSection::new("Table of Contents", HeadingLevel::H1),
        SpecialSection::new("Syllabus", HeadingLevel::H3),
    ]
}

impl OutlineOptions {
    /// Load options from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, OutlineError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let options: OutlineOptions = serde_json::from_str(&raw)
            .map_err(|e| OutlineError::Config(format!("{}: {}", path.display(), e)))?;
        options.validate()?;
        Ok(options)
    }

    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> Result<(), OutlineError> {
        if self.table_overlap_threshold <= 0.0 || self.table_overlap_threshold > 1.0 {
            return Err(OutlineError::Config(format!(
                "table_overlap_threshold must be in (0, 1], got {}",
                self.table_overlap_threshold
            )));
        }
        if !(0.0..0.5).contains(&self.header_footer_margin) {
            return Err(OutlineError::Config(format!(
                "header_footer_margin must be in [0, 0.5), got {}",
                self.header_footer_margin
            )));
        }
        if !self.body_size_ratio.is_finite() || self.body_size_ratio <= 0.0 {
            return Err(OutlineError::Config(format!(
                "body_size_ratio must be positive, got {}",
                self.body_size_ratio
            )));
        }
        if !(1..=3).contains(&self.max_size_bands) {
            return Err(OutlineError::Config(format!(
                "max_size_bands must be 1, 2 or 3, got {}",
                self.max_size_bands
            )));
        }
        if self.min_heading_chars > self.max_heading_chars {
            return Err(OutlineError::Config(format!(
                "min_heading_chars ({}) exceeds max_heading_chars ({})",
                self.min_heading_chars, self.max_heading_chars
            )));
        }
        if let Some((text, _)) = self.overrides.iter().find(|(_, page)| **page == 0) {
            return Err(OutlineError::Config(format!(
                "override for {:?} uses page 0; pages are 1-based",
                text
            )));
        }
        Ok(())
    }

    /// The effective override table
    pub fn page_overrides(&self) -> PageOverrides {
        let mut overrides = if self.builtin_overrides {
            PageOverrides::builtin()
        } else {
            PageOverrides::new()
        };
        overrides.extend(self.overrides.iter().map(|(k, v)| (k.as_str(), *v)));
        overrides
    }
}

/// Batch input and output directories
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchDirs {
    pub input: PathBuf,
    pub output: PathBuf,
}

impl BatchDirs {
    /// Explicit paths win; otherwise the layout depends on [`CONTAINER_ENV`]
    pub fn resolve(input: Option<PathBuf>, output: Option<PathBuf>) -> Self {
        let in_container = std::env::var(CONTAINER_ENV)
            .is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));
        Self::resolve_with(input, output, in_container)
    }

    pub fn resolve_with(input: Option<PathBuf>, output: Option<PathBuf>, in_container: bool) -> Self {
        let base = if in_container {
            PathBuf::from("/app")
        } else {
            PathBuf::from("app")
        };
        Self {
            input: input.unwrap_or_else(|| base.join("input")),
            output: output.unwrap_or_else(|| base.join("output")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let options = OutlineOptions::default();
        assert_eq!(options.table_strategy, TableStrategy::Lines);
        assert!((options.table_overlap_threshold - 0.9).abs() < f32::EPSILON);
        assert_eq!(options.dedup, DedupMode::Consecutive);
        assert_eq!(options.special_sections.len(), 5);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_partial_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"table_strategy": "both", "dedup": "global", "overrides": {{"Appendix": 4}}}}"#
        )
        .unwrap();

        let options = OutlineOptions::load_from_file(file.path()).unwrap();
        assert_eq!(options.table_strategy, TableStrategy::Both);
        assert_eq!(options.dedup, DedupMode::Global);
        assert_eq!(options.max_heading_chars, 100);
        assert_eq!(options.page_overrides().get("Appendix"), Some(4));
        assert_eq!(options.page_overrides().get("Revision History"), Some(2));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"tabel_strategy": "text"}}"#).unwrap();
        assert!(matches!(
            OutlineOptions::load_from_file(file.path()),
            Err(OutlineError::Config(_))
        ));
    }

    #[test]
    fn test_validate_ranges() {
        let options = OutlineOptions {
            table_overlap_threshold: 1.5,
            ..OutlineOptions::default()
        };
        assert!(options.validate().is_err());

        let mut options = OutlineOptions::default();
        options.overrides.insert("Intro".into(), 0);
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_validate_size_banding() {
        for ratio in [0.0, -1.0, f32::NAN] {
            let options = OutlineOptions {
                body_size_ratio: ratio,
                ..OutlineOptions::default()
            };
            assert!(matches!(options.validate(), Err(OutlineError::Config(_))));
        }
        for bands in [0, 4] {
            let options = OutlineOptions {
                max_size_bands: bands,
                ..OutlineOptions::default()
            };
            assert!(matches!(options.validate(), Err(OutlineError::Config(_))));
        }
        let options = OutlineOptions {
            body_size_ratio: 1.15,
            max_size_bands: 2,
            ..OutlineOptions::default()
        };
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_builtin_overrides_disabled() {
        let options = OutlineOptions {
            builtin_overrides: false,
            ..OutlineOptions::default()
        };
        assert!(options.page_overrides().is_empty());
    }

    #[test]
    fn test_resolve_dirs() {
        let dirs = BatchDirs::resolve_with(None, None, true);
        assert_eq!(dirs.input, PathBuf::from("/app/input"));
        assert_eq!(dirs.output, PathBuf::from("/app/output"));

        let dirs = BatchDirs::resolve_with(Some("pdfs".into()), None, false);
        assert_eq!(dirs.input, PathBuf::from("pdfs"));
        assert_eq!(dirs.output, PathBuf::from("app/output"));
    }
}
