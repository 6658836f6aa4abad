//! Heading classification
//!
//! Each candidate line goes through three stages:
//! 1. vetoes: invalid patterns reject descriptive prose that happens to look
//!    like a heading (lowercase-led numbered items, connector phrases,
//!    trailing sentence punctuation)
//! 2. heading rules: an ordered list of (pattern, level) pairs, first match wins
//! 3. size banding: lines set larger than the page's median body size are
//!    promoted by their rank among the document's prominent sizes
//!
//! A rule match always beats the size fallback.

use crate::config::OutlineOptions;
use crate::filter::FilteredLine;
use crate::layout::{median_font_size, TextLine};
use crate::OutlineError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Outline depth
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HeadingLevel {
    H1,
    H2,
    H3,
}

impl HeadingLevel {
    /// Level for a zero-based band or numbering depth, capped at H3
    pub fn from_depth(depth: usize) -> Self {
        match depth {
            0 => HeadingLevel::H1,
            1 => HeadingLevel::H2,
            _ => HeadingLevel::H3,
        }
    }
}

impl fmt::Display for HeadingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HeadingLevel::H1 => "H1",
            HeadingLevel::H2 => "H2",
            HeadingLevel::H3 => "H3",
        };
        f.write_str(s)
    }
}

/// A detected heading
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingCandidate {
    pub level: HeadingLevel,
    pub text: String,
    /// Page number (1-indexed)
    pub page: u32,
}

/// How a line became a heading
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Matched the named heading rule
    Rule(String, HeadingLevel),
    /// Promoted by font size banding
    Size(HeadingLevel),
    /// Rejected by an invalid pattern (index into the veto list)
    Vetoed(usize),
    /// Nothing matched
    Body,
}

impl Verdict {
    pub fn level(&self) -> Option<HeadingLevel> {
        match self {
            Verdict::Rule(_, level) | Verdict::Size(level) => Some(*level),
            Verdict::Vetoed(_) | Verdict::Body => None,
        }
    }
}

/// Descriptive prose that superficially resembles a heading
static DEFAULT_INVALID_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\b(?:who have|who are|professionals|junior|experienced)\b",
        r"(?i)\b(?:including|implement|required|receive|achieve)\b",
        r"(?i)^(?:This document|The certification|Building on)",
        // Numbered list item continuing a sentence
        r"^\d+\.\s+[a-z]",
        r"[.;,]\s*$",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static NUMBERED_H1: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\.\s+[A-Z]").unwrap());
static NUMBERED_H2: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\.\d+\.?\s+[A-Z]").unwrap());
static NUMBERED_H3: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\.\d+\.\d+\.?\s+[A-Z]").unwrap());

/// One entry of the ordered heading rule list
#[derive(Debug, Clone)]
pub struct HeadingRule {
    pub name: String,
    pub pattern: Regex,
    pub level: HeadingLevel,
}

impl HeadingRule {
    pub fn new(name: impl Into<String>, pattern: Regex, level: HeadingLevel) -> Self {
        Self {
            name: name.into(),
            pattern,
            level,
        }
    }
}

/// Compiled classification rules, built once per batch run
#[derive(Debug, Clone)]
pub struct HeadingClassifier {
    invalid: Vec<Regex>,
    rules: Vec<HeadingRule>,
    min_chars: usize,
    max_chars: usize,
    size_fallback: bool,
    max_size_bands: usize,
    body_size_ratio: f32,
}

impl HeadingClassifier {
    pub fn new(options: &OutlineOptions) -> Result<Self, OutlineError> {
        let mut invalid: Vec<Regex> = DEFAULT_INVALID_PATTERNS.iter().cloned().collect();
        for pattern in &options.extra_invalid_patterns {
            invalid.push(compile(pattern)?);
        }

        let mut rules = vec![
            HeadingRule::new("numbered", NUMBERED_H1.clone(), HeadingLevel::H1),
            HeadingRule::new("numbered-2", NUMBERED_H2.clone(), HeadingLevel::H2),
            HeadingRule::new("numbered-3", NUMBERED_H3.clone(), HeadingLevel::H3),
        ];
        for section in &options.special_sections {
            let pattern = compile(&format!(r"^(?:{})$", regex::escape(section.text.trim())))?;
            rules.push(HeadingRule::new(
                format!("section:{}", section.text.trim()),
                pattern,
                section.level,
            ));
        }

        Ok(Self {
            invalid,
            rules,
            min_chars: options.min_heading_chars,
            max_chars: options.max_heading_chars,
            size_fallback: options.size_fallback,
            max_size_bands: options.max_size_bands.clamp(1, 3),
            body_size_ratio: options.body_size_ratio,
        })
    }

    pub fn rules(&self) -> &[HeadingRule] {
        &self.rules
    }

    /// Index of the first invalid pattern matching `text`
    pub fn veto(&self, text: &str) -> Option<usize> {
        self.invalid.iter().position(|re| re.is_match(text))
    }

    /// Pattern-only classification of a single text (stages 1 and 2)
    pub fn classify_text(&self, text: &str) -> Verdict {
        let text = text.trim();
        let chars = text.chars().count();
        if chars < self.min_chars || chars > self.max_chars || text == "•" {
            return Verdict::Body;
        }
        if let Some(idx) = self.veto(text) {
            return Verdict::Vetoed(idx);
        }
        self.rules
            .iter()
            .find(|rule| rule.pattern.is_match(text))
            .map(|rule| Verdict::Rule(rule.name.clone(), rule.level))
            .unwrap_or(Verdict::Body)
    }

    /// Classify every candidate line of a document, in reading order
    pub fn classify_lines(&self, lines: &[FilteredLine]) -> Vec<HeadingCandidate> {
        self.verdicts(lines)
            .into_iter()
            .zip(lines)
            .filter_map(|(verdict, fl)| {
                verdict.level().map(|level| HeadingCandidate {
                    level,
                    text: fl.line.text(),
                    page: fl.line.page,
                })
            })
            .collect()
    }

    /// Verdict for every line (excluded lines are `Body`)
    pub fn verdicts(&self, lines: &[FilteredLine]) -> Vec<Verdict> {
        let medians = page_medians(lines);

        let mut verdicts: Vec<Verdict> = lines
            .iter()
            .map(|fl| {
                if fl.is_candidate() {
                    self.classify_text(&fl.line.text())
                } else {
                    Verdict::Body
                }
            })
            .collect();

        if !self.size_fallback {
            return verdicts;
        }

        // Lines eligible for promotion by size, with their banded size key
        let eligible: Vec<(usize, i32)> = lines
            .iter()
            .enumerate()
            .filter(|(i, fl)| fl.is_candidate() && verdicts[*i] == Verdict::Body)
            .filter(|(_, fl)| {
                let body = medians.get(&fl.line.page).copied().unwrap_or(f32::MAX);
                fl.line.font_size() > body * self.body_size_ratio
                    && looks_like_title_text(&fl.line, self.min_chars, self.max_chars)
            })
            .map(|(i, fl)| (i, size_key(fl.line.font_size())))
            .collect();

        let mut bands: Vec<i32> = eligible.iter().map(|(_, k)| *k).collect();
        bands.sort_unstable_by(|a, b| b.cmp(a));
        bands.dedup();
        bands.truncate(self.max_size_bands);

        for (i, key) in eligible {
            if let Some(rank) = bands.iter().position(|b| *b == key) {
                verdicts[i] = Verdict::Size(HeadingLevel::from_depth(rank));
            }
        }

        verdicts
    }
}

fn compile(pattern: &str) -> Result<Regex, OutlineError> {
    Regex::new(pattern).map_err(|e| OutlineError::Config(format!("bad pattern {:?}: {}", pattern, e)))
}

/// Round to half points so near-identical sizes share a band
fn size_key(size: f32) -> i32 {
    (size * 2.0).round() as i32
}

/// Median span font size per page, over every line including excluded ones
fn page_medians(lines: &[FilteredLine]) -> HashMap<u32, f32> {
    let mut sizes: HashMap<u32, Vec<f32>> = HashMap::new();
    for fl in lines {
        sizes
            .entry(fl.line.page)
            .or_default()
            .extend(fl.line.spans.iter().map(|s| s.font_size));
    }
    sizes
        .into_iter()
        .filter_map(|(page, sizes)| median_font_size(&sizes).map(|m| (page, m)))
        .collect()
}

/// Shape checks for size-promoted lines: within the length limits, has
/// letters, and not a sentence fragment (more than three words starting lowercase)
fn looks_like_title_text(line: &TextLine, min_chars: usize, max_chars: usize) -> bool {
    let text = line.text();
    let chars = text.chars().count();
    if chars < min_chars || chars > max_chars || !text.chars().any(char::is_alphabetic) {
        return false;
    }
    let words: Vec<&str> = text.split_whitespace().collect();
    let lowercase_start = words
        .first()
        .and_then(|w| w.chars().next())
        .is_some_and(char::is_lowercase);
    !(words.len() > 3 && lowercase_start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::TextSpan;
    use crate::filter::Exclusion;
    use crate::geometry::BBox;

    fn classifier() -> HeadingClassifier {
        HeadingClassifier::new(&OutlineOptions::default()).unwrap()
    }

    fn fl(text: &str, size: f32, page: u32) -> FilteredLine {
        let span = TextSpan {
            text: text.into(),
            font_size: size,
            font_name: "Arial".into(),
            bbox: BBox::new(72.0, 500.0, 300.0, 500.0 + size),
            page,
            order: 0,
        };
        FilteredLine {
            line: TextLine {
                y: 500.0,
                page,
                spans: vec![span],
            },
            excluded: None,
        }
    }

    #[test]
    fn test_numbered_levels() {
        let c = classifier();
        assert_eq!(c.classify_text("1. Introduction").level(), Some(HeadingLevel::H1));
        assert_eq!(c.classify_text("2.3 Learning Objectives").level(), Some(HeadingLevel::H2));
        assert_eq!(c.classify_text("2.3.1 Scope").level(), Some(HeadingLevel::H3));
        assert_eq!(c.classify_text("Plain sentence text").level(), None);
    }

    #[test]
    fn test_special_sections() {
        let c = classifier();
        assert_eq!(c.classify_text("References").level(), Some(HeadingLevel::H1));
        assert_eq!(c.classify_text("Table of Contents").level(), Some(HeadingLevel::H1));
        assert_eq!(c.classify_text("Syllabus").level(), Some(HeadingLevel::H3));
        // Exact match only
        assert_eq!(c.classify_text("References to prior work").level(), None);
    }

    #[test]
    fn test_vetoes() {
        let c = classifier();
        assert!(matches!(c.classify_text("1. the tester should"), Verdict::Vetoed(_)));
        assert!(matches!(c.classify_text("2. Testers who have experience"), Verdict::Vetoed(_)));
        assert!(matches!(c.classify_text("3. Overview of the course."), Verdict::Vetoed(_)));
        assert!(matches!(
            c.classify_text("This document describes the syllabus"),
            Verdict::Vetoed(_)
        ));
    }

    #[test]
    fn test_length_limits() {
        let c = classifier();
        assert_eq!(c.classify_text("1"), Verdict::Body);
        let long = format!("1. {}", "A".repeat(120));
        assert_eq!(c.classify_text(&long), Verdict::Body);
    }

    #[test]
    fn test_size_banding() {
        let c = classifier();
        let lines = vec![
            fl("Big Section", 20.0, 1),
            fl("body text here", 10.0, 1),
            fl("more body text", 10.0, 1),
            fl("Medium Part", 16.0, 1),
            fl("body again", 10.0, 1),
            fl("Small Part", 13.0, 2),
            fl("body on page two", 10.0, 2),
            fl("body on page two again", 10.0, 2),
        ];
        let headings = c.classify_lines(&lines);
        let got: Vec<(&str, HeadingLevel)> =
            headings.iter().map(|h| (h.text.as_str(), h.level)).collect();
        assert_eq!(
            got,
            vec![
                ("Big Section", HeadingLevel::H1),
                ("Medium Part", HeadingLevel::H2),
                ("Small Part", HeadingLevel::H3),
            ]
        );
    }

    #[test]
    fn test_pattern_beats_size() {
        let c = classifier();
        let lines = vec![
            fl("2.1 Intended Audience", 24.0, 1),
            fl("body", 10.0, 1),
            fl("body", 10.0, 1),
        ];
        let headings = c.classify_lines(&lines);
        assert_eq!(headings.len(), 1);
        assert_eq!(headings[0].level, HeadingLevel::H2);
    }

    #[test]
    fn test_excluded_lines_never_headings() {
        let c = classifier();
        let mut line = fl("1. Budget Summary", 10.0, 1);
        line.excluded = Some(Exclusion::Table);
        assert!(c.classify_lines(&[line]).is_empty());
    }

    #[test]
    fn test_fallback_disabled() {
        let options = OutlineOptions {
            size_fallback: false,
            ..OutlineOptions::default()
        };
        let c = HeadingClassifier::new(&options).unwrap();
        let lines = vec![fl("Big Section", 20.0, 1), fl("body", 10.0, 1), fl("body", 10.0, 1)];
        assert!(c.classify_lines(&lines).is_empty());
    }

    #[test]
    fn test_sentence_fragment_not_promoted() {
        let c = classifier();
        let lines = vec![
            fl("and then some more words", 20.0, 1),
            fl("body", 10.0, 1),
            fl("body", 10.0, 1),
        ];
        assert!(c.classify_lines(&lines).is_empty());
    }

    #[test]
    fn test_drop_cap_not_promoted() {
        let c = classifier();
        let lines = vec![
            fl("T", 36.0, 1),
            fl("he committee met twice", 10.0, 1),
            fl("body text", 10.0, 1),
        ];
        assert_eq!(c.verdicts(&lines)[0], Verdict::Body);
        assert!(c.classify_lines(&lines).is_empty());
    }

    #[test]
    fn test_bad_extra_pattern_is_config_error() {
        let options = OutlineOptions {
            extra_invalid_patterns: vec!["(unclosed".into()],
            ..OutlineOptions::default()
        };
        assert!(matches!(
            HeadingClassifier::new(&options),
            Err(OutlineError::Config(_))
        ));
    }
}
