//! Sequential directory processing
//!
//! Files are handled one at a time in sorted name order. A file that fails
//! is logged and skipped; only a missing input directory stops the run.

use crate::{OutlineError, OutlineExtractor};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Outcome of a batch run
#[derive(Debug, Default)]
pub struct BatchReport {
    /// JSON files written
    pub written: Vec<PathBuf>,
    /// Inputs that failed, with the reason
    pub failed: Vec<(PathBuf, OutlineError)>,
}

impl BatchReport {
    pub fn processed(&self) -> usize {
        self.written.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// PDF files directly inside `dir`, sorted by name (`.pdf` in any case)
pub fn list_pdfs(dir: &Path) -> Result<Vec<PathBuf>, OutlineError> {
    if !dir.is_dir() {
        return Err(OutlineError::MissingInputDir(dir.to_path_buf()));
    }

    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_pdf(p))
        .collect();
    files.sort();
    Ok(files)
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

/// Process every PDF in `input`, writing one JSON per file into `output`
pub fn run_batch(
    input: &Path,
    output: &Path,
    extractor: &OutlineExtractor,
) -> Result<BatchReport, OutlineError> {
    let files = list_pdfs(input)?;
    fs::create_dir_all(output)?;

    log::info!("{} PDF file(s) in {}", files.len(), input.display());

    let mut report = BatchReport::default();
    for path in files {
        let start = Instant::now();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let result = extractor
            .extract_file(&path)
            .and_then(|doc| doc.write_to_dir(output, &stem));

        match result {
            Ok(written) => {
                log::info!(
                    "{} -> {} ({}ms)",
                    path.display(),
                    written.display(),
                    start.elapsed().as_millis()
                );
                report.written.push(written);
            }
            Err(e) => {
                log::error!("{}: {}", path.display(), e);
                report.failed.push((path, e));
            }
        }
    }

    log::info!(
        "done: {} written, {} failed",
        report.processed(),
        report.failed.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_pdfs_sorted_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.pdf", "a.PDF", "notes.txt", "c.Pdf"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("sub.pdf")).unwrap();

        let names: Vec<String> = list_pdfs(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.PDF", "b.pdf", "c.Pdf"]);
    }

    #[test]
    fn test_missing_input_dir() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("input");
        assert!(matches!(
            list_pdfs(&missing),
            Err(OutlineError::MissingInputDir(p)) if p == missing
        ));
    }

    #[test]
    fn test_corrupt_file_skipped() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        fs::write(input.path().join("broken.pdf"), b"not a pdf at all").unwrap();

        let extractor = OutlineExtractor::new(Default::default()).unwrap();
        let report = run_batch(input.path(), output.path(), &extractor).unwrap();
        assert_eq!(report.processed(), 0);
        assert_eq!(report.failed.len(), 1);
        assert!(!output.path().join("broken.json").exists());
        assert!(!output.path().join("broken.json.tmp").exists());
    }
}
