//! JSON output for extracted outlines

use crate::classifier::HeadingCandidate;
use crate::OutlineError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Title and outline of one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineDocument {
    pub title: String,
    pub outline: Vec<HeadingCandidate>,
}

impl OutlineDocument {
    pub fn new(title: String, outline: Vec<HeadingCandidate>) -> Self {
        Self { title, outline }
    }

    /// Pretty-printed JSON, keys in declaration order
    pub fn to_json(&self) -> Result<String, OutlineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write `<stem>.json` into `dir`.
    ///
    /// The JSON goes to a temporary sibling first and is renamed into place,
    /// so a failure never leaves a partial file behind.
    pub fn write_to_dir(&self, dir: &Path, stem: &str) -> Result<PathBuf, OutlineError> {
        let json = self.to_json()?;
        let target = dir.join(format!("{}.json", stem));
        let tmp = dir.join(format!("{}.json.tmp", stem));

        if let Err(e) = fs::write(&tmp, json.as_bytes()).and_then(|_| fs::rename(&tmp, &target)) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(target)
    }
}
