//! Result types returned by the digest entry points.

use crate::pipeline::extract::ScanReport;
use crate::record::PaperRecord;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Longest abstract excerpt handed to the summariser, in characters.
pub const ABSTRACT_EXCERPT_CHARS: usize = 2000;

/// Pages whose text makes up the abstract excerpt.
pub const ABSTRACT_PAGES: usize = 3;

/// Document-level metadata read through pdfium.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    /// Raw `/Author` entry; see [`DocumentMetadata::authors`].
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    /// Raw PDF date string, e.g. `D:20230612094512Z`.
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
    /// Plain text of the first [`ABSTRACT_PAGES`] pages, concatenated.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub leading_text: String,
}

impl DocumentMetadata {
    /// Author list split on commas; empty entries dropped.
    pub fn authors(&self) -> Vec<String> {
        self.author
            .as_deref()
            .map(|a| {
                a.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Four-digit year of the creation date, if it parses.
    pub fn year(&self) -> Option<String> {
        let raw = self.creation_date.as_deref()?.trim();
        let digits = raw.strip_prefix("D:").unwrap_or(raw);
        let year: String = digits.chars().take(4).collect();
        (year.len() == 4 && year.chars().all(|c| c.is_ascii_digit())).then_some(year)
    }

    /// The leading text cut to [`ABSTRACT_EXCERPT_CHARS`] characters.
    pub fn abstract_excerpt(&self) -> String {
        self.leading_text.chars().take(ABSTRACT_EXCERPT_CHARS).collect()
    }
}

/// Everything produced for one paper.
#[derive(Debug, Clone)]
pub struct DigestOutput {
    /// The record as written.
    pub record: PaperRecord,
    /// Location of `paper.json`.
    pub record_path: PathBuf,
    /// Counters of the image scan.
    pub scan: ScanReport,
    pub total_duration_ms: u64,
}

/// Outcome of one paper in a batch.
#[derive(Debug)]
pub struct DocumentOutcome {
    pub pdf_path: PathBuf,
    pub result: Result<DigestOutput, crate::error::DigestError>,
}

/// Outcome of a batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub documents: Vec<DocumentOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.documents.iter().filter(|d| d.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.documents.len() - self.succeeded()
    }
}
