//! Turning the summariser's reply and the PDF metadata into a [`PaperRecord`].
//!
//! The reply is expected to hold five lines, each starting with one of the
//! labels in [`crate::prompts`]. Parsing never fails: unknown lines are
//! ignored, a later line overrides an earlier one for the same label, and a
//! label that never shows up leaves its field at [`NOT_AVAILABLE`].

use crate::output::DocumentMetadata;
use crate::pipeline::input::entry_id;
use crate::prompts::{LABEL_KEYWORDS, LABEL_METHOD, LABEL_PROBLEM, LABEL_RESULT, LABEL_TITLE};
use crate::record::{Bibliography, PaperRecord, SummaryFields, NOT_AVAILABLE};
use std::path::Path;
use tracing::warn;

/// Title used in the bibliography when the PDF has none.
pub const UNKNOWN: &str = "Unknown";

/// The labelled fields found in a summary reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedSummary {
    pub title_localized: Option<String>,
    pub keywords: Option<String>,
    pub problem: Option<String>,
    pub method: Option<String>,
    pub result: Option<String>,
}

impl ParsedSummary {
    /// Labels that did not appear in the reply.
    pub fn missing(&self) -> Vec<&'static str> {
        [
            (LABEL_TITLE, &self.title_localized),
            (LABEL_KEYWORDS, &self.keywords),
            (LABEL_PROBLEM, &self.problem),
            (LABEL_METHOD, &self.method),
            (LABEL_RESULT, &self.result),
        ]
        .into_iter()
        .filter(|(_, v)| v.is_none())
        .map(|(label, _)| label)
        .collect()
    }
}

fn strip_label(line: &str, label: &str) -> Option<String> {
    let rest = line.strip_prefix(label)?;
    let rest = rest
        .strip_prefix(':')
        .or_else(|| rest.strip_prefix('：'))
        .unwrap_or(rest);
    Some(rest.trim().to_string())
}

/// Extract the five labelled fields from `text`.
pub fn parse_summary(text: &str) -> ParsedSummary {
    let mut parsed = ParsedSummary::default();

    for line in text.lines().map(str::trim_start) {
        let slots: [(&str, &mut Option<String>); 5] = [
            (LABEL_TITLE, &mut parsed.title_localized),
            (LABEL_KEYWORDS, &mut parsed.keywords),
            (LABEL_PROBLEM, &mut parsed.problem),
            (LABEL_METHOD, &mut parsed.method),
            (LABEL_RESULT, &mut parsed.result),
        ];
        for (label, slot) in slots {
            if let Some(value) = strip_label(line, label) {
                *slot = Some(value);
                break;
            }
        }
    }

    parsed
}

fn or_na(value: Option<String>) -> String {
    value.unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// Assembles a [`PaperRecord`] from everything gathered for one PDF.
#[derive(Debug, Clone)]
pub struct RecordBuilder<'a> {
    pdf_path: &'a Path,
    metadata: &'a DocumentMetadata,
    summary: ParsedSummary,
    cover_image_path: Option<String>,
    images: Vec<String>,
    query: Option<String>,
}

impl<'a> RecordBuilder<'a> {
    pub fn new(pdf_path: &'a Path, metadata: &'a DocumentMetadata) -> Self {
        Self {
            pdf_path,
            metadata,
            summary: ParsedSummary::default(),
            cover_image_path: None,
            images: Vec::new(),
            query: None,
        }
    }

    pub fn summary(mut self, summary: ParsedSummary) -> Self {
        self.summary = summary;
        self
    }

    pub fn cover_image_path(mut self, path: impl Into<String>) -> Self {
        self.cover_image_path = Some(path.into());
        self
    }

    pub fn images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Title passed to the summariser; `"Unknown"` when the PDF has none.
    pub fn bibliographic_title(&self) -> String {
        self.metadata
            .title
            .clone()
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    pub fn build(self) -> PaperRecord {
        let missing = self.summary.missing();
        if !missing.is_empty() {
            warn!(
                "{}: summary lacks {}; using {}",
                self.pdf_path.display(),
                missing.join(", "),
                NOT_AVAILABLE
            );
        }

        let mut authors = self.metadata.authors();
        if authors.is_empty() {
            authors.push(UNKNOWN.to_string());
        }
        let excerpt = self.metadata.abstract_excerpt();

        let bibliography = Bibliography {
            title: self.bibliographic_title(),
            authors,
            subject: or_na(self.metadata.subject.clone()),
            abstract_excerpt: if excerpt.trim().is_empty() {
                NOT_AVAILABLE.to_string()
            } else {
                excerpt
            },
            pdf_path: self.pdf_path.display().to_string(),
        };

        let summary = SummaryFields {
            title_localized: or_na(self.summary.title_localized),
            title_original: or_na(self.metadata.title.clone()),
            year: or_na(self.metadata.year()),
            keywords: or_na(self.summary.keywords),
            entry_id: entry_id(self.pdf_path),
            problem: or_na(self.summary.problem),
            method: or_na(self.summary.method),
            result: or_na(self.summary.result),
        };

        PaperRecord {
            bibliography,
            summary,
            cover_image_path: or_na(self.cover_image_path),
            images: self.images,
            query: self.query,
        }
    }
}
