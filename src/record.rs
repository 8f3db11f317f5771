//! The per-paper record and its on-disk JSON form.
//!
//! A record lives at `<out>/<entry_id>/paper.json` next to an `images/`
//! directory. Image paths inside the record are relative to the record
//! directory, so a record tree can be moved as a whole.
//!
//! Decoding is lenient: any field may be absent. Absent strings read back as
//! [`NOT_AVAILABLE`], absent lists as empty and an absent `query` as `None`,
//! which makes `decode(encode(r)) == r` hold for every record.

use crate::error::DigestError;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Sentinel for a field that could not be determined.
pub const NOT_AVAILABLE: &str = "N/A";

/// File name of the record inside its directory.
pub const RECORD_FILE_NAME: &str = "paper.json";

/// Name of the image directory inside a record directory.
pub const IMAGES_DIR_NAME: &str = "images";

fn not_available() -> String {
    NOT_AVAILABLE.to_string()
}

/// Bibliographic data read from the PDF itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bibliography {
    #[serde(default = "not_available")]
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default = "not_available")]
    pub subject: String,
    /// Text of the first pages, at most 2000 characters.
    #[serde(default = "not_available", rename = "abstract")]
    pub abstract_excerpt: String,
    #[serde(default = "not_available")]
    pub pdf_path: String,
}

impl Default for Bibliography {
    fn default() -> Self {
        Self {
            title: not_available(),
            authors: Vec::new(),
            subject: not_available(),
            abstract_excerpt: not_available(),
            pdf_path: not_available(),
        }
    }
}

/// The fields shown on the title slide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryFields {
    /// Title translated by the summariser.
    #[serde(default = "not_available")]
    pub title_localized: String,
    #[serde(default = "not_available")]
    pub title_original: String,
    #[serde(default = "not_available")]
    pub year: String,
    #[serde(default = "not_available")]
    pub keywords: String,
    #[serde(default = "not_available")]
    pub entry_id: String,
    #[serde(default = "not_available")]
    pub problem: String,
    #[serde(default = "not_available")]
    pub method: String,
    #[serde(default = "not_available")]
    pub result: String,
}

impl Default for SummaryFields {
    fn default() -> Self {
        Self {
            title_localized: not_available(),
            title_original: not_available(),
            year: not_available(),
            keywords: not_available(),
            entry_id: not_available(),
            problem: not_available(),
            method: not_available(),
            result: not_available(),
        }
    }
}

/// One digested paper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperRecord {
    #[serde(default)]
    pub bibliography: Bibliography,
    #[serde(default)]
    pub summary: SummaryFields,
    /// Cover crop, relative to the record directory.
    #[serde(default = "not_available")]
    pub cover_image_path: String,
    /// Selected images in scan order, relative to the record directory.
    /// Never contains the cover.
    #[serde(default)]
    pub images: Vec<String>,
    /// Search query the paper was found with; `None` for local PDFs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

impl Default for PaperRecord {
    fn default() -> Self {
        Self {
            bibliography: Bibliography::default(),
            summary: SummaryFields::default(),
            cover_image_path: not_available(),
            images: Vec::new(),
            query: None,
        }
    }
}

impl PaperRecord {
    /// Encode as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, DigestError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| DigestError::Internal(format!("Failed to encode record: {e}")))
    }

    /// Decode from JSON; `path` is only used in the error.
    pub fn from_json(text: &str, path: &Path) -> Result<Self, DigestError> {
        serde_json::from_str(text).map_err(|e| DigestError::InvalidRecord {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
    }
}

/// Write `record` as `<record_dir>/paper.json`.
///
/// The document is written to a temporary file in the same directory and
/// renamed into place, so readers never see a half-written record.
pub fn write_record(record: &PaperRecord, record_dir: &Path) -> Result<PathBuf, DigestError> {
    let target = record_dir.join(RECORD_FILE_NAME);
    let json = record.to_json()?;

    let write_failed = |source: std::io::Error| DigestError::OutputWriteFailed {
        path: target.clone(),
        source,
    };

    let mut tmp = tempfile::NamedTempFile::new_in(record_dir).map_err(write_failed)?;
    tmp.write_all(json.as_bytes()).map_err(write_failed)?;
    tmp.write_all(b"\n").map_err(write_failed)?;
    tmp.persist(&target).map_err(|e| write_failed(e.error))?;

    debug!("Record written to {}", target.display());
    Ok(target)
}

/// Read a record file.
pub fn read_record(path: &Path) -> Result<PaperRecord, DigestError> {
    let text = std::fs::read_to_string(path).map_err(|source| DigestError::ReadFailed {
        path: path.to_path_buf(),
        source,
    })?;
    PaperRecord::from_json(&text, path)
}
