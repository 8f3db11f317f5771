//! Input resolution: turn a user-supplied path into a list of PDF files.
//!
//! A path may name a single PDF or a directory; a directory contributes its
//! immediate `*.pdf` children (extension matched case-insensitively), sorted
//! by path so batch order is stable. Each file's magic bytes (`%PDF`) are
//! checked before any parser sees it, so callers get a meaningful error
//! rather than a pdfium crash.

use crate::error::DigestError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Validate a local PDF: it exists, is readable and starts with `%PDF`.
pub fn resolve_local(path: &Path) -> Result<PathBuf, DigestError> {
    if !path.exists() {
        return Err(DigestError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    match std::fs::File::open(path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                return Err(DigestError::NotAPdf {
                    path: path.to_path_buf(),
                    magic,
                });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(DigestError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(_) => {
            return Err(DigestError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(path.to_path_buf())
}

fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

/// Expand `path` into the PDF files to digest.
///
/// Files in a directory are not magic-checked here; that happens per file
/// in [`resolve_local`] so one bad file does not sink the batch.
pub fn collect_pdfs(path: &Path) -> Result<Vec<PathBuf>, DigestError> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(DigestError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let entries = std::fs::read_dir(path).map_err(|source| DigestError::ReadFailed {
        path: path.to_path_buf(),
        source,
    })?;

    let mut pdfs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && has_pdf_extension(p))
        .collect();
    pdfs.sort();

    debug!("Found {} PDF(s) in {}", pdfs.len(), path.display());
    Ok(pdfs)
}

/// The record identifier for a PDF: its file stem.
pub fn entry_id(pdf_path: &Path) -> String {
    pdf_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "paper".to_string())
}
