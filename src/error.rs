//! Error types for the paper-digest library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`DigestError`] — **Fatal for one document**: the paper cannot be
//!   digested at all (bad input file, wrong password, summariser failure,
//!   record write failure). Batch callers log it and move on to the next
//!   paper.
//!
//! * [`ResourceError`] — **Non-fatal**: a single embedded image could not be
//!   decoded or composited. The extractor logs it and keeps scanning; one
//!   broken figure never costs the whole paper.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the paper-digest library.
///
/// Per-image failures use [`ResourceError`] and never propagate here.
#[derive(Debug, Error)]
pub enum DigestError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// A directory the caller asked for does not exist.
    #[error("Directory '{path}' does not exist")]
    DirectoryNotFound { path: PathBuf },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The summariser call failed; the paper is abandoned.
    #[error("LLM summary failed after {attempts} attempt(s): {message}")]
    SummaryFailed { attempts: u32, message: String },

    // ── Record errors ─────────────────────────────────────────────────────
    /// A record document could not be parsed.
    #[error("Record '{path}' is not valid: {detail}")]
    InvalidRecord { path: PathBuf, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not read an input file or directory.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write an output file (image, record, slides).
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single embedded image resource.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResourceError {
    /// The object number does not resolve to an image stream.
    #[error("object {resource_id} is not an image stream")]
    NotAnImage { resource_id: u32 },

    /// The stream uses a filter or pixel layout we cannot decode.
    #[error("object {resource_id}: unsupported image encoding ({detail})")]
    Unsupported { resource_id: u32, detail: String },

    /// Decoding the stream failed.
    #[error("object {resource_id}: decode failed: {detail}")]
    DecodeFailed { resource_id: u32, detail: String },

    /// The soft mask could not be combined with its base image.
    #[error("object {resource_id}: soft mask {mask_id} unusable: {detail}")]
    MaskMismatch {
        resource_id: u32,
        mask_id: u32,
        detail: String,
    },

    /// Listing the images of a page failed.
    #[error("page {page}: image listing failed: {detail}")]
    PageListing { page: usize, detail: String },
}
