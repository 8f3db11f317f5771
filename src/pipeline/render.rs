//! pdfium work: cover rasterisation and metadata/text extraction.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! `tokio::task::spawn_blocking` moves the work onto a dedicated thread pool
//! thread designed for blocking operations.
//!
//! ## The cover band
//!
//! Page 1 is rendered at `cover_zoom` (2× by default) and cropped to the band
//! from 5 % to 55 % of the page height. On a typical paper that band holds
//! the title, the author block and the teaser figure while skipping the
//! running header.

use crate::error::DigestError;
use crate::output::{DocumentMetadata, ABSTRACT_PAGES};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File name of the cover crop inside the images directory.
pub const COVER_FILE_NAME: &str = "half.png";

/// Bind to the pdfium library.
///
/// `PDFIUM_LIB_PATH` (a directory or the library file itself) wins; otherwise
/// the current directory and then the system library path are tried.
pub fn bind_pdfium() -> Result<Pdfium, DigestError> {
    if let Ok(path) = std::env::var("PDFIUM_LIB_PATH") {
        let candidate = if Path::new(&path).is_dir() {
            Pdfium::pdfium_platform_library_name_at_path(&path)
        } else {
            PathBuf::from(&path)
        };
        debug!("Binding pdfium from {}", candidate.display());
        return Pdfium::bind_to_library(&candidate)
            .map(Pdfium::new)
            .map_err(|e| DigestError::PdfiumBindingFailed(format!("{}: {e:?}", candidate.display())));
    }

    Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map(Pdfium::new)
        .map_err(|e| DigestError::PdfiumBindingFailed(format!("{e:?}")))
}

fn load_document<'a>(
    pdfium: &'a Pdfium,
    pdf_path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, DigestError> {
    pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                DigestError::WrongPassword {
                    path: pdf_path.to_path_buf(),
                }
            } else {
                DigestError::PasswordRequired {
                    path: pdf_path.to_path_buf(),
                }
            }
        } else {
            DigestError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: err_str,
            }
        }
    })
}

/// Crop the cover band `[h/20, h/2 + h/20)` over the full width.
pub fn crop_cover_band(page: &DynamicImage) -> DynamicImage {
    let (width, height) = (page.width(), page.height());
    let top = height / 20;
    let bottom = (height / 2 + height / 20).min(height);
    page.crop_imm(0, top, width, (bottom - top).max(1).min(height - top))
}

/// Render page 1, crop the cover band and save it as PNG at `out_path`.
pub async fn render_cover(
    pdf_path: &Path,
    password: Option<&str>,
    zoom: f32,
    out_path: &Path,
) -> Result<PathBuf, DigestError> {
    let path = pdf_path.to_path_buf();
    let out = out_path.to_path_buf();
    let pwd = password.map(|s| s.to_string());

    tokio::task::spawn_blocking(move || render_cover_blocking(&path, pwd.as_deref(), zoom, &out))
        .await
        .map_err(|e| DigestError::Internal(format!("Cover task panicked: {}", e)))?
}

fn render_cover_blocking(
    pdf_path: &Path,
    password: Option<&str>,
    zoom: f32,
    out_path: &Path,
) -> Result<PathBuf, DigestError> {
    let pdfium = bind_pdfium()?;
    let document = load_document(&pdfium, pdf_path, password)?;

    let page = document
        .pages()
        .get(0)
        .map_err(|e| DigestError::RasterisationFailed {
            page: 1,
            detail: format!("{:?}", e),
        })?;

    let render_config = PdfRenderConfig::new().scale_page_by_factor(zoom);
    let bitmap = page
        .render_with_config(&render_config)
        .map_err(|e| DigestError::RasterisationFailed {
            page: 1,
            detail: format!("{:?}", e),
        })?;

    let rendered = bitmap.as_image();
    let cover = crop_cover_band(&rendered);
    debug!(
        "Rendered page 1 → {}x{} px, cover band {}x{}",
        rendered.width(),
        rendered.height(),
        cover.width(),
        cover.height()
    );

    cover
        .to_rgb8()
        .save_with_format(out_path, image::ImageFormat::Png)
        .map_err(|e| DigestError::OutputWriteFailed {
            path: out_path.to_path_buf(),
            source: std::io::Error::other(e),
        })?;

    info!("Cover written to {}", out_path.display());
    Ok(out_path.to_path_buf())
}

/// Extract document metadata and the text of the first pages.
pub async fn extract_metadata(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentMetadata, DigestError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(|s| s.to_string());

    tokio::task::spawn_blocking(move || extract_metadata_blocking(&path, pwd.as_deref()))
        .await
        .map_err(|e| DigestError::Internal(format!("Metadata task panicked: {}", e)))?
}

fn extract_metadata_blocking(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentMetadata, DigestError> {
    let pdfium = bind_pdfium()?;
    let document = load_document(&pdfium, pdf_path, password)?;

    let metadata = document.metadata();
    let pages = document.pages();

    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata.get(tag).and_then(|t| {
            let v = t.value().to_string();
            if v.is_empty() {
                None
            } else {
                Some(v)
            }
        })
    };

    let mut leading_text = String::new();
    for (idx, page) in pages.iter().take(ABSTRACT_PAGES).enumerate() {
        match page.text() {
            Ok(text) => leading_text.push_str(&text.all()),
            Err(e) => warn!("No text on page {}: {:?}", idx + 1, e),
        }
    }

    let page_count = pages.len() as usize;
    info!(
        "PDF loaded: {} pages, {} chars of leading text",
        page_count,
        leading_text.chars().count()
    );

    Ok(DocumentMetadata {
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        subject: get_meta(PdfDocumentMetadataTagType::Subject),
        creator: get_meta(PdfDocumentMetadataTagType::Creator),
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
        creation_date: get_meta(PdfDocumentMetadataTagType::CreationDate),
        modification_date: get_meta(PdfDocumentMetadataTagType::ModificationDate),
        page_count,
        pdf_version: format!("{:?}", document.version()),
        leading_text,
    })
}
