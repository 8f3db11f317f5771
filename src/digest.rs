//! Digest entry points: one PDF in, one record directory out.
//!
//! Per paper the stages run strictly in order:
//!
//! 1. validate the input (`%PDF` magic);
//! 2. read metadata and the leading text through pdfium;
//! 3. scan embedded images with lopdf, writing each accepted one at once;
//! 4. render the cover band of page 1;
//! 5. ask the summariser for the five labelled fields;
//! 6. assemble and atomically write `paper.json`.
//!
//! Any error abandons the paper before its record is written. In a batch the
//! error is logged and reported through the progress callback, and the next
//! paper is started.

use crate::config::DigestConfig;
use crate::error::DigestError;
use crate::output::{BatchReport, DigestOutput, DocumentMetadata, DocumentOutcome};
use crate::pipeline::document::PdfImageSource;
use crate::pipeline::extract::{self, ScanReport};
use crate::pipeline::input;
use crate::pipeline::llm::Summarizer;
use crate::pipeline::render::{self, COVER_FILE_NAME};
use crate::pipeline::select::SelectionCriteria;
use crate::record::{write_record, IMAGES_DIR_NAME};
use crate::summary::{parse_summary, RecordBuilder};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Digest one PDF into `<output_dir>/<entry_id>/`.
pub async fn digest_file(
    pdf_path: &Path,
    config: &DigestConfig,
    summarizer: &Summarizer,
) -> Result<DigestOutput, DigestError> {
    let total_start = Instant::now();
    info!("Digesting {}", pdf_path.display());

    // ── Step 1: Validate input ───────────────────────────────────────────
    let pdf_path = input::resolve_local(pdf_path)?;
    let password = config.password.as_deref();

    // ── Step 2: Metadata + leading text ──────────────────────────────────
    let metadata = render::extract_metadata(&pdf_path, password).await?;

    let entry_id = input::entry_id(&pdf_path);
    let record_dir = config.output_dir.join(&entry_id);
    let images_dir = record_dir.join(IMAGES_DIR_NAME);
    tokio::fs::create_dir_all(&images_dir)
        .await
        .map_err(|e| DigestError::OutputWriteFailed {
            path: images_dir.clone(),
            source: e,
        })?;

    // ── Step 3: Image scan ───────────────────────────────────────────────
    let (scan, images) = scan_images(&pdf_path, password, &config.selection, &images_dir).await?;

    // ── Step 4: Cover band ───────────────────────────────────────────────
    render::render_cover(
        &pdf_path,
        password,
        config.cover_zoom,
        &images_dir.join(COVER_FILE_NAME),
    )
    .await?;

    // ── Step 5: Summary ──────────────────────────────────────────────────
    let builder = RecordBuilder::new(&pdf_path, &metadata);
    let reply = summarizer
        .summarize(&builder.bibliographic_title(), &metadata.abstract_excerpt())
        .await?;
    debug!("Summary reply for {}: {} chars", entry_id, reply.chars().count());

    // ── Step 6: Record ───────────────────────────────────────────────────
    let record = builder
        .summary(parse_summary(&reply))
        .cover_image_path(format!("{IMAGES_DIR_NAME}/{COVER_FILE_NAME}"))
        .images(images)
        .build();
    let record_path = write_record(&record, &record_dir)?;

    let total_duration_ms = total_start.elapsed().as_millis() as u64;
    info!(
        "Digested {} → {} ({} image(s), {}ms)",
        pdf_path.display(),
        record_path.display(),
        record.images.len(),
        total_duration_ms
    );

    Ok(DigestOutput {
        record,
        record_path,
        scan,
        total_duration_ms,
    })
}

/// Run the image scan on the blocking pool, writing each accepted image to
/// `images_dir`. Returns the scan counters and the record-relative paths.
async fn scan_images(
    pdf_path: &Path,
    password: Option<&str>,
    criteria: &SelectionCriteria,
    images_dir: &Path,
) -> Result<(ScanReport, Vec<String>), DigestError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(|s| s.to_string());
    let criteria = criteria.clone();
    let dir = images_dir.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let source = PdfImageSource::open(&path, pwd.as_deref())?;
        let mut written = Vec::new();
        let report = extract::scan(&source, &criteria, |candidate| {
            let name = candidate.file_name();
            let target = dir.join(&name);
            std::fs::write(&target, &candidate.bytes).map_err(|e| DigestError::OutputWriteFailed {
                path: target.clone(),
                source: e,
            })?;
            debug!(
                "Saved {} ({}x{}, {} bytes)",
                name,
                candidate.width,
                candidate.height,
                candidate.bytes.len()
            );
            written.push(format!("{IMAGES_DIR_NAME}/{name}"));
            Ok::<(), DigestError>(())
        })?;
        Ok::<_, DigestError>((report, written))
    })
    .await
    .map_err(|e| DigestError::Internal(format!("Image scan task panicked: {}", e)))?
}

/// Digest every PDF under `path` (a file or a directory of `*.pdf`).
///
/// The provider is resolved once for the whole batch. Only a missing path or
/// an unusable provider fails the call; per-paper errors land in the report.
pub async fn digest_path(path: &Path, config: &DigestConfig) -> Result<BatchReport, DigestError> {
    let pdfs = input::collect_pdfs(path)?;
    if pdfs.is_empty() {
        warn!("No PDF files found in {}", path.display());
        return Ok(BatchReport::default());
    }

    let summarizer = Summarizer::from_config(&config.llm)?;
    Ok(digest_paths(&pdfs, config, &summarizer).await)
}

/// Digest `pdfs` one after another with a shared summariser.
pub async fn digest_paths(pdfs: &[PathBuf], config: &DigestConfig, summarizer: &Summarizer) -> BatchReport {
    let total = pdfs.len();
    let cb = config.progress_callback.as_deref();

    if let Some(cb) = cb {
        cb.on_batch_start(total);
    }

    let mut report = BatchReport::default();
    for (i, pdf) in pdfs.iter().enumerate() {
        let index = i + 1;
        if let Some(cb) = cb {
            cb.on_document_start(index, total, pdf);
        }

        let result = digest_file(pdf, config, summarizer).await;
        match &result {
            Ok(out) => {
                if let Some(cb) = cb {
                    cb.on_document_complete(index, total, pdf, out.record.images.len());
                }
            }
            Err(e) => {
                error!("Failed to digest {}: {}", pdf.display(), e);
                if let Some(cb) = cb {
                    cb.on_document_error(index, total, pdf, &e.to_string());
                }
            }
        }

        report.documents.push(DocumentOutcome {
            pdf_path: pdf.clone(),
            result,
        });
    }

    if let Some(cb) = cb {
        cb.on_batch_complete(total, report.succeeded());
    }
    info!(
        "Batch finished: {} succeeded, {} failed",
        report.succeeded(),
        report.failed()
    );
    report
}

/// One embedded image resource, as listed by [`inspect`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageListing {
    /// 1-indexed page the resource first appears on.
    pub page: usize,
    pub resource_id: u32,
    pub width: u32,
    pub height: u32,
    pub has_soft_mask: bool,
    /// Whether the dimension rule alone would keep it.
    pub passes_dimensions: bool,
}

/// Metadata and image inventory of a PDF.
#[derive(Debug, Clone, Serialize)]
pub struct InspectReport {
    pub metadata: DocumentMetadata,
    pub images: Vec<ImageListing>,
}

/// Read metadata and list image resources without writing anything.
///
/// Does not require an LLM provider or API key.
pub async fn inspect(
    pdf_path: &Path,
    password: Option<&str>,
    criteria: &SelectionCriteria,
) -> Result<InspectReport, DigestError> {
    let pdf_path = input::resolve_local(pdf_path)?;
    let metadata = render::extract_metadata(&pdf_path, password).await?;

    let path = pdf_path.clone();
    let pwd = password.map(|s| s.to_string());
    let criteria = criteria.clone();
    let images = tokio::task::spawn_blocking(move || {
        let source = PdfImageSource::open(&path, pwd.as_deref())?;
        Ok::<_, DigestError>(
            extract::distinct_resources(&source)
                .into_iter()
                .map(|(page, r)| ImageListing {
                    page,
                    resource_id: r.resource_id,
                    width: r.width,
                    height: r.height,
                    has_soft_mask: r.soft_mask.is_some(),
                    passes_dimensions: criteria.check_dimensions(r.width, r.height).is_ok(),
                })
                .collect::<Vec<_>>(),
        )
    })
    .await
    .map_err(|e| DigestError::Internal(format!("Inspect task panicked: {}", e)))??;

    Ok(InspectReport { metadata, images })
}
