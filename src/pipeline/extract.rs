//! Candidate generation: walk a document's embedded images page by page.
//!
//! The scan is written against the [`ImageSource`] trait rather than a
//! concrete PDF library so that deduplication, early termination and the
//! selection predicate can be tested with an in-memory fake. The lopdf-backed
//! implementation lives in [`crate::pipeline::document`].
//!
//! ## Order of checks per resource
//!
//! ```text
//! seen before? ──▶ dimensions ──▶ extract bytes ──▶ byte floor + aspect ──▶ accept
//!    (skip)         (cheap)        (decode/mask)        (needs bytes)
//! ```
//!
//! Extraction is the expensive step, so it only runs for resources that
//! already cleared the dimension floor. Selection is fused into the scan:
//! once `max_count` images were accepted no further page is touched, which
//! is why earlier pages win when more images qualify than the cap allows.

use crate::error::ResourceError;
use crate::pipeline::select::SelectionCriteria;
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One image XObject as listed on a page, before any bytes are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageResource {
    /// PDF object number; the identity used for deduplication.
    pub resource_id: u32,
    /// Object number of the `/SMask` stream, if any.
    pub soft_mask: Option<u32>,
    pub width: u32,
    pub height: u32,
}

/// File format an extracted image is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// DCT data passed through untouched.
    Jpeg,
    /// Decoded, colour-normalised or mask-composited pixels.
    Png,
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Png => "png",
        }
    }
}

/// Encoded bytes of one reconstructed image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedImage {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
    /// Colour components of the written image (1 gray, 3 RGB).
    pub components: u8,
}

/// An image that passed selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageCandidate {
    /// 1-indexed page the image was first seen on.
    pub source_page: usize,
    pub resource_id: u32,
    pub width: u32,
    pub height: u32,
    pub components: u8,
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
}

impl ImageCandidate {
    /// Deterministic file name: page and object number, e.g. `img03_00042.png`.
    pub fn file_name(&self) -> String {
        format!(
            "img{:02}_{:05}.{}",
            self.source_page,
            self.resource_id,
            self.format.extension()
        )
    }
}

/// The document decoder contract the scan needs.
pub trait ImageSource {
    /// Number of pages in the document.
    fn page_count(&self) -> usize;

    /// Image resources drawn on a page (0-indexed), in resource order.
    fn page_images(&self, page_index: usize) -> Result<Vec<ImageResource>, ResourceError>;

    /// Read and reconstruct the bytes of one resource.
    fn extract(&self, resource: &ImageResource) -> Result<ExtractedImage, ResourceError>;
}

/// Counters describing one scan, logged once it finishes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Pages whose resource list was read.
    pub pages_scanned: usize,
    /// Distinct resource ids encountered on those pages.
    pub distinct_resources: usize,
    /// Images accepted by the selection criteria.
    pub accepted: usize,
    /// Resources that failed to list or decode.
    pub skipped_errors: usize,
    pub duration_ms: u64,
}

/// Every distinct image resource of the document, in page order, paired with
/// its 1-indexed page. No bytes are read.
pub fn distinct_resources<S: ImageSource + ?Sized>(source: &S) -> Vec<(usize, ImageResource)> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for page_index in 0..source.page_count() {
        match source.page_images(page_index) {
            Ok(resources) => {
                for r in resources {
                    if seen.insert(r.resource_id) {
                        out.push((page_index + 1, r));
                    }
                }
            }
            Err(e) => warn!("{e}"),
        }
    }
    out
}

/// Scan the document and hand each accepted image to `on_accept` as soon as
/// it is accepted.
///
/// `on_accept` is where the caller persists the image; its error aborts the
/// scan, since a failed write means the output directory is unusable.
pub fn scan<S, E, F>(source: &S, criteria: &SelectionCriteria, mut on_accept: F) -> Result<ScanReport, E>
where
    S: ImageSource + ?Sized,
    F: FnMut(&ImageCandidate) -> Result<(), E>,
{
    let start = Instant::now();
    let page_count = source.page_count();
    let mut seen: HashSet<u32> = HashSet::new();
    let mut report = ScanReport::default();

    for page_index in 0..page_count {
        if report.accepted >= criteria.max_count {
            break;
        }
        let page = page_index + 1;
        debug!("Scanning images on page {}/{}", page, page_count);
        report.pages_scanned += 1;

        let resources = match source.page_images(page_index) {
            Ok(r) => r,
            Err(e) => {
                warn!("Skipping page {}: {}", page, e);
                report.skipped_errors += 1;
                continue;
            }
        };

        for resource in resources {
            if report.accepted >= criteria.max_count {
                break;
            }
            if !seen.insert(resource.resource_id) {
                continue;
            }
            report.distinct_resources += 1;

            if let Err(reason) = criteria.check_dimensions(resource.width, resource.height) {
                debug!(
                    "Object {} ({}x{}) rejected: {:?}",
                    resource.resource_id, resource.width, resource.height, reason
                );
                continue;
            }

            let extracted = match source.extract(&resource) {
                Ok(img) => img,
                Err(e) => {
                    warn!("Skipping image on page {}: {}", page, e);
                    report.skipped_errors += 1;
                    continue;
                }
            };

            if let Err(reason) =
                criteria.check_extracted(resource.width, resource.height, extracted.bytes.len())
            {
                debug!(
                    "Object {} ({}x{}, {} bytes) rejected: {:?}",
                    resource.resource_id,
                    resource.width,
                    resource.height,
                    extracted.bytes.len(),
                    reason
                );
                continue;
            }

            let candidate = ImageCandidate {
                source_page: page,
                resource_id: resource.resource_id,
                width: resource.width,
                height: resource.height,
                components: extracted.components,
                bytes: extracted.bytes,
                format: extracted.format,
            };
            on_accept(&candidate)?;
            report.accepted += 1;
        }
    }

    report.duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "Image scan: {} pages, {} distinct images, {} selected, {} skipped, {}ms",
        report.pages_scanned,
        report.distinct_resources,
        report.accepted,
        report.skipped_errors,
        report.duration_ms
    );
    Ok(report)
}

/// Convenience wrapper collecting the accepted images in memory.
pub fn select_candidates<S: ImageSource + ?Sized>(
    source: &S,
    criteria: &SelectionCriteria,
) -> (Vec<ImageCandidate>, ScanReport) {
    let mut selected = Vec::new();
    let report = scan(source, criteria, |c| {
        selected.push(c.clone());
        Ok::<(), std::convert::Infallible>(())
    });
    match report {
        Ok(report) => (selected, report),
        Err(never) => match never {},
    }
}
