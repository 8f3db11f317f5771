//! Progress-callback trait for per-document digest events.
//!
//! Inject an [`Arc<dyn DigestProgressCallback>`] via
//! [`crate::config::DigestConfigBuilder::progress_callback`] to be told when
//! each paper starts, finishes or fails during a batch.
//!
//! # Example
//!
//! ```rust
//! use paper_digest::{DigestConfig, DigestProgressCallback};
//! use std::path::Path;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     done: AtomicUsize,
//! }
//!
//! impl DigestProgressCallback for CountingCallback {
//!     fn on_document_complete(&self, index: usize, total: usize, path: &Path, images: usize) {
//!         self.done.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{}/{} {} ({} images)", index, total, path.display(), images);
//!     }
//! }
//!
//! let config = DigestConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { done: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::path::Path;
use std::sync::Arc;

/// Called by the batch driver as it digests each paper.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Papers are processed one after another, but the
/// trait is `Send + Sync` so implementations can be shared with other tasks.
pub trait DigestProgressCallback: Send + Sync {
    /// Called once before the first paper.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called before a paper is opened.
    ///
    /// # Arguments
    /// * `index` — 1-indexed position in the batch
    /// * `total` — number of papers in the batch
    /// * `path`  — the PDF being digested
    fn on_document_start(&self, index: usize, total: usize, path: &Path) {
        let _ = (index, total, path);
    }

    /// Called after the record of a paper was written.
    ///
    /// `images` is the number of selected figures (the cover not included).
    fn on_document_complete(&self, index: usize, total: usize, path: &Path, images: usize) {
        let _ = (index, total, path, images);
    }

    /// Called when a paper is abandoned.
    fn on_document_error(&self, index: usize, total: usize, path: &Path, error: &str) {
        let _ = (index, total, path, error);
    }

    /// Called once after every paper was attempted.
    fn on_batch_complete(&self, total: usize, success_count: usize) {
        let _ = (total, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl DigestProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::DigestConfig`].
pub type ProgressCallback = Arc<dyn DigestProgressCallback>;
