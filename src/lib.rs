//! # paper-digest
//!
//! Turn research-paper PDFs into structured records and Marp slide decks.
//!
//! For each paper the crate keeps up to five meaningful figures, crops the
//! title band of page 1 as a cover, asks an LLM for a five-line Japanese
//! summary (translated title, keywords, problem, method, result) and stores
//! everything as `paper.json` next to the images. A second step renders any
//! number of stored records into Markdown slides for
//! [Marp](https://marp.app/).
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     validate the file (%PDF magic)
//!  ├─ 2. Metadata  pdfium: info dictionary + text of pages 1-3
//!  ├─ 3. Images    lopdf: dedup by object, decode, composite soft masks, filter
//!  ├─ 4. Cover     pdfium: page 1 at 2×, band from 5 % to 55 % height
//!  ├─ 5. Summary   one chat call, five labelled lines back
//!  └─ 6. Record    <out>/<entry_id>/paper.json + images/
//!
//! records ──► slides  <record dir>/<title>_output.md
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use paper_digest::{digest_path, DigestConfig};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let config = DigestConfig::builder().output_dir("./records").build()?;
//!     let report = digest_path(Path::new("papers/"), &config).await?;
//!     eprintln!("{} digested, {} failed", report.succeeded(), report.failed());
//!
//!     let decks = paper_digest::make_all_slides(
//!         Path::new("./records"),
//!         &paper_digest::SlideConfig::default(),
//!     )?;
//!     eprintln!("{} deck(s) written", decks.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `paper-digest` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! paper-digest = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod digest;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod record;
pub mod slides;
pub mod summary;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{DigestConfig, DigestConfigBuilder, LlmConfig, SlideConfig};
pub use digest::{digest_file, digest_path, digest_paths, inspect, ImageListing, InspectReport};
pub use error::{DigestError, ResourceError};
pub use output::{BatchReport, DigestOutput, DocumentMetadata, DocumentOutcome};
pub use pipeline::llm::Summarizer;
pub use pipeline::select::SelectionCriteria;
pub use progress::{DigestProgressCallback, NoopProgressCallback, ProgressCallback};
pub use record::{read_record, write_record, PaperRecord};
pub use slides::{make_all_slides, make_slides, render_slides};
