//! Digest pipeline stages.
//!
//! Data flows through these modules in order:
//!
//! ```text
//! input    → validate the path and %PDF magic
//! render   → pdfium: metadata + leading text, cover band of page 1
//! document → lopdf: per-page image listing, decoding, soft-mask compositing
//! extract  → dedup-by-object scan over any ImageSource
//! select   → pure size / byte / aspect-ratio predicate
//! llm      → one chat call per paper, five labelled lines back
//! ```
//!
//! Each stage is a separate module so it can be tested in isolation; the
//! image scan in particular runs against an in-memory fake in unit tests.

pub mod document;
pub mod extract;
pub mod input;
pub mod llm;
pub mod render;
pub mod select;
