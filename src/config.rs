//! Configuration types for digesting papers and rendering slides.
//!
//! Digest behaviour is controlled through [`DigestConfig`], built via its
//! [`DigestConfigBuilder`]. Slide rendering has its own, much smaller
//! [`SlideConfig`] because it never touches a PDF or the LLM.
//!
//! Everything the summariser needs (provider, model, prompt, temperature)
//! lives in [`LlmConfig`] and is handed to
//! [`crate::pipeline::llm::Summarizer`] at construction. When the config
//! names neither a provider nor a provider name,
//! [`crate::pipeline::llm::resolve_provider`] falls back to the process
//! environment (`EDGEQUAKE_LLM_PROVIDER`/`EDGEQUAKE_MODEL`, then
//! `OPENAI_API_KEY`, then edgequake-llm auto-detection).

use crate::error::DigestError;
use crate::pipeline::select::SelectionCriteria;
use crate::progress::DigestProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default output directory for per-paper record directories.
pub const DEFAULT_OUTPUT_DIR: &str = "./records";

/// Configuration for the LLM summariser.
#[derive(Clone)]
pub struct LlmConfig {
    /// LLM model identifier, e.g. "gpt-4.1-nano". If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.25.
    ///
    /// Slightly above zero so keyword lists read naturally, low enough that
    /// the five labelled lines come back in the requested shape.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate. Default: 1024.
    ///
    /// Five fields of at most 180 characters each fit comfortably.
    pub max_tokens: usize,

    /// Retries after a failed call. Default: 0.
    ///
    /// A failed summary abandons the paper; set this above zero to
    /// tolerate flaky endpoints.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    pub retry_backoff_ms: u64,

    /// Custom system prompt. If None, uses [`crate::prompts::DEFAULT_SUMMARY_PROMPT`].
    pub system_prompt: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.25,
            max_tokens: 1024,
            max_retries: 0,
            retry_backoff_ms: 500,
            system_prompt: None,
        }
    }
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("system_prompt", &self.system_prompt.as_ref().map(|p| p.len()))
            .finish()
    }
}

/// Configuration for digesting PDF papers into records.
///
/// Built via [`DigestConfig::builder()`] or using [`DigestConfig::default()`].
///
/// # Example
/// ```rust
/// use paper_digest::DigestConfig;
///
/// let config = DigestConfig::builder()
///     .output_dir("./records")
///     .max_images(3)
///     .model("gpt-4.1-nano")
///     .build()
///     .unwrap();
/// assert_eq!(config.selection.max_count, 3);
/// ```
#[derive(Clone)]
pub struct DigestConfig {
    /// Root directory; each paper gets `<output_dir>/<entry_id>/`. Default: `./records`.
    pub output_dir: PathBuf,

    /// Thresholds governing which embedded images are kept.
    pub selection: SelectionCriteria,

    /// Zoom factor used when rasterising page 1 for the cover crop. Default: 2.0.
    pub cover_zoom: f32,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Summariser settings.
    pub llm: LlmConfig,

    /// Optional per-document progress events.
    pub progress_callback: Option<Arc<dyn DigestProgressCallback>>,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            selection: SelectionCriteria::default(),
            cover_zoom: 2.0,
            password: None,
            llm: LlmConfig::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for DigestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigestConfig")
            .field("output_dir", &self.output_dir)
            .field("selection", &self.selection)
            .field("cover_zoom", &self.cover_zoom)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("llm", &self.llm)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn DigestProgressCallback>"),
            )
            .finish()
    }
}

impl DigestConfig {
    /// Create a new builder for `DigestConfig`.
    pub fn builder() -> DigestConfigBuilder {
        DigestConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`DigestConfig`].
pub struct DigestConfigBuilder {
    config: DigestConfig,
}

impl DigestConfigBuilder {
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn selection(mut self, criteria: SelectionCriteria) -> Self {
        self.config.selection = criteria;
        self
    }

    pub fn max_images(mut self, n: usize) -> Self {
        self.config.selection.max_count = n;
        self
    }

    pub fn cover_zoom(mut self, zoom: f32) -> Self {
        self.config.cover_zoom = zoom;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.llm.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.llm.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.llm.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.llm.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.llm.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.llm.max_retries = n;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.llm.system_prompt = Some(prompt.into());
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn DigestProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<DigestConfig, DigestError> {
        let c = &self.config;
        c.selection.validate()?;
        if !(c.cover_zoom > 0.0 && c.cover_zoom <= 8.0) {
            return Err(DigestError::InvalidConfig(format!(
                "Cover zoom must be in (0, 8], got {}",
                c.cover_zoom
            )));
        }
        if c.llm.max_tokens == 0 {
            return Err(DigestError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Slides ───────────────────────────────────────────────────────────────

/// Default render-time image size floor in kilobytes.
pub const DEFAULT_MIN_IMAGE_KB: u64 = 100;

/// Configuration for [`crate::slides`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlideConfig {
    /// Only records whose raw text contains one of these (case-insensitive)
    /// are rendered. Empty means render everything.
    pub keywords: Vec<String>,

    /// Images whose file is not strictly larger than this many KiB are left
    /// out of the deck. Default: 100.
    pub min_image_kb: u64,
}

impl Default for SlideConfig {
    fn default() -> Self {
        Self {
            keywords: Vec::new(),
            min_image_kb: DEFAULT_MIN_IMAGE_KB,
        }
    }
}

impl SlideConfig {
    /// The size floor in bytes.
    pub fn min_image_bytes(&self) -> u64 {
        self.min_image_kb.saturating_mul(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_original_thresholds() {
        let c = DigestConfig::default();
        assert_eq!(c.selection.min_width, 400);
        assert_eq!(c.selection.min_height, 400);
        assert_eq!(c.selection.min_bytes, 2048);
        assert_eq!(c.selection.max_count, 5);
        assert_eq!(c.cover_zoom, 2.0);
        assert_eq!(c.llm.temperature, 0.25);
        assert_eq!(c.llm.max_retries, 0);
    }

    #[test]
    fn builder_rejects_bad_aspect_ratio() {
        let criteria = SelectionCriteria {
            max_aspect_ratio: 0.5,
            ..SelectionCriteria::default()
        };
        let err = DigestConfig::builder().selection(criteria).build().unwrap_err();
        assert!(matches!(err, DigestError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_zero_zoom() {
        let err = DigestConfig::builder().cover_zoom(0.0).build().unwrap_err();
        assert!(err.to_string().contains("zoom"));
    }

    #[test]
    fn builder_clamps_temperature() {
        let c = DigestConfig::builder().temperature(9.0).build().unwrap();
        assert_eq!(c.llm.temperature, 2.0);
    }

    #[test]
    fn debug_redacts_password() {
        let c = DigestConfig::builder().password("hunter2").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn slide_config_bytes() {
        let c = SlideConfig::default();
        assert_eq!(c.min_image_bytes(), 100 * 1024);
    }
}
