//! Summariser: one chat call per paper.
//!
//! The request is a system message carrying the summary prompt followed by a
//! single user message `title: …\nbody: …`. The reply is returned verbatim;
//! [`crate::summary::parse_summary`] pulls the labelled fields out of it.
//!
//! ## Retry Strategy
//!
//! Retries are off by default: a failed summary abandons the paper and the
//! batch moves on. With `max_retries > 0` the wait before retry *n* is
//! `retry_backoff_ms * 2^(n-1)`.

use crate::config::LlmConfig;
use crate::error::DigestError;
use crate::prompts::{paper_message, DEFAULT_SUMMARY_PROMPT};
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// Model used when a provider is named without one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// A configured summariser bound to one provider.
pub struct Summarizer {
    provider: Arc<dyn LLMProvider>,
    system_prompt: String,
    options: CompletionOptions,
    max_retries: u32,
    retry_backoff_ms: u64,
}

impl Summarizer {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &LlmConfig) -> Self {
        Self {
            provider,
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SUMMARY_PROMPT.to_string()),
            options: build_options(config),
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
        }
    }

    /// Resolve the provider from `config` and wrap it.
    pub fn from_config(config: &LlmConfig) -> Result<Self, DigestError> {
        let provider = resolve_provider(config)?;
        Ok(Self::new(provider, config))
    }

    /// Ask for the five-line summary of a paper and return the raw reply.
    pub async fn summarize(&self, title: &str, abstract_text: &str) -> Result<String, DigestError> {
        let start = Instant::now();
        let messages = vec![
            ChatMessage::system(self.system_prompt.as_str()),
            ChatMessage::user(paper_message(title, abstract_text)),
        ];

        let mut last_err: Option<String> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "Summary of '{}': retry {}/{} after {}ms",
                    title, attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match self.provider.chat(&messages, Some(&self.options)).await {
                Ok(response) => {
                    debug!(
                        "Summary of '{}': {} input tokens, {} output tokens, {:?}",
                        title,
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    return Ok(response.content);
                }
                Err(e) => {
                    let err_msg = format!("{}", e);
                    warn!("Summary of '{}': attempt {} failed: {}", title, attempt + 1, err_msg);
                    last_err = Some(err_msg);
                }
            }
        }

        Err(DigestError::SummaryFailed {
            attempts: self.max_retries + 1,
            message: last_err.unwrap_or_else(|| "Unknown error".to_string()),
        })
    }
}

/// Build `CompletionOptions` from the summariser config.
fn build_options(config: &LlmConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, DigestError> {
    info!("Using LLM provider '{}' with model '{}'", provider_name, model);
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        DigestError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. a pre-built `config.provider`;
/// 2. `config.provider_name` with `config.model` (or [`DEFAULT_MODEL`]);
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are non-empty;
/// 4. OpenAI, when `OPENAI_API_KEY` is non-empty;
/// 5. `ProviderFactory::from_env` auto-detection.
pub fn resolve_provider(config: &LlmConfig) -> Result<Arc<dyn LLMProvider>, DigestError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| DigestError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
