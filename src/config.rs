//! Configuration types for image-to-JSON extraction.
//!
//! All pipeline behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. Keeping every knob in one struct
//! makes it trivial to share configs across submissions, serialise the
//! scalar fields for logging, and diff two runs to understand why their
//! outputs differ.
//!
//! # Design choice: builder over constructor
//! A dozen-field constructor is unreadable and breaks on every new field.
//! The builder pattern lets callers set only what they care about and rely
//! on well-documented defaults for the rest.

use crate::capability::{TextExtractor, TextFormatter};
use crate::error::Img2JsonError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Configuration for an image-to-JSON extraction.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use img2json::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .model("gpt-4.1-nano")
///     .temperature(0.0)
///     .pretty(true)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// LLM model identifier, e.g. "gpt-4.1-nano", "claude-sonnet-4-20250514".
    /// If None, uses the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "gemini").
    /// If None along with `provider`, the provider is auto-detected from the
    /// environment.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Override for the text-extraction capability. When set, the provider
    /// fields above are not consulted for this stage. The main use is
    /// injecting mocks in tests or substituting a non-VLM OCR backend.
    pub extractor: Option<Arc<dyn TextExtractor>>,

    /// Override for the validation/formatting capability. Same semantics as
    /// `extractor`.
    pub formatter: Option<Arc<dyn TextFormatter>>,

    /// Sampling temperature for both model calls. Default: 0.1.
    ///
    /// Low temperature makes the model deterministic and faithful to what it
    /// sees in the image — exactly what you want for transcription and
    /// schema-shaped formatting. Higher values introduce creativity that
    /// worsens both.
    pub temperature: f32,

    /// Maximum tokens the model may generate per stage. Default: 4096.
    ///
    /// Dense images (forms, receipts with long line items) can exceed 2 000
    /// output tokens. Setting this too low silently truncates the JSON
    /// mid-object.
    pub max_tokens: usize,

    /// Custom system prompt for the extraction stage. If None, uses
    /// [`crate::prompts::DEFAULT_EXTRACTION_PROMPT`].
    pub extraction_prompt: Option<String>,

    /// Custom system prompt for the formatting stage. If None, uses
    /// [`crate::prompts::DEFAULT_FORMATTING_PROMPT`].
    pub formatting_prompt: Option<String>,

    /// Re-serialise the formatted JSON with pretty indentation when it
    /// parses. Default: false, so model output passes through verbatim.
    pub pretty: bool,

    /// Download timeout for URL inputs in seconds. Default: 60.
    ///
    /// Applies only to image acquisition. The model calls themselves carry
    /// no local timeout — the provider's own timeout behaviour governs.
    pub download_timeout_secs: u64,

    /// Progress callback receiving pipeline state transitions.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            extractor: None,
            formatter: None,
            temperature: 0.1,
            max_tokens: 4096,
            extraction_prompt: None,
            formatting_prompt: None,
            pretty: false,
            download_timeout_secs: 60,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("extractor", &self.extractor.as_ref().map(|_| "<dyn TextExtractor>"))
            .field("formatter", &self.formatter.as_ref().map(|_| "<dyn TextFormatter>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("pretty", &self.pretty)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.config.extractor = Some(extractor);
        self
    }

    pub fn formatter(mut self, formatter: Arc<dyn TextFormatter>) -> Self {
        self.config.formatter = Some(formatter);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n.max(1);
        self
    }

    pub fn extraction_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.extraction_prompt = Some(prompt.into());
        self
    }

    pub fn formatting_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.formatting_prompt = Some(prompt.into());
        self
    }

    pub fn pretty(mut self, v: bool) -> Self {
        self.config.pretty = v;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, Img2JsonError> {
        let c = &self.config;
        if !(0.0..=2.0).contains(&c.temperature) {
            return Err(Img2JsonError::InvalidConfig(format!(
                "temperature must be 0.0–2.0, got {}",
                c.temperature
            )));
        }
        if c.max_tokens == 0 {
            return Err(Img2JsonError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.download_timeout_secs == 0 {
            return Err(Img2JsonError::InvalidConfig(
                "download timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = ExtractionConfig::default();
        assert_eq!(config.temperature, 0.1);
        assert_eq!(config.max_tokens, 4096);
        assert_eq!(config.download_timeout_secs, 60);
        assert!(!config.pretty);
        assert!(config.provider.is_none());
    }

    #[test]
    fn builder_clamps_temperature() {
        let config = ExtractionConfig::builder()
            .temperature(5.0)
            .build()
            .unwrap();
        assert_eq!(config.temperature, 2.0);
    }

    #[test]
    fn builder_clamps_max_tokens() {
        let config = ExtractionConfig::builder().max_tokens(0).build().unwrap();
        assert_eq!(config.max_tokens, 1);
    }

    #[test]
    fn debug_omits_trait_objects() {
        let dbg = format!("{:?}", ExtractionConfig::default());
        assert!(dbg.contains("temperature"));
        assert!(!dbg.contains("Arc"));
    }
}
