//! External capability seams: the two black-box model calls.
//!
//! The pipeline depends on two collaborators it does not implement:
//! something that reads text out of an image, and something that shapes text
//! into schema-conforming JSON. Each is an object-safe async trait so the
//! production VLM-backed implementation and test doubles are
//! interchangeable. No guarantee on latency, determinism, or output quality
//! is assumed — not even that the formatted output actually validates
//! against the schema. Correctness is entirely delegated.
//!
//! The production implementations drive an [`edgequake_llm`] provider:
//! extraction sends the image as a base64 attachment on an empty user turn
//! (VLM APIs require at least one user turn to respond to; the image carries
//! all the actual content), formatting sends the extracted text and the
//! schema string interpolated into a plain user message.

use crate::config::ExtractionConfig;
use crate::error::{CapabilityError, Img2JsonError};
use crate::pipeline::encode::EncodedImage;
use crate::prompts::{
    formatting_user_message, DEFAULT_EXTRACTION_PROMPT, DEFAULT_FORMATTING_PROMPT,
};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use tracing::debug;

/// What a capability call returns: the text content plus token accounting.
///
/// Token counts are zero for capabilities that do not meter usage.
#[derive(Debug, Clone)]
pub struct StageResponse {
    /// The stage's text output (extracted text, or formatted JSON).
    pub content: String,
    /// Prompt tokens consumed by the call.
    pub input_tokens: usize,
    /// Completion tokens produced by the call.
    pub output_tokens: usize,
}

impl StageResponse {
    /// A response with no token accounting, for non-metered capabilities.
    pub fn unmetered(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            input_tokens: 0,
            output_tokens: 0,
        }
    }
}

/// The text-extraction capability: encoded image in, raw text out.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_text(&self, image: &EncodedImage) -> Result<StageResponse, CapabilityError>;
}

/// The validation/formatting capability: (text, schema) in, JSON string out.
///
/// The schema string is passed through verbatim; interpreting it is the
/// capability's responsibility.
#[async_trait]
pub trait TextFormatter: Send + Sync {
    async fn format_text(
        &self,
        extracted_text: &str,
        json_schema: &str,
    ) -> Result<StageResponse, CapabilityError>;
}

// ── VLM-backed implementations ───────────────────────────────────────────

/// [`TextExtractor`] backed by a vision-capable LLM provider.
pub struct VlmTextExtractor {
    provider: Arc<dyn LLMProvider>,
    system_prompt: String,
    temperature: f32,
    max_tokens: usize,
}

impl VlmTextExtractor {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ExtractionConfig) -> Self {
        Self {
            provider,
            system_prompt: config
                .extraction_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_EXTRACTION_PROMPT.to_string()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

#[async_trait]
impl TextExtractor for VlmTextExtractor {
    async fn extract_text(&self, image: &EncodedImage) -> Result<StageResponse, CapabilityError> {
        let messages = vec![
            ChatMessage::system(self.system_prompt.clone()),
            ChatMessage::user_with_images("", vec![image.to_image_data()]),
        ];
        let options = build_options(self.temperature, self.max_tokens);

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| CapabilityError::new(format!("{e}")))?;

        debug!(
            "Extraction: {} input tokens, {} output tokens",
            response.prompt_tokens, response.completion_tokens
        );

        Ok(StageResponse {
            content: response.content,
            input_tokens: response.prompt_tokens as usize,
            output_tokens: response.completion_tokens as usize,
        })
    }
}

/// [`TextFormatter`] backed by an LLM provider.
pub struct VlmTextFormatter {
    provider: Arc<dyn LLMProvider>,
    system_prompt: String,
    temperature: f32,
    max_tokens: usize,
}

impl VlmTextFormatter {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ExtractionConfig) -> Self {
        Self {
            provider,
            system_prompt: config
                .formatting_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_FORMATTING_PROMPT.to_string()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

#[async_trait]
impl TextFormatter for VlmTextFormatter {
    async fn format_text(
        &self,
        extracted_text: &str,
        json_schema: &str,
    ) -> Result<StageResponse, CapabilityError> {
        let messages = vec![
            ChatMessage::system(self.system_prompt.clone()),
            ChatMessage::user(formatting_user_message(extracted_text, json_schema)),
        ];
        let options = build_options(self.temperature, self.max_tokens);

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| CapabilityError::new(format!("{e}")))?;

        debug!(
            "Formatting: {} input tokens, {} output tokens",
            response.prompt_tokens, response.completion_tokens
        );

        Ok(StageResponse {
            content: response.content,
            input_tokens: response.prompt_tokens as usize,
            output_tokens: response.completion_tokens as usize,
        })
    }
}

/// Build `CompletionOptions` for a stage call.
fn build_options(temperature: f32, max_tokens: usize) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(temperature),
        max_tokens: Some(max_tokens),
        ..Default::default()
    }
}

// ── Capability resolution ────────────────────────────────────────────────

/// Resolve the two capabilities from the config.
///
/// When both stages are overridden no provider is constructed at all, so
/// fully-mocked runs need no API key in the environment.
pub(crate) fn resolve_capabilities(
    config: &ExtractionConfig,
) -> Result<(Arc<dyn TextExtractor>, Arc<dyn TextFormatter>), Img2JsonError> {
    if let (Some(extractor), Some(formatter)) = (&config.extractor, &config.formatter) {
        return Ok((Arc::clone(extractor), Arc::clone(formatter)));
    }

    let provider = resolve_provider(config)?;

    let extractor: Arc<dyn TextExtractor> = match &config.extractor {
        Some(e) => Arc::clone(e),
        None => Arc::new(VlmTextExtractor::new(Arc::clone(&provider), config)),
    };
    let formatter: Arc<dyn TextFormatter> = match &config.formatter {
        Some(f) => Arc::clone(f),
        None => Arc::new(VlmTextFormatter::new(provider, config)),
    };

    Ok((extractor, formatter))
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// The four-level fallback chain lets library users and CLI users each set
/// exactly as much or as little as they need:
///
/// 1. **Pre-built provider** (`config.provider`) — the caller constructed and
///    configured the provider entirely; we use it as-is. Useful when the
///    caller needs custom middleware (caching, rate-limiting).
///
/// 2. **Named provider + model** (`config.provider_name`) — the caller named
///    a provider (e.g. `"openai"`) and optional model. We call
///    [`ProviderFactory::create_llm_provider`] which reads the corresponding
///    API key (`OPENAI_API_KEY`, etc.) from the environment.
///
/// 3. **Environment pair** (`IMG2JSON_LLM_PROVIDER` + `IMG2JSON_MODEL`) —
///    both env vars set means the caller chose a provider and model at the
///    execution environment level (Makefile, shell script, CI). Checked
///    before full auto-detection so the model choice is honoured even when
///    multiple API keys are present.
///
/// 4. **Full auto-detection** (`ProviderFactory::from_env`) — the factory
///    scans all known API key variables and picks the first available
///    provider. Convenient for `img2json photo.png --schema s.json` with no
///    other configuration. OpenAI is preferred when `OPENAI_API_KEY` is
///    present so users with multiple keys get a deterministic default.
fn resolve_provider(config: &ExtractionConfig) -> Result<Arc<dyn LLMProvider>, Img2JsonError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or("gpt-4.1-nano");
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("IMG2JSON_LLM_PROVIDER"),
        std::env::var("IMG2JSON_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or("gpt-4.1-nano");
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| Img2JsonError::ProviderNotConfigured {
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

/// Instantiate a named provider with the given model.
fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, Img2JsonError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        Img2JsonError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoExtractor;

    #[async_trait]
    impl TextExtractor for EchoExtractor {
        async fn extract_text(
            &self,
            image: &EncodedImage,
        ) -> Result<StageResponse, CapabilityError> {
            Ok(StageResponse::unmetered(image.media_type().to_string()))
        }
    }

    struct EchoFormatter;

    #[async_trait]
    impl TextFormatter for EchoFormatter {
        async fn format_text(
            &self,
            extracted_text: &str,
            _json_schema: &str,
        ) -> Result<StageResponse, CapabilityError> {
            Ok(StageResponse::unmetered(format!("{{\"text\":\"{extracted_text}\"}}")))
        }
    }

    #[test]
    fn fully_overridden_capabilities_need_no_provider() {
        // Must not touch the environment or any provider factory.
        let config = ExtractionConfig::builder()
            .extractor(Arc::new(EchoExtractor))
            .formatter(Arc::new(EchoFormatter))
            .build()
            .unwrap();
        assert!(resolve_capabilities(&config).is_ok());
    }

    #[tokio::test]
    async fn mock_capabilities_are_object_safe() {
        let extractor: Arc<dyn TextExtractor> = Arc::new(EchoExtractor);
        let image = EncodedImage::from_bytes_with_media_type(b"x", "image/png");
        let response = extractor.extract_text(&image).await.unwrap();
        assert_eq!(response.content, "image/png");
        assert_eq!(response.input_tokens, 0);
    }

    #[test]
    fn unmetered_response_has_zero_tokens() {
        let r = StageResponse::unmetered("hi");
        assert_eq!(r.content, "hi");
        assert_eq!(r.output_tokens, 0);
    }
}
