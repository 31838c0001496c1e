//! Top-level extraction entry points and the two-stage pipeline sequencer.
//!
//! ## Shape of the pipeline
//!
//! ```text
//! idle ──▶ extracting ──▶ validating ──▶ idle (success or validation error)
//!             │
//!             └──────────────────────▶ idle (extraction error / no text)
//! ```
//!
//! The sequencer never retries and enforces no local timeout on the model
//! calls; a failed stage is surfaced once, stage-labeled, and the caller
//! decides whether to resubmit. A validation-stage failure always preserves
//! the raw extracted text in the output, so the user is never shown a blank
//! result after a successful extraction.

use crate::capability::{resolve_capabilities, TextExtractor, TextFormatter};
use crate::config::ExtractionConfig;
use crate::error::{Img2JsonError, Stage, StageError};
use crate::output::{ExtractionOutput, ExtractionStats};
use crate::pipeline::{acquire, encode::EncodedImage, postprocess};
use crate::progress::PipelineState;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Extract schema-shaped JSON from an image file or URL.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `input` — Local image path or HTTP/HTTPS URL
/// * `json_schema` — JSON Schema text, passed verbatim to the formatter
/// * `config` — Extraction configuration
///
/// # Returns
/// `Ok(ExtractionOutput)` whenever the pipeline ran, even if a stage failed
/// (check `output.error`; a formatting failure still carries the raw
/// extracted text in `output.fallback_text`).
///
/// # Errors
/// Returns `Err(Img2JsonError)` only for failures that prevent the pipeline
/// from starting: blank schema, unreadable or unrecognisable image,
/// unreachable URL, provider not configured.
pub async fn extract(
    input: impl AsRef<str>,
    json_schema: &str,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, Img2JsonError> {
    let input = input.as_ref();
    if json_schema.trim().is_empty() {
        return Err(Img2JsonError::MissingSchema);
    }
    info!("Starting extraction: {}", input);

    let image = acquire::acquire(input, config.download_timeout_secs).await?;
    extract_from_image(&image, json_schema, config).await
}

/// Extract schema-shaped JSON from image bytes already in memory.
///
/// The media type is sniffed from the magic bytes. This is the API to use
/// when image data comes from an upload handler or a database rather than a
/// file on disk.
pub async fn extract_from_bytes(
    bytes: &[u8],
    json_schema: &str,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, Img2JsonError> {
    if json_schema.trim().is_empty() {
        return Err(Img2JsonError::MissingSchema);
    }
    let image = EncodedImage::from_bytes(bytes)?;
    extract_from_image(&image, json_schema, config).await
}

/// Extract schema-shaped JSON from an already-encoded image.
pub async fn extract_from_image(
    image: &EncodedImage,
    json_schema: &str,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, Img2JsonError> {
    if json_schema.trim().is_empty() {
        return Err(Img2JsonError::MissingSchema);
    }
    let (extractor, formatter) = resolve_capabilities(config)?;
    Ok(run_pipeline(&extractor, &formatter, image, json_schema, config).await)
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    input: impl AsRef<str>,
    json_schema: &str,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, Img2JsonError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Img2JsonError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract(input, json_schema, config))
}

/// Extract and write the formatted JSON directly to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files. The
/// file is written only on full success; on a stage error the output is
/// returned untouched for the caller to inspect.
pub async fn extract_to_file(
    input: impl AsRef<str>,
    json_schema: &str,
    output_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, Img2JsonError> {
    let output = extract(input, json_schema, config).await?;
    let path = output_path.as_ref();

    if let Some(ref json) = output.formatted_json {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Img2JsonError::OutputWriteFailed {
                    path: path.to_path_buf(),
                    source: e,
                }
            })?;
        }

        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, json).await.map_err(|e| {
            Img2JsonError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            }
        })?;

        tokio::fs::rename(&tmp_path, path).await.map_err(|e| {
            Img2JsonError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            }
        })?;
    }

    Ok(output)
}

// ── Pipeline sequencer ───────────────────────────────────────────────────

/// Run the two stages against an encoded image and schema text.
///
/// Preconditions (non-blank schema, present image) are the caller's job;
/// this function assumes both hold and touches the network only through the
/// two capabilities. Always returns an `ExtractionOutput` — stage failures
/// live inside it, never as a panic or an `Err`.
pub(crate) async fn run_pipeline(
    extractor: &Arc<dyn TextExtractor>,
    formatter: &Arc<dyn TextFormatter>,
    image: &EncodedImage,
    json_schema: &str,
    config: &ExtractionConfig,
) -> ExtractionOutput {
    let total_start = Instant::now();
    let cb = config.progress_callback.as_deref();
    let mut stats = ExtractionStats::default();

    // ── Stage 1: extraction ──────────────────────────────────────────────
    if let Some(cb) = cb {
        cb.on_state_change(PipelineState::Extracting);
    }
    debug!("Extraction stage started ({})", image.media_type());
    let stage_start = Instant::now();
    let extraction = extractor.extract_text(image).await;
    stats.extraction_duration_ms = stage_start.elapsed().as_millis() as u64;

    let extracted_text = match extraction {
        Ok(response) => {
            stats.total_input_tokens += response.input_tokens as u64;
            stats.total_output_tokens += response.output_tokens as u64;

            if response.content.trim().is_empty() {
                // Terminal outcome, not an exception: the image simply had
                // no legible text. The formatter is never invoked.
                warn!("Extraction produced no text");
                return finish(
                    cb,
                    stats,
                    total_start,
                    None,
                    None,
                    Some(StageError::NoTextExtracted),
                );
            }

            info!("Extracted {} chars", response.content.len());
            if let Some(cb) = cb {
                cb.on_stage_complete(Stage::Extraction, response.content.len());
            }
            response.content
        }
        Err(e) => {
            warn!("Extraction failed: {}", e);
            return finish(
                cb,
                stats,
                total_start,
                None,
                None,
                Some(StageError::ExtractionFailed { detail: e.message }),
            );
        }
    };

    // ── Stage 2: validation / formatting ─────────────────────────────────
    if let Some(cb) = cb {
        cb.on_state_change(PipelineState::Validating);
    }
    debug!("Validation stage started ({} chars of text)", extracted_text.len());
    let stage_start = Instant::now();
    let formatting = formatter.format_text(&extracted_text, json_schema).await;
    stats.formatting_duration_ms = stage_start.elapsed().as_millis() as u64;

    match formatting {
        Ok(response) => {
            stats.total_input_tokens += response.input_tokens as u64;
            stats.total_output_tokens += response.output_tokens as u64;

            let json = postprocess::clean_json(&response.content);
            if json.is_empty() {
                warn!("Formatter returned an empty response");
                return finish(
                    cb,
                    stats,
                    total_start,
                    None,
                    Some(extracted_text),
                    Some(StageError::FormattingFailed {
                        detail: "the formatter returned an empty response".into(),
                    }),
                );
            }

            let json = if config.pretty {
                postprocess::pretty_print(&json).unwrap_or(json)
            } else {
                json
            };

            info!("Formatted JSON: {} chars", json.len());
            if let Some(cb) = cb {
                cb.on_stage_complete(Stage::Validation, json.len());
            }
            finish(cb, stats, total_start, Some(json), None, None)
        }
        Err(e) => {
            // The extraction succeeded, so its text is preserved as a
            // labeled fallback payload alongside the error.
            warn!("Formatting failed: {}", e);
            finish(
                cb,
                stats,
                total_start,
                None,
                Some(extracted_text),
                Some(StageError::FormattingFailed { detail: e.message }),
            )
        }
    }
}

/// Assemble the terminal output and return the state machine to idle.
fn finish(
    cb: Option<&dyn crate::progress::PipelineProgressCallback>,
    mut stats: ExtractionStats,
    total_start: Instant,
    formatted_json: Option<String>,
    fallback_text: Option<String>,
    error: Option<StageError>,
) -> ExtractionOutput {
    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    if let Some(cb) = cb {
        if let Some(ref err) = error {
            cb.on_stage_error(err.stage(), &err.to_string());
        }
        cb.on_state_change(PipelineState::Idle);
    }
    ExtractionOutput {
        formatted_json,
        fallback_text,
        error,
        stats,
    }
}
