//! # img2json
//!
//! Extract schema-shaped JSON from images using Vision Language Models.
//!
//! ## Why this crate?
//!
//! Classic OCR gives you a wall of text; turning "Name: Alice  Age: 34" into
//! the JSON your system actually ingests is a second, separate problem.
//! This crate sequences both steps against a hosted VLM: read the image as a
//! human would, then shape the text into a JSON object conforming to a
//! user-supplied JSON Schema. The schema is passed through verbatim — the
//! model, not this crate, interprets it.
//!
//! ## Pipeline Overview
//!
//! ```text
//! image (file / URL / bytes)
//!  │
//!  ├─ 1. Acquire   read local file or fetch URL
//!  ├─ 2. Encode    bytes → base64 data URI with sniffed media type
//!  ├─ 3. Extract   VLM OCR call — raw text out
//!  ├─ 4. Validate  LLM call with (text, schema) — JSON out
//!  └─ 5. Clean     strip fences / CRLF / invisible Unicode
//! ```
//!
//! The two model stages run strictly in sequence behind trait seams
//! ([`TextExtractor`], [`TextFormatter`]); progress is observable through a
//! [`PipelineProgressCallback`] as an idle → extracting → validating → idle
//! state machine. A validation-stage failure preserves the raw extracted
//! text in the output, so a successful extraction is never lost to a
//! formatting hiccup.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use img2json::{extract, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = ExtractionConfig::default();
//!     let schema = r#"{"type":"object","properties":{"name":{"type":"string"}}}"#;
//!     let output = extract("business_card.png", schema, &config).await?;
//!     match output.formatted_json {
//!         Some(json) => println!("{json}"),
//!         None => eprintln!("failed: {:?}", output.error),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Interactive surfaces hold a [`Session`] instead, which owns the current
//! image, schema text, and last result, and enforces the
//! image-present / schema-non-blank preconditions on submit.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `img2json` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! img2json = { version = "0.3", default-features = false }
//! ```
//!
//! ## Choosing a Model
//!
//! | Model | $/1M tokens | Quality | Best for |
//! |-------|------------|---------|----------|
//! | `gpt-4.1-nano` | $0.10/$0.40 | ★★★ | Default — fast, cheap |
//! | `gpt-4.1-mini` | $0.40/$1.60 | ★★★★ | Balance |
//! | `claude-sonnet-4-20250514` | $3.00/$15.00 | ★★★★★ | Dense forms, handwriting |
//! | `gemini-2.0-flash` | $0.10/$0.40 | ★★★ | Alternative cheap option |
//!
//! A typical receipt or business card costs a fraction of a cent with
//! `gpt-4.1-nano`.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod capability;
pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use capability::{StageResponse, TextExtractor, TextFormatter, VlmTextExtractor, VlmTextFormatter};
pub use config::{ExtractionConfig, ExtractionConfigBuilder};
pub use error::{CapabilityError, Img2JsonError, Stage, StageError};
pub use extract::{extract, extract_from_bytes, extract_from_image, extract_sync, extract_to_file};
pub use output::{ExtractionOutput, ExtractionStats};
pub use pipeline::acquire::ImageSource;
pub use pipeline::encode::EncodedImage;
pub use progress::{NoopProgressCallback, PipelineProgressCallback, PipelineState, ProgressCallback};
pub use session::Session;
