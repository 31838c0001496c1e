//! Error types for the img2json library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Img2JsonError`] — **Fatal**: the pipeline cannot start at all
//!   (missing input, unreadable image, provider not configured). Returned as
//!   `Err(Img2JsonError)` from the top-level `extract*` functions and from
//!   [`crate::session::Session::submit`].
//!
//! * [`StageError`] — **Non-fatal**: one of the two model stages failed after
//!   the pipeline started. Stored inside [`crate::output::ExtractionOutput`]
//!   so callers can inspect partial results — in particular the raw extracted
//!   text that survives a formatting failure — rather than losing everything
//!   to the second stage.
//!
//! The separation lets callers decide their own tolerance: treat any stage
//! failure as an error via [`crate::output::ExtractionOutput::into_result`],
//! or show the fallback payload and let the user retry.

use std::path::PathBuf;
use thiserror::Error;

/// The two sequential phases of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Stage {
    /// First stage: extract raw text from the encoded image.
    Extraction,
    /// Second stage: validate and format the text against the schema.
    Validation,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Extraction => write!(f, "extraction"),
            Stage::Validation => write!(f, "validation"),
        }
    }
}

/// All fatal errors returned by the img2json library.
///
/// Stage-level failures use [`StageError`] and are stored in
/// [`crate::output::ExtractionOutput`] rather than propagated here.
#[derive(Debug, Error)]
pub enum Img2JsonError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Image file was not found at the given path.
    #[error("Image file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists but reading it failed.
    #[error("Error reading file '{path}': {source}")]
    FileReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// HTTP URL was syntactically valid but the server answered with a
    /// non-success status. Carries the response body so the user sees what
    /// the server actually said.
    #[error("Failed to fetch image from '{url}': HTTP {status}\n{body}")]
    HttpStatus {
        url: String,
        status: u16,
        body: String,
    },

    /// Network-level fetch failure (DNS, TLS, connection reset, or a host
    /// that refuses direct fetches).
    #[error(
        "Failed to load image from '{url}': {reason}\n\
         Ensure the URL is correct and publicly accessible. If the image host \
         blocks direct fetches, download the file and supply it as a local path instead."
    )]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Image download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The bytes were read but do not look like any known image format.
    #[error("Unrecognised image data: {detail}\nSupply a PNG, JPEG, GIF, or WebP image.")]
    UnsupportedImage { detail: String },

    /// A `data:` URI was supplied but could not be parsed.
    #[error("Invalid image data URI: {detail}")]
    InvalidDataUri { detail: String },

    // ── Precondition errors ───────────────────────────────────────────────
    /// Submission attempted without an image.
    #[error("Please provide an image first.")]
    MissingImage,

    /// Submission attempted with a blank schema.
    #[error("Please provide a JSON schema.")]
    MissingSchema,

    // ── Capability errors ─────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// A stage error promoted to a hard failure by
    /// [`crate::output::ExtractionOutput::into_result`].
    #[error("{0}")]
    Stage(StageError),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal, stage-labeled error from one of the two model stages.
///
/// Stored in [`crate::output::ExtractionOutput`]. When the second stage
/// fails the output also carries the raw extracted text, so a formatting
/// failure never erases a successful extraction.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum StageError {
    /// The text-extraction capability reported an error.
    #[error("Text extraction failed: {detail}")]
    ExtractionFailed { detail: String },

    /// Extraction succeeded but produced no usable text. Terminal for the
    /// submission; the formatter is never invoked.
    #[error("No text could be extracted from the image.")]
    NoTextExtracted,

    /// The formatting capability reported an error or returned nothing.
    #[error("Validation and formatting failed: {detail}")]
    FormattingFailed { detail: String },
}

impl StageError {
    /// Which pipeline stage produced this error.
    pub fn stage(&self) -> Stage {
        match self {
            StageError::ExtractionFailed { .. } | StageError::NoTextExtracted => Stage::Extraction,
            StageError::FormattingFailed { .. } => Stage::Validation,
        }
    }
}

/// An error reported by an external capability (the black-box model call).
///
/// Capabilities are opaque: no structure is assumed beyond a human-readable
/// message, which the pipeline surfaces verbatim inside a [`StageError`].
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct CapabilityError {
    pub message: String,
}

impl CapabilityError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
