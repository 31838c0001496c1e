//! Result types produced by the extraction pipeline.
//!
//! Every submission produces exactly one [`ExtractionOutput`], created fresh
//! per attempt and replaced on the next. Stage failures live *inside* the
//! output (see [`crate::error::StageError`]) instead of aborting the call, so
//! a formatting failure can still hand the caller the raw extracted text.

use crate::error::{Img2JsonError, StageError};
use serde::{Deserialize, Serialize};

/// The result of one pipeline submission.
///
/// Exactly one of the following shapes holds:
///
/// | shape | `formatted_json` | `fallback_text` | `error` |
/// |-------|------------------|-----------------|---------|
/// | success | `Some(json)` | `None` | `None` |
/// | extraction failed / no text | `None` | `None` | `Some(extraction error)` |
/// | formatting failed | `None` | `Some(raw text)` | `Some(validation error)` |
///
/// The third row is the "always preserve" policy: after a successful
/// extraction the user is never shown a blank result, even when the second
/// stage fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutput {
    /// The schema-shaped JSON string, present only on full success.
    pub formatted_json: Option<String>,

    /// Raw extracted text preserved when formatting failed. Labeled as
    /// partial/unconfirmed output: it has not passed the validation stage.
    pub fallback_text: Option<String>,

    /// Stage-labeled error, `None` on full success.
    pub error: Option<StageError>,

    /// Timing and token accounting for the run.
    pub stats: ExtractionStats,
}

impl ExtractionOutput {
    /// `true` when the pipeline produced formatted JSON with no error.
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.formatted_json.is_some()
    }

    /// Promote a stage error to a hard failure.
    ///
    /// For callers that have no use for partial output: returns the formatted
    /// JSON on success, or `Err(Img2JsonError::Stage(..))` otherwise. The
    /// fallback text is dropped — use the fields directly to keep it.
    pub fn into_result(self) -> Result<String, Img2JsonError> {
        match (self.formatted_json, self.error) {
            (Some(json), None) => Ok(json),
            (_, Some(err)) => Err(Img2JsonError::Stage(err)),
            (None, None) => Err(Img2JsonError::Internal(
                "pipeline produced neither output nor error".into(),
            )),
        }
    }
}

/// Timing and token accounting for a single submission.
///
/// Token counts are reported by the provider and are zero for capabilities
/// that do not meter usage (mocks, local models).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Wall-clock time of the extraction stage.
    pub extraction_duration_ms: u64,
    /// Wall-clock time of the validation/formatting stage. Zero when the
    /// pipeline ended before the second stage.
    pub formatting_duration_ms: u64,
    /// Total pipeline wall-clock time.
    pub total_duration_ms: u64,
    /// Prompt tokens across both stages.
    pub total_input_tokens: u64,
    /// Completion tokens across both stages.
    pub total_output_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success_output() -> ExtractionOutput {
        ExtractionOutput {
            formatted_json: Some("{\"name\":\"Alice\"}".into()),
            fallback_text: None,
            error: None,
            stats: ExtractionStats::default(),
        }
    }

    #[test]
    fn success_shape() {
        let out = success_output();
        assert!(out.is_success());
        assert_eq!(out.into_result().unwrap(), "{\"name\":\"Alice\"}");
    }

    #[test]
    fn formatting_failure_promotes_to_stage_error() {
        let out = ExtractionOutput {
            formatted_json: None,
            fallback_text: Some("Name: Alice".into()),
            error: Some(StageError::FormattingFailed {
                detail: "boom".into(),
            }),
            stats: ExtractionStats::default(),
        };
        assert!(!out.is_success());
        let err = out.into_result().unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn output_serialises_round_trip() {
        let out = success_output();
        let json = serde_json::to_string(&out).unwrap();
        let back: ExtractionOutput = serde_json::from_str(&json).unwrap();
        assert_eq!(back.formatted_json, out.formatted_json);
    }
}
