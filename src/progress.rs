//! Progress-callback trait for pipeline state transitions.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to observe
//! the idle → extracting → validating → idle state machine as it runs.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers can
//! forward transitions to a UI spinner, a WebSocket, or a log line without
//! the library knowing anything about how the host application communicates.
//! The trait is `Send + Sync` so a single callback can be shared across
//! submissions.

use crate::error::Stage;
use std::sync::Arc;

/// The pipeline's progress indicator. Exactly one state holds at any time.
///
/// Idle is both the initial and the terminal state of every run; the two
/// in-flight states never overlap because the stages run strictly in
/// sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum PipelineState {
    /// No submission in flight.
    #[default]
    Idle,
    /// The text-extraction capability call is in flight.
    Extracting,
    /// The validation/formatting capability call is in flight.
    Validating,
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineState::Idle => write!(f, "idle"),
            PipelineState::Extracting => write!(f, "extracting"),
            PipelineState::Validating => write!(f, "validating"),
        }
    }
}

/// Called by the pipeline as it moves through its states.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Implementations must be `Send + Sync`; a callback
/// may be shared by reference across consecutive submissions.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called on every state transition, including the final return to
    /// [`PipelineState::Idle`].
    fn on_state_change(&self, state: PipelineState) {
        let _ = state;
    }

    /// Called when a stage produced usable output.
    ///
    /// # Arguments
    /// * `stage` — which stage completed
    /// * `chars` — length of the stage's text output
    fn on_stage_complete(&self, stage: Stage, chars: usize) {
        let _ = (stage, chars);
    }

    /// Called when a stage ends the run with an error.
    fn on_stage_error(&self, stage: Stage, error: &str) {
        let _ = (stage, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingCallback {
        states: Mutex<Vec<PipelineState>>,
    }

    impl PipelineProgressCallback for RecordingCallback {
        fn on_state_change(&self, state: PipelineState) {
            self.states.lock().unwrap().push(state);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_state_change(PipelineState::Extracting);
        cb.on_stage_complete(Stage::Extraction, 42);
        cb.on_stage_error(Stage::Validation, "some error");
        cb.on_state_change(PipelineState::Idle);
    }

    #[test]
    fn recording_callback_observes_transitions() {
        let cb = RecordingCallback {
            states: Mutex::new(Vec::new()),
        };
        cb.on_state_change(PipelineState::Extracting);
        cb.on_state_change(PipelineState::Validating);
        cb.on_state_change(PipelineState::Idle);
        assert_eq!(
            *cb.states.lock().unwrap(),
            vec![
                PipelineState::Extracting,
                PipelineState::Validating,
                PipelineState::Idle
            ]
        );
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: Arc<dyn PipelineProgressCallback> = Arc::new(NoopProgressCallback);
        cb.on_state_change(PipelineState::Extracting);
        cb.on_stage_complete(Stage::Extraction, 512);
    }

    #[test]
    fn state_display() {
        assert_eq!(PipelineState::Idle.to_string(), "idle");
        assert_eq!(PipelineState::Extracting.to_string(), "extracting");
        assert_eq!(PipelineState::Validating.to_string(), "validating");
    }
}
