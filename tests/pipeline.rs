//! Integration tests for the two-stage extraction pipeline.
//!
//! These tests exercise the full pipeline contract with mock capabilities —
//! no network, no API keys. The properties under test: precondition checks
//! fire before any capability call, stage errors are labeled and carry the
//! collaborator's message verbatim, a formatting failure preserves the raw
//! extracted text, and every submission walks the
//! idle → extracting → validating → idle state machine exactly once.

use async_trait::async_trait;
use img2json::{
    CapabilityError, EncodedImage, ExtractionConfig, Img2JsonError, PipelineProgressCallback,
    PipelineState, Session, StageError, StageResponse, TextExtractor, TextFormatter,
};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Mock capabilities ────────────────────────────────────────────────────────

struct StaticExtractor {
    text: String,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl TextExtractor for StaticExtractor {
    async fn extract_text(&self, _image: &EncodedImage) -> Result<StageResponse, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(StageResponse::unmetered(self.text.clone()))
    }
}

struct FailingExtractor {
    message: String,
}

#[async_trait]
impl TextExtractor for FailingExtractor {
    async fn extract_text(&self, _image: &EncodedImage) -> Result<StageResponse, CapabilityError> {
        Err(CapabilityError::new(self.message.clone()))
    }
}

struct StaticFormatter {
    json: String,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl TextFormatter for StaticFormatter {
    async fn format_text(
        &self,
        _extracted_text: &str,
        _json_schema: &str,
    ) -> Result<StageResponse, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(StageResponse::unmetered(self.json.clone()))
    }
}

struct FailingFormatter {
    message: String,
}

#[async_trait]
impl TextFormatter for FailingFormatter {
    async fn format_text(
        &self,
        _extracted_text: &str,
        _json_schema: &str,
    ) -> Result<StageResponse, CapabilityError> {
        Err(CapabilityError::new(self.message.clone()))
    }
}

/// Records every state transition the pipeline reports.
struct StateRecorder {
    states: Mutex<Vec<PipelineState>>,
}

impl StateRecorder {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            states: Mutex::new(Vec::new()),
        })
    }

    fn observed(&self) -> Vec<PipelineState> {
        self.states.lock().unwrap().clone()
    }
}

impl PipelineProgressCallback for StateRecorder {
    fn on_state_change(&self, state: PipelineState) {
        self.states.lock().unwrap().push(state);
    }
}

// ── Test helpers ─────────────────────────────────────────────────────────────

const SCHEMA: &str = r#"{"type":"object","properties":{"name":{"type":"string"}}}"#;

fn png_image() -> EncodedImage {
    EncodedImage::from_bytes(b"\x89PNG\r\n\x1a\npayload").expect("png magic should sniff")
}

fn ready_session() -> Session {
    let mut session = Session::new();
    session.set_image(png_image());
    session.set_schema(SCHEMA);
    session
}

struct MockConfigBuilder {
    extractor_calls: Arc<AtomicUsize>,
    formatter_calls: Arc<AtomicUsize>,
    recorder: Arc<StateRecorder>,
}

impl MockConfigBuilder {
    fn new() -> Self {
        Self {
            extractor_calls: Arc::new(AtomicUsize::new(0)),
            formatter_calls: Arc::new(AtomicUsize::new(0)),
            recorder: StateRecorder::new(),
        }
    }

    /// Config whose extractor returns `text` and whose formatter returns `json`.
    fn config(&self, text: &str, json: &str) -> ExtractionConfig {
        ExtractionConfig::builder()
            .extractor(Arc::new(StaticExtractor {
                text: text.to_string(),
                calls: Arc::clone(&self.extractor_calls),
            }))
            .formatter(Arc::new(StaticFormatter {
                json: json.to_string(),
                calls: Arc::clone(&self.formatter_calls),
            }))
            .progress_callback(Arc::clone(&self.recorder) as Arc<dyn PipelineProgressCallback>)
            .build()
            .unwrap()
    }
}

// ── End-to-end happy path ────────────────────────────────────────────────────

#[tokio::test]
async fn end_to_end_success() {
    let mocks = MockConfigBuilder::new();
    let config = mocks.config("Name: Alice", r#"{"name":"Alice"}"#);

    let mut session = ready_session();
    let output = session.submit(&config).await.expect("submit should run");

    assert!(output.is_success());
    assert_eq!(output.formatted_json.as_deref(), Some(r#"{"name":"Alice"}"#));
    assert!(output.error.is_none());
    assert!(output.fallback_text.is_none());
    assert_eq!(mocks.extractor_calls.load(Ordering::SeqCst), 1);
    assert_eq!(mocks.formatter_calls.load(Ordering::SeqCst), 1);

    // idle → extracting → validating → idle, exactly once
    assert_eq!(
        mocks.recorder.observed(),
        vec![
            PipelineState::Extracting,
            PipelineState::Validating,
            PipelineState::Idle
        ]
    );
}

#[tokio::test]
async fn consecutive_submissions_each_walk_the_state_machine_once() {
    let mocks = MockConfigBuilder::new();
    let config = mocks.config("Name: Alice", r#"{"name":"Alice"}"#);

    let mut session = ready_session();
    session.submit(&config).await.unwrap();
    session.submit(&config).await.unwrap();

    assert_eq!(
        mocks.recorder.observed(),
        vec![
            PipelineState::Extracting,
            PipelineState::Validating,
            PipelineState::Idle,
            PipelineState::Extracting,
            PipelineState::Validating,
            PipelineState::Idle,
        ],
        "no overlapping or missing transitions across two sequential runs"
    );
    assert_eq!(mocks.extractor_calls.load(Ordering::SeqCst), 2);
}

// ── Precondition checks ──────────────────────────────────────────────────────

#[tokio::test]
async fn missing_image_makes_no_capability_calls() {
    let mocks = MockConfigBuilder::new();
    let config = mocks.config("anything", "{}");

    let mut session = Session::new();
    session.set_schema(SCHEMA);

    let err = session.submit(&config).await.unwrap_err();
    assert!(matches!(err, Img2JsonError::MissingImage));
    assert_eq!(err.to_string(), "Please provide an image first.");
    assert_eq!(mocks.extractor_calls.load(Ordering::SeqCst), 0);
    assert_eq!(mocks.formatter_calls.load(Ordering::SeqCst), 0);
    assert!(mocks.recorder.observed().is_empty(), "state never left idle");
}

#[tokio::test]
async fn blank_schema_makes_no_capability_calls() {
    let mocks = MockConfigBuilder::new();
    let config = mocks.config("anything", "{}");

    let mut session = Session::new();
    session.set_image(png_image());
    session.set_schema("   \n\t  ");

    let err = session.submit(&config).await.unwrap_err();
    assert!(matches!(err, Img2JsonError::MissingSchema));
    assert_eq!(mocks.extractor_calls.load(Ordering::SeqCst), 0);
    assert_eq!(mocks.formatter_calls.load(Ordering::SeqCst), 0);
}

// ── Extraction-stage outcomes ────────────────────────────────────────────────

#[tokio::test]
async fn empty_extraction_never_reaches_the_formatter() {
    let mocks = MockConfigBuilder::new();
    let config = mocks.config("", r#"{"never":"returned"}"#);

    let mut session = ready_session();
    let output = session.submit(&config).await.unwrap();

    assert!(matches!(output.error, Some(StageError::NoTextExtracted)));
    assert!(output.formatted_json.is_none());
    assert!(output.fallback_text.is_none());
    assert_eq!(mocks.formatter_calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        mocks.recorder.observed(),
        vec![PipelineState::Extracting, PipelineState::Idle],
        "pipeline must go straight back to idle"
    );
}

#[tokio::test]
async fn whitespace_only_extraction_counts_as_no_text() {
    let mocks = MockConfigBuilder::new();
    let config = mocks.config("  \n \t ", "{}");

    let mut session = ready_session();
    let output = session.submit(&config).await.unwrap();

    assert!(matches!(output.error, Some(StageError::NoTextExtracted)));
    assert_eq!(mocks.formatter_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn extractor_failure_is_stage_labeled_and_verbatim() {
    let formatter_calls = Arc::new(AtomicUsize::new(0));
    let config = ExtractionConfig::builder()
        .extractor(Arc::new(FailingExtractor {
            message: "vision model rejected the request".into(),
        }))
        .formatter(Arc::new(StaticFormatter {
            json: "{}".into(),
            calls: Arc::clone(&formatter_calls),
        }))
        .build()
        .unwrap();

    let mut session = ready_session();
    let output = session.submit(&config).await.unwrap();

    match &output.error {
        Some(StageError::ExtractionFailed { detail }) => {
            assert_eq!(detail, "vision model rejected the request");
        }
        other => panic!("expected extraction-stage error, got {other:?}"),
    }
    assert!(output.formatted_json.is_none());
    assert_eq!(formatter_calls.load(Ordering::SeqCst), 0);
}

// ── Validation-stage outcomes ────────────────────────────────────────────────

#[tokio::test]
async fn formatter_failure_preserves_the_raw_text() {
    let extractor_calls = Arc::new(AtomicUsize::new(0));
    let recorder = StateRecorder::new();
    let config = ExtractionConfig::builder()
        .extractor(Arc::new(StaticExtractor {
            text: "Name: Alice".into(),
            calls: extractor_calls,
        }))
        .formatter(Arc::new(FailingFormatter {
            message: "output did not conform to the schema".into(),
        }))
        .progress_callback(Arc::clone(&recorder) as Arc<dyn PipelineProgressCallback>)
        .build()
        .unwrap();

    let mut session = ready_session();
    let output = session.submit(&config).await.unwrap();

    match &output.error {
        Some(StageError::FormattingFailed { detail }) => {
            assert_eq!(detail, "output did not conform to the schema");
        }
        other => panic!("expected validation-stage error, got {other:?}"),
    }
    assert_eq!(
        output.fallback_text.as_deref(),
        Some("Name: Alice"),
        "a successful extraction must never be erased by a formatting failure"
    );
    assert!(output.formatted_json.is_none());
    assert_eq!(
        recorder.observed(),
        vec![
            PipelineState::Extracting,
            PipelineState::Validating,
            PipelineState::Idle
        ]
    );
}

#[tokio::test]
async fn empty_formatter_output_is_a_validation_error_with_fallback() {
    let mocks = MockConfigBuilder::new();
    let config = mocks.config("Name: Alice", "");

    let mut session = ready_session();
    let output = session.submit(&config).await.unwrap();

    assert!(matches!(
        output.error,
        Some(StageError::FormattingFailed { .. })
    ));
    assert_eq!(output.fallback_text.as_deref(), Some("Name: Alice"));
}

#[tokio::test]
async fn fenced_formatter_output_is_cleaned() {
    let mocks = MockConfigBuilder::new();
    let config = mocks.config("Name: Alice", "```json\n{\"name\":\"Alice\"}\n```");

    let mut session = ready_session();
    let output = session.submit(&config).await.unwrap();

    assert_eq!(output.formatted_json.as_deref(), Some(r#"{"name":"Alice"}"#));
}

#[tokio::test]
async fn pretty_reserialises_parsable_output() {
    let mocks = MockConfigBuilder::new();
    let mut config = mocks.config("Name: Alice", r#"{"name":"Alice"}"#);
    config.pretty = true;

    let mut session = ready_session();
    let output = session.submit(&config).await.unwrap();

    let json = output.formatted_json.as_deref().unwrap();
    assert!(json.contains("\"name\": \"Alice\""), "got: {json}");
    assert!(json.contains('\n'));
}

// ── Source switching ─────────────────────────────────────────────────────────

#[tokio::test]
async fn newest_image_source_replaces_the_previous_one() {
    let mut session = Session::new();

    // First source: a local file.
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"\x89PNG\r\n\x1a\nfirst").unwrap();
    session.load_image_file(file.path()).await.unwrap();
    let first = session.image().unwrap().clone();
    assert!(session.source().is_some());

    // Second source: pre-encoded bytes (as an upload handler would supply).
    let second = EncodedImage::from_bytes(b"\xFF\xD8\xFF\xE0second").unwrap();
    session.set_image(second.clone());
    assert_eq!(session.image(), Some(&second));
    assert_ne!(session.image(), Some(&first));
    assert!(
        session.source().is_none(),
        "provenance of the replaced source must not linger"
    );

    // And back to a file again.
    let mut other = tempfile::NamedTempFile::new().unwrap();
    other.write_all(b"\x89PNG\r\n\x1a\nthird").unwrap();
    session.load_image_file(other.path()).await.unwrap();
    assert_ne!(session.image(), Some(&second));
    assert!(session.source().is_some());
}

// ── Result lifecycle ─────────────────────────────────────────────────────────

#[tokio::test]
async fn each_submission_replaces_the_previous_result() {
    let mocks = MockConfigBuilder::new();
    let first_config = mocks.config("Name: Alice", r#"{"name":"Alice"}"#);
    let second_config = mocks.config("Name: Bob", r#"{"name":"Bob"}"#);

    let mut session = ready_session();
    session.submit(&first_config).await.unwrap();
    assert_eq!(
        session.last_output().unwrap().formatted_json.as_deref(),
        Some(r#"{"name":"Alice"}"#)
    );

    session.submit(&second_config).await.unwrap();
    assert_eq!(
        session.last_output().unwrap().formatted_json.as_deref(),
        Some(r#"{"name":"Bob"}"#)
    );
}

#[tokio::test]
async fn into_result_promotes_stage_errors() {
    let mocks = MockConfigBuilder::new();
    let config = mocks.config("", "{}");

    let mut session = ready_session();
    let output = session.submit(&config).await.unwrap().clone();

    let err = output.into_result().unwrap_err();
    assert!(err.to_string().contains("No text could be extracted"));
}
