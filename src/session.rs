//! Session-scoped state for interactive use.
//!
//! A [`Session`] owns the three values an interactive surface juggles — the
//! current image, the schema text, and the last result — as one explicit
//! state object instead of ambient globals. Components receive it by
//! reference; nothing else holds the state.
//!
//! ## Single-flight by construction
//!
//! [`Session::submit`] takes `&mut self`. The exclusive borrow *is* the
//! disabled submit trigger: while a submission is awaited no other code can
//! start a second one, read a half-updated result, or swap the image out
//! from under the pipeline. There is no busy flag and no lock because an
//! overlapping submission is unrepresentable. Stage transitions are
//! observable through the progress callback configured on the
//! [`ExtractionConfig`].

use crate::capability::resolve_capabilities;
use crate::config::ExtractionConfig;
use crate::error::Img2JsonError;
use crate::extract::run_pipeline;
use crate::output::ExtractionOutput;
use crate::pipeline::acquire::{self, ImageSource};
use crate::pipeline::encode::EncodedImage;
use std::path::Path;

/// The mutable state of one interactive session.
///
/// Created empty; filled by user-triggered events; never shared between
/// concurrent writers.
#[derive(Debug, Default)]
pub struct Session {
    image: Option<EncodedImage>,
    source: Option<ImageSource>,
    schema_text: String,
    last_output: Option<ExtractionOutput>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Image acquisition ────────────────────────────────────────────────

    /// Load the image from a local file, replacing any previous image.
    ///
    /// On failure the current image is cleared, matching the rule that only
    /// the most recent acquisition attempt is "current".
    pub async fn load_image_file(&mut self, path: impl AsRef<Path>) -> Result<(), Img2JsonError> {
        let path = path.as_ref();
        match acquire::read_file(path).await {
            Ok(image) => {
                self.image = Some(image);
                self.source = Some(ImageSource::File(path.to_path_buf()));
                Ok(())
            }
            Err(e) => {
                self.clear_image();
                Err(e)
            }
        }
    }

    /// Load the image from a URL, replacing any previous image.
    ///
    /// Uses `config.download_timeout_secs`. On failure the current image is
    /// cleared.
    pub async fn load_image_url(
        &mut self,
        url: &str,
        config: &ExtractionConfig,
    ) -> Result<(), Img2JsonError> {
        match acquire::fetch_url(url, config.download_timeout_secs).await {
            Ok(image) => {
                self.image = Some(image);
                self.source = Some(ImageSource::Url(url.to_string()));
                Ok(())
            }
            Err(e) => {
                self.clear_image();
                Err(e)
            }
        }
    }

    /// Attach an already-encoded image (e.g. from an upload handler),
    /// replacing any previous image. The source provenance is cleared since
    /// the bytes did not come through this session's acquisition.
    pub fn set_image(&mut self, image: EncodedImage) {
        self.image = Some(image);
        self.source = None;
    }

    /// Drop the current image and its provenance.
    pub fn clear_image(&mut self) {
        self.image = None;
        self.source = None;
    }

    pub fn image(&self) -> Option<&EncodedImage> {
        self.image.as_ref()
    }

    /// Where the current image came from, when it was acquired through this
    /// session.
    pub fn source(&self) -> Option<&ImageSource> {
        self.source.as_ref()
    }

    /// The preview representation: the image's own data URI.
    pub fn preview(&self) -> Option<String> {
        self.image.as_ref().map(EncodedImage::data_uri)
    }

    // ── Schema ───────────────────────────────────────────────────────────

    /// Replace the schema text. Stored verbatim; never parsed locally.
    pub fn set_schema(&mut self, text: impl Into<String>) {
        self.schema_text = text.into();
    }

    pub fn schema_text(&self) -> &str {
        &self.schema_text
    }

    // ── Submission ───────────────────────────────────────────────────────

    /// `true` when both preconditions hold and a submission would start.
    /// The interactive surface enables its submit action off this.
    pub fn is_ready(&self) -> bool {
        self.image.is_some() && !self.schema_text.trim().is_empty()
    }

    /// Run the two-stage pipeline against the current image and schema.
    ///
    /// Preconditions are checked first: a missing image or blank schema
    /// fails immediately with no capability call and leaves the previous
    /// result untouched. Otherwise the result replaces the previous one,
    /// whether or not a stage failed.
    pub async fn submit(
        &mut self,
        config: &ExtractionConfig,
    ) -> Result<&ExtractionOutput, Img2JsonError> {
        let image = self.image.as_ref().ok_or(Img2JsonError::MissingImage)?;
        if self.schema_text.trim().is_empty() {
            return Err(Img2JsonError::MissingSchema);
        }

        let (extractor, formatter) = resolve_capabilities(config)?;
        let output = run_pipeline(&extractor, &formatter, image, &self.schema_text, config).await;
        Ok(self.last_output.insert(output))
    }

    /// The result of the most recent completed submission, if any.
    pub fn last_output(&self) -> Option<&ExtractionOutput> {
        self.last_output.as_ref()
    }

    /// Discard the last result, returning the output surface to its empty
    /// state.
    pub fn clear_output(&mut self) {
        self.last_output = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_image() -> EncodedImage {
        EncodedImage::from_bytes(b"\x89PNG\r\n\x1a\npayload").unwrap()
    }

    #[test]
    fn fresh_session_is_not_ready() {
        let session = Session::new();
        assert!(!session.is_ready());
        assert!(session.image().is_none());
        assert!(session.last_output().is_none());
    }

    #[test]
    fn ready_requires_image_and_non_blank_schema() {
        let mut session = Session::new();
        session.set_schema("{\"type\":\"object\"}");
        assert!(!session.is_ready());

        session.set_image(png_image());
        assert!(session.is_ready());

        session.set_schema("   \n");
        assert!(!session.is_ready());
    }

    #[tokio::test]
    async fn submit_without_image_is_an_input_error() {
        let mut session = Session::new();
        session.set_schema("{\"type\":\"object\"}");
        let err = session.submit(&ExtractionConfig::default()).await.unwrap_err();
        assert!(matches!(err, Img2JsonError::MissingImage));
        assert!(session.last_output().is_none());
    }

    #[tokio::test]
    async fn submit_with_blank_schema_is_an_input_error() {
        let mut session = Session::new();
        session.set_image(png_image());
        session.set_schema("   ");
        let err = session.submit(&ExtractionConfig::default()).await.unwrap_err();
        assert!(matches!(err, Img2JsonError::MissingSchema));
        assert!(session.last_output().is_none());
    }

    #[tokio::test]
    async fn failed_file_load_clears_previous_image() {
        let mut session = Session::new();
        session.set_image(png_image());
        assert!(session.image().is_some());

        let err = session
            .load_image_file("/definitely/not/a/real/image.png")
            .await
            .unwrap_err();
        assert!(matches!(err, Img2JsonError::FileNotFound { .. }));
        assert!(session.image().is_none(), "stale image must not survive");
    }

    #[test]
    fn preview_is_the_data_uri() {
        let mut session = Session::new();
        session.set_image(png_image());
        let preview = session.preview().unwrap();
        assert!(preview.starts_with("data:image/png;base64,"));
    }
}
