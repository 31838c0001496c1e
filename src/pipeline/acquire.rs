//! Image acquisition: normalise a user-supplied path or URL to an
//! [`EncodedImage`].
//!
//! ## Why encode in memory?
//!
//! Unlike file-based document engines, a VLM capability consumes the image as
//! a base64 attachment inside the request body, so there is nothing to gain
//! from staging bytes on disk. Both sources therefore converge on the same
//! in-memory path: read bytes, determine the media type, encode once.

use crate::error::Img2JsonError;
use crate::pipeline::encode::EncodedImage;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// How long of an HTTP error body to carry into the error message.
const MAX_ERROR_BODY: usize = 2048;

/// Where the current image came from. Only the most recent source is
/// "current"; supplying a new one replaces the previous image entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// A local file.
    File(PathBuf),
    /// A remote HTTP/HTTPS URL.
    Url(String),
}

impl ImageSource {
    /// Classify an input string as a URL or a local path.
    pub fn parse(input: &str) -> Self {
        if is_url(input) {
            ImageSource::Url(input.to_string())
        } else {
            ImageSource::File(PathBuf::from(input))
        }
    }
}

impl std::fmt::Display for ImageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageSource::File(p) => write!(f, "{}", p.display()),
            ImageSource::Url(u) => write!(f, "{u}"),
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Acquire an image from a path-or-URL string.
///
/// `timeout_secs` applies only to URL downloads; local reads are not
/// time-bounded.
pub async fn acquire(input: &str, timeout_secs: u64) -> Result<EncodedImage, Img2JsonError> {
    match ImageSource::parse(input) {
        ImageSource::Url(url) => fetch_url(&url, timeout_secs).await,
        ImageSource::File(path) => read_file(&path).await,
    }
}

/// Read a local image file and encode it.
///
/// The media type is sniffed from the magic bytes; no other validation is
/// performed — any file the read accepts and the sniffer recognises passes
/// through.
pub async fn read_file(path: &Path) -> Result<EncodedImage, Img2JsonError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Img2JsonError::FileNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => Img2JsonError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => Img2JsonError::FileReadFailed {
            path: path.to_path_buf(),
            source: e,
        },
    })?;

    debug!("Read local image: {} ({} bytes)", path.display(), bytes.len());
    EncodedImage::from_bytes(&bytes)
}

/// Fetch a remote image and encode it.
///
/// The response's `Content-Type` wins when it declares an `image/*` type;
/// otherwise the media type is sniffed from the body bytes, since many object
/// stores serve images as `application/octet-stream`.
pub async fn fetch_url(url: &str, timeout_secs: u64) -> Result<EncodedImage, Img2JsonError> {
    info!("Fetching image from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Img2JsonError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Img2JsonError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Img2JsonError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            body.truncate(MAX_ERROR_BODY);
            body.push('…');
        }
        return Err(Img2JsonError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
            body,
        });
    }

    let declared_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
        .filter(|v| v.starts_with("image/"));

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Img2JsonError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    debug!("Fetched {} bytes from {}", bytes.len(), url);

    match declared_type {
        Some(media_type) => Ok(EncodedImage::from_bytes_with_media_type(&bytes, media_type)),
        None => EncodedImage::from_bytes(&bytes),
    }
}
