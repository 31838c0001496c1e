//! Image encoding: raw bytes → base64 [`EncodedImage`].
//!
//! VLM APIs (OpenAI, Anthropic, Gemini) accept images as base64 data-URIs
//! embedded in the JSON request body, which makes the encoded form
//! self-contained: no separate upload channel, and the same string doubles
//! as a directly displayable preview. The media type is sniffed from the
//! magic bytes via the `image` crate unless the caller already knows it
//! (e.g. from an HTTP `Content-Type` header).

use crate::error::Img2JsonError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use std::fmt;
use tracing::debug;

/// A self-contained encoded image: base64 payload plus declared media type.
///
/// Created once by the acquisition step and never mutated; consumed by the
/// extraction capability. Equality compares payload and media type, which is
/// what the source-switching semantics care about.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedImage {
    data: String,
    media_type: String,
}

impl EncodedImage {
    /// Encode raw image bytes, sniffing the media type from magic bytes.
    ///
    /// Fails with [`Img2JsonError::UnsupportedImage`] when the bytes match no
    /// known image format — the downstream capability needs a media type to
    /// accept the payload at all.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Img2JsonError> {
        let format =
            image::guess_format(bytes).map_err(|e| Img2JsonError::UnsupportedImage {
                detail: e.to_string(),
            })?;
        Ok(Self::from_bytes_with_media_type(bytes, format.to_mime_type()))
    }

    /// Encode raw bytes under a caller-declared media type.
    ///
    /// No validation is performed against the actual content; the declared
    /// type is passed through to the capability as-is.
    pub fn from_bytes_with_media_type(bytes: &[u8], media_type: impl Into<String>) -> Self {
        let data = STANDARD.encode(bytes);
        debug!("Encoded image → {} bytes base64", data.len());
        Self {
            data,
            media_type: media_type.into(),
        }
    }

    /// Parse a `data:<media type>;base64,<payload>` URI.
    pub fn from_data_uri(uri: &str) -> Result<Self, Img2JsonError> {
        let rest = uri
            .strip_prefix("data:")
            .ok_or_else(|| Img2JsonError::InvalidDataUri {
                detail: "missing 'data:' prefix".into(),
            })?;
        let (media_type, payload) =
            rest.split_once(";base64,")
                .ok_or_else(|| Img2JsonError::InvalidDataUri {
                    detail: "missing ';base64,' separator".into(),
                })?;
        if media_type.is_empty() {
            return Err(Img2JsonError::InvalidDataUri {
                detail: "empty media type".into(),
            });
        }
        // Decode to reject syntactically invalid payloads early.
        STANDARD
            .decode(payload)
            .map_err(|e| Img2JsonError::InvalidDataUri {
                detail: format!("invalid base64 payload: {e}"),
            })?;
        Ok(Self {
            data: payload.to_string(),
            media_type: media_type.to_string(),
        })
    }

    /// Render as a data URI — the transmission form and, equally, the
    /// preview representation.
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.data)
    }

    /// The base64 payload.
    pub fn base64_data(&self) -> &str {
        &self.data
    }

    /// The declared media type, e.g. `image/png`.
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// Convert to the provider-facing attachment type.
    ///
    /// `detail: "high"` instructs GPT-4-class models to use the full image
    /// tile budget; without it fine print is lost, and fine print is exactly
    /// what form-style images are made of.
    pub fn to_image_data(&self) -> ImageData {
        ImageData::new(self.data.clone(), self.media_type.clone()).with_detail("high")
    }
}

impl fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedImage")
            .field("media_type", &self.media_type)
            .field("base64_len", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Magic bytes are all guess_format needs; the payload past the signature
    // is irrelevant for sniffing.
    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\nxxxx";
    const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46];

    #[test]
    fn sniffs_png() {
        let img = EncodedImage::from_bytes(PNG_MAGIC).expect("png magic should sniff");
        assert_eq!(img.media_type(), "image/png");
        assert!(!img.base64_data().is_empty());
    }

    #[test]
    fn sniffs_jpeg() {
        let img = EncodedImage::from_bytes(JPEG_MAGIC).expect("jpeg magic should sniff");
        assert_eq!(img.media_type(), "image/jpeg");
    }

    #[test]
    fn rejects_unknown_bytes() {
        let err = EncodedImage::from_bytes(b"definitely not an image").unwrap_err();
        assert!(matches!(err, Img2JsonError::UnsupportedImage { .. }));
    }

    #[test]
    fn data_uri_round_trip() {
        let img = EncodedImage::from_bytes_with_media_type(b"hello", "image/png");
        let uri = img.data_uri();
        assert!(uri.starts_with("data:image/png;base64,"));
        let parsed = EncodedImage::from_data_uri(&uri).expect("own data uri should parse");
        assert_eq!(parsed, img);
    }

    #[test]
    fn rejects_malformed_data_uris() {
        assert!(EncodedImage::from_data_uri("http://example.com/a.png").is_err());
        assert!(EncodedImage::from_data_uri("data:image/png,rawpayload").is_err());
        assert!(EncodedImage::from_data_uri("data:image/png;base64,!!!not-base64!!!").is_err());
    }

    #[test]
    fn image_data_carries_media_type() {
        let img = EncodedImage::from_bytes_with_media_type(b"hello", "image/jpeg");
        let data = img.to_image_data();
        assert_eq!(data.mime_type, "image/jpeg");
        assert_eq!(data.data, img.base64_data());
    }

    #[test]
    fn debug_does_not_dump_payload() {
        let img = EncodedImage::from_bytes_with_media_type(&[0u8; 4096], "image/png");
        let dbg = format!("{img:?}");
        assert!(dbg.contains("base64_len"));
        assert!(dbg.len() < 200, "debug output should stay short: {dbg}");
    }
}
