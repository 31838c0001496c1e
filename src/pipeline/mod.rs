//! Pipeline stages for image-to-JSON extraction.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. a different acquisition backend) without
//! touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! acquire ──▶ encode ──▶ extract ──▶ format ──▶ postprocess
//! (path/URL)  (base64)   (VLM OCR)   (VLM+schema) (cleanup)
//! ```
//!
//! 1. [`acquire`] — read a local file or fetch a URL into raw bytes
//! 2. [`encode`]  — base64-wrap the bytes with a sniffed or declared media
//!    type; the result doubles as the preview representation
//! 3. the two model stages live behind the [`crate::capability`] trait seams
//! 4. [`postprocess`] — deterministic text-cleanup rules for model quirks
//!    (code fences, CRLF, invisible Unicode)

pub mod acquire;
pub mod encode;
pub mod postprocess;
