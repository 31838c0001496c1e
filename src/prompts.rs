//! System prompts for the two VLM-backed pipeline stages.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — changing stage behaviour (e.g. how the
//!    formatter should treat fields the text does not cover) requires editing
//!    exactly one place.
//!
//! 2. **Testability** — unit tests can import and inspect prompts directly
//!    without spinning up a real model, making prompt regressions easy to
//!    catch.
//!
//! Callers can override either prompt via
//! [`crate::config::ExtractionConfig::extraction_prompt`] and
//! [`crate::config::ExtractionConfig::formatting_prompt`]; the constants here
//! are used only when no override is provided.

/// Default system prompt for the text-extraction stage.
///
/// Used when `ExtractionConfig::extraction_prompt` is `None`.
pub const DEFAULT_EXTRACTION_PROMPT: &str = r#"You are an expert OCR engine. Your task is to extract the text content of an image completely and accurately.

Follow these rules precisely:

1. TEXT PRESERVATION
   - Extract ALL visible text, including labels, captions, and small print
   - Maintain the reading order as a human would read the image
   - Preserve line breaks where they separate distinct pieces of information

2. WHAT TO IGNORE
   - Decorative elements, borders, and watermarks that carry no content
   - Do not describe the image or its layout

3. OUTPUT FORMAT
   - Output ONLY the extracted text
   - Do NOT add commentary or explanations
   - If the image contains no legible text, output nothing at all"#;

/// Default system prompt for the validation/formatting stage.
///
/// Used when `ExtractionConfig::formatting_prompt` is `None`.
pub const DEFAULT_FORMATTING_PROMPT: &str = r#"You are a data transformation expert. You will receive text extracted from an image and a JSON schema.
Your task is to validate the extracted text against the provided JSON schema, and format the extracted text into a JSON object that conforms to the schema.

Follow these rules precisely:

1. SCHEMA CONFORMANCE
   - Every property you emit must be declared in the schema
   - Match the declared types: quote strings, leave numbers and booleans bare
   - Omit properties the extracted text gives you no value for

2. FAITHFULNESS
   - Use only information present in the extracted text
   - Do NOT invent values to satisfy the schema

3. OUTPUT FORMAT
   - Output ONLY the formatted JSON object
   - Do NOT wrap it in ```json fences
   - Do NOT add commentary or explanations"#;

/// Build the user message for the formatting stage.
///
/// The schema string is interpolated verbatim; interpreting it is entirely
/// the model's job.
pub fn formatting_user_message(extracted_text: &str, json_schema: &str) -> String {
    format!(
        "Extracted Text: {extracted_text}\n\nJSON Schema: {json_schema}\n\nOutput the formatted JSON object."
    )
}
