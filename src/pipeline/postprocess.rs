//! Post-processing: deterministic cleanup of model-generated JSON text.
//!
//! ## Why is post-processing necessary?
//!
//! Even well-prompted models occasionally introduce artefacts that are
//! *semantically correct* from the model's perspective but unusable
//! downstream — for example:
//!
//! - Wrapping the object in ` ```json ... ``` ` fences despite the prompt
//!   saying "do not wrap in fences"
//! - Using Windows-style `\r\n` line endings
//! - Emitting invisible Unicode (zero-width spaces, BOM) that breaks parsers
//!
//! These are cheap, deterministic string rules. Keeping them here rather
//! than in the prompt means the prompt stays focused on *what to produce*,
//! not on formatting edge-cases. Each rule is independently testable.
//!
//! Nothing here validates the JSON: correctness against the schema is
//! entirely the formatting capability's job, and output that fails to parse
//! still reaches the caller verbatim (minus the artefacts above).

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to raw model output, in order:
///
/// 1. Strip outer code fences (models sometimes disobey the prompt)
/// 2. Normalise line endings (CRLF → LF)
/// 3. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 4. Trim surrounding whitespace
pub fn clean_json(input: &str) -> String {
    let s = strip_code_fences(input);
    let s = normalise_line_endings(&s);
    let s = remove_invisible_chars(&s);
    s.trim().to_string()
}

/// Re-serialise `input` with pretty indentation when it parses as JSON.
///
/// Returns `None` when it does not parse — the caller keeps the cleaned
/// text untouched rather than masking a malformed payload.
pub fn pretty_print(input: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(input).ok()?;
    serde_json::to_string_pretty(&value).ok()
}

// ── Rule 1: Strip outer code fences ──────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json)?\s*\n?(.*?)\n?```\s*$").unwrap());

fn strip_code_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Strip invisible Unicode ──────────────────────────────────────────

const INVISIBLE_CHARS: [char; 6] = [
    '\u{200B}', // zero-width space
    '\u{200C}', // zero-width non-joiner
    '\u{200D}', // zero-width joiner
    '\u{2060}', // word joiner
    '\u{FEFF}', // BOM
    '\u{00AD}', // soft hyphen
];

fn remove_invisible_chars(input: &str) -> String {
    input
        .chars()
        .filter(|c| !INVISIBLE_CHARS.contains(c))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_fences() {
        let input = "```json\n{\"name\":\"Alice\"}\n```";
        assert_eq!(clean_json(input), "{\"name\":\"Alice\"}");
    }

    #[test]
    fn strips_bare_fences() {
        let input = "```\n{\"a\":1}\n```";
        assert_eq!(clean_json(input), "{\"a\":1}");
    }

    #[test]
    fn leaves_unfenced_output_alone() {
        assert_eq!(clean_json("{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn does_not_eat_inner_fences() {
        // A fenced string *value* inside the object must survive.
        let input = "{\"snippet\":\"```rust\\nfn main() {}\\n```\"}";
        assert_eq!(clean_json(input), input);
    }

    #[test]
    fn normalises_crlf() {
        assert_eq!(clean_json("{\r\n\"a\": 1\r\n}"), "{\n\"a\": 1\n}");
    }

    #[test]
    fn strips_invisible_chars() {
        let input = "\u{FEFF}{\"a\":\u{200B}1}";
        assert_eq!(clean_json(input), "{\"a\":1}");
    }

    #[test]
    fn trims_surrounding_whitespace() {
        assert_eq!(clean_json("  {\"a\":1}\n\n"), "{\"a\":1}");
    }

    #[test]
    fn pretty_print_valid_json() {
        let pretty = pretty_print("{\"name\":\"Alice\"}").unwrap();
        assert!(pretty.contains("\"name\": \"Alice\""));
    }

    #[test]
    fn pretty_print_rejects_non_json() {
        assert!(pretty_print("not json at all").is_none());
    }
}
