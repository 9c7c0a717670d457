//! Extraction of an embedded JSON payload from free-text commands.
//!
//! Two shapes are accepted, checked in this order:
//!
//! 1. A fenced block. The first fenced region wins; an optional `json` tag on the
//!    opening line is dropped.
//! 2. An inline span from the first `{` to the last `}`. The span is greedy, so
//!    braces in surrounding prose end up inside the candidate and fail to parse.

use serde_json::Value;
use thiserror::Error;

const FENCE: &str = "```";
const SNIPPET_CHARS: usize = 80;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(
        "no JSON found: append a JSON object after the command, e.g. `/update live {{\"status\": \"on\"}}`, or wrap it in a ```json fenced block"
    )]
    NotFound,

    #[error("invalid JSON in fenced block near `{snippet}`: {source}")]
    FencedBlock {
        snippet: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid JSON in inline braces near `{snippet}`: {source}")]
    InlineBraces {
        snippet: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Extract the embedded payload from `raw`.
pub fn extract(raw: &str) -> Result<Value, ExtractError> {
    if let Some(block) = first_fenced_block(raw) {
        return serde_json::from_str(block).map_err(|source| ExtractError::FencedBlock {
            snippet: snippet(block),
            source,
        });
    }

    if let Some(span) = brace_span(raw) {
        return serde_json::from_str(span).map_err(|source| ExtractError::InlineBraces {
            snippet: snippet(span),
            source,
        });
    }

    Err(ExtractError::NotFound)
}

/// Contents of the first fenced region, without a leading `json` tag line.
///
/// An unclosed fence runs to the end of the text.
fn first_fenced_block(raw: &str) -> Option<&str> {
    let start = raw.find(FENCE)? + FENCE.len();
    let rest = &raw[start..];
    let inner = match rest.find(FENCE) {
        Some(end) => &rest[..end],
        None => rest,
    };
    match inner.split_once('\n') {
        Some((tag, body)) if tag.trim() == "json" => Some(body),
        _ => Some(inner),
    }
}

/// Greedy span from the first `{` to the last `}` after it.
fn brace_span(raw: &str) -> Option<&str> {
    let open = raw.find('{')?;
    let close = raw.rfind('}')?;
    if close < open {
        return None;
    }
    Some(&raw[open..=close])
}

fn snippet(fragment: &str) -> String {
    let trimmed = fragment.trim();
    let mut out: String = trimmed.chars().take(SNIPPET_CHARS).collect();
    if trimmed.chars().count() > SNIPPET_CHARS {
        out.push_str("...");
    }
    out.replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_json_tagged_fence() {
        let text = "/update live\n```json\n{\"status\": \"on\", \"score\": [1, 2]}\n```\nthanks";
        let value = extract(text).expect("extract");
        assert_eq!(value, json!({"status": "on", "score": [1, 2]}));
    }

    #[test]
    fn extracts_untagged_fence() {
        let text = "/update table ```\n[1, 2, 3]\n```";
        assert_eq!(extract(text).expect("extract"), json!([1, 2, 3]));
    }

    #[test]
    fn only_first_fence_is_used() {
        let text = "```json\n{\"a\": 1}\n```\n```json\n{\"b\": 2}\n```";
        assert_eq!(extract(text).expect("extract"), json!({"a": 1}));
    }

    #[test]
    fn unclosed_fence_runs_to_end() {
        let text = "/update live ```json\n{\"a\": true}";
        assert_eq!(extract(text).expect("extract"), json!({"a": true}));
    }

    #[test]
    fn other_language_tag_is_kept_and_fails() {
        let text = "```yaml\n{\"a\": 1}\n```";
        let err = extract(text).unwrap_err();
        assert!(matches!(err, ExtractError::FencedBlock { .. }));
        assert!(err.to_string().contains("fenced block"));
    }

    #[test]
    fn extracts_inline_braces() {
        let text = "/update table {\"rows\": [{\"team\": \"A\", \"pts\": 3}]}";
        assert_eq!(
            extract(text).expect("extract"),
            json!({"rows": [{"team": "A", "pts": 3}]})
        );
    }

    #[test]
    fn inline_span_is_greedy() {
        // Prose braces after the payload are swallowed by the span.
        let text = "/update live {\"a\": 1} and {oops}";
        let err = extract(text).unwrap_err();
        assert!(matches!(err, ExtractError::InlineBraces { .. }));
    }

    #[test]
    fn closing_before_opening_is_not_a_span() {
        let err = extract("/update live } nothing {").unwrap_err();
        assert!(matches!(err, ExtractError::NotFound));
    }

    #[test]
    fn missing_payload_reports_guidance() {
        let err = extract("/update live no json here").unwrap_err();
        assert!(matches!(err, ExtractError::NotFound));
        assert!(err.to_string().contains("no JSON found"));
    }

    #[test]
    fn fenced_and_inline_wrappings_agree() {
        let value = json!({
            "title": "Derby",
            "nested": {"list": [null, false, 1.5, "x"]},
            "empty": {}
        });
        let serialized = serde_json::to_string_pretty(&value).expect("serialize");
        let fenced = format!("/update live\n```json\n{serialized}\n```");
        let inline = format!("/update live {}", serde_json::to_string(&value).expect("ser"));
        assert_eq!(extract(&fenced).expect("fenced"), value);
        assert_eq!(extract(&inline).expect("inline"), value);
    }

    #[test]
    fn snippet_truncates_long_fragments() {
        let long = format!("{{{}", "x".repeat(200));
        let s = snippet(&long);
        assert!(s.ends_with("..."));
        assert_eq!(s.chars().count(), SNIPPET_CHARS + 3);
    }
}
