//! Pulls JSON objects out of free-form model replies.
//!
//! Models wrap JSON in prose or markdown fences often enough that the agents
//! never hand a reply straight to `serde_json`.

use std::sync::OnceLock;

use regex::Regex;

fn outermost_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("static regex"))
}

/// Greedy span from the first `{` to the last `}`.
pub fn outermost_object(text: &str) -> Option<&str> {
    outermost_re().find(text).map(|m| m.as_str())
}

/// First balanced `{...}` span. Braces inside JSON strings are ignored.
pub fn first_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse a JSON span, retrying once with single quotes swapped for double quotes.
pub fn parse_lenient(span: &str) -> Result<serde_json::Value, serde_json::Error> {
    match serde_json::from_str(span) {
        Ok(v) => Ok(v),
        Err(first) => {
            tracing::debug!(error = %first, "strict JSON parse failed, retrying with quote fix");
            serde_json::from_str(&span.replace('\'', "\""))
        }
    }
}
