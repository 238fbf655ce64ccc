use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;

static ESCAPE_REGEX: Lazy<Regex> = Lazy::new(|| {
    const REGEX_TEXT: &str = r#"[&<>"'']"#;

    Regex::new(REGEX_TEXT).unwrap()
});

// escape adapted from KaTeX which adapted it from Facebook's React under Apache 2 license

/// Escapes text to prevent scripting attacks
pub(crate) fn escape(text: &str) -> Cow<'_, str> {
    ESCAPE_REGEX.replace_all(text, |caps: &regex::Captures| -> &'static str {
        if let Some(first) = caps.iter().next().flatten() {
            match first.as_str() {
                "&" => "&amp;",
                ">" => "&gt;",
                "<" => "&lt;",
                "\"" => "&quot;",
                "'" => "&#x27;",
                _ => "",
            }
        } else {
            ""
        }
    })
}

static WHITESPACE_RUN_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Collapses every whitespace run to a single space and trims the ends.
/// Rendered markup is compared in this form so that serialization differences
/// between a registry item's root and the live container don't break matching.
pub(crate) fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RUN_REGEX.replace_all(text, " ").trim().to_string()
}

/// The "is there actually a source string here" filter every probe applies:
/// `None`, empty, and whitespace-only all mean not found.
pub(crate) fn non_empty_trimmed(text: Option<&str>) -> Option<String> {
    let text = text?.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
