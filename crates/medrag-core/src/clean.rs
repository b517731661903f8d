//! Normalization of raw extracted document text.

use regex::Regex;
use std::sync::OnceLock;

fn whitespace_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("static regex"))
}

fn disallowed_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // ASCII word characters, whitespace, and `- . , ; : ! ? ( )`.
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9_\s\-.,;:!?()]").expect("static regex"))
}

/// Clean raw extracted text.
///
/// Collapses every whitespace run to a single space, drops characters
/// outside the allow-list, and trims both ends. The output is pure ASCII.
pub fn clean_text(raw: &str) -> String {
    let collapsed = whitespace_runs().replace_all(raw, " ");
    let filtered = disallowed_chars().replace_all(&collapsed, "");
    filtered.trim().to_string()
}
