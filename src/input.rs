use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::expression::compact_whitespace;

// Quotes would terminate the quoted term in the query grammar.
const QUOTE_CHARS: &[char] = &['"', '\u{201c}', '\u{201d}'];
// List separators and bullets, only stripped at the ends of a term.
const EDGE_CHARS: &[char] = &[',', ';', '•'];

/// Normalizes one user-entered term, or `None` when nothing is left. Inner
/// punctuation such as the comma in a MeSH heading or the `*` truncation
/// wildcard is kept.
pub fn normalize_term(term: &str) -> Option<String> {
    let unquoted = term.replace(QUOTE_CHARS, " ");
    let cleaned =
        compact_whitespace(unquoted.trim_matches(|c: char| c.is_whitespace() || EDGE_CHARS.contains(&c)));
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// One term per line, normalized, deduplicated case-insensitively (first
/// spelling wins) and sorted.
pub fn unique_lines(text: &str) -> Vec<String> {
    let mut seen: BTreeMap<String, String> = BTreeMap::new();
    for term in text.lines().filter_map(normalize_term) {
        seen.entry(term.to_lowercase()).or_insert(term);
    }
    seen.into_values().collect()
}

pub fn load_unique_lines(path: &Path) -> Result<Vec<String>> {
    Ok(unique_lines(&fs::read_to_string(path)?))
}
