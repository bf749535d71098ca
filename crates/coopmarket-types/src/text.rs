//! Free-text normalization shared by substance matching and supplier
//! approval checks.
//!
//! Both sides of every comparison go through [`normalize`], so
//! `"Ácido  Ascórbico"` and `"acido ascorbico"` compare equal.

use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

/// Case-fold, strip diacritics, collapse runs of whitespace, trim.
#[must_use]
pub fn normalize(input: &str) -> String {
    let folded: String = input
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whitespace-delimited tokens of already-normalized text, with leading
/// and trailing punctuation trimmed. Empty tokens are dropped.
pub fn tokens(normalized: &str) -> impl Iterator<Item = &str> {
    normalized
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|t| !t.is_empty())
}

/// Collapse consecutive repeated characters: `"colaageno"` → `"colageno"`.
#[must_use]
pub fn collapse_repeats(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last = None;
    for c in input.chars() {
        if last != Some(c) {
            out.push(c);
        }
        last = Some(c);
    }
    out
}
