//! Pure fuzzy-matching primitives.
//!
//! All inputs are expected to be normalized with
//! [`coopmarket_types::text::normalize`] already.

use coopmarket_types::text;

/// Tunables for [`matches`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuzzyParams {
    pub min_token_len: usize,
    pub fuzzy_token_len: usize,
    pub similarity_threshold: f64,
}

/// Which pass accepted a candidate. Used for logging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPass {
    Substring,
    Tokens,
    EditDistance,
    RepeatCollapse,
}

/// Levenshtein edit distance over Unicode scalar values.
#[must_use]
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// `1 - distance / max(len)`, in `[0, 1]`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}

/// One token is a prefix of the other, using the first
/// `max(3, len - 1)` characters of the shorter side being tested.
#[must_use]
pub fn prefix_match(a: &str, b: &str) -> bool {
    fn head_is_prefix_of(x: &str, y: &str) -> bool {
        let len = x.chars().count();
        let take = 3.max(len.saturating_sub(1));
        if len < take {
            return false;
        }
        let head: String = x.chars().take(take).collect();
        y.starts_with(&head)
    }
    head_is_prefix_of(a, b) || head_is_prefix_of(b, a)
}

fn long_tokens(s: &str, min_len: usize) -> Vec<&str> {
    text::tokens(s)
        .filter(|t| t.chars().count() >= min_len)
        .collect()
}

/// Run the matching passes in order, returning the first that accepts.
///
/// 1. Substring containment of the whole query
/// 2. Every query token (len ≥ `min_token_len`) contained in the candidate
/// 3. Some query token (len ≥ `fuzzy_token_len`) is similar to, or a prefix
///    of, some candidate token of the same minimum length
/// 4. Substring containment after collapsing repeated characters
#[must_use]
pub fn matches(query: &str, candidate: &str, params: &FuzzyParams) -> Option<MatchPass> {
    if query.is_empty() || candidate.is_empty() {
        return None;
    }

    if candidate.contains(query) {
        return Some(MatchPass::Substring);
    }

    let query_tokens = long_tokens(query, params.min_token_len);
    if !query_tokens.is_empty() && query_tokens.iter().all(|t| candidate.contains(t)) {
        return Some(MatchPass::Tokens);
    }

    let fuzzy_query = long_tokens(query, params.fuzzy_token_len);
    let fuzzy_candidate = long_tokens(candidate, params.fuzzy_token_len);
    let close = fuzzy_query.iter().any(|q| {
        fuzzy_candidate
            .iter()
            .any(|c| similarity(q, c) > params.similarity_threshold || prefix_match(q, c))
    });
    if close {
        return Some(MatchPass::EditDistance);
    }

    let collapsed_query = text::collapse_repeats(query);
    if text::collapse_repeats(candidate).contains(&collapsed_query) {
        return Some(MatchPass::RepeatCollapse);
    }

    None
}
