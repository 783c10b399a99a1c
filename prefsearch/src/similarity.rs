//! String similarity primitives behind the typo and plural tolerance rules.
//!
//! Every function here is pure and expects its inputs already lowercased.
//! Lengths are measured in chars, not bytes.

/// Minimum similarity for two long words to count as a close match.
pub const CLOSE_MATCH_SIMILARITY: f32 = 0.70;

/// Words shorter than this are ignored by the word-level heuristics.
pub const MIN_WORD_LEN: usize = 3;

/// Separators used when splitting entry text into words.
pub const TEXT_DELIMITERS: &[char] = &[' ', '-', '_', '(', ')', '[', ']'];

/// Separators used when splitting a query (and titles for the fuzzy fallback).
pub const QUERY_DELIMITERS: &[char] = &[' ', '-', '_'];

/// Levenshtein distance: insertions, deletions and substitutions each cost 1.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let m = a_chars.len();
    let n = b_chars.len();

    if m == 0 {
        return n;
    }
    if n == 0 {
        return m;
    }

    let mut prev: Vec<usize> = (0..=n).collect();
    let mut curr = vec![0usize; n + 1];

    for i in 1..=m {
        curr[0] = i;
        for j in 1..=n {
            let cost = if a_chars[i - 1] == b_chars[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1)
                .min(curr[j - 1] + 1)
                .min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}

/// Normalized similarity in `[0, 1]`; 0 when either side is empty.
pub fn similarity(a: &str, b: &str) -> f32 {
    let a_len = a.chars().count();
    let b_len = b.chars().count();
    if a_len == 0 || b_len == 0 {
        return 0.0;
    }

    let max_len = a_len.max(b_len);
    1.0 - edit_distance(a, b) as f32 / max_len as f32
}

/// Check if two words differ by a small typo or affix.
///
/// Tiers run cheapest first and the first applicable tier decides:
/// containment with at most 2 extra chars, then a single substitution between
/// equal-length words, then edit-distance similarity for words of 4+ chars.
pub fn is_close_match(text: &str, query: &str) -> bool {
    let text_len = text.chars().count();
    let query_len = query.chars().count();

    if text.contains(query) || query.contains(text) {
        return text_len.abs_diff(query_len) <= 2;
    }

    if text_len == query_len && text_len >= 3 {
        let differences = text
            .chars()
            .zip(query.chars())
            .filter(|(t, q)| t != q)
            .count();
        return differences == 1;
    }

    if text_len >= 4 && query_len >= 4 {
        return similarity(text, query) >= CLOSE_MATCH_SIMILARITY;
    }

    false
}

/// Check if `query` matches `text` up to a plural suffix or a per-word typo.
///
/// "subtitle" matches "subtitles", "videos" matches "video",
/// "downlod" matches "download".
pub fn check_plural_match(text: &str, query: &str) -> bool {
    if query.is_empty() {
        return false;
    }

    if text.contains(&format!("{query}s")) || text.contains(&format!("{query}es")) {
        return true;
    }
    // An empty stem would match any text.
    for suffix in ["s", "es"] {
        if let Some(stem) = query.strip_suffix(suffix) {
            if !stem.is_empty() && text.contains(stem) {
                return true;
            }
        }
    }

    let text_words: Vec<&str> = long_words(text, TEXT_DELIMITERS).collect();
    long_words(query, QUERY_DELIMITERS)
        .any(|query_word| text_words.iter().any(|text_word| is_close_match(text_word, query_word)))
}

/// Split `text` on `delimiters`, keeping empty pieces.
pub fn split_words<'a>(text: &'a str, delimiters: &'a [char]) -> impl Iterator<Item = &'a str> + 'a {
    text.split(delimiters)
}

/// Words of at least [`MIN_WORD_LEN`] chars.
pub(crate) fn long_words<'a>(text: &'a str, delimiters: &'a [char]) -> impl Iterator<Item = &'a str> + 'a {
    split_words(text, delimiters).filter(|word| word.chars().count() >= MIN_WORD_LEN)
}
