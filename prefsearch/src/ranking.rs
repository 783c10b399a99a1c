//! Weighted rule scoring for settings entries.
//!
//! Each field is checked against a ladder of rules, most specific first, and
//! only the first rung that matches contributes (the per-word fallbacks are the
//! exception: every matching word adds its share). Scores from title, key,
//! summary and category add up, then two multipliers reward short titles and
//! top-level entries.
//!
//! | Rule                         | Contribution              |
//! |------------------------------|---------------------------|
//! | title == query               | TitleExact                |
//! | title starts with query      | TitleStart                |
//! | title contains query         | TitleContains             |
//! | plural/typo variant          | TitleContains × 0.95      |
//! | per close title word         | TitleContains × 0.85      |
//! | key == query / contains      | KeyExact / KeyContains    |
//! | key plural/typo variant      | KeyContains × 0.95        |
//! | summary (same ladder)        | Summary* (words × 0.80)   |
//! | category title contains      | CategoryMatch             |
//! | nothing else, best word sim  | Fuzzy × similarity        |

use crate::candidate::IndexCandidate;
use crate::config::SearchConfig;
use crate::interface::{MatchField, SearchMatch};
use crate::similarity::{check_plural_match, is_close_match, long_words, similarity, split_words, QUERY_DELIMITERS, TEXT_DELIMITERS};
use std::collections::BTreeSet;

/// Confidence factor for plural and typo variants of a substring rule.
const PLURAL_FACTOR: f32 = 0.95;
/// Confidence factor per title word that is a close match.
const TITLE_WORD_FACTOR: f32 = 0.85;
/// Confidence factor per summary word that is a close match.
const SUMMARY_WORD_FACTOR: f32 = 0.80;

/// Titles shorter than this get a proportional boost.
const SHORT_TITLE_LEN: usize = 50;
/// Multiplier for entries at depth 0.
const TOP_LEVEL_BONUS: f32 = 1.2;

/// Running score and matched rule set for one entry
#[derive(Debug, Default)]
struct Tally {
    score: f32,
    fields: BTreeSet<MatchField>,
}

impl Tally {
    fn add(&mut self, field: MatchField, factor: f32) {
        self.fields.insert(field);
        self.score += field.weight() * factor;
    }

    fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Score one candidate. `query` must already be trimmed and lowercased.
/// Returns `None` when no rule matched.
pub(crate) fn score_candidate(candidate: &IndexCandidate, query: &str, config: &SearchConfig) -> Option<SearchMatch> {
    let entry = candidate.entry();
    if query.is_empty() || (entry.key.is_empty() && entry.title.is_empty()) {
        return None;
    }

    let mut tally = Tally::default();
    score_title(candidate.title_lower(), query, &mut tally);
    score_key(candidate.key_lower(), query, &mut tally);
    score_summary(candidate.summary_lower(), query, &mut tally);

    if candidate.category_lower().contains(query) {
        tally.add(MatchField::CategoryMatch, 1.0);
    }

    if tally.is_empty() && query.chars().count() >= config.min_fuzzy_query_len {
        let best = best_word_similarity(candidate.title_lower(), query);
        if best > config.fuzzy_threshold {
            tally.add(MatchField::Fuzzy, best);
        }
    }

    if tally.is_empty() {
        return None;
    }

    let score = tally.score * title_bonus(candidate.title_len()) * depth_bonus(entry.depth);
    Some(SearchMatch {
        entry: entry.clone(),
        score,
        matched_fields: tally.fields,
    })
}

fn score_title(title: &str, query: &str, tally: &mut Tally) {
    if title == query {
        tally.add(MatchField::TitleExact, 1.0);
    } else if title.starts_with(query) {
        tally.add(MatchField::TitleStart, 1.0);
    } else if title.contains(query) {
        tally.add(MatchField::TitleContains, 1.0);
    } else if check_plural_match(title, query) {
        tally.add(MatchField::TitleContains, PLURAL_FACTOR);
    } else {
        for _ in long_words(title, TEXT_DELIMITERS).filter(|word| is_close_match(word, query)) {
            tally.add(MatchField::TitleContains, TITLE_WORD_FACTOR);
        }
    }
}

fn score_key(key: &str, query: &str, tally: &mut Tally) {
    if key == query {
        tally.add(MatchField::KeyExact, 1.0);
    } else if key.contains(query) {
        tally.add(MatchField::KeyContains, 1.0);
    } else if check_plural_match(key, query) {
        tally.add(MatchField::KeyContains, PLURAL_FACTOR);
    }
}

fn score_summary(summary: &str, query: &str, tally: &mut Tally) {
    if summary == query {
        tally.add(MatchField::SummaryExact, 1.0);
    } else if summary.contains(query) {
        tally.add(MatchField::SummaryContains, 1.0);
    } else if check_plural_match(summary, query) {
        tally.add(MatchField::SummaryContains, PLURAL_FACTOR);
    } else {
        for _ in long_words(summary, TEXT_DELIMITERS).filter(|word| is_close_match(word, query)) {
            tally.add(MatchField::SummaryContains, SUMMARY_WORD_FACTOR);
        }
    }
}

/// Best similarity between the query and any title word
fn best_word_similarity(title: &str, query: &str) -> f32 {
    split_words(title, QUERY_DELIMITERS)
        .map(|word| similarity(word, query))
        .fold(0.0, f32::max)
}

/// `1 + (50 - len) / 100` for titles under 50 chars, otherwise 1
fn title_bonus(title_len: usize) -> f32 {
    if title_len < SHORT_TITLE_LEN {
        1.0 + (SHORT_TITLE_LEN - title_len) as f32 / 100.0
    } else {
        1.0
    }
}

fn depth_bonus(depth: usize) -> f32 {
    if depth == 0 {
        TOP_LEVEL_BONUS
    } else {
        1.0
    }
}
