//! Deterministic fuzzy keyword search.
//!
//! Dependency-free scorer over worker fields. Fast-path exact/substring
//! checks short-circuit before the word-level fuzzy scorer runs; the fuzzy
//! scorer only reaches for edit distance when cheaper lexical checks have
//! not produced a confident match, which bounds worst-case cost on large
//! queries.

use hive_core::types::{MatchType, SearchResult, WorkerEntry};

/// Results below this score are noise and are dropped.
const MIN_SCORE: u8 = 20;

/// Standard edit distance: unit-cost insert/delete/substitute over a
/// `(|b|+1) x (|a|+1)` table.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut matrix = vec![vec![0usize; a.len() + 1]; b.len() + 1];
    for (i, row) in matrix.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=a.len() {
        matrix[0][j] = j;
    }

    for i in 1..=b.len() {
        for j in 1..=a.len() {
            let cost = usize::from(b[i - 1] != a[j - 1]);
            matrix[i][j] = (matrix[i - 1][j] + 1)
                .min(matrix[i][j - 1] + 1)
                .min(matrix[i - 1][j - 1] + cost);
        }
    }
    matrix[b.len()][a.len()]
}

/// Normalized similarity in `0.0..=1.0`: `1 - distance / max(len)`.
fn similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / max_len as f64
}

fn words(text: &str) -> Vec<&str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect()
}

/// True when the substring match at `pos` starts on a word boundary.
fn at_word_boundary(text: &str, pos: usize) -> bool {
    if pos == 0 {
        return true;
    }
    text[..pos]
        .chars()
        .next_back()
        .is_some_and(|c| !c.is_alphanumeric())
}

/// Best fuzzy score for one query word against the text words.
///
/// Lexical checks first, in priority order; edit distance only runs when
/// they leave the score under 70, the query word is short enough (<= 8
/// chars) to make typos plausible, and the text word is within +-3 chars.
fn word_score(query_word: &str, text_words: &[&str]) -> u8 {
    let mut best = 0u8;
    let q_len = query_word.chars().count();

    for text_word in text_words {
        if *text_word == query_word {
            return 100;
        }
        let t_len = text_word.chars().count();
        let shorter = q_len.min(t_len);
        if shorter >= 3 {
            if text_word.starts_with(query_word) {
                best = best.max(90);
                continue;
            }
            if query_word.starts_with(text_word) {
                best = best.max(85);
                continue;
            }
        }
        if q_len >= 3 && text_word.contains(query_word) {
            best = best.max(80);
        }
    }

    if best < 70 && q_len <= 8 {
        for text_word in text_words {
            let t_len = text_word.chars().count();
            if t_len.abs_diff(q_len) > 3 {
                continue;
            }
            let sim = similarity(query_word, text_word);
            if sim >= 0.7 {
                best = best.max((sim * 70.0).round() as u8);
            }
        }
    }

    best
}

/// Fuzzy field score in `0..=100`.
///
/// Exact match 100; substring containment 95 on a word boundary, 85
/// otherwise; else word-by-word scoring where partial query coverage is
/// penalized multiplicatively, not just averaged.
pub fn fuzzy_match_score(text: &str, query: &str) -> u8 {
    let text = text.to_lowercase();
    let query = query.trim().to_lowercase();
    if text.is_empty() || query.is_empty() {
        return 0;
    }
    if text == query {
        return 100;
    }
    if let Some(pos) = text.find(&query) {
        return if at_word_boundary(&text, pos) { 95 } else { 85 };
    }

    let text_words = words(&text);
    let query_words = words(&query);
    if query_words.is_empty() {
        return 0;
    }

    let mut matched = 0usize;
    let mut total = 0u32;
    for query_word in &query_words {
        let score = word_score(query_word, &text_words);
        if score > 0 {
            matched += 1;
            total += u32::from(score);
        }
    }
    if matched == 0 {
        return 0;
    }

    let avg = f64::from(total) / matched as f64;
    let coverage = matched as f64 / query_words.len() as f64;
    (avg * coverage).round() as u8
}

/// Score one worker against the query.
///
/// Fast paths short-circuit in order; the fuzzy scorer runs field-weighted
/// (id 1.5x, name 1.3x, description 0.8x — description only while the best
/// is still under 70).
fn score_worker(worker: &WorkerEntry, query: &str) -> Option<(u8, MatchType)> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return None;
    }

    let id = worker.id.to_lowercase();
    if id == query {
        return Some((100, MatchType::Id));
    }
    if id.contains(&query) {
        return Some((95, MatchType::Id));
    }
    if worker.name.to_lowercase().contains(&query) {
        return Some((90, MatchType::Name));
    }
    if worker
        .tags
        .iter()
        .any(|tag| tag.to_lowercase().contains(&query))
    {
        return Some((85, MatchType::Tags));
    }

    let mut best = f64::from(fuzzy_match_score(&worker.id, &query)) * 1.5;
    best = best.max(f64::from(fuzzy_match_score(&worker.name, &query)) * 1.3);
    if best < 70.0 {
        best = best.max(f64::from(fuzzy_match_score(&worker.description, &query)) * 0.8);
    }

    let score = best.min(100.0).round() as u8;
    if score < MIN_SCORE {
        return None;
    }
    Some((score, MatchType::Combined))
}

/// Rank `workers` against `query`, descending; worker id breaks ties.
pub fn search(workers: &[WorkerEntry], query: &str) -> Vec<SearchResult> {
    let mut results: Vec<SearchResult> = workers
        .iter()
        .filter_map(|worker| {
            score_worker(worker, query).map(|(score, match_type)| SearchResult {
                worker: worker.clone(),
                score,
                match_type,
            })
        })
        .collect();

    results.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.worker.id.cmp(&b.worker.id))
    });
    results
}

/// A did-you-mean candidate for an unresolved worker id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub id: String,
    pub score: u8,
}

/// Top did-you-mean candidates for an id that resolved to nothing.
///
/// Substring overlap in either direction scores 90; otherwise normalized
/// similarity of at least 0.5 scores `round(sim * 100)`. Top 5, descending,
/// id tiebreak.
pub fn find_suggestions(input: &str, candidate_ids: &[String]) -> Vec<Suggestion> {
    let input = input.trim().to_lowercase();
    if input.is_empty() {
        return Vec::new();
    }

    let mut suggestions: Vec<Suggestion> = candidate_ids
        .iter()
        .filter_map(|id| {
            let score = if id.contains(&input) || input.contains(id.as_str()) {
                90
            } else {
                let sim = similarity(&input, id);
                if sim < 0.5 {
                    return None;
                }
                (sim * 100.0).round() as u8
            };
            Some(Suggestion {
                id: id.clone(),
                score,
            })
        })
        .collect();

    suggestions.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
    suggestions.truncate(5);
    suggestions
}
