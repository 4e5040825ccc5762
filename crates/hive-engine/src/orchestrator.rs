//! Search orchestration: strategy selection, filters, blending, limits.
//!
//! Every step after the underlying search call is a pure in-memory
//! transform over the result vector.

use crate::precompute::PrecomputeError;
use crate::provider::EmbeddingError;
use hive_core::types::{SearchResult, SearchStrategy};
use hive_core::RegistryError;
use thiserror::Error;

/// Default result limit when the caller does not set one.
pub const DEFAULT_LIMIT: usize = 10;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("semantic search requested but unavailable: {reason}")]
    SemanticUnavailable { reason: String },

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Precompute(#[from] PrecomputeError),

    #[error("unknown worker id: {id}")]
    UnknownWorker { id: String },
}

/// External pure scoring hook applied between filtering and the final sort.
pub type ScoreBlend = Box<dyn Fn(Vec<SearchResult>, &str) -> Vec<SearchResult> + Send + Sync>;

/// Caller-facing search options.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Explicit strategy; `None` auto-detects (semantic when available,
    /// keyword otherwise).
    pub strategy: Option<SearchStrategy>,
    /// Category filter, exact or substring, case-insensitive.
    pub category: Option<String>,
    /// Tag filter (AND): every requested tag must match exactly or as a
    /// substring, case-insensitive.
    pub tags: Vec<String>,
    /// Result cap after filtering and sorting.
    pub limit: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            strategy: None,
            category: None,
            tags: Vec::new(),
            limit: DEFAULT_LIMIT,
        }
    }
}

/// Resolve the strategy to run.
///
/// An explicit semantic request without the provider credential fails fast
/// with the reason; only auto-detect downgrades to keyword silently.
pub fn select_strategy(
    requested: Option<SearchStrategy>,
    semantic_available: bool,
) -> Result<SearchStrategy, SearchError> {
    match requested {
        Some(SearchStrategy::Keyword) => Ok(SearchStrategy::Keyword),
        Some(SearchStrategy::Semantic) => {
            if semantic_available {
                Ok(SearchStrategy::Semantic)
            } else {
                Err(SearchError::SemanticUnavailable {
                    reason: EmbeddingError::NotConfigured.to_string(),
                })
            }
        }
        None => Ok(if semantic_available {
            SearchStrategy::Semantic
        } else {
            SearchStrategy::Keyword
        }),
    }
}

/// Keep results whose category equals or contains `category`,
/// case-insensitively. `None` keeps everything.
pub fn filter_by_category(
    results: Vec<SearchResult>,
    category: Option<&str>,
) -> Vec<SearchResult> {
    let Some(category) = category else {
        return results;
    };
    let needle = category.to_lowercase();
    results
        .into_iter()
        .filter(|result| {
            let have = result.worker.category.to_lowercase();
            have == needle || have.contains(&needle)
        })
        .collect()
}

/// Keep results carrying every requested tag (AND), where a requested tag
/// matches a worker tag exactly or as a substring, case-insensitively.
/// An empty request keeps everything.
pub fn filter_by_tags(results: Vec<SearchResult>, tags: &[String]) -> Vec<SearchResult> {
    if tags.is_empty() {
        return results;
    }
    let wanted: Vec<String> = tags.iter().map(|t| t.to_lowercase()).collect();
    results
        .into_iter()
        .filter(|result| {
            wanted.iter().all(|wanted_tag| {
                result.worker.tags.iter().any(|tag| {
                    let tag = tag.to_lowercase();
                    tag == *wanted_tag || tag.contains(wanted_tag)
                })
            })
        })
        .collect()
}

/// Final ordering and cap: descending score, worker id breaks ties.
pub fn finalize(mut results: Vec<SearchResult>, limit: usize) -> Vec<SearchResult> {
    results.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.worker.id.cmp(&b.worker.id))
    });
    results.truncate(limit);
    results
}
