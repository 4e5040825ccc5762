//! Related-worker scoring and pagination.

use hive_core::types::WorkerEntry;

/// How many related workers to surface.
const RELATED_LIMIT: usize = 5;

/// A worker related to the lookup target, with its relatedness score.
#[derive(Debug, Clone, PartialEq)]
pub struct RelatedWorker {
    pub worker: WorkerEntry,
    pub score: u32,
}

/// Score peers of `target`: same category scores 10 with a matching
/// subcategory, 5 without; each shared tag adds 2. Scores merge additively
/// per worker. Top 5 descending, excluding the target itself; worker id
/// breaks ties.
pub fn find_related(target: &WorkerEntry, all: &[WorkerEntry]) -> Vec<RelatedWorker> {
    let mut related: Vec<RelatedWorker> = all
        .iter()
        .filter(|candidate| candidate.id != target.id)
        .filter_map(|candidate| {
            let mut score = 0u32;

            if candidate.category.eq_ignore_ascii_case(&target.category) {
                let same_subcategory = match (&candidate.subcategory, &target.subcategory) {
                    (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
                    _ => false,
                };
                score += if same_subcategory { 10 } else { 5 };
            }

            let shared_tags = candidate
                .tags
                .iter()
                .filter(|tag| target.has_tag(tag))
                .count() as u32;
            score += shared_tags * 2;

            if score == 0 {
                return None;
            }
            Some(RelatedWorker {
                worker: candidate.clone(),
                score,
            })
        })
        .collect();

    related.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.worker.id.cmp(&b.worker.id))
    });
    related.truncate(RELATED_LIMIT);
    related
}

/// One page of a larger result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Items on this page; empty past the last page (no clamping).
    pub items: Vec<T>,
    /// The 1-based page that was served (after clamping to >= 1).
    pub page: usize,
    /// Page size used for the slicing.
    pub limit: usize,
    /// Total item count before slicing.
    pub total: usize,
    /// `ceil(total / limit)`.
    pub total_pages: usize,
}

/// Slice `items` into 1-based pages.
///
/// `page` is clamped to at least 1; `limit` to at least 1. Requests past
/// the last page return an empty slice rather than clamping, so callers can
/// treat the echoed page number as a cursor.
pub fn paginate<T: Clone>(items: &[T], page: usize, limit: usize) -> Page<T> {
    let page = page.max(1);
    let limit = limit.max(1);
    let total = items.len();
    let start = (page - 1).saturating_mul(limit);
    let end = start.saturating_add(limit).min(total);

    let page_items = if start >= total {
        Vec::new()
    } else {
        items[start..end].to_vec()
    };

    Page {
        items: page_items,
        page,
        limit,
        total,
        total_pages: total.div_ceil(limit),
    }
}
