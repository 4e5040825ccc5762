//! In-process discovery metrics.
//!
//! Atomic counters shared by the store and the search layer. The standalone
//! metrics collector consumes these through the engine API; nothing is
//! exported from here directly.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Counters for registry and search operations.
#[derive(Debug, Default)]
pub struct DiscoveryMetrics {
    /// Searches served through the orchestrator.
    pub searches_total: AtomicUsize,
    /// Registry loads answered from the TTL cache.
    pub registry_cache_hits: AtomicUsize,
    /// Registry loads that re-read the snapshot file.
    pub registry_cache_misses: AtomicUsize,
    /// Semantic lookups that fell back to keyword matching.
    pub keyword_fallbacks: AtomicUsize,
    /// Embedding provider request failures.
    pub provider_failures: AtomicUsize,
}

impl DiscoveryMetrics {
    /// Create a new metrics instance with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_searches(&self) {
        self.searches_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cache_hits(&self) {
        self.registry_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cache_misses(&self) {
        self.registry_cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_keyword_fallbacks(&self) {
        self.keyword_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_provider_failures(&self) {
        self.provider_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn searches(&self) -> usize {
        self.searches_total.load(Ordering::Relaxed)
    }

    pub fn cache_hits(&self) -> usize {
        self.registry_cache_hits.load(Ordering::Relaxed)
    }

    pub fn cache_misses(&self) -> usize {
        self.registry_cache_misses.load(Ordering::Relaxed)
    }

    pub fn fallbacks(&self) -> usize {
        self.keyword_fallbacks.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> usize {
        self.provider_failures.load(Ordering::Relaxed)
    }
}
