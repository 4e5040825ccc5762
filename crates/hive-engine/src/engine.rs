//! Discovery engine facade.
//!
//! Composition root owning the registry store, the semantic index, and the
//! shared metrics. Consumers (CLI layer, metrics collector) talk to this
//! type only; presentation is entirely theirs.

use crate::cache::{SharedClock, SystemClock};
use crate::keyword;
use crate::metrics::DiscoveryMetrics;
use crate::orchestrator::{
    filter_by_category, filter_by_tags, finalize, select_strategy, ScoreBlend, SearchError,
    SearchOptions,
};
use crate::precompute::{precompute_embeddings, PrecomputeSummary};
use crate::provider::EmbeddingClient;
use crate::related::{find_related, RelatedWorker};
use crate::semantic::SemanticIndex;
use crate::store::{RegistryStore, StoreStats};
use hive_core::types::{
    CategorySummary, MatchType, SearchResult, SearchStrategy, WorkerEntry,
};
use hive_core::EngineConfig;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// The worker discovery engine.
///
/// Independently instantiable so tests and embedders can run isolated
/// instances; `shared()` offers a process-wide default for simple callers.
pub struct DiscoveryEngine {
    config: EngineConfig,
    store: RegistryStore,
    semantic: SemanticIndex,
    metrics: Arc<DiscoveryMetrics>,
    blend: Option<ScoreBlend>,
}

impl std::fmt::Debug for DiscoveryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryEngine")
            .field("config", &self.config)
            .field("blend", &self.blend.is_some())
            .finish_non_exhaustive()
    }
}

impl DiscoveryEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Engine with an injected clock, for TTL-sensitive tests.
    pub fn with_clock(config: EngineConfig, clock: SharedClock) -> Self {
        let metrics = Arc::new(DiscoveryMetrics::new());
        let store = RegistryStore::new(
            config.registry_path.clone(),
            config.registry_ttl(),
            Arc::clone(&clock),
            Arc::clone(&metrics),
        );
        let client = EmbeddingClient::from_config(&config);
        let semantic = SemanticIndex::new(client, &config, clock, Arc::clone(&metrics));
        Self {
            config,
            store,
            semantic,
            metrics,
            blend: None,
        }
    }

    /// Install an external pure scoring hook, applied between filtering and
    /// the final sort.
    pub fn with_score_blend(mut self, blend: ScoreBlend) -> Self {
        self.blend = Some(blend);
        self
    }

    /// Process-wide default engine: default config plus the environment
    /// credential. Tests should construct isolated instances instead.
    pub fn shared() -> &'static DiscoveryEngine {
        static SHARED: OnceLock<DiscoveryEngine> = OnceLock::new();
        SHARED.get_or_init(|| {
            let mut config = EngineConfig::default();
            config.apply_env();
            DiscoveryEngine::new(config)
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &RegistryStore {
        &self.store
    }

    pub fn metrics(&self) -> &DiscoveryMetrics {
        &self.metrics
    }

    /// True when the semantic strategy can serve requests.
    pub fn semantic_available(&self) -> bool {
        self.semantic.available()
    }

    /// Ranked multi-strategy search.
    ///
    /// Pipeline: strategy selection, underlying search, category filter,
    /// tag filter, score blend, sort, limit.
    pub async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, SearchError> {
        self.metrics.inc_searches();
        let strategy = select_strategy(options.strategy, self.semantic.available())?;
        debug!(query, strategy = strategy.as_str(), "running search");

        let workers = self.store.get_all()?;
        let results = match strategy {
            SearchStrategy::Keyword => keyword::search(&workers, query),
            SearchStrategy::Semantic => self.semantic.search(query, &workers).await?,
        };

        let results = filter_by_category(results, options.category.as_deref());
        let mut results = filter_by_tags(results, &options.tags);
        if let Some(blend) = &self.blend {
            results = blend(results, query);
        }
        Ok(finalize(results, options.limit))
    }

    /// Workers carrying `tag`, as exact-tag results.
    pub fn search_by_tag(&self, tag: &str) -> Result<Vec<SearchResult>, SearchError> {
        let mut results: Vec<SearchResult> = self
            .store
            .get_by_tag(tag)?
            .into_iter()
            .map(|worker| SearchResult {
                worker,
                score: 100,
                match_type: MatchType::TagExact,
            })
            .collect();
        results.sort_by(|a, b| a.worker.id.cmp(&b.worker.id));
        Ok(results)
    }

    pub fn get_by_id(&self, id: &str) -> Result<Option<WorkerEntry>, SearchError> {
        Ok(self.store.get_by_id(id)?)
    }

    pub fn get_by_category(&self, category: &str) -> Result<Vec<WorkerEntry>, SearchError> {
        Ok(self.store.get_by_category(category)?)
    }

    pub fn get_all(&self) -> Result<Vec<WorkerEntry>, SearchError> {
        Ok(self.store.get_all()?)
    }

    pub fn get_categories(&self) -> Result<Vec<(String, CategorySummary)>, SearchError> {
        Ok(self.store.get_categories()?)
    }

    pub fn get_tags(&self) -> Result<Vec<String>, SearchError> {
        Ok(self.store.get_tags()?)
    }

    pub fn stats(&self) -> Result<StoreStats, SearchError> {
        Ok(self.store.stats()?)
    }

    /// Did-you-mean candidates for an id that resolved to nothing.
    pub fn find_suggestions(&self, input: &str) -> Result<Vec<keyword::Suggestion>, SearchError> {
        let ids: Vec<String> = self
            .store
            .get_all()?
            .into_iter()
            .map(|worker| worker.id)
            .collect();
        Ok(keyword::find_suggestions(input, &ids))
    }

    /// Workers related to `id` by category, subcategory, and shared tags.
    pub fn find_related_workers(&self, id: &str) -> Result<Vec<RelatedWorker>, SearchError> {
        let Some(target) = self.store.get_by_id(id)? else {
            return Err(SearchError::UnknownWorker { id: id.to_string() });
        };
        let all = self.store.get_all()?;
        Ok(find_related(&target, &all))
    }

    /// Embed the whole corpus and persist the result for future searches.
    pub async fn precompute(&self) -> Result<PrecomputeSummary, SearchError> {
        let workers = self.store.get_all()?;
        let summary = precompute_embeddings(
            self.semantic.client(),
            &workers,
            &self.config.embeddings_path,
            self.config.precompute_delay(),
            &SystemClock,
        )
        .await?;
        // Future searches should pick up the fresh file immediately.
        self.semantic.clear_cache();
        Ok(summary)
    }

    /// Drop both TTL caches; the next call re-reads everything.
    pub fn clear_caches(&self) {
        self.store.clear_cache();
        self.semantic.clear_cache();
    }
}
