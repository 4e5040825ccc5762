//! Registry store: TTL-cached snapshot with derived lookup indexes.
//!
//! `load` reads and parses the snapshot file, rebuilds all four indexes, and
//! swaps the result in as one unit — readers never observe a partially built
//! index. Concurrent cold loads may duplicate the file read; loads are
//! idempotent pure reads, so the duplication is tolerated rather than
//! deduplicated.

use crate::cache::{SharedClock, SystemClock, TtlCell};
use crate::metrics::DiscoveryMetrics;
use hive_core::registry::{load_snapshot, RegistryError};
use hive_core::types::{CategorySummary, RegistrySnapshot, WorkerEntry};
use hive_core::EngineConfig;
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, warn};

/// A parsed snapshot plus its derived indexes.
///
/// Index values are positions into `snapshot.workers`, so the snapshot is
/// stored once. Category, tag, and agent keys are lowercased; ids are stored
/// as-is (the slug pattern is already lowercase).
#[derive(Debug)]
pub struct LoadedRegistry {
    snapshot: RegistrySnapshot,
    by_id: HashMap<String, usize>,
    by_category: HashMap<String, Vec<usize>>,
    by_tag: HashMap<String, Vec<usize>>,
    by_agent: HashMap<String, Vec<usize>>,
}

impl LoadedRegistry {
    fn build(snapshot: RegistrySnapshot) -> Self {
        let mut by_id = HashMap::new();
        let mut by_category: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_tag: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_agent: HashMap<String, Vec<usize>> = HashMap::new();

        for (pos, worker) in snapshot.workers.iter().enumerate() {
            // Duplicate ids are a producer defect; last write wins, surfaced
            // but not masked.
            if by_id.insert(worker.id.clone(), pos).is_some() {
                warn!(id = %worker.id, "duplicate worker id in snapshot, keeping last");
            }
            by_category
                .entry(worker.category.to_lowercase())
                .or_default()
                .push(pos);
            for tag in &worker.tags {
                by_tag.entry(tag.to_lowercase()).or_default().push(pos);
            }
            for agent in &worker.agents {
                by_agent.entry(agent.to_lowercase()).or_default().push(pos);
            }
        }

        debug!(
            workers = snapshot.workers.len(),
            categories = by_category.len(),
            tags = by_tag.len(),
            "rebuilt registry indexes"
        );

        Self {
            snapshot,
            by_id,
            by_category,
            by_tag,
            by_agent,
        }
    }

    pub fn snapshot(&self) -> &RegistrySnapshot {
        &self.snapshot
    }

    pub fn workers(&self) -> &[WorkerEntry] {
        &self.snapshot.workers
    }

    /// Registry format version, as reported by the scanner.
    pub fn version(&self) -> &str {
        &self.snapshot.version
    }

    /// When the scanner produced this snapshot.
    pub fn generated(&self) -> chrono::DateTime<chrono::Utc> {
        self.snapshot.generated
    }

    fn get(&self, pos: usize) -> &WorkerEntry {
        &self.snapshot.workers[pos]
    }
}

/// Filter for the built-in convenience search.
#[derive(Debug, Clone, Default)]
pub struct StoreSearchFilter {
    /// Restrict to an exact category (case-insensitive) when set.
    pub category: Option<String>,
    /// Cap on returned results; `None` means unbounded.
    pub max_results: Option<usize>,
}

/// Aggregate counts for consumer banners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub workers: usize,
    pub categories: usize,
    pub tags: usize,
}

/// TTL-cached, index-backed view over the registry snapshot file.
///
/// Independently instantiable; every lookup refreshes through `load` first,
/// so callers never observe a stale-beyond-TTL corpus.
#[derive(Debug)]
pub struct RegistryStore {
    path: PathBuf,
    ttl: Duration,
    clock: SharedClock,
    metrics: Arc<DiscoveryMetrics>,
    cell: RwLock<Option<TtlCell<Arc<LoadedRegistry>>>>,
}

impl RegistryStore {
    pub fn new(
        path: PathBuf,
        ttl: Duration,
        clock: SharedClock,
        metrics: Arc<DiscoveryMetrics>,
    ) -> Self {
        Self {
            path,
            ttl,
            clock,
            metrics,
            cell: RwLock::new(None),
        }
    }

    /// Store over `config.registry_path` with the system clock.
    pub fn from_config(config: &EngineConfig, metrics: Arc<DiscoveryMetrics>) -> Self {
        Self::new(
            config.registry_path.clone(),
            config.registry_ttl(),
            Arc::new(SystemClock),
            metrics,
        )
    }

    /// Return the cached registry if within TTL; otherwise read and parse
    /// the snapshot file and rebuild every index as one atomic swap.
    ///
    /// `force` bypasses the TTL check. Failures are fatal to this call and
    /// are not retried; the previous cached value (if any) stays in place.
    pub fn load(&self, force: bool) -> Result<Arc<LoadedRegistry>, RegistryError> {
        if !force {
            let guard = self.cell.read().unwrap_or_else(|e| e.into_inner());
            if let Some(cell) = guard.as_ref() {
                if !cell.is_expired(self.clock.now()) {
                    self.metrics.inc_cache_hits();
                    return Ok(Arc::clone(&cell.value));
                }
            }
        }

        // I/O happens outside the lock; two concurrent cold loads may both
        // read the file, and the later swap wins.
        self.metrics.inc_cache_misses();
        let snapshot = load_snapshot(&self.path)?;
        let loaded = Arc::new(LoadedRegistry::build(snapshot));
        let cell = TtlCell::new(Arc::clone(&loaded), self.clock.now(), self.ttl);

        let mut guard = self.cell.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(cell);
        debug!(path = %self.path.display(), "registry snapshot loaded");
        Ok(loaded)
    }

    /// Drop the cached snapshot; the next lookup re-reads the file.
    pub fn clear_cache(&self) {
        let mut guard = self.cell.write().unwrap_or_else(|e| e.into_inner());
        *guard = None;
    }

    pub fn get_by_id(&self, id: &str) -> Result<Option<WorkerEntry>, RegistryError> {
        let registry = self.load(false)?;
        Ok(registry.by_id.get(id).map(|&pos| registry.get(pos).clone()))
    }

    pub fn exists(&self, id: &str) -> Result<bool, RegistryError> {
        let registry = self.load(false)?;
        Ok(registry.by_id.contains_key(id))
    }

    pub fn get_by_category(&self, category: &str) -> Result<Vec<WorkerEntry>, RegistryError> {
        let registry = self.load(false)?;
        Ok(registry
            .by_category
            .get(&category.to_lowercase())
            .map(|positions| positions.iter().map(|&p| registry.get(p).clone()).collect())
            .unwrap_or_default())
    }

    pub fn get_by_tag(&self, tag: &str) -> Result<Vec<WorkerEntry>, RegistryError> {
        let registry = self.load(false)?;
        Ok(registry
            .by_tag
            .get(&tag.to_lowercase())
            .map(|positions| positions.iter().map(|&p| registry.get(p).clone()).collect())
            .unwrap_or_default())
    }

    /// Workers carrying every tag in `tags` (AND). Candidates of the first
    /// tag are intersected against the rest; an empty input selects nothing.
    pub fn get_by_tags(&self, tags: &[String]) -> Result<Vec<WorkerEntry>, RegistryError> {
        let Some((first, rest)) = tags.split_first() else {
            return Ok(Vec::new());
        };
        let candidates = self.get_by_tag(first)?;
        Ok(candidates
            .into_iter()
            .filter(|worker| rest.iter().all(|tag| worker.has_tag(tag)))
            .collect())
    }

    pub fn get_for_agent(&self, agent: &str) -> Result<Vec<WorkerEntry>, RegistryError> {
        let registry = self.load(false)?;
        Ok(registry
            .by_agent
            .get(&agent.to_lowercase())
            .map(|positions| positions.iter().map(|&p| registry.get(p).clone()).collect())
            .unwrap_or_default())
    }

    pub fn get_all(&self) -> Result<Vec<WorkerEntry>, RegistryError> {
        let registry = self.load(false)?;
        Ok(registry.workers().to_vec())
    }

    /// Distinct categories as stored, with their snapshot summaries when the
    /// scanner provided one.
    pub fn get_categories(&self) -> Result<Vec<(String, CategorySummary)>, RegistryError> {
        let registry = self.load(false)?;
        let mut names: BTreeSet<&str> = BTreeSet::new();
        for worker in registry.workers() {
            names.insert(worker.category.as_str());
        }
        Ok(names
            .into_iter()
            .map(|name| {
                let summary = registry
                    .snapshot
                    .categories
                    .get(name)
                    .cloned()
                    .unwrap_or_default();
                (name.to_string(), summary)
            })
            .collect())
    }

    /// Distinct tags as stored, sorted.
    pub fn get_tags(&self) -> Result<Vec<String>, RegistryError> {
        let registry = self.load(false)?;
        let mut tags: BTreeSet<&str> = BTreeSet::new();
        for worker in registry.workers() {
            for tag in &worker.tags {
                tags.insert(tag.as_str());
            }
        }
        Ok(tags.into_iter().map(String::from).collect())
    }

    pub fn count(&self) -> Result<usize, RegistryError> {
        Ok(self.load(false)?.workers().len())
    }

    pub fn stats(&self) -> Result<StoreStats, RegistryError> {
        let registry = self.load(false)?;
        Ok(StoreStats {
            workers: registry.workers().len(),
            categories: registry.by_category.len(),
            tags: registry.by_tag.len(),
        })
    }

    /// Lightweight substring search for internal convenience lookups.
    ///
    /// Scores by a fixed field-weight table (id 10, name 8, tag 5,
    /// description 2, summed per matched field). The ranked orchestrator in
    /// `orchestrator` is the real search surface.
    pub fn search(
        &self,
        query: &str,
        filter: &StoreSearchFilter,
    ) -> Result<Vec<WorkerEntry>, RegistryError> {
        let registry = self.load(false)?;
        let needle = query.to_lowercase();

        let mut scored: Vec<(u32, &WorkerEntry)> = Vec::new();
        for worker in registry.workers() {
            if let Some(category) = &filter.category {
                if !worker.category.eq_ignore_ascii_case(category) {
                    continue;
                }
            }

            let mut score = 0u32;
            if worker.id.contains(&needle) {
                score += 10;
            }
            if worker.name.to_lowercase().contains(&needle) {
                score += 8;
            }
            if worker
                .tags
                .iter()
                .any(|tag| tag.to_lowercase().contains(&needle))
            {
                score += 5;
            }
            if worker.description.to_lowercase().contains(&needle) {
                score += 2;
            }
            if score > 0 {
                scored.push((score, worker));
            }
        }

        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.id.cmp(&b.1.id)));
        if let Some(max) = filter.max_results {
            scored.truncate(max);
        }
        Ok(scored.into_iter().map(|(_, w)| w.clone()).collect())
    }
}
