//! Embedding-based semantic search.
//!
//! Worker vectors come from a persisted precompute file when one exists;
//! otherwise a bounded number of workers is embedded on the fly and the
//! remainder is marked unembedded. Unembedded workers degrade to substring
//! matching at a fixed score so they stay discoverable.

use crate::cache::{SharedClock, TtlCell};
use crate::metrics::DiscoveryMetrics;
use crate::provider::{EmbeddingClient, EmbeddingError};
use hive_core::types::{EmbeddingFile, MatchType, SearchResult, WorkerEntry};
use hive_core::EngineConfig;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, warn};

/// Results below this score are dropped.
const MIN_SCORE: f64 = 20.0;

/// Fixed score for unembedded workers matched by substring fallback.
const FALLBACK_SCORE: u8 = 50;

/// One worker in the embedding cache. `embedding: None` means the worker
/// was never embedded and falls back to substring matching.
#[derive(Debug, Clone)]
pub struct CachedEmbedding {
    pub worker: WorkerEntry,
    pub embedding: Option<Vec<f32>>,
}

type EmbeddingCache = Arc<HashMap<String, CachedEmbedding>>;

/// Cosine similarity over equal-length vectors.
///
/// Mismatched lengths are a shape error, not a zero — a corrupt or
/// model-mixed cache must surface, not silently sink to the bottom of the
/// ranking.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64, EmbeddingError> {
    if a.len() != b.len() {
        return Err(EmbeddingError::ShapeMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += f64::from(*x) * f64::from(*y);
        norm_a += f64::from(*x) * f64::from(*x);
        norm_b += f64::from(*y) * f64::from(*y);
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return Ok(0.0);
    }
    Ok(dot / denom)
}

/// Text embedded for a worker: the searchable prose fields joined.
pub fn embed_text(worker: &WorkerEntry) -> String {
    let mut text = format!("{}. {}", worker.name, worker.description);
    if !worker.tags.is_empty() {
        text.push_str(". Tags: ");
        text.push_str(&worker.tags.join(", "));
    }
    text.push_str(". Category: ");
    text.push_str(&worker.category);
    text
}

/// Substring fallback for workers without an embedding.
fn fallback_matches(worker: &WorkerEntry, query: &str) -> bool {
    let query = query.to_lowercase();
    worker.id.contains(&query)
        || worker.name.to_lowercase().contains(&query)
        || worker.description.to_lowercase().contains(&query)
        || worker.tags.iter().any(|t| t.to_lowercase().contains(&query))
}

/// Rank cached entries against an embedded query.
///
/// A shape mismatch on one entry skips that entry with a warning; it never
/// aborts the whole search.
fn rank(
    query: &str,
    query_vector: &[f32],
    cache: &HashMap<String, CachedEmbedding>,
    metrics: &DiscoveryMetrics,
) -> Vec<SearchResult> {
    let mut results: Vec<SearchResult> = Vec::new();

    for entry in cache.values() {
        match &entry.embedding {
            Some(vector) => match cosine_similarity(query_vector, vector) {
                Ok(similarity) => {
                    let score = similarity * 100.0;
                    if score >= MIN_SCORE {
                        results.push(SearchResult {
                            worker: entry.worker.clone(),
                            score: score.round().min(100.0) as u8,
                            match_type: MatchType::Semantic,
                        });
                    }
                }
                Err(err) => {
                    warn!(id = %entry.worker.id, error = %err, "skipping worker with bad embedding");
                }
            },
            None => {
                if fallback_matches(&entry.worker, query) {
                    metrics.inc_keyword_fallbacks();
                    results.push(SearchResult {
                        worker: entry.worker.clone(),
                        score: FALLBACK_SCORE,
                        match_type: MatchType::KeywordFallback,
                    });
                }
            }
        }
    }

    results.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.worker.id.cmp(&b.worker.id))
    });
    results
}

/// Semantic search over the worker corpus.
///
/// Holds its own TTL-bound embedding cache, independent of the registry's
/// snapshot TTL.
#[derive(Debug)]
pub struct SemanticIndex {
    client: EmbeddingClient,
    embeddings_path: PathBuf,
    ttl: Duration,
    max_inline: usize,
    clock: SharedClock,
    metrics: Arc<DiscoveryMetrics>,
    cache: RwLock<Option<TtlCell<EmbeddingCache>>>,
}

impl SemanticIndex {
    pub fn new(
        client: EmbeddingClient,
        config: &EngineConfig,
        clock: SharedClock,
        metrics: Arc<DiscoveryMetrics>,
    ) -> Self {
        Self {
            client,
            embeddings_path: config.embeddings_path.clone(),
            ttl: config.embedding_ttl(),
            max_inline: config.max_inline_embeddings,
            clock,
            metrics,
            cache: RwLock::new(None),
        }
    }

    /// True when the provider credential is present.
    pub fn available(&self) -> bool {
        self.client.is_configured()
    }

    pub fn client(&self) -> &EmbeddingClient {
        &self.client
    }

    /// Drop the embedding cache; the next search repopulates it.
    pub fn clear_cache(&self) {
        let mut guard = self.cache.write().unwrap_or_else(|e| e.into_inner());
        *guard = None;
    }

    /// Rank `workers` against `query` by embedding similarity.
    ///
    /// Fails fast when no credential is configured; the orchestrator decides
    /// whether that downgrades to keyword search (auto mode) or surfaces
    /// (explicit request).
    pub async fn search(
        &self,
        query: &str,
        workers: &[WorkerEntry],
    ) -> Result<Vec<SearchResult>, EmbeddingError> {
        if !self.available() {
            return Err(EmbeddingError::NotConfigured);
        }

        let cache = self.ensure_cache(workers).await?;
        let query_vector = self.client.embed(query).await.map_err(|err| {
            self.metrics.inc_provider_failures();
            err
        })?;

        Ok(rank(query, &query_vector, &cache, &self.metrics))
    }

    /// Return the cached corpus embeddings if within TTL, else rebuild.
    ///
    /// Prefers the persisted precompute file; otherwise embeds the first
    /// `max_inline` workers on the fly (cost bound) and marks the rest
    /// unembedded.
    async fn ensure_cache(
        &self,
        workers: &[WorkerEntry],
    ) -> Result<EmbeddingCache, EmbeddingError> {
        {
            let guard = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some(cell) = guard.as_ref() {
                if !cell.is_expired(self.clock.now()) {
                    return Ok(Arc::clone(&cell.value));
                }
            }
        }

        let persisted = self.load_persisted();
        let mut cache = HashMap::with_capacity(workers.len());

        match persisted {
            Some(file) => {
                debug!(
                    count = file.embeddings.len(),
                    model = %file.model,
                    "seeding embedding cache from precomputed file"
                );
                for worker in workers {
                    let embedding = file
                        .embeddings
                        .get(&worker.id)
                        .and_then(|stored| stored.embedding.clone());
                    cache.insert(
                        worker.id.clone(),
                        CachedEmbedding {
                            worker: worker.clone(),
                            embedding,
                        },
                    );
                }
            }
            None => {
                debug!(
                    inline = self.max_inline.min(workers.len()),
                    total = workers.len(),
                    "no precomputed embeddings, computing on the fly"
                );
                for (index, worker) in workers.iter().enumerate() {
                    let embedding = if index < self.max_inline {
                        Some(self.client.embed(&embed_text(worker)).await.map_err(
                            |err| {
                                self.metrics.inc_provider_failures();
                                err
                            },
                        )?)
                    } else {
                        None
                    };
                    cache.insert(
                        worker.id.clone(),
                        CachedEmbedding {
                            worker: worker.clone(),
                            embedding,
                        },
                    );
                }
            }
        }

        let cache: EmbeddingCache = Arc::new(cache);
        let cell = TtlCell::new(Arc::clone(&cache), self.clock.now(), self.ttl);
        let mut guard = self.cache.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(cell);
        Ok(cache)
    }

    fn load_persisted(&self) -> Option<EmbeddingFile> {
        let content = std::fs::read_to_string(&self.embeddings_path).ok()?;
        match serde_json::from_str::<EmbeddingFile>(&content) {
            Ok(file) => Some(file),
            Err(err) => {
                warn!(
                    path = %self.embeddings_path.display(),
                    error = %err,
                    "ignoring unparseable embeddings file"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::test_clock::ManualClock;
    use crate::provider::test_server;
    use chrono::{DateTime, Utc};
    use hive_core::types::StoredEmbedding;
    use tempfile::TempDir;

    fn make_worker(id: &str, name: &str, description: &str, tags: &[&str]) -> WorkerEntry {
        serde_json::from_str(&format!(
            r#"{{
                "id": "{id}",
                "name": "{name}",
                "description": "{description}",
                "category": "general",
                "tags": [{}]
            }}"#,
            tags.iter()
                .map(|t| format!("\"{t}\""))
                .collect::<Vec<_>>()
                .join(",")
        ))
        .unwrap()
    }

    fn t0() -> DateTime<Utc> {
        "2026-01-15T10:00:00Z".parse().unwrap()
    }

    #[test]
    fn cosine_identical_vectors_is_one() {
        let sim = cosine_similarity(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]).unwrap();
        assert!((sim - 1.0).abs() < 1e-9);
    }

    #[test]
    fn cosine_orthogonal_vectors_is_zero() {
        let sim = cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap();
        assert!(sim.abs() < 1e-9);
    }

    #[test]
    fn cosine_mismatched_lengths_is_shape_error() {
        let err = cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::ShapeMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn cosine_zero_vector_is_zero() {
        let sim = cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]).unwrap();
        assert!(sim.abs() < 1e-9);
    }

    #[test]
    fn embed_text_joins_prose_fields() {
        let worker = make_worker(
            "schema-validator",
            "Validate Schema",
            "Check documents",
            &["validation", "json"],
        );
        let text = embed_text(&worker);
        assert!(text.contains("Validate Schema"));
        assert!(text.contains("Check documents"));
        assert!(text.contains("validation, json"));
        assert!(text.contains("Category: general"));
    }

    #[test]
    fn rank_scores_similarity_and_skips_bad_shapes() {
        let metrics = DiscoveryMetrics::new();
        let mut cache = HashMap::new();
        cache.insert(
            "aligned".to_string(),
            CachedEmbedding {
                worker: make_worker("aligned", "Aligned", "", &[]),
                embedding: Some(vec![1.0, 0.0]),
            },
        );
        cache.insert(
            "opposed".to_string(),
            CachedEmbedding {
                worker: make_worker("opposed", "Opposed", "", &[]),
                embedding: Some(vec![0.0, 1.0]),
            },
        );
        cache.insert(
            "corrupt".to_string(),
            CachedEmbedding {
                worker: make_worker("corrupt", "Corrupt", "", &[]),
                embedding: Some(vec![1.0, 0.0, 0.0]),
            },
        );

        let results = rank("query", &[1.0, 0.0], &cache, &metrics);
        // Orthogonal scores 0 (dropped), mismatched shape is skipped.
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].worker.id, "aligned");
        assert_eq!(results[0].score, 100);
        assert_eq!(results[0].match_type, MatchType::Semantic);
    }

    #[test]
    fn rank_falls_back_for_unembedded_workers() {
        let metrics = DiscoveryMetrics::new();
        let mut cache = HashMap::new();
        cache.insert(
            "schema-validator".to_string(),
            CachedEmbedding {
                worker: make_worker("schema-validator", "Validate Schema", "", &["validation"]),
                embedding: None,
            },
        );
        cache.insert(
            "unrelated".to_string(),
            CachedEmbedding {
                worker: make_worker("unrelated", "Unrelated", "", &[]),
                embedding: None,
            },
        );

        let results = rank("validate", &[1.0], &cache, &metrics);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].worker.id, "schema-validator");
        assert_eq!(results[0].score, FALLBACK_SCORE);
        assert_eq!(results[0].match_type, MatchType::KeywordFallback);
        assert_eq!(metrics.fallbacks(), 1);
    }

    #[tokio::test]
    async fn search_without_credential_fails_fast() {
        let tmp = TempDir::new().unwrap();
        let mut config = EngineConfig::default();
        config.embeddings_path = tmp.path().join("embeddings.json");
        let index = SemanticIndex::new(
            EmbeddingClient::from_config(&config),
            &config,
            ManualClock::starting_at(t0()),
            Arc::new(DiscoveryMetrics::new()),
        );

        assert!(!index.available());
        let err = index.search("query", &[]).await.unwrap_err();
        assert!(matches!(err, EmbeddingError::NotConfigured));
    }

    #[tokio::test]
    async fn search_seeds_cache_from_persisted_file() {
        let tmp = TempDir::new().unwrap();
        let embeddings_path = tmp.path().join("embeddings.json");

        let workers = vec![
            make_worker("schema-validator", "Validate Schema", "", &["validation"]),
            make_worker("late-arrival", "Late Arrival", "", &[]),
        ];
        let file = EmbeddingFile {
            version: "1.0.0".to_string(),
            generated: t0(),
            model: "text-embedding-3-small".to_string(),
            count: 1,
            embeddings: [(
                "schema-validator".to_string(),
                StoredEmbedding {
                    worker: "Validate Schema".to_string(),
                    embedding: Some(vec![1.0, 0.0]),
                },
            )]
            .into_iter()
            .collect(),
        };
        std::fs::write(&embeddings_path, serde_json::to_string(&file).unwrap()).unwrap();

        // Only the query embedding hits the provider: the corpus comes from
        // the file, and the worker missing from it stays unembedded.
        let base = test_server::serve(vec![test_server::embedding_response(&[1.0, 0.0])]).await;
        let mut config = EngineConfig::default();
        config.provider_base_url = base;
        config.api_key = Some("test-key".to_string());
        config.embeddings_path = embeddings_path;

        let index = SemanticIndex::new(
            EmbeddingClient::from_config(&config),
            &config,
            ManualClock::starting_at(t0()),
            Arc::new(DiscoveryMetrics::new()),
        );

        let results = index.search("validate", &workers).await.unwrap();
        assert_eq!(results[0].worker.id, "schema-validator");
        assert_eq!(results[0].match_type, MatchType::Semantic);
        assert_eq!(results[0].score, 100);
    }

    #[tokio::test]
    async fn inline_compute_caps_at_configured_maximum() {
        let tmp = TempDir::new().unwrap();

        let workers: Vec<WorkerEntry> = (0..3)
            .map(|i| make_worker(&format!("worker-{i}"), &format!("Worker {i}"), "", &[]))
            .collect();

        // Two corpus embeddings (max_inline = 2) plus one query embedding.
        let base = test_server::serve(vec![
            test_server::embedding_response(&[1.0, 0.0]),
            test_server::embedding_response(&[0.0, 1.0]),
            test_server::embedding_response(&[1.0, 0.0]),
        ])
        .await;
        let mut config = EngineConfig::default();
        config.provider_base_url = base;
        config.api_key = Some("test-key".to_string());
        config.embeddings_path = tmp.path().join("missing.json");
        config.max_inline_embeddings = 2;

        let index = SemanticIndex::new(
            EmbeddingClient::from_config(&config),
            &config,
            ManualClock::starting_at(t0()),
            Arc::new(DiscoveryMetrics::new()),
        );

        let results = index.search("worker", &workers).await.unwrap();
        // worker-0 matches the query vector exactly; worker-2 was never
        // embedded and comes through the substring fallback.
        assert!(results
            .iter()
            .any(|r| r.worker.id == "worker-0" && r.match_type == MatchType::Semantic));
        assert!(results
            .iter()
            .any(|r| r.worker.id == "worker-2" && r.match_type == MatchType::KeywordFallback));
    }

    #[tokio::test]
    async fn cache_is_reused_within_ttl() {
        let tmp = TempDir::new().unwrap();
        let workers = vec![make_worker("solo", "Solo", "", &[])];

        // One corpus embedding, then one query embedding per search call.
        let base = test_server::serve(vec![
            test_server::embedding_response(&[1.0, 0.0]),
            test_server::embedding_response(&[1.0, 0.0]),
            test_server::embedding_response(&[1.0, 0.0]),
        ])
        .await;
        let mut config = EngineConfig::default();
        config.provider_base_url = base;
        config.api_key = Some("test-key".to_string());
        config.embeddings_path = tmp.path().join("missing.json");

        let index = SemanticIndex::new(
            EmbeddingClient::from_config(&config),
            &config,
            ManualClock::starting_at(t0()),
            Arc::new(DiscoveryMetrics::new()),
        );

        // Second search consumes only one more canned response (the query);
        // a corpus recompute would exhaust the server and fail.
        index.search("solo", &workers).await.unwrap();
        index.search("solo", &workers).await.unwrap();
    }
}
