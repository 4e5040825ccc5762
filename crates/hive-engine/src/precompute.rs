//! Batch embedding precompute.
//!
//! One request per worker with a mandatory inter-request delay for provider
//! rate-limit compliance. Per-item failures are accumulated and the loop
//! continues; the full map is persisted on completion with the model and a
//! timestamp so the search path can verify provenance.

use crate::cache::Clock;
use crate::provider::{EmbeddingClient, EmbeddingError};
use crate::semantic::embed_text;
use hive_core::types::{EmbeddingFile, StoredEmbedding, WorkerEntry};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum PrecomputeError {
    #[error("no provider credential configured, cannot precompute embeddings")]
    NotConfigured,

    #[error("failed to serialize embeddings: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write embeddings file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A worker the batch could not embed, with the provider's reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedEmbedding {
    pub worker_id: String,
    pub reason: String,
}

/// Outcome of a batch precompute run.
#[derive(Debug)]
pub struct PrecomputeSummary {
    /// Workers embedded successfully.
    pub embedded: usize,
    /// Workers that failed; they are persisted with a null embedding so the
    /// search path falls back for them.
    pub failed: Vec<FailedEmbedding>,
    /// Where the embeddings file was written.
    pub path: PathBuf,
}

/// File format version written by this batch.
const FILE_VERSION: &str = "1.0.0";

/// Embed every worker and persist the result.
///
/// A failing worker is recorded and skipped, never fatal to the batch; the
/// mandatory `delay` between requests is cooperative rate limiting, not
/// adaptive backoff.
pub async fn precompute_embeddings(
    client: &EmbeddingClient,
    workers: &[WorkerEntry],
    path: &Path,
    delay: Duration,
    clock: &dyn Clock,
) -> Result<PrecomputeSummary, PrecomputeError> {
    if !client.is_configured() {
        return Err(PrecomputeError::NotConfigured);
    }

    let mut embeddings: HashMap<String, StoredEmbedding> = HashMap::with_capacity(workers.len());
    let mut failed: Vec<FailedEmbedding> = Vec::new();

    for (index, worker) in workers.iter().enumerate() {
        if index > 0 {
            tokio::time::sleep(delay).await;
        }

        let embedding = match client.embed(&embed_text(worker)).await {
            Ok(vector) => {
                debug!(id = %worker.id, dims = vector.len(), "embedded worker");
                Some(vector)
            }
            Err(err) => {
                warn!(id = %worker.id, error = %err, "failed to embed worker, continuing");
                failed.push(FailedEmbedding {
                    worker_id: worker.id.clone(),
                    reason: err.to_string(),
                });
                None
            }
        };

        embeddings.insert(
            worker.id.clone(),
            StoredEmbedding {
                worker: worker.name.clone(),
                embedding,
            },
        );
    }

    let embedded = workers.len() - failed.len();
    let file = EmbeddingFile {
        version: FILE_VERSION.to_string(),
        generated: clock.now(),
        model: client.model().to_string(),
        count: embeddings.len(),
        embeddings,
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| PrecomputeError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }
    let content = serde_json::to_string_pretty(&file)?;
    std::fs::write(path, content).map_err(|source| PrecomputeError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    info!(
        embedded,
        failed = failed.len(),
        path = %path.display(),
        "embedding precompute complete"
    );

    Ok(PrecomputeSummary {
        embedded,
        failed,
        path: path.to_path_buf(),
    })
}

// Rate-limit hint surfacing is exercised in provider tests; here we cover
// the batch loop's accumulate-and-continue behavior.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::test_clock::ManualClock;
    use crate::provider::test_server;
    use hive_core::EngineConfig;
    use tempfile::TempDir;

    fn make_worker(id: &str, name: &str) -> WorkerEntry {
        serde_json::from_str(&format!(
            r#"{{"id": "{id}", "name": "{name}", "category": "general"}}"#
        ))
        .unwrap()
    }

    fn t0() -> chrono::DateTime<chrono::Utc> {
        "2026-01-15T10:00:00Z".parse().unwrap()
    }

    #[tokio::test]
    async fn unconfigured_client_is_rejected() {
        let client = EmbeddingClient::from_config(&EngineConfig::default());
        let clock = ManualClock::starting_at(t0());
        let err = precompute_embeddings(
            &client,
            &[],
            Path::new("/tmp/unused.json"),
            Duration::ZERO,
            &*clock,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PrecomputeError::NotConfigured));
    }

    #[tokio::test]
    async fn batch_persists_full_map_with_metadata() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("registry/embeddings.json");

        let base = test_server::serve(vec![
            test_server::embedding_response(&[0.1, 0.2]),
            test_server::embedding_response(&[0.3, 0.4]),
        ])
        .await;
        let mut config = EngineConfig::default();
        config.provider_base_url = base;
        config.api_key = Some("test-key".to_string());

        let client = EmbeddingClient::from_config(&config);
        let workers = vec![make_worker("alpha", "Alpha"), make_worker("beta", "Beta")];
        let clock = ManualClock::starting_at(t0());

        let summary = precompute_embeddings(
            &client,
            &workers,
            &path,
            Duration::from_millis(1),
            &*clock,
        )
        .await
        .unwrap();

        assert_eq!(summary.embedded, 2);
        assert!(summary.failed.is_empty());

        let file: EmbeddingFile =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(file.count, 2);
        assert_eq!(file.model, config.embedding_model);
        assert_eq!(file.generated, t0());
        assert!(file.embeddings["alpha"].embedding.is_some());
        assert_eq!(file.embeddings["beta"].worker, "Beta");
    }

    #[tokio::test]
    async fn failures_accumulate_without_aborting() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("embeddings.json");

        let base = test_server::serve(vec![
            test_server::embedding_response(&[0.1, 0.2]),
            test_server::status_response(500, "Internal Server Error", "", "{\"error\":\"boom\"}"),
            test_server::embedding_response(&[0.5, 0.6]),
        ])
        .await;
        let mut config = EngineConfig::default();
        config.provider_base_url = base;
        config.api_key = Some("test-key".to_string());

        let client = EmbeddingClient::from_config(&config);
        let workers = vec![
            make_worker("alpha", "Alpha"),
            make_worker("broken", "Broken"),
            make_worker("gamma", "Gamma"),
        ];
        let clock = ManualClock::starting_at(t0());

        let summary = precompute_embeddings(
            &client,
            &workers,
            &path,
            Duration::from_millis(1),
            &*clock,
        )
        .await
        .unwrap();

        assert_eq!(summary.embedded, 2);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].worker_id, "broken");
        assert!(summary.failed[0].reason.contains("boom"));

        // The failed worker is still in the file, with a null embedding.
        let file: EmbeddingFile =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(file.count, 3);
        assert!(file.embeddings["broken"].embedding.is_none());
        assert!(file.embeddings["gamma"].embedding.is_some());
    }
}
