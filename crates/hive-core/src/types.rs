//! Core types for the worker discovery engine.
//!
//! The registry snapshot is produced by an external corpus scanner and is
//! read-only to this engine; field names follow the snapshot's camelCase
//! JSON convention.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Execution characteristics reported by the corpus scanner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Performance {
    /// Typical duration, as reported (e.g. "2m", "30s").
    #[serde(skip_serializing_if = "String::is_empty")]
    pub avg_duration: String,
    /// Whether results can be reused across invocations.
    pub cacheable: bool,
    /// Whether the worker can run alongside others.
    pub parallelizable: bool,
}

/// Provenance recorded by the corpus scanner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkerProvenance {
    /// Originating asset path or collection name.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub source: String,
    /// Registry version the worker first appeared in.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub added_version: String,
}

/// A discoverable reusable unit: task, template, script, checklist,
/// workflow, or data asset.
///
/// Invariants assumed from the producer:
/// - `id` is unique within a snapshot and matches `^[a-z0-9-]+$`
/// - `category` is always present
///
/// Tags are matched case-insensitively but displayed as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerEntry {
    /// Unique worker id (lowercase alphanumeric + hyphens).
    pub id: String,
    /// Human-readable display name.
    pub name: String,
    /// What the worker does.
    #[serde(default)]
    pub description: String,
    /// Top-level category (always present).
    pub category: String,
    /// Optional finer-grained grouping within the category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    /// Named inputs the worker consumes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<String>,
    /// Named outputs the worker produces.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<String>,
    /// Free-form tags, matched case-insensitively.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Path of the backing asset, relative to the corpus root.
    #[serde(default)]
    pub path: String,
    /// Task format of the backing asset (e.g. "markdown", "yaml").
    #[serde(default)]
    pub task_format: String,
    /// Executor kinds able to run this worker.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub executor_types: Vec<String>,
    /// Execution characteristics.
    #[serde(default)]
    pub performance: Performance,
    /// Agent personas this worker is associated with.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub agents: Vec<String>,
    /// Scanner provenance.
    #[serde(default)]
    pub metadata: WorkerProvenance,
}

impl WorkerEntry {
    /// True when any tag equals `tag` case-insensitively.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

/// Per-category summary carried in the snapshot header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CategorySummary {
    /// Number of workers in the category.
    pub count: usize,
    /// Subcategories present in the category.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subcategories: Vec<String>,
    /// One-line category description.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// The full registry corpus as of one scanner run.
///
/// Loaded read-only and replaced atomically on reload, never mutated in
/// place. Workers arrive ordered by category then name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySnapshot {
    /// Registry format version.
    pub version: String,
    /// When the scanner produced the snapshot.
    pub generated: DateTime<Utc>,
    /// Worker count as reported by the scanner.
    pub total_workers: usize,
    /// Per-category summaries.
    #[serde(default)]
    pub categories: BTreeMap<String, CategorySummary>,
    /// All workers, ordered by category then name.
    pub workers: Vec<WorkerEntry>,
}

/// Which field or strategy produced a result's score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchType {
    Id,
    Name,
    Tags,
    Description,
    Combined,
    Semantic,
    KeywordFallback,
    TagExact,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::Tags => "tags",
            Self::Description => "description",
            Self::Combined => "combined",
            Self::Semantic => "semantic",
            Self::KeywordFallback => "keyword-fallback",
            Self::TagExact => "tag-exact",
        }
    }
}

/// A ranked search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// The matched worker.
    #[serde(flatten)]
    pub worker: WorkerEntry,
    /// Relevance score in `0..=100`.
    pub score: u8,
    /// Field or strategy that produced the score.
    pub match_type: MatchType,
}

/// Search strategy requested by the caller.
///
/// When absent the orchestrator auto-detects: semantic when the provider
/// credential is available, keyword otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    Keyword,
    Semantic,
}

impl SearchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Keyword => "keyword",
            Self::Semantic => "semantic",
        }
    }
}

/// One persisted worker embedding.
///
/// `embedding: None` marks a worker that was scanned but never embedded;
/// search falls back to substring matching for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEmbedding {
    /// Display name of the worker, for human inspection of the file.
    pub worker: String,
    /// Embedding vector, or `None` when the worker has no embedding.
    pub embedding: Option<Vec<f32>>,
}

/// Persisted precomputed-embeddings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingFile {
    /// File format version.
    pub version: String,
    /// When the batch precompute completed.
    pub generated: DateTime<Utc>,
    /// Model that produced every vector in the file.
    pub model: String,
    /// Number of entries.
    pub count: usize,
    /// Worker id to stored embedding.
    pub embeddings: HashMap<String, StoredEmbedding>,
}
