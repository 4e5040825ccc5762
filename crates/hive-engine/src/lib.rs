//! Worker discovery engine: an in-memory indexed registry with
//! multi-strategy ranked search.
//!
//! The registry snapshot is loaded through a TTL cache into four lookup
//! indexes; queries run through deterministic fuzzy keyword matching or
//! embedding-based semantic similarity, with graceful fallback when the
//! provider is unavailable.

pub mod cache;
pub mod engine;
pub mod keyword;
pub mod metrics;
pub mod orchestrator;
pub mod precompute;
pub mod provider;
pub mod related;
pub mod semantic;
pub mod store;

pub use engine::DiscoveryEngine;
pub use keyword::{fuzzy_match_score, levenshtein, Suggestion};
pub use orchestrator::{SearchError, SearchOptions};
pub use provider::EmbeddingError;
pub use related::{paginate, Page, RelatedWorker};
pub use semantic::cosine_similarity;
pub use store::{RegistryStore, StoreSearchFilter};
