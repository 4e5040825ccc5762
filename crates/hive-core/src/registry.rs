//! Registry snapshot loading and validation.
//!
//! The snapshot file is produced by an external scanner/validator. Parsing
//! here is strict about shape (malformed JSON is fatal) and about worker id
//! syntax, but deliberately does not enforce producer invariants like id
//! uniqueness — duplicate ids resolve last-write-wins downstream.

use crate::types::RegistrySnapshot;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error type for snapshot loading and validation.
///
/// All variants are fatal to the load that produced them; nothing here is
/// retried.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read registry snapshot {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse registry snapshot {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid worker id '{id}': {reason}")]
    InvalidWorkerId { id: String, reason: String },
    #[error("worker '{id}' has no category")]
    MissingCategory { id: String },
}

/// Validates a worker id against the registry slug pattern `^[a-z0-9-]+$`.
pub fn validate_worker_id(id: &str) -> Result<(), RegistryError> {
    if id.is_empty() {
        return Err(RegistryError::InvalidWorkerId {
            id: id.to_string(),
            reason: "id cannot be empty".to_string(),
        });
    }
    for c in id.chars() {
        if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' {
            return Err(RegistryError::InvalidWorkerId {
                id: id.to_string(),
                reason: format!(
                    "invalid character '{c}': only lowercase letters, numbers, and hyphens allowed"
                ),
            });
        }
    }
    Ok(())
}

/// Parses snapshot JSON and validates every worker entry.
pub fn parse_snapshot(content: &str, path: &Path) -> Result<RegistrySnapshot, RegistryError> {
    let snapshot: RegistrySnapshot =
        serde_json::from_str(content).map_err(|source| RegistryError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    for worker in &snapshot.workers {
        validate_worker_id(&worker.id)?;
        if worker.category.is_empty() {
            return Err(RegistryError::MissingCategory {
                id: worker.id.clone(),
            });
        }
    }

    Ok(snapshot)
}

/// Reads and parses a snapshot file.
pub fn load_snapshot(path: &Path) -> Result<RegistrySnapshot, RegistryError> {
    let content = std::fs::read_to_string(path).map_err(|source| RegistryError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_snapshot(&content, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_json(workers: &str) -> String {
        format!(
            r#"{{
                "version": "1.0.0",
                "generated": "2026-01-15T10:30:00Z",
                "totalWorkers": 2,
                "categories": {{
                    "data": {{"count": 2, "subcategories": ["transform"], "description": "Data workers"}}
                }},
                "workers": [{workers}]
            }}"#
        )
    }

    #[test]
    fn validate_worker_id_accepts_slugs() {
        assert!(validate_worker_id("json-csv-transformer").is_ok());
        assert!(validate_worker_id("a1b2").is_ok());
        assert!(validate_worker_id("x").is_ok());
    }

    #[test]
    fn validate_worker_id_rejects_empty() {
        let err = validate_worker_id("").unwrap_err();
        assert!(matches!(err, RegistryError::InvalidWorkerId { .. }));
    }

    #[test]
    fn validate_worker_id_rejects_uppercase_and_spaces() {
        assert!(validate_worker_id("Json-Transformer").is_err());
        assert!(validate_worker_id("json transformer").is_err());
        assert!(validate_worker_id("json_transformer").is_err());
    }

    #[test]
    fn parse_snapshot_basic() {
        let json = snapshot_json(
            r#"{"id": "json-csv-transformer", "name": "JSON to CSV", "category": "data"},
               {"id": "xml-parser", "name": "XML Parser", "category": "data"}"#,
        );
        let snapshot = parse_snapshot(&json, Path::new("workers.json")).unwrap();
        assert_eq!(snapshot.version, "1.0.0");
        assert_eq!(snapshot.total_workers, 2);
        assert_eq!(snapshot.workers.len(), 2);
        assert_eq!(snapshot.categories["data"].count, 2);
    }

    #[test]
    fn parse_snapshot_rejects_invalid_id() {
        let json = snapshot_json(r#"{"id": "BAD_ID", "name": "Bad", "category": "data"}"#);
        let err = parse_snapshot(&json, Path::new("workers.json")).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidWorkerId { .. }));
    }

    #[test]
    fn parse_snapshot_rejects_missing_category() {
        let json = snapshot_json(r#"{"id": "orphan", "name": "Orphan", "category": ""}"#);
        let err = parse_snapshot(&json, Path::new("workers.json")).unwrap_err();
        assert!(matches!(err, RegistryError::MissingCategory { .. }));
    }

    #[test]
    fn parse_snapshot_rejects_malformed_json() {
        let err = parse_snapshot("{not json", Path::new("workers.json")).unwrap_err();
        assert!(matches!(err, RegistryError::Parse { .. }));
    }

    #[test]
    fn load_snapshot_reports_missing_file() {
        let err = load_snapshot(Path::new("/nonexistent/workers.json")).unwrap_err();
        assert!(matches!(err, RegistryError::Read { .. }));
    }

    #[test]
    fn load_snapshot_reads_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("workers.json");
        std::fs::write(
            &path,
            snapshot_json(r#"{"id": "xml-parser", "name": "XML Parser", "category": "data"}"#),
        )
        .unwrap();
        let snapshot = load_snapshot(&path).unwrap();
        assert_eq!(snapshot.workers.len(), 1);
    }
}
