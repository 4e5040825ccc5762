//! Engine configuration.
//!
//! Key=value config file format with quoting and `#` comments.
//! Precedence: explicit field assignment > config file > environment
//! credential > defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable holding the embedding provider credential.
pub const API_KEY_ENV: &str = "HIVE_API_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("invalid config line: {0}")]
    InvalidLine(String),
    #[error("invalid integer value for {key}: {value}")]
    InvalidInt { key: String, value: String },
}

/// Discovery engine configuration.
///
/// Every knob the engine consults lives here; nothing is read from the
/// environment at query time except the provider credential fallback.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Path to the registry snapshot file.
    pub registry_path: PathBuf,
    /// Path to the precomputed-embeddings file.
    pub embeddings_path: PathBuf,

    /// Registry cache TTL in milliseconds (default: 300000).
    pub registry_ttl_ms: u64,
    /// Embedding cache TTL in milliseconds, independent of the registry TTL
    /// (default: 300000).
    pub embedding_ttl_ms: u64,

    /// Hard deadline for a single embedding request in milliseconds
    /// (default: 10000).
    pub embed_timeout_ms: u64,
    /// Mandatory delay between batch precompute requests in milliseconds
    /// (default: 600).
    pub precompute_delay_ms: u64,
    /// Maximum workers embedded on the fly when no precomputed file exists
    /// (default: 50).
    pub max_inline_embeddings: usize,

    /// Embedding model identifier.
    pub embedding_model: String,
    /// Embedding provider base URL.
    pub provider_base_url: String,
    /// Provider credential. `None` disables semantic search.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            registry_path: PathBuf::from("registry/workers.json"),
            embeddings_path: PathBuf::from("registry/embeddings.json"),
            registry_ttl_ms: 300_000,
            embedding_ttl_ms: 300_000,
            embed_timeout_ms: 10_000,
            precompute_delay_ms: 600,
            max_inline_embeddings: 50,
            embedding_model: "text-embedding-3-small".to_string(),
            provider_base_url: "https://api.openai.com".to_string(),
            api_key: None,
        }
    }
}

impl EngineConfig {
    /// Load config from a file, merging with defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.load_file(path)?;
        Ok(config)
    }

    /// Load and merge values from a config file.
    pub fn load_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let content = std::fs::read_to_string(path)?;
        self.parse_content(&content)
    }

    /// Fill the provider credential from the environment when unset.
    pub fn apply_env(&mut self) {
        if self.api_key.is_none() {
            self.api_key = std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty());
        }
    }

    /// True when semantic search can be attempted.
    pub fn has_credential(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    pub fn registry_ttl(&self) -> Duration {
        Duration::from_millis(self.registry_ttl_ms)
    }

    pub fn embedding_ttl(&self) -> Duration {
        Duration::from_millis(self.embedding_ttl_ms)
    }

    pub fn embed_timeout(&self) -> Duration {
        Duration::from_millis(self.embed_timeout_ms)
    }

    pub fn precompute_delay(&self) -> Duration {
        Duration::from_millis(self.precompute_delay_ms)
    }

    /// Resolve relative paths against a workspace root.
    pub fn resolve_paths(&mut self, root: &Path) {
        if self.registry_path.is_relative() {
            self.registry_path = root.join(&self.registry_path);
        }
        if self.embeddings_path.is_relative() {
            self.embeddings_path = root.join(&self.embeddings_path);
        }
    }

    /// Parse config content (key=value format).
    fn parse_content(&mut self, content: &str) -> Result<(), ConfigError> {
        for line in content.lines() {
            let trimmed = line.trim();

            // Skip empty lines and comments
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(ConfigError::InvalidLine(line.to_string()));
            };

            let key = key.trim();
            let value = Self::unquote(value.trim());

            self.apply_value(key, &value)?;
        }
        Ok(())
    }

    /// Remove surrounding quotes from a value.
    fn unquote(value: &str) -> String {
        if value.len() >= 2
            && ((value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\'')))
        {
            return value[1..value.len() - 1].to_string();
        }
        value.to_string()
    }

    /// Apply a single config value.
    fn apply_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "registry_path" => self.registry_path = PathBuf::from(value),
            "embeddings_path" => self.embeddings_path = PathBuf::from(value),
            "registry_ttl_ms" => self.registry_ttl_ms = Self::parse_u64(key, value)?,
            "embedding_ttl_ms" => self.embedding_ttl_ms = Self::parse_u64(key, value)?,
            "embed_timeout_ms" => self.embed_timeout_ms = Self::parse_u64(key, value)?,
            "precompute_delay_ms" => self.precompute_delay_ms = Self::parse_u64(key, value)?,
            "max_inline_embeddings" => {
                self.max_inline_embeddings = Self::parse_u64(key, value)? as usize;
            }
            "embedding_model" => self.embedding_model = value.to_string(),
            "provider_base_url" => self.provider_base_url = value.to_string(),
            "api_key" => {
                self.api_key = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                };
            }
            _ => {
                // Warn but don't fail for unknown keys
                eprintln!("Warning: unknown config key: {key}");
            }
        }
        Ok(())
    }

    fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
        value.parse().map_err(|_| ConfigError::InvalidInt {
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = EngineConfig::default();
        assert_eq!(config.registry_ttl_ms, 300_000);
        assert_eq!(config.embedding_ttl_ms, 300_000);
        assert_eq!(config.embed_timeout_ms, 10_000);
        assert_eq!(config.precompute_delay_ms, 600);
        assert_eq!(config.max_inline_embeddings, 50);
        assert!(config.api_key.is_none());
        assert!(!config.has_credential());
    }

    #[test]
    fn parse_simple_config() {
        let mut config = EngineConfig::default();
        let content = r#"
registry_path="data/workers.json"
registry_ttl_ms=60000
embed_timeout_ms=5000
embedding_model=custom-embed-v2
"#;
        config.parse_content(content).unwrap();
        assert_eq!(config.registry_path, PathBuf::from("data/workers.json"));
        assert_eq!(config.registry_ttl_ms, 60_000);
        assert_eq!(config.embed_timeout_ms, 5_000);
        assert_eq!(config.embedding_model, "custom-embed-v2");
    }

    #[test]
    fn parse_rejects_bad_integer() {
        let mut config = EngineConfig::default();
        let result = config.parse_content("registry_ttl_ms=abc");
        assert!(matches!(result, Err(ConfigError::InvalidInt { .. })));
    }

    #[test]
    fn parse_rejects_line_without_equals() {
        let mut config = EngineConfig::default();
        let result = config.parse_content("just a line");
        assert!(matches!(result, Err(ConfigError::InvalidLine(_))));
    }

    #[test]
    fn unquote_removes_quotes() {
        assert_eq!(EngineConfig::unquote("\"hello\""), "hello");
        assert_eq!(EngineConfig::unquote("'world'"), "world");
        assert_eq!(EngineConfig::unquote("noquotes"), "noquotes");
    }

    #[test]
    fn empty_api_key_means_no_credential() {
        let mut config = EngineConfig::default();
        config.parse_content("api_key=").unwrap();
        assert!(!config.has_credential());
        config.parse_content("api_key=sk-test").unwrap();
        assert!(config.has_credential());
    }

    #[test]
    fn resolve_paths_joins_relative() {
        let mut config = EngineConfig::default();
        config.resolve_paths(Path::new("/workspace"));
        assert_eq!(
            config.registry_path,
            PathBuf::from("/workspace/registry/workers.json")
        );
    }

    #[test]
    fn durations_convert_from_millis() {
        let config = EngineConfig::default();
        assert_eq!(config.embed_timeout(), Duration::from_millis(10_000));
        assert_eq!(config.precompute_delay(), Duration::from_millis(600));
    }
}
