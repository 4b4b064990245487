//! Runner configuration via an optional `bookstore.toml`.
//!
//! The binary reads the file named by `--config`, or `bookstore.toml` in the
//! working directory when it exists. Every field has a default, so an empty
//! file (or no file at all) reproduces the stock run: a local MongoDB server,
//! database `plp_bookstore`, collection `books`, five books per page.
//! Command-line flags and `BOOKSTORE_*` environment variables override the file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config file name.
pub const CONFIG_FILE_NAME: &str = "bookstore.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Which store the runner talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// A MongoDB deployment reached through `uri`.
    #[default]
    Mongodb,
    /// A process-local store; nothing persists after exit.
    Memory,
}

/// Runner configuration loaded from `bookstore.toml`.
///
/// # Example
///
/// ```toml
/// backend = "mongodb"
/// uri = "mongodb://localhost:27017"
/// database = "plp_bookstore"
/// collection = "books"
/// page_size = 5
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookstoreConfig {
    #[serde(default)]
    pub backend: BackendKind,
    /// MongoDB connection string. Ignored by the memory backend.
    #[serde(default = "default_uri")]
    pub uri: String,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    /// Books per page in the pagination task.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_uri() -> String {
    "mongodb://localhost:27017".to_string()
}

fn default_database() -> String {
    "plp_bookstore".to_string()
}

fn default_collection() -> String {
    "books".to_string()
}

fn default_page_size() -> usize {
    5
}

impl Default for BookstoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            uri: default_uri(),
            database: default_database(),
            collection: default_collection(),
            page_size: default_page_size(),
        }
    }
}

impl BookstoreConfig {
    /// Checks values that parse but cannot run.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for empty names, an empty URI with the
    /// MongoDB backend, or a zero page size.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.trim().is_empty() {
            return Err(ConfigError::Invalid("database name must not be empty".to_string()));
        }
        if self.collection.trim().is_empty() {
            return Err(ConfigError::Invalid("collection name must not be empty".to_string()));
        }
        if self.backend == BackendKind::Mongodb && self.uri.trim().is_empty() {
            return Err(ConfigError::Invalid("uri must not be empty for the mongodb backend".to_string()));
        }
        if self.page_size == 0 {
            return Err(ConfigError::Invalid("page_size must be at least 1".to_string()));
        }

        Ok(())
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: BookstoreConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_stock_run() {
        let config = BookstoreConfig::default();

        assert_eq!(config.backend, BackendKind::Mongodb);
        assert_eq!(config.uri, "mongodb://localhost:27017");
        assert_eq!(config.database, "plp_bookstore");
        assert_eq!(config.collection, "books");
        assert_eq!(config.page_size, 5);
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config: BookstoreConfig = toml::from_str("").unwrap();
        assert_eq!(config, BookstoreConfig::default());
    }

    #[test]
    fn parse_memory_backend() {
        let config: BookstoreConfig = toml::from_str("backend = \"memory\"\npage_size = 3").unwrap();
        assert_eq!(config.backend, BackendKind::Memory);
        assert_eq!(config.page_size, 3);
    }

    #[test]
    fn unknown_backend_fails_to_parse() {
        assert!(toml::from_str::<BookstoreConfig>("backend = \"sqlite\"").is_err());
    }

    #[test]
    fn zero_page_size_is_invalid() {
        let config = BookstoreConfig { page_size: 0, ..BookstoreConfig::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn empty_uri_only_matters_for_mongodb() {
        let mongo = BookstoreConfig { uri: String::new(), ..BookstoreConfig::default() };
        let memory = BookstoreConfig { backend: BackendKind::Memory, ..mongo.clone() };

        assert!(mongo.validate().is_err());
        assert!(memory.validate().is_ok());
    }

    #[test]
    fn from_file_reads_overrides() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "database = \"bookstore_test\"\ncollection = \"catalogue\"\n").unwrap();

        let config = BookstoreConfig::from_file(&path).unwrap();

        assert_eq!(config.database, "bookstore_test");
        assert_eq!(config.collection, "catalogue");
        assert_eq!(config.uri, "mongodb://localhost:27017");
    }

    #[test]
    fn from_file_reports_missing_and_malformed_files() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.toml");
        let malformed = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&malformed, "page_size = \"five\"").unwrap();

        assert!(matches!(BookstoreConfig::from_file(&missing), Err(ConfigError::Read { .. })));
        assert!(matches!(BookstoreConfig::from_file(&malformed), Err(ConfigError::Parse { .. })));
    }
}
