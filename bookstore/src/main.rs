//! Bookstore runner binary.
//!
//! Seeds the configured collection with the sample catalogue, then runs the
//! query tour. Exits with status 1 if configuration or either phase fails.

use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};

use bookstore::{
    config::{BackendKind, BookstoreConfig, CONFIG_FILE_NAME, ConfigError},
    runner::run,
};
use bookstore_memory::InMemoryStore;
use clap::Parser;

#[derive(Parser)]
#[command(name = "bookstore")]
#[command(about = "Seed a book catalogue and run a tour of document queries")]
struct Args {
    /// Path to a TOML config file [default: ./bookstore.toml if present]
    #[arg(short, long, env = "BOOKSTORE_CONFIG")]
    config: Option<PathBuf>,

    /// Store backend
    #[arg(short, long, env = "BOOKSTORE_BACKEND", value_enum)]
    backend: Option<BackendKind>,

    /// MongoDB connection string
    #[arg(long, env = "BOOKSTORE_URI")]
    uri: Option<String>,

    /// Database name
    #[arg(long, env = "BOOKSTORE_DATABASE")]
    database: Option<String>,

    /// Collection name
    #[arg(long, env = "BOOKSTORE_COLLECTION")]
    collection: Option<String>,

    /// Books per page in the pagination task
    #[arg(long, env = "BOOKSTORE_PAGE_SIZE")]
    page_size: Option<usize>,
}

impl Args {
    /// `--config` if given, else `bookstore.toml` in `dir` when it exists.
    fn config_path(&self, dir: &Path) -> Option<PathBuf> {
        self.config.clone().or_else(|| {
            let fallback = dir.join(CONFIG_FILE_NAME);
            fallback.is_file().then_some(fallback)
        })
    }

    /// File (or defaults) first, then flags and environment on top.
    fn load_config(self, dir: &Path) -> Result<BookstoreConfig, ConfigError> {
        let mut config = match self.config_path(dir) {
            Some(path) => BookstoreConfig::from_file(&path)?,
            None => BookstoreConfig::default(),
        };

        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(uri) = self.uri {
            config.uri = uri;
        }
        if let Some(database) = self.database {
            config.database = database;
        }
        if let Some(collection) = self.collection {
            config.collection = collection;
        }
        if let Some(page_size) = self.page_size {
            config.page_size = page_size;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let config = match Args::parse().load_config(&dir) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        backend = ?config.backend,
        database = %config.database,
        collection = %config.collection,
        "Starting bookstore run"
    );

    let outcome = match config.backend {
        BackendKind::Memory => run(InMemoryStore::builder(), &config).await.map(drop),
        #[cfg(feature = "mongodb")]
        BackendKind::Mongodb => {
            let builder = bookstore_mongodb::MongoDbStore::builder(&config.uri, &config.database);
            run(builder, &config).await.map(drop)
        }
        #[cfg(not(feature = "mongodb"))]
        BackendKind::Mongodb => {
            tracing::error!("This build has no MongoDB support; use --backend memory");
            return ExitCode::FAILURE;
        }
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("bookstore").chain(args.iter().copied())).unwrap()
    }

    fn write_config(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn flags_override_file_values() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            "custom.toml",
            "database = \"from_file\"\ncollection = \"catalogue\"\npage_size = 3\n",
        );

        let config = parse(&[
            "--config",
            path.to_str().unwrap(),
            "--database",
            "from_flag",
            "--backend",
            "memory",
        ])
        .load_config(dir.path())
        .unwrap();

        assert_eq!(config.database, "from_flag");
        assert_eq!(config.backend, BackendKind::Memory);
        assert_eq!(config.collection, "catalogue");
        assert_eq!(config.page_size, 3);
    }

    #[test]
    fn falls_back_to_config_file_in_directory() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, CONFIG_FILE_NAME, "collection = \"shelf\"\n");

        let config = parse(&["--page-size", "4"]).load_config(dir.path()).unwrap();

        assert_eq!(config.collection, "shelf");
        assert_eq!(config.page_size, 4);
    }

    #[test]
    fn explicit_path_wins_over_directory_file() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, CONFIG_FILE_NAME, "collection = \"shelf\"\n");
        let explicit = write_config(&dir, "other.toml", "collection = \"archive\"\n");

        let config = parse(&["--config", explicit.to_str().unwrap()])
            .load_config(dir.path())
            .unwrap();

        assert_eq!(config.collection, "archive");
    }

    #[test]
    fn defaults_without_any_file() {
        let dir = TempDir::new().unwrap();

        let config = parse(&[]).load_config(dir.path()).unwrap();

        assert_eq!(config, BookstoreConfig::default());
    }

    #[test]
    fn invalid_override_is_rejected() {
        let dir = TempDir::new().unwrap();

        let result = parse(&["--page-size", "0"]).load_config(dir.path());

        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.toml");

        let result = parse(&["--config", missing.to_str().unwrap()]).load_config(dir.path());

        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
