//! Seeds a document store with a small book catalogue and runs a fixed tour of
//! queries against it.
//!
//! The run has two phases, each on its own connection:
//!
//! 1. **Seed** ([`seed`]) - drop the collection if it holds anything, insert
//!    twelve sample books, list them.
//! 2. **Query** ([`tasks`]) - filters, an update, a delete, projections, sorts,
//!    pagination, three aggregation pipelines, index creation and an explain plan.
//!
//! Storage goes through [`bookstore_core`]'s `StoreBackend`; the binary picks
//! the MongoDB backend or the in-memory one from [`config`].
//!
//! # Quick Start
//!
//! ```ignore
//! use bookstore::{config::BookstoreConfig, runner::run};
//! use bookstore_memory::InMemoryStore;
//!
//! let config = BookstoreConfig::default();
//! let report = run(InMemoryStore::builder(), &config).await?;
//! assert_eq!(report.seed.inserted, 12);
//! ```

pub mod books;
pub mod config;
pub mod error;
pub mod report;
pub mod runner;
pub mod seed;
pub mod tasks;

pub use books::{Book, sample_books};
pub use config::{BackendKind, BookstoreConfig};
pub use error::{RunnerError, RunnerResult};
pub use runner::{RunReport, run};
