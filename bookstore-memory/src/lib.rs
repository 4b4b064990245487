//! In-memory document storage backend for the bookstore.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It uses async-aware read-write locks for concurrent access and serves as the
//! offline backend of the runner and the fixture for its tests.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Shared connections** - Every backend built from one builder sees the same data
//! - **Full query support** - Filtering, sorting, offset/limit and projection
//! - **Aggregation** - Group, match, sort, skip, limit and project stages
//! - **Query plans** - Synthetic execution statistics that reflect declared indexes
//!
//! # Quick Start
//!
//! ```ignore
//! use bookstore_core::{backend::StoreBackendBuilder, store::DocumentStore};
//! use bookstore_memory::InMemoryStore;
//!
//! let backend = InMemoryStore::builder().build().await?;
//! let store = DocumentStore::new(backend);
//! let books = store.typed_collection::<Book>();
//! books.insert(sample_books()).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as bookstore_memory;

mod aggregate;
mod evaluator;
pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
