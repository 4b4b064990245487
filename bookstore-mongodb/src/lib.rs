//! MongoDB backend implementation for the bookstore.
//!
//! This crate provides a MongoDB-based implementation of the `StoreBackend` trait.
//! Filters and aggregation pipelines are translated into MongoDB's own query
//! language and executed server-side by the official async driver.
//!
//! # Features
//!
//! - **Persistent storage** - Data lives in a self-hosted or managed MongoDB deployment
//! - **Server-side queries** - Filtering, sorting, projection and paging run on the server
//! - **Aggregation** - Pipelines are sent as native `$group`/`$sort`/`$project` stages
//! - **Indexing and plans** - Index creation, listing and `explain` execution statistics
//!
//! # Connection
//!
//! The builder takes a connection string and a database name. Building pings the
//! server, so connection failures surface as
//! [`Initialization`](bookstore_core::error::DocumentStoreError::Initialization) errors.
//!
//! # Example
//!
//! ```ignore
//! use bookstore_core::backend::StoreBackendBuilder;
//! use bookstore_mongodb::MongoDbStore;
//!
//! let store = MongoDbStore::builder("mongodb://localhost:27017", "plp_bookstore")
//!     .build()
//!     .await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as bookstore_mongodb;

mod pipeline;
mod query;
pub mod store;

pub use store::{MongoDbStore, MongoDbStoreBuilder};
