//! Storage backend abstraction for the document store.
//!
//! The [`StoreBackend`] trait provides a unified async interface for every
//! operation the bookstore runner issues: bulk insertion, single-document
//! update and delete, filtered reads, counts, aggregation pipelines, collection
//! and index administration, and query-plan introspection.
//!
//! # Examples
//!
//! ```ignore
//! use bookstore_core::backend::StoreBackend;
//! use bson::{Uuid, Bson, doc};
//!
//! let id = Uuid::new();
//! let doc = Bson::Document(doc! { "title": "1984", "price": 10.99 });
//! backend.insert_documents(vec![(id, doc)], "books").await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use bson::{Bson, Document as BsonDocument, Uuid};
use std::fmt::Debug;

use crate::{
    error::DocumentStoreResult,
    index::IndexSpec,
    pipeline::Pipeline,
    query::{Expr, Query},
};

/// Outcome of a single-document update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Documents that matched the filter (0 or 1).
    pub matched: u64,
    /// Documents whose content changed (0 or 1).
    pub modified: u64,
}

/// Abstract interface for document storage backends.
///
/// # Thread Safety
///
/// All implementations must be thread-safe (`Send + Sync`).
///
/// # Error Handling
///
/// Operations return [`DocumentStoreResult<T>`](crate::error::DocumentStoreResult).
/// Connection problems surface from the [`StoreBackendBuilder`] as
/// [`Initialization`](crate::error::DocumentStoreError::Initialization); failures of
/// individual operations surface as [`Backend`](crate::error::DocumentStoreError::Backend).
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Inserts new documents into a collection, creating the collection if needed.
    ///
    /// # Arguments
    ///
    /// * `documents` - (id, BSON document) pairs, inserted in order
    /// * `collection` - The name of the collection to insert into
    ///
    /// # Returns
    ///
    /// The number of documents inserted.
    async fn insert_documents(
        &self,
        documents: Vec<(Uuid, Bson)>,
        collection: &str,
    ) -> DocumentStoreResult<u64>;

    /// Sets the given fields on the first document matching `filter`.
    ///
    /// Fields not named in `fields` are left untouched.
    async fn update_one(
        &self,
        filter: Expr,
        fields: BsonDocument,
        collection: &str,
    ) -> DocumentStoreResult<UpdateOutcome>;

    /// Deletes the first document matching `filter`.
    ///
    /// # Returns
    ///
    /// The number of documents deleted (0 or 1).
    async fn delete_one(&self, filter: Expr, collection: &str) -> DocumentStoreResult<u64>;

    /// Queries documents using filters, projection, sorting and pagination.
    ///
    /// A missing collection yields an empty result.
    async fn query_documents(
        &self,
        query: Query,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>>;

    /// Counts documents matching `filter`, or all documents when `None`.
    async fn count_documents(
        &self,
        filter: Option<Expr>,
        collection: &str,
    ) -> DocumentStoreResult<u64>;

    /// Runs an aggregation pipeline and returns its output documents.
    async fn aggregate(
        &self,
        pipeline: Pipeline,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>>;

    /// Creates an empty collection.
    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()>;

    /// Drops a collection together with its documents and indexes.
    ///
    /// Dropping a collection that does not exist is not an error.
    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()>;

    /// Lists the names of all collections in the store.
    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>>;

    /// Creates an index and returns its name.
    ///
    /// Creating an index that already exists with the same keys is a no-op.
    async fn create_index(&self, index: IndexSpec, collection: &str) -> DocumentStoreResult<String>;

    /// Lists index names on a collection, including the identifier index `_id_`.
    async fn list_indexes(&self, collection: &str) -> DocumentStoreResult<Vec<String>>;

    /// Explains how the store executes `query`, returning execution statistics.
    async fn explain_query(&self, query: Query, collection: &str) -> DocumentStoreResult<Bson>;

    /// Cleanly shuts down the backend, releasing connections.
    ///
    /// The default implementation is a no-op.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// Factory for backend instances.
///
/// Each call to [`build`](StoreBackendBuilder::build) acquires a fresh
/// connection; the runner builds one backend per phase and shuts it down when
/// the phase ends.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
