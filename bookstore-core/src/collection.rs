//! Collection handles for document store operations.
//!
//! - [`Collection`] - Untyped collection with explicit BSON documents
//! - [`TypedCollection`] - Type-safe collection for a specific document type
//!
//! # Example
//!
//! ```ignore
//! # async fn example(store: &bookstore_core::store::DocumentStore<impl bookstore_core::backend::StoreBackend>) -> bookstore_core::error::DocumentStoreResult<()> {
//! let books = store.typed_collection::<Book>();
//! books.insert(sample_books()).await?;
//!
//! let fiction = books.query(Query::filtered(Filter::eq("genre", "Fiction"))).await?;
//! # Ok(()) }
//! ```

use bson::{Bson, Document as BsonDocument};
use std::marker::PhantomData;

use crate::{
    backend::{StoreBackend, UpdateOutcome},
    document::{Document, DocumentExt},
    error::DocumentStoreResult,
    index::IndexSpec,
    page::{Page, PaginationParams},
    pipeline::Pipeline,
    query::{Expr, Query, Sort},
};

/// An untyped collection with a reference to a storage backend.
///
/// All documents are represented as BSON values. Projections and aggregation
/// output, whose shape differs from any stored type, are read through this handle.
#[derive(Debug)]
pub struct Collection<'a, B: StoreBackend> {
    name: String,
    backend: &'a B,
}

impl<'a, B: StoreBackend> Collection<'a, B> {
    pub(crate) fn new(name: String, backend: &'a B) -> Self {
        Self { name, backend }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Inserts documents and returns how many were inserted.
    pub async fn insert(&self, documents: Vec<(bson::Uuid, Bson)>) -> DocumentStoreResult<u64> {
        self.backend
            .insert_documents(documents, self.name())
            .await
    }

    /// Sets `fields` on the first document matching `filter`.
    pub async fn update_one(
        &self,
        filter: Expr,
        fields: BsonDocument,
    ) -> DocumentStoreResult<UpdateOutcome> {
        self.backend
            .update_one(filter, fields, self.name())
            .await
    }

    /// Deletes the first document matching `filter`.
    pub async fn delete_one(&self, filter: Expr) -> DocumentStoreResult<u64> {
        self.backend.delete_one(filter, self.name()).await
    }

    /// Queries documents in the collection.
    pub async fn query(&self, query: Query) -> DocumentStoreResult<Vec<Bson>> {
        self.backend
            .query_documents(query, self.name())
            .await
    }

    /// Counts documents matching `filter`, or all of them.
    pub async fn count(&self, filter: Option<Expr>) -> DocumentStoreResult<u64> {
        self.backend
            .count_documents(filter, self.name())
            .await
    }

    /// Runs an aggregation pipeline over the collection.
    pub async fn aggregate(&self, pipeline: Pipeline) -> DocumentStoreResult<Vec<Bson>> {
        self.backend
            .aggregate(pipeline, self.name())
            .await
    }

    /// Creates an index and returns its name.
    pub async fn create_index(&self, index: IndexSpec) -> DocumentStoreResult<String> {
        self.backend
            .create_index(index, self.name())
            .await
    }

    /// Lists index names on the collection.
    pub async fn list_indexes(&self) -> DocumentStoreResult<Vec<String>> {
        self.backend.list_indexes(self.name()).await
    }

    /// Returns execution statistics for `query`.
    pub async fn explain(&self, query: Query) -> DocumentStoreResult<Bson> {
        self.backend
            .explain_query(query, self.name())
            .await
    }
}

/// A collection whose documents deserialize into `D`.
#[derive(Debug)]
pub struct TypedCollection<'a, B: StoreBackend, D: Document> {
    inner: Collection<'a, B>,
    _marker: PhantomData<D>,
}

impl<'a, B: StoreBackend, D: Document> TypedCollection<'a, B, D> {
    pub(crate) fn new(name: String, backend: &'a B) -> Self {
        Self { inner: Collection::new(name, backend), _marker: PhantomData }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Returns the untyped view of the same collection.
    pub fn untyped(&self) -> &Collection<'a, B> {
        &self.inner
    }

    /// Inserts documents and returns how many were inserted.
    ///
    /// # Errors
    ///
    /// Returns a [`DocumentStoreError`](crate::error::DocumentStoreError) if serialization or insertion fails.
    pub async fn insert(&self, documents: Vec<D>) -> DocumentStoreResult<u64> {
        self.inner
            .insert(
                documents
                    .into_iter()
                    .map(|d| {
                        d.to_bson()
                            .map(move |b| (d.id().clone(), b))
                    })
                    .collect::<DocumentStoreResult<Vec<_>>>()?,
            )
            .await
    }

    /// Queries documents and deserializes them into `D`.
    ///
    /// Queries with a projection should go through [`untyped`](Self::untyped),
    /// since projected documents rarely deserialize into `D`.
    pub async fn query(&self, query: Query) -> DocumentStoreResult<Vec<D>> {
        self.inner
            .query(query)
            .await?
            .into_iter()
            .map(D::from_bson)
            .collect::<DocumentStoreResult<Vec<D>>>()
    }

    /// Returns the first document matching `filter`.
    pub async fn find_one(&self, filter: Expr) -> DocumentStoreResult<Option<D>> {
        Ok(self
            .query(Query::builder().filter(filter).limit(1).build())
            .await?
            .into_iter()
            .next())
    }

    /// Fetches one page of documents, optionally filtered and sorted.
    ///
    /// The page's total count comes from a separate count with the same filter.
    pub async fn page(
        &self,
        params: PaginationParams,
        filter: Option<Expr>,
        sort: Option<Sort>,
    ) -> DocumentStoreResult<Page<D>> {
        let items = self
            .query(Query {
                filter: filter.clone(),
                projection: None,
                limit: Some(params.per_page),
                offset: Some(params.offset()),
                sort,
            })
            .await?;
        let count = self.inner.count(filter).await?;

        Ok(params.wrap(items, count as usize))
    }

    /// Counts documents matching `filter`, or all of them.
    pub async fn count(&self, filter: Option<Expr>) -> DocumentStoreResult<u64> {
        self.inner.count(filter).await
    }

    /// Sets `fields` on the first document matching `filter`.
    pub async fn update_one(
        &self,
        filter: Expr,
        fields: BsonDocument,
    ) -> DocumentStoreResult<UpdateOutcome> {
        self.inner.update_one(filter, fields).await
    }

    /// Deletes the first document matching `filter`.
    pub async fn delete_one(&self, filter: Expr) -> DocumentStoreResult<u64> {
        self.inner.delete_one(filter).await
    }
}
