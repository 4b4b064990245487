//! Main document store interface.
//!
//! [`DocumentStore`] owns one backend instance (one connection) and hands out
//! collection handles that borrow it.
//!
//! # Example
//!
//! ```ignore
//! let store = DocumentStore::new(backend);
//! let books = store.typed_collection::<Book>();
//! // ...
//! store.shutdown().await?;
//! ```

use crate::{
    backend::StoreBackend,
    collection::{Collection, TypedCollection},
    document::Document,
    error::DocumentStoreResult,
};

/// A document store bound to a specific backend implementation.
#[derive(Debug)]
pub struct DocumentStore<B: StoreBackend> {
    backend: B,
}

impl<B: StoreBackend> DocumentStore<B> {
    /// Creates a new document store with the given backend.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Gets a typed collection named by the document type's `collection_name()`.
    pub fn typed_collection<'a, D: Document>(&'a self) -> TypedCollection<'a, B, D> {
        TypedCollection::new(D::collection_name().to_string(), &self.backend)
    }

    /// Gets a typed collection under an explicit name.
    pub fn typed_collection_named<'a, D: Document>(&'a self, name: &str) -> TypedCollection<'a, B, D> {
        TypedCollection::new(name.to_string(), &self.backend)
    }

    /// Gets an untyped collection with the given name.
    pub fn collection<'a>(&'a self, name: &str) -> Collection<'a, B> {
        Collection::new(name.to_string(), &self.backend)
    }

    /// Creates a new collection with the given name.
    pub async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.backend
            .create_collection(name)
            .await
    }

    /// Drops a collection with the given name, including its documents and indexes.
    pub async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.backend.drop_collection(name).await
    }

    /// Lists all collections in the store.
    pub async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        self.backend.list_collections().await
    }

    /// Shuts down the backend, releasing its connection.
    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        self.backend.shutdown().await
    }
}
