use async_trait::async_trait;
use futures::TryStreamExt;
use bson::{Document, Bson, Uuid, doc};
use mongodb::{
    Client, Collection as MongoCollection, Database, IndexModel,
    options::{ClientOptions, FindOptions, IndexOptions},
};
use bookstore_core::{
    backend::{StoreBackend, StoreBackendBuilder, UpdateOutcome},
    document::ID_FIELD,
    error::{DocumentStoreError, DocumentStoreResult},
    index::IndexSpec,
    pipeline::Pipeline,
    query::{Expr, Query},
};

use crate::{
    pipeline::translate_pipeline,
    query::{MongoQueryTranslator, projection_document, sort_document},
};


fn backend_error(error: mongodb::error::Error) -> DocumentStoreError {
    DocumentStoreError::Backend(error.to_string())
}

#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(uri: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(uri, database)
    }

    fn database(&self) -> Database {
        self.client.database(&self.database)
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.database().collection(collection_name)
    }

    /// Moves the record identifier into `_id`.
    fn prepare_document(&self, id: Uuid, document: Bson) -> DocumentStoreResult<Document> {
        let document = match document {
            Bson::Document(document) => document,
            _ => return Err(DocumentStoreError::InvalidDocument("Expected document".into())),
        };

        let mut prepared = doc! { "_id": id };
        prepared.extend(document.into_iter().filter(|(key, _)| key != ID_FIELD));

        Ok(prepared)
    }

    /// Renames `_id` back to the identifier field. Projections without it pass through.
    fn restore_document(&self, mut document: Document) -> Bson {
        match document.remove("_id") {
            Some(id) => {
                let mut restored = doc! { ID_FIELD: id };
                restored.extend(document);
                Bson::Document(restored)
            }
            None => Bson::Document(document),
        }
    }

    fn find_options(&self, query: &Query) -> FindOptions {
        let mut options = FindOptions::default();

        if let Some(limit) = query.limit {
            options.limit = Some(limit as i64);
        }
        if let Some(skip) = query.offset {
            options.skip = Some(skip as u64);
        }
        if let Some(sort) = &query.sort {
            options.sort = Some(sort_document(sort));
        }
        if let Some(projection) = &query.projection {
            options.projection = Some(projection_document(projection));
        }

        options
    }

    /// The `find` command equivalent to `query`, as sent inside `explain`.
    fn find_command(&self, query: &Query, collection: &str) -> DocumentStoreResult<Document> {
        let mut command = doc! {
            "find": collection,
            "filter": MongoQueryTranslator::translate_filter(query.filter.as_ref())?,
        };

        if let Some(sort) = &query.sort {
            command.insert("sort", sort_document(sort));
        }
        if let Some(projection) = &query.projection {
            command.insert("projection", projection_document(projection));
        }
        if let Some(skip) = query.offset {
            command.insert("skip", skip as i64);
        }
        if let Some(limit) = query.limit {
            command.insert("limit", limit as i64);
        }

        Ok(command)
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn insert_documents(&self, documents: Vec<(Uuid, Bson)>, collection: &str) -> DocumentStoreResult<u64> {
        if documents.is_empty() {
            return Ok(0);
        }

        let result = self.get_collection(collection)
            .insert_many(
                documents
                    .into_iter()
                    .map(|(id, doc)| self.prepare_document(id, doc))
                    .collect::<DocumentStoreResult<Vec<Document>>>()?,
            )
            .await
            .map_err(backend_error)?;

        Ok(result.inserted_ids.len() as u64)
    }

    async fn update_one(&self, filter: Expr, fields: Document, collection: &str) -> DocumentStoreResult<UpdateOutcome> {
        let filter = MongoQueryTranslator::translate(&filter)?;
        tracing::debug!(%filter, %fields, collection, "update_one");

        let result = self.get_collection(collection)
            .update_one(filter, doc! { "$set": fields })
            .await
            .map_err(backend_error)?;

        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    async fn delete_one(&self, filter: Expr, collection: &str) -> DocumentStoreResult<u64> {
        let filter = MongoQueryTranslator::translate(&filter)?;
        tracing::debug!(%filter, collection, "delete_one");

        Ok(
            self.get_collection(collection)
                .delete_one(filter)
                .await
                .map_err(backend_error)?
                .deleted_count
        )
    }

    async fn query_documents(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        let filter = MongoQueryTranslator::translate_filter(query.filter.as_ref())?;
        let options = self.find_options(&query);
        tracing::debug!(%filter, ?options, collection, "find");

        Ok(
            self.get_collection(collection)
                .find(filter)
                .with_options(options)
                .await
                .map_err(backend_error)?
                .try_collect::<Vec<Document>>()
                .await
                .map_err(backend_error)?
                .into_iter()
                .map(|doc| self.restore_document(doc))
                .collect()
        )
    }

    async fn count_documents(&self, filter: Option<Expr>, collection: &str) -> DocumentStoreResult<u64> {
        let filter = MongoQueryTranslator::translate_filter(filter.as_ref())?;

        self.get_collection(collection)
            .count_documents(filter)
            .await
            .map_err(backend_error)
    }

    async fn aggregate(&self, pipeline: Pipeline, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        let stages = translate_pipeline(&pipeline)?;
        tracing::debug!(?stages, collection, "aggregate");

        // Output keeps `_id`, which holds the group key.
        Ok(
            self.get_collection(collection)
                .aggregate(stages)
                .await
                .map_err(backend_error)?
                .try_collect::<Vec<Document>>()
                .await
                .map_err(backend_error)?
                .into_iter()
                .map(Bson::Document)
                .collect()
        )
    }

    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.database()
            .create_collection(name)
            .await
            .map_err(backend_error)?;

        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.get_collection(name)
            .drop()
            .await
            .map_err(backend_error)?;

        Ok(())
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        self.database()
            .list_collection_names()
            .await
            .map_err(backend_error)
    }

    async fn create_index(&self, index: IndexSpec, collection: &str) -> DocumentStoreResult<String> {
        if index.keys.is_empty() {
            return Err(DocumentStoreError::InvalidQuery("Index must have at least one key".to_string()));
        }

        let mut keys = Document::new();
        for (field, direction) in &index.keys {
            keys.insert(field.clone(), direction.as_i32());
        }

        Ok(
            self.get_collection(collection)
                .create_index(
                    IndexModel::builder()
                    .keys(keys)
                    .options(
                        IndexOptions::builder()
                        .unique(index.unique)
                        .build()
                    )
                    .build()
                )
                .await
                .map_err(backend_error)?
                .index_name
        )
    }

    async fn list_indexes(&self, collection: &str) -> DocumentStoreResult<Vec<String>> {
        self.get_collection(collection)
            .list_index_names()
            .await
            .map_err(backend_error)
    }

    async fn explain_query(&self, query: Query, collection: &str) -> DocumentStoreResult<Bson> {
        let command = doc! {
            "explain": self.find_command(&query, collection)?,
            "verbosity": "executionStats",
        };

        let mut response = self.database()
            .run_command(command)
            .await
            .map_err(backend_error)?;

        match response.remove("executionStats") {
            Some(stats @ Bson::Document(_)) => Ok(stats),
            _ => Err(DocumentStoreError::Backend(
                "explain response did not include executionStats".to_string(),
            )),
        }
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

/// Connects to a MongoDB deployment.
///
/// Each [`build`](StoreBackendBuilder::build) creates a new client and pings the
/// server, so an unreachable deployment fails here rather than on first use.
#[derive(Debug, Clone)]
pub struct MongoDbStoreBuilder {
    uri: String,
    database: String,
}

impl MongoDbStoreBuilder {
    pub fn new(uri: &str, database: &str) -> Self {
        Self {
            uri: uri.to_string(),
            database: database.to_string(),
        }
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let client = Client::with_options(
            ClientOptions::parse(&self.uri)
                .await
                .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?,
        )
        .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;

        let ping = client
            .database(&self.database)
            .run_command(doc! { "ping": 1 })
            .await;

        if let Err(e) = ping {
            client.shutdown().await;
            return Err(DocumentStoreError::Initialization(e.to_string()));
        }

        tracing::debug!(database = %self.database, "ping succeeded");

        Ok(MongoDbStore::new(client, self.database))
    }
}
