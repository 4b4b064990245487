//! In-memory storage implementation for document stores.
//!
//! Documents are kept per collection in insertion order, which doubles as the
//! natural order reads return when no sort is given. Index definitions are
//! recorded so that index listings and query plans mirror what a server would
//! report, but lookups always scan.

use std::{collections::HashMap, sync::Arc};
use async_trait::async_trait;
use mea::rwlock::RwLock;
use bson::{doc, Bson, Document as BsonDocument, Uuid};

use bookstore_core::{
    backend::{StoreBackend, StoreBackendBuilder, UpdateOutcome},
    error::{DocumentStoreError, DocumentStoreResult},
    index::IndexSpec,
    pipeline::Pipeline,
    query::{Expr, Projection, Query},
};

use crate::{
    aggregate::{run_pipeline, sort_documents},
    evaluator::{equality_fields, DocumentEvaluator},
};

const ID_INDEX_NAME: &str = "_id_";

#[derive(Debug, Default)]
struct CollectionData {
    documents: Vec<(Uuid, Bson)>,
    indexes: Vec<IndexSpec>,
}

impl CollectionData {
    fn filtered(&self, filter: Option<&Expr>) -> DocumentStoreResult<Vec<Bson>> {
        let mut matched = Vec::new();

        for (_, document) in &self.documents {
            let keep = match filter {
                Some(expr) => DocumentEvaluator::matches(document, expr)?,
                None => true,
            };
            if keep {
                matched.push(document.clone());
            }
        }

        Ok(matched)
    }

    fn position(&self, filter: &Expr) -> DocumentStoreResult<Option<usize>> {
        for (index, (_, document)) in self.documents.iter().enumerate() {
            if DocumentEvaluator::matches(document, filter)? {
                return Ok(Some(index));
            }
        }

        Ok(None)
    }

    /// The first index whose leading field is pinned by an equality in `filter`.
    fn usable_index(&self, filter: Option<&Expr>) -> Option<&IndexSpec> {
        let pinned = filter.map(equality_fields).unwrap_or_default();

        self.indexes.iter().find(|index| {
            index
                .leading_field()
                .map(|field| pinned.contains(&field))
                .unwrap_or(false)
        })
    }
}

type StoreMap = HashMap<String, CollectionData>;

/// Runs filter, sort, offset, limit and projection over one collection.
fn execute(data: &CollectionData, query: &Query) -> DocumentStoreResult<Vec<Bson>> {
    let mut documents = data.filtered(query.filter.as_ref())?;

    if let Some(sort) = &query.sort {
        sort_documents(&mut documents, sort);
    }

    let documents = documents
        .into_iter()
        .skip(query.offset.unwrap_or(0))
        .take(query.limit.unwrap_or(usize::MAX));

    Ok(match &query.projection {
        Some(projection) => documents.map(|doc| project(doc, projection)).collect(),
        None => documents.collect(),
    })
}

fn project(document: Bson, projection: &Projection) -> Bson {
    match document {
        Bson::Document(source) => {
            let mut projected = BsonDocument::new();
            for field in &projection.fields {
                if let Some(value) = source.get(field) {
                    projected.insert(field.clone(), value.clone());
                }
            }
            Bson::Document(projected)
        },
        other => other,
    }
}


/// Thread-safe in-memory document storage backend.
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state;
/// clones share the same data. Shutting a clone down leaves the data in place,
/// so a later connection built from the same [`InMemoryStoreBuilder`] sees
/// everything written before.
///
/// # Example
///
/// ```ignore
/// use bookstore_memory::InMemoryStore;
/// use bookstore_core::backend::{StoreBackend, StoreBackendBuilder};
/// use bson::{Uuid, Bson, doc};
///
/// let store = InMemoryStore::builder().build().await?;
/// let doc = Bson::Document(doc! { "title": "1984", "price": 10.99 });
/// store.insert_documents(vec![(Uuid::new(), doc)], "books").await?;
/// assert_eq!(store.count_documents(None, "books").await?, 1);
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> documents and index definitions
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    /// Creates a builder over a fresh, empty store.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }
}


#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn insert_documents(&self, documents: Vec<(Uuid, Bson)>, collection: &str) -> DocumentStoreResult<u64> {
        let mut store = self.store.write().await;
        let data = store
            .entry(collection.to_string())
            .or_default();

        let mut inserted = 0;

        for (id, doc) in documents {
            if doc.as_document().is_none() {
                return Err(DocumentStoreError::InvalidDocument(format!(
                    "Document {} is not a BSON document",
                    id
                )));
            }

            if data.documents.iter().any(|(existing, _)| *existing == id) {
                return Err(DocumentStoreError::DocumentAlreadyExists(id.to_string(), collection.to_string()));
            }

            data.documents.push((id, doc));
            inserted += 1;
        }

        tracing::debug!(collection, inserted, "inserted documents");

        Ok(inserted)
    }

    async fn update_one(&self, filter: Expr, fields: BsonDocument, collection: &str) -> DocumentStoreResult<UpdateOutcome> {
        let mut store = self.store.write().await;
        let data = match store.get_mut(collection) {
            Some(data) => data,
            None => return Ok(UpdateOutcome::default()),
        };

        let index = match data.position(&filter)? {
            Some(index) => index,
            None => return Ok(UpdateOutcome::default()),
        };

        let document = data.documents[index]
            .1
            .as_document_mut()
            .ok_or_else(|| DocumentStoreError::InvalidDocument("Expected document".into()))?;

        let mut changed = false;
        for (key, value) in fields {
            if document.get(&key) != Some(&value) {
                document.insert(key, value);
                changed = true;
            }
        }

        Ok(UpdateOutcome { matched: 1, modified: changed as u64 })
    }

    async fn delete_one(&self, filter: Expr, collection: &str) -> DocumentStoreResult<u64> {
        let mut store = self.store.write().await;
        let data = match store.get_mut(collection) {
            Some(data) => data,
            None => return Ok(0),
        };

        match data.position(&filter)? {
            Some(index) => {
                data.documents.remove(index);
                Ok(1)
            },
            None => Ok(0),
        }
    }

    async fn query_documents(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        let store = self.store.read().await;

        match store.get(collection) {
            Some(data) => execute(data, &query),
            None => Ok(vec![]),
        }
    }

    async fn count_documents(&self, filter: Option<Expr>, collection: &str) -> DocumentStoreResult<u64> {
        let store = self.store.read().await;

        match store.get(collection) {
            Some(data) => Ok(data.filtered(filter.as_ref())?.len() as u64),
            None => Ok(0),
        }
    }

    async fn aggregate(&self, pipeline: Pipeline, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        let documents = {
            let store = self.store.read().await;
            match store.get(collection) {
                Some(data) => data.filtered(None)?,
                None => return Ok(vec![]),
            }
        };

        run_pipeline(documents, &pipeline)
    }

    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.store
            .write()
            .await
            .entry(name.to_string())
            .or_default();

        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        if self.store.write().await.remove(name).is_none() {
            tracing::debug!(collection = name, "drop of missing collection ignored");
        }

        Ok(())
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        let mut names = self.store
            .read()
            .await
            .keys()
            .cloned()
            .collect::<Vec<_>>();
        names.sort();

        Ok(names)
    }

    async fn create_index(&self, index: IndexSpec, collection: &str) -> DocumentStoreResult<String> {
        if index.keys.is_empty() {
            return Err(DocumentStoreError::InvalidQuery("Index must have at least one key".to_string()));
        }

        let mut store = self.store.write().await;
        let data = store
            .entry(collection.to_string())
            .or_default();
        let name = index.name();

        match data.indexes.iter().find(|existing| existing.name() == name) {
            Some(existing) if existing.unique != index.unique => {
                return Err(DocumentStoreError::Backend(format!(
                    "Index {} already exists with different options",
                    name
                )));
            },
            Some(_) => {},
            None => data.indexes.push(index),
        }

        Ok(name)
    }

    async fn list_indexes(&self, collection: &str) -> DocumentStoreResult<Vec<String>> {
        let store = self.store.read().await;
        let data = store
            .get(collection)
            .ok_or_else(|| DocumentStoreError::CollectionNotFound(collection.to_string()))?;

        Ok(
            std::iter::once(ID_INDEX_NAME.to_string())
                .chain(data.indexes.iter().map(IndexSpec::name))
                .collect()
        )
    }

    async fn explain_query(&self, query: Query, collection: &str) -> DocumentStoreResult<Bson> {
        let store = self.store.read().await;
        let empty = CollectionData::default();
        let data = store.get(collection).unwrap_or(&empty);

        let returned = execute(data, &query)?.len() as i64;
        let (execution_stages, keys_examined, docs_examined) = match data.usable_index(query.filter.as_ref()) {
            Some(index) => {
                let field = index.leading_field().unwrap_or_default();
                let keys = data
                    .documents
                    .iter()
                    .filter(|(_, document)| {
                        equality_matches(document, field, query.filter.as_ref())
                    })
                    .count() as i64;

                (
                    doc! {
                        "stage": "FETCH",
                        "inputStage": {
                            "stage": "IXSCAN",
                            "indexName": index.name(),
                            "keysExamined": keys,
                        },
                    },
                    keys,
                    keys,
                )
            },
            None => (
                doc! { "stage": "COLLSCAN", "docsExamined": data.documents.len() as i64 },
                0,
                data.documents.len() as i64,
            ),
        };

        Ok(Bson::Document(doc! {
            "executionSuccess": true,
            "nReturned": returned,
            "executionTimeMillis": 0_i64,
            "totalKeysExamined": keys_examined,
            "totalDocsExamined": docs_examined,
            "executionStages": execution_stages,
        }))
    }
}

/// Whether `document` satisfies every equality on `field` found in `filter`.
fn equality_matches(document: &Bson, field: &str, filter: Option<&Expr>) -> bool {
    fn collect<'e>(expr: &'e Expr, field: &str, out: &mut Vec<&'e Expr>) {
        match expr {
            Expr::Field { field: name, .. } if name == field => out.push(expr),
            Expr::And(exprs) => exprs.iter().for_each(|e| collect(e, field, out)),
            _ => {},
        }
    }

    let mut clauses = Vec::new();
    if let Some(expr) = filter {
        collect(expr, field, &mut clauses);
    }

    clauses
        .into_iter()
        .all(|clause| DocumentEvaluator::matches(document, clause).unwrap_or(false))
}


/// Builder for [`InMemoryStore`] connections.
///
/// Every backend built from one builder, or from its clones, shares the same
/// data, the way separate connections to one server do.
///
/// # Example
///
/// ```ignore
/// use bookstore_memory::InMemoryStore;
/// use bookstore_core::backend::StoreBackendBuilder;
///
/// let builder = InMemoryStore::builder();
/// let first = builder.clone().build().await?;
/// let second = builder.build().await?;
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStoreBuilder {
    store: InMemoryStore,
}

impl From<InMemoryStore> for InMemoryStoreBuilder {
    fn from(store: InMemoryStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    /// Returns a handle onto the builder's shared store. Always succeeds.
    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(self.store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookstore_core::{
        pipeline::{Accumulator, Operand},
        query::{Filter, SortDirection},
    };

    fn book(title: &str, genre: &str, year: i32, price: f64) -> (Uuid, Bson) {
        (
            Uuid::new(),
            Bson::Document(doc! {
                "title": title,
                "genre": genre,
                "published_year": year,
                "price": price,
            }),
        )
    }

    async fn seeded() -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .insert_documents(
                vec![
                    book("1984", "Dystopian", 1949, 10.99),
                    book("To Kill a Mockingbird", "Fiction", 1960, 12.99),
                    book("Brave New World", "Dystopian", 1932, 11.50),
                    book("The Alchemist", "Fiction", 1988, 10.99),
                ],
                "books",
            )
            .await
            .unwrap();
        store
    }

    fn titles(docs: &[Bson]) -> Vec<&str> {
        docs.iter()
            .map(|d| d.as_document().unwrap().get_str("title").unwrap())
            .collect()
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected() {
        let store = InMemoryStore::new();
        let entry = book("1984", "Dystopian", 1949, 10.99);

        store.insert_documents(vec![entry.clone()], "books").await.unwrap();
        let err = store.insert_documents(vec![entry], "books").await.unwrap_err();

        assert!(matches!(err, DocumentStoreError::DocumentAlreadyExists(_, _)));
    }

    #[tokio::test]
    async fn query_sorts_then_pages_then_projects() {
        let store = seeded().await;
        let query = Query::builder()
            .sort("price", SortDirection::Asc)
            .offset(1)
            .limit(2)
            .projection(Projection::include(["title"]))
            .build();

        let docs = store.query_documents(query, "books").await.unwrap();

        assert_eq!(titles(&docs), vec!["The Alchemist", "Brave New World"]);
        assert_eq!(docs[0].as_document().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unsorted_reads_keep_insertion_order() {
        let store = seeded().await;

        let docs = store
            .query_documents(Query::filtered(Filter::eq("genre", "Fiction")), "books")
            .await
            .unwrap();

        assert_eq!(titles(&docs), vec!["To Kill a Mockingbird", "The Alchemist"]);
    }

    #[tokio::test]
    async fn update_one_touches_only_the_first_match() {
        let store = seeded().await;

        let outcome = store
            .update_one(Filter::eq("price", 10.99), doc! { "price": 9.99 }, "books")
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome { matched: 1, modified: 1 });

        let cheap = store
            .count_documents(Some(Filter::eq("price", 9.99)), "books")
            .await
            .unwrap();
        assert_eq!(cheap, 1);

        let repeat = store
            .update_one(Filter::eq("title", "1984"), doc! { "price": 9.99 }, "books")
            .await
            .unwrap();
        assert_eq!(repeat, UpdateOutcome { matched: 1, modified: 0 });
    }

    #[tokio::test]
    async fn update_and_delete_without_match_report_zero() {
        let store = seeded().await;

        let outcome = store
            .update_one(Filter::eq("title", "Missing"), doc! { "price": 1.0 }, "books")
            .await
            .unwrap();
        let deleted = store.delete_one(Filter::eq("title", "Missing"), "books").await.unwrap();

        assert_eq!(outcome, UpdateOutcome::default());
        assert_eq!(deleted, 0);
        assert_eq!(store.count_documents(None, "books").await.unwrap(), 4);
    }

    #[tokio::test]
    async fn delete_one_removes_a_single_document() {
        let store = seeded().await;

        let deleted = store.delete_one(Filter::eq("genre", "Dystopian"), "books").await.unwrap();

        assert_eq!(deleted, 1);
        assert_eq!(
            store.count_documents(Some(Filter::eq("genre", "Dystopian")), "books").await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn drop_removes_documents_and_indexes() {
        let store = seeded().await;
        store.create_index(IndexSpec::single("title"), "books").await.unwrap();

        store.drop_collection("books").await.unwrap();
        store.drop_collection("books").await.unwrap();

        assert_eq!(store.count_documents(None, "books").await.unwrap(), 0);
        assert!(store.list_collections().await.unwrap().is_empty());
        assert!(matches!(
            store.list_indexes("books").await.unwrap_err(),
            DocumentStoreError::CollectionNotFound(_)
        ));
    }

    #[tokio::test]
    async fn index_creation_is_idempotent() {
        let store = seeded().await;

        let first = store.create_index(IndexSpec::single("title"), "books").await.unwrap();
        let again = store.create_index(IndexSpec::single("title"), "books").await.unwrap();
        let compound = store
            .create_index(IndexSpec::compound(["genre", "published_year"]), "books")
            .await
            .unwrap();

        assert_eq!(first, again);
        assert_eq!(compound, "genre_1_published_year_1");
        assert_eq!(
            store.list_indexes("books").await.unwrap(),
            vec!["_id_", "title_1", "genre_1_published_year_1"]
        );
    }

    #[tokio::test]
    async fn explain_reports_index_scan_only_when_indexed() {
        let store = seeded().await;
        let query = Query::filtered(Filter::eq("title", "1984"));

        let before = store.explain_query(query.clone(), "books").await.unwrap();
        let before = before.as_document().unwrap();
        assert_eq!(before.get_document("executionStages").unwrap().get_str("stage").unwrap(), "COLLSCAN");
        assert_eq!(before.get_i64("totalDocsExamined").unwrap(), 4);

        store.create_index(IndexSpec::single("title"), "books").await.unwrap();

        let after = store.explain_query(query, "books").await.unwrap();
        let after = after.as_document().unwrap();
        let input = after
            .get_document("executionStages")
            .unwrap()
            .get_document("inputStage")
            .unwrap();
        assert_eq!(input.get_str("stage").unwrap(), "IXSCAN");
        assert_eq!(input.get_str("indexName").unwrap(), "title_1");
        assert_eq!(after.get_i64("nReturned").unwrap(), 1);
        assert_eq!(after.get_i64("totalDocsExamined").unwrap(), 1);
        assert!(after.get_bool("executionSuccess").unwrap());
    }

    #[tokio::test]
    async fn aggregate_groups_stored_documents() {
        let store = seeded().await;
        let pipeline = Pipeline::builder()
            .group(Operand::field("genre"), [("count", Accumulator::count())])
            .build();

        let out = store.aggregate(pipeline, "books").await.unwrap();

        assert_eq!(
            out,
            vec![
                Bson::Document(doc! { "_id": "Dystopian", "count": 2 }),
                Bson::Document(doc! { "_id": "Fiction", "count": 2 }),
            ]
        );
    }

    #[tokio::test]
    async fn builders_share_one_store() {
        let builder = InMemoryStore::builder();

        let first = builder.clone().build().await.unwrap();
        first
            .insert_documents(vec![book("1984", "Dystopian", 1949, 10.99)], "books")
            .await
            .unwrap();
        first.shutdown().await.unwrap();

        let second = builder.build().await.unwrap();
        assert_eq!(second.count_documents(None, "books").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn missing_collection_reads_as_empty() {
        let store = InMemoryStore::new();

        assert!(store.query_documents(Query::new(), "books").await.unwrap().is_empty());
        assert_eq!(store.count_documents(None, "books").await.unwrap(), 0);
        assert!(store.aggregate(Pipeline::builder().build(), "books").await.unwrap().is_empty());
    }
}
