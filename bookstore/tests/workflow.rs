use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use bson::{Bson, Document as BsonDocument, Uuid};

use bookstore::{
    Book, BookstoreConfig, RunnerError, run, sample_books,
    runner::{query_phase, seed_phase},
};
use bookstore_core::{
    backend::{StoreBackend, StoreBackendBuilder, UpdateOutcome},
    error::{DocumentStoreError, DocumentStoreResult},
    index::IndexSpec,
    page::PaginationParams,
    pipeline::Pipeline,
    query::{Expr, Filter, Query, Sort},
    store::DocumentStore,
};
use bookstore_memory::{InMemoryStore, InMemoryStoreBuilder};

fn config() -> BookstoreConfig {
    BookstoreConfig {
        backend: bookstore::BackendKind::Memory,
        ..BookstoreConfig::default()
    }
}

async fn open(builder: &InMemoryStoreBuilder) -> DocumentStore<InMemoryStore> {
    DocumentStore::new(builder.clone().build().await.unwrap())
}

fn field<'a>(row: &'a Bson, name: &str) -> &'a Bson {
    row.as_document().unwrap().get(name).unwrap()
}

/// The catalogue as it stands after the query battery's update and delete.
fn catalogue_after_battery() -> Vec<Book> {
    sample_books()
        .into_iter()
        .filter(|b| b.title != "Moby Dick")
        .map(|mut b| {
            if b.title == "1984" {
                b.price = 13.99;
            }
            b
        })
        .collect()
}

#[tokio::test]
async fn seeding_is_idempotent() {
    let builder = InMemoryStore::builder();
    let config = config();

    let first = seed_phase(builder.clone(), &config).await.unwrap();
    let second = seed_phase(builder.clone(), &config).await.unwrap();

    assert_eq!(first.inserted, 12);
    assert_eq!(second.previous_count, 12);
    assert_eq!(second.inserted, 12);
    assert_eq!(
        open(&builder).await.collection("books").count(None).await.unwrap(),
        12
    );
}

#[tokio::test]
async fn full_run_reports_every_task() {
    let builder = InMemoryStore::builder();
    let report = run(builder, &config()).await.unwrap();
    let queries = &report.queries;

    let mut fiction = queries.fiction.iter().map(|b| b.title.as_str()).collect::<Vec<_>>();
    fiction.sort();
    assert_eq!(
        fiction,
        vec!["The Alchemist", "The Catcher in the Rye", "The Great Gatsby", "To Kill a Mockingbird"]
    );

    assert_eq!(queries.published_after_1950.len(), 4);
    assert_eq!(queries.by_george_orwell.len(), 2);
    assert_eq!(queries.price_update, UpdateOutcome { matched: 1, modified: 1 });
    assert_eq!(queries.deleted, 1);
    assert!(queries.in_stock_after_2010.is_empty());

    assert_eq!(queries.projected.len(), 11);
    for row in &queries.projected {
        let keys = row.as_document().unwrap().keys().cloned().collect::<Vec<_>>();
        assert_eq!(keys, vec!["title", "author", "price"]);
    }

    assert_eq!(field(&queries.by_price_asc[0], "title"), &Bson::String("Pride and Prejudice".into()));
    assert_eq!(field(&queries.by_price_desc[0], "title"), &Bson::String("The Lord of the Rings".into()));
    assert_eq!(field(&queries.by_price_desc[1], "price"), &Bson::Double(14.99));
}

#[tokio::test]
async fn update_changes_only_1984() {
    let builder = InMemoryStore::builder();
    run(builder.clone(), &config()).await.unwrap();

    let store = open(&builder).await;
    let stored = store.typed_collection::<Book>().query(Query::new()).await.unwrap();
    let expected = catalogue_after_battery()
        .into_iter()
        .map(|b| (b.title, b.price))
        .collect::<HashMap<_, _>>();

    assert_eq!(stored.len(), expected.len());
    for book in stored {
        assert_eq!(expected.get(&book.title), Some(&book.price), "{}", book.title);
    }
}

#[tokio::test]
async fn delete_removes_moby_dick() {
    let builder = InMemoryStore::builder();
    run(builder.clone(), &config()).await.unwrap();

    let store = open(&builder).await;
    let books = store.typed_collection::<Book>();

    assert_eq!(books.count(None).await.unwrap(), 11);
    assert!(books.find_one(Filter::eq("title", "Moby Dick")).await.unwrap().is_none());
}

#[tokio::test]
async fn consecutive_pages_cover_the_collection() {
    let builder = InMemoryStore::builder();
    seed_phase(builder.clone(), &config()).await.unwrap();

    let store = open(&builder).await;
    let books = store.typed_collection::<Book>();
    let order = Sort::asc("title");

    let everything = books
        .query(Query { sort: Some(order.clone()), ..Query::new() })
        .await
        .unwrap();

    let mut paged = Vec::new();
    let mut number = 1;
    loop {
        let page = books
            .page(PaginationParams::new(number, 5), None, Some(order.clone()))
            .await
            .unwrap();
        assert_eq!(page.count, 12);
        paged.extend(page.items);
        match page.next_page {
            Some(next) => number = next,
            None => break,
        }
    }

    assert_eq!(number, 3);
    assert_eq!(paged, everything);
}

#[tokio::test]
async fn battery_pages_hold_five_books_each() {
    let report = run(InMemoryStore::builder(), &config()).await.unwrap();
    let pages = &report.queries.pages;

    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0].items.len(), 5);
    assert_eq!(pages[1].items.len(), 5);
    assert_eq!(pages[0].next_page, Some(2));
    assert_eq!(pages[1].previous_page, Some(1));
    assert!(pages[0].items.iter().all(|b| !pages[1].items.contains(b)));
}

#[tokio::test]
async fn average_price_by_genre_matches_catalogue() {
    let report = run(InMemoryStore::builder(), &config()).await.unwrap();

    let mut expected: HashMap<String, (f64, usize)> = HashMap::new();
    for book in catalogue_after_battery() {
        let entry = expected.entry(book.genre).or_default();
        entry.0 += book.price;
        entry.1 += 1;
    }

    let rows = &report.queries.avg_price_by_genre;
    assert_eq!(rows.len(), expected.len());
    for row in rows {
        let genre = field(row, "_id").as_str().unwrap();
        let avg = field(row, "avgPrice").as_f64().unwrap();
        let (total, count) = expected[genre];
        assert!((avg - total / count as f64).abs() < 1e-9, "{}", genre);
    }
}

#[tokio::test]
async fn top_author_and_decades_match_catalogue() {
    let report = run(InMemoryStore::builder(), &config()).await.unwrap();
    let queries = &report.queries;

    assert_eq!(queries.top_author.len(), 1);
    let author = field(&queries.top_author[0], "_id").as_str().unwrap();
    assert!(author == "George Orwell" || author == "J.R.R. Tolkien");
    assert_eq!(field(&queries.top_author[0], "count"), &Bson::Int32(2));

    let decades = queries
        .books_by_decade
        .iter()
        .map(|row| {
            (
                field(row, "decade").as_f64().unwrap() as i32,
                field(row, "count").as_i32().unwrap(),
            )
        })
        .collect::<Vec<_>>();
    assert_eq!(
        decades,
        vec![(1810, 1), (1840, 1), (1920, 1), (1930, 2), (1940, 2), (1950, 2), (1960, 1), (1980, 1)]
    );
    assert!(queries.books_by_decade.iter().all(|row| row.as_document().unwrap().get("_id").is_none()));
}

#[tokio::test]
async fn indexes_and_explain_plan() {
    let report = run(InMemoryStore::builder(), &config()).await.unwrap();
    let queries = &report.queries;

    assert_eq!(queries.indexes, vec!["_id_", "title_1", "author_1_published_year_1"]);

    let stats = queries.explain.as_document().unwrap();
    let input = stats
        .get_document("executionStages")
        .unwrap()
        .get_document("inputStage")
        .unwrap();
    assert_eq!(input.get_str("stage").unwrap(), "IXSCAN");
    assert_eq!(stats.get_i64("nReturned").unwrap(), 1);
}

#[tokio::test]
async fn custom_collection_name_is_used() {
    let builder = InMemoryStore::builder();
    let config = BookstoreConfig { collection: "catalogue".to_string(), ..config() };

    run(builder.clone(), &config).await.unwrap();

    let store = open(&builder).await;
    assert_eq!(store.list_collections().await.unwrap(), vec!["catalogue"]);
}

/// Which operation a [`FlakyStore`] refuses.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Failure {
    Nothing,
    Insert,
    Aggregate,
}

/// In-memory backend that can fail one kind of operation and counts its shutdowns.
#[derive(Debug, Clone)]
struct FlakyStore {
    inner: InMemoryStore,
    failure: Failure,
    closed: Arc<AtomicUsize>,
}

impl FlakyStore {
    fn new(failure: Failure) -> Self {
        Self { inner: InMemoryStore::new(), failure, closed: Arc::new(AtomicUsize::new(0)) }
    }

    fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StoreBackend for FlakyStore {
    async fn insert_documents(&self, documents: Vec<(Uuid, Bson)>, collection: &str) -> DocumentStoreResult<u64> {
        if self.failure == Failure::Insert {
            return Err(DocumentStoreError::Backend("not primary".to_string()));
        }
        self.inner.insert_documents(documents, collection).await
    }

    async fn update_one(&self, filter: Expr, fields: BsonDocument, collection: &str) -> DocumentStoreResult<UpdateOutcome> {
        self.inner.update_one(filter, fields, collection).await
    }

    async fn delete_one(&self, filter: Expr, collection: &str) -> DocumentStoreResult<u64> {
        self.inner.delete_one(filter, collection).await
    }

    async fn query_documents(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        self.inner.query_documents(query, collection).await
    }

    async fn count_documents(&self, filter: Option<Expr>, collection: &str) -> DocumentStoreResult<u64> {
        self.inner.count_documents(filter, collection).await
    }

    async fn aggregate(&self, pipeline: Pipeline, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        if self.failure == Failure::Aggregate {
            return Err(DocumentStoreError::Backend("connection reset".to_string()));
        }
        self.inner.aggregate(pipeline, collection).await
    }

    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.inner.create_collection(name).await
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.inner.drop_collection(name).await
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        self.inner.list_collections().await
    }

    async fn create_index(&self, index: IndexSpec, collection: &str) -> DocumentStoreResult<String> {
        self.inner.create_index(index, collection).await
    }

    async fn list_indexes(&self, collection: &str) -> DocumentStoreResult<Vec<String>> {
        self.inner.list_indexes(collection).await
    }

    async fn explain_query(&self, query: Query, collection: &str) -> DocumentStoreResult<Bson> {
        self.inner.explain_query(query, collection).await
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl StoreBackendBuilder for FlakyStore {
    type Backend = FlakyStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(self)
    }
}

#[derive(Clone)]
struct Unreachable;

#[async_trait]
impl StoreBackendBuilder for Unreachable {
    type Backend = InMemoryStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Err(DocumentStoreError::Initialization("server selection timed out".to_string()))
    }
}

#[tokio::test]
async fn connections_are_released_on_success() {
    let store = FlakyStore::new(Failure::Nothing);

    run(store.clone(), &config()).await.unwrap();

    assert_eq!(store.closed(), 2);
}

#[tokio::test]
async fn failing_query_still_releases_connection() {
    let store = FlakyStore::new(Failure::Aggregate);

    let err = run(store.clone(), &config()).await.unwrap_err();

    assert!(matches!(err, RunnerError::Read { operation: "average price by genre", .. }));
    assert_eq!(store.closed(), 2);
    // Work before the failure stays applied.
    assert_eq!(store.inner.count_documents(None, "books").await.unwrap(), 11);
}

#[tokio::test]
async fn failing_seed_releases_connection_and_skips_queries() {
    let store = FlakyStore::new(Failure::Insert);

    let err = run(store.clone(), &config()).await.unwrap_err();

    assert!(matches!(err, RunnerError::Write { operation: "insert books", .. }));
    assert_eq!(store.closed(), 1);
    assert_eq!(store.inner.count_documents(None, "books").await.unwrap(), 0);
}

#[tokio::test]
async fn unreachable_store_stops_before_seeding() {
    let err = run(Unreachable, &config()).await.unwrap_err();

    assert!(matches!(err, RunnerError::Connect(DocumentStoreError::Initialization(_))));
}

#[tokio::test]
async fn query_phase_on_empty_store_reports_empty_results() {
    let store = FlakyStore::new(Failure::Nothing);

    // Indexing creates the collection, so the battery completes with empty results.
    let report = query_phase(store.clone(), &config()).await.unwrap();

    assert!(report.fiction.is_empty());
    assert_eq!(report.deleted, 0);
    assert_eq!(report.price_update, UpdateOutcome::default());
    assert_eq!(store.closed(), 1);
}
