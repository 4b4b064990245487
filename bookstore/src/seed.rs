//! Seeding: reset the target collection and load the sample catalogue.

use bookstore_core::{backend::StoreBackend, query::Query, store::DocumentStore};

use crate::{
    books::{Book, sample_books},
    config::BookstoreConfig,
    error::{OperationContext, RunnerResult},
};

/// What a seed run found and wrote.
#[derive(Debug, Clone, PartialEq)]
pub struct SeedReport {
    /// Documents present before seeding; non-zero means the collection was dropped.
    pub previous_count: u64,
    pub inserted: u64,
    /// `ordinal. "title" by author (year)` for every stored book.
    pub listing: Vec<String>,
}

/// Drops the collection if it holds anything, then inserts the twelve sample books.
///
/// Running this twice leaves exactly twelve books.
pub async fn seed_collection<B: StoreBackend>(
    store: &DocumentStore<B>,
    config: &BookstoreConfig,
) -> RunnerResult<SeedReport> {
    let books = store.typed_collection_named::<Book>(&config.collection);

    let previous_count = books.count(None).await.reading("count existing books")?;
    if previous_count > 0 {
        tracing::info!("Collection already contains {} documents. Dropping collection...", previous_count);
        store
            .drop_collection(&config.collection)
            .await
            .writing("drop collection")?;
        tracing::info!("Collection dropped successfully");
    }

    let inserted = books.insert(sample_books()).await.writing("insert books")?;
    tracing::info!("{} books were successfully inserted into the database", inserted);

    let listing = books
        .query(Query::new())
        .await
        .reading("list inserted books")?
        .iter()
        .enumerate()
        .map(|(i, book)| book.listing_line(i + 1))
        .collect::<Vec<_>>();

    tracing::info!("Inserted books:");
    for line in &listing {
        tracing::info!("{}", line);
    }

    Ok(SeedReport { previous_count, inserted, listing })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookstore_core::backend::StoreBackendBuilder;
    use bookstore_memory::InMemoryStore;

    #[tokio::test]
    async fn first_seed_inserts_without_dropping() {
        let store = DocumentStore::new(InMemoryStore::builder().build().await.unwrap());
        let config = BookstoreConfig::default();

        let report = seed_collection(&store, &config).await.unwrap();

        assert_eq!(report.previous_count, 0);
        assert_eq!(report.inserted, 12);
        assert_eq!(report.listing[0], "1. \"To Kill a Mockingbird\" by Harper Lee (1960)");
        assert_eq!(report.listing[11], "12. \"Wuthering Heights\" by Emily Brontë (1847)");
    }

    #[tokio::test]
    async fn reseed_drops_previous_documents() {
        let store = DocumentStore::new(InMemoryStore::builder().build().await.unwrap());
        let config = BookstoreConfig::default();

        seed_collection(&store, &config).await.unwrap();
        let report = seed_collection(&store, &config).await.unwrap();

        assert_eq!(report.previous_count, 12);
        assert_eq!(
            store.collection(&config.collection).count(None).await.unwrap(),
            12
        );
    }
}
