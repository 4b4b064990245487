//! Phase orchestration.
//!
//! A run has two phases, seed then query. Each phase opens its own connection
//! from the builder, runs its body, and shuts the connection down whether the
//! body succeeded or not. The query phase only starts after a successful seed.

use bookstore_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    store::DocumentStore,
};

use crate::{
    config::BookstoreConfig,
    error::{RunnerError, RunnerResult},
    seed::{SeedReport, seed_collection},
    tasks::{QueryReport, run_queries},
};

/// Results of a complete run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub seed: SeedReport,
    pub queries: QueryReport,
}

async fn connect<Bd: StoreBackendBuilder>(builder: Bd) -> RunnerResult<DocumentStore<Bd::Backend>> {
    let backend = builder.build().await.map_err(RunnerError::Connect)?;
    tracing::info!("Connected to the store");

    Ok(DocumentStore::new(backend))
}

async fn release<B: StoreBackend>(store: DocumentStore<B>) {
    match store.shutdown().await {
        Ok(()) => tracing::info!("Connection closed"),
        Err(e) => tracing::warn!(error = %e, "Failed to close connection cleanly"),
    }
}

/// Connects, resets the collection and loads the sample books.
pub async fn seed_phase<Bd: StoreBackendBuilder>(
    builder: Bd,
    config: &BookstoreConfig,
) -> RunnerResult<SeedReport> {
    let result = match connect(builder).await {
        Ok(store) => {
            let result = seed_collection(&store, config).await;
            release(store).await;
            result
        },
        Err(e) => Err(e),
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Error seeding collection");
    }

    result
}

/// Connects and runs the query battery against the seeded collection.
pub async fn query_phase<Bd: StoreBackendBuilder>(
    builder: Bd,
    config: &BookstoreConfig,
) -> RunnerResult<QueryReport> {
    let result = match connect(builder).await {
        Ok(store) => {
            let result = run_queries(&store, config).await;
            release(store).await;
            result
        },
        Err(e) => Err(e),
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Error during tasks");
    }

    result
}

/// Seeds, then queries. Stops at the first failing phase.
pub async fn run<Bd>(builder: Bd, config: &BookstoreConfig) -> RunnerResult<RunReport>
where
    Bd: StoreBackendBuilder + Clone,
{
    let seed = seed_phase(builder.clone(), config).await?;
    let queries = query_phase(builder, config).await?;

    tracing::info!("All tasks completed and connection closed");

    Ok(RunReport { seed, queries })
}
