//! The fixed battery of queries run against the seeded collection.
//!
//! Tasks run strictly in order; the first failure stops the battery. Tables
//! and the explain JSON go to stdout, everything else to the log.

use bson::{Bson, doc};

use bookstore_core::{
    backend::{StoreBackend, UpdateOutcome},
    index::IndexSpec,
    page::{Page, PaginationParams},
    pipeline::{Accumulator, Operand, Pipeline, ProjectSpec},
    query::{Filter, Projection, Query, Sort, SortDirection},
    store::DocumentStore,
};

use crate::{
    books::Book,
    config::BookstoreConfig,
    error::{OperationContext, RunnerResult},
    report::{pretty_json, print_table},
};

/// Everything the battery read or changed, in task order.
#[derive(Debug, Clone)]
pub struct QueryReport {
    pub fiction: Vec<Book>,
    pub published_after_1950: Vec<Book>,
    pub by_george_orwell: Vec<Book>,
    pub price_update: UpdateOutcome,
    pub deleted: u64,
    pub in_stock_after_2010: Vec<Book>,
    /// Title, author and price only.
    pub projected: Vec<Bson>,
    /// Title and price, cheapest first.
    pub by_price_asc: Vec<Bson>,
    /// Title and price, most expensive first.
    pub by_price_desc: Vec<Bson>,
    pub pages: Vec<Page<Book>>,
    /// `{ _id: genre, avgPrice }` per genre.
    pub avg_price_by_genre: Vec<Bson>,
    /// `{ _id: author, count }` for the author with the most books.
    pub top_author: Vec<Bson>,
    /// `{ decade, count }`, oldest decade first.
    pub books_by_decade: Vec<Bson>,
    pub indexes: Vec<String>,
    /// Execution statistics for the `title = "1984"` lookup.
    pub explain: Bson,
}

fn titles(rows: &[Book]) -> Vec<Bson> {
    rows.iter()
        .map(|book| Bson::Document(doc! { "title": book.title.as_str() }))
        .collect()
}

/// Runs every task against `config.collection` and returns what each one saw.
pub async fn run_queries<B: StoreBackend>(
    store: &DocumentStore<B>,
    config: &BookstoreConfig,
) -> RunnerResult<QueryReport> {
    let books = store.typed_collection_named::<Book>(&config.collection);

    tracing::info!("--- Task 2: Basic CRUD Operations ---");

    let fiction = books
        .query(Query::filtered(Filter::eq("genre", "Fiction")))
        .await
        .reading("find fiction books")?;
    tracing::info!("Fiction books: {}", fiction.len());

    let published_after_1950 = books
        .query(Query::filtered(Filter::gt("published_year", 1950)))
        .await
        .reading("find books published after 1950")?;
    tracing::info!("Books published after 1950: {}", published_after_1950.len());

    let by_george_orwell = books
        .query(Query::filtered(Filter::eq("author", "George Orwell")))
        .await
        .reading("find books by author")?;
    tracing::info!("Books by George Orwell: {}", by_george_orwell.len());

    let price_update = books
        .update_one(Filter::eq("title", "1984"), doc! { "price": 13.99 })
        .await
        .writing("update price of \"1984\"")?;
    tracing::info!(
        matched = price_update.matched,
        modified = price_update.modified,
        "Updated price of \"1984\""
    );

    let deleted = books
        .delete_one(Filter::eq("title", "Moby Dick"))
        .await
        .writing("delete \"Moby Dick\"")?;
    tracing::info!(deleted, "Deleted \"Moby Dick\"");

    tracing::info!("--- Task 3: Advanced Queries ---");

    let in_stock_after_2010 = books
        .query(Query::filtered(
            Filter::eq("in_stock", true).and(Filter::gt("published_year", 2010)),
        ))
        .await
        .reading("find in-stock books published after 2010")?;
    tracing::info!("In-stock books published after 2010: {}", in_stock_after_2010.len());

    let projected = books
        .untyped()
        .query(
            Query::builder()
                .projection(Projection::include(["title", "author", "price"]))
                .build(),
        )
        .await
        .reading("project title, author and price")?;
    print_table("Projected fields (title, author, price):", &projected);

    let by_price = |direction| {
        Query::builder()
            .projection(Projection::include(["title", "price"]))
            .sort("price", direction)
            .build()
    };

    let by_price_asc = books
        .untyped()
        .query(by_price(SortDirection::Asc))
        .await
        .reading("sort books by price ascending")?;
    print_table("Books sorted by price (ascending):", &by_price_asc);

    let by_price_desc = books
        .untyped()
        .query(by_price(SortDirection::Desc))
        .await
        .reading("sort books by price descending")?;
    print_table("Books sorted by price (descending):", &by_price_desc);

    let mut pages = Vec::new();
    for number in 1..=2 {
        let page = books
            .page(PaginationParams::new(number, config.page_size), None, None)
            .await
            .reading("paginate books")?;
        print_table(
            &format!("Page {} ({} books):", number, page.items.len()),
            &titles(&page.items),
        );
        pages.push(page);
    }

    tracing::info!("--- Task 4: Aggregation Pipeline ---");

    let avg_price_by_genre = books
        .untyped()
        .aggregate(
            Pipeline::builder()
                .group(Operand::field("genre"), [("avgPrice", Accumulator::avg("price"))])
                .build(),
        )
        .await
        .reading("average price by genre")?;
    print_table("Average price by genre:", &avg_price_by_genre);

    let top_author = books
        .untyped()
        .aggregate(
            Pipeline::builder()
                .group(Operand::field("author"), [("count", Accumulator::count())])
                .sort(Sort::desc("count"))
                .limit(1)
                .build(),
        )
        .await
        .reading("author with most books")?;
    print_table("Author with most books:", &top_author);

    let books_by_decade = books
        .untyped()
        .aggregate(
            Pipeline::builder()
                .group(
                    Operand::field("published_year").divide(10).floor(),
                    [("count", Accumulator::count())],
                )
                .project(
                    ProjectSpec::new()
                        .compute("decade", Operand::field("_id").multiply(10))
                        .include("count")
                        .exclude_id(),
                )
                .sort(Sort::asc("decade"))
                .build(),
        )
        .await
        .reading("books grouped by decade")?;
    print_table("Books grouped by decade:", &books_by_decade);

    tracing::info!("--- Task 5: Indexing ---");

    let collection = books.untyped();

    collection
        .create_index(IndexSpec::single("title"))
        .await
        .writing("create index on title")?;
    tracing::info!("Index created on title");

    collection
        .create_index(IndexSpec::compound(["author", "published_year"]))
        .await
        .writing("create compound index on author and published_year")?;
    tracing::info!("Compound index created on author and published_year");

    let indexes = collection.list_indexes().await.reading("list indexes")?;
    tracing::info!("Indexes: {}", indexes.join(", "));

    let explain = collection
        .explain(Query::filtered(Filter::eq("title", "1984")))
        .await
        .reading("explain title search")?;
    println!("\nExplain output for title search:");
    println!("{}", pretty_json(&explain)?);

    Ok(QueryReport {
        fiction,
        published_after_1950,
        by_george_orwell,
        price_update,
        deleted,
        in_stock_after_2010,
        projected,
        by_price_asc,
        by_price_desc,
        pages,
        avg_price_by_genre,
        top_author,
        books_by_decade,
        indexes,
        explain,
    })
}
