//! The book record and the fixed sample catalogue.

use bson::Uuid;
use serde::{Deserialize, Serialize};

use bookstore_core::document::Document;

/// One book in the catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub genre: String,
    pub published_year: i32,
    pub price: f64,
    pub in_stock: bool,
    pub pages: i32,
    pub publisher: String,
}

impl Document for Book {
    fn id(&self) -> &Uuid {
        &self.id
    }

    fn collection_name() -> &'static str {
        "books"
    }
}

impl Book {
    #[allow(clippy::too_many_arguments)]
    fn new(
        title: &str,
        author: &str,
        genre: &str,
        published_year: i32,
        price: f64,
        in_stock: bool,
        pages: i32,
        publisher: &str,
    ) -> Self {
        Self {
            id: Uuid::new(),
            title: title.to_string(),
            author: author.to_string(),
            genre: genre.to_string(),
            published_year,
            price,
            in_stock,
            pages,
            publisher: publisher.to_string(),
        }
    }

    /// `ordinal. "title" by author (year)`, as printed after seeding.
    pub fn listing_line(&self, ordinal: usize) -> String {
        format!("{}. \"{}\" by {} ({})", ordinal, self.title, self.author, self.published_year)
    }
}

/// The twelve books every run seeds, each with a fresh identifier.
pub fn sample_books() -> Vec<Book> {
    vec![
        Book::new("To Kill a Mockingbird", "Harper Lee", "Fiction", 1960, 12.99, true, 336, "J. B. Lippincott & Co."),
        Book::new("1984", "George Orwell", "Dystopian", 1949, 10.99, true, 328, "Secker & Warburg"),
        Book::new("The Great Gatsby", "F. Scott Fitzgerald", "Fiction", 1925, 9.99, true, 180, "Charles Scribner's Sons"),
        Book::new("Brave New World", "Aldous Huxley", "Dystopian", 1932, 11.50, false, 311, "Chatto & Windus"),
        Book::new("The Hobbit", "J.R.R. Tolkien", "Fantasy", 1937, 14.99, true, 310, "George Allen & Unwin"),
        Book::new("The Catcher in the Rye", "J.D. Salinger", "Fiction", 1951, 8.99, true, 224, "Little, Brown and Company"),
        Book::new("Pride and Prejudice", "Jane Austen", "Romance", 1813, 7.99, true, 432, "T. Egerton, Whitehall"),
        Book::new("The Lord of the Rings", "J.R.R. Tolkien", "Fantasy", 1954, 19.99, true, 1178, "Allen & Unwin"),
        Book::new("Animal Farm", "George Orwell", "Political Satire", 1945, 8.50, false, 112, "Secker & Warburg"),
        Book::new("The Alchemist", "Paulo Coelho", "Fiction", 1988, 10.99, true, 197, "HarperOne"),
        Book::new("Moby Dick", "Herman Melville", "Adventure", 1851, 12.50, false, 635, "Harper & Brothers"),
        Book::new("Wuthering Heights", "Emily Brontë", "Gothic Fiction", 1847, 9.99, true, 342, "Thomas Cautley Newby"),
    ]
}
