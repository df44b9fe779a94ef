use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Catalog JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Opaque identifier of a book, as handed out by the catalog
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookId(String);

impl BookId {
    pub fn new(id: impl Into<String>) -> Self {
        BookId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A book record from the catalog
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub cover_url: Option<String>,
    /// Length in seconds
    #[serde(default)]
    pub duration: u64,
}

impl Book {
    /// Duration in the progress unit used by the playback service (milliseconds)
    pub fn duration_ms(&self) -> u64 {
        self.duration.saturating_mul(1000)
    }
}

/// Ordered list of books, as returned by a search
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    books: Vec<Book>,
}

impl Catalog {
    pub fn new(books: Vec<Book>) -> Self {
        Catalog { books }
    }

    /// Decode the serialized catalog transport (a JSON array of books)
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        if json.trim().is_empty() {
            return Ok(Catalog::default());
        }
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, CatalogError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn get(&self, index: usize) -> Option<&Book> {
        self.books.get(index)
    }

    pub fn find(&self, id: &BookId) -> Option<&Book> {
        self.books.iter().find(|book| &book.id == id)
    }

    pub fn books(&self) -> &[Book] {
        &self.books
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}

/// Search collaborator supplying ordered book lists (allows mocking for tests)
#[async_trait::async_trait]
pub trait CatalogSource: Send + Sync {
    async fn search(&self, query: &str) -> Result<Catalog, CatalogError>;
}

/// Catalog source backed by a fixed list of books
pub struct InMemoryCatalog {
    books: Vec<Book>,
}

impl InMemoryCatalog {
    pub fn new(books: Vec<Book>) -> Self {
        InMemoryCatalog { books }
    }

    /// Load the book list from a JSON file
    pub async fn from_file(path: &std::path::Path) -> Result<Self, CatalogError> {
        let json = tokio::fs::read_to_string(path).await?;
        let catalog = Catalog::from_json(&json)?;
        Ok(InMemoryCatalog {
            books: catalog.books,
        })
    }
}

#[async_trait::async_trait]
impl CatalogSource for InMemoryCatalog {
    /// Case-insensitive match on title or author; an empty query returns everything
    async fn search(&self, query: &str) -> Result<Catalog, CatalogError> {
        let needle = query.trim().to_lowercase();
        let books = self
            .books
            .iter()
            .filter(|book| {
                needle.is_empty()
                    || book.title.to_lowercase().contains(&needle)
                    || book.author.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();
        Ok(Catalog::new(books))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(id: &str, title: &str, author: &str) -> Book {
        Book {
            id: BookId::new(id),
            title: title.to_string(),
            author: author.to_string(),
            cover_url: None,
            duration: 60,
        }
    }

    #[test]
    fn test_decodes_plain_json_array() {
        let json = r#"[
            {"id": "1", "title": "Dune", "author": "Frank Herbert", "cover_url": "http://x/1.jpg", "duration": 3600},
            {"id": "2", "title": "Emma", "author": "Jane Austen"}
        ]"#;

        let catalog = Catalog::from_json(json).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get(0).unwrap().duration_ms(), 3_600_000);
        assert_eq!(catalog.get(1).unwrap().cover_url, None);
        assert_eq!(catalog.find(&BookId::new("2")).unwrap().title, "Emma");
        assert!(catalog.find(&BookId::new("3")).is_none());
    }

    #[test]
    fn test_empty_transport_is_empty_catalog() {
        assert!(Catalog::from_json("").unwrap().is_empty());
        assert!(Catalog::from_json("not json").is_err());
    }

    #[test]
    fn test_json_keeps_order() {
        let catalog = Catalog::new(vec![book("b", "B", "x"), book("a", "A", "y")]);
        let decoded = Catalog::from_json(&catalog.to_json().unwrap()).unwrap();
        let ids: Vec<&str> = decoded.books().iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_in_memory_search() {
        let source = InMemoryCatalog::new(vec![
            book("1", "The Hobbit", "J. R. R. Tolkien"),
            book("2", "Silmarillion", "J. R. R. Tolkien"),
            book("3", "Persuasion", "Jane Austen"),
        ]);

        let all = source.search("  ").await.unwrap();
        assert_eq!(all.len(), 3);

        let tolkien = source.search("TOLKIEN").await.unwrap();
        let ids: Vec<&str> = tolkien.books().iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);

        let hobbit = source.search("hobbit").await.unwrap();
        assert_eq!(hobbit.len(), 1);
    }
}
