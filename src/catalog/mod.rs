//! Bibliographic collaborators: the external lookup service and the local
//! catalog, plus the entry types the pipeline ranks.

mod google_books;
mod local;
mod retry;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

pub use google_books::GoogleBooks;
pub use local::MemoryCatalog;

/// A hit from the external lookup service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookLookupResult {
    pub title: String,
    pub author: String,
    pub thumbnail: Option<String>,
}

impl BookLookupResult {
    pub fn new(title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            thumbnail: None,
        }
    }
}

/// A book already held in the local catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalBook {
    pub id: u64,
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

/// A hit only the external service knows about. `ordinal` numbers such
/// placeholders within one response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExternalBook {
    pub ordinal: u32,
    pub title: String,
    pub author: String,
    pub thumbnail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum CatalogEntry {
    Local(LocalBook),
    External(ExternalBook),
}

impl CatalogEntry {
    pub fn title(&self) -> &str {
        match self {
            CatalogEntry::Local(book) => &book.title,
            CatalogEntry::External(book) => &book.title,
        }
    }

    pub fn author(&self) -> &str {
        match self {
            CatalogEntry::Local(book) => &book.author,
            CatalogEntry::External(book) => &book.author,
        }
    }

    pub fn thumbnail(&self) -> Option<&str> {
        match self {
            CatalogEntry::Local(book) => book.thumbnail.as_deref(),
            CatalogEntry::External(book) => book.thumbnail.as_deref(),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, CatalogEntry::Local(_))
    }
}

pub type CatalogFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// External full-text lookup. An empty list means "no match", not failure.
pub trait BookLookup: Send + Sync {
    fn search_by_text<'a>(&'a self, query: &'a str) -> CatalogFuture<'a, Vec<BookLookupResult>>;
}

pub trait LocalCatalog: Send + Sync {
    /// Entries whose title matches any of `titles` or whose author matches
    /// any of `authors`, ignoring case.
    fn find_by_titles_or_authors<'a>(
        &'a self,
        titles: &'a [String],
        authors: &'a [String],
    ) -> CatalogFuture<'a, Vec<LocalBook>>;
}
