use anyhow::{Context, Result, anyhow};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use super::{CatalogFuture, LocalBook, LocalCatalog};

/// Local catalog held in memory, loaded from a JSON array of books.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    books: Vec<LocalBook>,
}

impl MemoryCatalog {
    pub fn new(books: Vec<LocalBook>) -> Result<Self> {
        let mut seen = HashSet::new();
        for book in &books {
            if book.id == 0 {
                return Err(anyhow!("catalog entry '{}' has id 0", book.title));
            }
            if !seen.insert(book.id) {
                return Err(anyhow!("duplicate catalog id {}", book.id));
            }
            if book.title.trim().is_empty() {
                return Err(anyhow!("catalog entry {} has an empty title", book.id));
            }
        }
        Ok(Self { books })
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog {}", path.display()))?;
        let books: Vec<LocalBook> = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse catalog {}", path.display()))?;
        Self::new(books).with_context(|| format!("invalid catalog {}", path.display()))
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    fn find(&self, titles: &[String], authors: &[String]) -> Vec<LocalBook> {
        let titles = normalized(titles);
        let authors = normalized(authors);
        if titles.is_empty() && authors.is_empty() {
            return Vec::new();
        }
        self.books
            .iter()
            .filter(|book| {
                titles.contains(&normalize(&book.title)) || authors.contains(&normalize(&book.author))
            })
            .cloned()
            .collect()
    }
}

impl LocalCatalog for MemoryCatalog {
    fn find_by_titles_or_authors<'a>(
        &'a self,
        titles: &'a [String],
        authors: &'a [String],
    ) -> CatalogFuture<'a, Vec<LocalBook>> {
        Box::pin(async move { Ok(self.find(titles, authors)) })
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

fn normalized(values: &[String]) -> HashSet<String> {
    values
        .iter()
        .map(|value| normalize(value))
        .filter(|value| !value.is_empty())
        .collect()
}
