//! Folds the hits of a successful lookup together with matching local
//! catalog entries into one ranked, de-duplicated list.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;

use crate::cancel::{CancelSignal, Cancelled};
use crate::catalog::{CatalogEntry, ExternalBook, LocalBook, LocalCatalog};
use crate::scoring::score;
use crate::search::ScoredHit;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedBook {
    #[serde(flatten)]
    pub entry: CatalogEntry,
    pub score: f64,
}

#[derive(Debug, Error)]
pub enum MergeError {
    #[error(transparent)]
    Cancelled(#[from] Cancelled),

    #[error("local catalog lookup failed: {0:#}")]
    Catalog(anyhow::Error),
}

pub async fn merge_results<C>(
    catalog: &C,
    hits: &[ScoredHit],
    ocr_words: &HashSet<String>,
    threshold: f64,
    cancel: &CancelSignal,
) -> Result<Vec<MatchedBook>, MergeError>
where
    C: LocalCatalog + ?Sized,
{
    if hits.is_empty() {
        return Ok(Vec::new());
    }
    let titles = hits
        .iter()
        .map(|hit| hit.result.title.clone())
        .collect::<Vec<_>>();
    let authors = hits
        .iter()
        .map(|hit| hit.result.author.clone())
        .filter(|author| !author.trim().is_empty())
        .collect::<Vec<_>>();

    let local_books = cancel
        .run(catalog.find_by_titles_or_authors(&titles, &authors))
        .await?
        .map_err(MergeError::Catalog)?;
    debug!("local catalog returned {} related book(s)", local_books.len());
    Ok(merge_scored(hits, local_books, ocr_words, threshold))
}

/// Ranks local matches and external-only hits together. Local entries that
/// clear the threshold shadow external hits with the same title; external
/// duplicates collapse into their best-scored hit. Ties go to local entries.
pub fn merge_scored(
    hits: &[ScoredHit],
    local_books: Vec<LocalBook>,
    ocr_words: &HashSet<String>,
    threshold: f64,
) -> Vec<MatchedBook> {
    let mut merged = Vec::new();
    let mut local_titles = HashSet::new();
    let mut local_ids = HashSet::new();

    for book in local_books {
        if !local_ids.insert(book.id) {
            continue;
        }
        let book_score = score(&book.title, &book.author, ocr_words);
        if book_score < threshold {
            continue;
        }
        local_titles.insert(normalize(&book.title));
        merged.push(MatchedBook {
            entry: CatalogEntry::Local(book),
            score: book_score,
        });
    }

    let mut seen_external = HashSet::new();
    let mut ordinal = 0u32;
    for hit in hits {
        let title = normalize(&hit.result.title);
        if local_titles.contains(&title) {
            continue;
        }
        if !seen_external.insert((title, normalize(&hit.result.author))) {
            continue;
        }
        let hit_score = score(&hit.result.title, &hit.result.author, ocr_words);
        if hit_score < threshold {
            continue;
        }
        ordinal += 1;
        merged.push(MatchedBook {
            entry: CatalogEntry::External(ExternalBook {
                ordinal,
                title: hit.result.title.clone(),
                author: hit.result.author.clone(),
                thumbnail: hit.result.thumbnail.clone(),
            }),
            score: hit_score,
        });
    }

    merged.sort_by(rank);
    merged
}

fn rank(a: &MatchedBook, b: &MatchedBook) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.entry.is_local().cmp(&a.entry.is_local()))
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}
