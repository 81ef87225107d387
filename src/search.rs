//! Bounded search loop: query the lookup service, score the hits, and
//! sharpen the word list between attempts that find nothing.

use std::collections::HashSet;
use tracing::{debug, warn};

use crate::cancel::{CancelSignal, Cancelled};
use crate::catalog::{BookLookup, BookLookupResult};
use crate::filter::{ExtractedWord, join_words};
use crate::scoring::{score, word_set};
use crate::settings::Settings;
use crate::sharpen::sharpen;

/// An external hit that cleared the match threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredHit {
    pub result: BookLookupResult,
    pub score: f64,
}

#[derive(Debug, Clone, Default)]
pub struct SearchReport {
    /// Hits of the successful attempt, best first. Empty when every
    /// attempt came back empty.
    pub hits: Vec<ScoredHit>,
    /// Word list used by the last attempt.
    pub words: Vec<ExtractedWord>,
    /// Tokenized `words`, for scoring local catalog entries.
    pub word_set: HashSet<String>,
    pub attempts: usize,
}

pub async fn search_with_retry<L>(
    lookup: &L,
    words: Vec<ExtractedWord>,
    settings: &Settings,
    cancel: &CancelSignal,
) -> Result<SearchReport, Cancelled>
where
    L: BookLookup + ?Sized,
{
    let mut current = words;
    let mut report = SearchReport::default();

    for attempt in 1..=settings.max_lookup_retries {
        if current.is_empty() {
            debug!("no words left to search with");
            break;
        }
        report.attempts = attempt;

        let ocr_words = word_set(&current);
        let query = join_words(&current);
        debug!("lookup attempt {} with '{}'", attempt, query);

        let results = match cancel.run(lookup.search_by_text(&query)).await? {
            Ok(results) => results,
            Err(err) => {
                warn!("book lookup failed on attempt {}: {:#}", attempt, err);
                Vec::new()
            }
        };
        let hits = score_hits(results, &ocr_words, settings.min_word_match_threshold);
        if !hits.is_empty() {
            debug!("attempt {} found {} candidate(s)", attempt, hits.len());
            report.hits = hits;
            report.words = current;
            report.word_set = ocr_words;
            return Ok(report);
        }

        report.word_set = ocr_words;
        if attempt == settings.max_lookup_retries {
            break;
        }
        match sharpen(&current, settings) {
            Some(sharpened) => {
                debug!(
                    "sharpened query from {} to {} word(s)",
                    current.len(),
                    sharpened.len()
                );
                current = sharpened;
            }
            None => {
                debug!("sharpening made no progress; stopping after {} attempt(s)", attempt);
                break;
            }
        }
    }

    report.words = current;
    Ok(report)
}

/// Scores every hit, drops those under `threshold`, best first. Equal
/// scores keep the service's order.
pub fn score_hits(
    results: Vec<BookLookupResult>,
    ocr_words: &HashSet<String>,
    threshold: f64,
) -> Vec<ScoredHit> {
    let mut hits = results
        .into_iter()
        .map(|result| {
            let score = score(&result.title, &result.author, ocr_words);
            ScoredHit { result, score }
        })
        .filter(|hit| hit.score >= threshold)
        .collect::<Vec<_>>();
    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
    hits
}
