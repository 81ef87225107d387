use std::collections::HashSet;

use crate::filter::ExtractedWord;

const TRAILING_PUNCTUATION: &[char] = &[',', '.', '!', '?', ';', ':'];
const MIN_TOKEN_CHARS: usize = 3;

/// Lowercased words with trailing punctuation stripped; anything shorter
/// than three characters is dropped.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|word| word.to_lowercase())
        .map(|word| word.trim_end_matches(TRAILING_PUNCTUATION).to_string())
        .filter(|word| word.chars().count() >= MIN_TOKEN_CHARS)
        .collect()
}

pub fn word_set(words: &[ExtractedWord]) -> HashSet<String> {
    words.iter().flat_map(|word| tokenize(&word.text)).collect()
}

/// Share of the book's title and author tokens found in the OCR text.
///
/// Extra OCR words do not lower the score, so a cover carrying a blurb can
/// still reach 1.0 for the right book.
pub fn score(title: &str, author: &str, ocr_words: &HashSet<String>) -> f64 {
    if ocr_words.is_empty() {
        return 0.0;
    }
    let tokens = tokenize(title)
        .into_iter()
        .chain(tokenize(author))
        .collect::<Vec<_>>();
    if tokens.is_empty() {
        return 0.0;
    }
    let found = tokens
        .iter()
        .filter(|token| ocr_words.contains(token.as_str()))
        .count();
    found as f64 / tokens.len() as f64
}
