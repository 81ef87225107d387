//! Turns recognized lines into the word list used for catalog queries.
//!
//! Title and author are set in the largest type on a cover, so lines far
//! smaller than the largest one (blurbs, publisher marks, spine text) are
//! dropped before the text is split into words.

use serde::Serialize;

use crate::ocr::OcrLine;
use crate::settings::Settings;

/// A single word and the text size of the line it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedWord {
    pub text: String,
    pub size: f32,
}

impl ExtractedWord {
    pub fn new(text: impl Into<String>, size: f32) -> Self {
        Self {
            text: text.into(),
            size,
        }
    }
}

pub fn filter_lines(lines: &[OcrLine], settings: &Settings) -> Vec<ExtractedWord> {
    let sizes = lines.iter().map(OcrLine::text_size).collect::<Vec<_>>();
    let max_size = sizes
        .iter()
        .copied()
        .filter(|size| *size > 0.0)
        .fold(0.0f32, f32::max);
    if max_size <= 0.0 {
        return fallback_words(lines, settings);
    }

    let threshold = max_size * settings.text_size_filter_threshold_percentage;
    let words = lines
        .iter()
        .zip(sizes)
        .filter(|(_, size)| *size > 0.0 && *size >= threshold)
        .flat_map(|(line, size)| {
            line.text
                .split_whitespace()
                .map(move |word| ExtractedWord::new(word, size))
        })
        .collect::<Vec<_>>();
    limit_word_count(words, settings)
}

/// Without usable geometry every plausible word is kept, sized zero.
fn fallback_words(lines: &[OcrLine], settings: &Settings) -> Vec<ExtractedWord> {
    lines
        .iter()
        .flat_map(|line| line.text.split_whitespace())
        .filter(|word| {
            let len = word.chars().count();
            len >= settings.min_title_length && len <= settings.max_title_length
        })
        .map(|word| ExtractedWord::new(word, 0.0))
        .collect()
}

/// Keeps the `max_search_words` largest words in their original order.
/// Lists at or below the budget come back untouched.
pub fn limit_word_count(words: Vec<ExtractedWord>, settings: &Settings) -> Vec<ExtractedWord> {
    if words.len() <= settings.max_search_words {
        return words;
    }

    let mut order = (0..words.len()).collect::<Vec<_>>();
    order.sort_by(|a, b| words[*b].size.total_cmp(&words[*a].size));
    let mut keep = order[..settings.max_search_words].to_vec();
    keep.sort_unstable();

    let mut keep = keep.into_iter().peekable();
    words
        .into_iter()
        .enumerate()
        .filter_map(|(idx, word)| {
            if keep.peek() == Some(&idx) {
                keep.next();
                Some(word)
            } else {
                None
            }
        })
        .collect()
}

pub fn join_words(words: &[ExtractedWord]) -> String {
    words
        .iter()
        .map(|word| word.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}
