//! Narrows a word list that found nothing by cutting away the less
//! prominent type on the cover.
//!
//! Words are grouped into size tiers; the widest proportional drop between
//! neighbouring tiers is taken as the boundary between title/author and
//! everything else.

use crate::filter::ExtractedWord;
use crate::settings::Settings;

#[derive(Debug, Clone, PartialEq)]
pub struct SizeTier {
    /// Size of the tier's largest member.
    pub representative: f32,
    /// Indices into the word list, largest first.
    pub members: Vec<usize>,
}

/// Groups words by size, largest first. A word opens a new tier when it is
/// smaller than the current tier's representative by more than `tolerance`.
pub fn build_tiers(words: &[ExtractedWord], tolerance: f32) -> Vec<SizeTier> {
    let mut order = (0..words.len()).collect::<Vec<_>>();
    order.sort_by(|a, b| words[*b].size.total_cmp(&words[*a].size));

    let mut tiers: Vec<SizeTier> = Vec::new();
    for idx in order {
        let size = words[idx].size;
        match tiers.last_mut() {
            Some(tier) if size >= tier.representative * (1.0 - tolerance) => {
                tier.members.push(idx);
            }
            _ => tiers.push(SizeTier {
                representative: size,
                members: vec![idx],
            }),
        }
    }
    tiers
}

/// Index `i` and ratio of the largest drop between tier `i` and tier `i + 1`.
/// The first of equal drops wins.
pub fn largest_gap(tiers: &[SizeTier]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (idx, pair) in tiers.windows(2).enumerate() {
        let upper = pair[0].representative;
        if upper <= 0.0 {
            continue;
        }
        let ratio = (upper - pair[1].representative) / upper;
        if best.is_none_or(|(_, best_ratio)| ratio > best_ratio) {
            best = Some((idx, ratio));
        }
    }
    best
}

/// Returns a strictly smaller word list, or `None` when there is no
/// trustworthy cut to make. Surviving words keep their input order.
pub fn sharpen(words: &[ExtractedWord], settings: &Settings) -> Option<Vec<ExtractedWord>> {
    if words.len() < settings.sharpen_min_words_required {
        return None;
    }
    if !words.iter().any(|word| word.size > 0.0) {
        return None;
    }

    let tiers = build_tiers(words, settings.sharpen_tier_grouping_tolerance);
    if tiers.len() < settings.sharpen_min_tiers_required {
        return None;
    }

    let (gap_idx, gap_ratio) = largest_gap(&tiers)?;
    if gap_ratio < settings.sharpen_min_gap_threshold {
        return None;
    }

    let mut keep = tiers[..=gap_idx]
        .iter()
        .flat_map(|tier| tier.members.iter().copied())
        .collect::<Vec<_>>();
    if keep.len() < settings.sharpen_min_words_after_cut || keep.len() >= words.len() {
        return None;
    }
    keep.sort_unstable();
    Some(keep.into_iter().map(|idx| words[idx].clone()).collect())
}
