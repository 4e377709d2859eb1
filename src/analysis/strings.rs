//! Normalized string similarity for filename comparison.
//!
//! Three interchangeable metrics, all symmetric and scoring 1.0 for
//! identical inputs. Edit distance and the prefix-weighted metric come from
//! `strsim`; the contiguous-match ratio is a Ratcliff/Obershelp style
//! matcher with a deterministic tie-break.

use crate::config::SimilarityAlgorithm;

/// Weight of the stem score when blending a decomposed filename comparison.
const STEM_WEIGHT: f64 = 0.8;
const EXTENSION_WEIGHT: f64 = 0.2;

/// Score two strings with the selected metric. Result is in [0, 1].
pub fn similarity(a: &str, b: &str, algorithm: SimilarityAlgorithm) -> f64 {
    match algorithm {
        SimilarityAlgorithm::Contiguous => contiguous_match_ratio(a, b),
        SimilarityAlgorithm::EditDistance => edit_distance_ratio(a, b),
        SimilarityAlgorithm::PrefixWeighted => prefix_weighted_ratio(a, b),
    }
}

/// Greedy longest-contiguous-block matching: repeatedly take the longest
/// common contiguous block (ties broken by lowest start in `a`, then in
/// `b`), recurse on the unmatched flanks, and sum the matched lengths.
/// Ratio is `2 * matches / (len(a) + len(b))`; two empty strings score 1.0.
pub fn contiguous_match_ratio(a: &str, b: &str) -> f64 {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    if a_chars.is_empty() && b_chars.is_empty() {
        return 1.0;
    }
    let matched = matched_total(&a_chars, &b_chars, 0, a_chars.len(), 0, b_chars.len());
    2.0 * matched as f64 / (a_chars.len() + b_chars.len()) as f64
}

/// Normalized Levenshtein: `1 - distance / max(len(a), len(b), 1)`.
pub fn edit_distance_ratio(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b)
}

/// Jaro score with the standard Winkler common-prefix boost (prefix capped
/// at 4 characters, 0.1 scaling). Rewards names sharing a stem more than
/// names matching only in the middle or end.
pub fn prefix_weighted_ratio(a: &str, b: &str) -> f64 {
    strsim::jaro_winkler(a, b)
}

fn matched_total(
    a: &[char],
    b: &[char],
    a_lo: usize,
    a_hi: usize,
    b_lo: usize,
    b_hi: usize,
) -> usize {
    let (start_a, start_b, len) = longest_match(a, b, a_lo, a_hi, b_lo, b_hi);
    if len == 0 {
        return 0;
    }
    len + matched_total(a, b, a_lo, start_a, b_lo, start_b)
        + matched_total(a, b, start_a + len, a_hi, start_b + len, b_hi)
}

/// Longest common contiguous block within the given windows. Scanning order
/// (ascending in `a`, then `b`) combined with a strict improvement test
/// yields the first-position tie-break.
fn longest_match(
    a: &[char],
    b: &[char],
    a_lo: usize,
    a_hi: usize,
    b_lo: usize,
    b_hi: usize,
) -> (usize, usize, usize) {
    let mut best = (a_lo, b_lo, 0usize);
    if a_lo >= a_hi || b_lo >= b_hi {
        return best;
    }
    // run_lengths[j - b_lo] holds the match run ending at (i - 1, j - 1).
    let width = b_hi - b_lo;
    let mut run_lengths = vec![0usize; width];
    for i in a_lo..a_hi {
        let mut previous_diagonal = 0usize;
        for j in b_lo..b_hi {
            let current = run_lengths[j - b_lo];
            if a[i] == b[j] {
                let len = previous_diagonal + 1;
                run_lengths[j - b_lo] = len;
                if len > best.2 {
                    best = (i + 1 - len, j + 1 - len, len);
                }
            } else {
                run_lengths[j - b_lo] = 0;
            }
            previous_diagonal = current;
        }
    }
    best
}

/// A filename split into stem and extension. Extension excludes the dot and
/// is empty when absent; a leading dot (dotfile) belongs to the stem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileName<'a> {
    pub stem: &'a str,
    pub extension: &'a str,
}

pub fn split_filename(name: &str) -> FileName<'_> {
    match name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < name.len() => FileName {
            stem: &name[..idx],
            extension: &name[idx + 1..],
        },
        _ => FileName {
            stem: name,
            extension: "",
        },
    }
}

/// Compare two filenames with the stem and extension scored separately, so
/// names differing only by extension are not trivially dissimilar.
pub fn filename_similarity(a: &str, b: &str, algorithm: SimilarityAlgorithm) -> f64 {
    let a_parts = split_filename(a);
    let b_parts = split_filename(b);
    let stem_score = similarity(a_parts.stem, b_parts.stem, algorithm);
    let extension_score = if a_parts.extension.is_empty() && b_parts.extension.is_empty() {
        1.0
    } else {
        similarity(a_parts.extension, b_parts.extension, algorithm)
    };
    STEM_WEIGHT * stem_score + EXTENSION_WEIGHT * extension_score
}
