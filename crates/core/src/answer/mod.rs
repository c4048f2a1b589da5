//! Answer normalization and exact-match grading.

mod kana;

use crate::model::{ReviewSessionItem, Verdict};

/// Normalize an answer for comparison.
///
/// Applied identically to submissions and to expected answers:
/// 1. trim surrounding whitespace (including the ideographic space)
/// 2. fold full-width ASCII and lowercase
/// 3. expand macron vowels (`ō` → `ou`)
/// 4. transliterate romaji into hiragana
/// 5. fold katakana into hiragana
#[must_use]
pub fn normalize(input: &str) -> String {
    let mut latin = String::with_capacity(input.len());
    for c in input.trim().chars().map(kana::fold_fullwidth) {
        for lower in c.to_lowercase() {
            match kana::expand_macron(lower) {
                Some(expanded) => latin.push_str(expanded),
                None => latin.push(lower),
            }
        }
    }

    kana::romaji_to_hiragana(&latin)
        .chars()
        .map(kana::fold_katakana)
        .collect()
}

/// Pre-normalized set of accepted answers for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerKey {
    accepted: Vec<String>,
}

impl AnswerKey {
    /// Build a key from a canonical answer and unordered alternatives.
    ///
    /// Candidates that normalize to the empty string are dropped.
    pub fn new<'a>(expected: &'a str, alternatives: impl IntoIterator<Item = &'a str>) -> Self {
        let mut accepted: Vec<String> = Vec::new();
        for candidate in std::iter::once(expected).chain(alternatives) {
            let normalized = normalize(candidate);
            if !normalized.is_empty() && !accepted.contains(&normalized) {
                accepted.push(normalized);
            }
        }
        Self { accepted }
    }

    #[must_use]
    pub fn for_item(item: &ReviewSessionItem) -> Self {
        Self::new(&item.expected, item.alternatives.iter().map(String::as_str))
    }

    /// True when the item has no usable answer at all; such items always grade incorrect.
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        self.accepted.is_empty()
    }

    /// Grade a submission by exact match after normalization.
    #[must_use]
    pub fn grade(&self, submission: &str) -> Verdict {
        let submitted = normalize(submission);
        Verdict::from_bool(!submitted.is_empty() && self.accepted.contains(&submitted))
    }
}
