use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{
    ids::{ItemId, ItemKey, ItemType},
    stage::Stage,
};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ItemError {
    #[error("{0} has an empty prompt")]
    EmptyPrompt(ItemKey),
}

//
// ─── CONTENT ───────────────────────────────────────────────────────────────────
//

/// A vocabulary word tested by its reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyItem {
    pub id: ItemId,
    pub word: String,
    pub reading: String,
    pub meanings: Vec<String>,
    #[serde(default)]
    pub alternatives: Vec<String>,
}

/// A single kanji tested by any of its readings.
///
/// The first reading is the canonical answer; the rest are accepted alternatives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KanjiItem {
    pub id: ItemId,
    pub character: String,
    pub readings: Vec<String>,
    pub meanings: Vec<String>,
}

/// Content of something that can be reviewed, resolved once at fetch time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ReviewableItem {
    Vocabulary(VocabularyItem),
    Kanji(KanjiItem),
}

impl ReviewableItem {
    /// Check the item can be presented at all.
    ///
    /// Missing answers are tolerated here: such items grade as always incorrect.
    ///
    /// # Errors
    ///
    /// Returns `ItemError::EmptyPrompt` if there is nothing to show the learner.
    pub fn validate(self) -> Result<Self, ItemError> {
        if self.prompt().trim().is_empty() {
            return Err(ItemError::EmptyPrompt(self.key()));
        }
        Ok(self)
    }

    #[must_use]
    pub fn item_type(&self) -> ItemType {
        match self {
            ReviewableItem::Vocabulary(_) => ItemType::Vocabulary,
            ReviewableItem::Kanji(_) => ItemType::Kanji,
        }
    }

    #[must_use]
    pub fn id(&self) -> ItemId {
        match self {
            ReviewableItem::Vocabulary(v) => v.id,
            ReviewableItem::Kanji(k) => k.id,
        }
    }

    #[must_use]
    pub fn key(&self) -> ItemKey {
        ItemKey::new(self.item_type(), self.id())
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        match self {
            ReviewableItem::Vocabulary(v) => &v.word,
            ReviewableItem::Kanji(k) => &k.character,
        }
    }

    #[must_use]
    pub fn expected_answer(&self) -> &str {
        match self {
            ReviewableItem::Vocabulary(v) => &v.reading,
            ReviewableItem::Kanji(k) => k.readings.first().map_or("", String::as_str),
        }
    }

    #[must_use]
    pub fn alternatives(&self) -> &[String] {
        match self {
            ReviewableItem::Vocabulary(v) => &v.alternatives,
            ReviewableItem::Kanji(k) => k.readings.get(1..).unwrap_or(&[]),
        }
    }

    #[must_use]
    pub fn gloss(&self) -> String {
        match self {
            ReviewableItem::Vocabulary(v) => v.meanings.join(", "),
            ReviewableItem::Kanji(k) => k.meanings.join(", "),
        }
    }

    /// Project into the display shape used by the session runner.
    #[must_use]
    pub fn to_session_item(&self, stage: Stage) -> ReviewSessionItem {
        ReviewSessionItem {
            key: self.key(),
            prompt: self.prompt().to_owned(),
            expected: self.expected_answer().to_owned(),
            alternatives: self.alternatives().to_vec(),
            gloss: self.gloss(),
            stage,
        }
    }
}

//
// ─── SESSION VIEW ──────────────────────────────────────────────────────────────
//

/// Everything needed to present one question.
///
/// Rebuilt each session from stored progress plus content; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewSessionItem {
    pub key: ItemKey,
    pub prompt: String,
    pub expected: String,
    pub alternatives: Vec<String>,
    pub gloss: String,
    pub stage: Stage,
}

impl ReviewSessionItem {
    /// Copy carrying a different stage, used when re-queuing a failed item.
    #[must_use]
    pub fn with_stage(&self, stage: Stage) -> Self {
        Self {
            stage,
            ..self.clone()
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn water() -> ReviewableItem {
        ReviewableItem::Vocabulary(VocabularyItem {
            id: ItemId::new(1),
            word: "水".into(),
            reading: "みず".into(),
            meanings: vec!["water".into()],
            alternatives: Vec::new(),
        })
    }

    fn day_kanji() -> ReviewableItem {
        ReviewableItem::Kanji(KanjiItem {
            id: ItemId::new(1),
            character: "日".into(),
            readings: vec!["にち".into(), "ひ".into(), "か".into()],
            meanings: vec!["day".into(), "sun".into()],
        })
    }

    #[test]
    fn vocabulary_projects_reading_as_answer() {
        let item = water().to_session_item(Stage::MIN);
        assert_eq!(item.key, ItemKey::vocabulary(1));
        assert_eq!(item.prompt, "水");
        assert_eq!(item.expected, "みず");
        assert!(item.alternatives.is_empty());
        assert_eq!(item.gloss, "water");
    }

    #[test]
    fn kanji_splits_readings_into_answer_and_alternatives() {
        let item = day_kanji().to_session_item(Stage::new(3).unwrap());
        assert_eq!(item.key, ItemKey::kanji(1));
        assert_eq!(item.expected, "にち");
        assert_eq!(item.alternatives, vec!["ひ".to_string(), "か".to_string()]);
        assert_eq!(item.gloss, "day, sun");
        assert_eq!(item.stage.value(), 3);
    }

    #[test]
    fn kanji_without_readings_has_empty_answer() {
        let item = ReviewableItem::Kanji(KanjiItem {
            id: ItemId::new(2),
            character: "月".into(),
            readings: Vec::new(),
            meanings: vec!["moon".into()],
        });
        assert_eq!(item.expected_answer(), "");
        assert!(item.alternatives().is_empty());
        assert!(item.validate().is_ok());
    }

    #[test]
    fn validate_rejects_blank_prompt() {
        let item = ReviewableItem::Vocabulary(VocabularyItem {
            id: ItemId::new(5),
            word: "  ".into(),
            reading: "x".into(),
            meanings: Vec::new(),
            alternatives: Vec::new(),
        });
        assert_eq!(
            item.validate().unwrap_err(),
            ItemError::EmptyPrompt(ItemKey::vocabulary(5))
        );
    }

    #[test]
    fn with_stage_keeps_content() {
        let item = water().to_session_item(Stage::new(4).unwrap());
        let retry = item.with_stage(Stage::new(2).unwrap());
        assert_eq!(retry.prompt, item.prompt);
        assert_eq!(retry.stage.value(), 2);
    }
}
