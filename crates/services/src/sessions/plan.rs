use rand::rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use kioku_core::model::ReviewSessionItem;
use storage::repository::DueItem;

use crate::error::SettingsError;

const DEFAULT_MAX_RETRIES: u32 = 3;

/// How often a failed item is re-presented within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RetryPolicy {
    /// Re-queue up to `max_retries` times per item, then defer it to its next due cycle.
    Capped { max_retries: u32 },
    /// Re-queue every failure. An item that is never answered correctly keeps the
    /// session open indefinitely.
    Unbounded,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::Capped {
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl RetryPolicy {
    /// Whether an item that has now failed `failures` times gets another attempt.
    #[must_use]
    pub fn allows_retry(self, failures: u32) -> bool {
        match self {
            RetryPolicy::Capped { max_retries } => failures <= max_retries,
            RetryPolicy::Unbounded => true,
        }
    }
}

/// Per-session configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Cap on the number of due items pulled into one session.
    pub max_items: Option<u32>,
    /// Shuffle the initial due order instead of presenting oldest-due first.
    pub shuffle: bool,
    pub retry_policy: RetryPolicy,
}

impl SessionSettings {
    /// # Errors
    ///
    /// Returns `SettingsError::ZeroMaxItems` if `max_items` is `Some(0)`.
    pub fn validate(self) -> Result<Self, SettingsError> {
        if self.max_items == Some(0) {
            return Err(SettingsError::ZeroMaxItems);
        }
        Ok(self)
    }

    /// Limit to pass to `ProgressStore::fetch_due`.
    #[must_use]
    pub fn fetch_limit(&self) -> u32 {
        self.max_items.unwrap_or(u32::MAX)
    }
}

/// Turns fetched due items into the initial round of a session.
pub struct SessionBuilder<'a> {
    settings: &'a SessionSettings,
}

impl<'a> SessionBuilder<'a> {
    #[must_use]
    pub fn new(settings: &'a SessionSettings) -> Self {
        Self { settings }
    }

    /// Project due items into session items.
    ///
    /// - order is kept as supplied (the store returns oldest-due first)
    /// - at most `max_items` are kept, taken before shuffling
    /// - the kept items are shuffled when `shuffle` is set
    #[must_use]
    pub fn build(self, due: impl IntoIterator<Item = DueItem>) -> Vec<ReviewSessionItem> {
        let limit = self
            .settings
            .max_items
            .map_or(usize::MAX, |n| usize::try_from(n).unwrap_or(usize::MAX));

        let mut items: Vec<ReviewSessionItem> = due
            .into_iter()
            .take(limit)
            .map(|d| d.to_session_item())
            .collect();

        if self.settings.shuffle {
            let mut rng = rng();
            items.as_mut_slice().shuffle(&mut rng);
        }
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kioku_core::model::{ItemId, ItemKey, KanjiItem, ProgressRecord, ReviewableItem, UserId};
    use kioku_core::time::fixed_now;

    fn due(id: u64) -> DueItem {
        let key = ItemKey::kanji(id);
        DueItem {
            progress: ProgressRecord::new(UserId::new(1), key, fixed_now()),
            item: ReviewableItem::Kanji(KanjiItem {
                id: ItemId::new(id),
                character: format!("k{id}"),
                readings: vec!["やま".into()],
                meanings: vec!["mountain".into()],
            }),
        }
    }

    #[test]
    fn defaults_cap_retries_at_three() {
        let settings = SessionSettings::default();
        assert_eq!(settings.max_items, None);
        assert!(!settings.shuffle);
        assert_eq!(settings.retry_policy, RetryPolicy::Capped { max_retries: 3 });
        assert_eq!(settings.fetch_limit(), u32::MAX);
    }

    #[test]
    fn settings_deserialize_with_defaults() {
        let settings: SessionSettings = serde_json::from_str(r#"{ "max_items": 20 }"#).unwrap();
        assert_eq!(settings.max_items, Some(20));
        assert_eq!(settings.retry_policy, RetryPolicy::default());

        let settings: SessionSettings =
            serde_json::from_str(r#"{ "retry_policy": { "mode": "unbounded" } }"#).unwrap();
        assert_eq!(settings.retry_policy, RetryPolicy::Unbounded);

        let settings: SessionSettings = serde_json::from_str(
            r#"{ "shuffle": true, "retry_policy": { "mode": "capped", "max_retries": 1 } }"#,
        )
        .unwrap();
        assert!(settings.shuffle);
        assert_eq!(settings.retry_policy, RetryPolicy::Capped { max_retries: 1 });
    }

    #[test]
    fn zero_max_items_is_rejected() {
        let settings = SessionSettings {
            max_items: Some(0),
            ..SessionSettings::default()
        };
        assert_eq!(settings.validate(), Err(SettingsError::ZeroMaxItems));
    }

    #[test]
    fn retry_policy_counts_failures() {
        let capped = RetryPolicy::Capped { max_retries: 2 };
        assert!(capped.allows_retry(1));
        assert!(capped.allows_retry(2));
        assert!(!capped.allows_retry(3));
        assert!(!RetryPolicy::Capped { max_retries: 0 }.allows_retry(1));
        assert!(RetryPolicy::Unbounded.allows_retry(u32::MAX));
    }

    #[test]
    fn builder_keeps_order_and_limits() {
        let settings = SessionSettings {
            max_items: Some(2),
            ..SessionSettings::default()
        };
        let items = SessionBuilder::new(&settings).build(vec![due(3), due(1), due(2)]);
        let keys: Vec<_> = items.iter().map(|i| i.key).collect();
        assert_eq!(keys, vec![ItemKey::kanji(3), ItemKey::kanji(1)]);
    }

    #[test]
    fn shuffle_keeps_the_same_items() {
        let settings = SessionSettings {
            shuffle: true,
            ..SessionSettings::default()
        };
        let items = SessionBuilder::new(&settings).build((1..=10).map(due));
        let mut ids: Vec<u64> = items.iter().map(|i| i.key.id.value()).collect();
        ids.sort_unstable();
        assert_eq!(ids, (1..=10).collect::<Vec<_>>());
    }
}
