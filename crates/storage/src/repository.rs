use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kioku_core::model::{
    ItemKey, ProgressRecord, ReviewSessionItem, ReviewableItem, SessionSummary, StageUpdate,
    UserId, Verdict,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A due progress record joined with the content needed to present it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueItem {
    pub progress: ProgressRecord,
    pub item: ReviewableItem,
}

impl DueItem {
    /// Project into the session view at the record's current stage.
    #[must_use]
    pub fn to_session_item(&self) -> ReviewSessionItem {
        self.item.to_session_item(self.progress.stage)
    }
}

/// Progress store contract: per-(user, item) stage and next-due timestamp.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Fetch records with `next_due <= now`, oldest first, joined with content.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn fetch_due(
        &self,
        user: UserId,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<DueItem>, StorageError>;

    /// Write one graded answer into the user's record for `key`.
    ///
    /// Each call commits independently.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the record does not exist, or other storage errors.
    async fn apply_update(
        &self,
        user: UserId,
        key: ItemKey,
        update: &StageUpdate,
        verdict: Verdict,
        reviewed_at: DateTime<Utc>,
    ) -> Result<ProgressRecord, StorageError>;

    /// Fetch a single record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_progress(&self, user: UserId, key: ItemKey)
    -> Result<ProgressRecord, StorageError>;

    /// Start tracking an item for a user: stage 0, due `now`. Existing records are left alone.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn track_item(
        &self,
        user: UserId,
        key: ItemKey,
        now: DateTime<Utc>,
    ) -> Result<ProgressRecord, StorageError>;
}

/// Content lookup for reviewable items.
#[async_trait]
pub trait ItemRepository: Send + Sync {
    /// Persist or replace an item's content.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the item cannot be stored.
    async fn upsert_item(&self, item: &ReviewableItem) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_item(&self, key: ItemKey) -> Result<ReviewableItem, StorageError>;
}

/// Storage for end-of-session summaries.
#[async_trait]
pub trait SessionSummaryRepository: Send + Sync {
    /// Append a summary and return its id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the summary cannot be stored.
    async fn append_summary(
        &self,
        user: UserId,
        summary: &SessionSummary,
    ) -> Result<i64, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_summary(&self, id: i64) -> Result<SessionSummary, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    items: Arc<Mutex<HashMap<ItemKey, ReviewableItem>>>,
    progress: Arc<Mutex<HashMap<(UserId, ItemKey), ProgressRecord>>>,
    summaries: Arc<Mutex<Vec<(UserId, SessionSummary)>>>,
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ItemRepository for InMemoryRepository {
    async fn upsert_item(&self, item: &ReviewableItem) -> Result<(), StorageError> {
        let mut guard = self.items.lock().map_err(poisoned)?;
        guard.insert(item.key(), item.clone());
        Ok(())
    }

    async fn get_item(&self, key: ItemKey) -> Result<ReviewableItem, StorageError> {
        let guard = self.items.lock().map_err(poisoned)?;
        guard.get(&key).cloned().ok_or(StorageError::NotFound)
    }
}

#[async_trait]
impl ProgressStore for InMemoryRepository {
    async fn fetch_due(
        &self,
        user: UserId,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<DueItem>, StorageError> {
        let mut due: Vec<ProgressRecord> = {
            let guard = self.progress.lock().map_err(poisoned)?;
            guard
                .values()
                .filter(|record| record.user_id == user && record.is_due(now))
                .cloned()
                .collect()
        };
        due.sort_by_key(|record| (record.next_due, record.key));

        let items = self.items.lock().map_err(poisoned)?;
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        let mut out = Vec::with_capacity(due.len().min(limit));
        for progress in due {
            if out.len() >= limit {
                break;
            }
            match items.get(&progress.key) {
                Some(item) => out.push(DueItem {
                    item: item.clone(),
                    progress,
                }),
                None => tracing::warn!(key = %progress.key, "due record has no content, skipping"),
            }
        }
        Ok(out)
    }

    async fn apply_update(
        &self,
        user: UserId,
        key: ItemKey,
        update: &StageUpdate,
        verdict: Verdict,
        reviewed_at: DateTime<Utc>,
    ) -> Result<ProgressRecord, StorageError> {
        let mut guard = self.progress.lock().map_err(poisoned)?;
        let record = guard.get_mut(&(user, key)).ok_or(StorageError::NotFound)?;
        record.apply(update, verdict, reviewed_at);
        Ok(record.clone())
    }

    async fn get_progress(
        &self,
        user: UserId,
        key: ItemKey,
    ) -> Result<ProgressRecord, StorageError> {
        let guard = self.progress.lock().map_err(poisoned)?;
        guard.get(&(user, key)).cloned().ok_or(StorageError::NotFound)
    }

    async fn track_item(
        &self,
        user: UserId,
        key: ItemKey,
        now: DateTime<Utc>,
    ) -> Result<ProgressRecord, StorageError> {
        let mut guard = self.progress.lock().map_err(poisoned)?;
        let record = guard
            .entry((user, key))
            .or_insert_with(|| ProgressRecord::new(user, key, now));
        Ok(record.clone())
    }
}

#[async_trait]
impl SessionSummaryRepository for InMemoryRepository {
    async fn append_summary(
        &self,
        user: UserId,
        summary: &SessionSummary,
    ) -> Result<i64, StorageError> {
        let mut guard = self.summaries.lock().map_err(poisoned)?;
        guard.push((user, summary.clone()));
        i64::try_from(guard.len())
            .map_err(|_| StorageError::Serialization("summary id overflow".into()))
    }

    async fn get_summary(&self, id: i64) -> Result<SessionSummary, StorageError> {
        let guard = self.summaries.lock().map_err(poisoned)?;
        let index = id
            .checked_sub(1)
            .and_then(|i| usize::try_from(i).ok())
            .ok_or(StorageError::NotFound)?;
        guard
            .get(index)
            .map(|(_, summary)| summary.clone())
            .ok_or(StorageError::NotFound)
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub items: Arc<dyn ItemRepository>,
    pub progress: Arc<dyn ProgressStore>,
    pub session_summaries: Arc<dyn SessionSummaryRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        Self {
            items: Arc::new(repo.clone()),
            progress: Arc::new(repo.clone()),
            session_summaries: Arc::new(repo),
        }
    }
}
