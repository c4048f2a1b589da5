use chrono::{DateTime, Utc};

use kioku_core::{
    model::{ItemKey, ProgressRecord, Stage, StageUpdate, UserId, Verdict},
    scheduler::Scheduler,
    time::Clock,
};
use storage::repository::ProgressStore;

use crate::error::ReviewServiceError;

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Coordinates grading an item against the stage ladder and writing the result back.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReviewService {
    clock: Clock,
    scheduler: Scheduler,
}

impl ReviewService {
    /// Create a review service using the fixed ladder and real-time clock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the clock (usually for deterministic testing).
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Current time according to the service's clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Compute the next stage and due instant for one graded answer.
    #[must_use]
    pub fn review(&self, stage: Stage, verdict: Verdict, reviewed_at: DateTime<Utc>) -> StageUpdate {
        self.scheduler.calculate(stage, verdict, reviewed_at)
    }

    /// Write a computed update into the user's progress record.
    ///
    /// Each call commits on its own; nothing is rolled back if a later write fails.
    ///
    /// # Errors
    ///
    /// Returns `ReviewServiceError::Storage` if the record is missing or the store fails.
    pub async fn apply_persisted(
        &self,
        store: &dyn ProgressStore,
        user: UserId,
        key: ItemKey,
        update: &StageUpdate,
        verdict: Verdict,
        reviewed_at: DateTime<Utc>,
    ) -> Result<ProgressRecord, ReviewServiceError> {
        let record = store
            .apply_update(user, key, update, verdict, reviewed_at)
            .await?;
        tracing::debug!(
            user = %user,
            key = %key,
            stage = %record.stage,
            next_due = %record.next_due,
            "persisted review"
        );
        Ok(record)
    }

    /// Load a record, grade it at the service clock's "now", and persist the result.
    ///
    /// # Errors
    ///
    /// Returns `ReviewServiceError::Storage` if the record is missing or the store fails.
    pub async fn review_persisted(
        &self,
        store: &dyn ProgressStore,
        user: UserId,
        key: ItemKey,
        verdict: Verdict,
    ) -> Result<ProgressRecord, ReviewServiceError> {
        let current = store.get_progress(user, key).await?;
        let reviewed_at = self.now();
        let update = self.review(current.stage, verdict, reviewed_at);
        self.apply_persisted(store, user, key, &update, verdict, reviewed_at)
            .await
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
