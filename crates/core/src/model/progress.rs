use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{ItemKey, Stage, StageUpdate, UserId, Verdict};
use crate::scheduler;

/// Persistent scheduling state for one (user, item) pair.
///
/// Created at stage 0 and due immediately on first exposure; afterwards only
/// mutated by applying scheduler output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub user_id: UserId,
    pub key: ItemKey,
    pub stage: Stage,
    pub next_due: DateTime<Utc>,
    pub correct_count: u32,
    pub incorrect_count: u32,
    pub last_reviewed_at: Option<DateTime<Utc>>,
}

impl ProgressRecord {
    #[must_use]
    pub fn new(user_id: UserId, key: ItemKey, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            key,
            stage: Stage::MIN,
            next_due: now,
            correct_count: 0,
            incorrect_count: 0,
            last_reviewed_at: None,
        }
    }

    /// Write one graded answer into the record.
    pub fn apply(&mut self, update: &StageUpdate, verdict: Verdict, reviewed_at: DateTime<Utc>) {
        self.stage = update.new_stage;
        self.next_due = update.next_due;
        match verdict {
            Verdict::Correct => self.correct_count = self.correct_count.saturating_add(1),
            Verdict::Incorrect => self.incorrect_count = self.incorrect_count.saturating_add(1),
        }
        self.last_reviewed_at = Some(reviewed_at);
    }

    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        scheduler::is_due(self.next_due, now)
    }

    #[must_use]
    pub fn review_count(&self) -> u32 {
        self.correct_count.saturating_add(self.incorrect_count)
    }

    #[must_use]
    pub fn is_new(&self) -> bool {
        self.last_reviewed_at.is_none()
    }
}
