use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{ItemKey, Stage};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionSummaryError {
    #[error("completed_at is before started_at")]
    InvalidTimeRange,

    #[error("too many answers for a single session: {len}")]
    TooManyAnswers { len: usize },

    #[error("correct answers ({correct}) exceed total answers ({total})")]
    CountMismatch { correct: u32, total: u32 },
}

/// One graded answer within a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionResult {
    pub key: ItemKey,
    pub correct: bool,
    pub new_stage: Stage,
    pub next_due: DateTime<Utc>,
    /// Round the answer was given in; the initial pass is round 1.
    pub round: u32,
}

/// Aggregate of a completed review session, handed to summary consumers.
///
/// Counts cover every graded answer including retries, so an item failed
/// twice and then answered correctly contributes three answers.
/// Rehydrate through [`SessionSummary::from_persisted`], which checks the counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
    total_answers: u32,
    correct_count: u32,
    final_stages: Vec<(ItemKey, Stage)>,
    deferred: Vec<ItemKey>,
}

/// Percentage of correct answers rounded half up; 0 for an empty session.
#[must_use]
pub fn accuracy_percent(correct: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let correct = u64::from(correct.min(total));
    let total = u64::from(total);
    let pct = (correct * 200 + total) / (total * 2);
    // pct <= 100
    u32::try_from(pct).unwrap_or(100)
}

impl SessionSummary {
    /// Rehydrate a summary from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `SessionSummaryError::InvalidTimeRange` or `CountMismatch` on inconsistent input.
    pub fn from_persisted(
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        total_answers: u32,
        correct_count: u32,
        final_stages: Vec<(ItemKey, Stage)>,
        deferred: Vec<ItemKey>,
    ) -> Result<Self, SessionSummaryError> {
        if completed_at < started_at {
            return Err(SessionSummaryError::InvalidTimeRange);
        }
        if correct_count > total_answers {
            return Err(SessionSummaryError::CountMismatch {
                correct: correct_count,
                total: total_answers,
            });
        }
        Ok(Self {
            started_at,
            completed_at,
            total_answers,
            correct_count,
            final_stages,
            deferred,
        })
    }

    /// Build a summary from the graded answers of a session.
    ///
    /// `final_stages` keeps one entry per distinct item, in first-answer order,
    /// holding the stage produced by its last answer.
    ///
    /// # Errors
    ///
    /// Returns `SessionSummaryError::InvalidTimeRange` if `completed_at` is before `started_at`.
    /// Returns `SessionSummaryError::TooManyAnswers` if the answer count cannot fit in `u32`.
    pub fn from_results(
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        results: &[SessionResult],
        deferred: Vec<ItemKey>,
    ) -> Result<Self, SessionSummaryError> {
        let total = u32::try_from(results.len())
            .map_err(|_| SessionSummaryError::TooManyAnswers { len: results.len() })?;
        let mut correct = 0_u32;
        let mut final_stages: Vec<(ItemKey, Stage)> = Vec::new();

        for result in results {
            if result.correct {
                correct = correct.saturating_add(1);
            }
            match final_stages.iter_mut().find(|(key, _)| *key == result.key) {
                Some(entry) => entry.1 = result.new_stage,
                None => final_stages.push((result.key, result.new_stage)),
            }
        }

        Self::from_persisted(started_at, completed_at, total, correct, final_stages, deferred)
    }

    /// Summary for a session that had nothing to review.
    #[must_use]
    pub fn empty(at: DateTime<Utc>) -> Self {
        Self {
            started_at: at,
            completed_at: at,
            total_answers: 0,
            correct_count: 0,
            final_stages: Vec::new(),
            deferred: Vec::new(),
        }
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    #[must_use]
    pub fn total_answers(&self) -> u32 {
        self.total_answers
    }

    #[must_use]
    pub fn correct_count(&self) -> u32 {
        self.correct_count
    }

    #[must_use]
    pub fn incorrect_count(&self) -> u32 {
        self.total_answers.saturating_sub(self.correct_count)
    }

    #[must_use]
    pub fn accuracy(&self) -> u32 {
        accuracy_percent(self.correct_count, self.total_answers)
    }

    #[must_use]
    pub fn final_stages(&self) -> &[(ItemKey, Stage)] {
        &self.final_stages
    }

    /// Items that used up their retry budget and were left for the next due cycle.
    #[must_use]
    pub fn deferred(&self) -> &[ItemKey] {
        &self.deferred
    }
}
