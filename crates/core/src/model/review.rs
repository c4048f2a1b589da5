use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::stage::Stage;

//
// ─── VERDICT ──────────────────────────────────────────────────────────────────
//

/// Outcome of grading one submitted answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Correct,
    Incorrect,
}

impl Verdict {
    #[must_use]
    pub fn from_bool(is_correct: bool) -> Self {
        if is_correct {
            Self::Correct
        } else {
            Self::Incorrect
        }
    }

    #[must_use]
    pub fn is_correct(self) -> bool {
        matches!(self, Verdict::Correct)
    }
}

//
// ─── STAGE UPDATE ─────────────────────────────────────────────────────────────
//

/// Output of the scheduler for a single graded answer.
///
/// - `new_stage`: stage after promotion or demotion
/// - `next_due`: grading instant plus the interval of `new_stage`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageUpdate {
    pub new_stage: Stage,
    pub next_due: DateTime<Utc>,
}

impl StageUpdate {
    #[must_use]
    pub fn new(new_stage: Stage, next_due: DateTime<Utc>) -> Self {
        Self {
            new_stage,
            next_due,
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
