use chrono::{DateTime, Duration, Utc};

use crate::model::{MAX_STAGE, MIN_STAGE, Stage, StageUpdate, Verdict};

//
// ─── INTERVAL TABLE ────────────────────────────────────────────────────────────
//

/// Review interval in hours, indexed by stage.
///
/// Stage 0 means "due immediately"; stages 1..=8 strictly increase. Every
/// other interval-derived value in the crate reads from this table.
pub const INTERVAL_HOURS: [i64; MAX_STAGE as usize + 1] = [0, 4, 8, 24, 72, 168, 336, 720, 2880];

/// Stages gained on a correct answer.
const PROMOTION_STEP: i64 = 1;

/// Stages lost on an incorrect answer. Harsher than promotion on purpose.
const DEMOTION_STEP: i64 = 2;

const HOURS_PER_DAY: i64 = 24;
const HOURS_PER_WEEK: i64 = 24 * 7;
const HOURS_PER_MONTH: i64 = 24 * 30;

/// Interval to wait after reaching `stage`.
#[must_use]
pub fn interval_for(stage: Stage) -> Duration {
    Duration::hours(INTERVAL_HOURS[stage.index()])
}

/// Compute the stage and next-due instant after one graded answer.
///
/// - correct: `min(stage + 1, MAX_STAGE)`
/// - incorrect: `max(stage - 2, MIN_STAGE)`
///
/// The interval is added to `now` (the grading instant), not to the instant the
/// item fell due, so late reviews are not compensated.
///
/// # Examples
///
/// ```
/// # use kioku_core::model::{Stage, Verdict};
/// # use kioku_core::scheduler::calculate;
/// let now = kioku_core::time::fixed_now();
/// let update = calculate(Stage::MIN, Verdict::Correct, now);
/// assert_eq!(update.new_stage.value(), 1);
/// assert_eq!(update.next_due, now + chrono::Duration::hours(4));
/// ```
#[must_use]
pub fn calculate(current: Stage, verdict: Verdict, now: DateTime<Utc>) -> StageUpdate {
    let current = i64::from(current.value());
    let target = match verdict {
        Verdict::Correct => (current + PROMOTION_STEP).min(i64::from(MAX_STAGE)),
        Verdict::Incorrect => (current - DEMOTION_STEP).max(i64::from(MIN_STAGE)),
    };
    let new_stage = Stage::saturating(target);
    StageUpdate::new(new_stage, now + interval_for(new_stage))
}

/// Whether something scheduled for `next_due` may be presented at `now`.
///
/// Inclusive: an item due exactly now is due.
#[must_use]
pub fn is_due(next_due: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    next_due <= now
}

/// Human-readable interval for a stage, e.g. `"4 hours"` or `"1 week"`.
#[must_use]
pub fn describe_interval(stage: Stage) -> String {
    let hours = INTERVAL_HOURS[stage.index()];
    if hours == 0 {
        return "now".to_owned();
    }
    let (amount, unit) = if hours < HOURS_PER_DAY {
        (hours, "hour")
    } else if hours < HOURS_PER_WEEK {
        (hours / HOURS_PER_DAY, "day")
    } else if hours < HOURS_PER_MONTH {
        (hours / HOURS_PER_WEEK, "week")
    } else {
        (hours / HOURS_PER_MONTH, "month")
    };
    if amount == 1 {
        format!("1 {unit}")
    } else {
        format!("{amount} {unit}s")
    }
}

//
// ─── SCHEDULER ─────────────────────────────────────────────────────────────────
//

/// Fixed-ladder scheduler.
///
/// Stateless; exists so services can hold and inject a scheduler value.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scheduler;

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    #[must_use]
    pub fn calculate(&self, current: Stage, verdict: Verdict, now: DateTime<Utc>) -> StageUpdate {
        calculate(current, verdict, now)
    }

    #[must_use]
    pub fn describe_interval(&self, stage: Stage) -> String {
        describe_interval(stage)
    }

    #[must_use]
    pub fn is_due(&self, next_due: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        is_due(next_due, now)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
