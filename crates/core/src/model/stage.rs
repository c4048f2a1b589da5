use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Lowest rung of the ladder: due immediately.
pub const MIN_STAGE: u8 = 0;

/// Highest rung of the ladder ("graduated"). Correct answers stop advancing here,
/// incorrect answers still demote.
pub const MAX_STAGE: u8 = 8;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StageError {
    #[error("stage must be in {MIN_STAGE}..={MAX_STAGE}, got {0}")]
    OutOfRange(i64),
}

/// Rank in the spaced-repetition ladder.
///
/// Always within `[MIN_STAGE, MAX_STAGE]`; the only ways to build one are the
/// checked `new` and the clamping `saturating`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Stage(u8);

impl Stage {
    pub const MIN: Stage = Stage(MIN_STAGE);
    pub const MAX: Stage = Stage(MAX_STAGE);

    /// # Errors
    ///
    /// Returns `StageError::OutOfRange` if `value` exceeds `MAX_STAGE`.
    pub fn new(value: u8) -> Result<Self, StageError> {
        if value > MAX_STAGE {
            return Err(StageError::OutOfRange(i64::from(value)));
        }
        Ok(Self(value))
    }

    /// Clamp an arbitrary integer into the ladder.
    #[must_use]
    pub fn saturating(value: i64) -> Self {
        let clamped = value.clamp(i64::from(MIN_STAGE), i64::from(MAX_STAGE));
        // clamped fits in u8 by construction
        Self(u8::try_from(clamped).unwrap_or(MAX_STAGE))
    }

    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }

    #[must_use]
    pub fn index(self) -> usize {
        usize::from(self.0)
    }

    #[must_use]
    pub fn is_graduated(self) -> bool {
        self.0 == MAX_STAGE
    }

    /// Iterate every stage from `MIN` to `MAX` inclusive.
    pub fn all() -> impl Iterator<Item = Stage> {
        (MIN_STAGE..=MAX_STAGE).map(Stage)
    }
}

impl TryFrom<u8> for Stage {
    type Error = StageError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Stage::new(value)
    }
}

impl TryFrom<i64> for Stage {
    type Error = StageError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .map_err(|_| StageError::OutOfRange(value))
            .and_then(Stage::new)
    }
}

impl From<Stage> for u8 {
    fn from(stage: Stage) -> Self {
        stage.0
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_above_max() {
        assert!(Stage::new(MAX_STAGE).is_ok());
        assert_eq!(Stage::new(9), Err(StageError::OutOfRange(9)));
    }

    #[test]
    fn saturating_clamps_both_ends() {
        assert_eq!(Stage::saturating(-3), Stage::MIN);
        assert_eq!(Stage::saturating(42), Stage::MAX);
        assert_eq!(Stage::saturating(5).value(), 5);
    }

    #[test]
    fn try_from_i64_rejects_negative() {
        assert_eq!(Stage::try_from(-1_i64), Err(StageError::OutOfRange(-1)));
        assert_eq!(Stage::try_from(3_i64).unwrap().value(), 3);
    }

    #[test]
    fn all_covers_ladder() {
        let stages: Vec<u8> = Stage::all().map(Stage::value).collect();
        assert_eq!(stages, (0..=8).collect::<Vec<_>>());
        assert!(Stage::MAX.is_graduated());
    }
}
