mod ids;
mod item;
mod progress;
mod review;
mod session;
mod stage;

pub use ids::{ItemId, ItemKey, ItemType, ParseIdError, UserId};

pub use item::{ItemError, KanjiItem, ReviewSessionItem, ReviewableItem, VocabularyItem};
pub use progress::ProgressRecord;
pub use review::{StageUpdate, Verdict};
pub use session::{SessionResult, SessionSummary, SessionSummaryError, accuracy_percent};
pub use stage::{MAX_STAGE, MIN_STAGE, Stage, StageError};
