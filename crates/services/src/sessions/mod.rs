mod plan;
mod progress;
mod service;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::{SessionError, SettingsError};
pub use plan::{RetryPolicy, SessionBuilder, SessionSettings};
pub use progress::SessionProgress;
pub use service::{AnswerFeedback, PersistenceWarning, ReviewSession, SessionState};
pub use workflow::{AnswerOutcome, ReviewLoopService};
