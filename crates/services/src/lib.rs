#![forbid(unsafe_code)]

pub mod error;
pub mod review_service;
pub mod sessions;

pub use kioku_core::Clock;
pub use sessions as session;

pub use error::{ReviewServiceError, SessionError, SettingsError};
pub use review_service::ReviewService;

pub use sessions::{
    AnswerFeedback, AnswerOutcome, PersistenceWarning, RetryPolicy, ReviewLoopService,
    ReviewSession, SessionProgress, SessionSettings, SessionState,
};
