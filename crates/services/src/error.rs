//! Shared error types for the services crate.

use thiserror::Error;

use kioku_core::model::SessionSummaryError;
use storage::repository::StorageError;

/// Errors emitted by `ReviewService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReviewServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by session services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("session is not presenting an item")]
    NotPresenting,
    #[error("session is not awaiting acknowledgement")]
    NotAwaitingAcknowledge,
    #[error("session already completed")]
    Completed,
    #[error("session is not complete yet")]
    Incomplete,
    #[error("session has no owning user")]
    Unowned,
    #[error(transparent)]
    Summary(#[from] SessionSummaryError),
    #[error(transparent)]
    Review(#[from] ReviewServiceError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while validating `SessionSettings`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("max_items must be greater than zero when set")]
    ZeroMaxItems,
}
