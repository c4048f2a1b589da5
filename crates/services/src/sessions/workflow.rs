use std::sync::Arc;

use kioku_core::model::{ProgressRecord, UserId};
use storage::repository::{ProgressStore, SessionSummaryRepository};

use super::plan::{SessionBuilder, SessionSettings};
use super::service::{AnswerFeedback, PersistenceWarning, ReviewSession, SessionState};
use crate::Clock;
use crate::error::{SessionError, SettingsError};
use crate::review_service::ReviewService;

/// Result of answering a single item in a storage-backed session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub feedback: AnswerFeedback,
    /// The stored record after the update, when persistence succeeded.
    pub record: Option<ProgressRecord>,
    /// Set when the update could not be stored; the session carries on regardless.
    pub warning: Option<PersistenceWarning>,
}

/// Orchestrates session start, persisted answering and summary storage.
#[derive(Clone)]
pub struct ReviewLoopService {
    clock: Clock,
    progress: Arc<dyn ProgressStore>,
    summaries: Arc<dyn SessionSummaryRepository>,
    settings: SessionSettings,
}

impl ReviewLoopService {
    #[must_use]
    pub fn new(
        clock: Clock,
        progress: Arc<dyn ProgressStore>,
        summaries: Arc<dyn SessionSummaryRepository>,
    ) -> Self {
        Self {
            clock,
            progress,
            summaries,
            settings: SessionSettings::default(),
        }
    }

    /// Replace the session settings.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if the settings do not validate.
    pub fn with_settings(mut self, settings: SessionSettings) -> Result<Self, SettingsError> {
        self.settings = settings.validate()?;
        Ok(self)
    }

    #[must_use]
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Start a session over the user's currently due items.
    ///
    /// With nothing due the session is complete on return and its empty
    /// summary has already been stored, like any other finished session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if due items cannot be fetched.
    pub async fn start_session(&self, user: UserId) -> Result<ReviewSession, SessionError> {
        let now = self.clock.now();
        let due = self
            .progress
            .fetch_due(user, now, self.settings.fetch_limit())
            .await?;
        let items = SessionBuilder::new(&self.settings).build(due);
        tracing::info!(user = %user, items = items.len(), "starting review session");
        let mut session = ReviewSession::new(items, &self.settings, now).for_user(user);
        if session.is_complete() {
            self.store_summary_or_warn(&mut session).await;
        }
        Ok(session)
    }

    /// Grade `answer` for the current item and persist the stage update.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Unowned` for sessions without a user and the
    /// session's own state errors. Store failures are not errors; see `AnswerOutcome::warning`.
    pub async fn submit(
        &self,
        session: &mut ReviewSession,
        answer: &str,
    ) -> Result<AnswerOutcome, SessionError> {
        self.grade_and_persist(session, Some(answer)).await
    }

    /// Timer-expiry path: grade the current item as incorrect and persist it.
    ///
    /// # Errors
    ///
    /// Same as [`ReviewLoopService::submit`].
    pub async fn submit_no_answer(
        &self,
        session: &mut ReviewSession,
    ) -> Result<AnswerOutcome, SessionError> {
        self.grade_and_persist(session, None).await
    }

    async fn grade_and_persist(
        &self,
        session: &mut ReviewSession,
        answer: Option<&str>,
    ) -> Result<AnswerOutcome, SessionError> {
        let user = session.user().ok_or(SessionError::Unowned)?;
        let reviewed_at = self.clock.now();
        let feedback = match answer {
            Some(answer) => session.submit(answer, reviewed_at)?,
            None => session.submit_no_answer(reviewed_at)?,
        }
        .clone();

        let key = feedback.item.key;
        let review_service = ReviewService::new().with_clock(self.clock);
        let (record, warning) = match review_service
            .apply_persisted(
                self.progress.as_ref(),
                user,
                key,
                &feedback.update,
                feedback.verdict,
                reviewed_at,
            )
            .await
        {
            Ok(record) => (Some(record), None),
            Err(err) => {
                tracing::warn!(user = %user, key = %key, error = %err, "failed to persist review");
                (None, Some(session.record_persistence_failure(key, &err)))
            }
        };

        Ok(AnswerOutcome {
            feedback,
            record,
            warning,
        })
    }

    /// Advance past the current feedback, storing the summary once the session completes.
    ///
    /// A failed summary write is recorded as a warning; call
    /// [`ReviewLoopService::finalize_summary`] to retry it.
    ///
    /// # Errors
    ///
    /// Returns the session's state errors.
    pub async fn acknowledge(&self, session: &mut ReviewSession) -> Result<SessionState, SessionError> {
        let state = session.acknowledge()?;
        if state == SessionState::Complete {
            self.store_summary_or_warn(session).await;
        }
        Ok(state)
    }

    async fn store_summary_or_warn(&self, session: &mut ReviewSession) {
        if let Err(err) = self.finalize_summary(session).await {
            tracing::warn!(error = %err, "failed to persist session summary");
            session.record_summary_failure(&err);
        }
    }

    /// Persist the summary of a completed session, once.
    ///
    /// Returns the existing id if the summary was already stored.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Incomplete` if the session has not finished,
    /// `SessionError::Unowned` if it has no user, and `SessionError::Storage`
    /// if persistence fails.
    pub async fn finalize_summary(&self, session: &mut ReviewSession) -> Result<i64, SessionError> {
        if let Some(id) = session.summary_id() {
            return Ok(id);
        }

        let user = session.user().ok_or(SessionError::Unowned)?;
        let summary = session.summary().ok_or(SessionError::Incomplete)?;
        let id = self.summaries.append_summary(user, summary).await?;
        session.set_summary_id(id);
        tracing::debug!(user = %user, id, "stored session summary");
        Ok(id)
    }
}
