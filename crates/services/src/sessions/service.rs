use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;

use kioku_core::answer::AnswerKey;
use kioku_core::model::{
    ItemKey, ReviewSessionItem, SessionResult, SessionSummary, StageUpdate, UserId, Verdict,
};
use kioku_core::scheduler::{self, Scheduler};

use super::plan::{RetryPolicy, SessionSettings};
use super::progress::SessionProgress;
use crate::error::SessionError;

//
// ─── STATE ─────────────────────────────────────────────────────────────────────
//

/// Where the session is in its submit/acknowledge cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for an answer to `current_item()`.
    Presenting,
    /// An answer was graded; waiting for `acknowledge()`.
    Feedback,
    /// No items left in the round and nothing pending retry.
    Complete,
}

/// Result of grading one submission, shown until acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerFeedback {
    /// The item as presented (its `stage` is the stage before grading).
    pub item: ReviewSessionItem,
    /// `None` for a timer-expired submission.
    pub submitted: Option<String>,
    pub verdict: Verdict,
    /// Scheduler output staged for the progress store.
    pub update: StageUpdate,
    /// Human-readable wait until the item is due again.
    pub next_review_in: String,
    /// The item will come back in the next round.
    pub requeued: bool,
    /// The item used up its retries and is left to its next due cycle.
    pub deferred: bool,
}

impl AnswerFeedback {
    #[must_use]
    pub fn is_correct(&self) -> bool {
        self.verdict.is_correct()
    }
}

/// A failed write reported by the store; grading state is unaffected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistenceWarning {
    /// Item whose progress update failed; `None` for the session summary.
    pub key: Option<ItemKey>,
    pub message: String,
}

impl fmt::Display for PersistenceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.key {
            Some(key) => write!(f, "failed to save progress for {key}: {}", self.message),
            None => write!(f, "failed to save session summary: {}", self.message),
        }
    }
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// In-memory review session over a list of due items.
///
/// Items are presented in the supplied order. Every failure is graded, staged for
/// persistence and (retry policy permitting) queued for the next round, which
/// replays failures in the order they happened. The session never writes to a
/// store itself; callers persist `AnswerFeedback::update`.
pub struct ReviewSession {
    user: Option<UserId>,
    scheduler: Scheduler,
    retry_policy: RetryPolicy,
    round_items: Vec<ReviewSessionItem>,
    index: usize,
    round: u32,
    retry_queue: Vec<ReviewSessionItem>,
    answer_keys: HashMap<ItemKey, AnswerKey>,
    failures: HashMap<ItemKey, u32>,
    state: SessionState,
    feedback: Option<AnswerFeedback>,
    results: Vec<SessionResult>,
    deferred: Vec<ItemKey>,
    warnings: Vec<PersistenceWarning>,
    started_at: DateTime<Utc>,
    last_answer_at: Option<DateTime<Utc>>,
    summary: Option<SessionSummary>,
    summary_id: Option<i64>,
}

impl ReviewSession {
    /// Start a session over `items`.
    ///
    /// An empty list yields a session that is already `Complete` with an empty summary.
    #[must_use]
    pub fn new(
        items: Vec<ReviewSessionItem>,
        settings: &SessionSettings,
        started_at: DateTime<Utc>,
    ) -> Self {
        let answer_keys = items
            .iter()
            .map(|item| (item.key, AnswerKey::for_item(item)))
            .collect();

        let mut session = Self {
            user: None,
            scheduler: Scheduler::new(),
            retry_policy: settings.retry_policy,
            round_items: items,
            index: 0,
            round: 1,
            retry_queue: Vec::new(),
            answer_keys,
            failures: HashMap::new(),
            state: SessionState::Presenting,
            feedback: None,
            results: Vec::new(),
            deferred: Vec::new(),
            warnings: Vec::new(),
            started_at,
            last_answer_at: None,
            summary: None,
            summary_id: None,
        };

        if session.round_items.is_empty() {
            session.state = SessionState::Complete;
            session.summary = Some(SessionSummary::empty(started_at));
        }
        session
    }

    /// Attach the learner whose progress this session updates.
    #[must_use]
    pub fn for_user(mut self, user: UserId) -> Self {
        self.user = Some(user);
        self
    }

    #[must_use]
    pub fn user(&self) -> Option<UserId> {
        self.user
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.state == SessionState::Complete
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn results(&self) -> &[SessionResult] {
        &self.results
    }

    /// Items that exhausted their retries this session.
    #[must_use]
    pub fn deferred(&self) -> &[ItemKey] {
        &self.deferred
    }

    /// The item awaiting an answer, if the session is presenting.
    #[must_use]
    pub fn current_item(&self) -> Option<&ReviewSessionItem> {
        match self.state {
            SessionState::Presenting => self.round_items.get(self.index),
            SessionState::Feedback | SessionState::Complete => None,
        }
    }

    /// Feedback for the last graded answer, while awaiting acknowledgement.
    #[must_use]
    pub fn feedback(&self) -> Option<&AnswerFeedback> {
        match self.state {
            SessionState::Feedback => self.feedback.as_ref(),
            SessionState::Presenting | SessionState::Complete => None,
        }
    }

    /// Grade `answer` against the current item.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` once the session is over and
    /// `SessionError::NotPresenting` while feedback is pending.
    pub fn submit(
        &mut self,
        answer: &str,
        now: DateTime<Utc>,
    ) -> Result<&AnswerFeedback, SessionError> {
        self.grade_current(Some(answer), now)
    }

    /// Grade the current item as incorrect without comparing anything.
    ///
    /// Used when an answer timer runs out.
    ///
    /// # Errors
    ///
    /// Same as [`ReviewSession::submit`].
    pub fn submit_no_answer(&mut self, now: DateTime<Utc>) -> Result<&AnswerFeedback, SessionError> {
        self.grade_current(None, now)
    }

    fn grade_current(
        &mut self,
        answer: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<&AnswerFeedback, SessionError> {
        match self.state {
            SessionState::Presenting => {}
            SessionState::Feedback => return Err(SessionError::NotPresenting),
            SessionState::Complete => return Err(SessionError::Completed),
        }
        let item = self
            .round_items
            .get(self.index)
            .cloned()
            .ok_or(SessionError::NotPresenting)?;

        let verdict = match (answer, self.answer_keys.get(&item.key)) {
            (Some(answer), Some(key)) => {
                if key.is_malformed() {
                    tracing::warn!(key = %item.key, "item has no usable answer; grading incorrect");
                }
                key.grade(answer)
            }
            _ => Verdict::Incorrect,
        };

        let update = self.scheduler.calculate(item.stage, verdict, now);
        self.results.push(SessionResult {
            key: item.key,
            correct: verdict.is_correct(),
            new_stage: update.new_stage,
            next_due: update.next_due,
            round: self.round,
        });
        self.last_answer_at = Some(now);

        let (requeued, deferred) = if verdict.is_correct() {
            (false, false)
        } else {
            let failures = self.failures.entry(item.key).or_insert(0);
            *failures = failures.saturating_add(1);
            if self.retry_policy.allows_retry(*failures) {
                self.retry_queue.push(item.with_stage(update.new_stage));
                (true, false)
            } else {
                if !self.deferred.contains(&item.key) {
                    self.deferred.push(item.key);
                }
                tracing::debug!(key = %item.key, failures = *failures, "retry cap reached, deferring");
                (false, true)
            }
        };

        tracing::debug!(
            key = %item.key,
            round = self.round,
            correct = verdict.is_correct(),
            from = %item.stage,
            to = %update.new_stage,
            "graded answer"
        );

        self.state = SessionState::Feedback;
        let feedback = self.feedback.insert(AnswerFeedback {
            next_review_in: scheduler::describe_interval(update.new_stage),
            item,
            submitted: answer.map(str::to_owned),
            verdict,
            update,
            requeued,
            deferred,
        });
        Ok(&*feedback)
    }

    /// Move past the current feedback.
    ///
    /// Advances within the round, rolls the retry queue over into a new round, or
    /// completes the session when nothing is left.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotAwaitingAcknowledge` unless feedback is pending.
    /// Returns `SessionError::Summary` if the final summary cannot be built.
    pub fn acknowledge(&mut self) -> Result<SessionState, SessionError> {
        if self.state != SessionState::Feedback {
            return Err(SessionError::NotAwaitingAcknowledge);
        }

        let next = self.index + 1;
        if next < self.round_items.len() {
            self.index = next;
            self.state = SessionState::Presenting;
        } else if !self.retry_queue.is_empty() {
            self.round_items = std::mem::take(&mut self.retry_queue);
            self.index = 0;
            self.round = self.round.saturating_add(1);
            self.state = SessionState::Presenting;
            tracing::debug!(
                round = self.round,
                items = self.round_items.len(),
                "starting retry round"
            );
        } else {
            let completed_at = self
                .last_answer_at
                .map_or(self.started_at, |t| t.max(self.started_at));
            let summary = SessionSummary::from_results(
                self.started_at,
                completed_at,
                &self.results,
                self.deferred.clone(),
            )?;
            tracing::info!(
                answers = summary.total_answers(),
                correct = summary.correct_count(),
                accuracy = summary.accuracy(),
                deferred = summary.deferred().len(),
                rounds = self.round,
                "review session complete"
            );
            self.summary = Some(summary);
            self.state = SessionState::Complete;
        }

        self.feedback = None;
        Ok(self.state)
    }

    /// End-of-session summary, available once complete.
    #[must_use]
    pub fn summary(&self) -> Option<&SessionSummary> {
        self.summary.as_ref()
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.summary.as_ref().map(SessionSummary::completed_at)
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        let position = match self.state {
            SessionState::Presenting => self.index,
            SessionState::Feedback => self.index + 1,
            SessionState::Complete => self.round_items.len(),
        };
        SessionProgress {
            round: self.round,
            position,
            round_len: self.round_items.len(),
            pending_retries: self.retry_queue.len(),
            answered: self.results.len(),
            is_complete: self.is_complete(),
        }
    }

    /// Record that persisting the update for `key` failed. Returns the stored warning.
    pub fn record_persistence_failure(
        &mut self,
        key: ItemKey,
        error: impl fmt::Display,
    ) -> PersistenceWarning {
        self.push_warning(Some(key), error)
    }

    /// Record that persisting the session summary failed. Returns the stored warning.
    pub fn record_summary_failure(&mut self, error: impl fmt::Display) -> PersistenceWarning {
        self.push_warning(None, error)
    }

    fn push_warning(&mut self, key: Option<ItemKey>, error: impl fmt::Display) -> PersistenceWarning {
        let warning = PersistenceWarning {
            key,
            message: error.to_string(),
        };
        self.warnings.push(warning.clone());
        warning
    }

    #[must_use]
    pub fn warnings(&self) -> &[PersistenceWarning] {
        &self.warnings
    }

    #[must_use]
    pub fn summary_id(&self) -> Option<i64> {
        self.summary_id
    }

    pub(crate) fn set_summary_id(&mut self, id: i64) {
        self.summary_id = Some(id);
    }
}

impl fmt::Debug for ReviewSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReviewSession")
            .field("user", &self.user)
            .field("state", &self.state)
            .field("round", &self.round)
            .field("index", &self.index)
            .field("round_len", &self.round_items.len())
            .field("retry_queue_len", &self.retry_queue.len())
            .field("results_len", &self.results.len())
            .field("deferred", &self.deferred)
            .field("warnings_len", &self.warnings.len())
            .field("started_at", &self.started_at)
            .field("summary_id", &self.summary_id)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use kioku_core::model::Stage;
    use kioku_core::time::fixed_now;

    fn item(id: u64, expected: &str, stage: u8) -> ReviewSessionItem {
        ReviewSessionItem {
            key: ItemKey::vocabulary(id),
            prompt: format!("prompt {id}"),
            expected: expected.into(),
            alternatives: Vec::new(),
            gloss: "gloss".into(),
            stage: Stage::new(stage).unwrap(),
        }
    }

    fn unbounded() -> SessionSettings {
        SessionSettings {
            retry_policy: RetryPolicy::Unbounded,
            ..SessionSettings::default()
        }
    }

    fn answer(session: &mut ReviewSession, text: &str) -> AnswerFeedback {
        let feedback = session.submit(text, fixed_now()).unwrap().clone();
        session.acknowledge().unwrap();
        feedback
    }

    #[test]
    fn empty_session_completes_immediately() {
        let session = ReviewSession::new(Vec::new(), &SessionSettings::default(), fixed_now());
        assert_eq!(session.state(), SessionState::Complete);
        assert!(session.current_item().is_none());

        let summary = session.summary().unwrap();
        assert_eq!(summary.correct_count(), 0);
        assert_eq!(summary.total_answers(), 0);
        assert_eq!(summary.accuracy(), 0);
    }

    #[test]
    fn retry_after_failure_counts_every_answer() {
        let items = vec![item(1, "みず", 0), item(2, "ひ", 2), item(3, "やま", 4)];
        let mut session = ReviewSession::new(items, &SessionSettings::default(), fixed_now());

        assert!(answer(&mut session, "mizu").is_correct());
        let failed = answer(&mut session, "ki");
        assert!(!failed.is_correct());
        assert!(failed.requeued);
        assert!(answer(&mut session, "yama").is_correct());

        assert_eq!(session.progress().round, 2);
        assert_eq!(session.current_item().unwrap().key, ItemKey::vocabulary(2));
        assert!(answer(&mut session, "hi").is_correct());

        assert!(session.is_complete());
        let summary = session.summary().unwrap();
        assert_eq!(summary.total_answers(), 4);
        assert_eq!(summary.correct_count(), 3);
        assert_eq!(summary.incorrect_count(), 1);
        assert_eq!(summary.accuracy(), 75);
        assert_eq!(
            summary.final_stages(),
            &[
                (ItemKey::vocabulary(1), Stage::new(1).unwrap()),
                (ItemKey::vocabulary(2), Stage::new(1).unwrap()),
                (ItemKey::vocabulary(3), Stage::new(5).unwrap()),
            ]
        );
        assert!(summary.deferred().is_empty());
    }

    #[test]
    fn retry_copy_carries_new_stage() {
        let mut session =
            ReviewSession::new(vec![item(1, "みず", 5)], &SessionSettings::default(), fixed_now());
        let feedback = answer(&mut session, "wrong");
        assert_eq!(feedback.update.new_stage.value(), 3);
        assert_eq!(feedback.update.next_due, fixed_now() + Duration::hours(24));
        assert_eq!(feedback.next_review_in, "1 day");

        let retry = session.current_item().unwrap();
        assert_eq!(retry.stage.value(), 3);
    }

    #[test]
    fn retries_replay_in_failure_order() {
        let items = vec![item(1, "a", 0), item(2, "i", 0), item(3, "u", 0), item(4, "e", 0)];
        let mut session = ReviewSession::new(items, &unbounded(), fixed_now());

        answer(&mut session, "x");
        answer(&mut session, "i");
        answer(&mut session, "x");
        answer(&mut session, "x");

        let progress = session.progress();
        assert_eq!(progress.round, 2);
        assert_eq!(progress.round_len, 3);
        assert_eq!(progress.pending_retries, 0);

        let mut order = Vec::new();
        while let Some(current) = session.current_item() {
            order.push(current.key.id.value());
            answer(&mut session, "x");
            if session.progress().round != 2 {
                break;
            }
        }
        assert_eq!(order, vec![1, 3, 4]);
    }

    #[test]
    fn always_wrong_items_recur_every_round_when_unbounded() {
        const ROUNDS: u32 = 25;
        let items = vec![item(1, "a", 3), item(2, "i", 0), item(3, "u", 8)];
        let mut session = ReviewSession::new(items, &unbounded(), fixed_now());

        for round in 1..=ROUNDS {
            assert_eq!(session.progress().round, round);
            assert_eq!(session.progress().round_len, 3);
            for _ in 0..3 {
                answer(&mut session, "wrong");
            }
            assert!(!session.is_complete());
        }
        assert_eq!(session.results().len(), 3 * ROUNDS as usize);
        assert!(session.results().iter().all(|r| r.new_stage.value() <= 8));
        assert!(session.deferred().is_empty());
    }

    #[test]
    fn always_wrong_items_are_deferred_under_a_cap() {
        let settings = SessionSettings {
            retry_policy: RetryPolicy::Capped { max_retries: 2 },
            ..SessionSettings::default()
        };
        let items = vec![item(1, "a", 3), item(2, "i", 0)];
        let mut session = ReviewSession::new(items, &settings, fixed_now());

        let mut answers = 0;
        while !session.is_complete() {
            let feedback = answer(&mut session, "wrong");
            answers += 1;
            assert!(answers <= 6, "session did not terminate");
            assert_eq!(feedback.deferred, !feedback.requeued);
        }

        // one first attempt plus two retries per item
        assert_eq!(answers, 6);
        let summary = session.summary().unwrap();
        assert_eq!(summary.total_answers(), 6);
        assert_eq!(summary.accuracy(), 0);
        assert_eq!(
            summary.deferred(),
            &[ItemKey::vocabulary(1), ItemKey::vocabulary(2)]
        );
        assert_eq!(summary.final_stages()[0].1, Stage::MIN);
    }

    #[test]
    fn invalid_transitions_are_rejected() {
        let mut session =
            ReviewSession::new(vec![item(1, "a", 0)], &SessionSettings::default(), fixed_now());

        assert!(matches!(
            session.acknowledge(),
            Err(SessionError::NotAwaitingAcknowledge)
        ));
        session.submit("a", fixed_now()).unwrap();
        assert!(session.current_item().is_none());
        assert!(session.feedback().is_some());
        assert!(matches!(
            session.submit("a", fixed_now()),
            Err(SessionError::NotPresenting)
        ));
        assert_eq!(session.acknowledge().unwrap(), SessionState::Complete);
        assert!(matches!(
            session.submit("a", fixed_now()),
            Err(SessionError::Completed)
        ));
        assert!(matches!(
            session.acknowledge(),
            Err(SessionError::NotAwaitingAcknowledge)
        ));
    }

    #[test]
    fn no_answer_grades_incorrect() {
        let mut session =
            ReviewSession::new(vec![item(1, "a", 2)], &SessionSettings::default(), fixed_now());
        let feedback = session.submit_no_answer(fixed_now()).unwrap();
        assert!(!feedback.is_correct());
        assert_eq!(feedback.submitted, None);
        assert_eq!(feedback.update.new_stage, Stage::MIN);
    }

    #[test]
    fn malformed_item_never_grades_correct() {
        let settings = SessionSettings {
            retry_policy: RetryPolicy::Capped { max_retries: 0 },
            ..SessionSettings::default()
        };
        let mut session = ReviewSession::new(vec![item(1, "  ", 1)], &settings, fixed_now());
        let feedback = answer(&mut session, "");
        assert!(!feedback.is_correct());
        assert!(feedback.deferred);
        assert!(session.is_complete());
    }

    #[test]
    fn persistence_warnings_do_not_change_grading() {
        let mut session = ReviewSession::new(
            vec![item(1, "a", 0), item(2, "i", 0)],
            &SessionSettings::default(),
            fixed_now(),
        );
        let first = session.submit("a", fixed_now()).unwrap().item.key;
        let warning = session.record_persistence_failure(first, "disk full");
        assert_eq!(warning.to_string(), "failed to save progress for vocabulary:1: disk full");
        session.acknowledge().unwrap();
        answer(&mut session, "i");

        assert_eq!(session.warnings().len(), 1);
        let summary = session.summary().unwrap();
        assert_eq!((summary.correct_count(), summary.total_answers()), (2, 2));
    }

    #[test]
    fn summary_spans_first_to_last_answer() {
        let start = fixed_now();
        let mut session =
            ReviewSession::new(vec![item(1, "a", 0)], &SessionSettings::default(), start);
        let later = start + Duration::minutes(3);
        session.submit("a", later).unwrap();
        session.acknowledge().unwrap();

        assert_eq!(session.completed_at(), Some(later));
        assert_eq!(session.summary().unwrap().started_at(), start);
        assert!(session.progress().is_complete);
    }
}
