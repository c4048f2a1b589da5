use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use kioku_core::model::{
    ItemId, ItemKey, KanjiItem, ProgressRecord, ReviewableItem, StageUpdate, UserId, Verdict,
    VocabularyItem,
};
use kioku_core::time::fixed_now;
use services::{Clock, ReviewLoopService, SessionSettings, SessionState};
use storage::repository::{
    DueItem, InMemoryRepository, ItemRepository, ProgressStore, SessionSummaryRepository,
    StorageError,
};

async fn seed(repo: &InMemoryRepository, user: UserId) {
    let items = [
        ReviewableItem::Vocabulary(VocabularyItem {
            id: ItemId::new(1),
            word: "東京".into(),
            reading: "とうきょう".into(),
            meanings: vec!["Tokyo".into()],
            alternatives: Vec::new(),
        }),
        ReviewableItem::Kanji(KanjiItem {
            id: ItemId::new(1),
            character: "日".into(),
            readings: vec!["にち".into(), "ひ".into()],
            meanings: vec!["day".into(), "sun".into()],
        }),
        ReviewableItem::Vocabulary(VocabularyItem {
            id: ItemId::new(2),
            word: "水".into(),
            reading: "みず".into(),
            meanings: vec!["water".into()],
            alternatives: Vec::new(),
        }),
    ];
    let now = fixed_now();
    for (offset, item) in (0_i64..).zip(items.iter()) {
        repo.upsert_item(item).await.unwrap();
        // stagger due times so the session order is deterministic
        repo.track_item(user, item.key(), now - Duration::minutes(10 - offset))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn session_loop_persists_progress_and_summary() {
    let repo = InMemoryRepository::new();
    let user = UserId::new(1);
    seed(&repo, user).await;

    let loop_svc = ReviewLoopService::new(
        Clock::fixed(fixed_now()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
    );

    let mut session = loop_svc.start_session(user).await.unwrap();
    let order: Vec<ItemKey> = vec![
        ItemKey::vocabulary(1),
        ItemKey::kanji(1),
        ItemKey::vocabulary(2),
    ];
    assert_eq!(session.current_item().unwrap().key, order[0]);

    // round 1: second item wrong
    for answer in ["Toukyou", "mizu", "mizu"] {
        let outcome = loop_svc.submit(&mut session, answer).await.unwrap();
        assert!(outcome.warning.is_none());
        loop_svc.acknowledge(&mut session).await.unwrap();
    }

    // round 2: the failed kanji, answered with an alternative reading
    assert_eq!(session.progress().round, 2);
    assert_eq!(session.current_item().unwrap().key, order[1]);
    loop_svc.submit(&mut session, "hi").await.unwrap();
    let state = loop_svc.acknowledge(&mut session).await.unwrap();
    assert_eq!(state, SessionState::Complete);

    let summary = session.summary().unwrap().clone();
    assert_eq!(summary.total_answers(), 4);
    assert_eq!(summary.correct_count(), 3);
    assert_eq!(summary.accuracy(), 75);

    let id = session.summary_id().expect("summary persisted");
    assert_eq!(repo.get_summary(id).await.unwrap(), summary);
    assert_eq!(loop_svc.finalize_summary(&mut session).await.unwrap(), id);

    let kanji = repo.get_progress(user, ItemKey::kanji(1)).await.unwrap();
    assert_eq!(kanji.stage.value(), 1);
    assert_eq!((kanji.correct_count, kanji.incorrect_count), (1, 1));

    // nothing is due any more at the same instant
    let next = loop_svc.start_session(user).await.unwrap();
    assert!(next.is_complete());
    assert_eq!(next.summary().unwrap().total_answers(), 0);
    let empty_id = next.summary_id().expect("empty summary persisted");
    assert_ne!(empty_id, id);
    assert_eq!(repo.get_summary(empty_id).await.unwrap().total_answers(), 0);
}

/// Serves due items from the inner repository but refuses every write.
struct ReadOnlyStore {
    inner: InMemoryRepository,
}

#[async_trait]
impl ProgressStore for ReadOnlyStore {
    async fn fetch_due(
        &self,
        user: UserId,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<DueItem>, StorageError> {
        self.inner.fetch_due(user, now, limit).await
    }

    async fn apply_update(
        &self,
        _user: UserId,
        _key: ItemKey,
        _update: &StageUpdate,
        _verdict: Verdict,
        _reviewed_at: DateTime<Utc>,
    ) -> Result<ProgressRecord, StorageError> {
        Err(StorageError::Connection("database is locked".into()))
    }

    async fn get_progress(
        &self,
        user: UserId,
        key: ItemKey,
    ) -> Result<ProgressRecord, StorageError> {
        self.inner.get_progress(user, key).await
    }

    async fn track_item(
        &self,
        _user: UserId,
        _key: ItemKey,
        _now: DateTime<Utc>,
    ) -> Result<ProgressRecord, StorageError> {
        Err(StorageError::Connection("database is locked".into()))
    }
}

#[tokio::test]
async fn store_failures_become_warnings() {
    let repo = InMemoryRepository::new();
    let user = UserId::new(9);
    seed(&repo, user).await;

    let loop_svc = ReviewLoopService::new(
        Clock::fixed(fixed_now()),
        Arc::new(ReadOnlyStore {
            inner: repo.clone(),
        }),
        Arc::new(repo.clone()),
    )
    .with_settings(SessionSettings::default())
    .unwrap();

    let mut session = loop_svc.start_session(user).await.unwrap();
    while !session.is_complete() {
        let outcome = loop_svc.submit(&mut session, "toukyou").await.unwrap();
        let warning = outcome.warning.expect("write refused");
        assert_eq!(warning.key, Some(outcome.feedback.item.key));
        assert!(outcome.record.is_none());
        loop_svc.acknowledge(&mut session).await.unwrap();
    }

    let summary = session.summary().unwrap();
    assert_eq!(session.warnings().len(), summary.total_answers() as usize);
    assert_eq!(summary.correct_count(), 1);
    // two items always wrong under the default cap of 3 retries
    assert_eq!(summary.total_answers(), 1 + 2 * 4);
    assert_eq!(summary.deferred(), &[ItemKey::kanji(1), ItemKey::vocabulary(2)]);

    // progress is untouched
    let record = repo.get_progress(user, ItemKey::vocabulary(1)).await.unwrap();
    assert!(record.is_new());
    // the summary store still works
    assert!(session.summary_id().is_some());
}

#[tokio::test]
async fn timer_expiry_counts_as_incorrect() {
    let repo = InMemoryRepository::new();
    let user = UserId::new(2);
    seed(&repo, user).await;

    let loop_svc = ReviewLoopService::new(
        Clock::fixed(fixed_now()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
    );
    let mut session = loop_svc.start_session(user).await.unwrap();
    let outcome = loop_svc.submit_no_answer(&mut session).await.unwrap();
    assert!(!outcome.feedback.is_correct());
    assert!(outcome.feedback.requeued);

    let record = outcome.record.unwrap();
    assert_eq!(record.incorrect_count, 1);
    assert_eq!(record.next_due, fixed_now());
}
