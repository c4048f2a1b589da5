use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kioku_core::model::{ItemKey, ProgressRecord, StageUpdate, UserId, Verdict};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, decode_item, id_i64, map_progress_row, ser};
use crate::repository::{DueItem, ProgressStore, StorageError};

fn foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

#[async_trait]
impl ProgressStore for SqliteRepository {
    async fn fetch_due(
        &self,
        user: UserId,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<DueItem>, StorageError> {
        // Tie-break on (type, id) with vocabulary first, matching `ItemKey` ordering.
        let rows = sqlx::query(
            r"
            SELECT
                p.user_id, p.item_type, p.item_id, p.stage, p.next_due,
                p.correct_count, p.incorrect_count, p.last_reviewed_at,
                i.content
            FROM progress p
            JOIN items i ON i.item_type = p.item_type AND i.id = p.item_id
            WHERE p.user_id = ?1 AND p.next_due <= ?2
            ORDER BY
                p.next_due ASC,
                CASE p.item_type WHEN 'vocabulary' THEN 0 ELSE 1 END ASC,
                p.item_id ASC
            LIMIT ?3
            ",
        )
        .bind(id_i64("user_id", user.value())?)
        .bind(now)
        .bind(i64::from(limit))
        .fetch_all(self.pool())
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let progress = map_progress_row(&row)?;
            let item = decode_item(&row.try_get::<String, _>("content").map_err(ser)?)?;
            out.push(DueItem { progress, item });
        }
        tracing::debug!(user = %user, due = out.len(), "fetched due items");
        Ok(out)
    }

    async fn apply_update(
        &self,
        user: UserId,
        key: ItemKey,
        update: &StageUpdate,
        verdict: Verdict,
        reviewed_at: DateTime<Utc>,
    ) -> Result<ProgressRecord, StorageError> {
        let (correct_inc, incorrect_inc) = if verdict.is_correct() {
            (1_i64, 0_i64)
        } else {
            (0, 1)
        };

        let res = sqlx::query(
            r"
            UPDATE progress SET
                stage = ?4,
                next_due = ?5,
                correct_count = MIN(correct_count + ?6, 4294967295),
                incorrect_count = MIN(incorrect_count + ?7, 4294967295),
                last_reviewed_at = ?8
            WHERE user_id = ?1 AND item_type = ?2 AND item_id = ?3
            ",
        )
        .bind(id_i64("user_id", user.value())?)
        .bind(key.item_type.as_str())
        .bind(id_i64("item_id", key.id.value())?)
        .bind(i64::from(update.new_stage.value()))
        .bind(update.next_due)
        .bind(correct_inc)
        .bind(incorrect_inc)
        .bind(reviewed_at)
        .execute(self.pool())
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }

        self.get_progress(user, key).await
    }

    async fn get_progress(
        &self,
        user: UserId,
        key: ItemKey,
    ) -> Result<ProgressRecord, StorageError> {
        let row = sqlx::query(
            r"
            SELECT
                user_id, item_type, item_id, stage, next_due,
                correct_count, incorrect_count, last_reviewed_at
            FROM progress
            WHERE user_id = ?1 AND item_type = ?2 AND item_id = ?3
            ",
        )
        .bind(id_i64("user_id", user.value())?)
        .bind(key.item_type.as_str())
        .bind(id_i64("item_id", key.id.value())?)
        .fetch_optional(self.pool())
        .await
        .map_err(conn)?;

        let Some(row) = row else {
            return Err(StorageError::NotFound);
        };
        map_progress_row(&row)
    }

    async fn track_item(
        &self,
        user: UserId,
        key: ItemKey,
        now: DateTime<Utc>,
    ) -> Result<ProgressRecord, StorageError> {
        let fresh = ProgressRecord::new(user, key, now);
        sqlx::query(
            r"
            INSERT INTO progress (
                user_id, item_type, item_id, stage, next_due,
                correct_count, incorrect_count, last_reviewed_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, 0, 0, NULL)
            ON CONFLICT(user_id, item_type, item_id) DO NOTHING
            ",
        )
        .bind(id_i64("user_id", user.value())?)
        .bind(key.item_type.as_str())
        .bind(id_i64("item_id", key.id.value())?)
        .bind(i64::from(fresh.stage.value()))
        .bind(fresh.next_due)
        .execute(self.pool())
        .await
        .map_err(|e| {
            if foreign_key_violation(&e) {
                StorageError::NotFound
            } else {
                conn(e)
            }
        })?;

        self.get_progress(user, key).await
    }
}
