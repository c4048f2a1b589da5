use async_trait::async_trait;
use kioku_core::model::{SessionSummary, UserId};

use super::SqliteRepository;
use super::mapping::{conn, id_i64, map_summary_row, ser};
use crate::repository::{SessionSummaryRepository, StorageError};

#[async_trait]
impl SessionSummaryRepository for SqliteRepository {
    async fn append_summary(
        &self,
        user: UserId,
        summary: &SessionSummary,
    ) -> Result<i64, StorageError> {
        let final_stages = serde_json::to_string(summary.final_stages()).map_err(ser)?;
        let deferred = serde_json::to_string(summary.deferred()).map_err(ser)?;

        let res = sqlx::query(
            r"
            INSERT INTO session_summaries (
                user_id, started_at, completed_at, total_answers, correct_count,
                final_stages, deferred
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )
        .bind(id_i64("user_id", user.value())?)
        .bind(summary.started_at())
        .bind(summary.completed_at())
        .bind(i64::from(summary.total_answers()))
        .bind(i64::from(summary.correct_count()))
        .bind(final_stages)
        .bind(deferred)
        .execute(self.pool())
        .await
        .map_err(conn)?;

        Ok(res.last_insert_rowid())
    }

    async fn get_summary(&self, id: i64) -> Result<SessionSummary, StorageError> {
        let row = sqlx::query(
            r"
            SELECT
                id, user_id, started_at, completed_at, total_answers,
                correct_count, final_stages, deferred
            FROM session_summaries
            WHERE id = ?1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(conn)?;

        let Some(row) = row else {
            return Err(StorageError::NotFound);
        };
        map_summary_row(&row)
    }
}
