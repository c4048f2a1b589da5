use async_trait::async_trait;
use kioku_core::model::{ItemKey, ReviewableItem};

use super::SqliteRepository;
use super::mapping::{conn, encode_item, id_i64, map_item_row};
use crate::repository::{ItemRepository, StorageError};

#[async_trait]
impl ItemRepository for SqliteRepository {
    async fn upsert_item(&self, item: &ReviewableItem) -> Result<(), StorageError> {
        let key = item.key();
        sqlx::query(
            r"
            INSERT INTO items (item_type, id, prompt, content)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(item_type, id) DO UPDATE SET
                prompt = excluded.prompt,
                content = excluded.content
            ",
        )
        .bind(key.item_type.as_str())
        .bind(id_i64("item_id", key.id.value())?)
        .bind(item.prompt())
        .bind(encode_item(item)?)
        .execute(self.pool())
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn get_item(&self, key: ItemKey) -> Result<ReviewableItem, StorageError> {
        let row = sqlx::query(
            r"
            SELECT item_type, id, content
            FROM items
            WHERE item_type = ?1 AND id = ?2
            ",
        )
        .bind(key.item_type.as_str())
        .bind(id_i64("item_id", key.id.value())?)
        .fetch_optional(self.pool())
        .await
        .map_err(conn)?;

        let Some(row) = row else {
            return Err(StorageError::NotFound);
        };
        map_item_row(&row)
    }
}
