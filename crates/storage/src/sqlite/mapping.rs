use chrono::{DateTime, Utc};
use kioku_core::model::{
    ItemId, ItemKey, ItemType, ProgressRecord, ReviewableItem, SessionSummary, Stage, UserId,
};
use sqlx::Row;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn i64_to_u32(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn user_id_from_i64(v: i64) -> Result<UserId, StorageError> {
    Ok(UserId::new(i64_to_u64("user_id", v)?))
}

pub(crate) fn item_key_from_parts(item_type: &str, id: i64) -> Result<ItemKey, StorageError> {
    let item_type: ItemType = item_type.parse().map_err(ser)?;
    Ok(ItemKey::new(item_type, ItemId::new(i64_to_u64("item_id", id)?)))
}

pub(crate) fn encode_item(item: &ReviewableItem) -> Result<String, StorageError> {
    serde_json::to_string(item).map_err(ser)
}

pub(crate) fn decode_item(raw: &str) -> Result<ReviewableItem, StorageError> {
    serde_json::from_str(raw).map_err(ser)
}

pub(crate) fn map_item_row(row: &sqlx::sqlite::SqliteRow) -> Result<ReviewableItem, StorageError> {
    let raw: String = row.try_get("content").map_err(ser)?;
    let item = decode_item(&raw)?;

    let key = item_key_from_parts(
        row.try_get::<String, _>("item_type").map_err(ser)?.as_str(),
        row.try_get("id").map_err(ser)?,
    )?;
    if item.key() != key {
        return Err(StorageError::Serialization(format!(
            "content for {key} decodes as {}",
            item.key()
        )));
    }
    Ok(item)
}

pub(crate) fn map_progress_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<ProgressRecord, StorageError> {
    let user_id = user_id_from_i64(row.try_get("user_id").map_err(ser)?)?;
    let key = item_key_from_parts(
        row.try_get::<String, _>("item_type").map_err(ser)?.as_str(),
        row.try_get("item_id").map_err(ser)?,
    )?;
    let stage = Stage::try_from(row.try_get::<i64, _>("stage").map_err(ser)?).map_err(ser)?;
    let next_due: DateTime<Utc> = row.try_get("next_due").map_err(ser)?;
    let correct_count = i64_to_u32("correct_count", row.try_get("correct_count").map_err(ser)?)?;
    let incorrect_count =
        i64_to_u32("incorrect_count", row.try_get("incorrect_count").map_err(ser)?)?;
    let last_reviewed_at: Option<DateTime<Utc>> =
        row.try_get("last_reviewed_at").map_err(ser)?;

    Ok(ProgressRecord {
        user_id,
        key,
        stage,
        next_due,
        correct_count,
        incorrect_count,
        last_reviewed_at,
    })
}

pub(crate) fn map_summary_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<SessionSummary, StorageError> {
    let started_at: DateTime<Utc> = row.try_get("started_at").map_err(ser)?;
    let completed_at: DateTime<Utc> = row.try_get("completed_at").map_err(ser)?;
    let total_answers = i64_to_u32("total_answers", row.try_get("total_answers").map_err(ser)?)?;
    let correct_count = i64_to_u32("correct_count", row.try_get("correct_count").map_err(ser)?)?;

    let final_stages: Vec<(ItemKey, Stage)> =
        serde_json::from_str(&row.try_get::<String, _>("final_stages").map_err(ser)?)
            .map_err(ser)?;
    let deferred: Vec<ItemKey> =
        serde_json::from_str(&row.try_get::<String, _>("deferred").map_err(ser)?).map_err(ser)?;

    SessionSummary::from_persisted(
        started_at,
        completed_at,
        total_answers,
        correct_count,
        final_stages,
        deferred,
    )
    .map_err(ser)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_key_parts_parse() {
        assert_eq!(item_key_from_parts("kanji", 7).unwrap(), ItemKey::kanji(7));
        assert!(item_key_from_parts("radical", 7).is_err());
        assert!(item_key_from_parts("vocabulary", -1).is_err());
    }

    #[test]
    fn id_conversion_rejects_overflow() {
        assert!(id_i64("item_id", u64::MAX).is_err());
        assert_eq!(id_i64("item_id", 42).unwrap(), 42);
    }
}
