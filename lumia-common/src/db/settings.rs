//! Settings database access
//!
//! Read/write settings from the settings table (key-value store). Values are
//! stored as text and parsed with `FromStr` on the way out.

use crate::{Error, Result};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;

/// Generic setting getter
///
/// Returns None if key doesn't exist in database.
/// Parses value from string using FromStr trait.
pub async fn get_setting<T: FromStr>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await?;

    match value {
        Some(s) => match s.parse::<T>() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(Error::Config(format!(
                "Failed to parse setting '{}' value: {}",
                key, s
            ))),
        },
        None => Ok(None),
    }
}

/// Generic setting setter
///
/// Inserts or updates setting in database.
pub async fn set_setting<T: ToString>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()> {
    let value_str = value.to_string();

    sqlx::query(
        r#"
        INSERT INTO settings (key, value, updated_at)
        VALUES (?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
    )
    .bind(key)
    .bind(value_str)
    .execute(db)
    .await?;

    Ok(())
}

/// Remove a setting; missing keys are not an error
pub async fn delete_setting(db: &Pool<Sqlite>, key: &str) -> Result<()> {
    sqlx::query("DELETE FROM settings WHERE key = ?")
        .bind(key)
        .execute(db)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init::init_memory_database;

    #[tokio::test]
    async fn test_generic_setting_get_set() {
        let db = init_memory_database().await.unwrap();

        set_setting(&db, "test_int", 42).await.unwrap();
        let value: Option<i32> = get_setting(&db, "test_int").await.unwrap();
        assert_eq!(value, Some(42));

        set_setting(&db, "test_bool", true).await.unwrap();
        let value: Option<bool> = get_setting(&db, "test_bool").await.unwrap();
        assert_eq!(value, Some(true));

        // Non-existent key should return None
        let value: Option<String> = get_setting(&db, "nonexistent").await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_setting_update() {
        let db = init_memory_database().await.unwrap();

        set_setting(&db, "test_key", "value1").await.unwrap();
        set_setting(&db, "test_key", "value2").await.unwrap();

        let value: Option<String> = get_setting(&db, "test_key").await.unwrap();
        assert_eq!(value, Some("value2".to_string()));
    }

    #[tokio::test]
    async fn test_unparseable_setting_is_config_error() {
        let db = init_memory_database().await.unwrap();

        set_setting(&db, "music_enabled", "maybe").await.unwrap();
        let result = get_setting::<bool>(&db, "music_enabled").await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_delete_setting() {
        let db = init_memory_database().await.unwrap();

        set_setting(&db, "selected", 2).await.unwrap();
        delete_setting(&db, "selected").await.unwrap();
        delete_setting(&db, "selected").await.unwrap();

        let value: Option<u32> = get_setting(&db, "selected").await.unwrap();
        assert_eq!(value, None);
    }
}
