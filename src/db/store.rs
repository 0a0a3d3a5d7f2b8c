//! Key-value backing store with push notifications.
//!
//! Every committed write publishes the affected top-level key on a broadcast
//! channel; listeners re-read what they care about.

use chrono::Utc;
use serde_json::Value;
use sqlx::{Row, SqlitePool};
use tokio::sync::broadcast;

use crate::errors::AppError;

/// Collection of gift records keyed by stringified gift id.
pub const GIFTS_KEY: &str = "weddingGifts";
/// Scalar payment key.
pub const PIX_KEY_KEY: &str = "pixKey";
/// Scalar payment QR image.
pub const QRCODE_KEY: &str = "qrcodeImage";

/// Parent used for scalar values.
const ROOT: &str = "";

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// SQLite-backed key-value store.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
    changes: broadcast::Sender<String>,
}

impl Store {
    pub fn new(pool: SqlitePool) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self { pool, changes }
    }

    /// Receive the key of every subsequent committed write.
    pub fn watch(&self) -> broadcast::Receiver<String> {
        self.changes.subscribe()
    }

    /// Close the underlying pool; every later operation fails.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn notify(&self, key: &str) {
        // No receivers is fine.
        let _ = self.changes.send(key.to_string());
    }

    /// Read every child of a collection in insertion order.
    pub async fn children(&self, parent: &str) -> Result<Vec<Value>, AppError> {
        let rows = sqlx::query("SELECT value FROM nodes WHERE parent = ? ORDER BY rowid")
            .bind(parent)
            .fetch_all(&self.pool)
            .await?;

        let mut values = Vec::with_capacity(rows.len());
        for row in rows {
            let raw: String = row.get("value");
            match serde_json::from_str(&raw) {
                Ok(value) => values.push(value),
                Err(e) => tracing::warn!("Skipping unreadable record under {}: {}", parent, e),
            }
        }
        Ok(values)
    }

    /// Replace a whole collection atomically.
    pub async fn replace_children(
        &self,
        parent: &str,
        entries: &[(String, Value)],
    ) -> Result<(), AppError> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM nodes WHERE parent = ?")
            .bind(parent)
            .execute(&mut *tx)
            .await?;

        for (key, value) in entries {
            sqlx::query(
                r#"
                INSERT INTO nodes (parent, key, value, updated_at) VALUES (?, ?, ?, ?)
                ON CONFLICT(parent, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
                "#,
            )
            .bind(parent)
            .bind(key)
            .bind(serde_json::to_string(value)?)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        self.notify(parent);
        Ok(())
    }

    /// Write one child without touching its siblings.
    pub async fn set_child(&self, parent: &str, key: &str, value: &Value) -> Result<(), AppError> {
        self.upsert(parent, key, value).await?;
        self.notify(parent);
        Ok(())
    }

    /// Remove one child. Removing a missing child is not an error.
    pub async fn remove_child(&self, parent: &str, key: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM nodes WHERE parent = ? AND key = ?")
            .bind(parent)
            .bind(key)
            .execute(&self.pool)
            .await?;
        self.notify(parent);
        Ok(())
    }

    /// Read a scalar value.
    pub async fn scalar(&self, key: &str) -> Result<Option<Value>, AppError> {
        let row = sqlx::query("SELECT value FROM nodes WHERE parent = ? AND key = ?")
            .bind(ROOT)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let raw: String = row.get("value");
                Ok(Some(serde_json::from_str(&raw).map_err(|e| {
                    AppError::Storage(format!("Unreadable value under {}: {}", key, e))
                })?))
            }
            None => Ok(None),
        }
    }

    /// Overwrite a scalar value.
    pub async fn set_scalar(&self, key: &str, value: &Value) -> Result<(), AppError> {
        self.upsert(ROOT, key, value).await?;
        self.notify(key);
        Ok(())
    }

    async fn upsert(&self, parent: &str, key: &str, value: &Value) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO nodes (parent, key, value, updated_at) VALUES (?, ?, ?, ?)
            ON CONFLICT(parent, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(parent)
        .bind(key)
        .bind(serde_json::to_string(value)?)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
