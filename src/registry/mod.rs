//! Registry service: catalog and payment configuration over the backing store.
//!
//! Reads fail open (the initial catalog or an empty string) so clients always
//! have something to render; writes propagate their errors.

mod merge;
mod subscription;

pub use merge::*;
pub use subscription::Subscription;

use serde_json::Value;

use crate::db::{Store, GIFTS_KEY, PIX_KEY_KEY, QRCODE_KEY};
use crate::errors::AppError;
use crate::models::{initial_catalog, Gift, RegistryConfig};

/// Application-level read/write/merge logic over the store.
#[derive(Clone)]
pub struct RegistryService {
    store: Store,
}

impl RegistryService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    // ========== Gifts ==========

    /// Ordered, deduplicated catalog. Seeds the initial catalog into an empty store.
    pub async fn fetch_all(&self) -> Vec<Gift> {
        match self.try_fetch_all().await {
            Ok(gifts) => gifts,
            Err(e) => {
                tracing::error!("Failed to fetch gifts, serving initial catalog: {}", e);
                initial_catalog()
            }
        }
    }

    /// Like [`Self::fetch_all`] but surfaces read failures. Paths that write
    /// based on what they read use this one.
    pub(crate) async fn try_fetch_all(&self) -> Result<Vec<Gift>, AppError> {
        let raw = self.store.children(GIFTS_KEY).await?;
        if raw.is_empty() {
            tracing::info!("Gift store is empty, seeding initial catalog");
            let seed = initial_catalog();
            self.write_catalog(&seed).await?;
            return Ok(seed);
        }
        Ok(merge_records(&raw))
    }

    /// Replace the whole catalog with an untyped array of records.
    ///
    /// Returns the catalog as stored: normalized, deduplicated and ordered.
    pub async fn replace_all(&self, gifts: &Value) -> Result<Vec<Gift>, AppError> {
        let Some(items) = gifts.as_array() else {
            return Err(AppError::Validation("Gifts must be an array".to_string()));
        };

        let mut normalized = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let gift = Gift::from_value(item).ok_or_else(|| {
                AppError::Validation(format!("Gift at position {} has no numeric id", index))
            })?;
            normalized.push(gift);
        }

        self.write_catalog(&normalized).await?;
        Ok(dedup_by_id(normalized))
    }

    async fn write_catalog(&self, gifts: &[Gift]) -> Result<(), AppError> {
        let mut entries = Vec::with_capacity(gifts.len());
        for gift in gifts {
            entries.push((gift.id.to_string(), serde_json::to_value(gift)?));
        }

        self.store.replace_children(GIFTS_KEY, &entries).await?;
        tracing::info!("Saved full catalog of {} gifts", entries.len());
        Ok(())
    }

    /// Write one gift under its own id without touching the others.
    pub async fn upsert_one(&self, gift: &Gift) -> Result<(), AppError> {
        let normalized = gift.clone().normalized();
        let value = serde_json::to_value(&normalized)?;

        self.store
            .set_child(GIFTS_KEY, &normalized.id.to_string(), &value)
            .await?;
        tracing::info!("Saved gift {} ({})", normalized.id, normalized.name);
        Ok(())
    }

    /// Remove the gift stored under `id`.
    pub async fn delete_one(&self, id: i64) -> Result<(), AppError> {
        self.store.remove_child(GIFTS_KEY, &id.to_string()).await?;
        tracing::info!("Deleted gift {}", id);
        Ok(())
    }

    /// Receive the ordered catalog now and after every change.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Vec<Gift>) + Send + Sync + 'static,
    {
        subscription::listen(
            self.store.clone(),
            GIFTS_KEY,
            read_catalog,
            initial_catalog,
            callback,
        )
    }

    // ========== Payment key ==========

    /// Current payment key, or an empty string.
    pub async fn fetch_key(&self) -> String {
        self.try_fetch_key().await.unwrap_or_else(|e| {
            tracing::error!("Failed to fetch payment key: {}", e);
            String::new()
        })
    }

    pub(crate) async fn try_fetch_key(&self) -> Result<String, AppError> {
        read_text(&self.store, PIX_KEY_KEY).await
    }

    /// Save the trimmed payment key and verify it reads back.
    pub async fn save_key(&self, key: &str) -> Result<(), AppError> {
        let trimmed = key.trim();
        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "Payment key cannot be empty".to_string(),
            ));
        }

        self.store
            .set_scalar(PIX_KEY_KEY, &Value::String(trimmed.to_string()))
            .await?;

        match self.store.scalar(PIX_KEY_KEY).await? {
            None => Err(AppError::Storage(
                "Payment key not found after saving".to_string(),
            )),
            Some(saved) => {
                if saved.as_str() != Some(trimmed) {
                    tracing::warn!("Saved payment key differs from the expected value");
                }
                tracing::info!("Payment key saved");
                Ok(())
            }
        }
    }

    pub fn subscribe_key<F>(&self, callback: F) -> Subscription
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        subscription::listen(
            self.store.clone(),
            PIX_KEY_KEY,
            |store| async move { read_text(&store, PIX_KEY_KEY).await },
            String::new,
            callback,
        )
    }

    // ========== QR image ==========

    /// Current payment QR image, or an empty string.
    pub async fn fetch_image(&self) -> String {
        self.try_fetch_image().await.unwrap_or_else(|e| {
            tracing::error!("Failed to fetch QR image: {}", e);
            String::new()
        })
    }

    pub(crate) async fn try_fetch_image(&self) -> Result<String, AppError> {
        read_text(&self.store, QRCODE_KEY).await
    }

    pub async fn save_image(&self, image: &str) -> Result<(), AppError> {
        self.store
            .set_scalar(QRCODE_KEY, &Value::String(image.to_string()))
            .await?;
        tracing::info!("QR image saved ({} bytes)", image.len());
        Ok(())
    }

    pub fn subscribe_image<F>(&self, callback: F) -> Subscription
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        subscription::listen(
            self.store.clone(),
            QRCODE_KEY,
            |store| async move { read_text(&store, QRCODE_KEY).await },
            String::new,
            callback,
        )
    }

    /// Both configuration values, each failing open independently.
    pub async fn fetch_config(&self) -> RegistryConfig {
        RegistryConfig {
            pix_key: self.fetch_key().await,
            qrcode: self.fetch_image().await,
        }
    }
}

/// Listener read: empty storage shows the initial catalog without seeding it.
async fn read_catalog(store: Store) -> Result<Vec<Gift>, AppError> {
    let raw = store.children(GIFTS_KEY).await?;
    if raw.is_empty() {
        Ok(initial_catalog())
    } else {
        Ok(merge_records(&raw))
    }
}

/// A scalar as text; anything that is not a string reads as empty.
async fn read_text(store: &Store, key: &str) -> Result<String, AppError> {
    Ok(match store.scalar(key).await? {
        Some(Value::String(text)) => text,
        _ => String::new(),
    })
}
