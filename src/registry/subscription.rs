//! Push-notification listeners over the backing store.

use std::future::Future;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use crate::db::Store;
use crate::errors::AppError;

/// Handle to a running listener. Dropping it deregisters the listener.
pub struct Subscription {
    handle: JoinHandle<()>,
}

impl Subscription {
    /// Stop delivering updates.
    pub fn unsubscribe(self) {}

    /// Whether the listener is still running.
    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Deliver `read`'s result now and after every write under `key`.
///
/// A read error delivers `fallback` once and ends the listener session.
pub(crate) fn listen<T, R, Fut, F>(
    store: Store,
    key: &'static str,
    read: R,
    fallback: fn() -> T,
    callback: F,
) -> Subscription
where
    T: Send + 'static,
    R: Fn(Store) -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, AppError>> + Send + 'static,
    F: Fn(T) + Send + Sync + 'static,
{
    // Watch before the first read so no write slips between the two.
    let mut changes = store.watch();

    let handle = tokio::spawn(async move {
        loop {
            match read(store.clone()).await {
                Ok(value) => callback(value),
                Err(e) => {
                    tracing::error!("Listener on {} failed: {}", key, e);
                    callback(fallback());
                    break;
                }
            }

            if !next_change(&mut changes, key).await {
                tracing::debug!("Change feed closed, stopping listener on {}", key);
                break;
            }
        }
    });

    Subscription { handle }
}

/// Wait until `key` changes. Returns false once the feed is closed.
async fn next_change(changes: &mut broadcast::Receiver<String>, key: &str) -> bool {
    loop {
        match changes.recv().await {
            Ok(changed) if changed == key => return true,
            Ok(_) => continue,
            // Missed notifications; a re-read catches up.
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!("Listener on {} lagged by {} changes", key, skipped);
                return true;
            }
            Err(RecvError::Closed) => return false,
        }
    }
}
