//! Server-Sent Events feed of catalog changes.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream};
use tokio::sync::mpsc;

use crate::models::Gift;
use crate::AppState;

/// GET /api/gifts/stream - Push the ordered catalog now and after every change.
///
/// The registry listener lives as long as the client stays connected.
pub async fn stream_gifts(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::unbounded_channel::<Vec<Gift>>();
    let subscription = state.registry.subscribe(move |gifts| {
        let _ = tx.send(gifts);
    });
    tracing::debug!("Catalog stream opened");

    let events = stream::unfold((rx, subscription), |(mut rx, subscription)| async move {
        let gifts = rx.recv().await?;
        let event = match Event::default().event("catalog").json_data(&gifts) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("Failed to encode catalog event: {}", e);
                Event::default().event("error").data(e.to_string())
            }
        };
        Some((Ok(event), (rx, subscription)))
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}
