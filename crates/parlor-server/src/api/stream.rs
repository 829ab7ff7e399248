// ABOUTME: SSE change stream: seeds a joining client with a snapshot, then relays every change.
// ABOUTME: Subscribes before reading the snapshot so no change between the two is lost.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use futures::future;
use futures::stream::{self, Stream, StreamExt};
use parlor_core::ChangeEvent;
use parlor_store::MessageCollection;
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use crate::app_state::SharedState;
use crate::error::ApiError;

/// The snapshot followed by live changes, ending when shutdown is signalled.
/// A change made while the snapshot was being read may appear in both;
/// consumers apply events by id, so replaying one is harmless.
///
/// A subscriber that falls behind the broadcast buffer is sent a fresh
/// snapshot in place of the events it missed. If that snapshot cannot be
/// read the stream ends, and the client reconnects to start over.
fn change_stream(
    snapshot: ChangeEvent,
    rx: broadcast::Receiver<ChangeEvent>,
    store: Arc<dyn MessageCollection>,
    mut shutdown: watch::Receiver<bool>,
) -> impl Stream<Item = ChangeEvent> {
    let live = BroadcastStream::new(rx)
        .then(move |result| {
            let store = Arc::clone(&store);
            async move {
                match result {
                    Ok(event) => Some(event),
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "change stream subscriber lagged, resending snapshot");
                        resnapshot(store).await
                    }
                }
            }
        })
        .take_while(|event| future::ready(event.is_some()))
        .filter_map(future::ready);

    stream::once(async move { snapshot })
        .chain(live)
        .take_until(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
}

async fn resnapshot(store: Arc<dyn MessageCollection>) -> Option<ChangeEvent> {
    match tokio::task::spawn_blocking(move || store.read_all()).await {
        Ok(Ok(messages)) => Some(ChangeEvent::Snapshot(messages)),
        Ok(Err(err)) => {
            tracing::error!(error = %err, "could not resend snapshot, closing change stream");
            None
        }
        Err(err) => {
            tracing::error!(error = %err, "snapshot task failed, closing change stream");
            None
        }
    }
}

fn to_sse(event: ChangeEvent) -> Result<SseEvent, axum::Error> {
    SseEvent::default()
        .event(event.event_name())
        .json_data(&event)
}

/// GET /api/messages/stream - SSE endpoint for real-time collection changes.
pub async fn message_stream(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, ApiError> {
    let rx = state.subscribe();
    let messages = state.with_store(|store| store.read_all()).await?;
    tracing::debug!(count = messages.len(), "client joined change stream");

    let events = change_stream(
        ChangeEvent::Snapshot(messages),
        rx,
        Arc::clone(&state.store),
        state.shutdown_signal(),
    );
    Ok(Sse::new(events.map(to_sse)).keep_alive(KeepAlive::default()))
}
