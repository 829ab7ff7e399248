// ABOUTME: Shared application state for the parlor HTTP server.
// ABOUTME: Holds the message collection, the change broadcast channel, and the shutdown signal.

use std::sync::Arc;

use parlor_core::ChangeEvent;
use parlor_store::{MessageCollection, StoreError};
use tokio::sync::{broadcast, watch};

use crate::error::ApiError;

/// Shared application state accessible by all Axum handlers.
pub struct AppState {
    pub store: Arc<dyn MessageCollection>,
    events: broadcast::Sender<ChangeEvent>,
    shutdown: watch::Sender<bool>,
}

/// Type alias for the Arc-wrapped state used with Axum's State extractor.
pub type SharedState = Arc<AppState>;

impl AppState {
    /// Create state around `store`. `event_buffer` bounds how far a slow
    /// subscriber may fall behind before it starts skipping events; it must
    /// be greater than zero.
    pub fn new(store: Arc<dyn MessageCollection>, event_buffer: usize) -> Self {
        let (events, _) = broadcast::channel(event_buffer);
        let (shutdown, _) = watch::channel(false);
        Self {
            store,
            events,
            shutdown,
        }
    }

    /// Run a blocking store operation off the async runtime.
    pub async fn with_store<T, F>(&self, op: F) -> Result<T, ApiError>
    where
        F: FnOnce(&dyn MessageCollection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let result = tokio::task::spawn_blocking(move || op(store.as_ref())).await?;
        Ok(result?)
    }

    /// Broadcast a change to every connected subscriber.
    pub fn publish(&self, event: ChangeEvent) {
        let kind = event.event_name();
        // No subscribers is not an error.
        let receivers = self.events.send(event).unwrap_or(0);
        tracing::debug!(kind, receivers, "published change event");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }

    /// Tell open change streams to finish so the server can drain.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }
}
