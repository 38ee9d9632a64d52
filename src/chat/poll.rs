//! Update polling loop.
//!
//! Pulls updates with `getUpdates`, converts them to [`InboundEvent`]s and
//! hands each one to the [`Router`] on its own task. Ordering between
//! lifecycle operations is preserved by the controller's FIFO lock, not by
//! this loop, so a `/start` sent during a slow launch is still answered.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn};

use super::telegram::TelegramClient;
use super::{InboundEvent, Transport};
use crate::error::TransportError;
use crate::router::Router;

/// Tracks the `getUpdates` offset so every update is delivered once.
pub struct Poller {
    client: TelegramClient,
    interval: Duration,
    offset: i64,
}

impl Poller {
    pub fn new(client: TelegramClient, interval: Duration) -> Self {
        Self {
            client,
            interval,
            offset: 0,
        }
    }

    /// Next update id that will be requested.
    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Fetch one batch and advance the offset past it.
    pub async fn next_batch(&mut self) -> Result<Vec<InboundEvent>, TransportError> {
        let updates = self.client.get_updates(self.offset, self.interval).await?;
        let mut events = Vec::with_capacity(updates.len());
        for update in updates {
            let update_id = update.update_id;
            self.offset = self.offset.max(update_id + 1);
            match update.into_event() {
                Some(event) => events.push(event),
                None => debug!("Skipping unsupported update {update_id}"),
            }
        }
        Ok(events)
    }

    /// Poll forever, dispatching every event to `router`.
    pub async fn run<T: Transport + 'static>(mut self, router: Arc<Router<T>>) {
        loop {
            match self.next_batch().await {
                Ok(events) => {
                    for event in events {
                        let router = Arc::clone(&router);
                        tokio::spawn(async move {
                            if let Err(e) = router.handle(event).await {
                                error!("Failed to answer chat event: {e}");
                            }
                        });
                    }
                }
                Err(e) => {
                    warn!("Error while receiving updates: {e}");
                    tokio::time::sleep(self.interval).await;
                }
            }
        }
    }
}
