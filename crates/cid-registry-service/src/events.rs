//! Live registration feed
//!
//! Exposes the in-process broadcast channel as a stream so external indexers
//! can follow registrations as they are committed.

use cid_registry_core::RegistryEvent;
use cid_registry_db::BroadcastEventPublisher;
use futures::stream::{BoxStream, StreamExt};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::warn;

/// Subscription point for registry events
#[derive(Debug, Clone)]
pub struct EventFeed {
    publisher: BroadcastEventPublisher,
}

impl EventFeed {
    /// Create a feed over the publisher the registration service writes to
    pub fn new(publisher: BroadcastEventPublisher) -> Self {
        Self { publisher }
    }

    /// Stream of events published from now on
    ///
    /// A subscriber that falls more than the channel capacity behind skips
    /// the overwritten events; it can backfill them with a listing.
    pub fn subscribe(&self) -> BoxStream<'static, RegistryEvent> {
        BroadcastStream::new(self.publisher.subscribe())
            .filter_map(|item| async move {
                match item {
                    Ok(event) => Some(event),
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        warn!(skipped, "Event subscriber lagged behind");
                        None
                    }
                }
            })
            .boxed()
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.publisher.subscriber_count()
    }
}
