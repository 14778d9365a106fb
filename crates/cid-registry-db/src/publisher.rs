//! Event publication seam
//!
//! Registrations are announced through an [`EventPublisher`]. The in-process
//! [`BroadcastEventPublisher`] fans events out to subscribers on a tokio
//! broadcast channel; [`CompositeEventPublisher`] forwards to several sinks.

use async_trait::async_trait;
use cid_registry_core::RegistryEvent;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};

/// Default capacity of the in-process broadcast channel
pub const DEFAULT_BROADCAST_CAPACITY: usize = 1024;

/// Sink for registry events
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a single event
    async fn publish(&self, event: &RegistryEvent) -> DbResult<()>;

    /// Short name used in logs
    fn name(&self) -> &'static str;
}

/// In-process publisher backed by a tokio broadcast channel
#[derive(Debug, Clone)]
pub struct BroadcastEventPublisher {
    sender: broadcast::Sender<RegistryEvent>,
}

impl BroadcastEventPublisher {
    /// Create a publisher whose channel retains up to `capacity` events
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.sender.subscribe()
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastEventPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_BROADCAST_CAPACITY)
    }
}

#[async_trait]
impl EventPublisher for BroadcastEventPublisher {
    async fn publish(&self, event: &RegistryEvent) -> DbResult<()> {
        // A send error only means nobody is listening
        match self.sender.send(event.clone()) {
            Ok(receivers) => debug!(receivers, event = %event.event_name(), "Event broadcast"),
            Err(_) => debug!(event = %event.event_name(), "No subscribers for event"),
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "broadcast"
    }
}

/// Publisher that forwards every event to a set of sinks
///
/// All sinks are attempted; the first failure is reported after the rest
/// have been tried.
#[derive(Default, Clone)]
pub struct CompositeEventPublisher {
    sinks: Vec<Arc<dyn EventPublisher>>,
}

impl CompositeEventPublisher {
    /// Create an empty composite
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink
    pub fn with(mut self, sink: Arc<dyn EventPublisher>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Number of configured sinks
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Whether no sinks are configured
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl EventPublisher for CompositeEventPublisher {
    async fn publish(&self, event: &RegistryEvent) -> DbResult<()> {
        let results = join_all(self.sinks.iter().map(|sink| sink.publish(event))).await;

        let mut first_error = None;
        for (sink, result) in self.sinks.iter().zip(results) {
            if let Err(e) = result {
                warn!(sink = sink.name(), error = %e, "Event sink failed");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(DbError::Publish(e.to_string())),
            None => Ok(()),
        }
    }

    fn name(&self) -> &'static str {
        "composite"
    }
}
