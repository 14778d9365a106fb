//! NATS event publisher
//!
//! Forwards registry events to a NATS server so that out-of-process indexers
//! can follow registrations. Subjects have the form
//! `registry.events.cid.registered.<handle>`.

use async_nats::{Client, ConnectOptions};
use async_trait::async_trait;
use cid_registry_core::{EventType, RegistryEvent};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::error::{DbError, DbResult};
use crate::publisher::EventPublisher;

/// Subject prefix for every registry event
pub const SUBJECT_PREFIX: &str = "registry.events";

/// NATS event publisher configuration
#[derive(Debug, Clone)]
pub struct NatsPublisherConfig {
    /// NATS server URL
    pub server_url: String,

    /// Client name for identification
    pub client_name: String,

    /// Connection timeout
    pub connect_timeout: Duration,

    /// Reconnect delay
    pub reconnect_delay: Duration,
}

impl Default for NatsPublisherConfig {
    fn default() -> Self {
        Self {
            server_url: "nats://localhost:4222".to_string(),
            client_name: "cid-registry".to_string(),
            connect_timeout: Duration::from_secs(5),
            reconnect_delay: Duration::from_secs(1),
        }
    }
}

impl NatsPublisherConfig {
    /// Create new configuration
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            ..Default::default()
        }
    }

    /// Set client name
    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = name.into();
        self
    }

    /// Set connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// NATS event publisher
#[derive(Clone)]
pub struct NatsEventPublisher {
    client: Client,
}

impl NatsEventPublisher {
    /// Connect to the configured NATS server
    pub async fn connect(config: NatsPublisherConfig) -> DbResult<Self> {
        info!("Connecting to NATS server at {}", config.server_url);

        let reconnect_delay = config.reconnect_delay;
        let client = ConnectOptions::new()
            .name(&config.client_name)
            .connection_timeout(config.connect_timeout)
            .reconnect_delay_callback(move |attempts| {
                if attempts > 5 {
                    warn!("NATS reconnection attempt #{}", attempts);
                }
                reconnect_delay
            })
            .connect(&config.server_url)
            .await
            .map_err(|e| DbError::Configuration(format!("Failed to connect to NATS: {}", e)))?;

        info!("Connected to NATS");
        Ok(Self { client })
    }

    /// Check if connected to NATS
    pub fn is_connected(&self) -> bool {
        matches!(
            self.client.connection_state(),
            async_nats::connection::State::Connected
        )
    }

    /// Flush pending messages
    pub async fn close(self) -> DbResult<()> {
        info!("Closing NATS connection");
        self.client
            .flush()
            .await
            .map_err(|e| DbError::Connection(format!("Failed to flush NATS: {}", e)))
    }
}

#[async_trait]
impl EventPublisher for NatsEventPublisher {
    async fn publish(&self, event: &RegistryEvent) -> DbResult<()> {
        let subject = build_subject(event);
        let payload = serde_json::to_vec(&EventMessage::from(event))?;

        self.client
            .publish(subject.clone(), payload.into())
            .await
            .map_err(|e| {
                error!("Failed to publish event to NATS: {}", e);
                DbError::Publish(format!("NATS publish failed: {}", e))
            })?;

        debug!("Event published to {}", subject);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "nats"
    }
}

/// Wire form of an event on NATS
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    /// Event name
    pub event_type: String,

    /// Handle issued by the registration
    pub handle: u64,

    /// Event timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,

    /// The full event payload
    pub data: serde_json::Value,
}

impl From<&RegistryEvent> for EventMessage {
    fn from(event: &RegistryEvent) -> Self {
        Self {
            event_type: event.event_name().to_string(),
            handle: event.handle().value(),
            timestamp: event.timestamp,
            data: serde_json::to_value(&event.event_type).unwrap_or(serde_json::Value::Null),
        }
    }
}

fn build_subject(event: &RegistryEvent) -> String {
    match &event.event_type {
        EventType::CidRegistered { handle, .. } => {
            format!("{}.cid.registered.{}", SUBJECT_PREFIX, handle)
        }
    }
}
