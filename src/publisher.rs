//! Publishes domain events to NATS when a server is configured.

use tracing::{debug, info, warn};
use crate::domain::events::DomainEvent;

#[derive(Clone, Debug, Default)]
pub struct EventPublisher { client: Option<async_nats::Client> }

impl EventPublisher {
    pub fn disabled() -> Self { Self::default() }

    /// Connects to NATS. A failed connection degrades to a disabled publisher.
    pub async fn connect(url: Option<&str>) -> Self {
        let Some(url) = url else { return Self::disabled() };
        match async_nats::connect(url).await {
            Ok(client) => {
                info!("publishing domain events to NATS at {}", url);
                Self { client: Some(client) }
            }
            Err(e) => {
                warn!("NATS unavailable at {}: {}; events will not be published", url, e);
                Self::disabled()
            }
        }
    }

    pub fn is_enabled(&self) -> bool { self.client.is_some() }

    /// Fire-and-forget: failures are logged, never returned.
    pub async fn publish(&self, event: DomainEvent) {
        let Some(client) = &self.client else {
            debug!(event = event.name(), "event publishing disabled");
            return;
        };
        let payload = match serde_json::to_vec(&event) {
            Ok(payload) => payload,
            Err(e) => { warn!(event = event.name(), "failed to encode event: {}", e); return; }
        };
        if let Err(e) = client.publish(event.subject(), payload.into()).await {
            warn!(event = event.name(), "failed to publish event: {}", e);
        }
    }
}
