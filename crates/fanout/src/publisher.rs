use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{Audience, EventName, RealtimeEvent, Result};

/// Delivery seam for realtime events.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Delivers one event to one audience.
    async fn publish(&self, audience: &Audience, event: &RealtimeEvent) -> Result<()>;
}

/// Drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPublisher;

#[async_trait]
impl Publisher for NoopPublisher {
    async fn publish(&self, _audience: &Audience, _event: &RealtimeEvent) -> Result<()> {
        Ok(())
    }
}

/// Keeps every published event in memory, for assertions in tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingPublisher {
    published: Arc<Mutex<Vec<(Audience, RealtimeEvent)>>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// All deliveries in publish order.
    pub async fn deliveries(&self) -> Vec<(Audience, RealtimeEvent)> {
        self.published.lock().await.clone()
    }

    /// Names of all events in publish order.
    ///
    /// Every event reaches staff exactly once, so the staff stream is the
    /// event stream.
    pub async fn names(&self) -> Vec<EventName> {
        self.names_for(&Audience::Staff).await
    }

    /// Names of events delivered to `audience`.
    pub async fn names_for(&self, audience: &Audience) -> Vec<EventName> {
        self.published
            .lock()
            .await
            .iter()
            .filter(|(a, _)| a == audience)
            .map(|(_, e)| e.name)
            .collect()
    }

    pub async fn clear(&self) {
        self.published.lock().await.clear();
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, audience: &Audience, event: &RealtimeEvent) -> Result<()> {
        self.published.lock().await.push((*audience, event.clone()));
        Ok(())
    }
}
