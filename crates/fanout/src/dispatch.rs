use std::sync::Arc;

use crate::{NoopPublisher, Publisher, RealtimeEvent};

/// Routes events to their audiences through a [`Publisher`].
#[derive(Clone)]
pub struct FanOut {
    publisher: Arc<dyn Publisher>,
}

impl FanOut {
    pub fn new(publisher: Arc<dyn Publisher>) -> Self {
        Self { publisher }
    }

    /// A fan-out that drops everything.
    pub fn disabled() -> Self {
        Self::new(Arc::new(NoopPublisher))
    }

    /// Publishes `event` to each of its audiences.
    ///
    /// Failures are logged and counted; the caller's operation has already
    /// committed and must not be affected.
    pub async fn emit(&self, event: RealtimeEvent) {
        for audience in event.audiences() {
            if let Err(error) = self.publisher.publish(&audience, &event).await {
                metrics::counter!("fanout_publish_failures_total").increment(1);
                tracing::warn!(
                    %error,
                    audience = %audience,
                    event = %event.name,
                    entity_id = %event.entity_id(),
                    "failed to publish realtime event"
                );
            }
        }
    }
}

impl std::fmt::Debug for FanOut {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanOut").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::event::tests::{order_event, order_snapshot};
    use crate::{Audience, EventName, FanoutError, RecordingPublisher};

    struct FailingPublisher;

    #[async_trait]
    impl Publisher for FailingPublisher {
        async fn publish(&self, _: &Audience, _: &RealtimeEvent) -> crate::Result<()> {
            Err(FanoutError::Transport("socket gone".to_string()))
        }
    }

    #[tokio::test]
    async fn emit_reaches_every_audience() {
        let recorder = RecordingPublisher::new();
        let fanout = FanOut::new(Arc::new(recorder.clone()));
        let event = order_event(EventName::OrderCreated, order_snapshot(None));
        let expected = event.audiences();

        fanout.emit(event).await;

        let delivered: Vec<Audience> = recorder
            .deliveries()
            .await
            .into_iter()
            .map(|(a, _)| a)
            .collect();
        assert_eq!(delivered, expected);
        assert_eq!(recorder.names().await, vec![EventName::OrderCreated]);
    }

    #[tokio::test]
    async fn publish_failures_are_swallowed() {
        let fanout = FanOut::new(Arc::new(FailingPublisher));
        fanout
            .emit(order_event(EventName::OrderCreated, order_snapshot(None)))
            .await;
    }
}
