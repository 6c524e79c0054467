use std::sync::Arc;

use async_trait::async_trait;

use super::Subscriber;
use crate::domain::NotificationEnvelope;
use crate::error::HandlerError;
use crate::queue::DurableQueue;

/// Bus target that hands envelopes to a durable queue.
///
/// Delivery succeeds once the queue has accepted the message; processing
/// happens later, in whatever consumes the queue.
pub struct QueueSubscriber {
    queue: Arc<dyn DurableQueue>,
}

impl QueueSubscriber {
    pub fn new(queue: Arc<dyn DurableQueue>) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl Subscriber for QueueSubscriber {
    async fn deliver(&self, envelope: &NotificationEnvelope) -> Result<(), HandlerError> {
        self.queue.enqueue(envelope.clone()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chrono::Utc;

    use crate::bus::{EventBus, FilterPolicy};
    use crate::domain::{CHANGE_TYPE, ChangeEvent};
    use crate::ports::{Clock, SystemClock, UlidGenerator};
    use crate::queue::{InMemoryQueue, QueueOptions};

    #[tokio::test]
    async fn filtered_queue_only_receives_uploads() {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let ids = Arc::new(UlidGenerator::new(clock.clone()));
        let queue = Arc::new(InMemoryQueue::new("images", QueueOptions::default(), ids.clone(), clock));
        let bus = EventBus::new("images", ids);
        bus.subscribe(
            "image-queue",
            Arc::new(QueueSubscriber::new(queue.clone())),
            Some(FilterPolicy::new().allow(CHANGE_TYPE, ["ObjectCreated"])),
        );

        bus.publish(&NotificationEnvelope::store_event(ChangeEvent::created("cat.jpg", "images", Utc::now())))
            .await;
        bus.publish(&NotificationEnvelope::store_event(ChangeEvent::removed("dog.jpg", "images", Utc::now())))
            .await;

        let batch = queue.poll(10, Duration::ZERO).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].payload.events()[0].object_key, "cat.jpg");
    }
}
