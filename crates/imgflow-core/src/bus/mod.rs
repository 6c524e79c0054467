//! EventBus - publish/subscribe fan-out with per-subscription filters.
//!
//! The bus is a dispatch table of `(filter, target)` pairs. `publish`
//! evaluates every subscription's filter against the envelope attributes and
//! delivers to each match in turn, awaiting each delivery. A failing target is
//! logged and counted; it never prevents delivery to the others.
//!
//! No ordering is promised across subscribers. Subscribers that hand off to a
//! queue (see [`QueueSubscriber`]) lose publish order as well, since the
//! queues themselves are unordered.

mod filter;
mod queue_subscriber;

pub use filter::FilterPolicy;
pub use queue_subscriber::QueueSubscriber;

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use crate::domain::{NotificationEnvelope, SubscriptionId};
use crate::error::HandlerError;
use crate::ports::IdGenerator;

/// A bus delivery target (direct handler, queue, ...).
#[async_trait]
pub trait Subscriber: Send + Sync {
    async fn deliver(&self, envelope: &NotificationEnvelope) -> Result<(), HandlerError>;
}

struct Subscription {
    id: SubscriptionId,
    name: String,
    filter: Option<FilterPolicy>,
    target: Arc<dyn Subscriber>,
}

impl Subscription {
    fn accepts(&self, envelope: &NotificationEnvelope) -> bool {
        self.filter
            .as_ref()
            .is_none_or(|f| f.matches(envelope.attributes()))
    }
}

/// Returned by [`EventBus::subscribe`]; pass back to `unsubscribe`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionHandle {
    pub id: SubscriptionId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryFailure {
    pub subscription: String,
    pub error: String,
}

/// What happened to one published envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Subscriptions whose filter accepted the envelope.
    pub matched: usize,
    pub delivered: usize,
    pub failures: Vec<DeliveryFailure>,
}

pub struct EventBus {
    name: String,
    ids: Arc<dyn IdGenerator>,
    subscriptions: RwLock<Vec<Arc<Subscription>>>,
}

impl EventBus {
    pub fn new(name: impl Into<String>, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            name: name.into(),
            ids,
            subscriptions: RwLock::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register `target`. Without a filter the subscription receives every envelope.
    pub fn subscribe(
        &self,
        name: impl Into<String>,
        target: Arc<dyn Subscriber>,
        filter: Option<FilterPolicy>,
    ) -> SubscriptionHandle {
        let subscription = Arc::new(Subscription {
            id: self.ids.subscription_id(),
            name: name.into(),
            filter,
            target,
        });
        let handle = SubscriptionHandle {
            id: subscription.id,
            name: subscription.name.clone(),
        };

        debug!(bus = %self.name, subscription = %handle.name, id = %handle.id, "subscribed");
        self.subscriptions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(subscription);
        handle
    }

    /// Remove a subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        let mut subscriptions = self.subscriptions.write().unwrap_or_else(|e| e.into_inner());
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != handle.id);
        before != subscriptions.len()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    #[instrument(skip_all, fields(bus = %self.name))]
    pub async fn publish(&self, envelope: &NotificationEnvelope) -> PublishReport {
        // snapshot so the lock is never held across a delivery
        let targets: Vec<Arc<Subscription>> = self
            .subscriptions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|s| s.accepts(envelope))
            .cloned()
            .collect();

        let mut report = PublishReport {
            matched: targets.len(),
            ..PublishReport::default()
        };

        for subscription in targets {
            match subscription.target.deliver(envelope).await {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    warn!(
                        subscription = %subscription.name,
                        kind = ?err.kind(),
                        error = %err,
                        "delivery failed"
                    );
                    report.failures.push(DeliveryFailure {
                        subscription: subscription.name.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }

        debug!(matched = report.matched, delivered = report.delivered, "published");
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChangeEvent, COMMENT_TYPE, CAPTION};
    use crate::ports::{StoreError, SystemClock, UlidGenerator};
    use chrono::Utc;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<NotificationEnvelope>>,
    }

    impl Recorder {
        fn count(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Subscriber for Recorder {
        async fn deliver(&self, envelope: &NotificationEnvelope) -> Result<(), HandlerError> {
            self.seen.lock().unwrap().push(envelope.clone());
            Ok(())
        }
    }

    struct Broken;

    #[async_trait]
    impl Subscriber for Broken {
        async fn deliver(&self, _envelope: &NotificationEnvelope) -> Result<(), HandlerError> {
            Err(StoreError::Unavailable("table offline".into()).into())
        }
    }

    fn bus() -> EventBus {
        EventBus::new("images", Arc::new(UlidGenerator::new(Arc::new(SystemClock))))
    }

    fn upload() -> NotificationEnvelope {
        NotificationEnvelope::store_event(ChangeEvent::created("cat.jpg", "images", Utc::now()))
    }

    #[tokio::test]
    async fn unfiltered_subscription_receives_everything() {
        let bus = bus();
        let all = Arc::new(Recorder::default());
        bus.subscribe("all", all.clone(), None);

        bus.publish(&upload()).await;
        bus.publish(&NotificationEnvelope::caption("cat.jpg", "a cat")).await;

        assert_eq!(all.count(), 2);
    }

    #[tokio::test]
    async fn caption_filter_routes_only_captions() {
        let bus = bus();
        let captions = Arc::new(Recorder::default());
        bus.subscribe(
            "captions",
            captions.clone(),
            Some(FilterPolicy::new().allow(COMMENT_TYPE, [CAPTION])),
        );

        let upload_report = bus.publish(&upload()).await;
        let caption_report = bus.publish(&NotificationEnvelope::caption("cat.jpg", "a cat")).await;

        let mut other = crate::domain::MessageAttributes::new();
        other.insert(COMMENT_TYPE.into(), "Review".into());
        let review = NotificationEnvelope::with_attributes(
            other,
            NotificationEnvelope::caption("cat.jpg", "meh").body().clone(),
        );
        bus.publish(&review).await;

        assert_eq!(upload_report.matched, 0);
        assert_eq!(caption_report.matched, 1);
        assert_eq!(captions.count(), 1);
    }

    #[tokio::test]
    async fn failing_subscriber_does_not_stop_fan_out() {
        let bus = bus();
        let before = Arc::new(Recorder::default());
        let after = Arc::new(Recorder::default());
        bus.subscribe("before", before.clone(), None);
        bus.subscribe("broken", Arc::new(Broken), None);
        bus.subscribe("after", after.clone(), None);

        let report = bus.publish(&upload()).await;

        assert_eq!(report.matched, 3);
        assert_eq!(report.delivered, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].subscription, "broken");
        assert_eq!(before.count(), 1);
        assert_eq!(after.count(), 1);
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let bus = bus();
        let recorder = Arc::new(Recorder::default());
        let handle = bus.subscribe("r", recorder.clone(), None);

        assert!(bus.unsubscribe(&handle));
        assert!(!bus.unsubscribe(&handle));
        assert_eq!(bus.subscription_count(), 0);

        let report = bus.publish(&upload()).await;
        assert_eq!(report, PublishReport::default());
        assert_eq!(recorder.count(), 0);
    }
}
