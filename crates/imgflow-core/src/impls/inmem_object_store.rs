//! InMemoryObjectStore - 開発用のバケット
//!
//! 変更があるたびに change notification を bus に publish します。

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::bus::EventBus;
use crate::domain::{ChangeEvent, NotificationEnvelope};
use crate::ports::{Clock, ObjectStore, ObjectStoreError};

/// `set_unavailable(true)` fails every call with
/// [`ObjectStoreError::Unavailable`] and emits nothing.
pub struct InMemoryObjectStore {
    bucket: String,
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
    bus: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    unavailable: AtomicBool,
}

impl InMemoryObjectStore {
    pub fn new(bucket: impl Into<String>, bus: Arc<EventBus>, clock: Arc<dyn Clock>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: RwLock::new(BTreeMap::new()),
            bus,
            clock,
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), ObjectStoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ObjectStoreError::Unavailable(format!("bucket {} unreachable", self.bucket)));
        }
        Ok(())
    }

    async fn emit(&self, event: ChangeEvent) {
        let report = self.bus.publish(&NotificationEnvelope::store_event(event)).await;
        debug!(bucket = %self.bucket, matched = report.matched, "change notification emitted");
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put_object(&self, key: &str, bytes: Vec<u8>) -> Result<(), ObjectStoreError> {
        self.check()?;
        self.objects.write().await.insert(key.to_string(), bytes);
        self.emit(ChangeEvent::created(key, &self.bucket, self.clock.now())).await;
        Ok(())
    }

    async fn remove_object(&self, key: &str) -> Result<bool, ObjectStoreError> {
        self.check()?;
        let removed = self.objects.write().await.remove(key).is_some();
        if removed {
            self.emit(ChangeEvent::removed(key, &self.bucket, self.clock.now())).await;
        }
        Ok(removed)
    }

    async fn contains(&self, key: &str) -> Result<bool, ObjectStoreError> {
        self.check()?;
        Ok(self.objects.read().await.contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::bus::Subscriber;
    use crate::domain::ChangeType;
    use crate::error::HandlerError;
    use crate::ports::{SystemClock, UlidGenerator};

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(ChangeType, String)>>,
    }

    #[async_trait]
    impl Subscriber for Recorder {
        async fn deliver(&self, envelope: &NotificationEnvelope) -> Result<(), HandlerError> {
            let mut seen = self.seen.lock().unwrap();
            for event in envelope.events() {
                seen.push((event.change_type, event.object_key.clone()));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn mutations_emit_change_events() {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let bus = Arc::new(EventBus::new("images", Arc::new(UlidGenerator::new(clock.clone()))));
        let recorder = Arc::new(Recorder::default());
        bus.subscribe("recorder", recorder.clone(), None);
        let store = InMemoryObjectStore::new("images", bus, clock);

        store.put_object("cat.jpg", vec![1, 2, 3]).await.unwrap();
        assert!(store.contains("cat.jpg").await.unwrap());
        assert!(store.remove_object("cat.jpg").await.unwrap());
        // nothing left to remove, so no second event
        assert!(!store.remove_object("cat.jpg").await.unwrap());

        assert_eq!(
            *recorder.seen.lock().unwrap(),
            vec![
                (ChangeType::Created, "cat.jpg".to_string()),
                (ChangeType::Removed, "cat.jpg".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn unavailable_bucket_fails_without_emitting() {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let bus = Arc::new(EventBus::new("images", Arc::new(UlidGenerator::new(clock.clone()))));
        let recorder = Arc::new(Recorder::default());
        bus.subscribe("recorder", recorder.clone(), None);
        let store = InMemoryObjectStore::new("images", bus, clock);
        store.set_unavailable(true);

        let err = store.put_object("cat.jpg", vec![1]).await.unwrap_err();
        assert!(matches!(err, ObjectStoreError::Unavailable(_)));
        assert!(recorder.seen.lock().unwrap().is_empty());

        store.set_unavailable(false);
        assert!(!store.contains("cat.jpg").await.unwrap());
    }
}
