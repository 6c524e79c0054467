//! Direct bus subscribers: upload confirmation and metadata mutations.
//!
//! Each handler is idempotent under the object key, so duplicate or
//! reordered deliveries converge. An update that races ahead of the create
//! for the same key finds no row and is dropped; that is accepted.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::notifier::{Notifier, RecipientRole, confirmation_message};
use crate::bus::Subscriber;
use crate::domain::{ChangeType, NotificationEnvelope};
use crate::error::HandlerError;
use crate::ports::MetadataStore;

/// Mails a confirmation for every uploaded object, before classification.
pub struct ConfirmationMailer {
    notifier: Arc<Notifier>,
}

impl ConfirmationMailer {
    pub fn new(notifier: Arc<Notifier>) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl Subscriber for ConfirmationMailer {
    async fn deliver(&self, envelope: &NotificationEnvelope) -> Result<(), HandlerError> {
        for event in envelope.events() {
            if event.change_type != ChangeType::Created {
                continue;
            }
            let message = confirmation_message(&event.bucket_id, &event.object_key);
            self.notifier.notify(RecipientRole::Confirmation, &message).await;
        }
        Ok(())
    }
}

/// Applies `commentType = Caption` requests as conditional updates.
pub struct UpdateDescriptionHandler {
    store: Arc<dyn MetadataStore>,
}

impl UpdateDescriptionHandler {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Subscriber for UpdateDescriptionHandler {
    async fn deliver(&self, envelope: &NotificationEnvelope) -> Result<(), HandlerError> {
        let request = envelope
            .caption_request()
            .ok_or_else(|| HandlerError::Malformed("caption envelope without a caption request".into()))?;

        if self
            .store
            .update_description(&request.name, &request.description)
            .await?
        {
            info!(object_key = %request.name, "description updated");
        } else {
            debug!(object_key = %request.name, "no record for caption, update dropped");
        }
        Ok(())
    }
}

/// Deletes the record of every removed object.
pub struct DeleteImageHandler {
    store: Arc<dyn MetadataStore>,
}

impl DeleteImageHandler {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Subscriber for DeleteImageHandler {
    /// Every event is attempted; the first failure is reported.
    async fn deliver(&self, envelope: &NotificationEnvelope) -> Result<(), HandlerError> {
        let mut first_error = None;
        for event in envelope.events() {
            if event.change_type != ChangeType::Removed {
                continue;
            }
            match self.store.delete(&event.object_key).await {
                Ok(removed) => info!(object_key = %event.object_key, removed, "image record deleted"),
                Err(err) if first_error.is_none() => first_error = Some(HandlerError::from(err)),
                Err(err) => warn!(object_key = %event.object_key, error = %err, "delete failed"),
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::domain::{ChangeEvent, ImageRecord};
    use crate::impls::{InMemoryMailer, InMemoryMetadataStore};

    #[tokio::test]
    async fn update_without_record_creates_nothing() {
        let store = Arc::new(InMemoryMetadataStore::new());
        let handler = UpdateDescriptionHandler::new(store.clone());

        handler
            .deliver(&NotificationEnvelope::caption("ghost.jpg", "boo"))
            .await
            .unwrap();

        assert_eq!(store.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn update_sets_description() {
        let store = Arc::new(InMemoryMetadataStore::new());
        store.put(ImageRecord::new("cat.jpg")).await.unwrap();
        let handler = UpdateDescriptionHandler::new(store.clone());

        handler
            .deliver(&NotificationEnvelope::caption("cat.jpg", "a cat"))
            .await
            .unwrap();

        let record = store.get("cat.jpg").await.unwrap().unwrap();
        assert_eq!(record.description.as_deref(), Some("a cat"));
    }

    #[tokio::test]
    async fn update_rejects_non_caption_payload() {
        let handler = UpdateDescriptionHandler::new(Arc::new(InMemoryMetadataStore::new()));
        let upload = NotificationEnvelope::store_event(ChangeEvent::created("cat.jpg", "images", Utc::now()));

        let err = handler.deliver(&upload).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Malformed);
    }

    #[tokio::test]
    async fn delete_twice_ends_absent() {
        let store = Arc::new(InMemoryMetadataStore::new());
        store.put(ImageRecord::new("cat.jpg")).await.unwrap();
        let handler = DeleteImageHandler::new(store.clone());
        let removal = NotificationEnvelope::store_event(ChangeEvent::removed("cat.jpg", "images", Utc::now()));

        handler.deliver(&removal).await.unwrap();
        handler.deliver(&removal).await.unwrap();

        assert_eq!(store.get("cat.jpg").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_surfaces_store_outage() {
        let store = Arc::new(InMemoryMetadataStore::new());
        store.set_unavailable(true);
        let handler = DeleteImageHandler::new(store);
        let removal = NotificationEnvelope::store_event(ChangeEvent::removed("cat.jpg", "images", Utc::now()));

        let err = handler.deliver(&removal).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Transient);
    }

    #[tokio::test]
    async fn confirmation_is_sent_per_upload_and_never_fails() {
        let mailer = Arc::new(InMemoryMailer::new());
        let notifier = Arc::new(Notifier::new(mailer.clone(), "noreply@example.com", "owner@example.com"));
        let handler = ConfirmationMailer::new(notifier);
        let upload = NotificationEnvelope::store_events(
            ChangeType::Created,
            vec![
                ChangeEvent::created("a.jpg", "images", Utc::now()),
                ChangeEvent::created("b.pdf", "images", Utc::now()),
            ],
        );

        handler.deliver(&upload).await.unwrap();
        assert_eq!(mailer.sent_with_subject("New Image Upload").await.len(), 2);

        mailer.set_failing(true);
        assert!(handler.deliver(&upload).await.is_ok());
    }
}
