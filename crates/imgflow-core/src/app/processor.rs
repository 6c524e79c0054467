//! Classifier gate on the image queue, and the rejection consumer on its
//! dead-letter queue.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::notifier::{Notifier, RecipientRole, rejection_message, unprocessable_message};
use crate::domain::{ChangeType, ImageRecord};
use crate::error::HandlerError;
use crate::ports::{Classifier, MetadataStore, Verdict};
use crate::queue::QueuedMessage;
use crate::worker::MessageHandler;

/// What the image processor does with a rejected upload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RejectionPolicy {
    /// Fail the delivery so the redrive ceiling moves the message to the
    /// dead-letter queue, whose consumer sends the rejection mail.
    #[default]
    DeadLetter,
    /// Send the rejection mail at once and acknowledge. The dead-letter queue
    /// then only sees messages that kept failing for other reasons.
    NotifyDirectly,
}

/// Image queue consumer: classify, then create the metadata record.
pub struct ImageProcessor {
    classifier: Arc<dyn Classifier>,
    store: Arc<dyn MetadataStore>,
    notifier: Arc<Notifier>,
    policy: RejectionPolicy,
}

impl ImageProcessor {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        store: Arc<dyn MetadataStore>,
        notifier: Arc<Notifier>,
        policy: RejectionPolicy,
    ) -> Self {
        Self {
            classifier,
            store,
            notifier,
            policy,
        }
    }
}

#[async_trait]
impl MessageHandler for ImageProcessor {
    /// Every event of the message is processed; the first failure is returned.
    async fn handle(&self, message: &QueuedMessage) -> Result<(), HandlerError> {
        if message.payload.caption_request().is_some() {
            return Err(HandlerError::Malformed(
                "caption request on the image queue".into(),
            ));
        }

        let mut first_error = None;
        for event in message.payload.events() {
            if event.change_type != ChangeType::Created {
                debug!(object_key = %event.object_key, "not an upload, skipped");
                continue;
            }

            match self.classifier.classify(&event.object_key) {
                Verdict::Accept => match self.store.put(ImageRecord::new(&event.object_key)).await {
                    Ok(()) => info!(object_key = %event.object_key, "image record created"),
                    Err(err) if first_error.is_none() => first_error = Some(HandlerError::from(err)),
                    Err(err) => warn!(object_key = %event.object_key, error = %err, "record create failed"),
                },
                Verdict::Reject(reason) => {
                    info!(object_key = %event.object_key, %reason, policy = ?self.policy, "upload rejected");
                    match self.policy {
                        RejectionPolicy::DeadLetter if first_error.is_none() => {
                            first_error = Some(HandlerError::Rejected {
                                object_key: event.object_key.clone(),
                                reason,
                            });
                        }
                        RejectionPolicy::DeadLetter => {}
                        RejectionPolicy::NotifyDirectly => {
                            let text = rejection_message(&event.bucket_id, &event.object_key);
                            self.notifier.notify(RecipientRole::Rejection, &text).await;
                        }
                    }
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Dead-letter queue consumer: one rejection mail per failed event, then done.
///
/// The classifier is asked again to tell a format rejection from a message
/// that simply ran out of retries. An accepted key whose record exists was
/// handled fine by an earlier delivery and gets no mail. Mail failures are
/// logged by the notifier and the message is still acknowledged.
pub struct RejectionMailer {
    classifier: Arc<dyn Classifier>,
    store: Arc<dyn MetadataStore>,
    notifier: Arc<Notifier>,
}

impl RejectionMailer {
    pub fn new(classifier: Arc<dyn Classifier>, store: Arc<dyn MetadataStore>, notifier: Arc<Notifier>) -> Self {
        Self {
            classifier,
            store,
            notifier,
        }
    }

    async fn already_stored(&self, object_key: &str) -> bool {
        match self.store.get(object_key).await {
            Ok(record) => record.is_some(),
            Err(err) => {
                warn!(%object_key, error = %err, "record lookup failed, mailing anyway");
                false
            }
        }
    }
}

#[async_trait]
impl MessageHandler for RejectionMailer {
    async fn handle(&self, message: &QueuedMessage) -> Result<(), HandlerError> {
        for event in message.payload.events() {
            let text = match self.classifier.classify(&event.object_key) {
                Verdict::Reject(_) => rejection_message(&event.bucket_id, &event.object_key),
                Verdict::Accept if self.already_stored(&event.object_key).await => {
                    debug!(object_key = %event.object_key, "record present, no failure mail");
                    continue;
                }
                Verdict::Accept => unprocessable_message(&event.bucket_id, &event.object_key),
            };
            self.notifier.notify(RecipientRole::Rejection, &text).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ulid::Ulid;

    use crate::domain::{ChangeEvent, MessageId, NotificationEnvelope};
    use crate::error::ErrorKind;
    use crate::impls::{ExtensionClassifier, InMemoryMailer, InMemoryMetadataStore};

    struct Fixture {
        store: Arc<InMemoryMetadataStore>,
        mailer: Arc<InMemoryMailer>,
        notifier: Arc<Notifier>,
    }

    impl Fixture {
        fn new() -> Self {
            let mailer = Arc::new(InMemoryMailer::new());
            Self {
                store: Arc::new(InMemoryMetadataStore::new()),
                notifier: Arc::new(Notifier::new(mailer.clone(), "noreply@example.com", "owner@example.com")),
                mailer,
            }
        }

        fn processor(&self, policy: RejectionPolicy) -> ImageProcessor {
            ImageProcessor::new(
                Arc::new(ExtensionClassifier::default()),
                self.store.clone(),
                self.notifier.clone(),
                policy,
            )
        }

        fn rejection_mailer(&self) -> RejectionMailer {
            RejectionMailer::new(
                Arc::new(ExtensionClassifier::default()),
                self.store.clone(),
                self.notifier.clone(),
            )
        }
    }

    fn message(keys: &[&str]) -> QueuedMessage {
        let events = keys
            .iter()
            .map(|k| ChangeEvent::created(*k, "images", Utc::now()))
            .collect();
        let mut msg = QueuedMessage::new(
            MessageId::from_ulid(Ulid::new()),
            NotificationEnvelope::store_events(ChangeType::Created, events),
            Utc::now(),
        );
        msg.mark_received(Utc::now());
        msg
    }

    #[tokio::test]
    async fn accepted_upload_creates_bare_record() {
        let f = Fixture::new();

        f.processor(RejectionPolicy::DeadLetter)
            .handle(&message(&["cat.jpg"]))
            .await
            .unwrap();

        assert_eq!(f.store.get("cat.jpg").await.unwrap(), Some(ImageRecord::new("cat.jpg")));
    }

    #[tokio::test]
    async fn rejected_upload_fails_delivery_without_record() {
        let f = Fixture::new();

        let err = f
            .processor(RejectionPolicy::DeadLetter)
            .handle(&message(&["doc.pdf"]))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Rejected);
        assert_eq!(f.store.len().await.unwrap(), 0);
        assert!(f.mailer.sent().await.is_empty());
    }

    #[tokio::test]
    async fn mixed_batch_still_stores_accepted_keys() {
        let f = Fixture::new();

        let result = f
            .processor(RejectionPolicy::DeadLetter)
            .handle(&message(&["doc.pdf", "cat.jpg"]))
            .await;

        assert!(result.is_err());
        assert!(f.store.get("cat.jpg").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn notify_directly_acknowledges_rejection() {
        let f = Fixture::new();

        f.processor(RejectionPolicy::NotifyDirectly)
            .handle(&message(&["doc.pdf"]))
            .await
            .unwrap();

        let sent = f.mailer.sent_with_subject("New image Upload Failed").await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].html_body.contains("doc.pdf"));
        assert_eq!(f.store.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn store_outage_is_transient() {
        let f = Fixture::new();
        f.store.set_unavailable(true);

        let err = f
            .processor(RejectionPolicy::DeadLetter)
            .handle(&message(&["cat.jpg"]))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transient);
    }

    #[tokio::test]
    async fn rejection_mailer_picks_message_by_verdict() {
        let f = Fixture::new();
        let mailer = f.rejection_mailer();

        mailer.handle(&message(&["doc.pdf", "cat.jpg"])).await.unwrap();

        let bodies: Vec<String> = f.mailer.sent().await.into_iter().map(|m| m.html_body).collect();
        assert_eq!(bodies.len(), 2);
        assert!(bodies[0].contains("The image doc.pdf that was sent to images was not of format .jpg or .png"));
        assert!(bodies[1].contains("The image cat.jpg that was sent to images could not be processed"));
    }

    #[tokio::test]
    async fn rejection_mailer_skips_keys_already_stored() {
        let f = Fixture::new();
        f.store.put(ImageRecord::new("cat.jpg")).await.unwrap();

        f.rejection_mailer()
            .handle(&message(&["doc.pdf", "cat.jpg"]))
            .await
            .unwrap();

        let sent = f.mailer.sent().await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].html_body.contains("doc.pdf"));
    }

    #[tokio::test]
    async fn rejection_mailer_acknowledges_when_mail_fails() {
        let f = Fixture::new();
        f.mailer.set_failing(true);
        let mailer = f.rejection_mailer();

        assert!(mailer.handle(&message(&["doc.pdf"])).await.is_ok());
    }
}
