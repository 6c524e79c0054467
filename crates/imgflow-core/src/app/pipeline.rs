//! Pipeline - オーケストレーション
//!
//! Wiring, leaves first:
//!
//! ```text
//! store event ──► EventBus ──┬─ changeType=ObjectCreated ─► ConfirmationMailer
//!                            ├─ changeType=ObjectCreated ─► image queue ─► ImageProcessor
//!                            │                                   │ (receive ceiling)
//!                            │                                   ▼
//!                            │                     dead-letter queue ─► RejectionMailer
//!                            ├─ changeType=ObjectRemoved ─► DeleteImageHandler
//!                            └─ commentType=Caption ──────► UpdateDescriptionHandler
//! ```

use std::sync::Arc;

use tracing::{info, warn};

use super::handlers::{ConfirmationMailer, DeleteImageHandler, UpdateDescriptionHandler};
use super::notifier::Notifier;
use super::processor::{ImageProcessor, RejectionMailer, RejectionPolicy};
use crate::bus::{EventBus, FilterPolicy, PublishReport, QueueSubscriber};
use crate::config::PipelineConfig;
use crate::domain::{
    CAPTION, CHANGE_TYPE, COMMENT_TYPE, ChangeEvent, ChangeType, DecodeError, NotificationEnvelope,
    decode_caption_request, decode_store_notification,
};
use crate::observability::QueueCounts;
use crate::ports::{Classifier, Clock, IdGenerator, Mailer, MetadataStore, UlidGenerator};
use crate::queue::{DurableQueue, InMemoryQueue, QueueError, QueueOptions, RedrivePolicy};
use crate::worker::{BatchReport, ConsumerSettings, QueueConsumer, WorkerGroup};

pub const TOPIC_NAME: &str = "images-topic";
pub const IMAGE_QUEUE_NAME: &str = "images-queue";
pub const DEAD_LETTER_QUEUE_NAME: &str = "image-rejections-queue";

/// Outcome of ingesting one store notification document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub events: usize,
    pub skipped: usize,
    pub publishes: Vec<PublishReport>,
}

/// Work done by [`Pipeline::drain`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub images: BatchReport,
    pub rejections: BatchReport,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStatus {
    pub image_queue: QueueCounts,
    pub dead_letter_queue: QueueCounts,
    pub subscriptions: usize,
}

pub struct Pipeline {
    config: PipelineConfig,
    clock: Arc<dyn Clock>,
    bus: Arc<EventBus>,
    image_queue: Arc<InMemoryQueue>,
    dead_letter_queue: Arc<InMemoryQueue>,
    image_consumer: Arc<QueueConsumer>,
    rejection_consumer: Arc<QueueConsumer>,
    store: Arc<dyn MetadataStore>,
}

impl Pipeline {
    pub(super) fn wire(
        config: PipelineConfig,
        store: Arc<dyn MetadataStore>,
        mailer: Arc<dyn Mailer>,
        classifier: Arc<dyn Classifier>,
        clock: Arc<dyn Clock>,
        rejection_policy: RejectionPolicy,
    ) -> Self {
        let ids: Arc<dyn IdGenerator> = Arc::new(UlidGenerator::new(clock.clone()));
        let bus = Arc::new(EventBus::new(TOPIC_NAME, ids.clone()));

        let dead_letter_queue = Arc::new(InMemoryQueue::new(
            DEAD_LETTER_QUEUE_NAME,
            QueueOptions {
                visibility_timeout: config.queue.visibility_timeout,
                retention: None,
                redrive: None,
            },
            ids.clone(),
            clock.clone(),
        ));
        let image_queue = Arc::new(
            InMemoryQueue::new(
                IMAGE_QUEUE_NAME,
                QueueOptions {
                    visibility_timeout: config.queue.visibility_timeout,
                    retention: config.queue.retention,
                    redrive: Some(RedrivePolicy::new(config.queue.max_receive_count)),
                },
                ids,
                clock.clone(),
            )
            .with_dead_letter(dead_letter_queue.clone()),
        );

        let notifier = Arc::new(Notifier::from_settings(mailer, &config.mail));
        let uploads = || FilterPolicy::new().allow(CHANGE_TYPE, [ChangeType::Created.attribute_value()]);

        // subscriptions live as long as the pipeline
        bus.subscribe(
            "confirmation-mailer",
            Arc::new(ConfirmationMailer::new(notifier.clone())),
            Some(uploads()),
        );
        bus.subscribe(
            IMAGE_QUEUE_NAME,
            Arc::new(QueueSubscriber::new(image_queue.clone())),
            Some(uploads()),
        );
        bus.subscribe(
            "delete-image",
            Arc::new(DeleteImageHandler::new(store.clone())),
            Some(FilterPolicy::new().allow(CHANGE_TYPE, [ChangeType::Removed.attribute_value()])),
        );
        bus.subscribe(
            "update-description",
            Arc::new(UpdateDescriptionHandler::new(store.clone())),
            Some(FilterPolicy::new().allow(COMMENT_TYPE, [CAPTION])),
        );

        let image_consumer = Arc::new(QueueConsumer::new(
            "image-processor",
            image_queue.clone(),
            Arc::new(ImageProcessor::new(
                classifier.clone(),
                store.clone(),
                notifier.clone(),
                rejection_policy,
            )),
            ConsumerSettings {
                batch_size: config.queue.batch_size,
                wait: config.queue.receive_wait,
            },
        ));
        let rejection_consumer = Arc::new(QueueConsumer::new(
            "rejection-mailer",
            dead_letter_queue.clone(),
            Arc::new(RejectionMailer::new(classifier, store.clone(), notifier)),
            ConsumerSettings {
                batch_size: config.dead_letter.batch_size,
                wait: config.dead_letter.receive_wait,
            },
        ));

        info!(
            topic = TOPIC_NAME,
            image_queue = IMAGE_QUEUE_NAME,
            dead_letter_queue = DEAD_LETTER_QUEUE_NAME,
            max_receive_count = config.queue.max_receive_count,
            ?rejection_policy,
            "pipeline wired"
        );

        Self {
            config,
            clock,
            bus,
            image_queue,
            dead_letter_queue,
            image_consumer,
            rejection_consumer,
            store,
        }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn metadata_store(&self) -> &Arc<dyn MetadataStore> {
        &self.store
    }

    pub async fn publish_store_event(&self, event: ChangeEvent) -> PublishReport {
        self.bus.publish(&NotificationEnvelope::store_event(event)).await
    }

    pub async fn request_caption(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> PublishReport {
        self.bus
            .publish(&NotificationEnvelope::caption(name, description))
            .await
    }

    /// Decode a store notification document and publish its events, one
    /// envelope per change type. Bad records are skipped and logged.
    pub async fn ingest_store_notification(&self, json: &str) -> Result<IngestReport, DecodeError> {
        let decoded = decode_store_notification(json, self.clock.now())?;
        for skipped in &decoded.skipped {
            warn!(record = skipped.index, reason = %skipped.reason, "malformed record skipped");
        }

        let mut report = IngestReport {
            events: decoded.events.len(),
            skipped: decoded.skipped.len(),
            publishes: Vec::new(),
        };
        for envelope in decoded.into_envelopes() {
            report.publishes.push(self.bus.publish(&envelope).await);
        }
        Ok(report)
    }

    pub async fn ingest_caption_request(&self, json: &str) -> Result<PublishReport, DecodeError> {
        let request = decode_caption_request(json)?;
        Ok(self.request_caption(request.name, request.description).await)
    }

    /// Run both consumers without waiting until neither queue has visible work.
    ///
    /// Messages still hidden by a visibility timeout are left alone.
    pub async fn drain(&self) -> Result<DrainReport, QueueError> {
        let mut report = DrainReport::default();
        loop {
            let images = self.image_consumer.process_available().await?;
            let rejections = self.rejection_consumer.process_available().await?;
            if images.is_empty() && rejections.is_empty() {
                return Ok(report);
            }
            report.images.merge(images);
            report.rejections.merge(rejections);
        }
    }

    /// Start long-polling workers for both queues.
    pub fn spawn_workers(&self) -> PipelineHandle {
        PipelineHandle {
            images: WorkerGroup::spawn(self.config.queue.workers, self.image_consumer.clone()),
            rejections: WorkerGroup::spawn(
                self.config.dead_letter.max_concurrency,
                self.rejection_consumer.clone(),
            ),
        }
    }

    pub async fn status(&self) -> Result<PipelineStatus, QueueError> {
        Ok(PipelineStatus {
            image_queue: self.image_queue.counts().await?,
            dead_letter_queue: self.dead_letter_queue.counts().await?,
            subscriptions: self.bus.subscription_count(),
        })
    }
}

/// Running worker groups of a pipeline.
pub struct PipelineHandle {
    images: WorkerGroup,
    rejections: WorkerGroup,
}

impl PipelineHandle {
    pub fn worker_count(&self) -> usize {
        self.images.len() + self.rejections.len()
    }

    pub async fn shutdown_and_join(self) {
        self.images.request_shutdown();
        self.rejections.request_shutdown();
        self.images.shutdown_and_join().await;
        self.rejections.shutdown_and_join().await;
    }
}
