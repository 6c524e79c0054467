//! Queue consumers and the worker group that drives them.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::HandlerError;
use crate::queue::{DurableQueue, QueueError, QueuedMessage, ReleaseOutcome};

/// Processes one queued message. `Err` releases the message back to its queue.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: &QueuedMessage) -> Result<(), HandlerError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerSettings {
    /// Messages per poll (1..=10).
    pub batch_size: usize,
    /// Long-poll wait for the first message.
    pub wait: Duration,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            batch_size: 5,
            wait: Duration::from_secs(10),
        }
    }
}

/// Per-batch accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub received: usize,
    pub acknowledged: usize,
    /// Released and visible again.
    pub released: usize,
    pub dead_lettered: usize,
    pub discarded: usize,
}

impl BatchReport {
    pub fn is_empty(&self) -> bool {
        self.received == 0
    }

    pub fn merge(&mut self, other: BatchReport) {
        self.received += other.received;
        self.acknowledged += other.acknowledged;
        self.released += other.released;
        self.dead_lettered += other.dead_lettered;
        self.discarded += other.discarded;
    }
}

/// Binds a handler to a queue.
///
/// Each message of a batch is settled on its own: success acknowledges it,
/// failure releases it with the error text as the reason.
pub struct QueueConsumer {
    name: String,
    queue: Arc<dyn DurableQueue>,
    handler: Arc<dyn MessageHandler>,
    settings: ConsumerSettings,
}

impl QueueConsumer {
    pub fn new(
        name: impl Into<String>,
        queue: Arc<dyn DurableQueue>,
        handler: Arc<dyn MessageHandler>,
        settings: ConsumerSettings,
    ) -> Self {
        Self {
            name: name.into(),
            queue,
            handler,
            settings,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Long-poll once and settle whatever arrived.
    pub async fn process_batch(&self) -> Result<BatchReport, QueueError> {
        let batch = self
            .queue
            .poll(self.settings.batch_size, self.settings.wait)
            .await?;
        Ok(self.settle(batch).await)
    }

    /// Poll without waiting until the queue has nothing visible left.
    pub async fn process_available(&self) -> Result<BatchReport, QueueError> {
        let mut total = BatchReport::default();
        loop {
            let batch = self
                .queue
                .poll(self.settings.batch_size, Duration::ZERO)
                .await?;
            if batch.is_empty() {
                return Ok(total);
            }
            total.merge(self.settle(batch).await);
        }
    }

    async fn settle(&self, batch: Vec<QueuedMessage>) -> BatchReport {
        let mut report = BatchReport {
            received: batch.len(),
            ..BatchReport::default()
        };

        for message in batch {
            match self.handler.handle(&message).await {
                Ok(()) => match self.queue.acknowledge(message.id).await {
                    Ok(()) => report.acknowledged += 1,
                    // visibility lapsed mid-handling; the message will come back
                    Err(err) => warn!(consumer = %self.name, message_id = %message.id, error = %err, "acknowledge failed"),
                },
                Err(err) => {
                    debug!(
                        consumer = %self.name,
                        message_id = %message.id,
                        receive_count = message.receive_count,
                        kind = ?err.kind(),
                        error = %err,
                        "handler failed, releasing"
                    );
                    match self.queue.release(message.id, &err.to_string()).await {
                        Ok(ReleaseOutcome::Redelivered { .. }) => report.released += 1,
                        Ok(ReleaseOutcome::DeadLettered) => report.dead_lettered += 1,
                        Ok(ReleaseOutcome::Discarded) => report.discarded += 1,
                        Err(err) => error!(consumer = %self.name, message_id = %message.id, error = %err, "release failed"),
                    }
                }
            }
        }

        if !report.is_empty() {
            debug!(
                consumer = %self.name,
                received = report.received,
                acknowledged = report.acknowledged,
                released = report.released,
                dead_lettered = report.dead_lettered,
                "batch settled"
            );
        }
        report
    }
}

/// Worker group handle.
/// - `request_shutdown` でワーカー全体が新しい poll を止める
/// - `shutdown_and_join` で全ワーカーの終了を待てる
///
/// A worker never abandons a poll or a batch midway, so shutdown latency is
/// bounded by the consumer's poll wait plus one batch.
pub struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    /// Spawn `n` workers sharing `consumer`.
    pub fn spawn(n: usize, consumer: Arc<QueueConsumer>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let consumer = Arc::clone(&consumer);
            let mut rx = shutdown_rx.clone();

            joins.push(tokio::spawn(async move {
                worker_loop(worker_id, consumer, &mut rx).await;
            }));
        }

        info!(consumer = %consumer.name(), workers = n, "worker group started");
        Self { shutdown_tx, joins }
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for join in self.joins {
            let _ = join.await;
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    consumer: Arc<QueueConsumer>,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    debug!(consumer = %consumer.name(), worker_id, "worker started");
    while !*shutdown_rx.borrow() {
        if let Err(err) = consumer.process_batch().await {
            warn!(consumer = %consumer.name(), worker_id, error = %err, "poll failed, backing off");
            // queue 側が落ちている間は少し待つ (shutdown は優先)
            tokio::select! {
                _ = shutdown_rx.changed() => {}
                _ = tokio::time::sleep(Duration::from_secs(1)) => {}
            }
        }
    }
    debug!(consumer = %consumer.name(), worker_id, "worker stopped");
}
