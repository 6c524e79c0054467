//! In-memory queue implementation.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::{DurableQueue, MessageState, QueueError, QueuedMessage, RedrivePolicy, ReleaseOutcome};
use crate::domain::{MessageId, NotificationEnvelope};
use crate::observability::QueueCounts;
use crate::ports::{Clock, IdGenerator};

#[derive(Debug, Clone)]
pub struct QueueOptions {
    /// How long a received message stays hidden before it is implicitly released.
    pub visibility_timeout: Duration,

    /// Undelivered messages older than this are purged. `None` keeps them forever.
    pub retention: Option<Duration>,

    /// Receive ceiling. `None` means redeliver without limit (dead-letter queues).
    pub redrive: Option<RedrivePolicy>,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            visibility_timeout: Duration::from_secs(30),
            retention: None,
            redrive: None,
        }
    }
}

struct Entry {
    message: QueuedMessage,
    state: MessageState,
    enqueued: Instant,
    invisible_until: Option<Instant>,
}

/// Result of settling a failed delivery while holding the lock.
enum Settled {
    Requeued(u32),
    Escalate(QueuedMessage),
    Discarded,
}

/// Queue state.
///
/// `entries` is the single source of truth; `visible` only orders ids and may
/// hold stale ids of messages acknowledged while visible, which are skipped.
#[derive(Default)]
struct QueueState {
    entries: HashMap<MessageId, Entry>,
    visible: VecDeque<MessageId>,
    acknowledged: usize,
    dead_lettered: usize,
    expired: usize,
    discarded: usize,
}

impl QueueState {
    fn insert_visible(&mut self, message: QueuedMessage, now: Instant) {
        let id = message.id;
        self.entries.insert(
            id,
            Entry {
                message,
                state: MessageState::Visible,
                enqueued: now,
                invisible_until: None,
            },
        );
        self.visible.push_back(id);
    }

    fn take_visible(
        &mut self,
        max_batch: usize,
        now: Instant,
        wall_now: DateTime<Utc>,
        options: &QueueOptions,
        queue: &str,
    ) -> Vec<QueuedMessage> {
        let mut batch = Vec::new();
        while batch.len() < max_batch {
            let Some(id) = self.visible.pop_front() else {
                break;
            };
            let Some(entry) = self.entries.get_mut(&id) else {
                continue;
            };
            if !entry.state.is_receivable() {
                continue;
            }

            let retained = options
                .retention
                .is_none_or(|retention| now.duration_since(entry.enqueued) < retention);
            if !retained {
                self.entries.remove(&id);
                self.expired += 1;
                warn!(queue, message_id = %id, "retention period elapsed, message purged");
                continue;
            }

            entry.message.mark_received(wall_now);
            entry.state = MessageState::InFlight;
            entry.invisible_until = Some(now + options.visibility_timeout);
            batch.push(entry.message.clone());
        }
        batch
    }

    /// In-flight messages whose visibility timeout has lapsed.
    fn lapsed(&self, now: Instant) -> Vec<MessageId> {
        self.entries
            .iter()
            .filter(|(_, e)| e.state == MessageState::InFlight && e.invisible_until.is_some_and(|t| t <= now))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Earliest moment an in-flight message becomes reclaimable.
    fn next_lapse(&self) -> Option<Instant> {
        self.entries
            .values()
            .filter(|e| e.state == MessageState::InFlight)
            .filter_map(|e| e.invisible_until)
            .min()
    }

    fn settle_failure(
        &mut self,
        id: MessageId,
        reason: &str,
        redrive: Option<RedrivePolicy>,
        can_escalate: bool,
    ) -> Option<Settled> {
        let entry = self.entries.get_mut(&id)?;
        entry.message.last_error = Some(reason.to_string());
        let receive_count = entry.message.receive_count;

        if !redrive.is_some_and(|p| p.is_exhausted(receive_count)) {
            entry.state = MessageState::Visible;
            entry.invisible_until = None;
            self.visible.push_back(id);
            return Some(Settled::Requeued(receive_count));
        }

        let entry = self.entries.remove(&id)?;
        if can_escalate {
            self.dead_lettered += 1;
            Some(Settled::Escalate(entry.message))
        } else {
            self.discarded += 1;
            Some(Settled::Discarded)
        }
    }

    /// Take a message back after its dead-letter transfer failed.
    fn restore(&mut self, message: QueuedMessage, now: Instant) {
        self.dead_lettered = self.dead_lettered.saturating_sub(1);
        self.insert_visible(message, now);
    }

    fn counts(&self) -> QueueCounts {
        let mut counts = QueueCounts {
            acknowledged: self.acknowledged,
            dead_lettered: self.dead_lettered,
            expired: self.expired,
            discarded: self.discarded,
            ..QueueCounts::default()
        };
        for entry in self.entries.values() {
            match entry.state {
                MessageState::Visible => counts.visible += 1,
                MessageState::InFlight => counts.in_flight += 1,
            }
        }
        counts
    }
}

/// In-memory durable queue.
///
/// Timing uses `tokio::time::Instant`, so tests can drive visibility timeouts
/// and long polls with a paused clock. Message timestamps come from the
/// injected [`Clock`].
pub struct InMemoryQueue {
    name: String,
    options: QueueOptions,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    dead_letter: Option<Arc<dyn DurableQueue>>,
    state: Mutex<QueueState>,
    notify: Notify,
}

impl InMemoryQueue {
    pub fn new(
        name: impl Into<String>,
        options: QueueOptions,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            name: name.into(),
            options,
            ids,
            clock,
            dead_letter: None,
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
        }
    }

    /// Escalate exhausted messages to `queue`.
    pub fn with_dead_letter(mut self, queue: Arc<dyn DurableQueue>) -> Self {
        self.dead_letter = Some(queue);
        self
    }

    /// Implicitly release every in-flight message whose visibility timeout lapsed.
    async fn reclaim_lapsed(&self) {
        let (requeued, escalations) = {
            let mut state = self.state.lock().await;
            let lapsed = state.lapsed(Instant::now());
            let mut requeued = 0;
            let mut escalations = Vec::new();
            for id in lapsed {
                match state.settle_failure(
                    id,
                    "visibility timeout expired",
                    self.options.redrive,
                    self.dead_letter.is_some(),
                ) {
                    Some(Settled::Requeued(receive_count)) => {
                        debug!(queue = %self.name, message_id = %id, receive_count, "visibility timeout expired, message visible again");
                        requeued += 1;
                    }
                    Some(Settled::Escalate(message)) => escalations.push(message),
                    Some(Settled::Discarded) => {
                        error!(queue = %self.name, message_id = %id, "receive ceiling reached without dead-letter queue, message discarded");
                    }
                    None => {}
                }
            }
            (requeued, escalations)
        };

        if requeued > 0 {
            self.notify.notify_one();
        }
        for message in escalations {
            // the error is already logged and the message restored
            let _ = self.forward_to_dead_letter(message).await;
        }
    }

    async fn forward_to_dead_letter(&self, message: QueuedMessage) -> Result<(), QueueError> {
        let Some(dead_letter) = &self.dead_letter else {
            return Ok(());
        };
        let id = message.id;
        let receive_count = message.receive_count;

        match dead_letter.accept_redrive(message.for_redrive(self.clock.now())).await {
            Ok(()) => {
                info!(
                    queue = %self.name,
                    dead_letter_queue = %dead_letter.name(),
                    message_id = %id,
                    receive_count,
                    "message dead-lettered"
                );
                Ok(())
            }
            Err(err) => {
                error!(queue = %self.name, message_id = %id, error = %err, "dead-letter transfer failed, keeping message");
                self.state.lock().await.restore(message, Instant::now());
                self.notify.notify_one();
                Err(QueueError::Redrive {
                    queue: self.name.clone(),
                    id,
                    reason: err.to_string(),
                })
            }
        }
    }
}

#[async_trait]
impl DurableQueue for InMemoryQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn enqueue(&self, envelope: NotificationEnvelope) -> Result<MessageId, QueueError> {
        let id = self.ids.message_id();
        let message = QueuedMessage::new(id, envelope, self.clock.now());

        self.state.lock().await.insert_visible(message, Instant::now());
        self.notify.notify_one();

        debug!(queue = %self.name, message_id = %id, "enqueued");
        Ok(id)
    }

    async fn accept_redrive(&self, message: QueuedMessage) -> Result<(), QueueError> {
        let id = message.id;
        {
            let mut state = self.state.lock().await;
            if state.entries.contains_key(&id) {
                debug!(queue = %self.name, message_id = %id, "duplicate redrive ignored");
                return Ok(());
            }
            state.insert_visible(message, Instant::now());
        }
        self.notify.notify_one();
        Ok(())
    }

    async fn poll(&self, max_batch: usize, wait: Duration) -> Result<Vec<QueuedMessage>, QueueError> {
        let max_batch = max_batch.max(1);
        let deadline = Instant::now() + wait;

        loop {
            self.reclaim_lapsed().await;

            let (batch, next_lapse) = {
                let mut state = self.state.lock().await;
                let batch = state.take_visible(
                    max_batch,
                    Instant::now(),
                    self.clock.now(),
                    &self.options,
                    &self.name,
                );
                (batch, state.next_lapse())
            };

            if !batch.is_empty() {
                debug!(queue = %self.name, received = batch.len(), "batch received");
                return Ok(batch);
            }

            if Instant::now() >= deadline {
                return Ok(Vec::new());
            }

            let wake = next_lapse.map_or(deadline, |t| t.min(deadline));
            tokio::select! {
                _ = self.notify.notified() => {},
                _ = tokio::time::sleep_until(wake) => {},
            }
        }
    }

    async fn acknowledge(&self, id: MessageId) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        let Some(entry) = state.entries.remove(&id) else {
            return Err(QueueError::UnknownMessage {
                queue: self.name.clone(),
                id,
            });
        };
        if entry.state == MessageState::Visible {
            state.visible.retain(|v| *v != id);
        }
        state.acknowledged += 1;
        debug!(queue = %self.name, message_id = %id, "acknowledged");
        Ok(())
    }

    async fn release(&self, id: MessageId, reason: &str) -> Result<ReleaseOutcome, QueueError> {
        let settled = {
            let mut state = self.state.lock().await;
            match state.entries.get(&id).map(|e| e.state) {
                None => {
                    return Err(QueueError::UnknownMessage {
                        queue: self.name.clone(),
                        id,
                    });
                }
                Some(MessageState::InFlight) => {}
                Some(_) => {
                    return Err(QueueError::NotInFlight {
                        queue: self.name.clone(),
                        id,
                    });
                }
            }
            state.settle_failure(id, reason, self.options.redrive, self.dead_letter.is_some())
        };

        match settled {
            Some(Settled::Requeued(receive_count)) => {
                debug!(queue = %self.name, message_id = %id, receive_count, reason, "released for redelivery");
                self.notify.notify_one();
                Ok(ReleaseOutcome::Redelivered { receive_count })
            }
            Some(Settled::Escalate(message)) => {
                self.forward_to_dead_letter(message).await?;
                Ok(ReleaseOutcome::DeadLettered)
            }
            Some(Settled::Discarded) => {
                error!(queue = %self.name, message_id = %id, reason, "receive ceiling reached without dead-letter queue, message discarded");
                Ok(ReleaseOutcome::Discarded)
            }
            None => Err(QueueError::UnknownMessage {
                queue: self.name.clone(),
                id,
            }),
        }
    }

    async fn counts(&self) -> Result<QueueCounts, QueueError> {
        Ok(self.state.lock().await.counts())
    }
}
