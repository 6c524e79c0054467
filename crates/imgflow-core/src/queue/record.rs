//! Queued message: payload plus delivery bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{MessageId, NotificationEnvelope};

/// A message as handed to consumers.
///
/// Owned by exactly one queue at a time. Consumers get a copy; the queue's
/// own copy is the one that counts for acknowledgement and redelivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedMessage {
    pub id: MessageId,
    pub payload: NotificationEnvelope,

    /// Number of times this message has been received from its current queue
    /// (including the delivery in hand).
    pub receive_count: u32,

    /// When the message was first received from its current queue.
    pub first_received_at: Option<DateTime<Utc>>,

    pub enqueued_at: DateTime<Utc>,

    /// Reason given by the last release, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl QueuedMessage {
    pub fn new(id: MessageId, payload: NotificationEnvelope, enqueued_at: DateTime<Utc>) -> Self {
        Self {
            id,
            payload,
            receive_count: 0,
            first_received_at: None,
            enqueued_at,
            last_error: None,
        }
    }

    /// Record one more delivery.
    pub fn mark_received(&mut self, now: DateTime<Utc>) {
        self.receive_count += 1;
        self.first_received_at.get_or_insert(now);
    }

    /// Copy for a dead-letter queue: same id and payload, fresh accounting.
    pub fn for_redrive(&self, now: DateTime<Utc>) -> Self {
        Self {
            id: self.id,
            payload: self.payload.clone(),
            receive_count: 0,
            first_received_at: None,
            enqueued_at: now,
            last_error: self.last_error.clone(),
        }
    }
}
