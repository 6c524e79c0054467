//! Durable queue: at-least-once delivery with visibility timeouts and
//! bounded redelivery into a dead-letter queue.

mod memory;
mod record;
mod retry;
mod state;

pub use memory::{InMemoryQueue, QueueOptions};
pub use record::QueuedMessage;
pub use retry::RedrivePolicy;
pub use state::MessageState;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{MessageId, NotificationEnvelope};
use crate::observability::QueueCounts;

#[derive(Debug, Clone, Error)]
pub enum QueueError {
    #[error("message {id} is unknown to queue {queue}")]
    UnknownMessage { queue: String, id: MessageId },

    #[error("message {id} on queue {queue} is not in flight")]
    NotInFlight { queue: String, id: MessageId },

    #[error("dead-letter transfer of {id} from {queue} failed: {reason}")]
    Redrive {
        queue: String,
        id: MessageId,
        reason: String,
    },

    #[error("queue {queue} unavailable: {reason}")]
    Unavailable { queue: String, reason: String },
}

/// Where a released message ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Visible again; `receive_count` deliveries so far.
    Redelivered { receive_count: u32 },
    /// Receive ceiling reached; now owned by the dead-letter queue.
    DeadLettered,
    /// Receive ceiling reached with no dead-letter queue configured; dropped.
    Discarded,
}

/// Queue port.
///
/// Message lifecycle:
/// `Visible -> InFlight -> (Acknowledged | Visible | DeadLettered)`.
/// `release` (explicit, or implicit when a visibility timeout lapses) either
/// makes the message visible again or, once its receive count has reached the
/// redrive ceiling, hands it to the dead-letter queue and purges it here.
#[async_trait]
pub trait DurableQueue: Send + Sync {
    fn name(&self) -> &str;

    async fn enqueue(&self, envelope: NotificationEnvelope) -> Result<MessageId, QueueError>;

    /// Take ownership of a message escalated by another queue. The message id
    /// is kept and its receive count starts over. Accepting the same id twice
    /// is a no-op.
    async fn accept_redrive(&self, message: QueuedMessage) -> Result<(), QueueError>;

    /// Receive up to `max_batch` messages, waiting at most `wait` for the
    /// first one to become visible. An empty batch is a normal outcome.
    async fn poll(&self, max_batch: usize, wait: Duration) -> Result<Vec<QueuedMessage>, QueueError>;

    /// Delete a received message.
    async fn acknowledge(&self, id: MessageId) -> Result<(), QueueError>;

    /// Give up on an in-flight message.
    async fn release(&self, id: MessageId, reason: &str) -> Result<ReleaseOutcome, QueueError>;

    async fn counts(&self) -> Result<QueueCounts, QueueError>;
}
