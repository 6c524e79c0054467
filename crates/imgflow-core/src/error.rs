use thiserror::Error;

use crate::ports::{MailError, StoreError};
use crate::queue::QueueError;

/// Operational classification of a handler failure.
///
/// - `Transient`: a collaborator was unavailable; redelivery may succeed.
/// - `Rejected`: the classifier turned the object down; redelivery is pointless.
/// - `Malformed`: the message itself cannot be interpreted.
/// - `Infrastructure`: the queue plumbing itself failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Rejected,
    Malformed,
    Infrastructure,
}

/// Failure reported by a bus subscriber or a queue message handler.
///
/// For queue consumers any `Err` releases the message (receive-count
/// accounting applies); for bus subscribers it is logged and fan-out continues.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("object {object_key} rejected: {reason}")]
    Rejected { object_key: String, reason: String },

    #[error("malformed message: {0}")]
    Malformed(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Mail(#[from] MailError),
}

impl HandlerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HandlerError::Rejected { .. } => ErrorKind::Rejected,
            HandlerError::Malformed(_) => ErrorKind::Malformed,
            HandlerError::Queue(_) => ErrorKind::Infrastructure,
            HandlerError::Store(_) | HandlerError::Mail(_) => ErrorKind::Transient,
        }
    }
}
