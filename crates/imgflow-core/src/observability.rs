use serde::{Deserialize, Serialize};

/// Snapshot of a queue, by message state.
///
/// `visible` and `in_flight` are live messages; the rest count messages that
/// have left the queue since it was created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub visible: usize,
    pub in_flight: usize,
    pub acknowledged: usize,
    pub dead_lettered: usize,
    pub expired: usize,
    pub discarded: usize,
}

impl QueueCounts {
    /// Messages still owned by the queue.
    pub fn live(&self) -> usize {
        self.visible + self.in_flight
    }
}
