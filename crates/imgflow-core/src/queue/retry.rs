//! Redrive policy: decides when a failing message stops being redelivered.

/// Redrive policy for a queue with a dead-letter target.
///
/// `max_receive_count` is the number of deliveries a message gets before it is
/// escalated: a failed delivery whose receive count has reached the ceiling
/// would exceed it on the next receive, so the message moves to the
/// dead-letter queue instead.
///
/// With the default ceiling of 1 the first failure is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedrivePolicy {
    pub max_receive_count: u32,
}

impl RedrivePolicy {
    pub fn new(max_receive_count: u32) -> Self {
        Self {
            max_receive_count: max_receive_count.max(1),
        }
    }

    pub fn is_exhausted(&self, receive_count: u32) -> bool {
        receive_count >= self.max_receive_count
    }
}

impl Default for RedrivePolicy {
    fn default() -> Self {
        Self::new(1)
    }
}
