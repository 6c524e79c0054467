//! Per-message state machine.

use serde::{Deserialize, Serialize};

/// State of a message still held by a queue.
///
/// Transitions:
/// - Visible -> InFlight (received by a consumer)
/// - InFlight -> Visible (released, or visibility timeout lapsed, below the ceiling)
///
/// Acknowledgement, dead-lettering and retention expiry remove the entry;
/// the queue only counts them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageState {
    Visible,
    InFlight,
}

impl MessageState {
    pub fn is_receivable(self) -> bool {
        matches!(self, MessageState::Visible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_visible_is_receivable() {
        assert!(MessageState::Visible.is_receivable());
        assert!(!MessageState::InFlight.is_receivable());
    }
}
