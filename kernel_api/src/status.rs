//! Non-blocking send result

use serde::{Deserialize, Serialize};

/// Result of a non-blocking mailbox send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SendStatus {
    /// The slot at the write cursor is occupied; nothing was stored
    Full,
    /// The message was stored
    Sent,
    /// The message was stored and a woken waiter has priority at or above
    /// the running thread, so a reschedule is warranted
    SentPreempting,
}

impl SendStatus {
    /// Returns whether the message was stored
    pub fn is_sent(&self) -> bool {
        !matches!(self, SendStatus::Full)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_sent() {
        assert!(!SendStatus::Full.is_sent());
        assert!(SendStatus::Sent.is_sent());
        assert!(SendStatus::SentPreempting.is_sent());
    }
}
