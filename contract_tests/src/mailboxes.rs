//! Mailbox ordering and blocking contracts
