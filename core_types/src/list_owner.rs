//! List ownership tag

use crate::{MailboxId, SemaphoreId};
use serde::{Deserialize, Serialize};

/// Names the list that currently owns a thread's link field
///
/// A thread is linked into at most one list at a time: the ready list, one
/// primitive's wait list, or (for a sleeping thread) the timer queue's
/// custody. The tag is checked on every insert and removal, so a
/// double-enqueue or a removal by the wrong list is caught structurally.
///
/// `Timer` is the one tag without a physical link: a sleeping thread is not
/// chained anywhere, but the pending timer guarantees it will be re-enqueued,
/// which is what list membership means to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListOwner {
    /// The ready list
    Ready,
    /// The wait list of the given mailbox
    MailboxWait(MailboxId),
    /// The wait list of the given semaphore
    SemaphoreWait(SemaphoreId),
    /// In the custody of a pending wake-up timer
    Timer,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_equality_includes_primitive_identity() {
        let a = MailboxId::new();
        let b = MailboxId::new();
        assert_eq!(ListOwner::MailboxWait(a), ListOwner::MailboxWait(a));
        assert_ne!(ListOwner::MailboxWait(a), ListOwner::MailboxWait(b));
        assert_ne!(ListOwner::Ready, ListOwner::Timer);
    }
}
