//! Kernel error types

use core_types::{EventId, MailboxId, SemaphoreId, ThreadId};
use thiserror::Error;

/// Errors that can occur when interacting with the kernel
///
/// These are the recoverable outcomes: a caller handed the kernel a handle
/// it no longer recognizes, or asked for a resource that is exhausted.
/// Kernel-integrity violations (corrupted stack guards, list discipline
/// breaches, scheduling with an empty ready list) are not errors; they
/// halt with a diagnostic.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KernelError {
    /// Mailbox handle does not name a live mailbox
    #[error("unknown mailbox: {0}")]
    UnknownMailbox(MailboxId),

    /// Event handle does not name a live event
    #[error("unknown event: {0}")]
    UnknownEvent(EventId),

    /// Semaphore handle does not name a live semaphore
    #[error("unknown semaphore: {0}")]
    UnknownSemaphore(SemaphoreId),

    /// Thread handle does not name a live thread
    #[error("unknown thread: {0}")]
    UnknownThread(ThreadId),

    /// Every attachment slot of the event is taken
    #[error("event has no free attachment slots")]
    EventSlotsFull,

    /// The mailbox is not attached to the event
    #[error("mailbox is not attached to this event")]
    NotAttached,
}
