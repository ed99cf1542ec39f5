//! Kernel API trait

use crate::{KernelError, Message, SendStatus, ThreadDescriptor};
use core_types::{EventId, MailboxId, Priority, SemaphoreId, ThreadId};

/// The kernel operations trait
///
/// This defines the interface between threads and the kernel. Multiple
/// implementations are possible: the host kernel used for development and
/// testing, or a firmware build driving the real trap boundary.
///
/// # Design Principles
///
/// **Strict priority**: a ready thread with priority at or above the
/// running thread runs without delay.
///
/// **Cooperative blocking**: `send`, `recv`, `sleep`, `wait_event` and
/// `sem_wait` suspend the calling thread until another thread, a timer, or
/// an interrupt re-enqueues it.
///
/// **Explicit time**: the timebase is an opaque tick counter; the kernel
/// never consults a wall clock.
pub trait KernelApi {
    /// Spawns a new thread and schedules it by priority
    ///
    /// If the new thread's priority is at or above the caller's, the caller
    /// yields immediately so the newcomer starts at once.
    fn spawn_thread(
        &self,
        descriptor: ThreadDescriptor,
        entry: Box<dyn FnOnce() + Send + 'static>,
    ) -> ThreadId;

    /// Switches to the ready thread with the highest priority, if that
    /// priority is at or above the caller's
    fn yield_now(&self);

    /// Changes a thread's priority (the caller's when `target` is `None`),
    /// then yields if the change makes another thread eligible
    fn set_priority(&self, target: Option<ThreadId>, priority: Priority)
        -> Result<(), KernelError>;

    /// Blocks the calling thread for the given number of ticks
    fn sleep(&self, ticks: u64);

    /// Marks a thread for termination
    ///
    /// The thread's resources are reclaimed by the scheduler, not here.
    /// Killing the calling thread does not return.
    fn kill(&self, thread: ThreadId) -> Result<(), KernelError>;

    /// Returns the calling thread's id
    fn current_thread(&self) -> ThreadId;

    /// Returns the current tick count
    fn now_ticks(&self) -> u64;

    /// Creates a mailbox holding up to `capacity` messages
    fn create_mailbox(&self, capacity: usize) -> MailboxId;

    /// Destroys a mailbox; it must not be attached to any event
    fn destroy_mailbox(&self, mailbox: MailboxId) -> Result<(), KernelError>;

    /// Stores a message if the mailbox has room, waking blocked receivers
    fn try_send(&self, mailbox: MailboxId, message: Message) -> Result<SendStatus, KernelError>;

    /// Stores a message, blocking while the mailbox is full
    fn send(&self, mailbox: MailboxId, message: Message) -> Result<(), KernelError>;

    /// Takes the oldest message if one is present, waking blocked senders
    fn try_recv(&self, mailbox: MailboxId) -> Result<Option<Message>, KernelError>;

    /// Takes the oldest message, blocking while the mailbox is empty
    fn recv(&self, mailbox: MailboxId) -> Result<Message, KernelError>;

    /// Creates an event
    fn create_event(&self) -> EventId;

    /// Destroys an event; no mailbox may still be attached
    fn destroy_event(&self, event: EventId) -> Result<(), KernelError>;

    /// Attaches a mailbox to an event's next free slot
    fn attach(&self, mailbox: MailboxId, event: EventId) -> Result<(), KernelError>;

    /// Detaches a mailbox from an event
    fn detach(&self, mailbox: MailboxId, event: EventId) -> Result<(), KernelError>;

    /// Posts the event to every attached mailbox, yielding if a woken
    /// thread has priority at or above the caller
    fn trigger(&self, event: EventId) -> Result<(), KernelError>;

    /// Posts the event from interrupt context: rescheduling is deferred to
    /// the interrupt-return path instead of happening mid-interrupt
    fn trigger_isr(&self, event: EventId) -> Result<(), KernelError>;

    /// Blocks until the event fires, via a transient single-slot mailbox
    fn wait_event(&self, event: EventId) -> Result<(), KernelError>;

    /// Creates a counting semaphore
    fn create_semaphore(&self, initial: u32) -> SemaphoreId;

    /// Destroys a semaphore; no thread may be waiting on it
    fn destroy_semaphore(&self, semaphore: SemaphoreId) -> Result<(), KernelError>;

    /// Takes a unit without blocking; returns whether one was available
    fn sem_try_wait(&self, semaphore: SemaphoreId) -> Result<bool, KernelError>;

    /// Takes a unit, blocking until one is available
    fn sem_wait(&self, semaphore: SemaphoreId) -> Result<(), KernelError>;

    /// Releases a unit, waking blocked waiters
    fn sem_post(&self, semaphore: SemaphoreId) -> Result<(), KernelError>;
}
