//! # Kernel Contract Tests
//!
//! This crate locks down the observable scheduling contracts so they
//! don't drift accidentally over time.
//!
//! ## Philosophy
//!
//! - **Explicit over implicit**: ordering guarantees are written as code
//! - **Testability first**: contract tests fail when semantics change
//! - **Determinism**: every scenario drives virtual time explicitly and
//!   observes one fixed interleaving
//!
//! ## Structure
//!
//! Each contract area has a module: strict-priority scheduling, thread
//! lifecycle and reclamation, mailbox ordering and blocking, event
//! fan-out, semaphores, and timers/sleep.

pub mod api;
pub mod events;
pub mod lifecycle;
pub mod mailboxes;
pub mod scheduling;
pub mod semaphores;
pub mod timers;

/// Common helpers for kernel scenarios
pub mod test_helpers {
    use core_types::{Priority, ThreadId};
    use kernel_api::ThreadDescriptor;
    use thread_kernel::{ScheduleEvent, SwitchReason};

    /// Descriptor shorthand for scenario threads
    pub fn descriptor(name: &str, priority: i8) -> ThreadDescriptor {
        ThreadDescriptor::new(name).with_priority(Priority::new(priority))
    }

    /// The sequence of context switches in an audit log
    pub fn switches(log: &[ScheduleEvent]) -> Vec<(ThreadId, SwitchReason)> {
        log.iter()
            .filter_map(|event| match event {
                ScheduleEvent::Switched { to, reason, .. } => Some((*to, *reason)),
                _ => None,
            })
            .collect()
    }

    /// How many times the given thread was reclaimed
    pub fn reclaim_count(log: &[ScheduleEvent], thread: ThreadId) -> usize {
        log.iter()
            .filter(|event| {
                matches!(event, ScheduleEvent::Reclaimed { thread: t, .. } if *t == thread)
            })
            .count()
    }
}
