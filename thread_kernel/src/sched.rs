//! Scheduler core
//!
//! The context-switch decision function invoked from the trap boundary.
//! It parks the previous thread, reclaims zombies, and selects the next
//! thread to run. It never blocks and allocates nothing beyond the audit
//! entry; the only memory it releases is the deferred reclamation of
//! terminated threads.

use crate::KernelState;
use core_types::ThreadId;
use hal::SavedContext;
use serde::{Deserialize, Serialize};

/// Why the scheduler was invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwitchReason {
    /// The running thread trapped on purpose, after enqueuing itself into
    /// some list
    Voluntary,
    /// An interrupt preempted the running thread, which is still runnable
    Preempted,
}

/// Audit trail entry for scheduling activity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleEvent {
    /// A thread was created and enqueued
    Spawned {
        thread: ThreadId,
        priority: core_types::Priority,
        at_tick: u64,
    },
    /// The scheduler switched contexts
    Switched {
        from: Option<ThreadId>,
        to: ThreadId,
        reason: SwitchReason,
        at_tick: u64,
    },
    /// A terminated thread's stack and control block were released
    Reclaimed { thread: ThreadId, at_tick: u64 },
    /// A one-shot timer fired
    TimerFired { at_tick: u64 },
    /// A timer re-enqueued a sleeping thread
    Woken { thread: ThreadId, at_tick: u64 },
}

/// Result of a scheduling decision
pub(crate) struct SchedOutcome {
    /// The thread to run next
    pub(crate) next: ThreadId,
    /// Its saved context, to be restored by the platform
    pub(crate) resume: Box<dyn SavedContext>,
    /// Contexts of threads reclaimed during this decision; the platform
    /// retires them
    pub(crate) reclaimed: Vec<Box<dyn SavedContext>>,
}

/// Parks the interrupted thread and selects the next one to run
///
/// `prev_context` is the saved context of the thread that just trapped or
/// was preempted; it is `None` only while the kernel is bootstrapping and
/// no thread is current.
pub(crate) fn schedule(
    state: &mut KernelState,
    prev_context: Option<Box<dyn SavedContext>>,
    reason: SwitchReason,
) -> SchedOutcome {
    let mut reclaimed = Vec::new();
    let from = state.current;

    if let Some(previous) = state.current.take() {
        let context = prev_context
            .unwrap_or_else(|| panic!("running thread {previous} has no context at the trap"));
        {
            let control = state.threads.control_mut(previous);
            assert!(
                control.stack.guard_intact(),
                "stack overflow in thread: {} ({previous}); stack guard is corrupted",
                control.name
            );
            control.saved = Some(context);
            control.saved_interrupt_depth = state.interrupt_depth;
        }

        if state.threads.control(previous).zombie {
            reclaimed.extend(reclaim(state, previous));
        } else {
            match reason {
                // An explicit trap means the thread already enqueued
                // itself somewhere it can be woken from; otherwise it
                // would never be scheduled again.
                SwitchReason::Voluntary => {
                    let control = state.threads.control(previous);
                    assert!(
                        control.in_list(),
                        "thread {} ({previous}) trapped without enqueuing itself",
                        control.name
                    );
                }
                SwitchReason::Preempted => {
                    assert!(
                        !state.threads.control(previous).in_list(),
                        "preempted thread {previous} is already linked into a list"
                    );
                    state
                        .ready
                        .insert_by_priority(&mut state.threads, previous);
                }
            }
        }
    }

    // The idle thread is always present, so the ready list cannot drain.
    // Zombies surfacing at the head are reclaimed here, without ever
    // running again.
    let next = loop {
        let candidate = state
            .ready
            .pop_head(&mut state.threads)
            .unwrap_or_else(|| panic!("ready list is empty: the idle thread is gone"));
        if state.threads.control(candidate).zombie {
            reclaimed.extend(reclaim(state, candidate));
            continue;
        }
        break candidate;
    };

    state.interrupt_depth = state.threads.control(next).saved_interrupt_depth;
    let resume = state
        .threads
        .control_mut(next)
        .saved
        .take()
        .unwrap_or_else(|| panic!("thread {next} was scheduled without a saved context"));
    state.current = Some(next);
    let at_tick = state.clock.ticks();
    state.audit.push(ScheduleEvent::Switched {
        from,
        to: next,
        reason,
        at_tick,
    });

    SchedOutcome {
        next,
        resume,
        reclaimed,
    }
}

/// Releases a zombie's combined stack and control-block allocation
fn reclaim(state: &mut KernelState, thread: ThreadId) -> Option<Box<dyn SavedContext>> {
    assert!(
        !state.threads.control(thread).in_list(),
        "reclaiming thread {thread} while it is still linked"
    );
    let mut control = state.threads.remove(thread);
    let at_tick = state.clock.ticks();
    state
        .audit
        .push(ScheduleEvent::Reclaimed { thread, at_tick });
    control.saved.take()
}
