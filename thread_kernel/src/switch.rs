//! Host execution platform
//!
//! Supplies the trap boundary of the scheduler contract for a hosted
//! build: every kernel thread is backed by a native thread, of which
//! exactly one is ever runnable. A context switch publishes the chosen
//! thread's baton token and parks the switching thread on the kernel
//! condvar until its own token is published again. The kernel state mutex
//! doubles as the interrupt gate: holding it is "interrupts disabled",
//! parking on the condvar releases it.
//!
//! The scheduler core sees none of this; it receives and returns opaque
//! [`SavedContext`] values, and only this module downcasts them.

use crate::sched::{self, SwitchReason};
use crate::{KernelInner, KernelState};
use core_types::ThreadId;
use hal::SavedContext;
use std::any::Any;
use std::cell::RefCell;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::{Arc, MutexGuard};
use std::thread::JoinHandle;

/// Saved context of a host-backed thread: the baton token its parked
/// native thread waits on
#[derive(Debug)]
pub(crate) struct HostContext {
    pub(crate) token: u64,
}

impl SavedContext for HostContext {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Recovers the baton token from an opaque context
pub(crate) fn context_token(context: &dyn SavedContext) -> u64 {
    context
        .as_any()
        .downcast_ref::<HostContext>()
        .unwrap_or_else(|| panic!("foreign execution context handed to the host platform"))
        .token
}

/// Panic payload that unwinds a terminated thread off its host stack
/// without running any further kernel code
pub(crate) struct ThreadExit;

/// The next thread's context, published by the switching host thread and
/// consumed by the resuming one
#[derive(Debug)]
pub(crate) struct Handoff {
    pub(crate) thread: ThreadId,
    pub(crate) context: Box<dyn SavedContext>,
}

struct RunningThread {
    kernel: u64,
    thread: ThreadId,
    context: Box<dyn SavedContext>,
}

thread_local! {
    static RUNNING: RefCell<Option<RunningThread>> = const { RefCell::new(None) };
}

/// How a park ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SwitchOutcome {
    /// The thread was scheduled again
    Resumed,
    /// The thread was reclaimed while parked; its host thread must wind
    /// down without touching the kernel again
    Exited,
}

impl KernelInner {
    pub(crate) fn lock_state(&self) -> MutexGuard<'_, KernelState> {
        self.state
            .lock()
            .unwrap_or_else(|_| panic!("kernel state poisoned by an earlier fault"))
    }

    /// Registers the calling host thread as the given kernel thread
    pub(crate) fn adopt_running(&self, thread: ThreadId, context: Box<dyn SavedContext>) {
        RUNNING.with(|slot| {
            let mut slot = slot.borrow_mut();
            assert!(
                slot.is_none(),
                "calling thread already runs a kernel thread"
            );
            *slot = Some(RunningThread {
                kernel: self.id,
                thread,
                context,
            });
        });
    }

    /// Forgets the calling host thread's kernel identity (kernel teardown)
    pub(crate) fn clear_running(&self) {
        RUNNING.with(|slot| slot.borrow_mut().take());
    }

    /// Identifies the calling kernel thread
    ///
    /// Fatal when the caller is not a thread of this kernel, or not the
    /// one the scheduler believes is running: under the baton discipline
    /// only the scheduled thread can be executing kernel code.
    pub(crate) fn current_checked(&self, state: &KernelState) -> ThreadId {
        let (kernel, thread) = RUNNING
            .with(|slot| {
                slot.borrow()
                    .as_ref()
                    .map(|running| (running.kernel, running.thread))
            })
            .unwrap_or_else(|| panic!("kernel call from a thread the kernel does not manage"));
        assert!(
            kernel == self.id,
            "kernel call from a thread owned by a different kernel"
        );
        assert!(
            state.current == Some(thread),
            "kernel call from a thread that is not scheduled"
        );
        thread
    }

    /// Low-level context switch: runs the scheduler, hands the chosen
    /// context to its host thread, and parks until rescheduled or retired
    pub(crate) fn switch_raw<'a>(
        &self,
        mut guard: MutexGuard<'a, KernelState>,
        reason: SwitchReason,
    ) -> (MutexGuard<'a, KernelState>, SwitchOutcome) {
        let running = RUNNING
            .with(|slot| slot.borrow_mut().take())
            .unwrap_or_else(|| panic!("context switch from a thread the kernel does not manage"));
        assert!(
            running.kernel == self.id,
            "context switch on a thread owned by a different kernel"
        );
        let my_token = context_token(running.context.as_ref());

        let outcome = sched::schedule(&mut guard, Some(running.context), reason);
        for context in outcome.reclaimed {
            guard.retired.insert(context_token(context.as_ref()));
        }
        let next_token = context_token(outcome.resume.as_ref());
        guard.active = next_token;
        guard.handoff = Some(Handoff {
            thread: outcome.next,
            context: outcome.resume,
        });
        self.switch.notify_all();

        if guard.retired.remove(&my_token) {
            return (guard, SwitchOutcome::Exited);
        }
        loop {
            if guard.active == my_token {
                break;
            }
            if guard.retired.remove(&my_token) {
                return (guard, SwitchOutcome::Exited);
            }
            guard = self
                .switch
                .wait(guard)
                .unwrap_or_else(|_| panic!("kernel state poisoned by an earlier fault"));
        }
        self.resume_running(&mut guard);
        (guard, SwitchOutcome::Resumed)
    }

    /// Takes the published handoff and installs it as this host thread's
    /// running context
    fn resume_running(&self, guard: &mut MutexGuard<'_, KernelState>) {
        let handoff = guard
            .handoff
            .take()
            .unwrap_or_else(|| panic!("scheduled without a context handoff"));
        assert!(
            context_token(handoff.context.as_ref()) == guard.active,
            "context handoff does not match the active token"
        );
        RUNNING.with(|slot| {
            let mut slot = slot.borrow_mut();
            assert!(
                slot.is_none(),
                "resuming on a host thread that already runs a kernel thread"
            );
            *slot = Some(RunningThread {
                kernel: self.id,
                thread: handoff.thread,
                context: handoff.context,
            });
        });
    }

    /// Context switch for a thread that expects to keep living
    ///
    /// If the thread was terminated while parked, its host stack is
    /// unwound via [`ThreadExit`] instead of returning.
    pub(crate) fn switch_and_resume<'a>(
        &self,
        guard: MutexGuard<'a, KernelState>,
        reason: SwitchReason,
    ) -> MutexGuard<'a, KernelState> {
        match self.switch_raw(guard, reason) {
            (guard, SwitchOutcome::Resumed) => guard,
            (guard, SwitchOutcome::Exited) => {
                drop(guard);
                std::panic::panic_any(ThreadExit);
            }
        }
    }

    /// First-schedule park for a freshly spawned host thread
    ///
    /// Returns `false` when the thread was killed and reclaimed before it
    /// ever ran.
    pub(crate) fn wait_first_schedule(&self, my_token: u64) -> bool {
        let mut guard = self.lock_state();
        loop {
            if guard.active == my_token {
                break;
            }
            if guard.retired.remove(&my_token) {
                return false;
            }
            guard = self
                .switch
                .wait(guard)
                .unwrap_or_else(|_| panic!("kernel state poisoned by an earlier fault"));
        }
        self.resume_running(&mut guard);
        true
    }

    /// Marks the running thread terminated and switches away for the last
    /// time; returns once the scheduler has moved on
    pub(crate) fn finish_current(&self) {
        let mut guard = self.lock_state();
        let current = self.current_checked(&guard);
        let control = guard.threads.control_mut(current);
        assert!(!control.zombie, "finishing an already terminated thread");
        control.zombie = true;
        guard.thread_count -= 1;
        match self.switch_raw(guard, SwitchReason::Voluntary) {
            (guard, SwitchOutcome::Exited) => drop(guard),
            (_, SwitchOutcome::Resumed) => panic!("terminated thread was rescheduled"),
        }
    }
}

/// Spawns the native thread backing a kernel thread
///
/// The thread parks until first scheduled, runs `entry`, and then removes
/// itself from the scheduler. A panic in `entry` terminates the kernel
/// thread cleanly before the panic is surfaced on the host thread.
pub(crate) fn spawn_host_thread(
    inner: &Arc<KernelInner>,
    token: u64,
    name: &str,
    entry: Box<dyn FnOnce() + Send>,
) -> JoinHandle<()> {
    let inner = Arc::clone(inner);
    std::thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            if !inner.wait_first_schedule(token) {
                return;
            }
            match catch_unwind(AssertUnwindSafe(entry)) {
                Ok(()) => inner.finish_current(),
                Err(payload) => {
                    if payload.downcast_ref::<ThreadExit>().is_some() {
                        // Already off the scheduler; just unwind away.
                        return;
                    }
                    inner.finish_current();
                    resume_unwind(payload);
                }
            }
        })
        .unwrap_or_else(|error| panic!("out of resources spawning a host thread: {error}"))
}
