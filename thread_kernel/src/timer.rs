//! Virtual clock and one-shot timers
//!
//! The kernel's timebase is a monotonic tick counter that advances only
//! when told to: explicitly by the running thread (a simulated timer
//! interrupt) or by the idle thread warping to the next deadline when
//! every other thread is blocked. Timers are one-shot; the kernel only
//! needs a callback that eventually re-enqueues a thread and requests a
//! switch, and that callback is expressed as a [`TimerAction`].

use core_types::{EventId, ThreadId};
use hal::TimerDevice;
use serde::{Deserialize, Serialize};

/// Deterministic tick clock
///
/// Only advances when explicitly instructed, so every test run observes
/// the same timeline.
#[derive(Debug, Clone)]
pub(crate) struct SimClock {
    ticks: u64,
}

impl SimClock {
    pub(crate) fn new() -> Self {
        Self { ticks: 0 }
    }

    pub(crate) fn ticks(&self) -> u64 {
        self.ticks
    }

    pub(crate) fn advance(&mut self, delta: u64) {
        self.ticks = self
            .ticks
            .checked_add(delta)
            .unwrap_or_else(|| panic!("tick counter overflow"));
    }
}

impl TimerDevice for SimClock {
    fn poll_ticks(&mut self) -> u64 {
        self.ticks
    }
}

/// What a timer does when it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerAction {
    /// Re-enqueue a sleeping thread into the ready list
    WakeThread(ThreadId),
    /// Trigger an event, as a hardware interrupt source would
    TriggerEvent(EventId),
}

/// Handle for cancelling a pending timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerHandle(u64);

#[derive(Debug)]
pub(crate) struct PendingTimer {
    pub(crate) handle: TimerHandle,
    pub(crate) deadline: u64,
    pub(crate) action: TimerAction,
}

/// Pending one-shot timers, ordered by deadline with registration order
/// breaking ties
#[derive(Debug, Default)]
pub(crate) struct TimerQueue {
    pending: Vec<PendingTimer>,
    next_handle: u64,
}

impl TimerQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn start(&mut self, now: u64, delay: u64, action: TimerAction) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;
        let deadline = now
            .checked_add(delay)
            .unwrap_or_else(|| panic!("timer deadline overflow"));
        let at = self
            .pending
            .partition_point(|timer| (timer.deadline, timer.handle.0) <= (deadline, handle.0));
        self.pending.insert(
            at,
            PendingTimer {
                handle,
                deadline,
                action,
            },
        );
        handle
    }

    /// Cancels a pending timer; returns whether it was still pending
    pub(crate) fn stop(&mut self, handle: TimerHandle) -> bool {
        match self.pending.iter().position(|timer| timer.handle == handle) {
            Some(at) => {
                self.pending.remove(at);
                true
            }
            None => false,
        }
    }

    pub(crate) fn next_deadline(&self) -> Option<u64> {
        self.pending.first().map(|timer| timer.deadline)
    }

    /// Removes and returns the earliest timer due at or before `now`
    pub(crate) fn pop_due(&mut self, now: u64) -> Option<PendingTimer> {
        if self.pending.first()?.deadline <= now {
            Some(self.pending.remove(0))
        } else {
            None
        }
    }
}
