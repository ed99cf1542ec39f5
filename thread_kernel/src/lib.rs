//! # Threading Kernel
//!
//! Priority-based cooperative/preemptive multitasking kernel for a
//! single-core target, with a deterministic host execution platform.
//!
//! ## Purpose
//!
//! The kernel schedules threads strictly by priority: a ready thread with
//! priority at or above the running thread runs without delay. Blocking
//! primitives (mailboxes, events, semaphores, sleep) suspend the calling
//! thread cooperatively; hardware interrupts are modelled as deferred
//! preemption requests honored at interrupt return, never mid-interrupt.
//!
//! ## Philosophy
//!
//! **Testability is a first-class design constraint.**
//!
//! All kernel state lives in one explicit value behind one lock, the
//! moral equivalent of the single interrupt-disable gate a one-core
//! machine really has. Time is a virtual tick counter that advances only
//! on request, so every run of a scenario observes the same interleaving.
//! Each [`Kernel`] is self-contained: tests create and tear down as many
//! as they need, in parallel.
//!
//! ## Structure
//!
//! - [`Kernel`]: the public handle for lifecycle, thread operations,
//!   mailboxes, events, semaphores, timers and introspection
//! - `sched`: the pure context-switch decision function
//! - `switch`: the host platform backing each kernel thread with a
//!   parked native thread, exactly one of which ever runs
//! - `thread` / `list`: the thread arena and the intrusive lists the
//!   scheduler and the primitives share

pub mod sched;
pub mod test_utils;
pub mod timer;

mod event;
mod list;
mod mailbox;
mod semaphore;
mod switch;
mod thread;

pub use sched::{ScheduleEvent, SwitchReason};
pub use timer::{TimerAction, TimerHandle};

use crate::event::Event;
use crate::list::ThreadList;
use crate::mailbox::Mailbox;
use crate::semaphore::Semaphore;
use crate::switch::{Handoff, HostContext};
use crate::thread::{StackRegion, ThreadControl, ThreadTable};
use crate::timer::{SimClock, TimerQueue};
use core_types::{EventId, ListOwner, MailboxId, Priority, SemaphoreId, ThreadId};
use kernel_api::{KernelApi, KernelError, Message, SendStatus, ThreadDescriptor};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;

/// Kernel configuration
#[derive(Debug, Clone)]
pub struct KernelConfig {
    /// Nominal stack size of the adopted main thread, in bytes
    pub main_stack_size: usize,
    /// Stack size of the idle thread, in bytes
    pub idle_stack_size: usize,
    /// Size of the canary guard region below each stack; a multiple of 8
    pub stack_guard_bytes: usize,
    /// Attachment slots per event
    pub event_slots: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            main_stack_size: 64 * 1024,
            idle_stack_size: 4096,
            stack_guard_bytes: 64,
            event_slots: 8,
        }
    }
}

/// All kernel state, guarded by the one kernel lock
pub(crate) struct KernelState {
    pub(crate) threads: ThreadTable,
    pub(crate) ready: ThreadList,
    pub(crate) current: Option<ThreadId>,
    pub(crate) main: Option<ThreadId>,
    pub(crate) idle: Option<ThreadId>,
    pub(crate) mailboxes: HashMap<MailboxId, Mailbox>,
    pub(crate) events: HashMap<EventId, Event>,
    pub(crate) semaphores: HashMap<SemaphoreId, Semaphore>,
    pub(crate) timers: TimerQueue,
    pub(crate) clock: SimClock,
    /// Interrupt nesting depth; per-thread, saved and restored across
    /// switches
    pub(crate) interrupt_depth: u32,
    /// Deferred preemption request, consulted at interrupt return
    pub(crate) force_schedule: bool,
    /// Threads spawned and not yet killed (main and idle included)
    pub(crate) thread_count: usize,
    /// Baton token of the one host thread allowed to run
    pub(crate) active: u64,
    /// Tokens of reclaimed threads whose host threads must wind down
    pub(crate) retired: HashSet<u64>,
    /// Context in flight from the switching host thread to the resuming
    /// one
    pub(crate) handoff: Option<Handoff>,
    pub(crate) next_token: u64,
    pub(crate) idle_join: Option<JoinHandle<()>>,
    pub(crate) audit: Vec<ScheduleEvent>,
    pub(crate) config: KernelConfig,
}

impl KernelState {
    pub(crate) fn new(config: KernelConfig) -> Self {
        Self {
            threads: ThreadTable::new(),
            ready: ThreadList::new(ListOwner::Ready),
            current: None,
            main: None,
            idle: None,
            mailboxes: HashMap::new(),
            events: HashMap::new(),
            semaphores: HashMap::new(),
            timers: TimerQueue::new(),
            clock: SimClock::new(),
            interrupt_depth: 0,
            force_schedule: false,
            thread_count: 0,
            active: 0,
            retired: HashSet::new(),
            handoff: None,
            next_token: 0,
            idle_join: None,
            audit: Vec::new(),
            config,
        }
    }

    pub(crate) fn current_priority(&self) -> Priority {
        let current = self
            .current
            .unwrap_or_else(|| panic!("no running thread"));
        self.threads.control(current).priority
    }

    pub(crate) fn alloc_token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }

    /// Creates a thread's control block, stack and saved context as one
    /// unit and enqueues it by priority
    pub(crate) fn admit_thread(
        &mut self,
        name: &str,
        stack_size: usize,
        priority: Priority,
    ) -> (ThreadId, u64) {
        let token = self.alloc_token();
        let mut control = ThreadControl::new(
            name,
            priority,
            StackRegion::new(stack_size, self.config.stack_guard_bytes),
        );
        control.saved = Some(Box::new(HostContext { token }));
        let thread = self.threads.insert(control);
        self.thread_count += 1;
        {
            let Self { ready, threads, .. } = self;
            ready.insert_by_priority(threads, thread);
        }
        let at_tick = self.clock.ticks();
        self.audit.push(ScheduleEvent::Spawned {
            thread,
            priority,
            at_tick,
        });
        (thread, token)
    }

    /// Timer action: re-enqueue a sleeping thread and request a switch if
    /// its priority is at or above the interrupted thread's
    pub(crate) fn wake_thread(&mut self, thread: ThreadId) {
        {
            let Some(control) = self.threads.get_mut(thread) else {
                panic!("timer woke a stale thread handle: {thread}");
            };
            assert!(
                control.owner == Some(ListOwner::Timer),
                "timer woke thread {} which is not sleeping",
                control.name
            );
            control.owner = None;
        }
        let priority = self.threads.control(thread).priority;
        {
            let Self { ready, threads, .. } = self;
            ready.insert_by_priority(threads, thread);
        }
        let at_tick = self.clock.ticks();
        self.audit.push(ScheduleEvent::Woken { thread, at_tick });
        if priority >= self.current_priority() {
            self.force_schedule = true;
        }
    }

    /// Fires every timer due at the current tick, in deadline order
    pub(crate) fn run_due_timers(&mut self) {
        let now = self.clock.ticks();
        while let Some(timer) = self.timers.pop_due(now) {
            self.audit.push(ScheduleEvent::TimerFired { at_tick: now });
            match timer.action {
                TimerAction::WakeThread(thread) => self.wake_thread(thread),
                TimerAction::TriggerEvent(event) => {
                    // An interrupt source whose event was torn down fires
                    // into the void.
                    if let Ok(woke) = self.event_trigger(event) {
                        if woke {
                            self.force_schedule = true;
                        }
                    }
                }
            }
        }
    }
}

pub(crate) struct KernelInner {
    pub(crate) id: u64,
    pub(crate) state: Mutex<KernelState>,
    pub(crate) switch: Condvar,
}

impl KernelInner {
    /// Yields to the ready head if its priority is at or above the
    /// running thread's; a useless switch is skipped
    fn yield_if_eligible<'a>(
        &self,
        mut guard: MutexGuard<'a, KernelState>,
    ) -> MutexGuard<'a, KernelState> {
        let current = guard
            .current
            .unwrap_or_else(|| panic!("no running thread"));
        let eligible = guard.ready.head().is_some_and(|head| {
            guard.threads.control(head).priority >= guard.threads.control(current).priority
        });
        if eligible {
            {
                let state = &mut *guard;
                state.ready.insert_by_priority(&mut state.threads, current);
            }
            guard = self.switch_and_resume(guard, SwitchReason::Voluntary);
        }
        guard
    }

    /// The interrupt-return path: perform the deferred preemption once
    /// the nesting depth is back to zero
    fn preempt_on_interrupt_return<'a>(
        &self,
        mut guard: MutexGuard<'a, KernelState>,
    ) -> MutexGuard<'a, KernelState> {
        if guard.interrupt_depth == 0 && guard.force_schedule {
            guard.force_schedule = false;
            guard = self.switch_and_resume(guard, SwitchReason::Preempted);
        }
        guard
    }
}

static NEXT_KERNEL_ID: AtomicU64 = AtomicU64::new(1);

/// Handle to a running kernel
///
/// Cloning shares the same kernel. The thread that creates the kernel is
/// adopted as its `main` thread and is the only one allowed to close it.
#[derive(Clone)]
pub struct Kernel {
    inner: Arc<KernelInner>,
}

impl Kernel {
    /// Creates a kernel with the default configuration, adopting the
    /// calling thread as `main` and starting the idle thread
    pub fn new() -> Self {
        Self::with_config(KernelConfig::default())
    }

    /// Creates a kernel with an explicit configuration
    pub fn with_config(config: KernelConfig) -> Self {
        assert!(
            config.stack_guard_bytes > 0 && config.stack_guard_bytes % 8 == 0,
            "stack guard size must be a positive multiple of 8 bytes"
        );
        assert!(config.event_slots > 0, "events need at least one attachment slot");

        let mut state = KernelState::new(config);
        let token = state.alloc_token();
        let control = ThreadControl::new(
            "main",
            Priority::MAIN,
            StackRegion::new(
                state.config.main_stack_size,
                state.config.stack_guard_bytes,
            ),
        );
        let main = state.threads.insert(control);
        state.thread_count = 1;
        state.main = Some(main);
        state.current = Some(main);
        state.active = token;

        let inner = Arc::new(KernelInner {
            id: NEXT_KERNEL_ID.fetch_add(1, Ordering::Relaxed),
            state: Mutex::new(state),
            switch: Condvar::new(),
        });
        inner.adopt_running(main, Box::new(HostContext { token }));

        let kernel = Self { inner };
        kernel.start_idle_thread();
        kernel
    }

    /// Spawns the always-present idle thread at the strictly lowest
    /// priority
    fn start_idle_thread(&self) {
        let mut guard = self.inner.lock_state();
        let stack_size = guard.config.idle_stack_size;
        let (idle, token) = guard.admit_thread("idle", stack_size, Priority::IDLE);
        guard.idle = Some(idle);
        let inner = Arc::clone(&self.inner);
        let handle = switch::spawn_host_thread(
            &self.inner,
            token,
            "idle",
            Box::new(move || idle_loop(&inner)),
        );
        guard.idle_join = Some(handle);
    }

    /// Tears the kernel down
    ///
    /// Only the main thread may close the kernel, and every user thread
    /// must already be gone; anything else is a fatal teardown mismatch.
    pub fn close(self) {
        let mut guard = self.inner.lock_state();
        let current = self.inner.current_checked(&guard);
        assert!(
            guard.main == Some(current),
            "kernel close is only allowed from the main thread"
        );
        assert!(guard.thread_count == 2, "not all threads were killed");

        // Retire the idle thread; it is the only entry left in the ready
        // list.
        let idle = guard
            .idle
            .take()
            .unwrap_or_else(|| panic!("idle thread is missing"));
        {
            let state = &mut *guard;
            let popped = state.ready.pop_head(&mut state.threads);
            assert!(
                popped == Some(idle),
                "ready list should hold only the idle thread at close"
            );
        }
        let mut control = guard.threads.remove(idle);
        if let Some(context) = control.saved.take() {
            guard.retired.insert(switch::context_token(context.as_ref()));
        }
        guard.thread_count -= 1;

        // Threads killed while blocked may still occupy arena slots
        // awaiting their deferred reclamation; release them now.
        for thread in guard.threads.live_ids() {
            if Some(thread) == guard.main {
                continue;
            }
            assert!(
                guard.threads.control(thread).zombie,
                "thread survived to kernel close"
            );
            let mut control = guard.threads.remove(thread);
            if let Some(context) = control.saved.take() {
                guard.retired.insert(switch::context_token(context.as_ref()));
            }
        }

        debug_assert!(guard.threads.live() == 1);
        let main = current;
        guard.threads.remove(main);
        guard.current = None;
        guard.main = None;
        let idle_join = guard.idle_join.take();
        drop(guard);

        self.inner.switch.notify_all();
        if let Some(handle) = idle_join {
            let _ = handle.join();
        }
        self.inner.clear_running();
    }

    // --- thread lifecycle ---

    /// Spawns a thread and schedules it by priority
    ///
    /// If the new thread's priority is at or above the caller's, the
    /// caller yields immediately so the newcomer starts at once.
    pub fn spawn<F>(&self, descriptor: ThreadDescriptor, entry: F) -> ThreadId
    where
        F: FnOnce() + Send + 'static,
    {
        self.spawn_with(descriptor, Box::new(entry))
    }

    fn spawn_with(
        &self,
        descriptor: ThreadDescriptor,
        entry: Box<dyn FnOnce() + Send + 'static>,
    ) -> ThreadId {
        assert!(
            descriptor.priority.is_user(),
            "thread priority cannot be negative"
        );
        assert!(
            descriptor.stack_size % 8 == 0,
            "stack size must be a multiple of 8 bytes"
        );
        let mut guard = self.inner.lock_state();
        self.inner.current_checked(&guard);
        let (thread, token) =
            guard.admit_thread(&descriptor.name, descriptor.stack_size, descriptor.priority);
        // User threads are detached; reclamation goes through the
        // scheduler, not through joining.
        let _ = switch::spawn_host_thread(&self.inner, token, &descriptor.name, entry);
        if guard.threads.control(thread).priority >= guard.current_priority() {
            guard = self.inner.yield_if_eligible(guard);
        }
        drop(guard);
        thread
    }

    /// Switches to the ready head if its priority is at or above the
    /// caller's
    pub fn yield_now(&self) {
        let mut guard = self.inner.lock_state();
        self.inner.current_checked(&guard);
        guard = self.inner.yield_if_eligible(guard);
        drop(guard);
    }

    /// Changes a thread's priority (the caller's when `target` is `None`)
    ///
    /// A drop may make other threads eligible to run immediately, so this
    /// ends with a yield check.
    pub fn set_priority(
        &self,
        target: Option<ThreadId>,
        priority: Priority,
    ) -> Result<(), KernelError> {
        assert!(priority.is_user(), "thread priority cannot be negative");
        let mut guard = self.inner.lock_state();
        let current = self.inner.current_checked(&guard);
        let target = target.unwrap_or(current);
        assert!(
            guard.idle != Some(target),
            "the idle thread's priority is fixed"
        );
        match guard.threads.get_mut(target) {
            Some(control) => control.priority = priority,
            None => return Err(KernelError::UnknownThread(target)),
        }
        guard = self.inner.yield_if_eligible(guard);
        drop(guard);
        Ok(())
    }

    /// Blocks the calling thread for `ticks`
    pub fn sleep(&self, ticks: u64) {
        let mut guard = self.inner.lock_state();
        let current = self.inner.current_checked(&guard);
        let now = guard.clock.ticks();
        guard
            .timers
            .start(now, ticks, TimerAction::WakeThread(current));
        // Not physically linked anywhere, but the pending timer
        // guarantees the wake-up, which is what list membership means to
        // the scheduler.
        let control = guard.threads.control_mut(current);
        assert!(
            control.owner.is_none(),
            "sleeping thread is already linked into a list"
        );
        control.owner = Some(ListOwner::Timer);
        let guard = self.inner.switch_and_resume(guard, SwitchReason::Voluntary);
        drop(guard);
    }

    /// Marks a thread for termination
    ///
    /// Resources are released by the scheduler later: either when the
    /// zombie is the switched-from thread or when it surfaces at the head
    /// of the ready list. Killing the calling thread does not return.
    pub fn kill(&self, thread: ThreadId) -> Result<(), KernelError> {
        let mut guard = self.inner.lock_state();
        let current = self.inner.current_checked(&guard);
        assert!(guard.main != Some(thread), "the main thread cannot be killed");
        assert!(guard.idle != Some(thread), "the idle thread cannot be killed");
        let Some(control) = guard.threads.get_mut(thread) else {
            return Err(KernelError::UnknownThread(thread));
        };
        if control.zombie {
            // Already marked; reclamation is pending.
            return Ok(());
        }
        control.zombie = true;
        guard.thread_count -= 1;
        if thread == current {
            let guard = self.inner.switch_and_resume(guard, SwitchReason::Voluntary);
            drop(guard);
            unreachable!("terminated thread was rescheduled");
        }
        drop(guard);
        Ok(())
    }

    /// Terminates the calling thread
    pub fn exit(&self) -> ! {
        {
            let guard = self.inner.lock_state();
            let current = self.inner.current_checked(&guard);
            assert!(guard.main != Some(current), "the main thread cannot exit");
        }
        self.inner.finish_current();
        std::panic::panic_any(switch::ThreadExit);
    }

    // --- introspection ---

    /// The calling thread's id
    pub fn current_thread(&self) -> ThreadId {
        let guard = self.inner.lock_state();
        self.inner.current_checked(&guard)
    }

    /// A thread's diagnostic name
    pub fn thread_name(&self, thread: ThreadId) -> Result<String, KernelError> {
        let guard = self.inner.lock_state();
        guard
            .threads
            .get(thread)
            .map(|control| control.name.clone())
            .ok_or(KernelError::UnknownThread(thread))
    }

    /// A thread's current priority
    pub fn thread_priority(&self, thread: ThreadId) -> Result<Priority, KernelError> {
        let guard = self.inner.lock_state();
        guard
            .threads
            .get(thread)
            .map(|control| control.priority)
            .ok_or(KernelError::UnknownThread(thread))
    }

    /// Number of live (spawned and not yet killed) threads, main and idle
    /// included
    pub fn live_threads(&self) -> usize {
        self.inner.lock_state().thread_count
    }

    /// Current tick count
    pub fn now_ticks(&self) -> u64 {
        self.inner.lock_state().clock.ticks()
    }

    /// Copy of the schedule audit log
    pub fn schedule_log(&self) -> Vec<ScheduleEvent> {
        self.inner.lock_state().audit.clone()
    }

    /// Clears the schedule audit log
    pub fn clear_schedule_log(&self) {
        self.inner.lock_state().audit.clear();
    }

    // --- time and timers ---

    /// Advances the tick clock, firing due timers as a timer interrupt
    /// would
    ///
    /// Runs in interrupt context: wake-ups only set the deferred
    /// preemption flag, and the switch happens at interrupt return,
    /// possibly suspending the caller in favor of a woken thread.
    pub fn advance_ticks(&self, delta: u64) {
        let mut guard = self.inner.lock_state();
        self.inner.current_checked(&guard);
        guard.interrupt_depth += 1;
        guard.clock.advance(delta);
        guard.run_due_timers();
        guard.interrupt_depth -= 1;
        guard = self.inner.preempt_on_interrupt_return(guard);
        drop(guard);
    }

    /// Registers a one-shot timer
    pub fn start_timer(&self, delay_ticks: u64, action: TimerAction) -> TimerHandle {
        let mut guard = self.inner.lock_state();
        self.inner.current_checked(&guard);
        let now = guard.clock.ticks();
        guard.timers.start(now, delay_ticks, action)
    }

    /// Cancels a pending timer; returns whether it was still pending
    pub fn stop_timer(&self, handle: TimerHandle) -> bool {
        let mut guard = self.inner.lock_state();
        self.inner.current_checked(&guard);
        guard.timers.stop(handle)
    }

    // --- mailboxes ---

    /// Creates a mailbox holding up to `capacity` messages
    pub fn create_mailbox(&self, capacity: usize) -> MailboxId {
        let mut guard = self.inner.lock_state();
        self.inner.current_checked(&guard);
        let id = MailboxId::new();
        guard.mailboxes.insert(id, Mailbox::new(id, capacity));
        id
    }

    /// Destroys a mailbox
    ///
    /// Destroying a mailbox that an event still posts to, or that threads
    /// still wait on, is a fatal lifetime violation.
    pub fn destroy_mailbox(&self, mailbox: MailboxId) -> Result<(), KernelError> {
        let mut guard = self.inner.lock_state();
        self.inner.current_checked(&guard);
        let entry = guard.mailbox(mailbox)?;
        assert!(
            entry.attached_events == 0,
            "mailbox destroyed while attached to {} event(s)",
            entry.attached_events
        );
        assert!(
            entry.wait_list.is_empty(),
            "mailbox destroyed while threads wait on it"
        );
        guard.mailboxes.remove(&mailbox);
        Ok(())
    }

    /// Stores a message if the mailbox has room
    ///
    /// Wakes every blocked waiter; if one of them has priority at or
    /// above the caller, the caller yields before returning
    /// [`SendStatus::SentPreempting`].
    pub fn try_send(&self, mailbox: MailboxId, message: Message) -> Result<SendStatus, KernelError> {
        let mut guard = self.inner.lock_state();
        self.inner.current_checked(&guard);
        if guard.mailbox(mailbox)?.is_full() {
            return Ok(SendStatus::Full);
        }
        let woke = guard.mailbox_deposit(mailbox, message)?;
        if woke {
            guard = self.inner.yield_if_eligible(guard);
            drop(guard);
            Ok(SendStatus::SentPreempting)
        } else {
            Ok(SendStatus::Sent)
        }
    }

    /// Stores a message, blocking while the mailbox is full
    pub fn send(&self, mailbox: MailboxId, message: Message) -> Result<(), KernelError> {
        let mut guard = self.inner.lock_state();
        let current = self.inner.current_checked(&guard);
        let mut pending = Some(message);
        loop {
            if guard.mailbox(mailbox)?.is_full() {
                {
                    let state = &mut *guard;
                    let entry = state
                        .mailboxes
                        .get_mut(&mailbox)
                        .ok_or(KernelError::UnknownMailbox(mailbox))?;
                    entry.wait_list.insert_fifo(&mut state.threads, current);
                }
                guard = self.inner.switch_and_resume(guard, SwitchReason::Voluntary);
                continue;
            }
            let message = match pending.take() {
                Some(message) => message,
                None => unreachable!("message already consumed"),
            };
            let woke = guard.mailbox_deposit(mailbox, message)?;
            if woke {
                guard = self.inner.yield_if_eligible(guard);
            }
            break;
        }
        drop(guard);
        Ok(())
    }

    /// Takes the oldest message if one is present
    ///
    /// Freeing a slot wakes blocked senders, with the same yield rule as
    /// [`Kernel::try_send`].
    pub fn try_recv(&self, mailbox: MailboxId) -> Result<Option<Message>, KernelError> {
        let mut guard = self.inner.lock_state();
        self.inner.current_checked(&guard);
        let (message, woke) = guard.mailbox_collect(mailbox)?;
        if woke {
            guard = self.inner.yield_if_eligible(guard);
        }
        drop(guard);
        Ok(message)
    }

    /// Takes the oldest message, blocking while the mailbox is empty
    pub fn recv(&self, mailbox: MailboxId) -> Result<Message, KernelError> {
        let mut guard = self.inner.lock_state();
        let current = self.inner.current_checked(&guard);
        loop {
            let (message, woke) = guard.mailbox_collect(mailbox)?;
            if let Some(message) = message {
                if woke {
                    guard = self.inner.yield_if_eligible(guard);
                }
                drop(guard);
                return Ok(message);
            }
            {
                let state = &mut *guard;
                let entry = state
                    .mailboxes
                    .get_mut(&mailbox)
                    .ok_or(KernelError::UnknownMailbox(mailbox))?;
                entry.wait_list.insert_fifo(&mut state.threads, current);
            }
            guard = self.inner.switch_and_resume(guard, SwitchReason::Voluntary);
        }
    }

    // --- events ---

    /// Creates an event
    pub fn create_event(&self) -> EventId {
        let mut guard = self.inner.lock_state();
        self.inner.current_checked(&guard);
        let id = EventId::new();
        let slots = guard.config.event_slots;
        guard.events.insert(id, Event::new(slots));
        id
    }

    /// Destroys an event; no mailbox may still be attached
    pub fn destroy_event(&self, event: EventId) -> Result<(), KernelError> {
        let mut guard = self.inner.lock_state();
        self.inner.current_checked(&guard);
        let entry = guard
            .events
            .get(&event)
            .ok_or(KernelError::UnknownEvent(event))?;
        assert!(
            entry.attachment_count() == 0,
            "event destroyed while {} mailbox(es) are attached",
            entry.attachment_count()
        );
        guard.events.remove(&event);
        Ok(())
    }

    /// Attaches a mailbox to an event's next free slot
    pub fn attach(&self, mailbox: MailboxId, event: EventId) -> Result<(), KernelError> {
        let mut guard = self.inner.lock_state();
        self.inner.current_checked(&guard);
        guard.event_attach(mailbox, event)
    }

    /// Detaches a mailbox from an event
    pub fn detach(&self, mailbox: MailboxId, event: EventId) -> Result<(), KernelError> {
        let mut guard = self.inner.lock_state();
        self.inner.current_checked(&guard);
        guard.event_detach(mailbox, event)
    }

    /// Posts the event to every attached mailbox
    ///
    /// If a delivery wakes a thread with priority at or above the caller,
    /// the caller yields to it before returning.
    pub fn trigger(&self, event: EventId) -> Result<(), KernelError> {
        let mut guard = self.inner.lock_state();
        self.inner.current_checked(&guard);
        let woke = guard.event_trigger(event)?;
        if woke {
            guard = self.inner.yield_if_eligible(guard);
        }
        drop(guard);
        Ok(())
    }

    /// Posts the event from interrupt context
    ///
    /// Rescheduling is deferred: wake-ups only raise the force-schedule
    /// flag, and the switch happens at interrupt return.
    pub fn trigger_isr(&self, event: EventId) -> Result<(), KernelError> {
        let mut guard = self.inner.lock_state();
        self.inner.current_checked(&guard);
        guard.interrupt_depth += 1;
        let result = guard.event_trigger(event);
        if let Ok(true) = result {
            guard.force_schedule = true;
        }
        guard.interrupt_depth -= 1;
        guard = self.inner.preempt_on_interrupt_return(guard);
        drop(guard);
        result.map(|_| ())
    }

    /// Blocks until the event fires
    ///
    /// Built from a transient single-slot mailbox attached for the
    /// duration of the wait.
    pub fn wait_event(&self, event: EventId) -> Result<(), KernelError> {
        let scratch = self.create_mailbox(1);
        if let Err(error) = self.attach(scratch, event) {
            self.destroy_mailbox(scratch)?;
            return Err(error);
        }
        let message = self.recv(scratch)?;
        debug_assert_eq!(message.as_event(), Some(event));
        self.detach(scratch, event)?;
        self.destroy_mailbox(scratch)?;
        Ok(())
    }

    // --- semaphores ---

    /// Creates a counting semaphore
    pub fn create_semaphore(&self, initial: u32) -> SemaphoreId {
        let mut guard = self.inner.lock_state();
        self.inner.current_checked(&guard);
        let id = SemaphoreId::new();
        guard.semaphores.insert(id, Semaphore::new(id, initial));
        id
    }

    /// Destroys a semaphore; no thread may be waiting on it
    pub fn destroy_semaphore(&self, semaphore: SemaphoreId) -> Result<(), KernelError> {
        let mut guard = self.inner.lock_state();
        self.inner.current_checked(&guard);
        let entry = guard.semaphore(semaphore)?;
        assert!(
            entry.wait_list.is_empty(),
            "semaphore destroyed while threads wait on it"
        );
        guard.semaphores.remove(&semaphore);
        Ok(())
    }

    /// Takes a unit without blocking; returns whether one was available
    pub fn sem_try_wait(&self, semaphore: SemaphoreId) -> Result<bool, KernelError> {
        let mut guard = self.inner.lock_state();
        self.inner.current_checked(&guard);
        guard.semaphore_take(semaphore)
    }

    /// Takes a unit, blocking until one is available
    pub fn sem_wait(&self, semaphore: SemaphoreId) -> Result<(), KernelError> {
        let mut guard = self.inner.lock_state();
        let current = self.inner.current_checked(&guard);
        loop {
            if guard.semaphore_take(semaphore)? {
                break;
            }
            {
                let state = &mut *guard;
                let entry = state
                    .semaphores
                    .get_mut(&semaphore)
                    .ok_or(KernelError::UnknownSemaphore(semaphore))?;
                entry.wait_list.insert_fifo(&mut state.threads, current);
            }
            guard = self.inner.switch_and_resume(guard, SwitchReason::Voluntary);
        }
        drop(guard);
        Ok(())
    }

    /// Releases a unit, waking blocked waiters
    pub fn sem_post(&self, semaphore: SemaphoreId) -> Result<(), KernelError> {
        let mut guard = self.inner.lock_state();
        self.inner.current_checked(&guard);
        let woke = guard.semaphore_release(semaphore)?;
        if woke {
            guard = self.inner.yield_if_eligible(guard);
        }
        drop(guard);
        Ok(())
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}

/// Body of the idle thread
///
/// Runs only when every other thread is blocked. On real hardware it
/// would spin waiting for an interrupt; here it warps the virtual clock
/// to the next timer deadline, fires the timers, and lets the deferred
/// preemption hand control to whoever woke up. Running out of timers with
/// everything blocked means no interrupt can ever arrive.
fn idle_loop(inner: &KernelInner) {
    loop {
        let mut guard = inner.lock_state();
        match guard.timers.next_deadline() {
            Some(deadline) => {
                let now = guard.clock.ticks();
                if deadline > now {
                    guard.clock.advance(deadline - now);
                }
                guard.interrupt_depth += 1;
                guard.run_due_timers();
                guard.interrupt_depth -= 1;
                guard = inner.preempt_on_interrupt_return(guard);
                drop(guard);
            }
            None => panic!("deadlock: every thread is blocked and no timer is pending"),
        }
    }
}

impl KernelApi for Kernel {
    fn spawn_thread(
        &self,
        descriptor: ThreadDescriptor,
        entry: Box<dyn FnOnce() + Send + 'static>,
    ) -> ThreadId {
        self.spawn_with(descriptor, entry)
    }

    fn yield_now(&self) {
        Kernel::yield_now(self)
    }

    fn set_priority(
        &self,
        target: Option<ThreadId>,
        priority: Priority,
    ) -> Result<(), KernelError> {
        Kernel::set_priority(self, target, priority)
    }

    fn sleep(&self, ticks: u64) {
        Kernel::sleep(self, ticks)
    }

    fn kill(&self, thread: ThreadId) -> Result<(), KernelError> {
        Kernel::kill(self, thread)
    }

    fn current_thread(&self) -> ThreadId {
        Kernel::current_thread(self)
    }

    fn now_ticks(&self) -> u64 {
        Kernel::now_ticks(self)
    }

    fn create_mailbox(&self, capacity: usize) -> MailboxId {
        Kernel::create_mailbox(self, capacity)
    }

    fn destroy_mailbox(&self, mailbox: MailboxId) -> Result<(), KernelError> {
        Kernel::destroy_mailbox(self, mailbox)
    }

    fn try_send(&self, mailbox: MailboxId, message: Message) -> Result<SendStatus, KernelError> {
        Kernel::try_send(self, mailbox, message)
    }

    fn send(&self, mailbox: MailboxId, message: Message) -> Result<(), KernelError> {
        Kernel::send(self, mailbox, message)
    }

    fn try_recv(&self, mailbox: MailboxId) -> Result<Option<Message>, KernelError> {
        Kernel::try_recv(self, mailbox)
    }

    fn recv(&self, mailbox: MailboxId) -> Result<Message, KernelError> {
        Kernel::recv(self, mailbox)
    }

    fn create_event(&self) -> EventId {
        Kernel::create_event(self)
    }

    fn destroy_event(&self, event: EventId) -> Result<(), KernelError> {
        Kernel::destroy_event(self, event)
    }

    fn attach(&self, mailbox: MailboxId, event: EventId) -> Result<(), KernelError> {
        Kernel::attach(self, mailbox, event)
    }

    fn detach(&self, mailbox: MailboxId, event: EventId) -> Result<(), KernelError> {
        Kernel::detach(self, mailbox, event)
    }

    fn trigger(&self, event: EventId) -> Result<(), KernelError> {
        Kernel::trigger(self, event)
    }

    fn trigger_isr(&self, event: EventId) -> Result<(), KernelError> {
        Kernel::trigger_isr(self, event)
    }

    fn wait_event(&self, event: EventId) -> Result<(), KernelError> {
        Kernel::wait_event(self, event)
    }

    fn create_semaphore(&self, initial: u32) -> SemaphoreId {
        Kernel::create_semaphore(self, initial)
    }

    fn destroy_semaphore(&self, semaphore: SemaphoreId) -> Result<(), KernelError> {
        Kernel::destroy_semaphore(self, semaphore)
    }

    fn sem_try_wait(&self, semaphore: SemaphoreId) -> Result<bool, KernelError> {
        Kernel::sem_try_wait(self, semaphore)
    }

    fn sem_wait(&self, semaphore: SemaphoreId) -> Result<(), KernelError> {
        Kernel::sem_wait(self, semaphore)
    }

    fn sem_post(&self, semaphore: SemaphoreId) -> Result<(), KernelError> {
        Kernel::sem_post(self, semaphore)
    }
}
