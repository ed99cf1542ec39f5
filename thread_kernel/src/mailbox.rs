//! Bounded blocking mailboxes
//!
//! A mailbox is a fixed-capacity circular array of messages with read and
//! write cursors and one wait list shared by blocked senders and blocked
//! receivers (never both at once, by discipline: senders only wait while
//! the mailbox is full, receivers only while it is empty). Waking goes
//! through the ready list's priority splice so the caller learns whether a
//! woken thread warrants an immediate reschedule.

use crate::list::ThreadList;
use crate::KernelState;
use core_types::{ListOwner, MailboxId};
use kernel_api::{KernelError, Message};

#[derive(Debug)]
pub(crate) struct Mailbox {
    slots: Box<[Option<Message>]>,
    read: usize,
    write: usize,
    pub(crate) wait_list: ThreadList,
    pub(crate) attached_events: u32,
}

impl Mailbox {
    pub(crate) fn new(id: MailboxId, capacity: usize) -> Self {
        assert!(capacity > 0, "mailbox capacity must be at least 1");
        Self {
            slots: vec![None; capacity].into_boxed_slice(),
            read: 0,
            write: 0,
            wait_list: ThreadList::new(ListOwner::MailboxWait(id)),
            attached_events: 0,
        }
    }

    /// Whether the slot at the write cursor is occupied
    pub(crate) fn is_full(&self) -> bool {
        self.slots[self.write].is_some()
    }

    /// Whether the slot at the read cursor is vacant
    pub(crate) fn is_empty(&self) -> bool {
        self.slots[self.read].is_none()
    }
}

impl KernelState {
    pub(crate) fn mailbox(&self, id: MailboxId) -> Result<&Mailbox, KernelError> {
        self.mailboxes
            .get(&id)
            .ok_or(KernelError::UnknownMailbox(id))
    }

    /// Stores a message and wakes every blocked waiter into the ready list
    ///
    /// The mailbox must have room; callers check `is_full` under the same
    /// lock. Returns whether a woken thread has priority at or above the
    /// running thread.
    pub(crate) fn mailbox_deposit(
        &mut self,
        id: MailboxId,
        message: Message,
    ) -> Result<bool, KernelError> {
        let current_priority = self.current_priority();
        let Self {
            mailboxes,
            threads,
            ready,
            ..
        } = self;
        let mailbox = mailboxes
            .get_mut(&id)
            .ok_or(KernelError::UnknownMailbox(id))?;
        assert!(!mailbox.is_full(), "deposit into a full mailbox");
        let write = mailbox.write;
        mailbox.slots[write] = Some(message);
        mailbox.write = (write + 1) % mailbox.slots.len();
        Ok(ready.splice_by_priority(threads, &mut mailbox.wait_list, current_priority))
    }

    /// Takes the oldest message, if any, and wakes blocked senders
    ///
    /// Returns the message together with whether a woken sender has
    /// priority at or above the running thread.
    pub(crate) fn mailbox_collect(
        &mut self,
        id: MailboxId,
    ) -> Result<(Option<Message>, bool), KernelError> {
        let current_priority = self.current_priority();
        let Self {
            mailboxes,
            threads,
            ready,
            ..
        } = self;
        let mailbox = mailboxes
            .get_mut(&id)
            .ok_or(KernelError::UnknownMailbox(id))?;
        if mailbox.is_empty() {
            return Ok((None, false));
        }
        let read = mailbox.read;
        let message = mailbox.slots[read]
            .take()
            .unwrap_or_else(|| panic!("read cursor points at an empty slot"));
        mailbox.read = (read + 1) % mailbox.slots.len();
        let woke = ready.splice_by_priority(threads, &mut mailbox.wait_list, current_priority);
        Ok((Some(message), woke))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread::{StackRegion, ThreadControl};
    use crate::{KernelConfig, KernelState};
    use core_types::{Priority, ThreadId};

    fn state_with_current(priority: i8) -> KernelState {
        let mut state = KernelState::new(KernelConfig::default());
        let control = ThreadControl::new(
            "current",
            Priority::new(priority),
            StackRegion::new(256, 64),
        );
        let id = state.threads.insert(control);
        state.current = Some(id);
        state
    }

    fn add_waiter(state: &mut KernelState, mailbox: MailboxId, priority: i8) -> ThreadId {
        let control =
            ThreadControl::new("waiter", Priority::new(priority), StackRegion::new(256, 64));
        let thread = state.threads.insert(control);
        let entry = state.mailboxes.get_mut(&mailbox).unwrap();
        entry.wait_list.insert_fifo(&mut state.threads, thread);
        thread
    }

    fn message(tag: u32) -> Message {
        Message::payload(&tag).unwrap()
    }

    #[test]
    fn test_messages_come_out_in_order() {
        let mut state = state_with_current(5);
        let id = MailboxId::new();
        state.mailboxes.insert(id, Mailbox::new(id, 4));

        for tag in 0..3u32 {
            state.mailbox_deposit(id, message(tag)).unwrap();
        }
        for tag in 0..3u32 {
            let (received, _) = state.mailbox_collect(id).unwrap();
            assert_eq!(received, Some(message(tag)));
        }
        let (received, _) = state.mailbox_collect(id).unwrap();
        assert_eq!(received, None);
    }

    #[test]
    fn test_cursors_wrap_around() {
        let mut state = state_with_current(5);
        let id = MailboxId::new();
        state.mailboxes.insert(id, Mailbox::new(id, 2));

        state.mailbox_deposit(id, message(0)).unwrap();
        state.mailbox_deposit(id, message(1)).unwrap();
        assert!(state.mailbox(id).unwrap().is_full());
        assert_eq!(state.mailbox_collect(id).unwrap().0, Some(message(0)));
        state.mailbox_deposit(id, message(2)).unwrap();
        assert_eq!(state.mailbox_collect(id).unwrap().0, Some(message(1)));
        assert_eq!(state.mailbox_collect(id).unwrap().0, Some(message(2)));
        assert!(state.mailbox(id).unwrap().is_empty());
    }

    #[test]
    fn test_deposit_wakes_waiters_into_ready() {
        let mut state = state_with_current(5);
        let id = MailboxId::new();
        state.mailboxes.insert(id, Mailbox::new(id, 2));
        let low = add_waiter(&mut state, id, 2);

        let woke = state.mailbox_deposit(id, message(0)).unwrap();
        assert!(!woke, "a lower-priority waiter does not preempt");
        assert_eq!(state.ready.head(), Some(low));
        assert!(state
            .mailboxes
            .get(&id)
            .unwrap()
            .wait_list
            .is_empty());
    }

    #[test]
    fn test_waking_equal_priority_reports_preemption() {
        let mut state = state_with_current(5);
        let id = MailboxId::new();
        state.mailboxes.insert(id, Mailbox::new(id, 2));
        add_waiter(&mut state, id, 5);

        assert!(state.mailbox_deposit(id, message(0)).unwrap());
    }

    #[test]
    fn test_collect_on_empty_does_not_touch_waiters() {
        let mut state = state_with_current(5);
        let id = MailboxId::new();
        state.mailboxes.insert(id, Mailbox::new(id, 2));
        let waiter = add_waiter(&mut state, id, 7);

        let (received, woke) = state.mailbox_collect(id).unwrap();
        assert_eq!(received, None);
        assert!(!woke);
        // The blocked sender stays parked until a slot actually frees up.
        assert!(state.threads.control(waiter).in_list());
    }

    #[test]
    fn test_unknown_mailbox_is_an_error() {
        let mut state = state_with_current(5);
        let id = MailboxId::new();
        assert_eq!(
            state.mailbox_collect(id),
            Err(KernelError::UnknownMailbox(id))
        );
    }

    #[test]
    #[should_panic(expected = "capacity must be at least 1")]
    fn test_zero_capacity_is_fatal() {
        let id = MailboxId::new();
        Mailbox::new(id, 0);
    }
}
