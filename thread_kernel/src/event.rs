//! Multicast events
//!
//! An event holds a fixed-size array of slots naming the mailboxes
//! attached to it; it owns none of them, it only fans a trigger out.
//! Attach and detach are linear slot scans. Triggering posts the event's
//! identity to every attached mailbox that has room; a full mailbox
//! simply misses that firing.

use crate::KernelState;
use core_types::{EventId, MailboxId};
use kernel_api::{KernelError, Message};

#[derive(Debug)]
pub(crate) struct Event {
    slots: Box<[Option<MailboxId>]>,
}

impl Event {
    pub(crate) fn new(slot_count: usize) -> Self {
        Self {
            slots: vec![None; slot_count].into_boxed_slice(),
        }
    }

    pub(crate) fn attachment_count(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub(crate) fn attached(&self) -> Vec<MailboxId> {
        self.slots.iter().flatten().copied().collect()
    }
}

impl KernelState {
    /// Attaches a mailbox to the event's first free slot
    pub(crate) fn event_attach(
        &mut self,
        mailbox: MailboxId,
        event: EventId,
    ) -> Result<(), KernelError> {
        self.mailbox(mailbox)?;
        {
            let entry = self
                .events
                .get_mut(&event)
                .ok_or(KernelError::UnknownEvent(event))?;
            let slot = entry
                .slots
                .iter_mut()
                .find(|slot| slot.is_none())
                .ok_or(KernelError::EventSlotsFull)?;
            *slot = Some(mailbox);
        }
        let entry = self
            .mailboxes
            .get_mut(&mailbox)
            .ok_or(KernelError::UnknownMailbox(mailbox))?;
        entry.attached_events += 1;
        Ok(())
    }

    /// Detaches a mailbox from the event
    pub(crate) fn event_detach(
        &mut self,
        mailbox: MailboxId,
        event: EventId,
    ) -> Result<(), KernelError> {
        {
            let entry = self
                .events
                .get_mut(&event)
                .ok_or(KernelError::UnknownEvent(event))?;
            let slot = entry
                .slots
                .iter_mut()
                .find(|slot| **slot == Some(mailbox))
                .ok_or(KernelError::NotAttached)?;
            *slot = None;
        }
        let entry = self
            .mailboxes
            .get_mut(&mailbox)
            .ok_or(KernelError::UnknownMailbox(mailbox))?;
        entry.attached_events -= 1;
        Ok(())
    }

    /// Posts the event's identity to every attached mailbox with room
    ///
    /// Returns whether any delivery woke a thread with priority at or
    /// above the running thread.
    pub(crate) fn event_trigger(&mut self, event: EventId) -> Result<bool, KernelError> {
        let targets = self
            .events
            .get(&event)
            .ok_or(KernelError::UnknownEvent(event))?
            .attached();
        let mut woke_eligible = false;
        for mailbox in targets {
            if self.mailbox(mailbox)?.is_full() {
                continue;
            }
            if self.mailbox_deposit(mailbox, Message::Event(event))? {
                woke_eligible = true;
            }
        }
        Ok(woke_eligible)
    }
}
