//! Intrusive thread lists
//!
//! One singly-linked list type serves two disciplines: priority-ordered
//! insertion for the ready list and plain FIFO append for primitive wait
//! lists. The links run through each thread's control block, so a thread
//! can be in at most one list; the list's ownership tag is checked on every
//! mutation and a violation is a kernel bug, not a recoverable error.

use crate::thread::ThreadTable;
use core_types::{ListOwner, Priority, ThreadId};

#[derive(Debug)]
pub(crate) struct ThreadList {
    owner: ListOwner,
    head: Option<ThreadId>,
}

impl ThreadList {
    pub(crate) fn new(owner: ListOwner) -> Self {
        Self { owner, head: None }
    }

    pub(crate) fn head(&self) -> Option<ThreadId> {
        self.head
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Takes ownership of the thread's link field
    fn claim(&self, table: &mut ThreadTable, thread: ThreadId) {
        let control = table.control_mut(thread);
        assert!(
            control.owner.is_none(),
            "thread {} ({}) is already linked into {:?}",
            control.name,
            thread,
            control.owner
        );
        assert!(control.next.is_none());
        control.owner = Some(self.owner);
    }

    /// Appends the thread at the tail (FIFO discipline)
    pub(crate) fn insert_fifo(&mut self, table: &mut ThreadTable, thread: ThreadId) {
        self.claim(table, thread);
        match self.head {
            None => self.head = Some(thread),
            Some(first) => {
                let mut tail = first;
                while let Some(next) = table.control(tail).next {
                    tail = next;
                }
                table.control_mut(tail).next = Some(thread);
            }
        }
    }

    /// Inserts the thread before the first entry with strictly lower
    /// priority, so equal-priority entries run round-robin in insertion
    /// order
    pub(crate) fn insert_by_priority(&mut self, table: &mut ThreadTable, thread: ThreadId) {
        self.claim(table, thread);
        let priority = table.control(thread).priority;
        let mut previous: Option<ThreadId> = None;
        let mut cursor = self.head;
        while let Some(current) = cursor {
            if table.control(current).priority < priority {
                break;
            }
            previous = Some(current);
            cursor = table.control(current).next;
        }
        table.control_mut(thread).next = cursor;
        match previous {
            Some(previous) => table.control_mut(previous).next = Some(thread),
            None => self.head = Some(thread),
        }
    }

    /// Unlinks and returns the head
    pub(crate) fn pop_head(&mut self, table: &mut ThreadTable) -> Option<ThreadId> {
        let head = self.head?;
        let control = table.control_mut(head);
        assert!(
            control.owner == Some(self.owner),
            "thread {} ({}) removed from a list that does not own it (owner {:?})",
            control.name,
            head,
            control.owner
        );
        control.owner = None;
        self.head = control.next.take();
        Some(head)
    }

    /// Drains `source` into this list preserving priority order
    ///
    /// Returns whether any moved thread has priority at or above
    /// `current_priority`, which tells the caller an immediate reschedule
    /// is warranted.
    pub(crate) fn splice_by_priority(
        &mut self,
        table: &mut ThreadTable,
        source: &mut ThreadList,
        current_priority: Priority,
    ) -> bool {
        let mut woke_eligible = false;
        while let Some(thread) = source.pop_head(table) {
            woke_eligible = woke_eligible || table.control(thread).priority >= current_priority;
            self.insert_by_priority(table, thread);
        }
        woke_eligible
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread::{StackRegion, ThreadControl};

    fn table_with(priorities: &[i8]) -> (ThreadTable, Vec<ThreadId>) {
        let mut table = ThreadTable::new();
        let ids = priorities
            .iter()
            .enumerate()
            .map(|(i, &priority)| {
                table.insert(ThreadControl::new(
                    format!("t{i}"),
                    Priority::new(priority),
                    StackRegion::new(128, 64),
                ))
            })
            .collect();
        (table, ids)
    }

    fn drain(list: &mut ThreadList, table: &mut ThreadTable) -> Vec<ThreadId> {
        let mut order = Vec::new();
        while let Some(thread) = list.pop_head(table) {
            order.push(thread);
        }
        order
    }

    #[test]
    fn test_priority_insert_orders_descending() {
        let (mut table, ids) = table_with(&[1, 5, 3]);
        let mut list = ThreadList::new(ListOwner::Ready);
        for &id in &ids {
            list.insert_by_priority(&mut table, id);
        }
        assert_eq!(drain(&mut list, &mut table), vec![ids[1], ids[2], ids[0]]);
    }

    #[test]
    fn test_equal_priority_is_fifo() {
        let (mut table, ids) = table_with(&[4, 4, 4]);
        let mut list = ThreadList::new(ListOwner::Ready);
        for &id in &ids {
            list.insert_by_priority(&mut table, id);
        }
        assert_eq!(drain(&mut list, &mut table), ids);
    }

    #[test]
    fn test_equal_priority_goes_after_higher() {
        let (mut table, ids) = table_with(&[5, 3, 5]);
        let mut list = ThreadList::new(ListOwner::Ready);
        for &id in &ids {
            list.insert_by_priority(&mut table, id);
        }
        // Second 5 lands after the first 5, before the 3.
        assert_eq!(drain(&mut list, &mut table), vec![ids[0], ids[2], ids[1]]);
    }

    #[test]
    fn test_fifo_insert_appends() {
        let (mut table, ids) = table_with(&[1, 9, 5]);
        let mut list = ThreadList::new(ListOwner::Timer);
        for &id in &ids {
            list.insert_fifo(&mut table, id);
        }
        assert_eq!(drain(&mut list, &mut table), ids);
    }

    #[test]
    fn test_pop_clears_ownership() {
        let (mut table, ids) = table_with(&[2]);
        let mut list = ThreadList::new(ListOwner::Ready);
        list.insert_by_priority(&mut table, ids[0]);
        assert!(table.control(ids[0]).in_list());
        list.pop_head(&mut table);
        assert!(!table.control(ids[0]).in_list());
        assert!(list.is_empty());
    }

    #[test]
    #[should_panic(expected = "already linked")]
    fn test_double_insert_is_fatal() {
        let (mut table, ids) = table_with(&[2]);
        let mut list = ThreadList::new(ListOwner::Ready);
        list.insert_by_priority(&mut table, ids[0]);
        list.insert_by_priority(&mut table, ids[0]);
    }

    #[test]
    #[should_panic(expected = "does not own it")]
    fn test_pop_by_foreign_list_is_fatal() {
        let (mut table, ids) = table_with(&[2]);
        let mut ready = ThreadList::new(ListOwner::Ready);
        ready.insert_by_priority(&mut table, ids[0]);
        // Steal the head pointer into a list with a different owner tag.
        let mut foreign = ThreadList::new(ListOwner::Timer);
        foreign.head = ready.head;
        foreign.pop_head(&mut table);
    }

    #[test]
    fn test_splice_preserves_priority_and_reports_eligibility() {
        let (mut table, ids) = table_with(&[2, 6, 4]);
        let mailbox = core_types::MailboxId::new();
        let mut waiters = ThreadList::new(ListOwner::MailboxWait(mailbox));
        for &id in &ids {
            waiters.insert_fifo(&mut table, id);
        }
        let mut ready = ThreadList::new(ListOwner::Ready);
        let woke = ready.splice_by_priority(&mut table, &mut waiters, Priority::new(5));
        assert!(woke);
        assert!(waiters.is_empty());
        assert_eq!(drain(&mut ready, &mut table), vec![ids[1], ids[2], ids[0]]);
    }

    #[test]
    fn test_splice_below_current_priority_reports_no_preemption() {
        let (mut table, ids) = table_with(&[1, 2]);
        let mailbox = core_types::MailboxId::new();
        let mut waiters = ThreadList::new(ListOwner::MailboxWait(mailbox));
        for &id in &ids {
            waiters.insert_fifo(&mut table, id);
        }
        let mut ready = ThreadList::new(ListOwner::Ready);
        let woke = ready.splice_by_priority(&mut table, &mut waiters, Priority::new(5));
        assert!(!woke);
    }

    #[test]
    fn test_splice_equal_priority_counts_as_eligible() {
        let (mut table, ids) = table_with(&[5]);
        let mailbox = core_types::MailboxId::new();
        let mut waiters = ThreadList::new(ListOwner::MailboxWait(mailbox));
        waiters.insert_fifo(&mut table, ids[0]);
        let mut ready = ThreadList::new(ListOwner::Ready);
        assert!(ready.splice_by_priority(&mut table, &mut waiters, Priority::new(5)));
    }
}
