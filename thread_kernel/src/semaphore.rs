//! Counting semaphores
//!
//! Built on the same wait-list machinery as mailboxes: a blocked waiter
//! appends itself and traps, a post splices every waiter back into the
//! ready list and the losers of the recheck re-enqueue themselves.

use crate::list::ThreadList;
use crate::KernelState;
use core_types::{ListOwner, SemaphoreId};
use kernel_api::KernelError;

#[derive(Debug)]
pub(crate) struct Semaphore {
    pub(crate) count: u64,
    pub(crate) wait_list: ThreadList,
}

impl Semaphore {
    pub(crate) fn new(id: SemaphoreId, initial: u32) -> Self {
        Self {
            count: u64::from(initial),
            wait_list: ThreadList::new(ListOwner::SemaphoreWait(id)),
        }
    }
}

impl KernelState {
    pub(crate) fn semaphore(&self, id: SemaphoreId) -> Result<&Semaphore, KernelError> {
        self.semaphores
            .get(&id)
            .ok_or(KernelError::UnknownSemaphore(id))
    }

    /// Takes one unit if available; returns whether it did
    pub(crate) fn semaphore_take(&mut self, id: SemaphoreId) -> Result<bool, KernelError> {
        let semaphore = self
            .semaphores
            .get_mut(&id)
            .ok_or(KernelError::UnknownSemaphore(id))?;
        if semaphore.count > 0 {
            semaphore.count -= 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Releases one unit and wakes every waiter into the ready list
    ///
    /// Returns whether a woken thread has priority at or above the running
    /// thread.
    pub(crate) fn semaphore_release(&mut self, id: SemaphoreId) -> Result<bool, KernelError> {
        let current_priority = self.current_priority();
        let Self {
            semaphores,
            threads,
            ready,
            ..
        } = self;
        let semaphore = semaphores
            .get_mut(&id)
            .ok_or(KernelError::UnknownSemaphore(id))?;
        semaphore.count += 1;
        Ok(ready.splice_by_priority(threads, &mut semaphore.wait_list, current_priority))
    }
}
