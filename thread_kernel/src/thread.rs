//! Thread control blocks and the thread arena

use core_types::{ListOwner, Priority, ThreadId};
use hal::SavedContext;

/// Canary word written across the stack guard region
pub(crate) const STACK_COOKIE: u64 = 0xDEAD_BEEF_BAAD_C0DE;

/// A thread's stack allocation: a canary-filled guard region followed by
/// the usable stack area, owned as a single block so one reclamation frees
/// both.
#[derive(Debug)]
pub(crate) struct StackRegion {
    memory: Vec<u8>,
    guard_len: usize,
}

impl StackRegion {
    pub(crate) fn new(stack_size: usize, guard_len: usize) -> Self {
        let mut memory = vec![0u8; guard_len + stack_size];
        for word in memory[..guard_len].chunks_exact_mut(8) {
            word.copy_from_slice(&STACK_COOKIE.to_le_bytes());
        }
        Self { memory, guard_len }
    }

    /// Returns whether every canary word in the guard region is intact
    pub(crate) fn guard_intact(&self) -> bool {
        self.memory[..self.guard_len]
            .chunks_exact(8)
            .all(|word| word == STACK_COOKIE.to_le_bytes())
    }

    #[cfg(test)]
    pub(crate) fn corrupt_guard(&mut self) {
        self.memory[0] ^= 0xff;
    }
}

/// Per-thread metadata
///
/// The link field (`next`) chains the thread into at most one list at a
/// time; `owner` names that list and is checked on every insert and
/// removal. The saved context is present exactly while the thread is not
/// running.
#[derive(Debug)]
pub(crate) struct ThreadControl {
    pub(crate) name: String,
    pub(crate) priority: Priority,
    pub(crate) zombie: bool,
    pub(crate) owner: Option<ListOwner>,
    pub(crate) next: Option<ThreadId>,
    pub(crate) stack: StackRegion,
    pub(crate) saved: Option<Box<dyn SavedContext>>,
    pub(crate) saved_interrupt_depth: u32,
}

impl ThreadControl {
    pub(crate) fn new(name: impl Into<String>, priority: Priority, stack: StackRegion) -> Self {
        Self {
            name: name.into(),
            priority,
            zombie: false,
            owner: None,
            next: None,
            stack,
            saved: None,
            saved_interrupt_depth: 0,
        }
    }

    pub(crate) fn in_list(&self) -> bool {
        self.owner.is_some()
    }
}

/// Arena of thread slots addressed by generational handles
///
/// A slot's generation is bumped when its thread is reclaimed, so a stale
/// `ThreadId` can never address the slot's next occupant.
#[derive(Debug, Default)]
pub(crate) struct ThreadTable {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    control: Option<ThreadControl>,
}

impl ThreadTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, control: ThreadControl) -> ThreadId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.control = Some(control);
            ThreadId::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                control: Some(control),
            });
            ThreadId::new(index, 0)
        }
    }

    pub(crate) fn get(&self, thread: ThreadId) -> Option<&ThreadControl> {
        let slot = self.slots.get(thread.index() as usize)?;
        if slot.generation != thread.generation() {
            return None;
        }
        slot.control.as_ref()
    }

    pub(crate) fn get_mut(&mut self, thread: ThreadId) -> Option<&mut ThreadControl> {
        let slot = self.slots.get_mut(thread.index() as usize)?;
        if slot.generation != thread.generation() {
            return None;
        }
        slot.control.as_mut()
    }

    /// Resolves a handle the kernel itself stored; a miss means the kernel
    /// lost track of a thread, which is not recoverable.
    pub(crate) fn control(&self, thread: ThreadId) -> &ThreadControl {
        self.get(thread)
            .unwrap_or_else(|| panic!("stale thread handle: {thread}"))
    }

    pub(crate) fn control_mut(&mut self, thread: ThreadId) -> &mut ThreadControl {
        self.get_mut(thread)
            .unwrap_or_else(|| panic!("stale thread handle: {thread}"))
    }

    /// Frees the slot, invalidating every outstanding handle to it
    pub(crate) fn remove(&mut self, thread: ThreadId) -> ThreadControl {
        let slot = self
            .slots
            .get_mut(thread.index() as usize)
            .filter(|slot| slot.generation == thread.generation())
            .unwrap_or_else(|| panic!("stale thread handle: {thread}"));
        let control = slot
            .control
            .take()
            .unwrap_or_else(|| panic!("stale thread handle: {thread}"));
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(thread.index());
        self.live -= 1;
        control
    }

    pub(crate) fn live(&self) -> usize {
        self.live
    }

    /// Handles of every occupied slot
    pub(crate) fn live_ids(&self) -> Vec<ThreadId> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.control.is_some())
            .map(|(index, slot)| ThreadId::new(index as u32, slot.generation))
            .collect()
    }
}
