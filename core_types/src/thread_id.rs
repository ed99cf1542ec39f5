//! Generational handle for thread control blocks

use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle to a thread control block
///
/// Threads live in an arena of slots. A handle names a slot together with
/// the generation the slot had when the thread was created, so a handle
/// held past the thread's reclamation is detected instead of silently
/// addressing whatever thread reused the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadId {
    index: u32,
    generation: u32,
}

impl ThreadId {
    /// Creates a handle from an arena slot index and generation
    pub fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Returns the arena slot index
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Returns the slot generation this handle was minted for
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Thread({}.{})", self.index, self.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_id_accessors() {
        let id = ThreadId::new(3, 7);
        assert_eq!(id.index(), 3);
        assert_eq!(id.generation(), 7);
    }

    #[test]
    fn test_same_slot_different_generation_differs() {
        let before = ThreadId::new(0, 1);
        let after = ThreadId::new(0, 2);
        assert_ne!(before, after);
    }

    #[test]
    fn test_thread_id_display() {
        assert_eq!(format!("{}", ThreadId::new(2, 5)), "Thread(2.5)");
    }
}
