//! Thread creation descriptor

use core_types::Priority;
use serde::{Deserialize, Serialize};

/// Default stack size for threads that do not specify one, in bytes
pub const DEFAULT_STACK_SIZE: usize = 16 * 1024;

/// Descriptor for creating a new thread
///
/// Thread creation is explicit: the caller names the thread (diagnostics
/// only), sizes its stack, and assigns its scheduling priority. The entry
/// function is passed separately so the descriptor stays plain data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadDescriptor {
    /// Human-readable name for diagnostics
    pub name: String,
    /// Stack size in bytes, excluding the guard region
    pub stack_size: usize,
    /// Scheduling priority; must be a user priority
    pub priority: Priority,
}

impl ThreadDescriptor {
    /// Creates a descriptor with the default stack size and priority 0
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stack_size: DEFAULT_STACK_SIZE,
            priority: Priority::default(),
        }
    }

    /// Sets the stack size
    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = stack_size;
        self
    }

    /// Sets the priority
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}
