//! Thread priority

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scheduling priority of a thread
///
/// Higher values run first. User threads use non-negative priorities; the
/// single negative priority is reserved for the idle thread, which must be
/// strictly lower than every schedulable thread.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Priority(i8);

impl Priority {
    /// Priority of the idle thread, below every user priority
    pub const IDLE: Priority = Priority(-1);

    /// Priority the main thread starts with
    pub const MAIN: Priority = Priority(0);

    /// Creates a priority from a raw level
    pub const fn new(level: i8) -> Self {
        Self(level)
    }

    /// Returns the raw level
    pub const fn level(&self) -> i8 {
        self.0
    }

    /// Returns whether this is a priority user threads may take
    pub const fn is_user(&self) -> bool {
        self.0 >= 0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::MAIN
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pri({})", self.0)
    }
}
