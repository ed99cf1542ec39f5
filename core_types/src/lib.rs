//! # Core Types
//!
//! Shared vocabulary for the threading kernel: identifiers, priorities,
//! and the list-ownership tag.
//!
//! ## Philosophy
//!
//! **Identity is structural, never ambient.**
//!
//! Every kernel entity is addressed by an explicit handle. Threads use
//! generational arena handles so that a reclaimed slot can never be confused
//! with its successor; synchronization primitives use random unique ids so
//! handles from different kernels never collide.

pub mod ids;
pub mod list_owner;
pub mod priority;
pub mod thread_id;

pub use ids::{EventId, MailboxId, SemaphoreId};
pub use list_owner::ListOwner;
pub use priority::Priority;
pub use thread_id::ThreadId;
