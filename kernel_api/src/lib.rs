//! # Kernel API
//!
//! Public vocabulary of the threading kernel: the operations trait, thread
//! descriptors, messages, send results, and error types.
//!
//! This crate holds everything a client needs to program against the kernel
//! without depending on the kernel's implementation, so the same service
//! code can run against the host kernel used for development and testing or
//! against a firmware build of the same contract.

pub mod api;
pub mod descriptor;
pub mod error;
pub mod message;
pub mod status;

pub use api::KernelApi;
pub use descriptor::ThreadDescriptor;
pub use error::KernelError;
pub use message::{Message, MessagePayload};
pub use status::SendStatus;
