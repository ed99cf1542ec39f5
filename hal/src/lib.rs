//! # Hardware Abstraction Layer (HAL)
//!
//! This crate defines the hardware-boundary traits the kernel depends on.
//!
//! ## Philosophy
//!
//! **The kernel core never touches hardware directly.**
//!
//! The scheduler needs exactly two things from the machine: a monotonic tick
//! counter and an opaque representation of a suspended thread's execution
//! state. Both are traits here, implemented by a platform layer, whether a
//! real interrupt/trap boundary on hardware or a deterministic host platform
//! for development and testing.

pub mod context;
pub mod timer;

pub use context::SavedContext;
pub use timer::TimerDevice;
