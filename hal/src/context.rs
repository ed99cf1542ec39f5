//! # Saved Execution Context
//!
//! Opaque representation of a suspended thread's execution state.
//!
//! On real hardware this is the register block the trap handler dumped on
//! the thread's stack. On a host platform it is a handle to a parked
//! native thread. The kernel core never looks inside: it receives the
//! context of the thread that trapped and returns the context of the thread
//! to resume, and only the platform layer that minted a context may
//! interpret it.

use std::any::Any;
use std::fmt;

/// Opaque saved execution state of a thread that is not running
///
/// The scheduler stores one of these per suspended thread and shuttles them
/// across the trap boundary without inspecting them. Platform layers
/// downcast through [`SavedContext::as_any`] to recover their concrete
/// type; a context handed to a platform that did not mint it is a fatal
/// platform-mismatch error.
pub trait SavedContext: Any + Send + fmt::Debug {
    /// Returns the context as `Any` for platform-layer downcasting
    fn as_any(&self) -> &dyn Any;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct FakeContext {
        program_counter: u64,
    }

    impl SavedContext for FakeContext {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_platform_recovers_concrete_context() {
        let context: Box<dyn SavedContext> = Box::new(FakeContext {
            program_counter: 0x8000_0400,
        });
        let recovered = context
            .as_any()
            .downcast_ref::<FakeContext>()
            .expect("context minted by this platform");
        assert_eq!(recovered.program_counter, 0x8000_0400);
    }

    #[test]
    fn test_foreign_context_is_detected() {
        #[derive(Debug)]
        struct OtherContext;
        impl SavedContext for OtherContext {
            fn as_any(&self) -> &dyn Any {
                self
            }
        }

        let context: Box<dyn SavedContext> = Box::new(OtherContext);
        assert!(context.as_any().downcast_ref::<FakeContext>().is_none());
    }
}
