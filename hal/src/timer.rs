//! # Timer Device
//!
//! Hardware abstraction for monotonic time measurement.
//!
//! ## Design Principles
//!
//! 1. **Monotonic**: Ticks never go backwards
//! 2. **Non-blocking**: Always returns immediately
//! 3. **Cumulative**: Returns total ticks since boot
//! 4. **Frequency-agnostic**: No assumptions about tick rate at this layer

/// Hardware timer device trait
///
/// Provides access to a monotonic tick counter. Ticks are cumulative
/// and never decrease.
///
/// # Implementation Notes
///
/// - Must be monotonic (never return a smaller value)
/// - Must not block
/// - Tick frequency is implementation-defined
pub trait TimerDevice {
    /// Returns the current tick count
    fn poll_ticks(&mut self) -> u64;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Counter-backed device standing in for a hardware timer
    struct CounterTimer(u64);

    impl TimerDevice for CounterTimer {
        fn poll_ticks(&mut self) -> u64 {
            self.0 += 3;
            self.0
        }
    }

    #[test]
    fn test_polling_never_goes_backwards() {
        let mut timer = CounterTimer(0);
        let mut last = timer.poll_ticks();
        for _ in 0..10 {
            let now = timer.poll_ticks();
            assert!(now >= last);
            last = now;
        }
    }

    #[test]
    fn test_generic_code_can_measure_elapsed_ticks() {
        fn elapsed<T: TimerDevice>(timer: &mut T) -> u64 {
            let start = timer.poll_ticks();
            timer.poll_ticks() - start
        }

        let mut timer = CounterTimer(100);
        assert_eq!(elapsed(&mut timer), 3);
    }
}
