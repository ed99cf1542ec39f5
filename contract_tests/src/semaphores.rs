//! Counting semaphore contracts

#[cfg(test)]
mod tests {
    use crate::test_helpers::descriptor;
    use core_types::{Priority, SemaphoreId};
    use kernel_api::KernelError;
    use thread_kernel::test_utils::TraceLog;
    use thread_kernel::Kernel;

    #[test]
    fn test_try_wait_tracks_the_count() {
        let kernel = Kernel::new();
        let semaphore = kernel.create_semaphore(1);

        assert!(kernel.sem_try_wait(semaphore).unwrap());
        assert!(!kernel.sem_try_wait(semaphore).unwrap());
        assert!(!kernel.sem_try_wait(semaphore).unwrap());

        kernel.sem_post(semaphore).unwrap();
        assert!(kernel.sem_try_wait(semaphore).unwrap());

        kernel.destroy_semaphore(semaphore).unwrap();
        kernel.close();
    }

    #[test]
    fn test_blocked_waiters_wake_in_creation_order() {
        let kernel = Kernel::new();
        kernel.set_priority(None, Priority::new(10)).unwrap();
        let semaphore = kernel.create_semaphore(0);
        let trace = TraceLog::new();
        for name in ["w1", "w2"] {
            let log = trace.clone();
            let worker = kernel.clone();
            kernel.spawn(descriptor(name, 5), move || {
                worker.sem_wait(semaphore).unwrap();
                log.push(name);
            });
        }
        kernel.set_priority(None, Priority::new(1)).unwrap();
        assert!(trace.is_empty(), "no unit is available yet");

        kernel.sem_post(semaphore).unwrap();
        assert_eq!(trace.snapshot(), vec!["w1"]);
        kernel.sem_post(semaphore).unwrap();
        assert_eq!(trace.snapshot(), vec!["w1", "w2"]);

        kernel.destroy_semaphore(semaphore).unwrap();
        kernel.close();
    }

    #[test]
    fn test_post_without_waiters_accumulates() {
        let kernel = Kernel::new();
        let semaphore = kernel.create_semaphore(0);
        kernel.sem_post(semaphore).unwrap();
        kernel.sem_post(semaphore).unwrap();
        assert!(kernel.sem_try_wait(semaphore).unwrap());
        assert!(kernel.sem_try_wait(semaphore).unwrap());
        assert!(!kernel.sem_try_wait(semaphore).unwrap());
        kernel.destroy_semaphore(semaphore).unwrap();
        kernel.close();
    }

    #[test]
    fn test_unknown_semaphore_errors() {
        let kernel = Kernel::new();
        let semaphore = SemaphoreId::new();
        assert_eq!(
            kernel.sem_try_wait(semaphore),
            Err(KernelError::UnknownSemaphore(semaphore))
        );
        assert_eq!(
            kernel.sem_post(semaphore),
            Err(KernelError::UnknownSemaphore(semaphore))
        );
        kernel.close();
    }

    #[test]
    #[should_panic(expected = "semaphore destroyed while threads wait on it")]
    fn test_destroying_a_semaphore_with_waiters_is_fatal() {
        let kernel = Kernel::new();
        kernel.set_priority(None, Priority::new(10)).unwrap();
        let semaphore = kernel.create_semaphore(0);
        let worker = kernel.clone();
        kernel.spawn(descriptor("stuck", 5), move || {
            let _ = worker.sem_wait(semaphore);
        });
        kernel.set_priority(None, Priority::new(1)).unwrap();
        let _ = kernel.destroy_semaphore(semaphore);
    }
}
