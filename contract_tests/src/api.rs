//! Kernel API trait contracts
//!
//! Client code programs against `kernel_api::KernelApi`, not against the
//! host kernel type, so the same logic can run on a firmware build of the
//! contract. These tests pin that seam.

#[cfg(test)]
mod tests {
    use core_types::Priority;
    use kernel_api::{KernelApi, Message, SendStatus, ThreadDescriptor};
    use thread_kernel::test_utils::TraceLog;
    use thread_kernel::Kernel;

    /// Drives a mailbox and the clock through the trait alone
    fn ping<K: KernelApi>(kernel: &K) -> u32 {
        let mailbox = kernel.create_mailbox(2);
        let status = kernel
            .try_send(mailbox, Message::payload(&41u32).unwrap())
            .unwrap();
        assert_eq!(status, SendStatus::Sent);
        kernel.send(mailbox, Message::payload(&1u32).unwrap()).unwrap();

        let mut total = 0;
        while let Some(message) = kernel.try_recv(mailbox).unwrap() {
            total += message.decode::<u32>().unwrap().unwrap();
        }
        kernel.destroy_mailbox(mailbox).unwrap();
        total
    }

    #[test]
    fn test_mailboxes_work_through_the_trait() {
        let kernel = Kernel::new();
        assert_eq!(ping(&kernel), 42);
        kernel.close();
    }

    #[test]
    fn test_threads_and_events_work_through_the_trait() {
        let kernel = Kernel::new();
        KernelApi::set_priority(&kernel, None, Priority::new(5)).unwrap();
        let event = KernelApi::create_event(&kernel);
        let trace = TraceLog::new();
        let log = trace.clone();
        let signaler: Kernel = kernel.clone();
        KernelApi::spawn_thread(
            &kernel,
            ThreadDescriptor::new("signaler").with_priority(Priority::new(4)),
            Box::new(move || {
                log.push("fired");
                KernelApi::trigger(&signaler, event).unwrap();
            }),
        );

        KernelApi::wait_event(&kernel, event).unwrap();
        trace.push("observed");
        assert_eq!(trace.snapshot(), vec!["fired", "observed"]);

        KernelApi::set_priority(&kernel, None, Priority::new(0)).unwrap();
        KernelApi::destroy_event(&kernel, event).unwrap();
        kernel.close();
    }

    #[test]
    fn test_sleep_and_time_through_the_trait() {
        let kernel = Kernel::new();
        let before = KernelApi::now_ticks(&kernel);
        KernelApi::sleep(&kernel, 7);
        assert_eq!(KernelApi::now_ticks(&kernel), before + 7);
        kernel.close();
    }
}
