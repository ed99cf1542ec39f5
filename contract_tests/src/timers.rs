//! Sleep and timer contracts

#[cfg(test)]
mod tests {
    use crate::test_helpers::{descriptor, switches};
    use kernel_api::Message;
    use thread_kernel::test_utils::TraceLog;
    use thread_kernel::{Kernel, SwitchReason, TimerAction};

    #[test]
    fn test_interleaved_sleeps_wake_in_deadline_order() {
        // X sleeps 5 ticks twice, Y sleeps 8 ticks once, main sleeps 15:
        // the wakeups land at ticks 5, 8, 10 and 15.
        let kernel = Kernel::new();
        let trace = TraceLog::new();

        let x = kernel.clone();
        let x_log = trace.clone();
        kernel.spawn(descriptor("x", 1), move || {
            x.sleep(5);
            x_log.push(format!("x@{}", x.now_ticks()));
            x.sleep(5);
            x_log.push(format!("x@{}", x.now_ticks()));
        });
        let y = kernel.clone();
        let y_log = trace.clone();
        kernel.spawn(descriptor("y", 1), move || {
            y.sleep(8);
            y_log.push(format!("y@{}", y.now_ticks()));
        });

        kernel.sleep(15);
        assert_eq!(trace.snapshot(), vec!["x@5", "y@8", "x@10"]);
        assert_eq!(kernel.now_ticks(), 15);
        kernel.close();
    }

    #[test]
    fn test_advance_ticks_preempts_for_a_woken_sleeper() {
        let kernel = Kernel::new();
        let trace = TraceLog::new();
        let log = trace.clone();
        let sleeper = kernel.clone();
        let thread = kernel.spawn(descriptor("sleeper", 5), move || {
            sleeper.sleep(10);
            log.push(format!("woke@{}", sleeper.now_ticks()));
        });

        kernel.advance_ticks(4);
        assert!(trace.is_empty(), "the deadline has not been reached yet");
        assert_eq!(kernel.now_ticks(), 4);

        kernel.advance_ticks(6);
        assert_eq!(trace.snapshot(), vec!["woke@10"]);
        let to_sleeper: Vec<SwitchReason> = switches(&kernel.schedule_log())
            .into_iter()
            .filter(|(to, _)| *to == thread)
            .map(|(_, reason)| reason)
            .collect();
        assert_eq!(to_sleeper.last(), Some(&SwitchReason::Preempted));
        kernel.close();
    }

    #[test]
    fn test_stopped_timer_never_fires() {
        let kernel = Kernel::new();
        let event = kernel.create_event();
        let mailbox = kernel.create_mailbox(1);
        kernel.attach(mailbox, event).unwrap();

        let handle = kernel.start_timer(5, TimerAction::TriggerEvent(event));
        assert!(kernel.stop_timer(handle));
        assert!(!kernel.stop_timer(handle));

        kernel.advance_ticks(10);
        assert_eq!(kernel.try_recv(mailbox).unwrap(), None);

        kernel.detach(mailbox, event).unwrap();
        kernel.destroy_mailbox(mailbox).unwrap();
        kernel.destroy_event(event).unwrap();
        kernel.close();
    }

    #[test]
    fn test_timer_driven_event_trigger_delivers() {
        let kernel = Kernel::new();
        let event = kernel.create_event();
        let mailbox = kernel.create_mailbox(1);
        kernel.attach(mailbox, event).unwrap();

        kernel.start_timer(5, TimerAction::TriggerEvent(event));
        kernel.advance_ticks(5);
        assert_eq!(
            kernel.try_recv(mailbox).unwrap(),
            Some(Message::Event(event))
        );

        kernel.detach(mailbox, event).unwrap();
        kernel.destroy_mailbox(mailbox).unwrap();
        kernel.destroy_event(event).unwrap();
        kernel.close();
    }

    #[test]
    fn test_timer_event_wakes_a_waiting_thread() {
        // A hardware-style interrupt source: a timer triggers the event a
        // blocked thread waits on while main sleeps past the deadline.
        let kernel = Kernel::new();
        let event = kernel.create_event();
        let trace = TraceLog::new();
        let log = trace.clone();
        let waiter = kernel.clone();
        kernel.spawn(descriptor("waiter", 1), move || {
            waiter.wait_event(event).unwrap();
            log.push(format!("event@{}", waiter.now_ticks()));
        });

        kernel.start_timer(6, TimerAction::TriggerEvent(event));
        kernel.sleep(10);
        assert_eq!(trace.snapshot(), vec!["event@6"]);
        kernel.destroy_event(event).unwrap();
        kernel.close();
    }

    #[test]
    fn test_audit_ticks_are_monotonic() {
        let kernel = Kernel::new();
        kernel.sleep(3);
        kernel.sleep(4);
        let log = kernel.schedule_log();
        let ticks: Vec<u64> = log
            .iter()
            .map(|event| match event {
                thread_kernel::ScheduleEvent::Spawned { at_tick, .. }
                | thread_kernel::ScheduleEvent::Switched { at_tick, .. }
                | thread_kernel::ScheduleEvent::Reclaimed { at_tick, .. }
                | thread_kernel::ScheduleEvent::TimerFired { at_tick }
                | thread_kernel::ScheduleEvent::Woken { at_tick, .. } => *at_tick,
            })
            .collect();
        assert!(ticks.windows(2).all(|pair| pair[0] <= pair[1]));
        kernel.close();
    }
}
