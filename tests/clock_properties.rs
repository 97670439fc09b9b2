use std::time::Duration;

use proptest::prelude::*;
use siteagent::exec::ActivityClock;

proptest! {
    #[test]
    fn unbounded_clock_never_expires(touches in 0usize..64) {
        let clock = ActivityClock::unbounded();
        for _ in 0..touches {
            clock.touch();
        }
        prop_assert!(!clock.is_expired());
    }

    #[test]
    fn touches_never_move_expiry_backward(touches in 1usize..64) {
        let clock = ActivityClock::new(Some(Duration::from_secs(60)));
        let mut prev_idle = clock.idle_for();
        for _ in 0..touches {
            clock.touch();
            let idle = clock.idle_for();
            // A touch can only shrink the idle gap; the slack covers wall
            // time passing between samples.
            prop_assert!(idle <= prev_idle + Duration::from_millis(50));
            prev_idle = idle;
        }
        prop_assert!(!clock.is_expired());
    }

    #[test]
    fn concurrent_touches_keep_clock_consistent(threads in 2usize..8) {
        let clock = std::sync::Arc::new(ActivityClock::new(Some(Duration::from_secs(60))));
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let clock = clock.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        clock.touch();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        prop_assert!(!clock.is_expired());
        prop_assert!(clock.idle_for() < Duration::from_secs(60));
    }
}
