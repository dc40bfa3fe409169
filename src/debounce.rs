use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Debounced pulse counter for one meter input.
///
/// `on_edge` is called from the GPIO interrupt and is the only writer of the
/// level/timestamp fields. The main loop reads `count()` as a snapshot and
/// never blocks the interrupt. Every field is a single atomic word, so no lock
/// is involved on either side.
pub struct PulseInput {
    raw_count: AtomicU32,
    last_level: AtomicBool,
    last_transition_ms: AtomicU32,
    // false until the first transition is accepted, so the window does not
    // apply to an edge arriving right after boot
    primed: AtomicBool,
    debounce_window_ms: u32,
}

impl PulseInput {
    pub fn new(initial_count: u32, idle_level: bool, debounce_window_ms: u32) -> Self {
        Self {
            raw_count: AtomicU32::new(initial_count),
            last_level: AtomicBool::new(idle_level),
            last_transition_ms: AtomicU32::new(0),
            primed: AtomicBool::new(false),
            debounce_window_ms,
        }
    }

    /// Feed one level-change event. Returns true if the edge was accepted.
    ///
    /// `now_ms` is a free-running millisecond counter; wrap-around is handled.
    pub fn on_edge(&self, level: bool, now_ms: u32) -> bool {
        if level == self.last_level.load(Ordering::Relaxed) {
            return false;
        }

        // A rejected bounce must not extend the window
        if self.primed.load(Ordering::Relaxed) {
            let last = self.last_transition_ms.load(Ordering::Relaxed);
            if now_ms.wrapping_sub(last) < self.debounce_window_ms {
                return false;
            }
        }

        self.last_transition_ms.store(now_ms, Ordering::Relaxed);
        self.last_level.store(level, Ordering::Relaxed);
        self.primed.store(true, Ordering::Relaxed);

        if level {
            self.raw_count.fetch_add(1, Ordering::AcqRel);
        }
        true
    }

    /// Interrupt entry point: feed the edge, then re-arm the pin.
    ///
    /// The GPIO driver masks a pin interrupt once it fires. Re-arming here,
    /// whatever the debounce outcome, keeps counting independent of how long
    /// the main loop is blocked.
    pub fn on_interrupt(&self, level: bool, now_ms: u32, rearm: impl FnOnce()) -> bool {
        let accepted = self.on_edge(level, now_ms);
        rearm();
        accepted
    }

    pub fn count(&self) -> u32 {
        self.raw_count.load(Ordering::Acquire)
    }

    pub fn level(&self) -> bool {
        self.last_level.load(Ordering::Relaxed)
    }

    /// Administrative baseline replacement, never called from the interrupt
    pub fn override_count(&self, value: u32) {
        self.raw_count.store(value, Ordering::Release);
        log::info!("Pulse: counter baseline replaced with {}", value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const WINDOW: u32 = 100;

    #[test]
    fn interrupt_rearms_after_every_edge() {
        let input = PulseInput::new(0, false, WINDOW);
        let rearmed = std::cell::Cell::new(0);
        let rearm = || rearmed.set(rearmed.get() + 1);

        assert!(input.on_interrupt(true, 0, rearm));
        // bounce inside the window
        assert!(!input.on_interrupt(false, 5, rearm));
        // same level again
        assert!(!input.on_interrupt(true, 500, rearm));
        assert!(input.on_interrupt(false, 600, rearm));
        assert!(input.on_interrupt(true, 800, rearm));

        assert_eq!(rearmed.get(), 5);
        assert_eq!(input.count(), 2);
    }

    #[test]
    fn counts_rising_edges_only() {
        let input = PulseInput::new(0, false, WINDOW);
        assert!(input.on_edge(true, 1_000));
        assert!(input.on_edge(false, 1_200));
        assert!(input.on_edge(true, 1_400));
        assert_eq!(input.count(), 2);
    }

    #[test]
    fn first_edge_after_boot_is_accepted() {
        let input = PulseInput::new(7, false, WINDOW);
        assert!(input.on_edge(true, 5));
        assert_eq!(input.count(), 8);
    }

    #[test]
    fn same_level_is_ignored() {
        let input = PulseInput::new(0, false, WINDOW);
        assert!(!input.on_edge(false, 1_000));
        assert!(input.on_edge(true, 2_000));
        assert!(!input.on_edge(true, 5_000));
        assert_eq!(input.count(), 1);
    }

    #[test]
    fn bounce_burst_is_one_transition() {
        // Counter at 100, contact chatters three times within 100 ms
        let input = PulseInput::new(100, false, WINDOW);
        assert!(input.on_edge(true, 10_000));
        assert!(!input.on_edge(false, 10_010));
        assert!(!input.on_edge(true, 10_020));
        assert!(!input.on_edge(false, 10_040));
        assert!(!input.on_edge(true, 10_060));
        assert_eq!(input.count(), 101);
        assert!(input.level());
    }

    #[test]
    fn rejected_edges_do_not_extend_window() {
        let input = PulseInput::new(0, false, WINDOW);
        assert!(input.on_edge(true, 1_000));
        assert!(!input.on_edge(false, 1_090));
        // 100 ms after the accepted edge, not after the bounce
        assert!(input.on_edge(false, 1_100));
        assert!(input.on_edge(true, 1_200));
        assert_eq!(input.count(), 2);
    }

    #[test]
    fn millis_wraparound() {
        let input = PulseInput::new(0, false, WINDOW);
        assert!(input.on_edge(true, u32::MAX - 50));
        assert!(!input.on_edge(false, 20));
        assert!(input.on_edge(false, 60));
        assert_eq!(input.count(), 1);
    }

    #[test]
    fn override_sets_new_baseline() {
        let input = PulseInput::new(500, false, WINDOW);
        input.override_count(42);
        assert_eq!(input.count(), 42);
        input.on_edge(true, 1_000);
        assert_eq!(input.count(), 43);
    }

    proptest! {
        #[test]
        fn events_inside_window_never_count(
            offsets in proptest::collection::vec((0u32..WINDOW, any::<bool>()), 0..50)
        ) {
            let input = PulseInput::new(0, false, WINDOW);
            input.on_edge(true, 10_000);
            let before = input.count();
            for (offset, level) in offsets {
                input.on_edge(level, 10_000 + offset);
            }
            prop_assert_eq!(input.count(), before);
        }

        #[test]
        fn count_never_decreases(
            events in proptest::collection::vec((0u32..300, any::<bool>()), 0..200)
        ) {
            let input = PulseInput::new(0, false, WINDOW);
            let mut now = 0u32;
            let mut last = input.count();
            let mut rising_accepted = 0u32;
            for (delta, level) in events {
                now = now.wrapping_add(delta);
                if input.on_edge(level, now) && level {
                    rising_accepted += 1;
                }
                prop_assert!(input.count() >= last);
                last = input.count();
            }
            prop_assert_eq!(input.count(), rising_accepted);
        }
    }
}
