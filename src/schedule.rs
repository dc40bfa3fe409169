use core::sync::atomic::{AtomicBool, Ordering};

/// Deferred "work is due" flag.
///
/// Armed from a timer context, consumed on the main loop. Arming is a single
/// atomic store, so it is safe from an ESP timer callback as well.
#[derive(Debug, Default)]
pub struct DueFlag(AtomicBool);

impl DueFlag {
    pub fn arm(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_armed(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Consume the flag, returning whether it was armed
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

/// Recurring timer polled by the main loop.
///
/// Expiry only arms the flag; whatever the flag stands for runs later on the
/// loop when it is taken.
#[derive(Debug)]
pub struct PeriodicTimer {
    period_ms: u64,
    deadline_ms: u64,
    due: DueFlag,
}

impl PeriodicTimer {
    pub fn new(period_ms: u64, now_ms: u64) -> Self {
        Self {
            period_ms,
            deadline_ms: now_ms + period_ms,
            due: DueFlag::default(),
        }
    }

    /// Arm the flag if the deadline passed and schedule the next expiry
    pub fn poll(&mut self, now_ms: u64) {
        if now_ms >= self.deadline_ms {
            self.due.arm();
            // No catch-up bursts after a long blocking push
            self.deadline_ms = now_ms + self.period_ms;
        }
    }

    /// Push the next expiry out to a full period from now
    pub fn rearm(&mut self, now_ms: u64) {
        self.deadline_ms = now_ms + self.period_ms;
    }

    pub fn take_due(&self) -> bool {
        self.due.take()
    }

    pub fn is_due(&self) -> bool {
        self.due.is_armed()
    }

    pub fn flag(&self) -> &DueFlag {
        &self.due
    }

    pub fn deadline_ms(&self) -> u64 {
        self.deadline_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_per_period() {
        let mut timer = PeriodicTimer::new(60_000, 0);
        timer.poll(59_999);
        assert!(!timer.take_due());
        timer.poll(60_000);
        assert!(timer.take_due());
        assert!(!timer.take_due());
        timer.poll(60_010);
        assert!(!timer.is_due());
        assert_eq!(timer.deadline_ms(), 120_000);
    }

    #[test]
    fn rearm_postpones_expiry() {
        let mut timer = PeriodicTimer::new(60_000, 0);
        timer.rearm(30_000);
        timer.poll(60_000);
        assert!(!timer.is_due());
        timer.poll(90_000);
        assert!(timer.take_due());
    }

    #[test]
    fn late_poll_does_not_burst() {
        let mut timer = PeriodicTimer::new(1_000, 0);
        timer.poll(10_500);
        assert!(timer.take_due());
        timer.poll(10_600);
        assert!(!timer.is_due());
        assert_eq!(timer.deadline_ms(), 11_500);
    }

    #[test]
    fn flag_can_be_armed_externally() {
        let timer = PeriodicTimer::new(1_000, 0);
        timer.flag().arm();
        assert!(timer.take_due());
    }
}
