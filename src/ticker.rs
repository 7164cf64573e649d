/// A recurring timer that the runtime polls with the current instant.
pub trait TickSource {
    fn start(&mut self, period_ms: u64, start_ms: u64);
    fn stop(&mut self);
    fn is_running(&self) -> bool;
    fn poll(&mut self, now_ms: u64) -> Option<u64>;
    fn next_due_ms(&self) -> Option<u64>;
}

/// Fires every `period_ms`. A poll that arrives after several periods have
/// elapsed yields one tick and skips the rest.
#[derive(Clone, Debug, Default)]
pub struct FixedPeriodTicker {
    period_ms: u64,
    next_due_ms: Option<u64>,
    fired: u64,
    skipped: u64,
}

impl FixedPeriodTicker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fired(&self) -> u64 {
        self.fired
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

impl TickSource for FixedPeriodTicker {
    fn start(&mut self, period_ms: u64, start_ms: u64) {
        self.period_ms = period_ms.max(1);
        self.next_due_ms = Some(start_ms);
    }

    fn stop(&mut self) {
        self.next_due_ms = None;
    }

    fn is_running(&self) -> bool {
        self.next_due_ms.is_some()
    }

    fn poll(&mut self, now_ms: u64) -> Option<u64> {
        let due = self.next_due_ms?;
        if now_ms < due {
            return None;
        }
        let missed = (now_ms - due) / self.period_ms;
        self.skipped += missed;
        self.fired += 1;
        self.next_due_ms = Some(due + (missed + 1) * self.period_ms);
        Some(now_ms)
    }

    fn next_due_ms(&self) -> Option<u64> {
        self.next_due_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_on_period_boundaries() {
        let mut ticker = FixedPeriodTicker::new();
        ticker.start(1000, 0);
        assert_eq!(ticker.poll(0), Some(0));
        assert_eq!(ticker.poll(500), None);
        assert_eq!(ticker.poll(1000), Some(1000));
        assert_eq!(ticker.next_due_ms(), Some(2000));
    }

    #[test]
    fn late_poll_skips_missed_ticks() {
        let mut ticker = FixedPeriodTicker::new();
        ticker.start(1000, 0);
        ticker.poll(0);
        assert_eq!(ticker.poll(3500), Some(3500));
        assert_eq!(ticker.poll(3600), None);
        assert_eq!(ticker.next_due_ms(), Some(4000));
        assert_eq!(ticker.fired(), 2);
        assert_eq!(ticker.skipped(), 2);
    }

    #[test]
    fn stopped_ticker_never_fires() {
        let mut ticker = FixedPeriodTicker::new();
        assert!(!ticker.is_running());
        assert_eq!(ticker.poll(10), None);

        ticker.start(1000, 0);
        ticker.stop();
        assert!(!ticker.is_running());
        assert_eq!(ticker.poll(5000), None);
    }
}
