use std::time::{Duration, Instant};

/// Holds the latest value until `delay` passes without a newer one.
///
/// Pushing restarts the quiet window instead of queueing, so only the final value of a burst
/// is ever released.
#[derive(Debug)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn push(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now + self.delay));
    }

    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((_, due)) if *due <= now => self.pending.take().map(|(value, _)| value),
            _ => None,
        }
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn due_at(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, due)| *due)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_last_value_in_a_burst_fires() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(200));
        debouncer.push("m", start);
        debouncer.push("ma", start + Duration::from_millis(150));
        assert_eq!(debouncer.poll(start + Duration::from_millis(250)), None);
        assert_eq!(
            debouncer.poll(start + Duration::from_millis(350)),
            Some("ma")
        );
        assert!(!debouncer.is_pending());
        assert_eq!(debouncer.poll(start + Duration::from_secs(5)), None);
    }

    #[test]
    fn cancel_drops_pending_value() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(10));
        debouncer.push(1, start);
        assert_eq!(debouncer.due_at(), Some(start + Duration::from_millis(10)));
        debouncer.cancel();
        assert_eq!(debouncer.poll(start + Duration::from_secs(1)), None);
    }
}
