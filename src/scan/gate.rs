use std::time::{Duration, Instant};

/// Re-entrancy and debounce guard shared by camera and manual paths.
///
/// One payload is processed at a time; after an accepted payload a
/// debounce window absorbs the retriggers a label still in front of
/// the camera would otherwise produce. Rejected payloads do not start
/// the window, so a mistyped manual entry can be corrected at once.
#[derive(Debug)]
pub struct DecodeGate {
    processing: bool,
    debounce: Duration,
    blocked_until: Option<Instant>,
}

impl DecodeGate {
    /// Window long enough to pull a printed label away from the lens.
    pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1500);

    /// Gate with the given debounce window.
    pub fn new(debounce: Duration) -> Self {
        DecodeGate {
            processing: false,
            debounce,
            blocked_until: None,
        }
    }

    /// Try to claim the gate now.
    pub fn try_begin(&mut self) -> bool {
        self.try_begin_at(Instant::now())
    }

    /// Clock-injected variant for deterministic tests.
    pub fn try_begin_at(&mut self, now: Instant) -> bool {
        if self.processing {
            return false;
        }
        if let Some(until) = self.blocked_until {
            if now < until {
                return false;
            }
            self.blocked_until = None;
        }
        self.processing = true;
        true
    }

    /// Release the gate; an accepted payload starts the debounce window.
    pub fn finish(&mut self, accepted: bool) {
        self.finish_at(accepted, Instant::now());
    }

    /// Clock-injected variant for deterministic tests.
    pub fn finish_at(&mut self, accepted: bool, now: Instant) {
        self.processing = false;
        if accepted {
            self.blocked_until = Some(now + self.debounce);
        }
    }

    /// Whether a payload currently holds the gate.
    pub fn is_processing(&self) -> bool {
        self.processing
    }
}

impl Default for DecodeGate {
    fn default() -> Self {
        DecodeGate::new(Self::DEFAULT_DEBOUNCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_claim_at_a_time() {
        let mut gate = DecodeGate::default();
        assert!(gate.try_begin());
        assert!(gate.is_processing());
        assert!(!gate.try_begin());
        gate.finish(false);
        assert!(gate.try_begin());
    }

    #[test]
    fn test_accept_starts_debounce_window() {
        let window = Duration::from_millis(1500);
        let mut gate = DecodeGate::new(window);
        let t0 = Instant::now();
        assert!(gate.try_begin_at(t0));
        gate.finish_at(true, t0);

        assert!(!gate.try_begin_at(t0 + Duration::from_millis(100)));
        assert!(!gate.try_begin_at(t0 + window - Duration::from_millis(1)));
        assert!(gate.try_begin_at(t0 + window));
    }

    #[test]
    fn test_rejection_allows_immediate_retry() {
        let mut gate = DecodeGate::new(Duration::from_millis(1500));
        let t0 = Instant::now();
        assert!(gate.try_begin_at(t0));
        gate.finish_at(false, t0);
        assert!(gate.try_begin_at(t0));
    }
}
