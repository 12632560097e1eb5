/// Rate limiter for alerts: accepts at most one event per `period_ms`.
#[derive(Debug)]
pub struct Cooldown {
    period_ms: i64,
    last_accepted_ms: Option<i64>,
}

impl Cooldown {
    pub fn new(period_ms: i64) -> Self {
        Self {
            period_ms,
            last_accepted_ms: None,
        }
    }

    /// Suppressed events do not extend the quiet period.
    pub fn try_accept(&mut self, now_ms: i64) -> bool {
        match self.last_accepted_ms {
            Some(last) if now_ms - last < self.period_ms => false,
            _ => {
                self.last_accepted_ms = Some(now_ms);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_event_always_accepted() {
        assert!(Cooldown::new(3000).try_accept(0));
    }

    #[test]
    fn period_boundary() {
        let mut cooldown = Cooldown::new(3000);
        assert!(cooldown.try_accept(1_000));
        assert!(!cooldown.try_accept(1_001));
        assert!(!cooldown.try_accept(3_999));
        assert!(cooldown.try_accept(4_000));
    }

    #[test]
    fn suppressed_events_do_not_extend() {
        let mut cooldown = Cooldown::new(3000);
        assert!(cooldown.try_accept(0));
        for t in (100..3000).step_by(100) {
            assert!(!cooldown.try_accept(t));
        }
        assert!(cooldown.try_accept(3000));
    }
}
