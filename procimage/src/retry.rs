use std::time::Duration;

/// Trait that controls how a station paces failed connect attempts and
/// reconnects after a disconnection
pub trait RetryStrategy: Send {
    /// Reset internal state. Called when a connection is successfully established
    fn reset(&mut self);
    /// Return the next delay before making another connection attempt
    fn after_failed_connect(&mut self) -> Duration;
    /// Return the delay to wait after a disconnect before attempting to reconnect
    fn after_disconnect(&mut self) -> Duration;
}

/// Delay before reconnecting after a lost or refused connection
const RECONNECT_DELAY: Duration = Duration::from_secs(10);

/// Return the default [`RetryStrategy`]: a fixed 10 second delay
pub fn default_retry_strategy() -> Box<dyn RetryStrategy> {
    fixed_retry_strategy(RECONNECT_DELAY)
}

/// Return a [`RetryStrategy`] that always waits the same delay
pub fn fixed_retry_strategy(delay: Duration) -> Box<dyn RetryStrategy> {
    Box::new(Fixed { delay })
}

/// Return a [`RetryStrategy`] that doubles on failure up to a maximum value
pub fn doubling_retry_strategy(min: Duration, max: Duration) -> Box<dyn RetryStrategy> {
    Box::new(Doubling {
        min,
        max,
        current: min,
    })
}

struct Fixed {
    delay: Duration,
}

impl RetryStrategy for Fixed {
    fn reset(&mut self) {}

    fn after_failed_connect(&mut self) -> Duration {
        self.delay
    }

    fn after_disconnect(&mut self) -> Duration {
        self.delay
    }
}

struct Doubling {
    min: Duration,
    max: Duration,
    current: Duration,
}

impl RetryStrategy for Doubling {
    fn reset(&mut self) {
        self.current = self.min;
    }

    fn after_failed_connect(&mut self) -> Duration {
        let ret = self.current;
        self.current = std::cmp::min(2 * self.current, self.max);
        ret
    }

    fn after_disconnect(&mut self) -> Duration {
        self.min
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubling_saturates_at_max() {
        let mut strategy = doubling_retry_strategy(
            Duration::from_millis(100),
            Duration::from_millis(300),
        );
        assert_eq!(strategy.after_failed_connect(), Duration::from_millis(100));
        assert_eq!(strategy.after_failed_connect(), Duration::from_millis(200));
        assert_eq!(strategy.after_failed_connect(), Duration::from_millis(300));
        assert_eq!(strategy.after_failed_connect(), Duration::from_millis(300));
        strategy.reset();
        assert_eq!(strategy.after_failed_connect(), Duration::from_millis(100));
    }

    #[test]
    fn fixed_never_changes() {
        let mut strategy = fixed_retry_strategy(Duration::from_secs(10));
        assert_eq!(strategy.after_failed_connect(), Duration::from_secs(10));
        assert_eq!(strategy.after_disconnect(), Duration::from_secs(10));
    }
}
