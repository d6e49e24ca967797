use rand::Rng;
use std::time::Duration;

/// Exponential backoff settings for socket reconnects
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnect attempt
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Growth factor applied after every attempt
    pub multiplier: f64,
    /// Randomization as a fraction of the delay (0.1 = ±10%)
    pub jitter_factor: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl ReconnectConfig {
    /// Same schedule without randomization
    #[must_use]
    pub fn without_jitter(mut self) -> Self {
        self.jitter_factor = 0.0;
        self
    }
}

/// Reconnect delay schedule for one socket.
///
/// Each abnormal loss asks for the next delay together with how long the socket had
/// been `Active` before it dropped. A connection that stayed up for at least the
/// stability threshold starts over from the initial delay instead of inheriting the
/// grown delay of an earlier failure burst.
#[derive(Debug)]
pub struct Backoff {
    config: ReconnectConfig,
    stability_threshold: Duration,
    current_delay: Duration,
    attempt_count: u32,
}

impl Backoff {
    pub fn new(config: ReconnectConfig, stability_threshold: Duration) -> Self {
        let current_delay = config.initial_delay;
        Self {
            config,
            stability_threshold,
            current_delay,
            attempt_count: 0,
        }
    }

    /// Delay to wait before the next connect attempt.
    ///
    /// # Arguments
    /// * `active_for` - time spent `Active` on the connection that was just lost, or
    ///   `None` if it never got there
    pub fn next_delay(&mut self, active_for: Option<Duration>) -> Duration {
        if active_for.is_some_and(|d| d >= self.stability_threshold) {
            self.reset();
        }

        self.attempt_count += 1;
        let delay = self.apply_jitter(self.current_delay);

        #[allow(clippy::cast_precision_loss)]
        let scaled = self.current_delay.as_secs_f64() * self.config.multiplier;
        let next = if scaled.is_finite() && scaled > 0.0 {
            Duration::from_secs_f64(scaled.min(self.config.max_delay.as_secs_f64()))
        } else {
            self.config.max_delay
        };
        self.current_delay = next.min(self.config.max_delay);

        delay
    }

    pub fn reset(&mut self) {
        self.current_delay = self.config.initial_delay;
        self.attempt_count = 0;
    }

    /// Attempts since the last reset
    pub const fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    fn apply_jitter(&self, duration: Duration) -> Duration {
        if self.config.jitter_factor <= 0.0 {
            return duration;
        }

        let base = duration.as_secs_f64();
        let range = base * self.config.jitter_factor;
        let jitter: f64 = rand::thread_rng().gen_range(-range..=range);
        Duration::from_secs_f64((base + jitter).max(0.001))
    }
}
