use rand::Rng;
use std::time::Duration;

use crate::config::RetryConfig;

/// Exponential backoff with jitter for calls to the LLM API
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub max_total: Duration,
    initial_delay_ms: u64,
    max_delay_ms: u64,
    backoff_base: f64,
    jitter_factor: f64,
}

impl RetryPolicy {
    pub fn from_config(cfg: &RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            max_total: Duration::from_secs(cfg.max_total_seconds),
            initial_delay_ms: cfg.initial_delay_ms,
            max_delay_ms: cfg.max_delay_ms,
            backoff_base: cfg.backoff_base,
            jitter_factor: cfg.jitter_factor.clamp(0.0, 1.0),
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1) as i32;
        let base = self.initial_delay_ms as f64 * self.backoff_base.powi(exp);
        let jitter = if self.jitter_factor > 0.0 {
            rand::thread_rng().gen_range((1.0 - self.jitter_factor)..=(1.0 + self.jitter_factor))
        } else {
            1.0
        };
        let millis = (base * jitter).min(self.max_delay_ms as f64);
        Duration::from_millis(millis as u64)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&crate::config::Config::default().retry)
    }
}
