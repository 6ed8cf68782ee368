use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Lower bound applied to every computed delay so a misconfigured policy
/// can never turn the reconnect loop into a busy loop.
pub const MIN_RECONNECT_DELAY: Duration = Duration::from_millis(100);

/// How long to wait between a closed connection and the next attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReconnectPolicy {
    Fixed {
        delay_ms: u64,
    },
    /// `initial_ms * multiplier^attempt`, capped at `max_ms`, plus up to
    /// `jitter * base` of random extra delay (still capped at `max_ms`).
    Exponential {
        initial_ms: u64,
        max_ms: u64,
        multiplier: f64,
        jitter: f64,
    },
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy::Exponential {
            initial_ms: 2_000,
            max_ms: 30_000,
            multiplier: 2.0,
            jitter: 0.2,
        }
    }
}

impl ReconnectPolicy {
    pub fn validate(&self) -> Result<(), String> {
        match *self {
            ReconnectPolicy::Fixed { .. } => Ok(()),
            ReconnectPolicy::Exponential {
                initial_ms,
                max_ms,
                multiplier,
                jitter,
            } => {
                if max_ms < initial_ms {
                    return Err(format!(
                        "reconnect max_ms ({}) is below initial_ms ({})",
                        max_ms, initial_ms
                    ));
                }
                if multiplier.is_nan() || multiplier < 1.0 {
                    return Err(format!("reconnect multiplier must be >= 1, got {}", multiplier));
                }
                if !(0.0..=1.0).contains(&jitter) {
                    return Err(format!("reconnect jitter must be within [0, 1], got {}", jitter));
                }
                Ok(())
            }
        }
    }
}

/// Per-connection attempt counter driving a [`ReconnectPolicy`].
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: ReconnectPolicy,
    attempt: u32,
}

impl Backoff {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Forget previous failures; called once a connection is established.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = match self.policy {
            ReconnectPolicy::Fixed { delay_ms } => Duration::from_millis(delay_ms),
            ReconnectPolicy::Exponential {
                initial_ms,
                max_ms,
                multiplier,
                jitter,
            } => {
                let exponent = i32::try_from(self.attempt).unwrap_or(i32::MAX);
                let base = (initial_ms as f64 * multiplier.powi(exponent)).min(max_ms as f64);
                let extra = if jitter > 0.0 {
                    rand::rng().random_range(0.0..=base * jitter)
                } else {
                    0.0
                };
                Duration::from_millis((base + extra).min(max_ms as f64) as u64)
            }
        };
        self.attempt = self.attempt.saturating_add(1);
        delay.max(MIN_RECONNECT_DELAY)
    }
}
