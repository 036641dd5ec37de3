use std::time::Duration;

use crate::domain::errors::{DomainError, Result};

/// Exponential retry schedule used by the playback engine between
/// manifest and fragment fetch attempts.
///
/// Attempt `n` (1-based) waits `initial * multiplier^(n-1)`, never more than `max`.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    initial: Duration,
    ceiling: Duration,
    factor: f64,
}

impl BackoffPolicy {
    pub fn new(initial: Duration, ceiling: Duration, factor: f64) -> Result<Self> {
        if !factor.is_finite() || factor <= 1.0 {
            return Err(DomainError::InvalidBackoffMultiplier);
        }
        if initial.is_zero() || ceiling < initial {
            return Err(DomainError::InvalidBackoffBounds { initial, ceiling });
        }
        Ok(Self {
            initial,
            ceiling,
            factor,
        })
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial
    }

    pub fn max_delay(&self) -> Duration {
        self.ceiling
    }

    pub fn multiplier(&self) -> f64 {
        self.factor
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let scaled = self.initial.as_secs_f64() * self.factor.powi(exponent);
        if !scaled.is_finite() || scaled >= self.ceiling.as_secs_f64() {
            return self.ceiling;
        }
        Duration::from_secs_f64(scaled)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            ceiling: Duration::from_secs(8),
            factor: 2.0,
        }
    }
}
