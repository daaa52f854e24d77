//! Capped exponential retry delays.

use std::time::Duration;

use hc_core::SyncConfig;

/// Largest exponent applied to the base delay.
const MAX_SHIFT: u32 = 16;

/// Computes retry delays as `base * 2^attempt`, capped at `max`.
///
/// # Examples
///
/// ```
/// use hc_sync::Backoff;
/// use std::time::Duration;
///
/// let backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(800));
/// assert_eq!(backoff.delay(0), Duration::from_millis(100));
/// assert_eq!(backoff.delay(2), Duration::from_millis(400));
/// assert_eq!(backoff.delay(10), Duration::from_millis(800));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
}

impl Backoff {
    /// Creates a backoff with the given first delay and cap.
    #[must_use]
    pub const fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Creates a backoff from the sync configuration.
    #[must_use]
    pub const fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.backoff_base(), config.backoff_max())
    }

    /// Returns the delay before retry number `attempt` (zero-based).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let base_ms = u64::try_from(self.base.as_millis()).unwrap_or(u64::MAX);
        let max_ms = u64::try_from(self.max.as_millis()).unwrap_or(u64::MAX);
        let shift = attempt.min(MAX_SHIFT);
        Duration::from_millis(base_ms.saturating_mul(1u64 << shift).min(max_ms))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}
