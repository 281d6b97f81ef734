//! Retry utilities: backoff builders.
//!
//! Uses `backon` for exponential backoff with jitter.

use std::time::Duration;

use backon::ExponentialBuilder;

use crate::config::DistributionConfig;

/// Backoff for pushing a deployment to another partition.
///
/// Delays and attempt count come from the `distribution` section; jitter
/// is always enabled.
pub fn distribution_backoff(config: &DistributionConfig) -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(config.min_delay_ms))
        .with_max_delay(Duration::from_millis(config.max_delay_ms))
        .with_max_times(config.max_retries)
        .with_jitter()
}
