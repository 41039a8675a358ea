//! Configuration for the container and its sweeper

use std::time::Duration;

/// Tunable parameters for a container
///
/// The defaults reproduce the shipped constants; tests shrink the batch to
/// exercise the sweeper's amortization loop with few entries.
///
/// # Example
///
/// ```
/// use bilist_storage::Config;
///
/// let config = Config {
///     sweep_batch: 4,
///     ..Default::default()
/// };
/// assert_eq!(config.sweep_threshold, 5);
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Ring slots inspected per sweep batch
    pub sweep_batch: usize,

    /// A batch evicting more than this many entries triggers another batch
    /// within the same tick
    pub sweep_threshold: usize,

    /// Delay between sweep ticks
    pub sweep_period: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sweep_batch: 20,
            sweep_threshold: 5,
            sweep_period: Duration::from_millis(1000),
        }
    }
}
