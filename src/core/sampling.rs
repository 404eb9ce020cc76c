//! Log sampling for high-volume scenarios
//!
//! Probabilistically suppresses the lowest-severity tier (debug and verbose)
//! while guaranteeing that error and warn records are never dropped.
//!
//! # Example
//!
//! ```
//! use structured_logger::{LogLevel, LogSampler, SamplingConfig};
//!
//! let sampler = LogSampler::new(SamplingConfig::new(0.0));
//!
//! // Error and warn are always logged
//! assert!(sampler.should_log(LogLevel::Error));
//! assert!(sampler.should_log(LogLevel::Warn));
//!
//! // Debug is dropped at rate 0.0
//! assert!(!sampler.should_log(LogLevel::Debug));
//! ```

use super::log_level::LogLevel;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};

/// Configuration for log sampling
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingConfig {
    /// When false every call is logged
    pub enabled: bool,

    /// Probability between 0.0 and 1.0 that a debug/verbose call is logged
    pub rate: f64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            rate: 1.0,
        }
    }
}

impl SamplingConfig {
    /// Create an enabled sampling config with the specified rate
    ///
    /// # Example
    ///
    /// ```
    /// use structured_logger::SamplingConfig;
    ///
    /// let config = SamplingConfig::new(1.5);
    /// assert_eq!(config.rate, 1.0);
    /// ```
    pub fn new(rate: f64) -> Self {
        Self {
            enabled: true,
            rate: if rate.is_nan() { 1.0 } else { rate.clamp(0.0, 1.0) },
        }
    }

    /// Create a config that always logs all messages
    pub fn disabled() -> Self {
        Self::default()
    }
}

/// Metrics for sampling observability
#[derive(Debug)]
pub struct SamplerMetrics {
    /// Number of calls that passed sampling
    sampled_count: AtomicU64,

    /// Number of calls dropped by sampling
    dropped_count: AtomicU64,

    /// Total number of calls processed by sampler
    total_count: AtomicU64,
}

impl SamplerMetrics {
    pub const fn new() -> Self {
        Self {
            sampled_count: AtomicU64::new(0),
            dropped_count: AtomicU64::new(0),
            total_count: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn sampled_count(&self) -> u64 {
        self.sampled_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn total_count(&self) -> u64 {
        self.total_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn record_sampled(&self) {
        self.sampled_count.fetch_add(1, Ordering::Relaxed);
        self.total_count.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_dropped(&self) {
        self.dropped_count.fetch_add(1, Ordering::Relaxed);
        self.total_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Observed pass rate. Returns 1.0 if nothing has been processed yet.
    pub fn effective_sample_rate(&self) -> f64 {
        let sampled = self.sampled_count() as f64;
        let total = self.total_count() as f64;

        if total == 0.0 {
            1.0
        } else {
            sampled / total
        }
    }

    pub fn reset(&self) {
        self.sampled_count.store(0, Ordering::Relaxed);
        self.dropped_count.store(0, Ordering::Relaxed);
        self.total_count.store(0, Ordering::Relaxed);
    }
}

impl Default for SamplerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Decides per call whether a record should be emitted
///
/// Each decision is an independent draw; nothing is sticky per request or
/// session. The random number generator is thread-local to avoid contention.
pub struct LogSampler {
    config: SamplingConfig,
    metrics: SamplerMetrics,
}

impl LogSampler {
    pub fn new(config: SamplingConfig) -> Self {
        Self {
            config,
            metrics: SamplerMetrics::new(),
        }
    }

    /// Determine if a call at `level` should be logged
    pub fn should_log(&self, level: LogLevel) -> bool {
        if !self.config.enabled || level.bypasses_sampling() || !level.is_sampled_tier() {
            self.metrics.record_sampled();
            return true;
        }

        let rate = self.config.rate;
        let sample = if rate >= 1.0 {
            true
        } else if rate <= 0.0 {
            false
        } else {
            rand::thread_rng().gen::<f64>() < rate
        };

        if sample {
            self.metrics.record_sampled();
        } else {
            self.metrics.record_dropped();
        }

        sample
    }

    pub fn metrics(&self) -> &SamplerMetrics {
        &self.metrics
    }

    pub fn config(&self) -> &SamplingConfig {
        &self.config
    }
}

impl std::fmt::Debug for LogSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSampler")
            .field("config", &self.config)
            .field("metrics", &self.metrics)
            .finish()
    }
}
