//! Runtime configuration and tracing setup.

use std::time::Duration;

use arbor_core::{RootOptions, SchedulerConfig};
use tracing_subscriber::EnvFilter;

/// Configuration for an [`App`](crate::shell::App).
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Minimum time between two frames when running continuously.
    pub frame_interval: Duration,
    /// Queued updates run per frame before the rest is deferred.
    pub max_updates_per_frame: usize,
    /// Filter directive used when `RUST_LOG` is not set.
    pub log_filter: String,
    /// Install a `tracing-subscriber` fmt subscriber in [`block_on`](crate::shell::block_on).
    pub install_tracing: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(16),
            max_updates_per_frame: SchedulerConfig::default().max_updates_per_frame,
            log_filter: "info".into(),
            install_tracing: true,
        }
    }
}

impl RuntimeConfig {
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    pub fn with_max_updates_per_frame(mut self, max: usize) -> Self {
        self.max_updates_per_frame = max;
        self
    }

    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    pub fn with_tracing(mut self, install: bool) -> Self {
        self.install_tracing = install;
        self
    }

    pub(crate) fn root_options(&self) -> RootOptions {
        RootOptions::default().with_max_updates_per_frame(self.max_updates_per_frame)
    }
}

/// Install a fmt subscriber filtered by `RUST_LOG`, or by `default_filter`
/// when the variable is unset. Does nothing if a global subscriber is
/// already installed.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_scheduler() {
        let config = RuntimeConfig::default();
        assert_eq!(config.frame_interval, Duration::from_millis(16));
        assert_eq!(config.max_updates_per_frame, 64);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn builders_feed_root_options() {
        let config = RuntimeConfig::default().with_max_updates_per_frame(8).with_tracing(false);
        assert_eq!(config.root_options().scheduler.max_updates_per_frame, 8);
        assert!(!config.install_tracing);
    }

    #[test]
    fn init_tracing_is_idempotent() {
        init_tracing("debug");
        init_tracing("warn");
    }
}
