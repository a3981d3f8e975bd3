//! Session lifecycle - state transitions, pairing renewal timers and events

mod controller;
pub mod events;

pub use controller::LifecycleController;
pub use events::{
    DisconnectReason, EventBus, EventKind, LifecycleEvent, RemovalReason, Subscription,
};

use crate::config::Config;
use std::path::PathBuf;
use std::time::Duration;

/// Floor for both timers; a zero interval would spin the renewal loop
pub const MIN_TIMER_INTERVAL: Duration = Duration::from_millis(10);

/// Settings for a lifecycle controller instance
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// How long a pairing artifact lives before it is replaced
    pub renewal_interval: Duration,

    /// Upper bound on a single delegate send
    pub send_timeout: Duration,

    /// Parent directory for per-session auth material
    pub sessions_dir: PathBuf,
}

impl LifecycleConfig {
    pub fn new(sessions_dir: impl Into<PathBuf>) -> Self {
        Self {
            renewal_interval: Duration::from_secs(20),
            send_timeout: Duration::from_secs(30),
            sessions_dir: sessions_dir.into(),
        }
    }

    pub fn with_renewal_interval(mut self, interval: Duration) -> Self {
        self.renewal_interval = interval.max(MIN_TIMER_INTERVAL);
        self
    }

    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout.max(MIN_TIMER_INTERVAL);
        self
    }
}

impl From<&Config> for LifecycleConfig {
    fn from(config: &Config) -> Self {
        Self::new(config.sessions_dir())
            .with_renewal_interval(Duration::from_secs(config.pairing.renewal_interval_secs))
            .with_send_timeout(Duration::from_secs(config.delegate.send_timeout_secs))
    }
}
