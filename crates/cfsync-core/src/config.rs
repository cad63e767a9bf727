//! Configuration types for cfsync
//!
//! This module defines the configuration consumed by the reconciler and
//! the daemon. Loading from the environment lives in `cfsyncd`.

use serde::{Deserialize, Serialize};

/// Default interval between reconciliation cycles (one hour)
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 3600;

/// Address discovery endpoints, highest priority first
pub const DEFAULT_ADDRESS_ENDPOINTS: &[&str] = &[
    "https://api.ipify.org?format=json",
    "https://ifconfig.me/all.json",
    "https://ipinfo.io/json",
];

/// Main cfsync configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Provider API token (bearer)
    pub api_token: String,

    /// Monitored domains, as configured (validated separately)
    pub domains: Vec<String>,

    /// Address discovery endpoints in priority order
    #[serde(default = "default_address_endpoints")]
    pub address_endpoints: Vec<String>,

    /// Perform reads only; log the updates that would be sent
    #[serde(default)]
    pub dry_run: bool,

    /// Reconciler settings
    #[serde(default)]
    pub reconciler: ReconcilerConfig,
}

impl SyncConfig {
    /// Create a configuration with defaults for everything optional
    pub fn new(api_token: impl Into<String>, domains: Vec<String>) -> Self {
        Self {
            api_token: api_token.into(),
            domains,
            address_endpoints: default_address_endpoints(),
            dry_run: false,
            reconciler: ReconcilerConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.api_token.trim().is_empty() {
            return Err(crate::Error::config("API token cannot be empty"));
        }

        if self.domains.iter().all(|d| d.trim().is_empty()) {
            return Err(crate::Error::config("No monitored domains configured"));
        }

        if self.address_endpoints.is_empty() {
            return Err(crate::Error::config(
                "At least one address discovery endpoint is required",
            ));
        }

        if let Some(bad) = self
            .address_endpoints
            .iter()
            .find(|u| !u.starts_with("https://") && !u.starts_with("http://"))
        {
            return Err(crate::Error::config(format!(
                "Address endpoint must use HTTP or HTTPS: {}",
                bad
            )));
        }

        self.reconciler.validate()
    }
}

// Hides the API token
impl std::fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncConfig")
            .field("api_token", &"<REDACTED>")
            .field("domains", &self.domains)
            .field("address_endpoints", &self.address_endpoints)
            .field("dry_run", &self.dry_run)
            .field("reconciler", &self.reconciler)
            .finish()
    }
}

/// Reconciler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Seconds to sleep between cycles
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,

    /// Report full error source chains
    #[serde(default)]
    pub verbose: bool,

    /// Capacity of the event channel
    ///
    /// When full, events are dropped with a warning.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl ReconcilerConfig {
    /// Validate the reconciler configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.check_interval_secs == 0 {
            return Err(crate::Error::config("Check interval must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }

    /// Interval between cycles
    pub fn check_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.check_interval_secs)
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval_secs(),
            verbose: false,
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_check_interval_secs() -> u64 {
    DEFAULT_CHECK_INTERVAL_SECS
}

fn default_event_channel_capacity() -> usize {
    1000
}

fn default_address_endpoints() -> Vec<String> {
    DEFAULT_ADDRESS_ENDPOINTS.iter().map(|s| s.to_string()).collect()
}

/// Render an interval in seconds as `1h 2m 3s`
///
/// Zero-valued units are left out; a zero interval renders as `0s`.
pub fn format_interval(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    let mut parts = Vec::new();
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if minutes > 0 {
        parts.push(format!("{}m", minutes));
    }
    if seconds > 0 || parts.is_empty() {
        parts.push(format!("{}s", seconds));
    }
    parts.join(" ")
}
