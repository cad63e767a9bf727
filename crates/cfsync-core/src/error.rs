//! Error types for cfsync
//!
//! One enum covers the whole taxonomy. Variants are grouped by how far a
//! failure is allowed to travel, see [`ErrorScope`].

use thiserror::Error;

/// Result type alias for cfsync operations
pub type Result<T> = std::result::Result<T, Error>;

/// How far an error may propagate before it is caught
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorScope {
    /// Stops startup; the daemon exits
    Fatal,
    /// Aborts the current reconciliation cycle only
    Cycle,
    /// Caught at the per-domain boundary; other domains continue
    Domain,
}

/// Boxed underlying cause of a transport error
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Core error type for cfsync
#[derive(Error, Debug)]
pub enum Error {
    /// Required configuration value missing or unusable
    #[error("Configuration error: {0}")]
    Config(String),

    /// Domain string could not be classified
    #[error("Failed to parse domain {domain}: {reason}")]
    DomainParse {
        /// The rejected domain
        domain: String,
        /// Why it was rejected
        reason: String,
    },

    /// Provider has no zone for the root domain
    #[error("Zone not found for domain: {0}")]
    ZoneNotFound(String),

    /// Zone exists but lists no records at all
    #[error("No existing DNS records found for root domain: {0}")]
    NoRecordsInZone(String),

    /// Zone has no A record that could represent the domain
    #[error("DNS record not found for domain: {0}")]
    RecordNotFound(String),

    /// Every address discovery source failed
    #[error("Failed to fetch public IP address from all {attempted} services")]
    AllProvidersFailed {
        /// Number of sources tried
        attempted: usize,
    },

    /// Credential rejected by the provider
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Network or provider-side failure
    #[error("Transport error ({service}): {message}")]
    Transport {
        /// Service or provider the call went to
        service: String,
        /// Error message
        message: String,
        /// Underlying cause, when one exists
        #[source]
        source: Option<BoxError>,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a domain parse error
    pub fn domain_parse(domain: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DomainParse {
            domain: domain.into(),
            reason: reason.into(),
        }
    }

    /// Create a "zone not found" error
    pub fn zone_not_found(root_domain: impl Into<String>) -> Self {
        Self::ZoneNotFound(root_domain.into())
    }

    /// Create a "no records in zone" error
    pub fn no_records(root_domain: impl Into<String>) -> Self {
        Self::NoRecordsInZone(root_domain.into())
    }

    /// Create a "record not found" error
    pub fn record_not_found(domain: impl Into<String>) -> Self {
        Self::RecordNotFound(domain.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a transport error
    pub fn transport(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            service: service.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a transport error that keeps its cause
    ///
    /// The cause shows up in [`error_chain`], not in `Display`.
    pub fn transport_with_source(
        service: impl Into<String>,
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Transport {
            service: service.into(),
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Where this error is caught by the reconciler
    pub fn scope(&self) -> ErrorScope {
        match self {
            Self::Config(_) => ErrorScope::Fatal,
            Self::AllProvidersFailed { .. } => ErrorScope::Cycle,
            _ => ErrorScope::Domain,
        }
    }

    /// Whether the provider rejected our credential
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }
}

/// Render an error with its full `source()` chain, one cause per line
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str("\n  caused by: ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
