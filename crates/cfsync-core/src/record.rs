//! Provider-side record model
//!
//! Records are per-cycle snapshots of provider state. Fields this crate
//! does not interpret (ttl, proxied, comment, tags, timestamps, ...) are
//! kept verbatim in [`DnsRecord::extra`] so a full-record replace sends
//! them back unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Record type managed by cfsync
pub const RECORD_TYPE_A: &str = "A";

/// A provider zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    /// Opaque zone id
    pub id: String,
    /// Zone name (the root domain)
    pub name: String,
}

/// A DNS record as returned by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DnsRecord {
    /// Opaque record id
    pub id: String,
    /// Fully qualified record name, e.g. `www.example.com` or `*.example.com`
    pub name: String,
    /// Record type, e.g. `A`
    #[serde(rename = "type")]
    pub record_type: String,
    /// Record content; the address for A records
    pub content: String,
    /// Every other field, preserved untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DnsRecord {
    /// Create a record with no extra metadata
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        record_type: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            record_type: record_type.into(),
            content: content.into(),
            extra: Map::new(),
        }
    }

    /// Attach a provider metadata field
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Whether this is an A record
    pub fn is_a(&self) -> bool {
        self.record_type.eq_ignore_ascii_case(RECORD_TYPE_A)
    }

    /// Whether the name is a wildcard (`*.` prefixed)
    pub fn is_wildcard(&self) -> bool {
        self.name.starts_with(crate::domain::WILDCARD_PREFIX)
    }

    /// A copy of this record with only `content` replaced
    pub fn with_content(&self, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..self.clone()
        }
    }
}
