// # Zone API Trait
//
// Defines the interface to the DNS provider's zone and record API.
//
// ## Implementations
//
// - Cloudflare API v4: `cfsync-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use cfsync_core::ZoneApi;
//
// let zones = api.find_zones("example.com").await?;
// let records = api.list_records(&zones[0].id).await?;
// let updated = api.replace_record(&zones[0].id, &records[0].with_content("2.2.2.2")).await?;
// ```

use async_trait::async_trait;

use crate::record::{DnsRecord, Zone};

/// Trait for the provider's zone/record API
///
/// The provider is treated as a remote key-value store keyed by record id.
///
/// # Trust Level: Untrusted
///
/// Implementations perform HTTP calls to their own endpoints and map the
/// responses. They do not retry, cache between calls, or decide whether an
/// update is needed; those belong to the reconciler.
///
/// # Errors
///
/// - A rejected credential (HTTP 401/403) must surface as
///   [`crate::Error::Authentication`] so it is reported distinctly.
/// - Any other network or provider failure surfaces as
///   [`crate::Error::Transport`].
#[async_trait]
pub trait ZoneApi: Send + Sync {
    /// List zones whose name equals `name`
    ///
    /// An empty list is a valid answer; the caller decides what it means.
    async fn find_zones(&self, name: &str) -> Result<Vec<Zone>, crate::Error>;

    /// List every record in a zone, in provider order, unfiltered
    async fn list_records(&self, zone_id: &str) -> Result<Vec<DnsRecord>, crate::Error>;

    /// Replace a record in full, keyed by `record.id`
    ///
    /// The body is the complete record. Implementations must not drop or
    /// rewrite any field of `record`.
    async fn replace_record(
        &self,
        zone_id: &str,
        record: &DnsRecord,
    ) -> Result<DnsRecord, crate::Error>;

    /// Provider name (for logging)
    fn provider_name(&self) -> &'static str;
}
