//! Record resolution
//!
//! Maps a monitored domain onto the provider record(s) that represent it.
//! The zone is located by the domain's root, all of its records are
//! listed, and [`select_records`] applies the matching policy:
//!
//! 1. **Exact**: an `A` record whose name equals the domain.
//! 2. **Wildcard**: the first `A` record, in provider order, named
//!    `*.<suffix>` where the domain ends with `<suffix>`. This is a plain
//!    string suffix test, so `*.lab.example.com` also covers
//!    `host.xlab.example.com`.
//! 3. **Bulk**: every `A` record in the zone. A monitored name with no
//!    record of its own is taken to mean "keep every host in the zone
//!    current". This also applies to plain (non-wildcard) names, so a
//!    mistyped name updates the whole zone instead of failing.
//!
//! A zone with no `A` records at all fails with
//! [`Error::RecordNotFound`].

use tracing::{debug, info};

use crate::domain::{MonitoredDomain, WILDCARD_PREFIX};
use crate::error::{Error, Result};
use crate::record::DnsRecord;
use crate::traits::ZoneApi;

/// Which record(s) a domain resolved to
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    /// Record named exactly like the domain
    Exact(DnsRecord),
    /// Wildcard record covering the domain
    Wildcard(DnsRecord),
    /// Every A record in the zone
    Bulk(Vec<DnsRecord>),
}

impl Resolved {
    /// The selected records, in provider order
    pub fn records(&self) -> &[DnsRecord] {
        match self {
            Resolved::Exact(record) | Resolved::Wildcard(record) => std::slice::from_ref(record),
            Resolved::Bulk(records) => records,
        }
    }

    /// Whether this is the bulk fallback
    pub fn is_bulk(&self) -> bool {
        matches!(self, Resolved::Bulk(_))
    }

    /// Short label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Resolved::Exact(_) => "exact",
            Resolved::Wildcard(_) => "wildcard",
            Resolved::Bulk(_) => "bulk",
        }
    }
}

/// Outcome of resolving one domain
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Zone holding the records
    pub zone_id: String,
    /// Root domain the zone was looked up by
    pub root_domain: String,
    /// Selected record(s)
    pub resolved: Resolved,
}

/// Apply the matching policy to a zone's record listing
///
/// `records` is the full, unfiltered listing in provider order.
pub fn select_records(domain: &MonitoredDomain, records: Vec<DnsRecord>) -> Result<Resolved> {
    let name = domain.name();

    if let Some(record) = records.iter().find(|r| r.is_a() && r.name == name) {
        return Ok(Resolved::Exact(record.clone()));
    }

    if let Some(record) = records.iter().find(|r| r.is_a() && covers(&r.name, name)) {
        return Ok(Resolved::Wildcard(record.clone()));
    }

    let a_records: Vec<DnsRecord> = records.into_iter().filter(DnsRecord::is_a).collect();
    if a_records.is_empty() {
        return Err(Error::record_not_found(name));
    }

    Ok(Resolved::Bulk(a_records))
}

/// The part of a wildcard record name after `*.`
fn wildcard_suffix(record_name: &str) -> Option<&str> {
    record_name
        .strip_prefix(WILDCARD_PREFIX)
        .filter(|suffix| !suffix.is_empty())
}

/// Whether wildcard record `record_name` covers `name`
///
/// `name` only has to end with the text after `*.`. No label boundary is
/// required, so `*.example.com` covers `a.example.com` and `badexample.com`
/// alike, and also the bare `example.com`.
fn covers(record_name: &str, name: &str) -> bool {
    wildcard_suffix(record_name).is_some_and(|suffix| name.ends_with(suffix))
}

/// Resolves monitored domains against a provider
pub struct RecordResolver<'a> {
    api: &'a dyn ZoneApi,
}

impl<'a> RecordResolver<'a> {
    /// Create a resolver over a provider API
    pub fn new(api: &'a dyn ZoneApi) -> Self {
        Self { api }
    }

    /// Classify a raw name, then resolve it
    pub async fn resolve_name(&self, domain: &str) -> Result<Resolution> {
        let domain = MonitoredDomain::parse(domain)?;
        self.resolve(&domain).await
    }

    /// Resolve a monitored domain to its record(s)
    ///
    /// # Errors
    ///
    /// - [`Error::ZoneNotFound`]: no zone for the root domain
    /// - [`Error::NoRecordsInZone`]: the zone is empty
    /// - [`Error::RecordNotFound`]: the zone has no A records
    /// - provider errors are propagated unchanged
    pub async fn resolve(&self, domain: &MonitoredDomain) -> Result<Resolution> {
        let root_domain = domain.root_domain();

        let zones = self.api.find_zones(root_domain).await?;
        let zone = zones
            .into_iter()
            .next()
            .ok_or_else(|| Error::zone_not_found(root_domain))?;
        debug!(zone = %zone.id, root = root_domain, "Found zone");

        let records = self.api.list_records(&zone.id).await?;
        if records.is_empty() {
            return Err(Error::no_records(root_domain));
        }
        debug!(count = records.len(), zone = %zone.id, "Listed zone records");

        let resolved = select_records(domain, records)?;
        match &resolved {
            Resolved::Exact(record) => {
                info!(domain = %domain, content = %record.content, "Found A record");
            }
            Resolved::Wildcard(record) => {
                info!(
                    domain = %domain,
                    record = %record.name,
                    content = %record.content,
                    "Wildcard DNS entry match found"
                );
            }
            Resolved::Bulk(records) => {
                info!(
                    domain = %domain,
                    root = root_domain,
                    count = records.len(),
                    "No record of its own; treating as a request to update all A records in the zone"
                );
            }
        }

        Ok(Resolution {
            zone_id: zone.id,
            root_domain: root_domain.to_string(),
            resolved,
        })
    }
}
