// # HTTP Address Source
//
// This crate discovers the public IPv4 address through JSON "what is my IP"
// endpoints.
//
// ## Endpoints
//
// Each endpoint answers with a JSON object carrying the address under one
// of `ip`, `address` or `query`:
//
// - `https://api.ipify.org?format=json` → `{"ip": "..."}`
// - `https://ifconfig.me/all.json`      → `{"ip_addr": ..., "ip": "..."}` (varies)
// - `https://ipinfo.io/json`            → `{"ip": "...", "city": ...}`
//
// ## Architecture
//
// One [`HttpAddressSource`] wraps one endpoint and performs exactly one GET
// per `fetch()`. Ordering and failover live in
// [`cfsync_core::AddressChain`]; [`default_chain`] builds one from a list of
// endpoint URLs.

use cfsync_core::traits::AddressSource;
use cfsync_core::{AddressChain, Error, Result};

use std::net::Ipv4Addr;
use std::time::Duration;

use serde_json::Value;

/// Per-request timeout for discovery endpoints
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Body fields that may carry the address, in lookup order
const ADDRESS_FIELDS: &[&str] = &["ip", "address", "query"];

/// Public address discovery over a single JSON endpoint
pub struct HttpAddressSource {
    /// URL to fetch the address from
    url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpAddressSource {
    /// Create a source for `url`
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(url, default_client())
    }

    /// Create a source sharing an existing client
    pub fn with_client(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            client,
        }
    }

    /// Endpoint URL
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait::async_trait]
impl AddressSource for HttpAddressSource {
    async fn fetch(&self) -> Result<String> {
        let response = self
            .client
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| Error::transport_with_source(&self.url, "Request failed", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::transport(&self.url, format!("HTTP error: {}", status)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::transport_with_source(&self.url, "Invalid JSON response", e))?;

        let address = extract_address(&body)
            .ok_or_else(|| Error::transport(&self.url, "No IPv4 address in response"))?;

        tracing::debug!(service = %self.url, address = %address, "Endpoint answered");
        Ok(address.to_string())
    }

    fn name(&self) -> &str {
        &self.url
    }
}

/// Pull the address out of an endpoint's JSON body
///
/// The first of `ip`, `address`, `query` holding a non-empty string wins.
/// A value that is not an IPv4 address makes the whole body unusable, since
/// it can only ever be written into an `A` record.
pub fn extract_address(body: &Value) -> Option<Ipv4Addr> {
    let raw = ADDRESS_FIELDS
        .iter()
        .filter_map(|field| body.get(*field).and_then(Value::as_str))
        .map(str::trim)
        .find(|value| !value.is_empty())?;

    match raw.parse::<Ipv4Addr>() {
        Ok(address) => Some(address),
        Err(_) => {
            tracing::warn!(value = raw, "Discovery endpoint returned a non-IPv4 address");
            None
        }
    }
}

/// Build an address chain over `endpoints`, in priority order
///
/// All sources share one HTTP client.
pub fn default_chain<S: AsRef<str>>(endpoints: &[S]) -> AddressChain {
    let client = default_client();
    AddressChain::new(
        endpoints
            .iter()
            .map(|url| {
                Box::new(HttpAddressSource::with_client(url.as_ref(), client.clone()))
                    as Box<dyn AddressSource>
            })
            .collect(),
    )
}

fn default_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .user_agent(concat!("cfsync/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_default()
}
