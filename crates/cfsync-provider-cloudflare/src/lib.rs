// # Cloudflare Zone API
//
// This crate implements [`cfsync_core::ZoneApi`] over Cloudflare API v4.
//
// ## Behavior
//
// - One HTTP request per call (record listing: one per page)
// - No retry, backoff or caching; failures propagate to the reconciler
// - 30 second timeout on every request
// - HTTP 401/403 map to `Error::Authentication`, everything else to
//   `Error::Transport`
// - Dry-run mode performs every GET and logs the PUT body instead of
//   sending it
//
// ## Security Requirements
//
// - API token NEVER appears in logs or `Debug` output
// - Construction fails if the token is empty
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List Zones: GET `/zones?name=...`
// - List DNS Records: GET `/zones/:zone_id/dns_records?match=all&page=..&per_page=..`
// - Overwrite DNS Record: PUT `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use cfsync_core::config::SyncConfig;
use cfsync_core::traits::ZoneApi;
use cfsync_core::{DnsRecord, Error, Result, Zone};
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Records requested per listing page
const RECORDS_PER_PAGE: u32 = 100;

/// API error codes Cloudflare uses for a bad or under-privileged token
const AUTH_ERROR_CODES: &[i64] = &[9103, 9109, 10000];

const PROVIDER: &str = "cloudflare";

/// Cloudflare v4 response envelope
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
    #[serde(default)]
    result_info: Option<ResultInfo>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// Pagination block of a listing response
#[derive(Debug, Deserialize)]
struct ResultInfo {
    #[serde(default = "first_page")]
    page: u32,
    #[serde(default = "first_page")]
    total_pages: u32,
}

fn first_page() -> u32 {
    1
}

impl<T> Envelope<T> {
    /// Render the `errors` array as one message
    fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return "no error details".to_string();
        }
        self.errors
            .iter()
            .map(|e| format!("{}: {}", e.code, e.message))
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn is_auth_failure(&self) -> bool {
        self.errors.iter().any(|e| AUTH_ERROR_CODES.contains(&e.code))
    }

    /// Turn an envelope into its result, honoring `success`
    fn into_result(self, action: &str) -> Result<T> {
        if !self.success {
            let summary = self.error_summary();
            return Err(if self.is_auth_failure() {
                Error::auth(format!("{} rejected: {}", action, summary))
            } else {
                Error::transport(PROVIDER, format!("{} failed: {}", action, summary))
            });
        }
        self.result.ok_or_else(|| {
            Error::transport(PROVIDER, format!("{} returned no result", action))
        })
    }
}

/// Map a non-success HTTP status onto the error taxonomy
fn status_error(status: StatusCode, body: &str, action: &str) -> Error {
    let detail = serde_json::from_str::<Envelope<serde_json::Value>>(body)
        .map(|envelope| envelope.error_summary())
        .unwrap_or_else(|_| truncate(body, 200));

    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "{} rejected: invalid API token or insufficient permissions. Status: {} - {}",
            action, status, detail
        )),
        429 => Error::transport(
            PROVIDER,
            format!("{}: rate limit exceeded. Status: {}", action, status),
        ),
        500..=599 => Error::transport(
            PROVIDER,
            format!("{}: Cloudflare server error (transient): {} - {}", action, status, detail),
        ),
        _ => Error::transport(PROVIDER, format!("{} failed: {} - {}", action, status, detail)),
    }
}

/// Page to request after `page`, or `None` once the listing is complete
///
/// A response without `result_info` is a single page. An empty batch ends
/// the listing even if `total_pages` claims more.
fn next_page(page: u32, info: Option<&ResultInfo>, batch_len: usize) -> Option<u32> {
    let total_pages = info.map(|info| info.total_pages.max(info.page))?;
    if batch_len == 0 || page >= total_pages {
        return None;
    }
    Some(page + 1)
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Cloudflare zone/record API client
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the provider will:
/// - Perform all GET requests (zone lookup, record listing)
/// - Log the intended PUT body
/// - **NOT** modify any record, returning the would-be record instead
pub struct CloudflareProvider {
    /// Cloudflare API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// API base URL, without trailing slash
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: if true, perform GET requests but skip PUT updates
    dry_run: bool,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("api_token", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider
    ///
    /// # Parameters
    ///
    /// - `api_token`: Cloudflare API token with Zone:Read and DNS:Edit
    /// - `dry_run`: If true, perform GET requests but skip PUT updates
    ///
    /// # Errors
    ///
    /// `Error::Config` if the token is empty or the HTTP client cannot be
    /// built.
    pub fn new(api_token: impl Into<String>, dry_run: bool) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.trim().is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .user_agent(concat!("cfsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_token,
            base_url: CLOUDFLARE_API_BASE.to_string(),
            client,
            dry_run,
        })
    }

    /// Create a provider in live mode
    pub fn new_live(api_token: impl Into<String>) -> Result<Self> {
        Self::new(api_token, false)
    }

    /// Create a provider in dry-run mode
    pub fn new_dry_run(api_token: impl Into<String>) -> Result<Self> {
        Self::new(api_token, true)
    }

    /// Create a provider from the sync configuration
    pub fn from_config(config: &SyncConfig) -> Result<Self> {
        if config.dry_run {
            tracing::warn!("Cloudflare provider running in DRY-RUN mode - no changes will be made");
        }
        Self::new(config.api_token.clone(), config.dry_run)
    }

    /// Point the provider at another API root (proxies, test servers)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Whether PUTs are skipped
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn zones_url(&self) -> String {
        format!("{}/zones", self.base_url)
    }

    fn records_url(&self, zone_id: &str) -> String {
        format!("{}/zones/{}/dns_records", self.base_url, zone_id)
    }

    fn record_url(&self, zone_id: &str, record_id: &str) -> String {
        format!("{}/zones/{}/dns_records/{}", self.base_url, zone_id, record_id)
    }

    /// Send an authenticated request and decode the v4 envelope
    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        action: &str,
    ) -> Result<Envelope<T>> {
        let response = request
            .bearer_auth(&self.api_token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|e| {
                Error::transport_with_source(PROVIDER, format!("{}: HTTP request failed", action), e)
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| {
                Error::transport_with_source(PROVIDER, format!("{}: failed to read response", action), e)
            })?;

        if !status.is_success() {
            return Err(status_error(status, &body, action));
        }

        serde_json::from_str(&body).map_err(|e| {
            Error::transport(PROVIDER, format!("{}: failed to parse response: {}", action, e))
        })
    }
}

#[async_trait]
impl ZoneApi for CloudflareProvider {
    /// ```http
    /// GET /zones?name=example.com
    /// Authorization: Bearer <token>
    /// ```
    async fn find_zones(&self, name: &str) -> Result<Vec<Zone>> {
        tracing::debug!(zone = name, "Looking up zone");

        let request = self.client.get(self.zones_url()).query(&[("name", name)]);
        let zones: Vec<Zone> = self.send(request, "Zone lookup").await?.into_result("Zone lookup")?;

        tracing::debug!(zone = name, matches = zones.len(), "Zone lookup finished");
        Ok(zones)
    }

    /// ```http
    /// GET /zones/:zone_id/dns_records?match=all&page=1&per_page=100
    /// Authorization: Bearer <token>
    /// ```
    ///
    /// Pages are followed until `result_info.total_pages`.
    async fn list_records(&self, zone_id: &str) -> Result<Vec<DnsRecord>> {
        let mut records = Vec::new();
        let mut page: u32 = 1;

        loop {
            let request = self.client.get(self.records_url(zone_id)).query(&[
                ("match", "all".to_string()),
                ("page", page.to_string()),
                ("per_page", RECORDS_PER_PAGE.to_string()),
            ]);
            let mut envelope: Envelope<Vec<DnsRecord>> = self.send(request, "Record listing").await?;
            let info = envelope.result_info.take();
            let batch = envelope.into_result("Record listing")?;

            tracing::debug!(zone_id, page, count = batch.len(), "Fetched record page");

            let next = next_page(page, info.as_ref(), batch.len());
            records.extend(batch);
            match next {
                Some(following) => page = following,
                None => break,
            }
        }

        Ok(records)
    }

    /// ```http
    /// PUT /zones/:zone_id/dns_records/:record_id
    /// Authorization: Bearer <token>
    ///
    /// { ...the complete record... }
    /// ```
    async fn replace_record(&self, zone_id: &str, record: &DnsRecord) -> Result<DnsRecord> {
        let url = self.record_url(zone_id, &record.id);

        if self.dry_run {
            let payload = serde_json::to_string(record)?;
            tracing::info!(
                record = %record.name,
                "[DRY-RUN] Would send PUT request to {} with payload: {}",
                url,
                payload
            );
            return Ok(record.clone());
        }

        let request = self.client.put(&url).json(record);
        let updated: DnsRecord = self
            .send(request, "Record update")
            .await?
            .into_result("Record update")?;

        tracing::debug!(record = %updated.name, content = %updated.content, "Record replaced");
        Ok(updated)
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}
