//! Public address resolution
//!
//! An [`AddressChain`] holds discovery sources in priority order and asks
//! them one at a time. The first non-empty answer wins; a failing source
//! is skipped, never retried within the same call.

use std::future::Future;

use tracing::{debug, info, warn};

use crate::error::{Error, Result, error_chain};
use crate::traits::AddressSource;

/// Try candidates in order, returning the first success
///
/// Candidates are attempted sequentially. Every error is kept, paired with
/// the index of the candidate that produced it: on success alongside the
/// value, on total failure on its own.
pub async fn try_in_order<'a, C, T, F, Fut>(
    candidates: &'a [C],
    mut attempt: F,
) -> std::result::Result<(T, Vec<(usize, Error)>), Vec<(usize, Error)>>
where
    F: FnMut(&'a C) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut failures = Vec::new();
    for (index, candidate) in candidates.iter().enumerate() {
        match attempt(candidate).await {
            Ok(value) => return Ok((value, failures)),
            Err(e) => failures.push((index, e)),
        }
    }
    Err(failures)
}

/// A successful address lookup
#[derive(Debug)]
pub struct Discovery {
    /// The address, trimmed
    pub address: String,
    /// Source that answered
    pub service: String,
    /// Sources that failed before it, in the order they were tried
    pub skipped: Vec<(String, Error)>,
}

/// Ordered chain of address discovery sources
pub struct AddressChain {
    sources: Vec<Box<dyn AddressSource>>,
}

impl AddressChain {
    /// Create a chain; earlier sources take priority
    pub fn new(sources: Vec<Box<dyn AddressSource>>) -> Self {
        Self { sources }
    }

    /// Append a lower-priority source
    pub fn push(&mut self, source: Box<dyn AddressSource>) {
        self.sources.push(source);
    }

    /// Number of configured sources
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether the chain has no sources
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Source names in priority order
    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Resolve the current public address
    ///
    /// # Errors
    ///
    /// [`Error::AllProvidersFailed`] when every source fails or answers
    /// with an empty value.
    pub async fn resolve(&self) -> Result<String> {
        self.discover().await.map(|found| found.address)
    }

    /// Resolve the current public address, keeping track of which source
    /// answered and which failed before it
    ///
    /// Every failed source is logged with its name, whether or not a later
    /// source succeeds.
    pub async fn discover(&self) -> Result<Discovery> {
        let outcome = try_in_order(self.sources.as_slice(), |source| async move {
            debug!(service = source.name(), "Fetching public IP address");
            let address = source.fetch().await?;
            let address = address.trim();
            if address.is_empty() {
                return Err(Error::transport(source.name(), "response carried no address"));
            }
            Ok(address.to_string())
        })
        .await;

        match outcome {
            Ok((address, failures)) => {
                let skipped = self.report_failures(failures, true);
                let service = self
                    .sources
                    .get(skipped.len())
                    .map(|s| s.name().to_string())
                    .unwrap_or_default();
                info!(address = %address, service = %service, "Public IP address fetched");
                Ok(Discovery {
                    address,
                    service,
                    skipped,
                })
            }
            Err(failures) => {
                self.report_failures(failures, false);
                Err(Error::AllProvidersFailed {
                    attempted: self.sources.len(),
                })
            }
        }
    }

    /// Log each failed source and attach its name
    fn report_failures(&self, failures: Vec<(usize, Error)>, more_tried: bool) -> Vec<(String, Error)> {
        failures
            .into_iter()
            .map(|(index, e)| {
                let service = self.sources[index].name().to_string();
                if more_tried {
                    warn!(service = %service, "Failed to fetch IP address, trying next service: {}", e);
                } else {
                    warn!(service = %service, "Failed to fetch IP address: {}", e);
                }
                debug!(service = %service, "{}", error_chain(&e));
                (service, e)
            })
            .collect()
    }
}

impl std::fmt::Debug for AddressChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddressChain")
            .field("sources", &self.source_names())
            .finish()
    }
}
