//! Record updates
//!
//! An update is a full-record replace: the body is the record exactly as
//! it was listed, with `content` swapped. Provider-managed flags such as
//! `proxied` and `ttl` therefore survive every update.

use tracing::{error, info};

use crate::error::Result;
use crate::record::DnsRecord;
use crate::traits::ZoneApi;

/// Applies content-only mutations through a provider API
pub struct RecordUpdater<'a> {
    api: &'a dyn ZoneApi,
}

impl<'a> RecordUpdater<'a> {
    /// Create an updater over a provider API
    pub fn new(api: &'a dyn ZoneApi) -> Self {
        Self { api }
    }

    /// Replace `record`'s content with `new_content`
    ///
    /// Either the provider accepts the full record with the new content,
    /// or an error is returned and nothing is assumed about the remote
    /// side.
    ///
    /// # Errors
    ///
    /// - [`Error::Authentication`](crate::Error::Authentication): the credential was rejected
    /// - [`Error::Transport`](crate::Error::Transport): any other provider failure
    pub async fn update(
        &self,
        zone_id: &str,
        record: &DnsRecord,
        new_content: &str,
    ) -> Result<DnsRecord> {
        let replacement = record.with_content(new_content);

        match self.api.replace_record(zone_id, &replacement).await {
            Ok(updated) => {
                info!(
                    record = %record.name,
                    from = %record.content,
                    to = new_content,
                    "DNS record updated"
                );
                Ok(updated)
            }
            Err(e) => {
                if e.is_auth() {
                    error!("Authentication error: check the provider API token");
                } else {
                    error!(record = %record.name, "Error updating DNS record: {}", e);
                }
                Err(e)
            }
        }
    }
}

/// Whether a record already carries `content`
pub fn is_current(record: &DnsRecord, content: &str) -> bool {
    record.content == content
}
