// # Address Source Trait
//
// Defines the interface for discovering the current public IPv4 address.
//
// ## Implementations
//
// - JSON endpoints (ipify, ifconfig.me, ipinfo): `cfsync-ip-http` crate
//
// Sources are combined into an ordered fallback chain by
// [`crate::address::AddressChain`].

use async_trait::async_trait;

/// Trait for a single public address discovery source
///
/// # Trust Level: Semi-Trusted
///
/// A source performs one lookup per call. It must not retry, sleep, or fall
/// back to another service on its own; ordering and failover are owned by
/// the chain.
#[async_trait]
pub trait AddressSource: Send + Sync {
    /// Fetch the current public address
    ///
    /// # Returns
    ///
    /// - `Ok(String)`: A non-empty address string
    /// - `Err(Error)`: The service failed or returned no usable address
    async fn fetch(&self) -> Result<String, crate::Error>;

    /// Human-readable source name, usually its URL
    fn name(&self) -> &str;
}
