//! Core traits for cfsync
//!
//! This module defines the seams between the reconciliation core and the
//! outside world.
//!
//! - [`ZoneApi`]: Read zones and records, replace records
//! - [`AddressSource`]: Discover the current public address

pub mod address_source;
pub mod zone_api;

pub use address_source::AddressSource;
pub use zone_api::ZoneApi;
