// # cfsync-core
//
// Core library for keeping DNS A records in sync with the public address.
//
// ## Architecture Overview
//
// - **domain**: Classify monitored names into root domain + labels
// - **AddressChain**: Ordered public-address discovery with fallback
// - **RecordResolver**: Map a domain onto its provider record(s)
// - **RecordUpdater**: Content-only, full-record replaces
// - **Reconciler**: The polling loop tying it all together
// - **ZoneApi** / **AddressSource**: Seams to the provider and discovery
//   services, implemented in sibling crates
//
// ## Design Principles
//
// 1. **Library-First**: Everything the daemon does is available here
// 2. **Isolation**: One domain's failure never affects another
// 3. **Idempotency**: Unchanged addresses and matching records cost no writes
// 4. **Preservation**: Updates change `content` and nothing else

pub mod address;
pub mod config;
pub mod domain;
pub mod error;
pub mod reconciler;
pub mod record;
pub mod resolver;
pub mod traits;
pub mod updater;

// Re-export core types for convenience
pub use address::{AddressChain, Discovery};
pub use config::{ReconcilerConfig, SyncConfig};
pub use domain::{DomainParts, MonitoredDomain, classify, parse_domain_list};
pub use error::{Error, ErrorScope, Result};
pub use reconciler::{CycleOutcome, CycleReport, Reconciler, ReconcilerState, SyncEvent};
pub use record::{DnsRecord, Zone};
pub use resolver::{RecordResolver, Resolution, Resolved};
pub use traits::{AddressSource, ZoneApi};
pub use updater::RecordUpdater;
