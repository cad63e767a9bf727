//! Reconciliation loop
//!
//! The Reconciler keeps every monitored domain's A record(s) pointed at
//! the machine's public address.
//!
//! ## Cycle
//!
//! ```text
//!        ┌──────────────────┐
//!        │ FetchingAddress  │── all sources failed ──┐
//!        └──────────────────┘                        │
//!           │            │                           │
//!   same as last     changed                         │
//!           │            ▼                           │
//!           │   ┌──────────────────┐                 │
//!           │   │ PerDomainUpdate  │                 │
//!           │   └──────────────────┘                 │
//!           ▼            ▼                           ▼
//!        ┌──────────────────────────────────────────────┐
//!        │                  Sleeping                    │
//!        └──────────────────────────────────────────────┘
//! ```
//!
//! 1. Resolve the public address. Failure aborts this cycle only.
//! 2. Same address as last cycle: nothing to do.
//! 3. Otherwise remember it, then for each domain in configured order
//!    resolve its record(s) and replace any whose content differs.
//!    A failing domain never stops the others.
//! 4. Sleep for the check interval.
//!
//! All calls within a cycle are sequential.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::address::AddressChain;
use crate::config::{ReconcilerConfig, format_interval};
use crate::domain::MonitoredDomain;
use crate::error::{Error, Result, error_chain};
use crate::record::DnsRecord;
use crate::resolver::{RecordResolver, Resolution};
use crate::traits::ZoneApi;
use crate::updater::{RecordUpdater, is_current};

/// Events emitted by the Reconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Loop started
    Started {
        domains_count: usize,
    },

    /// A cycle began
    CycleStarted,

    /// Address lookup failed; the cycle was aborted
    AddressLookupFailed {
        error: String,
    },

    /// Address matches the last cycle; domains skipped
    AddressUnchanged {
        address: String,
    },

    /// A new address was found
    AddressChanged {
        previous: Option<String>,
        address: String,
    },

    /// Record already carried the address
    RecordUnchanged {
        domain: String,
        record_name: String,
        content: String,
    },

    /// Record content replaced
    RecordUpdated {
        domain: String,
        record_name: String,
        previous: String,
        content: String,
    },

    /// Record replace failed
    RecordUpdateFailed {
        domain: String,
        record_name: String,
        error: String,
        auth: bool,
    },

    /// Domain could not be resolved
    DomainFailed {
        domain: String,
        error: String,
        auth: bool,
    },

    /// A cycle ended
    CycleFinished {
        updated: usize,
        failed_domains: usize,
    },

    /// Loop stopped
    Stopped {
        reason: String,
    },
}

/// State carried from one cycle to the next
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilerState {
    /// Last public address a cycle acted on; `None` until the first success
    pub last_public_ip: Option<String>,
}

impl ReconcilerState {
    /// State as if a previous cycle had seen `address`
    pub fn with_address(address: impl Into<String>) -> Self {
        Self {
            last_public_ip: Some(address.into()),
        }
    }
}

/// How a cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Address lookup failed; no domain was touched
    Aborted,
    /// Address unchanged; no domain was touched
    Unchanged,
    /// Every domain was processed
    Reconciled,
}

/// Summary of one cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: CycleOutcome,
    /// Address found this cycle, if any
    pub address: Option<String>,
    /// Records whose content was replaced
    pub updated: usize,
    /// Records already carrying the address
    pub unchanged: usize,
    /// Record replaces that failed
    pub failed_records: usize,
    /// Domains that failed, in processing order
    pub failed_domains: Vec<String>,
}

impl CycleReport {
    fn begin() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: Utc::now(),
            outcome: CycleOutcome::Aborted,
            address: None,
            updated: 0,
            unchanged: 0,
            failed_records: 0,
            failed_domains: Vec::new(),
        }
    }

    fn finish(mut self, outcome: CycleOutcome) -> Self {
        self.outcome = outcome;
        self.finished_at = Utc::now();
        self
    }
}

/// Polling reconciler
///
/// ## Lifecycle
///
/// 1. Create with [`Reconciler::new()`]
/// 2. Drive single cycles with [`Reconciler::run_cycle()`], or loop with
///    [`Reconciler::run_with_shutdown()`]
///
/// The reconciler is the only writer of [`ReconcilerState`] and the only
/// issuer of updates, so it holds no locks.
pub struct Reconciler {
    /// Public address discovery
    addresses: AddressChain,

    /// Provider zone/record API
    api: Box<dyn ZoneApi>,

    /// Domains in configured order
    domains: Vec<MonitoredDomain>,

    /// Sleep between cycles
    check_interval: Duration,

    /// Report full error chains
    verbose: bool,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<SyncEvent>,
}

impl Reconciler {
    /// Create a new reconciler
    ///
    /// # Returns
    ///
    /// A tuple of (reconciler, event_receiver)
    pub fn new(
        addresses: AddressChain,
        api: Box<dyn ZoneApi>,
        domains: Vec<MonitoredDomain>,
        config: &ReconcilerConfig,
    ) -> Result<(Self, mpsc::Receiver<SyncEvent>)> {
        config.validate()?;

        if domains.is_empty() {
            return Err(Error::config("No valid domains to monitor"));
        }

        if addresses.is_empty() {
            return Err(Error::config("No address discovery sources configured"));
        }

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let reconciler = Self {
            addresses,
            api,
            domains,
            check_interval: config.check_interval(),
            verbose: config.verbose,
            event_tx: tx,
        };

        Ok((reconciler, rx))
    }

    /// Monitored domains in processing order
    pub fn domains(&self) -> &[MonitoredDomain] {
        &self.domains
    }

    /// Run until `shutdown_rx` fires (or its sender is dropped)
    ///
    /// With `None` the loop runs forever. The final state is returned.
    pub async fn run_with_shutdown(
        &self,
        shutdown_rx: Option<oneshot::Receiver<()>>,
    ) -> Result<ReconcilerState> {
        self.run_from(ReconcilerState::default(), shutdown_rx).await
    }

    /// Like [`Reconciler::run_with_shutdown`], starting from `state`
    pub async fn run_from(
        &self,
        state: ReconcilerState,
        shutdown_rx: Option<oneshot::Receiver<()>>,
    ) -> Result<ReconcilerState> {
        let shutdown = async move {
            match shutdown_rx {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => std::future::pending::<()>().await,
            }
        };
        Ok(self.run_until(state, shutdown).await)
    }

    /// Loop cycles; `shutdown` is only observed between cycles
    async fn run_until<S>(&self, mut state: ReconcilerState, shutdown: S) -> ReconcilerState
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        self.emit_event(SyncEvent::Started {
            domains_count: self.domains.len(),
        });

        loop {
            self.run_cycle(&mut state).await;

            info!(
                "Next check in {}",
                format_interval(self.check_interval.as_secs())
            );

            tokio::select! {
                _ = tokio::time::sleep(self.check_interval) => {}
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    self.emit_event(SyncEvent::Stopped {
                        reason: "Shutdown signal".to_string(),
                    });
                    break;
                }
            }
        }

        state
    }

    /// Run one reconciliation cycle
    ///
    /// Never fails: address errors abort the cycle, domain errors are
    /// isolated, and both are reported through logs, events and the
    /// returned report.
    pub async fn run_cycle(&self, state: &mut ReconcilerState) -> CycleReport {
        let mut report = CycleReport::begin();
        self.emit_event(SyncEvent::CycleStarted);
        info!("Checking that monitored domains are up to date");

        let address = match self.addresses.resolve().await {
            Ok(address) => address,
            Err(e) => {
                error!("Error updating DNS: {}", e);
                self.report_detail(&e);
                self.emit_event(SyncEvent::AddressLookupFailed {
                    error: e.to_string(),
                });
                return report.finish(CycleOutcome::Aborted);
            }
        };
        report.address = Some(address.clone());

        if state.last_public_ip.as_deref() == Some(address.as_str()) {
            info!(address = %address, "Public IP has not changed, no update required");
            self.emit_event(SyncEvent::AddressUnchanged { address });
            return report.finish(CycleOutcome::Unchanged);
        }

        let previous = state.last_public_ip.replace(address.clone());
        self.emit_event(SyncEvent::AddressChanged {
            previous,
            address: address.clone(),
        });

        for domain in &self.domains {
            info!(domain = %domain, "Processing domain");
            if let Err(e) = self.reconcile_domain(domain, &address, &mut report).await {
                if e.is_auth() {
                    error!(domain = %domain, "Authentication error: check the provider API token");
                }
                error!(domain = %domain, "Error updating DNS for domain: {}", e);
                self.report_detail(&e);
                self.emit_event(SyncEvent::DomainFailed {
                    domain: domain.to_string(),
                    error: e.to_string(),
                    auth: e.is_auth(),
                });
                report.failed_domains.push(domain.to_string());
            }
        }

        info!(
            updated = report.updated,
            unchanged = report.unchanged,
            failed = report.failed_domains.len(),
            "All done"
        );
        self.emit_event(SyncEvent::CycleFinished {
            updated: report.updated,
            failed_domains: report.failed_domains.len(),
        });

        report.finish(CycleOutcome::Reconciled)
    }

    /// Bring one domain's record(s) to `address`
    ///
    /// Every selected record is attempted even if an earlier one fails;
    /// the first failure is returned afterwards.
    async fn reconcile_domain(
        &self,
        domain: &MonitoredDomain,
        address: &str,
        report: &mut CycleReport,
    ) -> Result<()> {
        let resolution = RecordResolver::new(self.api.as_ref()).resolve(domain).await?;
        let Resolution {
            zone_id, resolved, ..
        } = resolution;

        if resolved.is_bulk() {
            info!(
                domain = %domain,
                count = resolved.records().len(),
                "Checking whether any DNS records need the new IP"
            );
        }

        let updater = RecordUpdater::new(self.api.as_ref());
        let mut first_failure = None;

        for record in resolved.records() {
            if is_current(record, address) {
                info!(record = %record.name, "DNS IP already matches, no update needed");
                self.emit_event(SyncEvent::RecordUnchanged {
                    domain: domain.to_string(),
                    record_name: record.name.clone(),
                    content: record.content.clone(),
                });
                report.unchanged += 1;
                continue;
            }

            info!(
                record = %record.name,
                from = %record.content,
                to = address,
                "DNS IP needs to be updated"
            );

            match updater.update(&zone_id, record, address).await {
                Ok(_) => {
                    self.emit_event(SyncEvent::RecordUpdated {
                        domain: domain.to_string(),
                        record_name: record.name.clone(),
                        previous: record.content.clone(),
                        content: address.to_string(),
                    });
                    report.updated += 1;
                }
                Err(e) => {
                    self.record_failure(domain, record, &e);
                    report.failed_records += 1;
                    first_failure.get_or_insert(e);
                }
            }
        }

        match first_failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn record_failure(&self, domain: &MonitoredDomain, record: &DnsRecord, e: &Error) {
        self.report_detail(e);
        self.emit_event(SyncEvent::RecordUpdateFailed {
            domain: domain.to_string(),
            record_name: record.name.clone(),
            error: e.to_string(),
            auth: e.is_auth(),
        });
    }

    /// Log the full error chain in verbose mode
    fn report_detail(&self, e: &Error) {
        if self.verbose {
            error!("{}", error_chain(e));
        } else {
            debug!("{}", error_chain(e));
        }
    }

    /// Emit an event, dropping it if the channel is full
    fn emit_event(&self, event: SyncEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}
