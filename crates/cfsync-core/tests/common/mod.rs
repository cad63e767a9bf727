//! Test doubles and common utilities for contract tests
//!
//! The doubles are cheap to clone; clones share state and call counters,
//! so a test keeps one handle and gives another to the reconciler.

#![allow(dead_code)]

use cfsync_core::config::ReconcilerConfig;
use cfsync_core::error::{Error, Result};
use cfsync_core::traits::{AddressSource, ZoneApi};
use cfsync_core::{AddressChain, DnsRecord, MonitoredDomain, Reconciler, SyncEvent, Zone};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Failure to inject into the in-memory provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Auth,
    Transport,
}

impl Fault {
    fn into_error(self, what: &str) -> Error {
        match self {
            Fault::Auth => Error::auth(format!("403 Forbidden ({})", what)),
            Fault::Transport => Error::transport("memory", format!("503 ({})", what)),
        }
    }
}

#[derive(Default)]
struct ZoneState {
    zones: Vec<Zone>,
    records: HashMap<String, Vec<DnsRecord>>,
    zone_faults: HashMap<String, Fault>,
    replace_faults: HashMap<String, Fault>,
    replaced: Vec<(String, DnsRecord)>,
}

/// An in-memory provider keyed by zone id and record id
#[derive(Clone, Default)]
pub struct InMemoryZoneApi {
    state: Arc<Mutex<ZoneState>>,
    find_calls: Arc<AtomicUsize>,
    list_calls: Arc<AtomicUsize>,
    replace_calls: Arc<AtomicUsize>,
}

impl InMemoryZoneApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a zone with its records, in listing order
    pub fn with_zone(self, zone_id: &str, name: &str, records: Vec<DnsRecord>) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.zones.push(Zone {
                id: zone_id.to_string(),
                name: name.to_string(),
            });
            state.records.insert(zone_id.to_string(), records);
        }
        self
    }

    /// Make zone lookups for `name` fail
    pub fn fail_zone_lookup(self, name: &str, fault: Fault) -> Self {
        self.state
            .lock()
            .unwrap()
            .zone_faults
            .insert(name.to_string(), fault);
        self
    }

    /// Make replaces of `record_id` fail
    pub fn fail_replace(self, record_id: &str, fault: Fault) -> Self {
        self.state
            .lock()
            .unwrap()
            .replace_faults
            .insert(record_id.to_string(), fault);
        self
    }

    /// Change a record behind the reconciler's back
    pub fn drift(&self, zone_id: &str, record_id: &str, content: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(record) = state
            .records
            .get_mut(zone_id)
            .and_then(|records| records.iter_mut().find(|r| r.id == record_id))
        {
            record.content = content.to_string();
        }
    }

    /// Current remote copy of a record
    pub fn record(&self, zone_id: &str, record_id: &str) -> Option<DnsRecord> {
        self.state
            .lock()
            .unwrap()
            .records
            .get(zone_id)
            .and_then(|records| records.iter().find(|r| r.id == record_id).cloned())
    }

    /// Every successful replace body, in call order
    pub fn replaced(&self) -> Vec<(String, DnsRecord)> {
        self.state.lock().unwrap().replaced.clone()
    }

    /// Names of replaced records, in call order
    pub fn replaced_names(&self) -> Vec<String> {
        self.replaced().into_iter().map(|(_, r)| r.name).collect()
    }

    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn replace_calls(&self) -> usize {
        self.replace_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ZoneApi for InMemoryZoneApi {
    async fn find_zones(&self, name: &str) -> Result<Vec<Zone>> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        if let Some(fault) = state.zone_faults.get(name) {
            return Err(fault.into_error(name));
        }
        Ok(state.zones.iter().filter(|z| z.name == name).cloned().collect())
    }

    async fn list_records(&self, zone_id: &str) -> Result<Vec<DnsRecord>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        Ok(state.records.get(zone_id).cloned().unwrap_or_default())
    }

    async fn replace_record(&self, zone_id: &str, record: &DnsRecord) -> Result<DnsRecord> {
        self.replace_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        if let Some(fault) = state.replace_faults.get(&record.id) {
            return Err(fault.into_error(&record.name));
        }

        let slot = state
            .records
            .get_mut(zone_id)
            .and_then(|records| records.iter_mut().find(|r| r.id == record.id))
            .ok_or_else(|| Error::transport("memory", format!("404 record {}", record.id)))?;
        *slot = record.clone();

        state.replaced.push((zone_id.to_string(), record.clone()));
        Ok(record.clone())
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }
}

/// An address source whose answer the test controls
#[derive(Clone)]
pub struct ScriptedAddressSource {
    name: String,
    answer: Arc<Mutex<Option<String>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedAddressSource {
    /// A source answering `address`
    pub fn answering(name: &str, address: &str) -> Self {
        Self {
            name: name.to_string(),
            answer: Arc::new(Mutex::new(Some(address.to_string()))),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A source that always fails
    pub fn failing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            answer: Arc::new(Mutex::new(None)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Change the answer; `None` makes the source fail
    pub fn set(&self, address: Option<&str>) {
        *self.answer.lock().unwrap() = address.map(str::to_string);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AddressSource for ScriptedAddressSource {
    async fn fetch(&self) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| Error::transport(self.name.clone(), "connection refused"))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// An A record with typical provider metadata
pub fn a_record(id: &str, name: &str, content: &str) -> DnsRecord {
    DnsRecord::new(id, name, "A", content)
        .with_extra("ttl", serde_json::json!(1))
        .with_extra("proxied", serde_json::json!(true))
        .with_extra("comment", serde_json::json!(format!("managed {}", id)))
}

/// Parse a comma-separated list, panicking on any invalid entry
pub fn domains(list: &str) -> Vec<MonitoredDomain> {
    list.split(',')
        .map(|d| MonitoredDomain::parse(d).expect("test domain is valid"))
        .collect()
}

/// Reconciler config with a long interval; tests drive cycles directly
pub fn test_config() -> ReconcilerConfig {
    ReconcilerConfig {
        check_interval_secs: 3600,
        verbose: true,
        event_channel_capacity: 100,
    }
}

/// Build a reconciler over the given doubles
pub fn reconciler(
    api: &InMemoryZoneApi,
    sources: Vec<ScriptedAddressSource>,
    domain_list: &str,
) -> (Reconciler, mpsc::Receiver<SyncEvent>) {
    let chain = AddressChain::new(
        sources
            .into_iter()
            .map(|s| Box::new(s) as Box<dyn AddressSource>)
            .collect(),
    );
    Reconciler::new(
        chain,
        Box::new(api.clone()),
        domains(domain_list),
        &test_config(),
    )
    .expect("reconciler construction succeeds")
}

/// Drain every event currently queued
pub fn drain(rx: &mut mpsc::Receiver<SyncEvent>) -> Vec<SyncEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Assert two records differ only in `content`
pub fn assert_only_content_changed(before: &DnsRecord, after: &DnsRecord) {
    assert_eq!(before.id, after.id);
    assert_eq!(before.name, after.name);
    assert_eq!(before.record_type, after.record_type);
    assert_eq!(before.extra, after.extra);
}
