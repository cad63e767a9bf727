//! Domain classification
//!
//! Splits a monitored name into its registrable root domain (the zone
//! lookup key) and its label chain. Validation is strict RFC 1035 hostname
//! syntax, relaxed only for a single `*` label in the leftmost position.
//!
//! ```rust
//! use cfsync_core::domain::classify;
//!
//! let parts = classify("*.home.example.co.uk").unwrap();
//! assert_eq!(parts.root_domain, "example.co.uk");
//! assert!(parts.wildcard);
//! ```

use std::fmt;

use tracing::{error, warn};

use crate::error::{Error, Result};

/// The wildcard label
pub const WILDCARD_LABEL: &str = "*";

/// Prefix of a wildcard record name
pub const WILDCARD_PREFIX: &str = "*.";

const MAX_NAME_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// Result of classifying a domain name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainParts {
    /// Registrable domain: second-level label plus the public suffix
    pub root_domain: String,
    /// Every label of the name, leftmost first
    pub labels: Vec<String>,
    /// Whether the leftmost label is `*`
    pub wildcard: bool,
}

/// Why a single label failed strict validation
#[derive(Debug, Clone, PartialEq, Eq)]
struct LabelViolation {
    index: usize,
    label: String,
    reason: String,
}

/// Classify a domain name
///
/// Names are compared lower-cased. A leading `*` label is accepted; a `*`
/// anywhere else, an unlisted public suffix, or a wildcard standing in for
/// the registrable label (`*.co.uk`) is rejected.
pub fn classify(domain: &str) -> Result<DomainParts> {
    let name = domain.trim().to_ascii_lowercase();

    if name.is_empty() {
        return Err(Error::domain_parse(domain, "domain is empty"));
    }

    if name.len() > MAX_NAME_LEN {
        return Err(Error::domain_parse(
            domain,
            format!("{} chars exceeds the {} char limit", name.len(), MAX_NAME_LEN),
        ));
    }

    let labels: Vec<&str> = name.split('.').collect();

    let wildcard = match validate_labels(&labels, 0) {
        Ok(()) => false,
        // Only a leading "*" earns the relaxed retry
        Err(violation) if violation.index == 0 && violation.label == WILDCARD_LABEL => {
            validate_labels(&labels, 1).map_err(|v| violation_error(domain, v))?;
            true
        }
        Err(violation) => return Err(violation_error(domain, violation)),
    };

    let registrable = psl::domain(name.as_bytes())
        .ok_or_else(|| Error::domain_parse(domain, "no registrable domain below the public suffix"))?;

    if !registrable.suffix().is_known() {
        return Err(Error::domain_parse(domain, "not under a listed public suffix"));
    }

    let root_domain = std::str::from_utf8(registrable.as_bytes())
        .map_err(|_| Error::domain_parse(domain, "root domain is not valid UTF-8"))?
        .to_string();

    if root_domain.starts_with(WILDCARD_PREFIX) {
        return Err(Error::domain_parse(
            domain,
            "wildcard cannot replace the registrable label",
        ));
    }

    Ok(DomainParts {
        root_domain,
        labels: labels.into_iter().map(str::to_string).collect(),
        wildcard,
    })
}

fn validate_labels(labels: &[&str], start: usize) -> std::result::Result<(), LabelViolation> {
    for (index, label) in labels.iter().enumerate().skip(start) {
        let reason = if label.is_empty() {
            Some("empty label".to_string())
        } else if label.len() > MAX_LABEL_LEN {
            Some(format!("label longer than {} chars", MAX_LABEL_LEN))
        } else if let Some(bad) = label
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-'))
        {
            Some(format!("invalid character {:?}", bad))
        } else if label.starts_with('-') || label.ends_with('-') {
            Some("label starts or ends with a hyphen".to_string())
        } else {
            None
        };

        if let Some(reason) = reason {
            return Err(LabelViolation {
                index,
                label: label.to_string(),
                reason,
            });
        }
    }
    Ok(())
}

fn violation_error(domain: &str, violation: LabelViolation) -> Error {
    Error::domain_parse(
        domain,
        format!(
            "label {:?} at position {}: {}",
            violation.label,
            violation.index + 1,
            violation.reason
        ),
    )
}

/// A validated domain kept in sync with the public address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoredDomain {
    name: String,
    parts: DomainParts,
}

impl MonitoredDomain {
    /// Validate and classify a single domain
    pub fn parse(domain: &str) -> Result<Self> {
        let parts = classify(domain)?;
        Ok(Self {
            name: parts.labels.join("."),
            parts,
        })
    }

    /// The normalized name, as compared against record names
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The zone lookup key
    pub fn root_domain(&self) -> &str {
        &self.parts.root_domain
    }

    /// Whether the leftmost label is `*`
    pub fn is_wildcard(&self) -> bool {
        self.parts.wildcard
    }

    /// Classification details
    pub fn parts(&self) -> &DomainParts {
        &self.parts
    }
}

impl fmt::Display for MonitoredDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Outcome of parsing a comma-separated domain list
#[derive(Debug, Default)]
pub struct DomainList {
    /// Valid domains in configured order, duplicates removed
    pub domains: Vec<MonitoredDomain>,
    /// Number of blank entries skipped
    pub empty_entries: usize,
    /// Entries dropped because they failed classification
    pub rejected: Vec<(String, Error)>,
}

/// Parse a comma-separated domain list
///
/// Blank entries are skipped with a warning and invalid ones dropped with
/// an error; neither aborts the parse.
pub fn parse_domain_list(raw: &str) -> DomainList {
    let mut list = DomainList::default();

    for entry in raw.split(',').map(str::trim) {
        if entry.is_empty() {
            warn!("Empty domain entry found, skipping");
            list.empty_entries += 1;
            continue;
        }

        match MonitoredDomain::parse(entry) {
            Ok(domain) => {
                if list.domains.iter().any(|d| d.name() == domain.name()) {
                    warn!(domain = %domain, "Duplicate domain entry, skipping");
                    continue;
                }
                list.domains.push(domain);
            }
            Err(e) => {
                error!(domain = entry, "Invalid domain: {}", e);
                list.rejected.push((entry.to_string(), e));
            }
        }
    }

    list
}
