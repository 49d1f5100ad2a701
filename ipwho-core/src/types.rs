//! Core data types for lookup requests, source outcomes and reports
//!
//! This module defines the structures that flow between the source adapters,
//! the orchestrator and the report assembler.
//!
//! # Examples
//!
//! ```
//! use ipwho_core::types::{Fields, LookupRequest, SourceKind, SourceOutcome};
//!
//! let request = LookupRequest::parse("8.8.8.8", [SourceKind::GeoIp, SourceKind::Whois]).unwrap();
//! assert_eq!(request.enabled_sources().len(), 2);
//!
//! let mut fields = Fields::new();
//! fields.insert("City", "Mountain View");
//! let outcome = SourceOutcome::success(fields);
//! assert!(outcome.is_success());
//! ```

use crate::error::Result;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::fmt;
use std::net::IpAddr;

/// An intelligence provider that can be queried for an IP address
///
/// The declaration order is the canonical report order: sorting a set of
/// kinds yields WHOIS, GeoIP, Shodan, AbuseIPDB, Scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SourceKind {
    /// Registry ownership data
    Whois,
    /// Geolocation and network operator
    GeoIp,
    /// Shodan host database
    Shodan,
    /// AbuseIPDB reputation
    AbuseIpDb,
    /// Local port scan
    Scanner,
}

impl SourceKind {
    /// All kinds in canonical order
    pub const ALL: [SourceKind; 5] = [
        SourceKind::Whois,
        SourceKind::GeoIp,
        SourceKind::Shodan,
        SourceKind::AbuseIpDb,
        SourceKind::Scanner,
    ];

    /// Section title used in the rendered report
    pub fn title(&self) -> &'static str {
        match self {
            SourceKind::Whois => "WHOIS Information",
            SourceKind::GeoIp => "GeoIP Information",
            SourceKind::Shodan => "Shodan Information",
            SourceKind::AbuseIpDb => "AbuseIPDB Information",
            SourceKind::Scanner => "Nmap Scan Results",
        }
    }

    /// Short name used in log events
    pub fn name(&self) -> &'static str {
        match self {
            SourceKind::Whois => "whois",
            SourceKind::GeoIp => "geoip",
            SourceKind::Shodan => "shodan",
            SourceKind::AbuseIpDb => "abuseipdb",
            SourceKind::Scanner => "nmap",
        }
    }

    /// Short command-line flag enabling the source
    pub fn flag(&self) -> &'static str {
        match self {
            SourceKind::Whois => "-w",
            SourceKind::GeoIp => "-g",
            SourceKind::Shodan => "-sd",
            SourceKind::AbuseIpDb => "-aip",
            SourceKind::Scanner => "-n",
        }
    }

    /// Returns true for sources whose latency is dominated by a local process
    /// rather than a network round trip
    pub fn is_local(&self) -> bool {
        matches!(self, SourceKind::Scanner)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reason a source could not produce data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The provider has no record for the address
    NotFound,
    /// Connection, DNS or transport failure
    NetworkError,
    /// The provider answered with something we could not interpret
    ParseError,
    /// The provider refused the request because of a quota
    RateLimited,
    /// No API key was configured for the provider
    MissingCredential,
    /// The provider rejected the configured API key
    Unauthorized,
    /// The external tool is not installed
    ToolNotFound,
    /// The external tool failed to run or exited with an error
    ProcessError,
    /// The source did not answer within its time budget
    Timeout,
    /// The adapter itself crashed
    Internal,
}

impl ErrorKind {
    /// Human-readable one-line description rendered in failure sections
    pub fn description(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "no data found for this IP",
            ErrorKind::NetworkError => "network error while contacting the provider",
            ErrorKind::ParseError => "could not parse the provider response",
            ErrorKind::RateLimited => "rate limited by the provider",
            ErrorKind::MissingCredential => "API key not configured",
            ErrorKind::Unauthorized => "API key rejected by the provider",
            ErrorKind::ToolNotFound => "scanner binary not found",
            ErrorKind::ProcessError => "scanner process failed",
            ErrorKind::Timeout => "lookup timed out",
            ErrorKind::Internal => "internal error in lookup",
        }
    }

    /// Returns true for failures that point at a broken run rather than at
    /// missing data or configuration
    pub fn is_unexpected(&self) -> bool {
        matches!(self, ErrorKind::Timeout | ErrorKind::Internal)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Typed failure produced by a source adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    /// Failure category
    pub kind: ErrorKind,
    /// Underlying detail, logged but never rendered
    pub message: String,
}

impl SourceFailure {
    /// Creates a new failure
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl From<reqwest::Error> for SourceFailure {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceFailure::new(ErrorKind::Timeout, err.to_string())
        } else if err.is_decode() {
            SourceFailure::new(ErrorKind::ParseError, err.to_string())
        } else {
            SourceFailure::new(ErrorKind::NetworkError, err.to_string())
        }
    }
}

impl From<serde_json::Error> for SourceFailure {
    fn from(err: serde_json::Error) -> Self {
        SourceFailure::new(ErrorKind::ParseError, err.to_string())
    }
}

/// Insertion-ordered label/value pairs captured by a source
///
/// Labels are unique; inserting an existing label replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields {
    entries: Vec<(String, String)>,
}

impl Fields {
    /// Creates an empty field set
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a field
    pub fn insert(&mut self, label: impl Into<String>, value: impl Into<String>) {
        let label = label.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(l, _)| *l == label) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((label, value)),
        }
    }

    /// Inserts the value when present, or `N/A` otherwise
    pub fn insert_or_na(&mut self, label: impl Into<String>, value: Option<impl Into<String>>) {
        match value {
            Some(v) => self.insert(label, v),
            None => self.insert(label, "N/A"),
        }
    }

    /// Looks up a field by label
    pub fn get(&self, label: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| v.as_str())
    }

    /// Iterates over fields in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(l, v)| (l.as_str(), v.as_str()))
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no field was captured
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<L: Into<String>, V: Into<String>> FromIterator<(L, V)> for Fields {
    fn from_iter<I: IntoIterator<Item = (L, V)>>(iter: I) -> Self {
        let mut fields = Fields::new();
        for (label, value) in iter {
            fields.insert(label, value);
        }
        fields
    }
}

/// Result of querying one source
#[derive(Debug, Clone, PartialEq)]
pub enum SourceOutcome {
    /// The source returned data
    Success {
        /// Captured fields
        fields: Fields,
        /// When the data was produced
        produced_at: DateTime<Utc>,
    },
    /// The source could not produce data
    Failure {
        /// Failure category
        kind: ErrorKind,
        /// Underlying detail
        message: String,
    },
}

impl SourceOutcome {
    /// Creates a success outcome stamped with the current time
    pub fn success(fields: Fields) -> Self {
        SourceOutcome::Success {
            fields,
            produced_at: Utc::now(),
        }
    }

    /// Creates a failure outcome
    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        SourceOutcome::Failure {
            kind,
            message: message.into(),
        }
    }

    /// Returns true for a success outcome
    pub fn is_success(&self) -> bool {
        matches!(self, SourceOutcome::Success { .. })
    }

    /// Failure kind, if this is a failure
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            SourceOutcome::Failure { kind, .. } => Some(*kind),
            SourceOutcome::Success { .. } => None,
        }
    }

    /// Captured fields, if this is a success
    pub fn fields(&self) -> Option<&Fields> {
        match self {
            SourceOutcome::Success { fields, .. } => Some(fields),
            SourceOutcome::Failure { .. } => None,
        }
    }
}

impl From<SourceFailure> for SourceOutcome {
    fn from(failure: SourceFailure) -> Self {
        SourceOutcome::Failure {
            kind: failure.kind,
            message: failure.message,
        }
    }
}

/// A validated request to look up one IP address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRequest {
    ip: IpAddr,
    enabled_sources: BTreeSet<SourceKind>,
}

impl LookupRequest {
    /// Creates a request from an already parsed address
    pub fn new(ip: IpAddr, sources: impl IntoIterator<Item = SourceKind>) -> Self {
        Self {
            ip,
            enabled_sources: sources.into_iter().collect(),
        }
    }

    /// Creates a request from user input
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIp`](crate::Error::InvalidIp) if `ip` is not an IPv4 or IPv6 literal.
    pub fn parse(ip: &str, sources: impl IntoIterator<Item = SourceKind>) -> Result<Self> {
        let ip = crate::target::parse_target(ip)?;
        Ok(Self::new(ip, sources))
    }

    /// Target address
    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    /// Enabled sources in canonical order
    pub fn enabled_sources(&self) -> &BTreeSet<SourceKind> {
        &self.enabled_sources
    }

    /// Returns true if the request enables `kind`
    pub fn is_enabled(&self, kind: SourceKind) -> bool {
        self.enabled_sources.contains(&kind)
    }
}

/// One section of a report
#[derive(Debug, Clone, PartialEq)]
pub struct ReportEntry {
    /// Source that produced the outcome
    pub kind: SourceKind,
    /// Outcome of the source
    pub outcome: SourceOutcome,
}

/// Aggregated result of one lookup, one entry per requested source
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    /// Target address
    pub ip: IpAddr,
    entries: Vec<ReportEntry>,
}

impl Report {
    /// Builds a report, sorting entries into canonical order
    ///
    /// Later entries for an already present kind are discarded.
    pub fn new(ip: IpAddr, entries: impl IntoIterator<Item = (SourceKind, SourceOutcome)>) -> Self {
        let mut sorted: Vec<ReportEntry> = Vec::new();
        for (kind, outcome) in entries {
            if sorted.iter().any(|e| e.kind == kind) {
                continue;
            }
            sorted.push(ReportEntry { kind, outcome });
        }
        sorted.sort_by_key(|e| e.kind);
        Self {
            ip,
            entries: sorted,
        }
    }

    /// Entries in canonical order
    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    /// Outcome for `kind`, if it was requested
    pub fn get(&self, kind: SourceKind) -> Option<&SourceOutcome> {
        self.entries
            .iter()
            .find(|e| e.kind == kind)
            .map(|e| &e.outcome)
    }

    /// Kinds present in the report, in order
    pub fn kinds(&self) -> Vec<SourceKind> {
        self.entries.iter().map(|e| e.kind).collect()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no source was requested
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of sources that produced data
    pub fn success_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.outcome.is_success())
            .count()
    }
}
