//! Concurrent fan-out over the enabled sources
//!
//! The orchestrator spawns one task per enabled source, wraps each in its own
//! timeout and joins on all of them. A slow, failing or crashing source only
//! ever affects its own report entry.
//!
//! # Example
//!
//! ```no_run
//! use ipwho_core::config::Config;
//! use ipwho_core::orchestrator::Orchestrator;
//! use ipwho_core::types::{LookupRequest, SourceKind};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = Orchestrator::new(&Config::from_env())?;
//! let request = LookupRequest::parse("8.8.8.8", [SourceKind::Whois, SourceKind::GeoIp])?;
//! let report = orchestrator.run(&request).await;
//! assert_eq!(report.len(), 2);
//! # Ok(())
//! # }
//! ```

use crate::config::Config;
use crate::error::Result;
use crate::sources::{
    AbuseIpDbSource, GeoIpSource, ScannerSource, ShodanSource, Source, WhoisSource,
};
use crate::types::{ErrorKind, LookupRequest, Report, SourceKind, SourceOutcome};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Extra time granted to the scanner beyond its own budget so that its
/// internal timeout, which terminates the child, fires first
const SCAN_GRACE: Duration = Duration::from_secs(2);

/// Runs lookups against a fixed set of sources
pub struct Orchestrator {
    sources: BTreeMap<SourceKind, Arc<dyn Source>>,
    network_timeout: Duration,
    scan_timeout: Duration,
}

impl Orchestrator {
    /// Creates an orchestrator with the five built-in sources
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(config: &Config) -> Result<Self> {
        let sources: Vec<Arc<dyn Source>> = vec![
            Arc::new(WhoisSource::new(config)),
            Arc::new(GeoIpSource::new(config)?),
            Arc::new(ShodanSource::new(config)?),
            Arc::new(AbuseIpDbSource::new(config)?),
            Arc::new(ScannerSource::new(config)),
        ];
        Ok(Self::with_sources(sources, config))
    }

    /// Creates an orchestrator over arbitrary sources
    ///
    /// Only the time budgets of `config` are used. When two sources report
    /// the same kind the later one wins.
    pub fn with_sources(
        sources: impl IntoIterator<Item = Arc<dyn Source>>,
        config: &Config,
    ) -> Self {
        Self {
            sources: sources.into_iter().map(|s| (s.kind(), s)).collect(),
            network_timeout: config.network_timeout,
            scan_timeout: config.scan_timeout,
        }
    }

    /// Time budget for one source
    pub fn budget(&self, kind: SourceKind) -> Duration {
        if kind.is_local() {
            self.scan_timeout + SCAN_GRACE
        } else {
            self.network_timeout
        }
    }

    /// Queries every enabled source concurrently and assembles the report
    ///
    /// Always returns exactly one entry per enabled source. Must be called
    /// from within a tokio runtime.
    pub async fn run(&self, request: &LookupRequest) -> Report {
        let ip = request.ip();
        let mut entries = Vec::with_capacity(request.enabled_sources().len());
        let mut tasks: Vec<(SourceKind, JoinHandle<SourceOutcome>)> = Vec::new();

        for &kind in request.enabled_sources() {
            match self.sources.get(&kind) {
                Some(source) => {
                    let task = spawn_lookup(Arc::clone(source), ip, self.budget(kind));
                    tasks.push((kind, task));
                }
                None => {
                    warn!(source = %kind, "no adapter registered");
                    entries.push((
                        kind,
                        SourceOutcome::failure(ErrorKind::Internal, "no adapter registered"),
                    ));
                }
            }
        }

        for (kind, task) in tasks {
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(e) if e.is_panic() => {
                    warn!(source = %kind, "lookup task panicked");
                    SourceOutcome::failure(ErrorKind::Internal, "lookup task panicked")
                }
                Err(e) => SourceOutcome::failure(ErrorKind::Internal, e.to_string()),
            };
            entries.push((kind, outcome));
        }

        let report = Report::new(ip, entries);
        debug!(
            %ip,
            sources = report.len(),
            succeeded = report.success_count(),
            "lookups finished"
        );
        report
    }
}

fn spawn_lookup(
    source: Arc<dyn Source>,
    ip: IpAddr,
    budget: Duration,
) -> JoinHandle<SourceOutcome> {
    tokio::spawn(async move {
        let kind = source.kind();
        let started = Instant::now();
        debug!(source = %kind, %ip, "performing {} lookup", kind.title());

        let outcome = match timeout(budget, source.fetch(ip)).await {
            Ok(outcome) => outcome,
            Err(_) => SourceOutcome::failure(
                ErrorKind::Timeout,
                format!("no answer within {:.1}s", budget.as_secs_f64()),
            ),
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            SourceOutcome::Success { fields, .. } => {
                debug!(source = %kind, elapsed_ms, fields = fields.len(), "lookup succeeded")
            }
            SourceOutcome::Failure { kind: error, message } if error.is_unexpected() => {
                warn!(source = %kind, elapsed_ms, error = ?error, "lookup failed: {}", message)
            }
            SourceOutcome::Failure { kind: error, message } => {
                debug!(source = %kind, elapsed_ms, error = ?error, "lookup failed: {}", message)
            }
        }
        outcome
    })
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("sources", &self.sources.keys().collect::<Vec<_>>())
            .field("network_timeout", &self.network_timeout)
            .field("scan_timeout", &self.scan_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budgets() {
        let config = Config::default()
            .with_network_timeout(Duration::from_secs(3))
            .with_scan_timeout(Duration::from_secs(30));
        let orchestrator = Orchestrator::with_sources(Vec::new(), &config);
        assert_eq!(orchestrator.budget(SourceKind::Shodan), Duration::from_secs(3));
        assert_eq!(orchestrator.budget(SourceKind::Scanner), Duration::from_secs(32));
    }

    #[test]
    fn test_new_registers_all_sources() {
        let orchestrator = Orchestrator::new(&Config::default()).unwrap();
        let kinds: Vec<SourceKind> = orchestrator.sources.keys().copied().collect();
        assert_eq!(kinds, SourceKind::ALL.to_vec());
    }

    #[tokio::test]
    async fn test_empty_request_gives_empty_report() {
        let orchestrator = Orchestrator::with_sources(Vec::new(), &Config::default());
        let request = LookupRequest::new("8.8.8.8".parse().unwrap(), []);
        let report = orchestrator.run(&request).await;
        assert!(report.is_empty());
    }

    #[tokio::test]
    async fn test_unregistered_source_still_has_entry() {
        let orchestrator = Orchestrator::with_sources(Vec::new(), &Config::default());
        let request = LookupRequest::new("8.8.8.8".parse().unwrap(), [SourceKind::GeoIp]);
        let report = orchestrator.run(&request).await;
        assert_eq!(
            report.get(SourceKind::GeoIp).and_then(|o| o.error_kind()),
            Some(ErrorKind::Internal)
        );
    }
}
