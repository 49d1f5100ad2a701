//! ipwho Core Library
//!
//! This library gathers open-source intelligence about a single IP address
//! from several independent sources, queried concurrently, and assembles the
//! results into one plain-text report.
//!
//! # Modules
//!
//! - [`args`] - CLI argument parsing and validation
//! - [`config`] - Credentials, time budgets and provider endpoints
//! - [`sources`] - Source adapters (WHOIS, GeoIP, Shodan, AbuseIPDB, Nmap)
//! - [`orchestrator`] - Concurrent fan-out with per-source timeouts
//! - [`report`] - Plain-text report rendering
//! - [`sink`] - Report output to stdout and an optional file
//! - [`target`] - Target address parsing and classification
//! - [`types`] - Core data structures for lookups and reports
//!
//! # Example
//!
//! ```no_run
//! use ipwho_core::config::Config;
//! use ipwho_core::orchestrator::Orchestrator;
//! use ipwho_core::report::render;
//! use ipwho_core::types::{LookupRequest, SourceKind};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = Orchestrator::new(&Config::from_env())?;
//! let request = LookupRequest::parse("8.8.8.8", [SourceKind::Whois, SourceKind::GeoIp])?;
//! let report = orchestrator.run(&request).await;
//! print!("{}", render(&report));
//! # Ok(())
//! # }
//! ```

pub mod args;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod report;
pub mod sink;
pub mod sources;
pub mod target;
pub mod types;

pub use error::{Error, Result};
