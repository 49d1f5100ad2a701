//! Runtime configuration
//!
//! Credentials, time budgets and provider endpoints are gathered once at
//! startup into a [`Config`] that is handed to the
//! [`Orchestrator`](crate::orchestrator::Orchestrator). Nothing is read from
//! the environment after that point.
//!
//! # Examples
//!
//! ```
//! use ipwho_core::config::Config;
//! use std::time::Duration;
//!
//! let config = Config::default()
//!     .with_shodan_api_key("secret")
//!     .with_network_timeout(Duration::from_secs(5));
//! assert_eq!(config.shodan_api_key.as_deref(), Some("secret"));
//! ```

use std::path::PathBuf;
use std::time::Duration;

/// Environment variable holding the Shodan API key
pub const SHODAN_API_KEY_VAR: &str = "SHODAN_API_KEY";
/// Environment variable holding the AbuseIPDB API key
pub const ABUSEIPDB_API_KEY_VAR: &str = "ABUSEIPDB_API_KEY";

const DEFAULT_NETWORK_TIMEOUT_SECS: u64 = 10;
const DEFAULT_SCAN_TIMEOUT_SECS: u64 = 60;
const DEFAULT_OUTPUT_DIR: &str = "outputs";

const WHOIS_SERVER: &str = "whois.cymru.com:43";
const GEOIP_API_BASE: &str = "http://ip-api.com";
const SHODAN_API_BASE: &str = "https://api.shodan.io";
const ABUSEIPDB_API_BASE: &str = "https://api.abuseipdb.com";
const SCANNER_BINARY: &str = "nmap";

/// Provider endpoints
///
/// Production values by default; tests point them at local servers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// `host:port` of the IP-to-ASN whois service
    pub whois_server: String,
    /// Base URL of the GeoIP JSON API
    pub geoip_base: String,
    /// Base URL of the Shodan REST API
    pub shodan_base: String,
    /// Base URL of the AbuseIPDB API
    pub abuseipdb_base: String,
    /// Name or path of the port scanner binary
    pub scanner_binary: PathBuf,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            whois_server: WHOIS_SERVER.to_string(),
            geoip_base: GEOIP_API_BASE.to_string(),
            shodan_base: SHODAN_API_BASE.to_string(),
            abuseipdb_base: ABUSEIPDB_API_BASE.to_string(),
            scanner_binary: PathBuf::from(SCANNER_BINARY),
        }
    }
}

/// Complete configuration for one lookup run
#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    /// Shodan API key
    pub shodan_api_key: Option<String>,
    /// AbuseIPDB API key
    pub abuseipdb_api_key: Option<String>,
    /// Time budget for each network source
    pub network_timeout: Duration,
    /// Time budget for the port scanner
    pub scan_timeout: Duration,
    /// Directory that receives saved reports
    pub output_dir: PathBuf,
    /// Whether the WHOIS section resolves the PTR hostname
    pub resolve_hostnames: bool,
    /// Provider endpoints
    pub endpoints: Endpoints,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shodan_api_key: None,
            abuseipdb_api_key: None,
            network_timeout: Duration::from_secs(DEFAULT_NETWORK_TIMEOUT_SECS),
            scan_timeout: Duration::from_secs(DEFAULT_SCAN_TIMEOUT_SECS),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            resolve_hostnames: true,
            endpoints: Endpoints::default(),
        }
    }
}

impl Config {
    /// Builds the default configuration with credentials read from the
    /// process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the default configuration with credentials read through
    /// `lookup`; blank values count as absent
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            shodan_api_key: read(SHODAN_API_KEY_VAR),
            abuseipdb_api_key: read(ABUSEIPDB_API_KEY_VAR),
            ..Self::default()
        }
    }

    /// Sets the Shodan API key
    pub fn with_shodan_api_key(mut self, key: impl Into<String>) -> Self {
        self.shodan_api_key = Some(key.into());
        self
    }

    /// Sets the AbuseIPDB API key
    pub fn with_abuseipdb_api_key(mut self, key: impl Into<String>) -> Self {
        self.abuseipdb_api_key = Some(key.into());
        self
    }

    /// Sets the per-source network time budget
    pub fn with_network_timeout(mut self, timeout: Duration) -> Self {
        self.network_timeout = timeout;
        self
    }

    /// Sets the port scanner time budget
    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    /// Sets the directory that receives saved reports
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Enables or disables reverse DNS in the WHOIS section
    pub fn with_hostname_resolution(mut self, enabled: bool) -> Self {
        self.resolve_hostnames = enabled;
        self
    }

    /// Replaces the provider endpoints
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }
}

// Keys are redacted so a debug log of the config never leaks them.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |key: &Option<String>| key.as_ref().map(|_| "<redacted>");
        f.debug_struct("Config")
            .field("shodan_api_key", &redact(&self.shodan_api_key))
            .field("abuseipdb_api_key", &redact(&self.abuseipdb_api_key))
            .field("network_timeout", &self.network_timeout)
            .field("scan_timeout", &self.scan_timeout)
            .field("output_dir", &self.output_dir)
            .field("resolve_hostnames", &self.resolve_hostnames)
            .field("endpoints", &self.endpoints)
            .finish()
    }
}
