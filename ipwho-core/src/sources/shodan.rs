//! Shodan host API adapter
//!
//! Queries `GET /shodan/host/{ip}?key=...` and extracts open ports,
//! per-port service banners, hostnames and network operator details.
//!
//! The key is checked before any network activity: a missing key yields
//! [`ErrorKind::MissingCredential`] immediately.
//!
//! # Example
//!
//! ```no_run
//! use ipwho_core::config::Config;
//! use ipwho_core::sources::{ShodanSource, Source};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let source = ShodanSource::new(&Config::from_env())?;
//! let outcome = source.fetch("8.8.8.8".parse()?).await;
//! println!("{:?}", outcome);
//! # Ok(())
//! # }
//! ```

use super::{http_client, is_rate_limit_message, join_ports, status_failure, Source};
use crate::config::Config;
use crate::error::Result;
use crate::types::{ErrorKind, Fields, SourceFailure, SourceKind};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::net::IpAddr;

/// Shodan host lookup
#[derive(Debug, Clone)]
pub struct ShodanSource {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

/// Response of the host endpoint
///
/// Only the fields rendered in the report are modelled.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct HostResponse {
    /// Open ports
    #[serde(default)]
    pub ports: Vec<u16>,

    /// Reverse and forward hostnames
    #[serde(default)]
    pub hostnames: Vec<String>,

    /// Internet service provider
    #[serde(default)]
    pub isp: Option<String>,

    /// Owning organization
    #[serde(default)]
    pub org: Option<String>,

    /// Country name
    #[serde(default)]
    pub country_name: Option<String>,

    /// Autonomous system
    #[serde(default)]
    pub asn: Option<String>,

    /// Operating system guess
    #[serde(default)]
    pub os: Option<String>,

    /// Last time Shodan crawled the host
    #[serde(default)]
    pub last_update: Option<String>,

    /// One banner per service
    #[serde(default)]
    pub data: Vec<Banner>,
}

/// Service banner
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Banner {
    /// Port the service listens on
    pub port: u16,

    /// `tcp` or `udp`
    #[serde(default)]
    pub transport: Option<String>,

    /// Product name
    #[serde(default)]
    pub product: Option<String>,

    /// Product version
    #[serde(default)]
    pub version: Option<String>,

    /// Crawler metadata
    #[serde(default, rename = "_shodan")]
    pub meta: Option<BannerMeta>,
}

/// Crawler metadata attached to a banner
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BannerMeta {
    /// Crawler module that grabbed the banner, e.g. `https`
    #[serde(default)]
    pub module: Option<String>,
}

/// Error body returned by the API
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: String,
}

impl ShodanSource {
    /// Creates the adapter from configuration
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            client: http_client(config.network_timeout)?,
            base_url: config.endpoints.shodan_base.trim_end_matches('/').to_string(),
            api_key: config.shodan_api_key.clone(),
        })
    }

    async fn query(&self, ip: IpAddr, key: &str) -> std::result::Result<HostResponse, SourceFailure> {
        let url = format!("{}/shodan/host/{}", self.base_url, ip);
        let response = self
            .client
            .get(&url)
            .query(&[("key", key)])
            .send()
            .await
            .map_err(|e| SourceFailure::from(e.without_url()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SourceFailure::from(e.without_url()))?;

        // Errors can arrive with a 200 status too
        if let Ok(api_error) = serde_json::from_str::<ApiErrorResponse>(&body) {
            return Err(api_failure(status, &api_error.error));
        }
        if !status.is_success() {
            return Err(status_failure(status, ""));
        }

        Ok(serde_json::from_str::<HostResponse>(&body)?)
    }
}

fn api_failure(status: StatusCode, message: &str) -> SourceFailure {
    if status.is_success() {
        let kind = if is_rate_limit_message(message) {
            ErrorKind::RateLimited
        } else if message.to_lowercase().contains("no information available") {
            ErrorKind::NotFound
        } else {
            ErrorKind::ParseError
        };
        SourceFailure::new(kind, message)
    } else {
        status_failure(status, message)
    }
}

impl HostResponse {
    /// Converts the response into report fields
    pub fn into_fields(self) -> Fields {
        let mut ports = self.ports.clone();
        ports.extend(self.data.iter().map(|b| b.port));
        ports.sort_unstable();
        ports.dedup();

        let mut fields = Fields::new();
        fields.insert(
            "Open Ports",
            if ports.is_empty() {
                "None".to_string()
            } else {
                join_ports(&ports)
            },
        );
        if !self.hostnames.is_empty() {
            fields.insert("Hostnames", self.hostnames.join(", "));
        }
        fields.insert_or_na("ISP", self.isp);
        fields.insert_or_na("Organization", self.org);
        fields.insert_or_na("Country", self.country_name);
        if let Some(asn) = self.asn {
            fields.insert("ASN", asn);
        }
        if let Some(os) = self.os {
            fields.insert("OS", os);
        }

        let mut banners = self.data;
        banners.sort_by_key(|b| b.port);
        for banner in banners {
            let transport = banner.transport.as_deref().unwrap_or("tcp");
            let label = format!("Service {}/{}", banner.port, transport);
            fields.insert(label, banner.describe());
        }

        if let Some(updated) = self.last_update {
            fields.insert("Last Update", updated);
        }
        fields
    }
}

impl Banner {
    fn describe(&self) -> String {
        let product = [self.product.as_deref(), self.version.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        let module = self.meta.as_ref().and_then(|m| m.module.as_deref());
        match (module, product.is_empty()) {
            (Some(module), false) => format!("{} ({})", module, product),
            (Some(module), true) => module.to_string(),
            (None, false) => product,
            (None, true) => "unknown".to_string(),
        }
    }
}

#[async_trait]
impl Source for ShodanSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Shodan
    }

    async fn lookup(&self, ip: IpAddr) -> std::result::Result<Fields, SourceFailure> {
        let key = self.api_key.as_deref().ok_or_else(|| {
            SourceFailure::new(ErrorKind::MissingCredential, "SHODAN_API_KEY is not set")
        })?;
        let response = self.query(ip, key).await?;
        Ok(response.into_fields())
    }
}
