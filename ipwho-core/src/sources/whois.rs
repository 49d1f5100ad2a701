//! WHOIS adapter
//!
//! Registry data comes from the Team Cymru IP-to-ASN whois service, which
//! answers a plain TCP/43 query with one `|`-separated row per origin AS:
//!
//! ```text
//! AS      | IP               | BGP Prefix          | CC | Registry | Allocated  | AS Name
//! 15169   | 8.8.8.8          | 8.8.8.0/24          | US | arin     | 2023-12-28 | GOOGLE, US
//! ```
//!
//! The hostname is resolved separately with a reverse DNS (PTR) lookup that
//! runs concurrently with the whois query. A missing PTR record is reported
//! in the section, not treated as a failure.

use super::Source;
use crate::config::Config;
use crate::types::{ErrorKind, Fields, SourceFailure, SourceKind};
use async_trait::async_trait;
use cidr::IpCidr;
use std::net::IpAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

/// Shown when the address has no PTR record
pub const NO_PTR_RECORD: &str = "No PTR record found";

/// Upper bound on a whois reply; real replies are a few hundred bytes
const MAX_REPLY_BYTES: u64 = 64 * 1024;

/// WHOIS registry lookup
#[derive(Debug, Clone)]
pub struct WhoisSource {
    server: String,
    connect_timeout: Duration,
    resolve_hostname: bool,
}

/// One row of the IP-to-ASN reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsnRecord {
    /// Origin AS number
    pub asn: u32,
    /// Announced prefix containing the address
    pub prefix: IpCidr,
    /// ISO country code of the allocation
    pub country: String,
    /// Regional registry
    pub registry: String,
    /// Allocation date
    pub allocated: String,
    /// AS name, usually `ORGANIZATION, CC`
    pub as_name: String,
}

impl WhoisSource {
    /// Creates the adapter from configuration
    pub fn new(config: &Config) -> Self {
        Self {
            server: config.endpoints.whois_server.clone(),
            connect_timeout: config.network_timeout,
            resolve_hostname: config.resolve_hostnames,
        }
    }

    async fn query(&self, ip: IpAddr) -> Result<String, SourceFailure> {
        let connect = TcpStream::connect(self.server.as_str());
        let mut stream = timeout(self.connect_timeout, connect)
            .await
            .map_err(|_| {
                SourceFailure::new(
                    ErrorKind::Timeout,
                    format!("connecting to {} timed out", self.server),
                )
            })?
            .map_err(|e| network_failure(&self.server, e))?;

        stream
            .write_all(format!(" -v {}\r\n", ip).as_bytes())
            .await
            .map_err(|e| network_failure(&self.server, e))?;

        let mut reply = Vec::new();
        (&mut stream)
            .take(MAX_REPLY_BYTES)
            .read_to_end(&mut reply)
            .await
            .map_err(|e| network_failure(&self.server, e))?;

        Ok(String::from_utf8_lossy(&reply).into_owned())
    }
}

fn network_failure(server: &str, err: std::io::Error) -> SourceFailure {
    SourceFailure::new(ErrorKind::NetworkError, format!("{}: {}", server, err))
}

/// Parses an IP-to-ASN reply, returning the first data row
pub fn parse_reply(reply: &str) -> Result<AsnRecord, SourceFailure> {
    let mut saw_unannounced = false;

    for line in reply.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("AS ") || line.starts_with("Bulk mode") {
            continue;
        }
        if let Some(err) = line.strip_prefix("Error:") {
            return Err(SourceFailure::new(ErrorKind::ParseError, err.trim()));
        }

        let columns: Vec<&str> = line.split('|').map(str::trim).collect();
        if columns.len() < 7 {
            continue;
        }
        if columns[0] == "NA" {
            saw_unannounced = true;
            continue;
        }

        let asn = columns[0].parse::<u32>().map_err(|_| {
            SourceFailure::new(ErrorKind::ParseError, format!("bad AS number {:?}", columns[0]))
        })?;
        let prefix = columns[2].parse::<IpCidr>().map_err(|e| {
            SourceFailure::new(
                ErrorKind::ParseError,
                format!("bad BGP prefix {:?}: {}", columns[2], e),
            )
        })?;

        return Ok(AsnRecord {
            asn,
            prefix,
            country: columns[3].to_string(),
            registry: columns[4].to_uppercase(),
            allocated: columns[5].to_string(),
            // AS names may themselves contain a pipe
            as_name: columns[6..].join("|"),
        });
    }

    if saw_unannounced {
        Err(SourceFailure::new(
            ErrorKind::NotFound,
            "address is not announced by any AS",
        ))
    } else {
        Err(SourceFailure::new(
            ErrorKind::ParseError,
            "reply contained no data row",
        ))
    }
}

/// Resolves the PTR name for `ip`, without the trailing dot
async fn reverse_lookup(ip: IpAddr) -> Option<String> {
    let resolver = TokioAsyncResolver::tokio_from_system_conf().unwrap_or_else(|_| {
        TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
    });
    match resolver.reverse_lookup(ip).await {
        Ok(names) => names
            .iter()
            .next()
            .map(|name| name.to_string().trim_end_matches('.').to_string()),
        Err(e) => {
            debug!(%ip, error = %e, "reverse lookup failed");
            None
        }
    }
}

impl AsnRecord {
    /// Converts the record into report fields
    pub fn into_fields(self, ip: IpAddr, hostname: Option<Option<String>>) -> Fields {
        let organization = self
            .as_name
            .rsplit_once(", ")
            .filter(|(_, cc)| cc.len() == 2)
            .map(|(org, _)| org.to_string())
            .unwrap_or_else(|| self.as_name.clone());

        let mut fields = Fields::new();
        fields.insert("IP Address", ip.to_string());
        if let Some(hostname) = hostname {
            fields.insert(
                "Hostname",
                hostname.unwrap_or_else(|| NO_PTR_RECORD.to_string()),
            );
        }
        fields.insert("ASN", format!("AS{}", self.asn));
        fields.insert("Subnet", self.prefix.to_string());
        fields.insert("Country", self.country);
        fields.insert("Organization", organization);
        fields.insert("Registry", self.registry);
        fields.insert("Allocated", self.allocated);
        fields
    }
}

#[async_trait]
impl Source for WhoisSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Whois
    }

    async fn lookup(&self, ip: IpAddr) -> Result<Fields, SourceFailure> {
        let hostname = async {
            if self.resolve_hostname {
                Some(reverse_lookup(ip).await)
            } else {
                None
            }
        };
        let (reply, hostname) = tokio::join!(self.query(ip), hostname);
        let record = parse_reply(&reply?)?;
        Ok(record.into_fields(ip, hostname))
    }
}
