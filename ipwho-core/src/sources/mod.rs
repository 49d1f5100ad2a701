//! Intelligence source adapters
//!
//! Every provider is wrapped in a type implementing [`Source`]. An adapter
//! turns an IP address into [`Fields`] or a typed [`SourceFailure`]; the
//! provided [`Source::fetch`] folds both into a [`SourceOutcome`] so that no
//! provider error ever escapes the adapter boundary.
//!
//! - [`whois`] - IP-to-ASN whois over TCP/43 plus reverse DNS
//! - [`geoip`] - ip-api.com geolocation
//! - [`shodan`] - Shodan host API
//! - [`abuseipdb`] - AbuseIPDB reputation check
//! - [`scanner`] - local nmap scan

pub mod abuseipdb;
pub mod geoip;
pub mod scanner;
pub mod shodan;
pub mod whois;

pub use abuseipdb::AbuseIpDbSource;
pub use geoip::GeoIpSource;
pub use scanner::ScannerSource;
pub use shodan::ShodanSource;
pub use whois::WhoisSource;

use crate::error::Result;
use crate::types::{ErrorKind, Fields, SourceFailure, SourceKind, SourceOutcome};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::net::IpAddr;
use std::time::Duration;

/// A provider of intelligence about an IP address
#[async_trait]
pub trait Source: Send + Sync {
    /// Which report section this source fills
    fn kind(&self) -> SourceKind;

    /// Queries the provider
    async fn lookup(&self, ip: IpAddr) -> std::result::Result<Fields, SourceFailure>;

    /// Queries the provider, capturing every failure as an outcome
    async fn fetch(&self, ip: IpAddr) -> SourceOutcome {
        match self.lookup(ip).await {
            Ok(fields) => SourceOutcome::success(fields),
            Err(failure) => failure.into(),
        }
    }
}

/// Builds the HTTP client shared by the REST adapters
pub(crate) fn http_client(timeout: Duration) -> Result<Client> {
    let client = Client::builder()
        .timeout(timeout)
        .user_agent(concat!("ipwho/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Maps a non-success HTTP status of a keyed API to a failure
pub(crate) fn status_failure(status: StatusCode, detail: &str) -> SourceFailure {
    let kind = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ErrorKind::Unauthorized,
        StatusCode::NOT_FOUND => ErrorKind::NotFound,
        StatusCode::TOO_MANY_REQUESTS => ErrorKind::RateLimited,
        s if s.is_server_error() => ErrorKind::NetworkError,
        _ if is_rate_limit_message(detail) => ErrorKind::RateLimited,
        _ => ErrorKind::ParseError,
    };
    let message = if detail.is_empty() {
        format!("request failed with status {}", status)
    } else {
        format!("request failed with status {}: {}", status, detail)
    };
    SourceFailure::new(kind, message)
}

/// Determines if a provider error message describes a quota problem
pub(crate) fn is_rate_limit_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("rate limit")
        || lower.contains("too many requests")
        || lower.contains("quota exceeded")
        || lower.contains("throttle")
}

/// Formats a list of ports as `22, 80, 443`
pub(crate) fn join_ports(ports: &[u16]) -> String {
    ports
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(std::result::Result<Fields, SourceFailure>);

    #[async_trait]
    impl Source for Fixed {
        fn kind(&self) -> SourceKind {
            SourceKind::GeoIp
        }

        async fn lookup(&self, _ip: IpAddr) -> std::result::Result<Fields, SourceFailure> {
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn test_fetch_wraps_success() {
        let fields: Fields = [("City", "Mountain View")].into_iter().collect();
        let outcome = Fixed(Ok(fields.clone())).fetch("8.8.8.8".parse().unwrap()).await;
        assert_eq!(outcome.fields(), Some(&fields));
    }

    #[tokio::test]
    async fn test_fetch_wraps_failure() {
        let source = Fixed(Err(SourceFailure::new(ErrorKind::RateLimited, "slow down")));
        let outcome = source.fetch("8.8.8.8".parse().unwrap()).await;
        assert_eq!(outcome.error_kind(), Some(ErrorKind::RateLimited));
    }

    #[test]
    fn test_status_failure_mapping() {
        let kind = |status: u16, detail: &str| {
            status_failure(StatusCode::from_u16(status).unwrap(), detail).kind
        };
        assert_eq!(kind(401, ""), ErrorKind::Unauthorized);
        assert_eq!(kind(403, ""), ErrorKind::Unauthorized);
        assert_eq!(kind(404, ""), ErrorKind::NotFound);
        assert_eq!(kind(429, ""), ErrorKind::RateLimited);
        assert_eq!(kind(503, ""), ErrorKind::NetworkError);
        assert_eq!(kind(400, "Daily quota exceeded"), ErrorKind::RateLimited);
        assert_eq!(kind(422, "ipAddress must be valid"), ErrorKind::ParseError);
    }

    #[test]
    fn test_rate_limit_message() {
        assert!(is_rate_limit_message("Rate limit reached"));
        assert!(is_rate_limit_message("Too Many Requests"));
        assert!(!is_rate_limit_message("Invalid API key"));
    }

    #[test]
    fn test_join_ports() {
        assert_eq!(join_ports(&[22, 80, 443]), "22, 80, 443");
        assert_eq!(join_ports(&[]), "");
    }
}
