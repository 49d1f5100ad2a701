//! Target address parsing and scope classification
//!
//! Public intelligence sources only know about globally routable addresses.
//! [`address_scope`] tells the caller when a target falls into a special-use
//! range so that it can warn before spending time on the lookup.
//!
//! # Example
//!
//! ```
//! use ipwho_core::target::{address_scope, parse_target};
//!
//! let ip = parse_target("8.8.8.8").unwrap();
//! assert_eq!(address_scope(&ip), None);
//!
//! let ip = parse_target("192.168.1.10").unwrap();
//! assert_eq!(address_scope(&ip), Some("private (RFC 1918)"));
//! ```

use crate::error::{Error, Result};
use cidr::IpCidr;
use std::net::IpAddr;

/// Special-use ranges and their description, most specific first
const SPECIAL_RANGES: &[(&str, &str)] = &[
    ("0.0.0.0/8", "unspecified"),
    ("10.0.0.0/8", "private (RFC 1918)"),
    ("100.64.0.0/10", "shared address space (RFC 6598)"),
    ("127.0.0.0/8", "loopback"),
    ("169.254.0.0/16", "link-local"),
    ("172.16.0.0/12", "private (RFC 1918)"),
    ("192.0.0.0/24", "IETF protocol assignments"),
    ("192.0.2.0/24", "documentation/TEST-NET"),
    ("192.168.0.0/16", "private (RFC 1918)"),
    ("198.18.0.0/15", "benchmarking (RFC 2544)"),
    ("198.51.100.0/24", "documentation/TEST-NET"),
    ("203.0.113.0/24", "documentation/TEST-NET"),
    ("224.0.0.0/4", "multicast"),
    ("255.255.255.255/32", "broadcast"),
    ("240.0.0.0/4", "reserved"),
    ("::/128", "unspecified"),
    ("::1/128", "loopback"),
    ("100::/64", "discard prefix (RFC 6666)"),
    ("2001:db8::/32", "documentation"),
    ("fc00::/7", "unique local (RFC 4193)"),
    ("fe80::/10", "link-local"),
    ("ff00::/8", "multicast"),
];

/// Parses a user-supplied target into an IP address
///
/// Surrounding whitespace is ignored. Hostnames and CIDR ranges are rejected:
/// every source works on exactly one address.
///
/// # Errors
///
/// Returns [`Error::InvalidIp`] for anything that is not an IPv4 or IPv6
/// literal.
pub fn parse_target(input: &str) -> Result<IpAddr> {
    let trimmed = input.trim();
    trimmed
        .parse::<IpAddr>()
        .map_err(|_| Error::InvalidIp(trimmed.to_string()))
}

/// Describes the special-use range containing `ip`, or `None` for a
/// globally routable address
///
/// IPv4-mapped IPv6 addresses are classified by their embedded IPv4 address.
pub fn address_scope(ip: &IpAddr) -> Option<&'static str> {
    let ip = match ip {
        IpAddr::V6(v6) => v6
            .to_ipv4_mapped()
            .map(IpAddr::V4)
            .unwrap_or(IpAddr::V6(*v6)),
        IpAddr::V4(_) => *ip,
    };

    SPECIAL_RANGES.iter().find_map(|(network, label)| {
        network
            .parse::<IpCidr>()
            .ok()
            .filter(|cidr| cidr.contains(&ip))
            .map(|_| *label)
    })
}
