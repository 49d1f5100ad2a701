//! Source adapter integration tests
//!
//! Adapters are pointed at local fake servers so that the full request,
//! response and parsing path runs without touching the internet.

mod common;

use common::{http_server, raw_http_server, silent_server, whois_server, GEOIP_GOOGLE, WHOIS_GOOGLE};
use ipwho_core::config::Endpoints;
use ipwho_core::orchestrator::Orchestrator;
use ipwho_core::report::render;
use ipwho_core::sources::{AbuseIpDbSource, GeoIpSource, ShodanSource, Source, WhoisSource};
use ipwho_core::types::{ErrorKind, LookupRequest, SourceKind};
use std::net::IpAddr;
use std::time::Duration;

fn google() -> IpAddr {
    "8.8.8.8".parse().unwrap()
}

#[tokio::test]
async fn test_whois_against_fake_server() {
    let server = whois_server(WHOIS_GOOGLE).await;
    let config = common::test_config().with_endpoints(Endpoints {
        whois_server: server.addr.to_string(),
        ..Endpoints::default()
    });

    let fields = WhoisSource::new(&config).lookup(google()).await.unwrap();
    assert_eq!(fields.get("ASN"), Some("AS15169"));
    assert_eq!(fields.get("Subnet"), Some("8.8.8.0/24"));
    assert_eq!(fields.get("Registry"), Some("ARIN"));
    assert_eq!(fields.get("Hostname"), None);
    assert_eq!(server.requests(), vec![" -v 8.8.8.8\r\n".to_string()]);
}

#[tokio::test]
async fn test_whois_unreachable_is_network_error() {
    // Bind and drop to get a port with nothing listening
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let config = common::test_config().with_endpoints(Endpoints {
        whois_server: addr.to_string(),
        ..Endpoints::default()
    });

    let err = WhoisSource::new(&config).lookup(google()).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NetworkError);
}

#[tokio::test]
async fn test_geoip_against_fake_server() {
    let server = http_server(200, GEOIP_GOOGLE).await;
    let config = common::test_config().with_endpoints(Endpoints {
        geoip_base: server.base_url(),
        ..Endpoints::default()
    });

    let fields = GeoIpSource::new(&config).unwrap().lookup(google()).await.unwrap();
    assert_eq!(fields.get("City"), Some("Mountain View"));
    assert_eq!(fields.get("Country"), Some("United States (US)"));
    assert!(server.requests()[0].starts_with("GET /json/8.8.8.8 HTTP/1.1"));
}

#[tokio::test]
async fn test_geoip_rate_limited() {
    let server = http_server(429, "").await;
    let config = common::test_config().with_endpoints(Endpoints {
        geoip_base: server.base_url(),
        ..Endpoints::default()
    });

    let err = GeoIpSource::new(&config).unwrap().lookup(google()).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::RateLimited);
}

#[tokio::test]
async fn test_geoip_malformed_body() {
    let server = http_server(200, "<html>not json</html>").await;
    let config = common::test_config().with_endpoints(Endpoints {
        geoip_base: server.base_url(),
        ..Endpoints::default()
    });

    let err = GeoIpSource::new(&config).unwrap().lookup(google()).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::ParseError);
}

#[tokio::test]
async fn test_geoip_silent_server_times_out() {
    let server = silent_server().await;
    let config = common::test_config()
        .with_network_timeout(Duration::from_millis(300))
        .with_endpoints(Endpoints {
            geoip_base: server.base_url(),
            ..Endpoints::default()
        });

    let orchestrator = Orchestrator::new(&config).unwrap();
    let report = orchestrator
        .run(&LookupRequest::new(google(), [SourceKind::GeoIp]))
        .await;
    assert_eq!(
        report.get(SourceKind::GeoIp).unwrap().error_kind(),
        Some(ErrorKind::Timeout)
    );
}

#[tokio::test]
async fn test_shodan_against_fake_server() {
    let body = r#"{
        "ports": [443, 53],
        "hostnames": ["dns.google"],
        "isp": "Google LLC",
        "org": "Google LLC",
        "country_name": "United States",
        "asn": "AS15169",
        "data": [
            {"port": 53, "transport": "udp", "product": "Google DNS"},
            {"port": 443, "transport": "tcp", "_shodan": {"module": "https"}}
        ]
    }"#;
    let server = http_server(200, body).await;
    let config = common::test_config()
        .with_shodan_api_key("test-key")
        .with_endpoints(Endpoints {
            shodan_base: server.base_url(),
            ..Endpoints::default()
        });

    let fields = ShodanSource::new(&config).unwrap().lookup(google()).await.unwrap();
    assert_eq!(fields.get("Open Ports"), Some("53, 443"));
    assert_eq!(fields.get("Hostnames"), Some("dns.google"));
    assert_eq!(fields.get("Service 53/udp"), Some("Google DNS"));
    assert_eq!(fields.get("Service 443/tcp"), Some("https"));
    assert!(server.requests()[0].starts_with("GET /shodan/host/8.8.8.8?key=test-key "));
}

#[tokio::test]
async fn test_shodan_rejected_key() {
    let server = http_server(401, r#"{"error": "Invalid API key"}"#).await;
    let config = common::test_config()
        .with_shodan_api_key("bad-key")
        .with_endpoints(Endpoints {
            shodan_base: server.base_url(),
            ..Endpoints::default()
        });

    let err = ShodanSource::new(&config).unwrap().lookup(google()).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Unauthorized);
}

#[tokio::test]
async fn test_shodan_unknown_host() {
    let server = http_server(404, r#"{"error": "No information available for that IP."}"#).await;
    let config = common::test_config()
        .with_shodan_api_key("test-key")
        .with_endpoints(Endpoints {
            shodan_base: server.base_url(),
            ..Endpoints::default()
        });

    let err = ShodanSource::new(&config).unwrap().lookup(google()).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[tokio::test]
async fn test_shodan_truncated_body_hides_key() {
    // Promises more body than it sends, then closes
    let server = raw_http_server(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 4096\r\n\r\n{\"ports\": [",
    )
    .await;
    let config = common::test_config()
        .with_shodan_api_key("secret-shodan-key")
        .with_endpoints(Endpoints {
            shodan_base: server.base_url(),
            ..Endpoints::default()
        });

    let err = ShodanSource::new(&config).unwrap().lookup(google()).await.unwrap_err();
    assert!(!err.message.contains("secret-shodan-key"), "{}", err.message);
}

#[tokio::test]
async fn test_abuseipdb_against_fake_server() {
    let body = r#"{"data": {
        "ipAddress": "8.8.8.8",
        "abuseConfidenceScore": 0,
        "countryCode": "US",
        "usageType": "Content Delivery Network",
        "isp": "Google LLC",
        "domain": "google.com",
        "isWhitelisted": true,
        "totalReports": 12,
        "numDistinctUsers": 4,
        "lastReportedAt": "2024-04-30T12:00:00+00:00"
    }}"#;
    let server = http_server(200, body).await;
    let config = common::test_config()
        .with_abuseipdb_api_key("abuse-key")
        .with_endpoints(Endpoints {
            abuseipdb_base: server.base_url(),
            ..Endpoints::default()
        });

    let fields = AbuseIpDbSource::new(&config).unwrap().lookup(google()).await.unwrap();
    assert_eq!(fields.get("Abuse Confidence Score"), Some("0%"));
    assert_eq!(fields.get("Total Reports"), Some("12"));
    assert_eq!(fields.get("Whitelisted"), Some("yes"));

    let request = server.requests()[0].to_lowercase();
    assert!(request.starts_with("get /api/v2/check?ipaddress=8.8.8.8&maxageindays=90&verbose=true "));
    assert!(request.contains("\r\nkey: abuse-key\r\n"));
}

#[tokio::test]
async fn test_abuseipdb_quota_exhausted() {
    let body = r#"{"errors": [{"detail": "Daily rate limit of 1000 requests exceeded for this endpoint.", "status": 429}]}"#;
    let server = http_server(429, body).await;
    let config = common::test_config()
        .with_abuseipdb_api_key("abuse-key")
        .with_endpoints(Endpoints {
            abuseipdb_base: server.base_url(),
            ..Endpoints::default()
        });

    let err = AbuseIpDbSource::new(&config).unwrap().lookup(google()).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::RateLimited);
}

#[tokio::test]
async fn test_whois_and_geoip_end_to_end() {
    let whois = whois_server(WHOIS_GOOGLE).await;
    let geoip = http_server(200, GEOIP_GOOGLE).await;
    let config = common::test_config().with_endpoints(Endpoints {
        whois_server: whois.addr.to_string(),
        geoip_base: geoip.base_url(),
        ..Endpoints::default()
    });

    let orchestrator = Orchestrator::new(&config).unwrap();
    let request = LookupRequest::parse("8.8.8.8", [SourceKind::GeoIp, SourceKind::Whois]).unwrap();
    let report = orchestrator.run(&request).await;
    assert_eq!(report.kinds(), vec![SourceKind::Whois, SourceKind::GeoIp]);

    let text = render(&report);
    let whois_at = text.find("[ WHOIS Information ]").unwrap();
    let geoip_at = text.find("[ GeoIP Information ]").unwrap();
    let asn_at = text.find("ASN: AS15169").unwrap();
    let city_at = text.find("City: Mountain View").unwrap();
    assert!(whois_at < asn_at && asn_at < geoip_at && geoip_at < city_at);
}

#[tokio::test]
async fn test_missing_scanner_does_not_affect_siblings() {
    let whois = whois_server(WHOIS_GOOGLE).await;
    let config = common::test_config().with_endpoints(Endpoints {
        whois_server: whois.addr.to_string(),
        scanner_binary: "/nonexistent/ipwho-test/nmap".into(),
        ..Endpoints::default()
    });

    let orchestrator = Orchestrator::new(&config).unwrap();
    let request = LookupRequest::new(google(), [SourceKind::Whois, SourceKind::Scanner]);
    let report = orchestrator.run(&request).await;

    assert!(report.get(SourceKind::Whois).unwrap().is_success());
    assert_eq!(
        report.get(SourceKind::Scanner).unwrap().error_kind(),
        Some(ErrorKind::ToolNotFound)
    );
    assert!(render(&report).contains("[ Nmap Scan Results ]\nError: scanner binary not found\n"));
}
