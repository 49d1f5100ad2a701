//! Local fakes for the network providers
//!
//! Each fake binds `127.0.0.1:0`, answers every connection with a canned
//! reply and records what it received.

#![allow(dead_code)]

use ipwho_core::config::{Config, Endpoints};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Canned reply of the IP-to-ASN whois service for 8.8.8.8
pub const WHOIS_GOOGLE: &str = "AS      | IP               | BGP Prefix          | CC | Registry | Allocated  | AS Name\n\
15169   | 8.8.8.8          | 8.8.8.0/24          | US | arin     | 2023-12-28 | GOOGLE, US\n";

/// Canned ip-api.com reply for 8.8.8.8
pub const GEOIP_GOOGLE: &str = r#"{"status":"success","country":"United States","countryCode":"US","region":"VA","regionName":"Virginia","city":"Mountain View","zip":"94043","lat":37.4056,"lon":-122.0775,"timezone":"America/Los_Angeles","isp":"Google LLC","org":"Google Public DNS","as":"AS15169 Google LLC","query":"8.8.8.8"}"#;

/// A running fake server
pub struct FakeServer {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
}

impl FakeServer {
    /// `http://` base URL of the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Every request received so far, as text
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

/// Serves `body` with `status` for every HTTP request
pub async fn http_server(status: u16, body: &str) -> FakeServer {
    let response = format!(
        "HTTP/1.1 {} Fake\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    serve(response, b"\r\n\r\n").await
}

/// Sends `response` verbatim after reading an HTTP request head
pub async fn raw_http_server(response: &str) -> FakeServer {
    serve(response.to_string(), b"\r\n\r\n").await
}

/// Answers every whois query with `reply` and closes the connection
pub async fn whois_server(reply: &str) -> FakeServer {
    serve(reply.to_string(), b"\r\n").await
}

/// Accepts connections and never answers
pub async fn silent_server() -> FakeServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    FakeServer {
        addr,
        requests: Arc::default(),
    }
}

async fn serve(response: String, terminator: &'static [u8]) -> FakeServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests: Arc<Mutex<Vec<String>>> = Arc::default();

    let recorded = Arc::clone(&requests);
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let response = response.clone();
            let recorded = Arc::clone(&recorded);
            tokio::spawn(answer(stream, terminator, response, recorded));
        }
    });

    FakeServer { addr, requests }
}

// The request is recorded before replying so a client that has its answer
// can always see its own request.
async fn answer(
    mut stream: TcpStream,
    terminator: &'static [u8],
    response: String,
    recorded: Arc<Mutex<Vec<String>>>,
) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(terminator.len()).any(|w| w == terminator) {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    recorded
        .lock()
        .unwrap()
        .push(String::from_utf8_lossy(&buf).into_owned());

    if stream.write_all(response.as_bytes()).await.is_ok() {
        let _ = stream.shutdown().await;
    }
}

/// Configuration with reverse DNS disabled and a scanner binary that does
/// not exist
pub fn test_config() -> Config {
    Config::default()
        .with_hostname_resolution(false)
        .with_network_timeout(Duration::from_secs(5))
        .with_endpoints(Endpoints {
            scanner_binary: "/nonexistent/ipwho-test/nmap".into(),
            ..Endpoints::default()
        })
}
