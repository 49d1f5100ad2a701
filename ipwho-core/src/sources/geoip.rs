//! GeoIP adapter backed by the ip-api.com JSON endpoint

use super::{http_client, Source};
use crate::config::Config;
use crate::error::Result;
use crate::types::{ErrorKind, Fields, SourceFailure, SourceKind};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::net::IpAddr;

/// Geolocation lookup
#[derive(Debug, Clone)]
pub struct GeoIpSource {
    client: Client,
    base_url: String,
}

/// Reply of `GET /json/{ip}`
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeoIpResponse {
    /// `success` or `fail`
    pub status: String,
    /// Failure reason when `status` is `fail`
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub region_name: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub zip: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub isp: Option<String>,
    #[serde(default)]
    pub org: Option<String>,
    /// `AS<number> <name>`
    #[serde(default, rename = "as")]
    pub as_name: Option<String>,
}

impl GeoIpSource {
    /// Creates the adapter from configuration
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            client: http_client(config.network_timeout)?,
            base_url: config.endpoints.geoip_base.trim_end_matches('/').to_string(),
        })
    }
}

impl GeoIpResponse {
    /// Converts a successful reply into report fields
    ///
    /// A `fail` status becomes [`ErrorKind::NotFound`]; ip-api uses it for
    /// private, reserved and otherwise unknown ranges.
    pub fn into_fields(self) -> std::result::Result<Fields, SourceFailure> {
        if self.status != "success" {
            let reason = self.message.unwrap_or_else(|| self.status.clone());
            return Err(SourceFailure::new(ErrorKind::NotFound, reason));
        }

        let mut fields = Fields::new();
        let country = match (self.country, self.country_code) {
            (Some(name), Some(code)) => Some(format!("{} ({})", name, code)),
            (name, code) => name.or(code),
        };
        fields.insert_or_na("Country", country);
        fields.insert_or_na("Region", self.region_name.filter(|r| !r.is_empty()));
        fields.insert_or_na("City", self.city.filter(|c| !c.is_empty()));
        if let Some(zip) = self.zip.filter(|z| !z.is_empty()) {
            fields.insert("Postal Code", zip);
        }
        if let (Some(lat), Some(lon)) = (self.lat, self.lon) {
            fields.insert("Coordinates", format!("{:.4}, {:.4}", lat, lon));
        }
        fields.insert_or_na("Timezone", self.timezone);
        fields.insert_or_na("ISP", self.isp.filter(|i| !i.is_empty()));
        fields.insert_or_na("Organization", self.org.filter(|o| !o.is_empty()));
        if let Some(as_name) = self.as_name.filter(|a| !a.is_empty()) {
            fields.insert("AS", as_name);
        }
        Ok(fields)
    }
}

#[async_trait]
impl Source for GeoIpSource {
    fn kind(&self) -> SourceKind {
        SourceKind::GeoIp
    }

    async fn lookup(&self, ip: IpAddr) -> std::result::Result<Fields, SourceFailure> {
        let url = format!("{}/json/{}", self.base_url, ip);
        let response = self.client.get(&url).send().await?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::TOO_MANY_REQUESTS => {
                let retry = response
                    .headers()
                    .get("x-ttl")
                    .and_then(|v| v.to_str().ok())
                    .map(|s| format!(" (window resets in {}s)", s))
                    .unwrap_or_default();
                return Err(SourceFailure::new(
                    ErrorKind::RateLimited,
                    format!("request quota exhausted{}", retry),
                ));
            }
            status if status.is_server_error() => {
                return Err(SourceFailure::new(
                    ErrorKind::NetworkError,
                    format!("server returned {}", status),
                ));
            }
            status => {
                return Err(SourceFailure::new(
                    ErrorKind::ParseError,
                    format!("unexpected status {}", status),
                ));
            }
        }

        let body = response.text().await?;
        serde_json::from_str::<GeoIpResponse>(&body)?.into_fields()
    }
}
