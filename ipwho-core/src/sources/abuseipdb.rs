//! AbuseIPDB reputation adapter
//!
//! Calls `GET /api/v2/check` with the configured key and reports the abuse
//! confidence score together with report statistics for the last 90 days.

use super::{http_client, status_failure, Source};
use crate::config::Config;
use crate::error::Result;
use crate::types::{ErrorKind, Fields, SourceFailure, SourceKind};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::net::IpAddr;

const MAX_AGE_IN_DAYS: &str = "90";

/// AbuseIPDB check
#[derive(Debug, Clone)]
pub struct AbuseIpDbSource {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

/// Envelope of the check endpoint
#[derive(Debug, Deserialize)]
struct CheckEnvelope {
    data: Option<CheckData>,
}

/// Error envelope of the API
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    errors: Vec<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    detail: String,
}

/// Reputation data for one address
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CheckData {
    /// Confidence that the address is abusive, 0 to 100
    pub abuse_confidence_score: u8,
    /// Reports in the window
    #[serde(default)]
    pub total_reports: u64,
    /// Distinct reporting users
    #[serde(default)]
    pub num_distinct_users: u64,
    /// Timestamp of the latest report
    #[serde(default)]
    pub last_reported_at: Option<String>,
    /// Whether the address is on the AbuseIPDB whitelist
    #[serde(default)]
    pub is_whitelisted: Option<bool>,
    /// Usage category, e.g. `Data Center/Web Hosting/Transit`
    #[serde(default)]
    pub usage_type: Option<String>,
    /// Internet service provider
    #[serde(default)]
    pub isp: Option<String>,
    /// Domain of the provider
    #[serde(default)]
    pub domain: Option<String>,
    /// ISO country code
    #[serde(default)]
    pub country_code: Option<String>,
}

impl AbuseIpDbSource {
    /// Creates the adapter from configuration
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            client: http_client(config.network_timeout)?,
            base_url: config
                .endpoints
                .abuseipdb_base
                .trim_end_matches('/')
                .to_string(),
            api_key: config.abuseipdb_api_key.clone(),
        })
    }

    async fn check(&self, ip: IpAddr, key: &str) -> std::result::Result<CheckData, SourceFailure> {
        let url = format!("{}/api/v2/check", self.base_url);
        let ip = ip.to_string();
        let response = self
            .client
            .get(&url)
            .header("Key", key)
            .header("Accept", "application/json")
            .query(&[
                ("ipAddress", ip.as_str()),
                ("maxAgeInDays", MAX_AGE_IN_DAYS),
                ("verbose", "true"),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let detail = serde_json::from_str::<ErrorEnvelope>(&body)
                .ok()
                .and_then(|e| e.errors.into_iter().next())
                .map(|e| e.detail)
                .unwrap_or_default();
            return Err(status_failure(status, &detail));
        }

        serde_json::from_str::<CheckEnvelope>(&body)?
            .data
            .ok_or_else(|| SourceFailure::new(ErrorKind::NotFound, "no data found for this IP"))
    }
}

impl CheckData {
    /// Converts the reputation data into report fields
    pub fn into_fields(self) -> Fields {
        let mut fields = Fields::new();
        fields.insert(
            "Abuse Confidence Score",
            format!("{}%", self.abuse_confidence_score.min(100)),
        );
        fields.insert("Total Reports", self.total_reports.to_string());
        fields.insert("Distinct Reporters", self.num_distinct_users.to_string());
        fields.insert_or_na("Last Reported", self.last_reported_at);
        if let Some(whitelisted) = self.is_whitelisted {
            fields.insert("Whitelisted", if whitelisted { "yes" } else { "no" });
        }
        fields.insert_or_na("Usage Type", self.usage_type);
        fields.insert_or_na("ISP", self.isp);
        fields.insert_or_na("Domain", self.domain);
        fields.insert_or_na("Country", self.country_code);
        fields
    }
}

#[async_trait]
impl Source for AbuseIpDbSource {
    fn kind(&self) -> SourceKind {
        SourceKind::AbuseIpDb
    }

    async fn lookup(&self, ip: IpAddr) -> std::result::Result<Fields, SourceFailure> {
        let key = self.api_key.as_deref().ok_or_else(|| {
            SourceFailure::new(ErrorKind::MissingCredential, "ABUSEIPDB_API_KEY is not set")
        })?;
        let data = self.check(ip, key).await?;
        Ok(data.into_fields())
    }
}
